use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

const DEV_SESSION_KEY: &str = "pixbord-development-key-change-me";

pub const MAX_DESCRIPTION_LENGTH: usize = 2200;
pub const MAX_COMMENT_LENGTH: usize = 1000;
/// Upper bound for the session lifetime, one year.
pub const MAX_SESSION_AGE_HOURS: i64 = 24 * 365;

#[derive(Clone, Debug)]
pub struct Config {
    pub session_name: String,
    /// The first key signs new cookies; every key is accepted when verifying.
    pub session_keys: Vec<String>,
    pub session_max_age_hours: i64,
    pub store_label: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub bind_addr: String,
    pub seed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_name: "session".to_string(),
            session_keys: vec![DEV_SESSION_KEY.to_string()],
            session_max_age_hours: 24,
            store_label: "default".to_string(),
            upload_dir: PathBuf::from("public/images"),
            max_upload_bytes: 5 * 1024 * 1024,
            bind_addr: "0.0.0.0:3000".to_string(),
            seed: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let session_keys = match std::env::var("PIXBORD_SESSION_KEYS") {
            Ok(raw) => parse_keys(&raw),
            Err(_) => Vec::new(),
        };
        let session_keys = if session_keys.is_empty() {
            warn!("PIXBORD_SESSION_KEYS not set, signing sessions with the development key");
            defaults.session_keys
        } else {
            session_keys
        };

        Self {
            session_name: var_or("PIXBORD_SESSION_NAME", defaults.session_name),
            session_keys,
            session_max_age_hours: session_age(parse_or(
                "PIXBORD_SESSION_MAX_AGE_HOURS",
                defaults.session_max_age_hours,
            )),
            store_label: var_or("PIXBORD_STORE", defaults.store_label),
            upload_dir: std::env::var("PIXBORD_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: parse_or("PIXBORD_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            bind_addr: var_or("PIXBORD_BIND", defaults.bind_addr),
            seed: parse_or("PIXBORD_SEED", defaults.seed),
        }
    }

    pub fn posts_upload_dir(&self) -> PathBuf {
        self.upload_dir.join("posts")
    }

    pub fn profiles_upload_dir(&self) -> PathBuf {
        self.upload_dir.join("profiles")
    }
}

fn parse_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn session_age(hours: i64) -> i64 {
    let clamped = hours.clamp(1, MAX_SESSION_AGE_HOURS);
    if clamped != hours {
        warn!("PIXBORD_SESSION_MAX_AGE_HOURS={hours} out of range, using {clamped}");
    }
    clamped
}

fn var_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            warn!("Invalid {key} value {raw:?}, using default");
            default
        }),
        Err(_) => default,
    }
}
