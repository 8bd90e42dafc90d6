//! Signed-cookie sessions.
//!
//! The cookie value is `base64url(json payload) "." hex(hmac-sha256)`. Only the
//! user id and issue time travel in the cookie; callers load the live user
//! record from the store on every request.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::{Config, MAX_SESSION_AGE_HOURS};
use crate::models::models::SessionData;

type HmacSha256 = Hmac<Sha256>;

fn max_age_hours(config: &Config) -> i64 {
    config.session_max_age_hours.clamp(1, MAX_SESSION_AGE_HOURS)
}

fn sign(key: &str, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid session key: {}", e))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn encode(config: &Config, data: &SessionData) -> anyhow::Result<String> {
    let key = config
        .session_keys
        .first()
        .ok_or_else(|| anyhow::anyhow!("no session signing key configured"))?;
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(data)?);
    let signature = sign(key, payload.as_bytes())?;
    Ok(format!("{}.{}", payload, hex::encode(signature)))
}

/// Any defect in the cookie yields `None`.
pub fn decode(config: &Config, value: &str) -> Option<SessionData> {
    let (payload, signature) = value.split_once('.')?;
    let signature = hex::decode(signature).ok()?;

    let verified = config.session_keys.iter().any(|key| {
        sign(key, payload.as_bytes())
            .map(|expected| {
                expected.len() == signature.len() && bool::from(expected.ct_eq(signature.as_slice()))
            })
            .unwrap_or(false)
    });
    if !verified {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let data: SessionData = serde_json::from_slice(&bytes).ok()?;

    let max_age = Duration::hours(max_age_hours(config));
    if Utc::now() - data.issued_at > max_age {
        return None;
    }
    Some(data)
}

pub fn establish_cookie(config: &Config, user_id: &str) -> anyhow::Result<String> {
    let data = SessionData {
        user_id: user_id.to_string(),
        issued_at: Utc::now(),
    };
    Ok(format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.session_name,
        encode(config, &data)?,
        max_age_hours(config) * 3600
    ))
}

pub fn clear_cookie(config: &Config) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.session_name
    )
}
