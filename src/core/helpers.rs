use std::collections::HashSet;
use std::sync::OnceLock;

use ammonia::Builder;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use regex::Regex;
use serde::Serialize;
use spin_sdk::http::Response;
use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
            .expect("Regex should compile")
    })
}

pub fn is_email(value: &str) -> bool {
    value.len() <= 254 && email_regex().is_match(value)
}

pub fn is_alphanumeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Strip all markup and decode entities. The result is plain text and must be
/// escaped when rendered.
pub fn sanitize_text(text: &str) -> String {
    let cleaned = Builder::default().tags(HashSet::new()).clean(text).to_string();
    html_escape::decode_html_entities(&cleaned).trim().to_string()
}

pub fn json_response<T: Serialize>(status: u16, value: &T) -> anyhow::Result<Response> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(serde_json::to_vec(value)?)
        .build())
}

pub fn html_response(html: String) -> Response {
    Response::builder()
        .status(200)
        .header("content-type", "text/html; charset=utf-8")
        .body(html.into_bytes())
        .build()
}

pub fn redirect(location: &str) -> Response {
    Response::builder()
        .status(303)
        .header("location", location)
        .body(Vec::new())
        .build()
}
