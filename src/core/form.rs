use std::collections::HashMap;

use spin_sdk::http::Request;

use crate::core::errors::ApiError;

/// Text fields of a submitted form, regardless of how the body was encoded.
#[derive(Debug, Default, Clone)]
pub struct FormData {
    fields: HashMap<String, String>,
}

impl FormData {
    /// Parse a JSON object or an `application/x-www-form-urlencoded` body,
    /// chosen by the request content type.
    pub fn from_request(req: &Request) -> Result<Self, ApiError> {
        let content_type = header_str(req, "content-type").unwrap_or_default();
        if content_type.starts_with("application/json") {
            Self::from_json(req.body())
                .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
        } else {
            Ok(Self::from_urlencoded(&String::from_utf8_lossy(req.body())))
        }
    }

    pub fn from_json(body: &[u8]) -> anyhow::Result<Self> {
        if body.is_empty() {
            return Ok(Self::default());
        }
        let value: serde_json::Value = serde_json::from_slice(body)?;
        let mut fields = HashMap::new();
        if let Some(object) = value.as_object() {
            for (key, value) in object {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => continue,
                    other => other.to_string(),
                };
                fields.insert(key.clone(), text);
            }
        }
        Ok(Self { fields })
    }

    /// Multiple values for the same key are not supported (only the last is kept).
    pub fn from_urlencoded(body: &str) -> Self {
        let mut fields = HashMap::new();
        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match pair.find('=') {
                Some(idx) => (&pair[..idx], &pair[idx + 1..]),
                None => (pair, ""),
            };
            fields.insert(decode_component(key), decode_component(value));
        }
        Self { fields }
    }

    pub fn insert(&mut self, key: &str, value: String) {
        self.fields.insert(key.to_string(), value);
    }

    /// Missing fields read as empty.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

pub fn header_str<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.header(name).and_then(|h| h.as_str())
}

/// Value of a single cookie from the `Cookie` header.
pub fn cookie_value(req: &Request, name: &str) -> Option<String> {
    let header = header_str(req, "cookie")?;
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
