use http::StatusCode;
use spin_sdk::http::Response;

use crate::models::models::FieldError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Internal Error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::Forbidden => "Forbidden".to_string(),
            // Store details never reach the client.
            ApiError::InternalError(_) => "Internal server error".to_string(),
        }
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        let body = serde_json::json!({ "error": err.message() });
        Response::builder()
            .status(err.status().as_u16())
            .header("content-type", "application/json")
            .body(body.to_string().into_bytes())
            .build()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

/// Accumulates every failed rule instead of stopping at the first one.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, param: &str, msg: &str) {
        if !ok {
            self.errors.push(FieldError::new(param, msg));
        }
    }

    pub fn push(&mut self, param: &str, msg: &str) {
        self.errors.push(FieldError::new(param, msg));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.errors
    }

    /// `{"errors": [...]}` with a 200 status, the shape form pages read.
    pub fn into_response(self) -> Response {
        let body = serde_json::json!({ "errors": self.errors });
        Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .body(body.to_string().into_bytes())
            .build()
    }
}
