// Route exports
pub mod chat;

use actix_web::{error, http::StatusCode, web, HttpRequest, HttpResponse, ResponseError};
use crate::core::QueryError;
use crate::models::ErrorResponse;

pub use chat::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(chat::configure);
}

/// JSON extractor settings shared by the server and tests
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(handle_json_payload_error)
}

impl ResponseError for QueryError {
    fn status_code(&self) -> StatusCode {
        match self {
            QueryError::EmptyQuery => StatusCode::BAD_REQUEST,
            QueryError::UnsafeSql(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QueryError::Translation(_) => StatusCode::BAD_GATEWAY,
            QueryError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            QueryError::Database(_) | QueryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            detail: self.to_string(),
            error: self.code().to_string(),
        })
    }
}

/// Rejected request body
#[derive(Debug)]
pub struct PayloadRejection {
    pub status: StatusCode,
    pub error: &'static str,
    pub detail: String,
}

impl std::fmt::Display for PayloadRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.detail)
    }
}

impl std::error::Error for PayloadRejection {}

impl ResponseError for PayloadRejection {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(ErrorResponse {
            detail: self.detail.clone(),
            error: self.error.to_string(),
        })
    }
}

/// Handle JSON payload errors
///
/// Syntax errors are 400; well-formed JSON of the wrong shape (missing
/// `query`, non-string `query`) is 422.
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);

    let (status, code) = match &err {
        error::JsonPayloadError::Deserialize(e) if e.is_data() => {
            (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
        }
        error::JsonPayloadError::ContentType => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type"),
        error::JsonPayloadError::Overflow { .. } | error::JsonPayloadError::OverflowKnownLength { .. } => {
            (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large")
        }
        _ => (StatusCode::BAD_REQUEST, "invalid_json"),
    };

    PayloadRejection {
        status,
        error: code,
        detail: err.to_string(),
    }
    .into()
}
