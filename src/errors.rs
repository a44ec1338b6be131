// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Service not configured. Please complete setup first.")]
    NotConfigured,

    #[error("Agent initialization failed. Please check configuration.")]
    AgentUnavailable,

    #[error("{0}")]
    Validation(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent service error: {0}")]
    Agent(String),

    #[error("Vision service error: {0}")]
    Vision(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) | AppError::ImageProcessing(_) => StatusCode::BAD_REQUEST,
            AppError::AgentUnavailable
            | AppError::Config(_)
            | AppError::Agent(_)
            | AppError::Vision(_)
            | AppError::Session(_)
            | AppError::Serialization(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::MessageBody;

    #[test]
    fn validation_message_is_passed_through_verbatim() {
        let err = AppError::Validation("Empty query".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = err.error_response().into_body().try_into_bytes().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Empty query");
    }

    #[test]
    fn gate_errors_map_to_expected_status() {
        assert_eq!(
            AppError::NotConfigured.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::AgentUnavailable.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::ImageProcessing("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
