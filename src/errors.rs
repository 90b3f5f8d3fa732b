use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Application-wide error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Document template is corrupted: {0}")]
    TemplateCorrupted(String),

    #[error("Draft document not found: {0}")]
    DraftNotFound(String),

    #[error("Unknown document type: {0}")]
    WrongDocumentType(String),

    #[error("Report type is not supported yet: {0}")]
    StrategyNotImplemented(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("File operation error: {0}")]
    FileError(String),

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub code: String,
}

impl AppError {
    /// Whether the message is safe to show to the client as is.
    fn is_client_visible(&self) -> bool {
        matches!(
            self,
            AppError::TemplateCorrupted(_)
                | AppError::DraftNotFound(_)
                | AppError::StrategyNotImplemented(_)
                | AppError::Validation(_)
                | AppError::BadRequest(_)
                | AppError::PayloadTooLarge(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::TemplateCorrupted(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DraftNotFound(_) => StatusCode::NOT_FOUND,
            AppError::StrategyNotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_code = match self {
            AppError::TemplateCorrupted(_) => "TEMPLATE_CORRUPTED",
            AppError::DraftNotFound(_) => "DRAFT_NOT_FOUND",
            AppError::WrongDocumentType(_) => "CONFIG_ERROR",
            AppError::StrategyNotImplemented(_) => "NOT_IMPLEMENTED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::FileError(_) => "FILE_ERROR",
            AppError::ImageError(_) => "IMAGE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        };

        let message = if self.is_client_visible() {
            self.to_string()
        } else {
            tracing::error!(error = %self, "Request failed with an internal error");
            "Unexpected server error. Please contact the developers.".to_string()
        };

        let response = ErrorResponse {
            error: error_code.to_string(),
            message,
            details: None,
            code: error_code.to_string(),
        };

        HttpResponse::build(self.status_code()).json(response)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        let errors: Vec<String> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| "Invalid value".to_string())
                    )
                })
            })
            .collect();
        if errors.is_empty() {
            // nested-only failures carry no top level field errors
            AppError::Validation(err.to_string())
        } else {
            AppError::Validation(errors.join(", "))
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::ImageError(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::InternalError(err.to_string())
    }
}

/// Helper type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
