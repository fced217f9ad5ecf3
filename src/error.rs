use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError, export::ExportError, gateway::GatewayError, state::ContestError,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Expected outcome of the competition core (not found, window, ...).
    #[error(transparent)]
    Contest(#[from] ContestError),
    /// Invalid input provided by the invoker.
    #[error("{0}")]
    InvalidInput(String),
    /// A channel or role the command relies on was never configured.
    #[error("{0}")]
    MissingConfiguration(String),
    /// The chat platform call failed.
    #[error("gateway failure")]
    Gateway(#[from] GatewayError),
    /// The export sink failed.
    #[error("export failure")]
    Export(#[from] ExportError),
    /// Storage backend failure.
    #[error("storage unavailable")]
    Storage(#[from] StorageError),
}

impl ServiceError {
    /// Whether the error is a regular outcome reported verbatim to the invoker.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ServiceError::Contest(_)
                | ServiceError::InvalidInput(_)
                | ServiceError::MissingConfiguration(_)
        )
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Contest(inner) => AppError::BadRequest(inner.to_string()),
            ServiceError::InvalidInput(message) | ServiceError::MissingConfiguration(message) => {
                AppError::BadRequest(message)
            }
            ServiceError::Storage(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Gateway(source) => AppError::Internal(source.to_string()),
            ServiceError::Export(source) => AppError::Internal(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
