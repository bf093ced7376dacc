use axum::{
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::Envelope;
use crate::preview::PreviewError;

/// Errors surfaced to HTTP clients.
///
/// Every variant renders as a `200 OK` envelope with `status: false`; the
/// status code never signals a logical failure.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Preview(#[from] PreviewError),
}

impl AppError {
    /// The text placed in the envelope's `message`.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::NotSupported(path) => format!("This url {path} is not supported."),
            AppError::Preview(PreviewError::Fetch(e)) => e.to_string(),
            AppError::Preview(PreviewError::Cache(_)) => "Cache error".into(),
            AppError::Preview(PreviewError::Extract(_)) => "Internal server error".into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Preview(PreviewError::Cache(e)) => {
                tracing::error!("Cache error: {:?}", e);
            }
            AppError::Preview(PreviewError::Extract(e)) => {
                tracing::error!("Extraction task failed: {:?}", e);
            }
            _ => {}
        }

        Json(Envelope::<()>::error(self.client_message())).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
