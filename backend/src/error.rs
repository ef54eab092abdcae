use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::service::ServiceError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{context}")]
    Internal {
        context: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("Decryption failed")]
    Decryption(#[source] ServiceError),
}

impl AppError {
    /// Maps a service failure onto the route's generic 500 message.
    pub fn from_service(err: ServiceError, context: &'static str) -> Self {
        match err {
            ServiceError::Invalid(msg) => AppError::BadRequest(msg),
            err @ ServiceError::Crypto(_) if err.is_decryption() => AppError::Decryption(err),
            err => AppError::Internal {
                context,
                source: err,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal { context, source } => {
                log::error!("{}: {}", context, source);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Decryption(source) => {
                log::error!("Decryption failed: {}", source);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
