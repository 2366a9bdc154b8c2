use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use linktrack_core::ShortenerError;
use linktrack_redirector::RedirectorError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
    #[error(transparent)]
    Redirector(#[from] RedirectorError),
    #[error("{0}")]
    BadRequest(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("link has been deactivated: {0}")]
    Gone(String),
    #[error("{0}")]
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Shortener(err) => match err {
                ShortenerError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "invalid_url"),
                ShortenerError::InvalidShortCode(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_short_code")
                }
                ShortenerError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                ShortenerError::CodeTaken(_) => (StatusCode::CONFLICT, "code_taken"),
                ShortenerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                ShortenerError::AllocationExhausted { .. } | ShortenerError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                }
            },
            AppError::Redirector(err) => match err {
                RedirectorError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                RedirectorError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Gone(_) => (StatusCode::GONE, "gone"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.parts();
        // server-side details stay in the log
        let message = if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                error: kind,
                message,
            }),
        )
            .into_response()
    }
}
