use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use palaver_shared::{Rejection, ThreadError};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Content failed the moderation filter; the reason is user-facing.
    #[error("{0}")]
    Moderation(#[from] Rejection),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthorized,

    #[error("only the author or an admin may do that")]
    Forbidden,

    /// A concurrent write bumped the post's revision first.
    #[error("the post changed underneath this write, reload and retry")]
    Conflict,

    #[error("wait a little before posting again")]
    Cooldown,

    #[error("{0}")]
    BadRequest(String),

    #[error("metadata service unavailable")]
    Upstream,

    #[error("internal error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Moderation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Cooldown => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream => StatusCode::BAD_GATEWAY,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

impl From<ThreadError> for AppError {
    fn from(e: ThreadError) -> Self {
        match e {
            ThreadError::NotFound => AppError::NotFound("content"),
            ThreadError::Forbidden => AppError::Forbidden,
            ThreadError::TooManyTags => {
                AppError::BadRequest("a post carries at most three tags".into())
            }
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound("record"),
            other => {
                error!("database error: {other}");
                AppError::Internal
            }
        }
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        error!("connection pool error: {e}");
        AppError::Internal
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        error!("document (de)serialization error: {e}");
        AppError::Internal
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        error!("blocking task failed: {e}");
        AppError::Internal
    }
}
