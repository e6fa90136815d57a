use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::{ReloadError, SearchError};

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// API错误类型
pub enum AppError {
    Search(SearchError),
    Unauthorized,
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Search(e @ SearchError::InvalidImage(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
            Self::Search(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "无效的 token").into_response(),
            Self::Internal(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Something went wrong: {}", e))
                    .into_response()
            }
        }
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        Self::Search(err)
    }
}

impl From<ReloadError> for AppError {
    fn from(err: ReloadError) -> Self {
        match err {
            ReloadError::ModelUnavailable => Self::Search(SearchError::IndexUnavailable),
            e => Self::Internal(e.into()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}
