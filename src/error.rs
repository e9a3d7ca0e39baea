use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why a bearer token was refused. Callers treat every kind the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("token subject is missing or unknown")]
    MissingSubject,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store round-trip timed out")]
    Timeout,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("username already exists")]
    DuplicateUser,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DuplicateUser => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Auth kinds and server faults are
    /// collapsed so the body never says which check failed.
    pub fn detail(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::DuplicateUser => "Username already exists".to_string(),
            Self::InvalidCredentials => "Invalid credentials".to_string(),
            Self::Auth(_) => "Invalid auth".to_string(),
            Self::NotFound => "Not found".to_string(),
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Auth(kind) => tracing::debug!(%kind, "rejected bearer token"),
            Self::Store(err) => tracing::error!(error = %err, "store failure"),
            Self::Internal(msg) => tracing::error!(%msg, "internal failure"),
            _ => {}
        }

        let status = self.status();
        let mut response = (status, Json(json!({ "detail": self.detail() }))).into_response();
        if matches!(self, Self::Auth(_)) {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
