use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum ProfileError {
    #[error("Profile not found")]
    NotFound,

    #[error("Profile {0} already exists")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for ProfileError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl IntoResponse for ProfileError {
    fn into_response(self) -> Response {
        error!("{}", self);
        let status = match &self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}
