use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// One entry of a 4xx/5xx error list: which input failed, how, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

impl FieldError {
    pub fn new(
        source: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            kind: kind.into(),
            description: description.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid token")]
    Forbidden,

    #[error("request validation failed")]
    Validation(Vec<FieldError>),

    #[error("token carries no known user")]
    MissingUserData,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0:?}")]
    Conflict(FieldError),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("database error: {0:#}")]
    Database(#[from] anyhow::Error),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "source": "token",
                    "type": "MISSING_JWT_TOKEN",
                    "message": "JWT Authentication token is not specified, expired or contains wrong data",
                })),
            )
                .into_response(),
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::MissingUserData => (
                StatusCode::BAD_REQUEST,
                Json(vec![FieldError::new(
                    "token",
                    "value_error.missing_user_data",
                    "token does not contain email and password of an existing user",
                )]),
            )
                .into_response(),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(vec![FieldError::new(
                    what,
                    "value_error.not_found",
                    format!("{what} not found"),
                )]),
            )
                .into_response(),
            ApiError::Conflict(err) => (StatusCode::CONFLICT, Json(vec![err])).into_response(),
            ApiError::MalformedBody(msg) => (
                StatusCode::BAD_REQUEST,
                Json(vec![FieldError::new("body", "value_error.body", msg)]),
            )
                .into_response(),
            ApiError::Database(e) => {
                error!(error = %format!("{e:#}"), "database failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(vec![FieldError::new(
                        "database",
                        "server_error.database",
                        "database error, please try again later",
                    )]),
                )
                    .into_response()
            }
            ApiError::Storage(e) => {
                error!(error = %format!("{e:#}"), "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(vec![FieldError::new(
                        "image",
                        "server_error.storage",
                        "image could not be stored, please try again later",
                    )]),
                )
                    .into_response()
            }
            ApiError::Internal(e) => {
                error!(error = %format!("{e:#}"), "internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(vec![FieldError::new(
                        "server",
                        "server_error.internal",
                        "internal error, please try again later",
                    )]),
                )
                    .into_response()
            }
        }
    }
}
