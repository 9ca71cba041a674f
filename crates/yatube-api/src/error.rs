use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;
use validator::ValidationErrors;

use yatube_types::api::{FieldErrors, FormErrorResponse};

/// Per-request failures. Redirect outcomes (login required, editing someone
/// else's post) are ordinary responses and never pass through here.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("invalid form input")]
    Validation(FormErrorResponse),

    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Rejects `form`, echoing it back with the messages from `errors`.
    pub fn validation<F: Serialize>(form: &F, errors: &ValidationErrors) -> Self {
        Self::Validation(FormErrorResponse {
            form: serde_json::to_value(form).unwrap_or_default(),
            errors: field_errors(errors),
        })
    }
}

/// An unreadable form body is reported like any other invalid form, under
/// the `body` key, with nothing to echo back.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert("body".into(), vec![rejection.body_text()]);
        Self::Validation(FormErrorResponse {
            form: serde_json::Value::Null,
            errors,
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND.into_response(),
            AppError::Validation(body) => (StatusCode::BAD_REQUEST, Json(body)).into_response(),
            AppError::Conflict(what) => {
                (StatusCode::CONFLICT, Json(serde_json::json!({ "error": what }))).into_response()
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            AppError::Internal(e) => {
                error!("Internal error: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}
