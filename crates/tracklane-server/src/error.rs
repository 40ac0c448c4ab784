use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use tracklane_core::error::TrackError;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("offer mismatch: {0}")]
    OfferMismatch(String),

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TrackError> for AppError {
    fn from(err: TrackError) -> Self {
        match err {
            TrackError::Validation(msg) => Self::BadRequest(msg),
            TrackError::NotFound(msg) => Self::NotFound(msg),
            TrackError::OfferMismatch { expected, got } => Self::OfferMismatch(format!(
                "click is bound to offer {expected:?}, request names {got}"
            )),
            TrackError::InvalidTemplate(tpl) => Self::InvalidTemplate(tpl),
            TrackError::NoRedirectTarget(campaign) => {
                Self::NotFound(format!("campaign {campaign} has no redirect target"))
            }
            TrackError::Upstream(msg) => Self::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            AppError::OfferMismatch(msg) => {
                (StatusCode::BAD_REQUEST, "offer_mismatch", msg.clone())
            }
            AppError::InvalidTemplate(tpl) => {
                tracing::error!(template = %tpl, "macro resolution produced an unparseable URL");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "invalid_template",
                    "Destination template is not a valid URL".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                    "field": null
                }
            })),
        )
            .into_response()
    }
}
