use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use tracklane_core::entities::CreateOfferSourceParams;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateOfferSourceRequest {
    pub name: String,
    /// Fallback payout used when neither the postback nor the offer carries
    /// one.
    pub payout: Option<f64>,
}

/// `POST /api/offer-sources` — Create an offer source (affiliate network).
pub async fn create_offer_source(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOfferSourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let source = state
        .backend
        .create_offer_source(CreateOfferSourceParams {
            name: req.name,
            payout: req.payout.unwrap_or(0.0),
        })
        .await
        .map_err(AppError::Internal)?;

    Ok((StatusCode::CREATED, Json(json!({ "data": source }))))
}

/// `GET /api/offer-sources` — List all offer sources.
pub async fn list_offer_sources(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let sources = state
        .backend
        .list_offer_sources()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": sources })))
}

/// `GET /api/offer-sources/{id}` — Fetch one offer source.
pub async fn get_offer_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let source = state
        .backend
        .offer_source_by_id(id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Offer source not found".to_string()))?;
    Ok(Json(json!({ "data": source })))
}
