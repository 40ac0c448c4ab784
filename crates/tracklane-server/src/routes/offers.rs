use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use tracklane_core::entities::CreateOfferParams;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub name: String,
    /// Tracking URL template; may contain `{click_id}`, `{sub1}`, ...
    pub url: String,
    pub payout: Option<f64>,
    pub offer_source_id: Option<i64>,
}

/// `POST /api/offers` — Create an offer.
pub async fn create_offer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOfferRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    if req.url.is_empty() {
        return Err(AppError::BadRequest("url is required".to_string()));
    }
    if let Some(id) = req.offer_source_id {
        state
            .backend
            .offer_source_by_id(id)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| AppError::BadRequest(format!("offer source {id} does not exist")))?;
    }

    let offer = state
        .backend
        .create_offer(CreateOfferParams {
            name: req.name,
            url: req.url,
            payout: req.payout.unwrap_or(0.0),
            offer_source_id: req.offer_source_id,
        })
        .await
        .map_err(AppError::Internal)?;

    Ok((StatusCode::CREATED, Json(json!({ "data": offer }))))
}

/// `GET /api/offers` — List all offers.
pub async fn list_offers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let offers = state
        .backend
        .list_offers()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": offers })))
}

/// `GET /api/offers/{id}` — Fetch one offer.
pub async fn get_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let offer = state
        .backend
        .offer_by_id(id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Offer not found".to_string()))?;
    Ok(Json(json!({ "data": offer })))
}
