use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use tracklane_core::entities::CreateTrafficChannelParams;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    /// Canonical sub name → this channel's query-parameter name.
    pub macro_format: Option<HashMap<String, String>>,
    pub postback_url: Option<String>,
    pub cost_per_click: Option<f64>,
}

/// `POST /api/channels` — Create a traffic channel.
pub async fn create_channel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    let cost_per_click = req.cost_per_click.unwrap_or(0.0);
    if cost_per_click < 0.0 {
        return Err(AppError::BadRequest(
            "cost_per_click cannot be negative".to_string(),
        ));
    }

    let channel = state
        .backend
        .create_traffic_channel(CreateTrafficChannelParams {
            name: req.name,
            macro_format: req.macro_format,
            postback_url: req.postback_url,
            cost_per_click,
        })
        .await
        .map_err(AppError::Internal)?;

    Ok((StatusCode::CREATED, Json(json!({ "data": channel }))))
}

/// `GET /api/channels` — List all traffic channels.
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let channels = state
        .backend
        .list_traffic_channels()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": channels })))
}

/// `GET /api/channels/{id}` — Fetch one traffic channel.
pub async fn get_channel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let channel = state
        .backend
        .traffic_channel_by_id(id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Traffic channel not found".to_string()))?;
    Ok(Json(json!({ "data": channel })))
}
