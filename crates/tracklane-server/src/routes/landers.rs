use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use tracklane_core::entities::CreateLanderParams;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateLanderRequest {
    pub name: String,
    pub url: String,
}

/// `POST /api/landers` — Create a landing page.
pub async fn create_lander(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLanderRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    if url::Url::parse(&req.url).is_err() {
        return Err(AppError::BadRequest("url must be a valid URL".to_string()));
    }

    let lander = state
        .backend
        .create_lander(CreateLanderParams {
            name: req.name,
            url: req.url,
        })
        .await
        .map_err(AppError::Internal)?;

    Ok((StatusCode::CREATED, Json(json!({ "data": lander }))))
}

/// `GET /api/landers` — List all landing pages.
pub async fn list_landers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let landers = state
        .backend
        .list_landers()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": landers })))
}

/// `GET /api/landers/{id}` — Fetch one landing page.
pub async fn get_lander(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let lander = state
        .backend
        .lander_by_id(id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Lander not found".to_string()))?;
    Ok(Json(json!({ "data": lander })))
}
