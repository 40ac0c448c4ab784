use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use tracklane_core::click::SUB_COUNT;
use tracklane_core::entities::CreateCampaignParams;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub traffic_channel_id: Option<i64>,
    pub lander_id: Option<i64>,
    pub offer_id: Option<i64>,
    #[serde(default)]
    pub direct_linking: bool,
    pub is_active: Option<bool>,
}

/// `POST /api/campaigns` — Create a campaign.
///
/// The response carries the generated `unique_id` and the constructed
/// promoting URL — the link to hand to the traffic channel, with the
/// channel's own sub-parameter names already in place.
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let channel = match req.traffic_channel_id {
        Some(id) => Some(
            state
                .backend
                .traffic_channel_by_id(id)
                .await
                .map_err(AppError::Internal)?
                .ok_or_else(|| {
                    AppError::BadRequest(format!("traffic channel {id} does not exist"))
                })?,
        ),
        None => None,
    };
    if let Some(id) = req.lander_id {
        state
            .backend
            .lander_by_id(id)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| AppError::BadRequest(format!("lander {id} does not exist")))?;
    }
    if let Some(id) = req.offer_id {
        state
            .backend
            .offer_by_id(id)
            .await
            .map_err(AppError::Internal)?
            .ok_or_else(|| AppError::BadRequest(format!("offer {id} does not exist")))?;
    }

    // Promoting URL template: the backend substitutes {unique_id} once the
    // token is generated. Sub parameters are emitted under the channel's
    // own names so the ad platform fills them with its macros.
    let mut promoting_url = format!(
        "{}/track/click?unique_id={{unique_id}}",
        state.config.public_url
    );
    if let Some(channel) = &channel {
        promoting_url.push_str(&format!("&tc={}", channel.id));
        if let Some(mf) = &channel.macro_format {
            for n in 1..=SUB_COUNT {
                let canonical = format!("sub{n}");
                if let Some(param) = mf.get(&canonical) {
                    promoting_url.push_str(&format!("&{param}={{{canonical}}}"));
                }
            }
        }
    }

    let campaign = state
        .backend
        .create_campaign(CreateCampaignParams {
            name: req.name,
            traffic_channel_id: channel.as_ref().map(|c| c.id),
            lander_id: req.lander_id,
            offer_id: req.offer_id,
            direct_linking: req.direct_linking,
            is_active: req.is_active.unwrap_or(true),
            promoting_url,
        })
        .await
        .map_err(AppError::Internal)?;

    Ok((StatusCode::CREATED, Json(json!({ "data": campaign }))))
}

/// `GET /api/campaigns` — List all campaigns.
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let campaigns = state
        .backend
        .list_campaigns()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "data": campaigns })))
}

/// `GET /api/campaigns/{unique_id}` — Fetch one campaign by its public
/// token.
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(unique_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let campaign = state
        .backend
        .campaign_by_unique_id(&unique_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;
    Ok(Json(json!({ "data": campaign })))
}
