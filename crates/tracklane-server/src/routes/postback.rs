//! Offer-source postback intake.
//!
//! The raw hit is logged before attribution runs so a postback that fails
//! attribution (e.g. unknown click) is still replayable from the log.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use tracklane_core::click::NewPostbackLog;

use crate::routes::track::attribute_conversion;
use crate::{error::AppError, state::AppState};

/// `GET /postback?clickid=&sum=&currency=&source_id=` — S2S conversion
/// postback from an offer source.
///
/// 404 for an unknown `source_id`, 400 when `clickid` or `sum` is missing
/// or malformed. On success returns `{message, logId}`.
pub async fn receive_postback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let source_id: i64 = params
        .get("source_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("source_id is required".to_string()))?
        .parse()
        .map_err(|_| AppError::BadRequest("source_id must be an integer".to_string()))?;

    let source = state
        .backend
        .offer_source_by_id(source_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("Unknown offer source: {source_id}")))?;

    let click_id = params
        .get("clickid")
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| AppError::BadRequest("clickid is required".to_string()))?;
    let sum: f64 = params
        .get("sum")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("sum is required".to_string()))?
        .parse()
        .map_err(|_| AppError::BadRequest("sum must be numeric".to_string()))?;
    let currency = params.get("currency").filter(|v| !v.is_empty()).cloned();

    let raw_params = serde_json::to_string(&params).unwrap_or_else(|_| "{}".to_string());
    let log_id = state
        .backend
        .log_postback(NewPostbackLog {
            offer_source_id: source.id,
            click_id: click_id.clone(),
            payout: sum,
            currency,
            raw_params: raw_params.clone(),
        })
        .await
        .map_err(AppError::Internal)?;

    let attribution =
        attribute_conversion(&state, &click_id, Some(sum), None, None, Some(raw_params)).await?;

    let message = if attribution.duplicate {
        "duplicate postback ignored"
    } else {
        "conversion recorded"
    };
    Ok(Json(json!({ "message": message, "logId": log_id })))
}
