use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use tracklane_core::metrics::{ReportDimension, ReportEntry};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub dimension: Option<String>,
}

/// `GET /api/reports?startDate=&endDate=&dimension=` — aggregated metrics.
///
/// Dates are `YYYY-MM-DD`, defaulting to the last 30 days. `dimension` is
/// one of `campaign|traffic_channel|lander|offer|day|hour|country`
/// (default `campaign`). Returns `{summary, breakdown}` where both carry
/// every counter and derived ratio; ratios are re-derived from the summed
/// counters of the window, never averaged.
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let today = chrono::Utc::now().date_naive();
    let start_date = parse_date(query.start_date.as_deref(), "startDate")?
        .unwrap_or_else(|| today - chrono::Duration::days(29));
    let end_date = parse_date(query.end_date.as_deref(), "endDate")?.unwrap_or(today);
    if end_date < start_date {
        return Err(AppError::BadRequest(
            "endDate must be on or after startDate".to_string(),
        ));
    }

    let dimension = match query.dimension.as_deref() {
        None | Some("") => ReportDimension::Campaign,
        Some(raw) => ReportDimension::parse(raw).ok_or_else(|| {
            AppError::BadRequest(
                "dimension must be one of: campaign, traffic_channel, lander, offer, day, hour, country"
                    .to_string(),
            )
        })?,
    };

    let summary = state
        .backend
        .metrics_summary(start_date, end_date)
        .await
        .map_err(AppError::Internal)?;
    let breakdown = state
        .backend
        .metrics_breakdown(dimension, start_date, end_date)
        .await
        .map_err(AppError::Internal)?;

    let breakdown: Vec<serde_json::Value> = breakdown
        .into_iter()
        .map(|row| {
            let entry = ReportEntry::from(row.counters);
            json!({ "key": row.key, "label": row.label, "metrics": entry })
        })
        .collect();

    Ok(Json(json!({
        "summary": ReportEntry::from(summary),
        "breakdown": breakdown,
    })))
}

fn parse_date(raw: Option<&str>, name: &str) -> Result<Option<NaiveDate>, AppError> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{name} must be YYYY-MM-DD"))),
    }
}
