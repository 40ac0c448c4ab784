//! The tracking funnel: click → lander view → lander click → conversion,
//! plus the impression pixel.
//!
//! Ordering discipline on the click path: the click row is persisted
//! *before* redirect resolution, and neither a metrics failure nor a
//! missing redirect target ever undoes it. Metrics and postback failures
//! are logged and swallowed — the visitor-facing response must not depend
//! on rollup writes.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use tracklane_core::click::{extract_subs, Click, ClickMacro, NewConversion};
use tracklane_core::entities::{Campaign, Offer, TrafficChannel};
use tracklane_core::error::TrackError;
use tracklane_core::macros::{MacroKey, MacroValues};
use tracklane_core::metrics::{Amounts, Dimensions, EventKind};
use tracklane_core::redirect::{build_offer_url, resolve_target};
use tracklane_core::useragent::parse_user_agent;

use crate::{error::AppError, state::AppState};

/// `GET /track/click?unique_id=&tc=&sub1..sub23=` — the tracking link.
///
/// Resolves the campaign, persists the click + macro row, increments click
/// metrics, then 302s to the lander (or straight to the offer when direct
/// linking is on). 404 when the campaign is unknown/inactive or has no
/// destination — in the latter case the click row is still kept.
pub async fn track_click(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let unique_id = params
        .get("unique_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("unique_id is required".to_string()))?;

    let campaign = state
        .backend
        .campaign_by_unique_id(unique_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("Unknown campaign: {unique_id}")))?;
    if !campaign.is_active {
        return Err(AppError::NotFound(format!(
            "Campaign {unique_id} is not active"
        )));
    }

    let channel = resolve_channel(&state, &campaign, params.get("tc")).await;
    let lander = match campaign.lander_id.filter(|_| !campaign.direct_linking) {
        Some(id) => state
            .backend
            .lander_by_id(id)
            .await
            .map_err(AppError::Internal)?,
        None => None,
    };
    let offer = match campaign.offer_id {
        Some(id) => state
            .backend
            .offer_by_id(id)
            .await
            .map_err(AppError::Internal)?,
        None => None,
    };

    // --- capture request context ---
    let ip = client_ip(&headers);
    let user_agent = header_value(&headers, header::USER_AGENT);
    let referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ua = parse_user_agent(&user_agent);
    let geo = state.geo.lookup(&ip);

    let cost = channel.as_ref().map(|c| c.cost_per_click).unwrap_or(0.0);
    let click_id = format!("clk_{}", uuid::Uuid::new_v4().simple());

    let click = Click {
        click_id: click_id.clone(),
        campaign_id: Some(campaign.id),
        traffic_channel_id: channel.as_ref().map(|c| c.id),
        lander_id: lander.as_ref().map(|l| l.id),
        offer_id: offer.as_ref().map(|o| o.id),
        offer_source_id: offer.as_ref().and_then(|o| o.offer_source_id),
        ip,
        user_agent,
        referer,
        device: ua.device,
        os: ua.os,
        browser: ua.browser,
        country: geo.country,
        region: geo.region,
        city: geo.city,
        landing_page_viewed: false,
        lp_view_time: None,
        conversion: false,
        conversion_time: None,
        revenue: 0.0,
        cost,
        profit: -cost,
        created_at: Utc::now(),
    };

    let subs = extract_subs(&params, channel.as_ref().and_then(|c| c.macro_format.as_ref()));
    let click_macro = ClickMacro {
        click_id: click_id.clone(),
        campaign_name: Some(campaign.name.clone()),
        traffic_channel_name: channel.as_ref().map(|c| c.name.clone()),
        offer_name: offer.as_ref().map(|o| o.name.clone()),
        subs: subs.clone(),
    };

    state
        .backend
        .insert_click(&click, Some(&click_macro))
        .await
        .map_err(AppError::Internal)?;

    record_metrics(
        &state,
        EventKind::Click,
        &dims_from_click(&click),
        &Amounts {
            count: 1,
            revenue: 0.0,
            cost,
        },
    )
    .await;

    let values = MacroValues::from_click(&click, Some(&click_macro));
    match resolve_target(
        &campaign,
        lander.as_ref(),
        offer.as_ref(),
        &click_id,
        &subs,
        &values,
    ) {
        Ok(target) => Ok(found(target.url())),
        Err(e) => Err(AppError::from(e)),
    }
}

/// `GET /track/impression?unique_id=&tc=` — impression pixel. Counts only;
/// no click row is created.
pub async fn track_impression(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let unique_id = params
        .get("unique_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("unique_id is required".to_string()))?;

    let campaign = state
        .backend
        .campaign_by_unique_id(unique_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("Unknown campaign: {unique_id}")))?;

    let channel = resolve_channel(&state, &campaign, params.get("tc")).await;
    let dims = Dimensions {
        campaign_id: Some(campaign.id),
        traffic_channel_id: channel.as_ref().map(|c| c.id),
        ..Default::default()
    };
    record_metrics(&state, EventKind::Impression, &dims, &Amounts::default()).await;

    Ok(Json(json!({ "success": true })))
}

/// `GET /track/lander?click_id=` — landing-page view beacon.
///
/// Sets `landing_page_viewed` once; repeat beacons for the same click are
/// accepted but do not re-increment lpview counters.
pub async fn track_lander_view(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let click_id = required_param(&params, "click_id")?;

    let click = state
        .backend
        .click_by_id(&click_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("Unknown click: {click_id}")))?;

    let first_view = state
        .backend
        .mark_lander_view(&click_id)
        .await
        .map_err(AppError::Internal)?;
    if first_view {
        record_metrics(
            &state,
            EventKind::LpView,
            &dims_from_click(&click),
            &Amounts::default(),
        )
        .await;
    }

    Ok(Json(json!({ "success": true })))
}

/// `GET /track/lpclick?click_id=` — the visitor clicked through from the
/// lander; 302 to the offer URL resolved the same way as direct linking.
pub async fn track_lander_click(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let click_id = required_param(&params, "click_id")?;

    let click = state
        .backend
        .click_by_id(&click_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("Unknown click: {click_id}")))?;

    let offer = resolve_click_offer(&state, &click.offer_id, &click.campaign_id).await?;
    let Some(offer) = offer else {
        return Err(AppError::NotFound(format!(
            "click {click_id} has no offer to redirect to"
        )));
    };

    record_metrics(
        &state,
        EventKind::LpClick,
        &dims_from_click(&click),
        &Amounts::default(),
    )
    .await;

    let click_macro = state
        .backend
        .click_macro_by_id(&click_id)
        .await
        .unwrap_or_else(|e| {
            warn!(click_id = %click_id, error = %e, "macro row lookup failed");
            None
        });
    let values = MacroValues::from_click(&click, click_macro.as_ref());
    let url = build_offer_url(&offer.url, &values).map_err(AppError::from)?;
    Ok(found(&url))
}

/// `GET /track/conversion?click_id=&payout=&offer_id=` — conversion
/// postback from the offer side of the funnel.
pub async fn track_conversion(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let click_id = required_param(&params, "click_id")?;
    let payout = optional_f64(&params, "payout")?;
    let offer_id = optional_i64(&params, "offer_id")?;

    let attribution = attribute_conversion(&state, &click_id, payout, offer_id, None, None).await?;

    Ok(Json(json!({
        "success": true,
        "click_id": attribution.click_id,
        "conversion_id": attribution.conversion_id,
        "revenue": attribution.revenue,
        "profit": attribution.profit,
        "duplicate": attribution.duplicate,
    })))
}

/// The result of one attribution call. `duplicate` marks a repeat call that
/// returned the original conversion unchanged.
pub(crate) struct Attribution {
    pub conversion_id: String,
    pub click_id: String,
    pub revenue: f64,
    pub profit: f64,
    pub duplicate: bool,
}

/// Correlate a conversion back to its click.
///
/// Idempotent per click: the conversion log is insert-or-return-existing on
/// `click_id`, so retried postbacks (at-least-once delivery from ad
/// networks) neither double-count revenue nor re-fire outbound postbacks.
///
/// Revenue resolution order: explicit payout → offer payout → offer-source
/// payout → zero.
pub(crate) async fn attribute_conversion(
    state: &Arc<AppState>,
    click_id: &str,
    explicit_payout: Option<f64>,
    offer_id: Option<i64>,
    event_name: Option<String>,
    metadata: Option<String>,
) -> Result<Attribution, AppError> {
    let click = state
        .backend
        .click_by_id(click_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("Unknown click: {click_id}")))?;

    // Reject cross-offer attribution: the postback must name the offer the
    // click was actually recorded against, or none at all.
    if let Some(got) = offer_id {
        if click.offer_id != Some(got) {
            return Err(AppError::from(TrackError::OfferMismatch {
                expected: click.offer_id,
                got,
            }));
        }
    }

    let revenue = match explicit_payout {
        Some(p) => p,
        None => resolve_fallback_payout(state, &click.offer_id, &click.offer_source_id).await?,
    };

    let (conversion, created) = state
        .backend
        .record_conversion(NewConversion {
            click_id: click_id.to_string(),
            payout: revenue,
            revenue,
            event_name,
            metadata,
        })
        .await
        .map_err(AppError::Internal)?;

    if !created {
        // Repeat call: return the original attribution unchanged.
        return Ok(Attribution {
            conversion_id: conversion.id,
            click_id: click_id.to_string(),
            revenue: conversion.revenue,
            profit: conversion.revenue - click.cost,
            duplicate: true,
        });
    }

    let click = state
        .backend
        .apply_conversion(click_id, revenue)
        .await
        .map_err(AppError::Internal)?;

    record_metrics(
        state,
        EventKind::Conversion,
        &dims_from_click(&click),
        &Amounts {
            count: 1,
            revenue,
            cost: 0.0,
        },
    )
    .await;

    dispatch_postback(state, &click, &conversion.id, revenue).await;

    Ok(Attribution {
        conversion_id: conversion.id,
        click_id: click_id.to_string(),
        revenue: click.revenue,
        profit: click.profit,
        duplicate: false,
    })
}

/// Build the traffic-channel postback URL and hand it to the forwarder.
/// Fire-and-forget: any failure here is logged and the attribution response
/// is unaffected.
async fn dispatch_postback(
    state: &Arc<AppState>,
    click: &Click,
    conversion_id: &str,
    revenue: f64,
) {
    let Some(channel_id) = click.traffic_channel_id else {
        return;
    };
    let channel = match state.backend.traffic_channel_by_id(channel_id).await {
        Ok(Some(channel)) => channel,
        Ok(None) => return,
        Err(e) => {
            warn!(click_id = %click.click_id, error = %e, "channel lookup failed for postback");
            return;
        }
    };
    let Some(template) = channel.postback_url.as_deref().filter(|t| !t.is_empty()) else {
        return;
    };

    let click_macro = state
        .backend
        .click_macro_by_id(&click.click_id)
        .await
        .unwrap_or_else(|e| {
            warn!(click_id = %click.click_id, error = %e, "macro row lookup failed for postback");
            None
        });
    let mut values = MacroValues::from_click(click, click_macro.as_ref());
    values.set(MacroKey::Payout, format_money(revenue));
    let url = tracklane_core::macros::resolve(template, &values);

    state.forwarder.enqueue(crate::forwarder::PostbackJob {
        conversion_id: conversion_id.to_string(),
        url,
    });
}

async fn resolve_fallback_payout(
    state: &Arc<AppState>,
    offer_id: &Option<i64>,
    offer_source_id: &Option<i64>,
) -> Result<f64, AppError> {
    if let Some(id) = offer_id {
        if let Some(offer) = state
            .backend
            .offer_by_id(*id)
            .await
            .map_err(AppError::Internal)?
        {
            return Ok(offer.payout);
        }
    }
    if let Some(id) = offer_source_id {
        if let Some(source) = state
            .backend
            .offer_source_by_id(*id)
            .await
            .map_err(AppError::Internal)?
        {
            return Ok(source.payout);
        }
    }
    Ok(0.0)
}

/// The offer a lander click should resolve: the click's stored offer, or
/// (when the click predates an offer assignment) the one discovered via the
/// click's campaign.
async fn resolve_click_offer(
    state: &Arc<AppState>,
    offer_id: &Option<i64>,
    campaign_id: &Option<i64>,
) -> Result<Option<Offer>, AppError> {
    if let Some(id) = offer_id {
        return state
            .backend
            .offer_by_id(*id)
            .await
            .map_err(AppError::Internal);
    }
    if let Some(id) = campaign_id {
        let campaign: Option<Campaign> = state
            .backend
            .campaign_by_id(*id)
            .await
            .map_err(AppError::Internal)?;
        if let Some(offer_id) = campaign.and_then(|c| c.offer_id) {
            return state
                .backend
                .offer_by_id(offer_id)
                .await
                .map_err(AppError::Internal);
        }
    }
    Ok(None)
}

async fn resolve_channel(
    state: &Arc<AppState>,
    campaign: &Campaign,
    tc_override: Option<&String>,
) -> Option<TrafficChannel> {
    // The tc query parameter overrides the campaign's configured channel;
    // an unknown value falls back rather than dropping the click.
    if let Some(id) = tc_override.and_then(|v| v.parse::<i64>().ok()) {
        match state.backend.traffic_channel_by_id(id).await {
            Ok(Some(channel)) => return Some(channel),
            Ok(None) => {}
            Err(e) => warn!(tc = id, error = %e, "tc override lookup failed"),
        }
    }
    let id = campaign.traffic_channel_id?;
    match state.backend.traffic_channel_by_id(id).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!(channel_id = id, error = %e, "campaign channel lookup failed");
            None
        }
    }
}

pub(crate) fn dims_from_click(click: &Click) -> Dimensions {
    Dimensions {
        campaign_id: click.campaign_id,
        traffic_channel_id: click.traffic_channel_id,
        lander_id: click.lander_id,
        offer_id: click.offer_id,
        offer_source_id: click.offer_source_id,
    }
}

/// Increment rollups, swallowing failures — a lost rollup write must never
/// fail the user-facing response.
pub(crate) async fn record_metrics(
    state: &Arc<AppState>,
    event: EventKind,
    dims: &Dimensions,
    amounts: &Amounts,
) {
    if let Err(e) = state.backend.increment_metrics(event, dims, amounts).await {
        warn!(event = event.as_str(), error = %e, "metrics increment failed");
    }
}

fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
}

/// Extract the real client IP from `X-Forwarded-For` (first entry), falling
/// back to `"unknown"` — geo lookup treats that as unresolvable.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn required_param(params: &HashMap<String, String>, name: &str) -> Result<String, AppError> {
    params
        .get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
}

fn optional_f64(params: &HashMap<String, String>, name: &str) -> Result<Option<f64>, AppError> {
    params
        .get(name)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| AppError::BadRequest(format!("{name} must be numeric")))
        })
        .transpose()
}

fn optional_i64(params: &HashMap<String, String>, name: &str) -> Result<Option<i64>, AppError> {
    params
        .get(name)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("{name} must be an integer")))
        })
        .transpose()
}

fn format_money(value: f64) -> String {
    format!("{value:.2}")
}
