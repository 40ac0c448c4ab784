use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tracklane_core::backend::TrackingBackend;
use tracklane_core::config::Config;
use tracklane_core::entities::{
    Campaign, CreateCampaignParams, CreateLanderParams, CreateOfferParams,
    CreateOfferSourceParams, CreateTrafficChannelParams,
};
use tracklane_duckdb::DuckDbBackend;
use tracklane_server::app::build_app;
use tracklane_server::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        data_dir: "/tmp/tracklane-test".to_string(),
        geoip_path: "/nonexistent/GeoLite2-City.mmdb".to_string(),
        public_url: "http://localhost:4000".to_string(),
        cors_origins: vec![],
        postback_queue_capacity: 16,
        postback_retries: 0,
        duckdb_memory_limit: "1GB".to_string(),
    }
}

async fn setup() -> (Arc<AppState>, axum::Router) {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let backend: Arc<dyn TrackingBackend> = Arc::new(db);
    let state = Arc::new(AppState::new(backend, test_config()));
    let app = build_app(Arc::clone(&state));
    (state, app)
}

/// Seed a direct-linking campaign with offer payout 12.5 and CPC 0.25.
async fn seed_campaign(state: &Arc<AppState>, with_offer: bool) -> Campaign {
    let channel = state
        .backend
        .create_traffic_channel(CreateTrafficChannelParams {
            name: "Push Network".to_string(),
            macro_format: None,
            postback_url: None,
            cost_per_click: 0.25,
        })
        .await
        .expect("seed channel");
    let lander = state
        .backend
        .create_lander(CreateLanderParams {
            name: "LP".to_string(),
            url: "https://lp.example/page".to_string(),
        })
        .await
        .expect("seed lander");
    let offer_id = if with_offer {
        let source = state
            .backend
            .create_offer_source(CreateOfferSourceParams {
                name: "Network".to_string(),
                payout: 5.0,
            })
            .await
            .expect("seed source");
        Some(
            state
                .backend
                .create_offer(CreateOfferParams {
                    name: "Sweeps".to_string(),
                    url: "https://offers.example/go?cid={click_id}".to_string(),
                    payout: 12.5,
                    offer_source_id: Some(source.id),
                })
                .await
                .expect("seed offer")
                .id,
        )
    } else {
        None
    };
    state
        .backend
        .create_campaign(CreateCampaignParams {
            name: "Sweeps US".to_string(),
            traffic_channel_id: Some(channel.id),
            lander_id: Some(lander.id),
            offer_id,
            direct_linking: false,
            is_active: true,
            promoting_url: String::new(),
        })
        .await
        .expect("seed campaign")
}

async fn get(app: &axum::Router, uri: &str) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("x-forwarded-for", "203.0.113.9")
                .header("user-agent", "Mozilla/5.0 Chrome/120")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("response")
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

/// Run a tracking click and return the new click id.
async fn track_click(app: &axum::Router, campaign: &Campaign) -> String {
    let response = get(
        app,
        &format!("/track/click?unique_id={}", campaign.unique_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location")
        .to_string();
    url::Url::parse(&location)
        .expect("parse location")
        .query_pairs()
        .find(|(k, _)| k == "click_id")
        .map(|(_, v)| v.into_owned())
        .expect("click_id param")
}

async fn report_summary(app: &axum::Router) -> Value {
    let response = get(app, "/api/reports").await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["summary"].clone()
}

#[tokio::test]
async fn conversion_sets_profit_and_increments_metrics() {
    let (state, app) = setup().await;
    let campaign = seed_campaign(&state, true).await;
    let click_id = track_click(&app, &campaign).await;

    let response = get(
        &app,
        &format!("/track/conversion?click_id={click_id}&payout=10"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["duplicate"], false);
    assert_eq!(body["revenue"].as_f64(), Some(10.0));
    // profit = revenue - cost (CPC 0.25 captured at click time)
    assert_eq!(body["profit"].as_f64(), Some(9.75));

    let summary = report_summary(&app).await;
    assert_eq!(summary["conversions"], 1);
    assert_eq!(summary["total_revenue"].as_f64(), Some(10.0));
    assert_eq!(summary["total_cost"].as_f64(), Some(0.25));
    assert_eq!(summary["profit"].as_f64(), Some(9.75));
}

#[tokio::test]
async fn repeated_conversion_is_idempotent() {
    let (state, app) = setup().await;
    let campaign = seed_campaign(&state, true).await;
    let click_id = track_click(&app, &campaign).await;

    let first = get(
        &app,
        &format!("/track/conversion?click_id={click_id}&payout=10"),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    // Retried postback, even with a different payout: original attribution
    // returned unchanged, nothing re-incremented.
    let second = get(
        &app,
        &format!("/track/conversion?click_id={click_id}&payout=99"),
    )
    .await;
    assert_eq!(second.status(), StatusCode::OK);
    let body = json_body(second).await;
    assert_eq!(body["duplicate"], true);
    assert_eq!(body["revenue"].as_f64(), Some(10.0));

    let summary = report_summary(&app).await;
    assert_eq!(summary["conversions"], 1);
    assert_eq!(summary["total_revenue"].as_f64(), Some(10.0));
}

#[tokio::test]
async fn offer_mismatch_is_rejected() {
    let (state, app) = setup().await;
    let campaign = seed_campaign(&state, true).await;
    let click_id = track_click(&app, &campaign).await;

    let response = get(
        &app,
        &format!("/track/conversion?click_id={click_id}&payout=10&offer_id=999999"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "offer_mismatch");

    // Nothing was attributed.
    let summary = report_summary(&app).await;
    assert_eq!(summary["conversions"], 0);
}

#[tokio::test]
async fn matching_offer_id_is_accepted() {
    let (state, app) = setup().await;
    let campaign = seed_campaign(&state, true).await;
    let offer_id = campaign.offer_id.expect("campaign offer");
    let click_id = track_click(&app, &campaign).await;

    let response = get(
        &app,
        &format!("/track/conversion?click_id={click_id}&payout=10&offer_id={offer_id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_click_is_404() {
    let (_state, app) = setup().await;
    let response = get(&app, "/track/conversion?click_id=clk_missing&payout=10").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn omitted_payout_falls_back_to_offer_payout() {
    let (state, app) = setup().await;
    let campaign = seed_campaign(&state, true).await;
    let click_id = track_click(&app, &campaign).await;

    let response = get(&app, &format!("/track/conversion?click_id={click_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["revenue"].as_f64(), Some(12.5));
}

#[tokio::test]
async fn no_offer_resolves_to_zero_revenue_and_negative_profit() {
    let (state, app) = setup().await;
    let campaign = seed_campaign(&state, false).await;
    let click_id = track_click(&app, &campaign).await;

    let response = get(&app, &format!("/track/conversion?click_id={click_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["revenue"].as_f64(), Some(0.0));
    // profit = 0 - cost
    assert_eq!(body["profit"].as_f64(), Some(-0.25));
}
