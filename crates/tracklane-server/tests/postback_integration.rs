use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tracklane_core::backend::TrackingBackend;
use tracklane_core::config::Config;
use tracklane_core::entities::{
    Campaign, CreateCampaignParams, CreateOfferParams, CreateOfferSourceParams,
    CreateTrafficChannelParams, OfferSource,
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

async fn seed(state: &Arc<AppState>) -> (Campaign, OfferSource) {
    let source = state
        .backend
        .create_offer_source(CreateOfferSourceParams {
            name: "Network".to_string(),
            payout: 5.0,
        })
        .await
        .expect("seed source");
    let offer = state
        .backend
        .create_offer(CreateOfferParams {
            name: "Sweeps".to_string(),
            url: "https://offers.example/go?cid={click_id}".to_string(),
            payout: 12.5,
            offer_source_id: Some(source.id),
        })
        .await
        .expect("seed offer");
    let channel = state
        .backend
        .create_traffic_channel(CreateTrafficChannelParams {
            name: "Push Network".to_string(),
            macro_format: None,
            postback_url: None,
            cost_per_click: 0.1,
        })
        .await
        .expect("seed channel");
    let campaign = state
        .backend
        .create_campaign(CreateCampaignParams {
            name: "Sweeps US".to_string(),
            traffic_channel_id: Some(channel.id),
            lander_id: None,
            offer_id: Some(offer.id),
            direct_linking: true,
            is_active: true,
            promoting_url: String::new(),
        })
        .await
        .expect("seed campaign");
    (campaign, source)
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
        .find(|(k, _)| k == "cid")
        .map(|(_, v)| v.into_owned())
        .expect("cid param")
}

#[tokio::test]
async fn unknown_source_is_404() {
    let (_state, app) = setup().await;
    let response = get(&app, "/postback?clickid=clk_x&sum=5&source_id=42").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_clickid_or_sum_is_400() {
    let (state, app) = setup().await;
    let (_campaign, source) = seed(&state).await;

    let response = get(&app, &format!("/postback?sum=5&source_id={}", source.id)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(
        &app,
        &format!("/postback?clickid=clk_x&source_id={}", source.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(
        &app,
        &format!("/postback?clickid=clk_x&sum=abc&source_id={}", source.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn valid_postback_records_conversion() {
    let (state, app) = setup().await;
    let (campaign, source) = seed(&state).await;
    let click_id = track_click(&app, &campaign).await;

    let response = get(
        &app,
        &format!(
            "/postback?clickid={click_id}&sum=7.5&currency=USD&source_id={}",
            source.id
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "conversion recorded");
    assert_eq!(body["logId"], 1);

    let report = get(&app, "/api/reports").await;
    let summary = json_body(report).await["summary"].clone();
    assert_eq!(summary["conversions"], 1);
    assert_eq!(summary["total_revenue"].as_f64(), Some(7.5));
}

#[tokio::test]
async fn duplicate_postback_is_logged_but_not_recounted() {
    let (state, app) = setup().await;
    let (campaign, source) = seed(&state).await;
    let click_id = track_click(&app, &campaign).await;

    let uri = format!(
        "/postback?clickid={click_id}&sum=7.5&source_id={}",
        source.id
    );
    let first = get(&app, &uri).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = get(&app, &uri).await;
    assert_eq!(second.status(), StatusCode::OK);
    let body = json_body(second).await;
    assert_eq!(body["message"], "duplicate postback ignored");
    // Both raw hits are logged even though only one conversion exists.
    assert_eq!(body["logId"], 2);

    let report = get(&app, "/api/reports").await;
    let summary = json_body(report).await["summary"].clone();
    assert_eq!(summary["conversions"], 1);
    assert_eq!(summary["total_revenue"].as_f64(), Some(7.5));
}

#[tokio::test]
async fn postback_for_unknown_click_is_404() {
    let (state, app) = setup().await;
    let (_campaign, source) = seed(&state).await;

    let response = get(
        &app,
        &format!("/postback?clickid=clk_missing&sum=5&source_id={}", source.id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
