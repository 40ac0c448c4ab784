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
    CreateOfferSourceParams, CreateTrafficChannelParams, Lander, Offer, OfferSource,
    TrafficChannel,
};
use tracklane_duckdb::DuckDbBackend;
use tracklane_server::app::build_app;
use tracklane_server::state::AppState;

/// Build a test Config with sensible defaults for integration tests.
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

/// Create a fresh in-memory backend + state + app for each test.
async fn setup() -> (Arc<AppState>, axum::Router) {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let backend: Arc<dyn TrackingBackend> = Arc::new(db);
    let state = Arc::new(AppState::new(backend, test_config()));
    let app = build_app(Arc::clone(&state));
    (state, app)
}

struct Funnel {
    campaign: Campaign,
    channel: TrafficChannel,
    #[allow(dead_code)]
    lander: Lander,
    #[allow(dead_code)]
    offer: Offer,
    #[allow(dead_code)]
    source: OfferSource,
}

/// Seed a complete channel → campaign → lander → offer funnel.
async fn seed_funnel(state: &Arc<AppState>, direct_linking: bool) -> Funnel {
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
            url: "https://offers.example/go?cid={click_id}&s={sub1}".to_string(),
            payout: 12.5,
            offer_source_id: Some(source.id),
        })
        .await
        .expect("seed offer");
    let lander = state
        .backend
        .create_lander(CreateLanderParams {
            name: "LP".to_string(),
            url: "https://lp.example/page".to_string(),
        })
        .await
        .expect("seed lander");
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
    let campaign = state
        .backend
        .create_campaign(CreateCampaignParams {
            name: "Sweeps US".to_string(),
            traffic_channel_id: Some(channel.id),
            lander_id: Some(lander.id),
            offer_id: Some(offer.id),
            direct_linking,
            is_active: true,
            promoting_url: "http://localhost:4000/track/click?unique_id={unique_id}".to_string(),
        })
        .await
        .expect("seed campaign");
    Funnel {
        campaign,
        channel,
        lander,
        offer,
        source,
    }
}

async fn get(app: &axum::Router, uri: &str) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("x-forwarded-for", "203.0.113.9")
                .header(
                    "user-agent",
                    "Mozilla/5.0 (Windows NT 10.0) Chrome/120.0 Safari/537.36",
                )
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

fn location(response: &axum::http::Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = url::Url::parse(url).expect("parse url");
    parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

async fn summary(app: &axum::Router) -> Value {
    let response = get(app, "/api/reports?dimension=campaign").await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn click_redirects_to_lander_with_click_id_and_subs() {
    let (state, app) = setup().await;
    let funnel = seed_funnel(&state, false).await;

    let uri = format!(
        "/track/click?unique_id={}&tc={}&sub1=xyz",
        funnel.campaign.unique_id, funnel.channel.id
    );
    let response = get(&app, &uri).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location(&response);
    assert!(location.starts_with("https://lp.example/page"));
    let click_id = query_param(&location, "click_id").expect("click_id param");
    assert!(click_id.starts_with("clk_"));
    assert_eq!(query_param(&location, "sub1").as_deref(), Some("xyz"));

    // Metrics: channel breakdown carries the click.
    let report = get(&app, "/api/reports?dimension=traffic_channel").await;
    let body = json_body(report).await;
    let rows = body["breakdown"].as_array().expect("breakdown");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["key"], funnel.channel.id.to_string());
    assert_eq!(rows[0]["metrics"]["clicks"], 1);
}

#[tokio::test]
async fn direct_linking_skips_lander_and_resolves_macros() {
    let (state, app) = setup().await;
    let funnel = seed_funnel(&state, true).await;

    let uri = format!(
        "/track/click?unique_id={}&sub1=fb",
        funnel.campaign.unique_id
    );
    let response = get(&app, &uri).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location(&response);
    assert!(location.starts_with("https://offers.example/go"));
    let cid = query_param(&location, "cid").expect("cid param");
    assert!(cid.starts_with("clk_"));
    assert_eq!(query_param(&location, "s").as_deref(), Some("fb"));
}

#[tokio::test]
async fn unknown_campaign_is_404() {
    let (_state, app) = setup().await;
    let response = get(&app, "/track/click?unique_id=cmp_missing00").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_unique_id_is_400() {
    let (_state, app) = setup().await;
    let response = get(&app, "/track/click").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn no_destination_is_404_but_click_is_still_counted() {
    let (state, app) = setup().await;
    let campaign = state
        .backend
        .create_campaign(CreateCampaignParams {
            name: "Orphan".to_string(),
            traffic_channel_id: None,
            lander_id: None,
            offer_id: None,
            direct_linking: false,
            is_active: true,
            promoting_url: String::new(),
        })
        .await
        .expect("seed campaign");

    let response = get(&app, &format!("/track/click?unique_id={}", campaign.unique_id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Click recording is not undone by the resolution failure.
    let body = summary(&app).await;
    assert_eq!(body["summary"]["clicks"], 1);
}

#[tokio::test]
async fn lander_view_is_idempotent() {
    let (state, app) = setup().await;
    let funnel = seed_funnel(&state, false).await;

    let click = get(
        &app,
        &format!("/track/click?unique_id={}", funnel.campaign.unique_id),
    )
    .await;
    let click_id = query_param(&location(&click), "click_id").expect("click_id");

    for _ in 0..2 {
        let response = get(&app, &format!("/track/lander?click_id={click_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
    }

    // Second view accepted but not double-counted.
    let body = summary(&app).await;
    assert_eq!(body["summary"]["lpviews"], 1);
}

#[tokio::test]
async fn lander_view_unknown_click_is_404() {
    let (_state, app) = setup().await;
    let response = get(&app, "/track/lander?click_id=clk_missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lander_click_redirects_to_offer() {
    let (state, app) = setup().await;
    let funnel = seed_funnel(&state, false).await;

    let click = get(
        &app,
        &format!(
            "/track/click?unique_id={}&sub1=fb",
            funnel.campaign.unique_id
        ),
    )
    .await;
    let click_id = query_param(&location(&click), "click_id").expect("click_id");

    get(&app, &format!("/track/lander?click_id={click_id}")).await;
    let response = get(&app, &format!("/track/lpclick?click_id={click_id}")).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location(&response);
    assert!(location.starts_with("https://offers.example/go"));
    assert_eq!(query_param(&location, "cid").as_deref(), Some(click_id.as_str()));
    assert_eq!(query_param(&location, "s").as_deref(), Some("fb"));

    let body = summary(&app).await;
    assert_eq!(body["summary"]["lpclicks"], 1);
}

#[tokio::test]
async fn impression_counts_without_click_row() {
    let (state, app) = setup().await;
    let funnel = seed_funnel(&state, false).await;

    let response = get(
        &app,
        &format!("/track/impression?unique_id={}", funnel.campaign.unique_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = summary(&app).await;
    assert_eq!(body["summary"]["impressions"], 1);
    assert_eq!(body["summary"]["clicks"], 0);
}
