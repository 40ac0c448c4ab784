use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// Construct the axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer` — structured request/response logging via `tracing`.
/// 2. `CorsLayer` — permissive CORS; tracking links and lander beacons are
///    hit from arbitrary third-party pages.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        // Tracking funnel
        .route("/track/click", get(routes::track::track_click))
        .route("/track/impression", get(routes::track::track_impression))
        .route("/track/lander", get(routes::track::track_lander_view))
        .route("/track/lpclick", get(routes::track::track_lander_click))
        .route("/track/conversion", get(routes::track::track_conversion))
        // S2S postback intake
        .route("/postback", get(routes::postback::receive_postback))
        // Reporting
        .route("/api/reports", get(routes::reports::get_report))
        // Entity admin
        .route(
            "/api/campaigns",
            post(routes::campaigns::create_campaign).get(routes::campaigns::list_campaigns),
        )
        .route(
            "/api/campaigns/{unique_id}",
            get(routes::campaigns::get_campaign),
        )
        .route(
            "/api/channels",
            post(routes::channels::create_channel).get(routes::channels::list_channels),
        )
        .route("/api/channels/{id}", get(routes::channels::get_channel))
        .route(
            "/api/landers",
            post(routes::landers::create_lander).get(routes::landers::list_landers),
        )
        .route("/api/landers/{id}", get(routes::landers::get_lander))
        .route(
            "/api/offers",
            post(routes::offers::create_offer).get(routes::offers::list_offers),
        )
        .route("/api/offers/{id}", get(routes::offers::get_offer))
        .route(
            "/api/offer-sources",
            post(routes::offer_sources::create_offer_source)
                .get(routes::offer_sources::list_offer_sources),
        )
        .route(
            "/api/offer-sources/{id}",
            get(routes::offer_sources::get_offer_source),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
