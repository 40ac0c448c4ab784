use std::sync::Arc;

use tracklane_core::backend::TrackingBackend;
use tracklane_core::config::Config;

use crate::forwarder::PostbackForwarder;
use crate::geo::GeoResolver;

/// Shared application state injected into every axum handler via
/// [`axum::extract::State`].
///
/// All coordination happens through the backend — there is no other shared
/// mutable state, so the struct is plain `Arc`-wrapped handles.
pub struct AppState {
    /// Storage, behind the repository trait. The concrete backend is chosen
    /// in `main` (DuckDB) or by tests (in-memory DuckDB).
    pub backend: Arc<dyn TrackingBackend>,

    /// Parsed configuration, loaded once at startup from environment
    /// variables and passed down — never read from globals.
    pub config: Arc<Config>,

    /// GeoIP resolver; opens the MaxMind reader once at startup.
    pub geo: GeoResolver,

    /// Handle onto the background postback queue.
    pub forwarder: PostbackForwarder,
}

impl AppState {
    /// Construct the state and spawn the postback worker. Must run inside a
    /// tokio runtime.
    pub fn new(backend: Arc<dyn TrackingBackend>, config: Config) -> Self {
        let config = Arc::new(config);
        let geo = GeoResolver::open(&config.geoip_path);
        let forwarder = PostbackForwarder::spawn(Arc::clone(&backend), &config);
        Self {
            backend,
            config,
            geo,
            forwarder,
        }
    }
}
