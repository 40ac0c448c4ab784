#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    pub geoip_path: String,
    /// Base URL this deployment is reachable at; used to build campaign
    /// promoting URLs.
    pub public_url: String,
    pub cors_origins: Vec<String>,
    /// Capacity of the postback forwarder queue. When full, new jobs are
    /// dropped with a warning rather than blocking the tracking path.
    pub postback_queue_capacity: usize,
    /// Retries per postback after the initial attempt.
    pub postback_retries: u32,
    pub duckdb_memory_limit: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("TRACKLANE_PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("TRACKLANE_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            geoip_path: std::env::var("TRACKLANE_GEOIP_PATH")
                .unwrap_or_else(|_| "./GeoLite2-City.mmdb".to_string()),
            public_url: std::env::var("TRACKLANE_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            cors_origins: std::env::var("TRACKLANE_CORS_ORIGINS")
                .map(|v| v.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            postback_queue_capacity: std::env::var("TRACKLANE_POSTBACK_QUEUE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            postback_retries: std::env::var("TRACKLANE_POSTBACK_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            duckdb_memory_limit: std::env::var("TRACKLANE_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
        })
    }
}
