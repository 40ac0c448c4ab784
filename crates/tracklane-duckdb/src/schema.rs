/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup (idempotent).
///
/// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`,
/// read from `Config.duckdb_memory_limit` at the call site. Always set an
/// explicit limit — DuckDB's default is 80% of system RAM.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- ENTITY ID SEQUENCES
-- ===========================================
CREATE SEQUENCE IF NOT EXISTS campaigns_id_seq;
CREATE SEQUENCE IF NOT EXISTS traffic_channels_id_seq;
CREATE SEQUENCE IF NOT EXISTS landers_id_seq;
CREATE SEQUENCE IF NOT EXISTS offers_id_seq;
CREATE SEQUENCE IF NOT EXISTS offer_sources_id_seq;
CREATE SEQUENCE IF NOT EXISTS postback_logs_id_seq;

-- ===========================================
-- TRAFFIC CHANNELS
-- ===========================================
CREATE TABLE IF NOT EXISTS traffic_channels (
    id              BIGINT PRIMARY KEY,
    name            VARCHAR NOT NULL,
    macro_format    VARCHAR,                       -- JSON: canonical sub name -> channel param name
    postback_url    VARCHAR,                       -- S2S template with {{macro}} placeholders
    cost_per_click  DOUBLE NOT NULL DEFAULT 0,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- ===========================================
-- LANDERS / OFFERS / OFFER SOURCES
-- ===========================================
CREATE TABLE IF NOT EXISTS landers (
    id              BIGINT PRIMARY KEY,
    name            VARCHAR NOT NULL,
    url             VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS offer_sources (
    id              BIGINT PRIMARY KEY,
    name            VARCHAR NOT NULL,
    payout          DOUBLE NOT NULL DEFAULT 0,     -- fallback payout
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS offers (
    id              BIGINT PRIMARY KEY,
    name            VARCHAR NOT NULL,
    url             VARCHAR NOT NULL,              -- tracking URL template
    payout          DOUBLE NOT NULL DEFAULT 0,
    offer_source_id BIGINT,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- ===========================================
-- CAMPAIGNS
-- ===========================================
CREATE TABLE IF NOT EXISTS campaigns (
    id                  BIGINT PRIMARY KEY,
    unique_id           VARCHAR UNIQUE NOT NULL,   -- 'cmp_' + 10 alphanumerics; the token in tracking links
    name                VARCHAR NOT NULL,
    traffic_channel_id  BIGINT,
    lander_id           BIGINT,
    offer_id            BIGINT,
    direct_linking      BOOLEAN NOT NULL DEFAULT FALSE,
    is_active           BOOLEAN NOT NULL DEFAULT TRUE,
    promoting_url       VARCHAR NOT NULL DEFAULT '',
    created_at          TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_campaigns_unique_id ON campaigns(unique_id);

-- ===========================================
-- CLICKS (raw event table)
-- ===========================================
CREATE TABLE IF NOT EXISTS clicks (
    click_id            VARCHAR PRIMARY KEY,       -- 'clk_' + uuid
    campaign_id         BIGINT,
    traffic_channel_id  BIGINT,
    lander_id           BIGINT,
    offer_id            BIGINT,
    offer_source_id     BIGINT,

    -- request context, immutable
    ip                  VARCHAR NOT NULL,
    user_agent          VARCHAR NOT NULL,
    referer             VARCHAR,
    device              VARCHAR NOT NULL,
    os                  VARCHAR NOT NULL,
    browser             VARCHAR NOT NULL,
    country             VARCHAR NOT NULL,
    region              VARCHAR NOT NULL,
    city                VARCHAR NOT NULL,

    -- lifecycle, each transition one-way
    landing_page_viewed BOOLEAN NOT NULL DEFAULT FALSE,
    lp_view_time        TIMESTAMP,
    conversion          BOOLEAN NOT NULL DEFAULT FALSE,
    conversion_time     TIMESTAMP,
    revenue             DOUBLE NOT NULL DEFAULT 0,
    cost                DOUBLE NOT NULL DEFAULT 0,
    profit              DOUBLE NOT NULL DEFAULT 0,

    created_at          TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_clicks_campaign ON clicks(campaign_id, created_at);
CREATE INDEX IF NOT EXISTS idx_clicks_country  ON clicks(country, created_at);

-- ===========================================
-- CLICK MACROS (1:1 with clicks)
-- ===========================================
CREATE TABLE IF NOT EXISTS click_macros (
    click_id             VARCHAR PRIMARY KEY,
    campaign_name        VARCHAR,
    traffic_channel_name VARCHAR,
    offer_name           VARCHAR,
    sub1 VARCHAR,  sub2 VARCHAR,  sub3 VARCHAR,  sub4 VARCHAR,  sub5 VARCHAR,
    sub6 VARCHAR,  sub7 VARCHAR,  sub8 VARCHAR,  sub9 VARCHAR,  sub10 VARCHAR,
    sub11 VARCHAR, sub12 VARCHAR, sub13 VARCHAR, sub14 VARCHAR, sub15 VARCHAR,
    sub16 VARCHAR, sub17 VARCHAR, sub18 VARCHAR, sub19 VARCHAR, sub20 VARCHAR,
    sub21 VARCHAR, sub22 VARCHAR, sub23 VARCHAR
);

-- ===========================================
-- METRICS (pre-aggregated rollups)
-- ===========================================
-- One row per non-empty dimension subset per time bucket. dim_key is the
-- canonical encoding of the populated subset ("c:5|t:9"); hour = -1 marks
-- the daily bucket. The id columns mirror dim_key for querying. Counter
-- increments are single atomic upserts on the primary key.
CREATE TABLE IF NOT EXISTS metrics (
    dim_key             VARCHAR NOT NULL,
    date                DATE NOT NULL,
    hour                SMALLINT NOT NULL,

    campaign_id         BIGINT,
    traffic_channel_id  BIGINT,
    lander_id           BIGINT,
    offer_id            BIGINT,
    offer_source_id     BIGINT,

    impressions         BIGINT NOT NULL DEFAULT 0,
    clicks              BIGINT NOT NULL DEFAULT 0,
    lpviews             BIGINT NOT NULL DEFAULT 0,
    lpclicks            BIGINT NOT NULL DEFAULT 0,
    conversions         BIGINT NOT NULL DEFAULT 0,
    total_revenue       DOUBLE NOT NULL DEFAULT 0,
    total_cost          DOUBLE NOT NULL DEFAULT 0,
    profit              DOUBLE NOT NULL DEFAULT 0,

    -- derived, recomputed from this row's counters after every update
    ctr                 DOUBLE NOT NULL DEFAULT 0,
    cr                  DOUBLE NOT NULL DEFAULT 0,
    offer_cr            DOUBLE NOT NULL DEFAULT 0,
    cpc                 DOUBLE NOT NULL DEFAULT 0,
    cpm                 DOUBLE NOT NULL DEFAULT 0,
    roi                 DOUBLE NOT NULL DEFAULT 0,
    epc                 DOUBLE NOT NULL DEFAULT 0,
    lpepc               DOUBLE NOT NULL DEFAULT 0,
    ctc                 DOUBLE NOT NULL DEFAULT 0,
    total_cpa           DOUBLE NOT NULL DEFAULT 0,
    total_roi           DOUBLE NOT NULL DEFAULT 0,

    PRIMARY KEY (dim_key, date, hour)
);
CREATE INDEX IF NOT EXISTS idx_metrics_date ON metrics(date, hour);

-- ===========================================
-- CONVERSION LOG
-- ===========================================
-- UNIQUE(click_id) is the idempotency guarantee: at-least-once postback
-- delivery attributes each click exactly once.
CREATE TABLE IF NOT EXISTS conversions (
    id                  VARCHAR PRIMARY KEY,       -- 'cv_' + uuid
    click_id            VARCHAR UNIQUE NOT NULL,
    payout              DOUBLE NOT NULL DEFAULT 0,
    revenue             DOUBLE NOT NULL DEFAULT 0,
    status              VARCHAR NOT NULL DEFAULT 'approved',
    event_name          VARCHAR,
    metadata            VARCHAR,                   -- raw postback params, JSON
    postback_sent       BOOLEAN NOT NULL DEFAULT FALSE,
    postback_response   VARCHAR,
    created_at          TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- ===========================================
-- RAW POSTBACK INTAKE LOG
-- ===========================================
CREATE TABLE IF NOT EXISTS postback_logs (
    id              BIGINT PRIMARY KEY,
    offer_source_id BIGINT NOT NULL,
    click_id        VARCHAR NOT NULL,
    payout          DOUBLE NOT NULL,
    currency        VARCHAR,
    raw_params      VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#
    )
}
