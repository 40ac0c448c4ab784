//! Storage backend abstraction.

use chrono::NaiveDate;

use crate::click::{Click, ClickMacro, Conversion, NewConversion, NewPostbackLog};
use crate::entities::{
    Campaign, CreateCampaignParams, CreateLanderParams, CreateOfferParams,
    CreateOfferSourceParams, CreateTrafficChannelParams, Lander, Offer, OfferSource,
    TrafficChannel,
};
use crate::metrics::{Amounts, BreakdownRow, Counters, Dimensions, EventKind, ReportDimension};

/// The repository interface the tracking engine is written against. The
/// server only ever talks to storage through this trait; the concrete
/// backend lives in its own crate.
#[async_trait::async_trait]
pub trait TrackingBackend: Send + Sync + 'static {
    // --- entities ---

    async fn create_campaign(&self, params: CreateCampaignParams) -> anyhow::Result<Campaign>;

    async fn list_campaigns(&self) -> anyhow::Result<Vec<Campaign>>;

    async fn campaign_by_unique_id(&self, unique_id: &str) -> anyhow::Result<Option<Campaign>>;

    async fn campaign_by_id(&self, id: i64) -> anyhow::Result<Option<Campaign>>;

    async fn create_traffic_channel(
        &self,
        params: CreateTrafficChannelParams,
    ) -> anyhow::Result<TrafficChannel>;

    async fn list_traffic_channels(&self) -> anyhow::Result<Vec<TrafficChannel>>;

    async fn traffic_channel_by_id(&self, id: i64) -> anyhow::Result<Option<TrafficChannel>>;

    async fn create_lander(&self, params: CreateLanderParams) -> anyhow::Result<Lander>;

    async fn list_landers(&self) -> anyhow::Result<Vec<Lander>>;

    async fn lander_by_id(&self, id: i64) -> anyhow::Result<Option<Lander>>;

    async fn create_offer(&self, params: CreateOfferParams) -> anyhow::Result<Offer>;

    async fn list_offers(&self) -> anyhow::Result<Vec<Offer>>;

    async fn offer_by_id(&self, id: i64) -> anyhow::Result<Option<Offer>>;

    async fn create_offer_source(
        &self,
        params: CreateOfferSourceParams,
    ) -> anyhow::Result<OfferSource>;

    async fn list_offer_sources(&self) -> anyhow::Result<Vec<OfferSource>>;

    async fn offer_source_by_id(&self, id: i64) -> anyhow::Result<Option<OfferSource>>;

    // --- clicks ---

    /// Persist a click and (best-effort) its macro row. The click insert is
    /// authoritative: a macro-row failure is logged and swallowed so the
    /// click stays usable for redirect and attribution.
    async fn insert_click(&self, click: &Click, macros: Option<&ClickMacro>)
        -> anyhow::Result<()>;

    async fn click_by_id(&self, click_id: &str) -> anyhow::Result<Option<Click>>;

    async fn click_macro_by_id(&self, click_id: &str) -> anyhow::Result<Option<ClickMacro>>;

    /// Set `landing_page_viewed` once. Returns `true` only for the call that
    /// actually performed the transition, so lpview counters increment at
    /// most once per click.
    async fn mark_lander_view(&self, click_id: &str) -> anyhow::Result<bool>;

    /// One-way conversion transition on the click row: sets the flag,
    /// timestamps it, and recomputes `profit = revenue - cost`. Returns the
    /// updated click.
    async fn apply_conversion(&self, click_id: &str, revenue: f64) -> anyhow::Result<Click>;

    // --- conversion log & postbacks ---

    /// Insert-or-return-existing on `click_id`. The bool is `true` when this
    /// call created the row — repeat attributions get the original row back
    /// and must not re-increment anything.
    async fn record_conversion(
        &self,
        conversion: NewConversion,
    ) -> anyhow::Result<(Conversion, bool)>;

    async fn set_postback_result(
        &self,
        conversion_id: &str,
        sent: bool,
        response: Option<&str>,
    ) -> anyhow::Result<()>;

    /// Log a raw inbound postback; returns the log row id.
    async fn log_postback(&self, entry: NewPostbackLog) -> anyhow::Result<i64>;

    // --- metrics ---

    /// Fan out one event to every dimension-subset rollup row at daily and
    /// hourly granularity. Individual row failures are logged, not
    /// propagated.
    async fn increment_metrics(
        &self,
        event: EventKind,
        dims: &Dimensions,
        amounts: &Amounts,
    ) -> anyhow::Result<()>;

    async fn metrics_summary(&self, start: NaiveDate, end: NaiveDate)
        -> anyhow::Result<Counters>;

    async fn metrics_breakdown(
        &self,
        dimension: ReportDimension,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<BreakdownRow>>;
}
