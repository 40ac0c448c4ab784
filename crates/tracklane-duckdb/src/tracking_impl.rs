//! `TrackingBackend` implementation for DuckDB, delegating to the query
//! modules.

use chrono::NaiveDate;

use tracklane_core::backend::TrackingBackend;
use tracklane_core::click::{Click, ClickMacro, Conversion, NewConversion, NewPostbackLog};
use tracklane_core::entities::{
    Campaign, CreateCampaignParams, CreateLanderParams, CreateOfferParams,
    CreateOfferSourceParams, CreateTrafficChannelParams, Lander, Offer, OfferSource,
    TrafficChannel,
};
use tracklane_core::metrics::{
    Amounts, BreakdownRow, Counters, Dimensions, EventKind, ReportDimension,
};

use crate::queries::{clicks, conversions, entities, metrics};
use crate::DuckDbBackend;

#[async_trait::async_trait]
impl TrackingBackend for DuckDbBackend {
    async fn create_campaign(&self, params: CreateCampaignParams) -> anyhow::Result<Campaign> {
        entities::create_campaign(self, params).await
    }

    async fn list_campaigns(&self) -> anyhow::Result<Vec<Campaign>> {
        entities::list_campaigns(self).await
    }

    async fn campaign_by_unique_id(&self, unique_id: &str) -> anyhow::Result<Option<Campaign>> {
        entities::campaign_by_unique_id(self, unique_id).await
    }

    async fn campaign_by_id(&self, id: i64) -> anyhow::Result<Option<Campaign>> {
        entities::campaign_by_id(self, id).await
    }

    async fn create_traffic_channel(
        &self,
        params: CreateTrafficChannelParams,
    ) -> anyhow::Result<TrafficChannel> {
        entities::create_traffic_channel(self, params).await
    }

    async fn list_traffic_channels(&self) -> anyhow::Result<Vec<TrafficChannel>> {
        entities::list_traffic_channels(self).await
    }

    async fn traffic_channel_by_id(&self, id: i64) -> anyhow::Result<Option<TrafficChannel>> {
        entities::traffic_channel_by_id(self, id).await
    }

    async fn create_lander(&self, params: CreateLanderParams) -> anyhow::Result<Lander> {
        entities::create_lander(self, params).await
    }

    async fn list_landers(&self) -> anyhow::Result<Vec<Lander>> {
        entities::list_landers(self).await
    }

    async fn lander_by_id(&self, id: i64) -> anyhow::Result<Option<Lander>> {
        entities::lander_by_id(self, id).await
    }

    async fn create_offer(&self, params: CreateOfferParams) -> anyhow::Result<Offer> {
        entities::create_offer(self, params).await
    }

    async fn list_offers(&self) -> anyhow::Result<Vec<Offer>> {
        entities::list_offers(self).await
    }

    async fn offer_by_id(&self, id: i64) -> anyhow::Result<Option<Offer>> {
        entities::offer_by_id(self, id).await
    }

    async fn create_offer_source(
        &self,
        params: CreateOfferSourceParams,
    ) -> anyhow::Result<OfferSource> {
        entities::create_offer_source(self, params).await
    }

    async fn list_offer_sources(&self) -> anyhow::Result<Vec<OfferSource>> {
        entities::list_offer_sources(self).await
    }

    async fn offer_source_by_id(&self, id: i64) -> anyhow::Result<Option<OfferSource>> {
        entities::offer_source_by_id(self, id).await
    }

    async fn insert_click(
        &self,
        click: &Click,
        macros: Option<&ClickMacro>,
    ) -> anyhow::Result<()> {
        clicks::insert_click(self, click, macros).await
    }

    async fn click_by_id(&self, click_id: &str) -> anyhow::Result<Option<Click>> {
        clicks::click_by_id(self, click_id).await
    }

    async fn click_macro_by_id(&self, click_id: &str) -> anyhow::Result<Option<ClickMacro>> {
        clicks::click_macro_by_id(self, click_id).await
    }

    async fn mark_lander_view(&self, click_id: &str) -> anyhow::Result<bool> {
        clicks::mark_lander_view(self, click_id).await
    }

    async fn apply_conversion(&self, click_id: &str, revenue: f64) -> anyhow::Result<Click> {
        clicks::apply_conversion(self, click_id, revenue).await
    }

    async fn record_conversion(
        &self,
        conversion: NewConversion,
    ) -> anyhow::Result<(Conversion, bool)> {
        conversions::record_conversion(self, conversion).await
    }

    async fn set_postback_result(
        &self,
        conversion_id: &str,
        sent: bool,
        response: Option<&str>,
    ) -> anyhow::Result<()> {
        conversions::set_postback_result(self, conversion_id, sent, response).await
    }

    async fn log_postback(&self, entry: NewPostbackLog) -> anyhow::Result<i64> {
        conversions::log_postback(self, entry).await
    }

    async fn increment_metrics(
        &self,
        event: EventKind,
        dims: &Dimensions,
        amounts: &Amounts,
    ) -> anyhow::Result<()> {
        metrics::increment_metrics(self, event, dims, amounts).await
    }

    async fn metrics_summary(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Counters> {
        metrics::metrics_summary(self, start, end).await
    }

    async fn metrics_breakdown(
        &self,
        dimension: ReportDimension,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<BreakdownRow>> {
        metrics::metrics_breakdown(self, dimension, start, end).await
    }
}
