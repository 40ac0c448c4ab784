use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A campaign binds a traffic channel to a funnel (lander and/or offer) and
/// is addressed externally by `unique_id` — the token that appears in
/// tracking links — never by its internal numeric key.
#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: i64,
    pub unique_id: String,
    pub name: String,
    pub traffic_channel_id: Option<i64>,
    pub lander_id: Option<i64>,
    pub offer_id: Option<i64>,
    /// When true the lander is skipped and clicks go straight to the offer.
    pub direct_linking: bool,
    pub is_active: bool,
    /// Cached constructed tracking URL for this campaign.
    pub promoting_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateCampaignParams {
    pub name: String,
    pub traffic_channel_id: Option<i64>,
    pub lander_id: Option<i64>,
    pub offer_id: Option<i64>,
    pub direct_linking: bool,
    pub is_active: bool,
    pub promoting_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficChannel {
    pub id: i64,
    pub name: String,
    /// Canonical sub name → this channel's query-parameter name.
    pub macro_format: Option<HashMap<String, String>>,
    /// S2S postback template with `{...}` macro placeholders.
    pub postback_url: Option<String>,
    pub cost_per_click: f64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateTrafficChannelParams {
    pub name: String,
    pub macro_format: Option<HashMap<String, String>>,
    pub postback_url: Option<String>,
    pub cost_per_click: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lander {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateLanderParams {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Offer {
    pub id: i64,
    pub name: String,
    /// Tracking URL template with macro placeholders.
    pub url: String,
    pub payout: f64,
    pub offer_source_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateOfferParams {
    pub name: String,
    pub url: String,
    pub payout: f64,
    pub offer_source_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferSource {
    pub id: i64,
    pub name: String,
    /// Fallback payout when neither the postback nor the offer carries one.
    pub payout: f64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CreateOfferSourceParams {
    pub name: String,
    pub payout: f64,
}
