use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of sub-parameter slots persisted per click. The macro vocabulary
/// accepts higher `sub{N}` placeholders, but only this many are stored.
pub const SUB_COUNT: usize = 23;

/// One tracked visit. Created once at the tracking hit; only the lifecycle
/// fields (`landing_page_viewed`, `conversion` and the money columns) are
/// ever mutated afterwards, and each transition is one-way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Click {
    pub click_id: String,
    pub campaign_id: Option<i64>,
    pub traffic_channel_id: Option<i64>,
    pub lander_id: Option<i64>,
    pub offer_id: Option<i64>,
    pub offer_source_id: Option<i64>,
    pub ip: String,
    pub user_agent: String,
    pub referer: Option<String>,
    pub device: String,
    pub os: String,
    pub browser: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub landing_page_viewed: bool,
    pub lp_view_time: Option<DateTime<Utc>>,
    pub conversion: bool,
    pub conversion_time: Option<DateTime<Utc>>,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub created_at: DateTime<Utc>,
}

/// The 1:1 macro row owned by a click: sub values captured from the inbound
/// query string plus denormalized entity names for fast postback templating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickMacro {
    pub click_id: String,
    pub campaign_name: Option<String>,
    pub traffic_channel_name: Option<String>,
    pub offer_name: Option<String>,
    /// Always `SUB_COUNT` entries; index 0 is `sub1`.
    pub subs: Vec<Option<String>>,
}

impl ClickMacro {
    pub fn sub(&self, n: usize) -> Option<&str> {
        self.subs
            .get(n.checked_sub(1)?)
            .and_then(|s| s.as_deref())
    }
}

/// The query-parameter name a channel uses for the canonical `sub{n}`.
///
/// `macro_format` is the per-channel indirection that lets each ad platform
/// keep its own parameter names (`utm_content`, `adset_id`, ...) while the
/// funnel speaks `sub1..subN` internally. Falls back to the canonical name.
pub fn sub_param_name(macro_format: Option<&HashMap<String, String>>, n: usize) -> String {
    let canonical = format!("sub{n}");
    macro_format
        .and_then(|m| m.get(&canonical))
        .cloned()
        .unwrap_or(canonical)
}

/// Extract every populated sub value from an inbound query string, honoring
/// the channel's `macro_format` aliasing. Empty values count as absent.
pub fn extract_subs(
    query: &HashMap<String, String>,
    macro_format: Option<&HashMap<String, String>>,
) -> Vec<Option<String>> {
    (1..=SUB_COUNT)
        .map(|n| {
            let param = sub_param_name(macro_format, n);
            query.get(&param).filter(|v| !v.is_empty()).cloned()
        })
        .collect()
}

/// A row in the conversion log. One per converted click — `click_id` is
/// unique, which is what makes attribution idempotent under at-least-once
/// postback delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub id: String,
    pub click_id: String,
    pub payout: f64,
    pub revenue: f64,
    pub status: String,
    pub event_name: Option<String>,
    /// Raw postback parameters, JSON-encoded.
    pub metadata: Option<String>,
    pub postback_sent: bool,
    pub postback_response: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewConversion {
    pub click_id: String,
    pub payout: f64,
    pub revenue: f64,
    pub event_name: Option<String>,
    pub metadata: Option<String>,
}

/// Raw `/postback` intake record, written before attribution runs so a
/// failed attribution can still be replayed by hand.
#[derive(Debug, Clone)]
pub struct NewPostbackLog {
    pub offer_source_id: i64,
    pub click_id: String,
    pub payout: f64,
    pub currency: Option<String>,
    pub raw_params: String,
}
