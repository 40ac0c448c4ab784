//! Macro placeholder vocabulary and substitution.
//!
//! Templates use `{name}` placeholders. Substitution is literal,
//! case-sensitive and non-recursive: a substituted value is never re-scanned
//! for further placeholders, and unknown placeholders are left verbatim so a
//! caller can spot what it forgot to populate.

use std::collections::HashMap;

use crate::click::{Click, ClickMacro};

/// The closed set of known placeholder kinds. `Sub(n)` is the escape hatch
/// for the open `sub1..subN` vocabulary (n >= 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroKey {
    ClickId,
    CampaignId,
    CampaignName,
    TrafficChannelId,
    TrafficChannelName,
    LanderId,
    OfferId,
    OfferName,
    OfferSourceId,
    Payout,
    Country,
    Region,
    City,
    Ip,
    UserAgent,
    Device,
    Os,
    Browser,
    Sub(u8),
}

impl MacroKey {
    /// Parse a placeholder name (without braces). Returns `None` for names
    /// outside the vocabulary — the resolver leaves those verbatim.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "click_id" => Some(Self::ClickId),
            "campaign_id" => Some(Self::CampaignId),
            "campaign_name" => Some(Self::CampaignName),
            "traffic_channel_id" => Some(Self::TrafficChannelId),
            "traffic_channel_name" => Some(Self::TrafficChannelName),
            "lander_id" => Some(Self::LanderId),
            "offer_id" => Some(Self::OfferId),
            "offer_name" => Some(Self::OfferName),
            "offer_source_id" => Some(Self::OfferSourceId),
            "payout" => Some(Self::Payout),
            "country" => Some(Self::Country),
            "region" => Some(Self::Region),
            "city" => Some(Self::City),
            "ip" => Some(Self::Ip),
            "user_agent" => Some(Self::UserAgent),
            "device" => Some(Self::Device),
            "os" => Some(Self::Os),
            "browser" => Some(Self::Browser),
            _ => {
                let n: u8 = name.strip_prefix("sub")?.parse().ok()?;
                if n == 0 {
                    return None;
                }
                Some(Self::Sub(n))
            }
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::ClickId => "click_id".to_string(),
            Self::CampaignId => "campaign_id".to_string(),
            Self::CampaignName => "campaign_name".to_string(),
            Self::TrafficChannelId => "traffic_channel_id".to_string(),
            Self::TrafficChannelName => "traffic_channel_name".to_string(),
            Self::LanderId => "lander_id".to_string(),
            Self::OfferId => "offer_id".to_string(),
            Self::OfferName => "offer_name".to_string(),
            Self::OfferSourceId => "offer_source_id".to_string(),
            Self::Payout => "payout".to_string(),
            Self::Country => "country".to_string(),
            Self::Region => "region".to_string(),
            Self::City => "city".to_string(),
            Self::Ip => "ip".to_string(),
            Self::UserAgent => "user_agent".to_string(),
            Self::Device => "device".to_string(),
            Self::Os => "os".to_string(),
            Self::Browser => "browser".to_string(),
            Self::Sub(n) => format!("sub{n}"),
        }
    }
}

/// Explicit placeholder-value map handed to [`resolve`]. Constructed per
/// request — there is no process-wide macro state.
#[derive(Debug, Clone, Default)]
pub struct MacroValues {
    map: HashMap<MacroKey, String>,
}

impl MacroValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: MacroKey, value: impl Into<String>) -> &mut Self {
        self.map.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &MacroKey) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Populate every placeholder a click can answer for: identity, entity
    /// references, request context, geo, and the sub values plus
    /// denormalized names from the click's macro row.
    pub fn from_click(click: &Click, macros: Option<&ClickMacro>) -> Self {
        let mut values = Self::new();
        values.set(MacroKey::ClickId, click.click_id.clone());
        values.set(MacroKey::Ip, click.ip.clone());
        values.set(MacroKey::UserAgent, click.user_agent.clone());
        values.set(MacroKey::Device, click.device.clone());
        values.set(MacroKey::Os, click.os.clone());
        values.set(MacroKey::Browser, click.browser.clone());
        values.set(MacroKey::Country, click.country.clone());
        values.set(MacroKey::Region, click.region.clone());
        values.set(MacroKey::City, click.city.clone());
        if let Some(id) = click.campaign_id {
            values.set(MacroKey::CampaignId, id.to_string());
        }
        if let Some(id) = click.traffic_channel_id {
            values.set(MacroKey::TrafficChannelId, id.to_string());
        }
        if let Some(id) = click.lander_id {
            values.set(MacroKey::LanderId, id.to_string());
        }
        if let Some(id) = click.offer_id {
            values.set(MacroKey::OfferId, id.to_string());
        }
        if let Some(id) = click.offer_source_id {
            values.set(MacroKey::OfferSourceId, id.to_string());
        }
        if let Some(m) = macros {
            if let Some(name) = &m.campaign_name {
                values.set(MacroKey::CampaignName, name.clone());
            }
            if let Some(name) = &m.traffic_channel_name {
                values.set(MacroKey::TrafficChannelName, name.clone());
            }
            if let Some(name) = &m.offer_name {
                values.set(MacroKey::OfferName, name.clone());
            }
            for (i, sub) in m.subs.iter().enumerate() {
                if let Some(v) = sub {
                    values.set(MacroKey::Sub(i as u8 + 1), v.clone());
                }
            }
        }
        values
    }
}

/// Substitute `{name}` placeholders in `template` from `values`.
///
/// Single pass over the template: substituted values are appended to the
/// output and never re-scanned, so a value containing `{click_id}` cannot
/// trigger a second expansion. Unknown or unpopulated placeholders stay in
/// the output verbatim.
pub fn resolve(template: &str, values: &MacroValues) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match MacroKey::parse(name).and_then(|k| values.get(&k)) {
                    Some(v) => out.push_str(v),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            // Unterminated brace: the remainder is literal text.
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}
