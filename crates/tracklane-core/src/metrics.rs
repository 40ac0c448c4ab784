//! Rollup dimension math: subset enumeration, canonical row keys, counter
//! shapes and the derived-ratio formulas.
//!
//! Every tracked event fans out to one rollup row per non-empty subset of
//! the entity dimensions implicated by that event, at daily and hourly
//! granularity. That write amplification is deliberate: reporting reads are
//! O(1) row lookups instead of raw-event scans.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Impression,
    Click,
    LpView,
    LpClick,
    Conversion,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Impression => "impression",
            Self::Click => "click",
            Self::LpView => "lpview",
            Self::LpClick => "lpclick",
            Self::Conversion => "conversion",
        }
    }
}

/// The entity axes an event can implicate. `None` fields simply do not
/// participate in the fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub campaign_id: Option<i64>,
    pub traffic_channel_id: Option<i64>,
    pub lander_id: Option<i64>,
    pub offer_id: Option<i64>,
    pub offer_source_id: Option<i64>,
}

impl Dimensions {
    pub fn is_empty(&self) -> bool {
        self.campaign_id.is_none()
            && self.traffic_channel_id.is_none()
            && self.lander_id.is_none()
            && self.offer_id.is_none()
            && self.offer_source_id.is_none()
    }

    /// Canonical row key: populated segments in fixed `c/t/l/o/s` order,
    /// joined by `|` — e.g. `"c:5|t:9"`. Two subsets with the same populated
    /// ids always produce the same key, which is what the rollup upsert
    /// conflicts on.
    pub fn dim_key(&self) -> String {
        let mut parts = Vec::new();
        if let Some(id) = self.campaign_id {
            parts.push(format!("c:{id}"));
        }
        if let Some(id) = self.traffic_channel_id {
            parts.push(format!("t:{id}"));
        }
        if let Some(id) = self.lander_id {
            parts.push(format!("l:{id}"));
        }
        if let Some(id) = self.offer_id {
            parts.push(format!("o:{id}"));
        }
        if let Some(id) = self.offer_source_id {
            parts.push(format!("s:{id}"));
        }
        parts.join("|")
    }

    /// All non-empty subsets of the populated dimensions. With k populated
    /// axes this yields 2^k - 1 entries; k is at most 5.
    pub fn subsets(&self) -> Vec<Dimensions> {
        let fields = [
            self.campaign_id,
            self.traffic_channel_id,
            self.lander_id,
            self.offer_id,
            self.offer_source_id,
        ];
        let present: Vec<usize> = (0..fields.len()).filter(|&i| fields[i].is_some()).collect();
        let mut out = Vec::with_capacity((1usize << present.len()).saturating_sub(1));
        for mask in 1u32..(1u32 << present.len()) {
            let mut d = Dimensions::default();
            for (bit, &idx) in present.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    match idx {
                        0 => d.campaign_id = fields[0],
                        1 => d.traffic_channel_id = fields[1],
                        2 => d.lander_id = fields[2],
                        3 => d.offer_id = fields[3],
                        _ => d.offer_source_id = fields[4],
                    }
                }
            }
            out.push(d);
        }
        out
    }
}

/// Increment amounts for one event. `count` feeds the event's own counter;
/// revenue/cost feed the money columns.
#[derive(Debug, Clone, Copy)]
pub struct Amounts {
    pub count: i64,
    pub revenue: f64,
    pub cost: f64,
}

impl Default for Amounts {
    fn default() -> Self {
        Self {
            count: 1,
            revenue: 0.0,
            cost: 0.0,
        }
    }
}

/// Raw counters of a rollup row or a summed report window. All monotonically
/// non-decreasing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Counters {
    pub impressions: i64,
    pub clicks: i64,
    pub lpviews: i64,
    pub lpclicks: i64,
    pub conversions: i64,
    pub total_revenue: f64,
    pub total_cost: f64,
}

impl Counters {
    pub fn profit(&self) -> f64 {
        self.total_revenue - self.total_cost
    }

    pub fn ratios(&self) -> Ratios {
        let imp = self.impressions as f64;
        let clk = self.clicks as f64;
        let lpv = self.lpviews as f64;
        let cnv = self.conversions as f64;
        let rev = self.total_revenue;
        let cost = self.total_cost;
        let roi = ratio(rev - cost, cost, 100.0);
        let cpa = ratio(cost, cnv, 1.0);
        Ratios {
            ctr: ratio(clk, imp, 100.0),
            cr: ratio(cnv, clk, 100.0),
            offer_cr: ratio(cnv, lpv, 100.0),
            cpc: ratio(cost, clk, 1.0),
            cpm: ratio(cost, imp, 1000.0),
            roi,
            epc: ratio(rev, clk, 1.0),
            lpepc: ratio(rev, lpv, 1.0),
            ctc: cpa,
            total_cpa: cpa,
            total_roi: roi,
        }
    }
}

/// Derived fields. Recomputed from counters after every write — never
/// accumulated independently.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Ratios {
    pub ctr: f64,
    pub cr: f64,
    pub offer_cr: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub roi: f64,
    pub epc: f64,
    pub lpepc: f64,
    pub ctc: f64,
    pub total_cpa: f64,
    pub total_roi: f64,
}

fn ratio(numerator: f64, denominator: f64, scale: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * scale
    } else {
        0.0
    }
}

/// Counters + profit + every derived ratio, flattened — the shape both the
/// report summary and each breakdown row serialize to.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReportEntry {
    #[serde(flatten)]
    pub counters: Counters,
    pub profit: f64,
    #[serde(flatten)]
    pub ratios: Ratios,
}

impl From<Counters> for ReportEntry {
    fn from(counters: Counters) -> Self {
        Self {
            profit: counters.profit(),
            ratios: counters.ratios(),
            counters,
        }
    }
}

/// One breakdown row: the dimension value plus the full metric shape.
#[derive(Debug, Clone)]
pub struct BreakdownRow {
    pub key: String,
    pub label: String,
    pub counters: Counters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDimension {
    Campaign,
    TrafficChannel,
    Lander,
    Offer,
    Day,
    Hour,
    Country,
}

impl ReportDimension {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "campaign" => Some(Self::Campaign),
            "traffic_channel" => Some(Self::TrafficChannel),
            "lander" => Some(Self::Lander),
            "offer" => Some(Self::Offer),
            "day" => Some(Self::Day),
            "hour" => Some(Self::Hour),
            "country" => Some(Self::Country),
            _ => None,
        }
    }
}
