use std::collections::HashMap;

use anyhow::Result;
use duckdb::Connection;

use tracklane_core::entities::{
    Campaign, CreateCampaignParams, CreateLanderParams, CreateOfferParams,
    CreateOfferSourceParams, CreateTrafficChannelParams, Lander, Offer, OfferSource,
    TrafficChannel,
};

use crate::backend::{rand_token, DuckDbBackend};

/// Campaign tokens look like `cmp_x4k2p0q9ab` — the part of the tracking
/// link that is safe to hand to an ad platform.
fn generate_unique_id() -> String {
    format!("cmp_{}", rand_token(10))
}

fn next_id(conn: &Connection, sequence: &str) -> Result<i64> {
    let id: i64 = conn
        .prepare(&format!("SELECT nextval('{sequence}')"))?
        .query_row([], |row| row.get(0))?;
    Ok(id)
}

const CAMPAIGN_COLS: &str = "id, unique_id, name, traffic_channel_id, lander_id, offer_id, \
     direct_linking, is_active, promoting_url, CAST(created_at AS VARCHAR)";

fn campaign_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Campaign> {
    Ok(Campaign {
        id: row.get(0)?,
        unique_id: row.get(1)?,
        name: row.get(2)?,
        traffic_channel_id: row.get(3)?,
        lander_id: row.get(4)?,
        offer_id: row.get(5)?,
        direct_linking: row.get(6)?,
        is_active: row.get(7)?,
        promoting_url: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub(crate) async fn create_campaign(
    db: &DuckDbBackend,
    params: CreateCampaignParams,
) -> Result<Campaign> {
    let conn = db.conn.lock().await;
    let id = next_id(&conn, "campaigns_id_seq")?;
    let unique_id = generate_unique_id();
    let promoting_url = params
        .promoting_url
        .replace("{unique_id}", &unique_id);

    conn.execute(
        "INSERT INTO campaigns \
         (id, unique_id, name, traffic_channel_id, lander_id, offer_id, direct_linking, is_active, promoting_url) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        duckdb::params![
            id,
            unique_id,
            params.name,
            params.traffic_channel_id,
            params.lander_id,
            params.offer_id,
            params.direct_linking,
            params.is_active,
            promoting_url,
        ],
    )?;

    let campaign = conn
        .prepare(&format!(
            "SELECT {CAMPAIGN_COLS} FROM campaigns WHERE id = ?1"
        ))?
        .query_row(duckdb::params![id], campaign_from_row)?;
    Ok(campaign)
}

pub(crate) async fn list_campaigns(db: &DuckDbBackend) -> Result<Vec<Campaign>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {CAMPAIGN_COLS} FROM campaigns ORDER BY id"
    ))?;
    let rows = stmt.query_map([], campaign_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(crate) async fn campaign_by_unique_id(
    db: &DuckDbBackend,
    unique_id: &str,
) -> Result<Option<Campaign>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {CAMPAIGN_COLS} FROM campaigns WHERE unique_id = ?1"
    ))?;
    let mut rows = stmt.query_map(duckdb::params![unique_id], campaign_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub(crate) async fn campaign_by_id(db: &DuckDbBackend, id: i64) -> Result<Option<Campaign>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {CAMPAIGN_COLS} FROM campaigns WHERE id = ?1"
    ))?;
    let mut rows = stmt.query_map(duckdb::params![id], campaign_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

const CHANNEL_COLS: &str =
    "id, name, macro_format, postback_url, cost_per_click, CAST(created_at AS VARCHAR)";

fn channel_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<TrafficChannel> {
    let macro_format: Option<String> = row.get(2)?;
    Ok(TrafficChannel {
        id: row.get(0)?,
        name: row.get(1)?,
        macro_format: macro_format
            .as_deref()
            .and_then(|raw| serde_json::from_str::<HashMap<String, String>>(raw).ok()),
        postback_url: row.get(3)?,
        cost_per_click: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) async fn create_traffic_channel(
    db: &DuckDbBackend,
    params: CreateTrafficChannelParams,
) -> Result<TrafficChannel> {
    let conn = db.conn.lock().await;
    let id = next_id(&conn, "traffic_channels_id_seq")?;
    let macro_format = params
        .macro_format
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO traffic_channels (id, name, macro_format, postback_url, cost_per_click) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        duckdb::params![
            id,
            params.name,
            macro_format,
            params.postback_url,
            params.cost_per_click,
        ],
    )?;

    let channel = conn
        .prepare(&format!(
            "SELECT {CHANNEL_COLS} FROM traffic_channels WHERE id = ?1"
        ))?
        .query_row(duckdb::params![id], channel_from_row)?;
    Ok(channel)
}

pub(crate) async fn list_traffic_channels(db: &DuckDbBackend) -> Result<Vec<TrafficChannel>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHANNEL_COLS} FROM traffic_channels ORDER BY id"
    ))?;
    let rows = stmt.query_map([], channel_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(crate) async fn traffic_channel_by_id(
    db: &DuckDbBackend,
    id: i64,
) -> Result<Option<TrafficChannel>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHANNEL_COLS} FROM traffic_channels WHERE id = ?1"
    ))?;
    let mut rows = stmt.query_map(duckdb::params![id], channel_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

const LANDER_COLS: &str = "id, name, url, CAST(created_at AS VARCHAR)";

fn lander_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Lander> {
    Ok(Lander {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) async fn create_lander(
    db: &DuckDbBackend,
    params: CreateLanderParams,
) -> Result<Lander> {
    let conn = db.conn.lock().await;
    let id = next_id(&conn, "landers_id_seq")?;
    conn.execute(
        "INSERT INTO landers (id, name, url) VALUES (?1, ?2, ?3)",
        duckdb::params![id, params.name, params.url],
    )?;
    let lander = conn
        .prepare(&format!("SELECT {LANDER_COLS} FROM landers WHERE id = ?1"))?
        .query_row(duckdb::params![id], lander_from_row)?;
    Ok(lander)
}

pub(crate) async fn list_landers(db: &DuckDbBackend) -> Result<Vec<Lander>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!("SELECT {LANDER_COLS} FROM landers ORDER BY id"))?;
    let rows = stmt.query_map([], lander_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(crate) async fn lander_by_id(db: &DuckDbBackend, id: i64) -> Result<Option<Lander>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!("SELECT {LANDER_COLS} FROM landers WHERE id = ?1"))?;
    let mut rows = stmt.query_map(duckdb::params![id], lander_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

const OFFER_COLS: &str = "id, name, url, payout, offer_source_id, CAST(created_at AS VARCHAR)";

fn offer_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Offer> {
    Ok(Offer {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        payout: row.get(3)?,
        offer_source_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) async fn create_offer(db: &DuckDbBackend, params: CreateOfferParams) -> Result<Offer> {
    let conn = db.conn.lock().await;
    let id = next_id(&conn, "offers_id_seq")?;
    conn.execute(
        "INSERT INTO offers (id, name, url, payout, offer_source_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        duckdb::params![id, params.name, params.url, params.payout, params.offer_source_id],
    )?;
    let offer = conn
        .prepare(&format!("SELECT {OFFER_COLS} FROM offers WHERE id = ?1"))?
        .query_row(duckdb::params![id], offer_from_row)?;
    Ok(offer)
}

pub(crate) async fn list_offers(db: &DuckDbBackend) -> Result<Vec<Offer>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!("SELECT {OFFER_COLS} FROM offers ORDER BY id"))?;
    let rows = stmt.query_map([], offer_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(crate) async fn offer_by_id(db: &DuckDbBackend, id: i64) -> Result<Option<Offer>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!("SELECT {OFFER_COLS} FROM offers WHERE id = ?1"))?;
    let mut rows = stmt.query_map(duckdb::params![id], offer_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

const SOURCE_COLS: &str = "id, name, payout, CAST(created_at AS VARCHAR)";

fn source_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<OfferSource> {
    Ok(OfferSource {
        id: row.get(0)?,
        name: row.get(1)?,
        payout: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) async fn create_offer_source(
    db: &DuckDbBackend,
    params: CreateOfferSourceParams,
) -> Result<OfferSource> {
    let conn = db.conn.lock().await;
    let id = next_id(&conn, "offer_sources_id_seq")?;
    conn.execute(
        "INSERT INTO offer_sources (id, name, payout) VALUES (?1, ?2, ?3)",
        duckdb::params![id, params.name, params.payout],
    )?;
    let source = conn
        .prepare(&format!(
            "SELECT {SOURCE_COLS} FROM offer_sources WHERE id = ?1"
        ))?
        .query_row(duckdb::params![id], source_from_row)?;
    Ok(source)
}

pub(crate) async fn list_offer_sources(db: &DuckDbBackend) -> Result<Vec<OfferSource>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {SOURCE_COLS} FROM offer_sources ORDER BY id"
    ))?;
    let rows = stmt.query_map([], source_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(crate) async fn offer_source_by_id(
    db: &DuckDbBackend,
    id: i64,
) -> Result<Option<OfferSource>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {SOURCE_COLS} FROM offer_sources WHERE id = ?1"
    ))?;
    let mut rows = stmt.query_map(duckdb::params![id], source_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}
