use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use tracklane_core::click::{Click, ClickMacro, SUB_COUNT};

use crate::backend::DuckDbBackend;

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

pub(crate) fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

const CLICK_COLS: &str = "click_id, campaign_id, traffic_channel_id, lander_id, offer_id, \
     offer_source_id, ip, user_agent, referer, device, os, browser, country, region, city, \
     landing_page_viewed, CAST(lp_view_time AS VARCHAR), conversion, \
     CAST(conversion_time AS VARCHAR), revenue, cost, profit, CAST(created_at AS VARCHAR)";

fn click_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Click> {
    let lp_view_time: Option<String> = row.get(16)?;
    let conversion_time: Option<String> = row.get(18)?;
    let created_at: String = row.get(22)?;
    Ok(Click {
        click_id: row.get(0)?,
        campaign_id: row.get(1)?,
        traffic_channel_id: row.get(2)?,
        lander_id: row.get(3)?,
        offer_id: row.get(4)?,
        offer_source_id: row.get(5)?,
        ip: row.get(6)?,
        user_agent: row.get(7)?,
        referer: row.get(8)?,
        device: row.get(9)?,
        os: row.get(10)?,
        browser: row.get(11)?,
        country: row.get(12)?,
        region: row.get(13)?,
        city: row.get(14)?,
        landing_page_viewed: row.get(15)?,
        lp_view_time: lp_view_time.as_deref().and_then(parse_ts),
        conversion: row.get(17)?,
        conversion_time: conversion_time.as_deref().and_then(parse_ts),
        revenue: row.get(19)?,
        cost: row.get(20)?,
        profit: row.get(21)?,
        created_at: parse_ts(&created_at).unwrap_or_else(Utc::now),
    })
}

/// Persist a click, then (best-effort) its macro row.
///
/// The two inserts are deliberately NOT one transaction: the click must
/// survive a macro-row failure so the redirect and later attribution keep
/// working with the macro fields simply absent.
pub(crate) async fn insert_click(
    db: &DuckDbBackend,
    click: &Click,
    macros: Option<&ClickMacro>,
) -> Result<()> {
    let conn = db.conn.lock().await;

    conn.execute(
        "INSERT INTO clicks (\
            click_id, campaign_id, traffic_channel_id, lander_id, offer_id, offer_source_id, \
            ip, user_agent, referer, device, os, browser, country, region, city, \
            landing_page_viewed, conversion, revenue, cost, profit, created_at\
         ) VALUES (\
            ?1, ?2, ?3, ?4, ?5, ?6, \
            ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
            ?16, ?17, ?18, ?19, ?20, CAST(?21 AS TIMESTAMP)\
         )",
        duckdb::params![
            click.click_id,
            click.campaign_id,
            click.traffic_channel_id,
            click.lander_id,
            click.offer_id,
            click.offer_source_id,
            click.ip,
            click.user_agent,
            click.referer,
            click.device,
            click.os,
            click.browser,
            click.country,
            click.region,
            click.city,
            click.landing_page_viewed,
            click.conversion,
            click.revenue,
            click.cost,
            click.profit,
            format_ts(click.created_at),
        ],
    )?;

    if let Some(m) = macros {
        if let Err(e) = insert_click_macro(&conn, m) {
            warn!(click_id = %click.click_id, error = %e, "macro row insert failed; click kept");
        }
    }

    Ok(())
}

fn insert_click_macro(conn: &duckdb::Connection, m: &ClickMacro) -> Result<()> {
    if m.subs.len() != SUB_COUNT {
        return Err(anyhow!(
            "macro row for {} has {} sub slots, expected {SUB_COUNT}",
            m.click_id,
            m.subs.len()
        ));
    }
    conn.execute(
        "INSERT INTO click_macros (\
            click_id, campaign_name, traffic_channel_name, offer_name, \
            sub1, sub2, sub3, sub4, sub5, sub6, sub7, sub8, sub9, sub10, \
            sub11, sub12, sub13, sub14, sub15, sub16, sub17, sub18, sub19, sub20, \
            sub21, sub22, sub23\
         ) VALUES (\
            ?1, ?2, ?3, ?4, \
            ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
            ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, \
            ?25, ?26, ?27\
         )",
        duckdb::params![
            m.click_id,
            m.campaign_name,
            m.traffic_channel_name,
            m.offer_name,
            m.subs[0],
            m.subs[1],
            m.subs[2],
            m.subs[3],
            m.subs[4],
            m.subs[5],
            m.subs[6],
            m.subs[7],
            m.subs[8],
            m.subs[9],
            m.subs[10],
            m.subs[11],
            m.subs[12],
            m.subs[13],
            m.subs[14],
            m.subs[15],
            m.subs[16],
            m.subs[17],
            m.subs[18],
            m.subs[19],
            m.subs[20],
            m.subs[21],
            m.subs[22],
        ],
    )?;
    Ok(())
}

pub(crate) async fn click_by_id(db: &DuckDbBackend, click_id: &str) -> Result<Option<Click>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(&format!("SELECT {CLICK_COLS} FROM clicks WHERE click_id = ?1"))?;
    let mut rows = stmt.query_map(duckdb::params![click_id], click_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub(crate) async fn click_macro_by_id(
    db: &DuckDbBackend,
    click_id: &str,
) -> Result<Option<ClickMacro>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(
        "SELECT click_id, campaign_name, traffic_channel_name, offer_name, \
            sub1, sub2, sub3, sub4, sub5, sub6, sub7, sub8, sub9, sub10, \
            sub11, sub12, sub13, sub14, sub15, sub16, sub17, sub18, sub19, sub20, \
            sub21, sub22, sub23 \
         FROM click_macros WHERE click_id = ?1",
    )?;
    let mut rows = stmt.query_map(duckdb::params![click_id], |row| {
        let mut subs = Vec::with_capacity(SUB_COUNT);
        for i in 0..SUB_COUNT {
            subs.push(row.get::<_, Option<String>>(4 + i)?);
        }
        Ok(ClickMacro {
            click_id: row.get(0)?,
            campaign_name: row.get(1)?,
            traffic_channel_name: row.get(2)?,
            offer_name: row.get(3)?,
            subs,
        })
    })?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// Set `landing_page_viewed` once. The WHERE clause makes the transition
/// idempotent: only the first call changes a row, and only that call
/// returns `true`, so the caller can gate the lpview counter increment.
pub(crate) async fn mark_lander_view(db: &DuckDbBackend, click_id: &str) -> Result<bool> {
    let conn = db.conn.lock().await;
    let changed = conn.execute(
        "UPDATE clicks SET landing_page_viewed = TRUE, lp_view_time = CAST(?2 AS TIMESTAMP) \
         WHERE click_id = ?1 AND landing_page_viewed = FALSE",
        duckdb::params![click_id, format_ts(Utc::now())],
    )?;
    Ok(changed > 0)
}

/// One-way conversion transition: flag, timestamp, revenue, and
/// `profit = revenue - cost` in a single statement, then read the row back.
pub(crate) async fn apply_conversion(
    db: &DuckDbBackend,
    click_id: &str,
    revenue: f64,
) -> Result<Click> {
    let conn = db.conn.lock().await;
    let changed = conn.execute(
        "UPDATE clicks SET conversion = TRUE, conversion_time = CAST(?3 AS TIMESTAMP), \
            revenue = ?2, profit = ?2 - cost \
         WHERE click_id = ?1",
        duckdb::params![click_id, revenue, format_ts(Utc::now())],
    )?;
    if changed == 0 {
        return Err(anyhow!("click {click_id} not found"));
    }
    let mut stmt = conn.prepare(&format!("SELECT {CLICK_COLS} FROM clicks WHERE click_id = ?1"))?;
    let click = stmt.query_row(duckdb::params![click_id], click_from_row)?;
    Ok(click)
}
