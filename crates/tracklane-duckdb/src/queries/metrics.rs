//! The rollup engine.
//!
//! Every event fans out to one `metrics` row per non-empty subset of its
//! dimension keys, at daily (`hour = -1`) and hourly granularity. Each row
//! update is a single atomic `INSERT ... ON CONFLICT ... DO UPDATE SET
//! counter = counter + excluded.counter` — never a read-then-write — so
//! concurrent hits on the same dimension/bucket cannot lose updates.
//! Derived ratios are recomputed from the row's own counters immediately
//! after each increment.

use anyhow::Result;
use chrono::{NaiveDate, Timelike, Utc};
use tracing::error;

use tracklane_core::metrics::{
    Amounts, BreakdownRow, Counters, Dimensions, EventKind, ReportDimension,
};

use crate::backend::DuckDbBackend;

const UPSERT_SQL: &str = "INSERT INTO metrics (\
        dim_key, date, hour, \
        campaign_id, traffic_channel_id, lander_id, offer_id, offer_source_id, \
        impressions, clicks, lpviews, lpclicks, conversions, total_revenue, total_cost\
     ) VALUES (\
        ?1, CAST(?2 AS DATE), ?3, \
        ?4, ?5, ?6, ?7, ?8, \
        ?9, ?10, ?11, ?12, ?13, ?14, ?15\
     ) \
     ON CONFLICT (dim_key, date, hour) DO UPDATE SET \
        impressions   = impressions   + excluded.impressions, \
        clicks        = clicks        + excluded.clicks, \
        lpviews       = lpviews       + excluded.lpviews, \
        lpclicks      = lpclicks      + excluded.lpclicks, \
        conversions   = conversions   + excluded.conversions, \
        total_revenue = total_revenue + excluded.total_revenue, \
        total_cost    = total_cost    + excluded.total_cost";

const RATIO_SQL: &str = "UPDATE metrics SET \
        profit    = total_revenue - total_cost, \
        ctr       = CASE WHEN impressions > 0 THEN clicks * 100.0 / impressions ELSE 0 END, \
        cr        = CASE WHEN clicks > 0 THEN conversions * 100.0 / clicks ELSE 0 END, \
        offer_cr  = CASE WHEN lpviews > 0 THEN conversions * 100.0 / lpviews ELSE 0 END, \
        cpc       = CASE WHEN clicks > 0 THEN total_cost / clicks ELSE 0 END, \
        cpm       = CASE WHEN impressions > 0 THEN total_cost * 1000.0 / impressions ELSE 0 END, \
        roi       = CASE WHEN total_cost > 0 THEN (total_revenue - total_cost) * 100.0 / total_cost ELSE 0 END, \
        epc       = CASE WHEN clicks > 0 THEN total_revenue / clicks ELSE 0 END, \
        lpepc     = CASE WHEN lpviews > 0 THEN total_revenue / lpviews ELSE 0 END, \
        ctc       = CASE WHEN conversions > 0 THEN total_cost / conversions ELSE 0 END, \
        total_cpa = CASE WHEN conversions > 0 THEN total_cost / conversions ELSE 0 END, \
        total_roi = CASE WHEN total_cost > 0 THEN (total_revenue - total_cost) * 100.0 / total_cost ELSE 0 END \
     WHERE dim_key = ?1 AND date = CAST(?2 AS DATE) AND hour = ?3";

pub(crate) async fn increment_metrics(
    db: &DuckDbBackend,
    event: EventKind,
    dims: &Dimensions,
    amounts: &Amounts,
) -> Result<()> {
    if dims.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let date = now.format("%Y-%m-%d").to_string();
    let hour = now.hour() as i64;

    let conn = db.conn.lock().await;
    for subset in dims.subsets() {
        for bucket in [-1i64, hour] {
            // A failed row must not block the remaining rows of the event.
            if let Err(e) = upsert_row(&conn, event, &subset, amounts, &date, bucket) {
                error!(
                    event = event.as_str(),
                    dim_key = %subset.dim_key(),
                    bucket,
                    error = %e,
                    "metrics row update failed"
                );
            }
        }
    }
    Ok(())
}

fn upsert_row(
    conn: &duckdb::Connection,
    event: EventKind,
    subset: &Dimensions,
    amounts: &Amounts,
    date: &str,
    bucket: i64,
) -> Result<()> {
    let (impressions, clicks, lpviews, lpclicks, conversions) = match event {
        EventKind::Impression => (amounts.count, 0, 0, 0, 0),
        EventKind::Click => (0, amounts.count, 0, 0, 0),
        EventKind::LpView => (0, 0, amounts.count, 0, 0),
        EventKind::LpClick => (0, 0, 0, amounts.count, 0),
        EventKind::Conversion => (0, 0, 0, 0, amounts.count),
    };
    let dim_key = subset.dim_key();

    conn.execute(
        UPSERT_SQL,
        duckdb::params![
            dim_key,
            date,
            bucket,
            subset.campaign_id,
            subset.traffic_channel_id,
            subset.lander_id,
            subset.offer_id,
            subset.offer_source_id,
            impressions,
            clicks,
            lpviews,
            lpclicks,
            conversions,
            amounts.revenue,
            amounts.cost,
        ],
    )?;
    conn.execute(RATIO_SQL, duckdb::params![dim_key, date, bucket])?;
    Ok(())
}

/// SUM fragment shared by the report queries. The CASTs pin DuckDB's
/// HUGEINT/NULL sum results back to the Rust-side types.
const SUM_COLS: &str = "CAST(COALESCE(SUM(impressions), 0) AS BIGINT), \
     CAST(COALESCE(SUM(clicks), 0) AS BIGINT), \
     CAST(COALESCE(SUM(lpviews), 0) AS BIGINT), \
     CAST(COALESCE(SUM(lpclicks), 0) AS BIGINT), \
     CAST(COALESCE(SUM(conversions), 0) AS BIGINT), \
     CAST(COALESCE(SUM(total_revenue), 0) AS DOUBLE), \
     CAST(COALESCE(SUM(total_cost), 0) AS DOUBLE)";

/// Campaign-only rows are the canonical non-overlapping slice: every tracked
/// event carries its campaign, so summing this slice counts each event
/// exactly once. Summing all rows would multi-count — each event touches up
/// to 31 subset rows.
const CAMPAIGN_SLICE: &str = "campaign_id IS NOT NULL AND traffic_channel_id IS NULL \
     AND lander_id IS NULL AND offer_id IS NULL AND offer_source_id IS NULL";

fn counters_at(row: &duckdb::Row<'_>, offset: usize) -> duckdb::Result<Counters> {
    Ok(Counters {
        impressions: row.get(offset)?,
        clicks: row.get(offset + 1)?,
        lpviews: row.get(offset + 2)?,
        lpclicks: row.get(offset + 3)?,
        conversions: row.get(offset + 4)?,
        total_revenue: row.get(offset + 5)?,
        total_cost: row.get(offset + 6)?,
    })
}

pub(crate) async fn metrics_summary(
    db: &DuckDbBackend,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Counters> {
    let conn = db.conn.lock().await;
    let sql = format!(
        "SELECT {SUM_COLS} FROM metrics \
         WHERE hour = -1 AND date BETWEEN CAST(?1 AS DATE) AND CAST(?2 AS DATE) \
           AND {CAMPAIGN_SLICE}"
    );
    let counters = conn.prepare(&sql)?.query_row(
        duckdb::params![start.to_string(), end.to_string()],
        |row| counters_at(row, 0),
    )?;
    Ok(counters)
}

pub(crate) async fn metrics_breakdown(
    db: &DuckDbBackend,
    dimension: ReportDimension,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<BreakdownRow>> {
    match dimension {
        ReportDimension::Campaign => {
            entity_breakdown(db, "campaign_id", "campaigns", start, end).await
        }
        ReportDimension::TrafficChannel => {
            entity_breakdown(db, "traffic_channel_id", "traffic_channels", start, end).await
        }
        ReportDimension::Lander => entity_breakdown(db, "lander_id", "landers", start, end).await,
        ReportDimension::Offer => entity_breakdown(db, "offer_id", "offers", start, end).await,
        ReportDimension::Day => day_breakdown(db, start, end).await,
        ReportDimension::Hour => hour_breakdown(db, start, end).await,
        ReportDimension::Country => country_breakdown(db, start, end).await,
    }
}

/// Breakdown over one entity axis, using that axis's single-dimension rows
/// and joining the entity table for display names.
async fn entity_breakdown(
    db: &DuckDbBackend,
    id_col: &str,
    entity_table: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<BreakdownRow>> {
    let dims = [
        "campaign_id",
        "traffic_channel_id",
        "lander_id",
        "offer_id",
        "offer_source_id",
    ];
    let slice: Vec<String> = dims
        .iter()
        .map(|d| {
            if *d == id_col {
                format!("m.{d} IS NOT NULL")
            } else {
                format!("m.{d} IS NULL")
            }
        })
        .collect();
    let slice = slice.join(" AND ");

    let conn = db.conn.lock().await;
    let sql = format!(
        "SELECT CAST(m.{id_col} AS VARCHAR), COALESCE(e.name, CAST(m.{id_col} AS VARCHAR)), {SUM_COLS} \
         FROM metrics m LEFT JOIN {entity_table} e ON e.id = m.{id_col} \
         WHERE m.hour = -1 AND m.date BETWEEN CAST(?1 AS DATE) AND CAST(?2 AS DATE) AND {slice} \
         GROUP BY m.{id_col}, e.name \
         ORDER BY CAST(COALESCE(SUM(m.clicks), 0) AS BIGINT) DESC, m.{id_col}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        duckdb::params![start.to_string(), end.to_string()],
        |row| {
            Ok(BreakdownRow {
                key: row.get(0)?,
                label: row.get(1)?,
                counters: counters_at(row, 2)?,
            })
        },
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

async fn day_breakdown(
    db: &DuckDbBackend,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<BreakdownRow>> {
    let conn = db.conn.lock().await;
    let sql = format!(
        "SELECT CAST(date AS VARCHAR), {SUM_COLS} FROM metrics \
         WHERE hour = -1 AND date BETWEEN CAST(?1 AS DATE) AND CAST(?2 AS DATE) \
           AND {CAMPAIGN_SLICE} \
         GROUP BY date ORDER BY date"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        duckdb::params![start.to_string(), end.to_string()],
        |row| {
            let day: String = row.get(0)?;
            Ok(BreakdownRow {
                key: day.clone(),
                label: day,
                counters: counters_at(row, 1)?,
            })
        },
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Hour-of-day profile across the requested range, from the hourly buckets.
async fn hour_breakdown(
    db: &DuckDbBackend,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<BreakdownRow>> {
    let conn = db.conn.lock().await;
    let sql = format!(
        "SELECT CAST(hour AS BIGINT), {SUM_COLS} FROM metrics \
         WHERE hour >= 0 AND date BETWEEN CAST(?1 AS DATE) AND CAST(?2 AS DATE) \
           AND {CAMPAIGN_SLICE} \
         GROUP BY hour ORDER BY hour"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        duckdb::params![start.to_string(), end.to_string()],
        |row| {
            let hour: i64 = row.get(0)?;
            Ok(BreakdownRow {
                key: hour.to_string(),
                label: format!("{hour:02}:00"),
                counters: counters_at(row, 1)?,
            })
        },
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Country is not a rollup dimension — the breakdown aggregates the clicks
/// table instead. Impressions and lpclicks are not attributable to a
/// country and report as zero here.
async fn country_breakdown(
    db: &DuckDbBackend,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<BreakdownRow>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(
        "SELECT country, \
            CAST(COUNT(*) AS BIGINT), \
            CAST(COALESCE(SUM(CASE WHEN landing_page_viewed THEN 1 ELSE 0 END), 0) AS BIGINT), \
            CAST(COALESCE(SUM(CASE WHEN conversion THEN 1 ELSE 0 END), 0) AS BIGINT), \
            CAST(COALESCE(SUM(revenue), 0) AS DOUBLE), \
            CAST(COALESCE(SUM(cost), 0) AS DOUBLE) \
         FROM clicks \
         WHERE CAST(created_at AS DATE) BETWEEN CAST(?1 AS DATE) AND CAST(?2 AS DATE) \
         GROUP BY country ORDER BY COUNT(*) DESC, country",
    )?;
    let rows = stmt.query_map(
        duckdb::params![start.to_string(), end.to_string()],
        |row| {
            let country: String = row.get(0)?;
            Ok(BreakdownRow {
                key: country.clone(),
                label: country,
                counters: Counters {
                    impressions: 0,
                    clicks: row.get(1)?,
                    lpviews: row.get(2)?,
                    lpclicks: 0,
                    conversions: row.get(3)?,
                    total_revenue: row.get(4)?,
                    total_cost: row.get(5)?,
                },
            })
        },
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DuckDbBackend;

    fn dims(campaign: i64, channel: i64) -> Dimensions {
        Dimensions {
            campaign_id: Some(campaign),
            traffic_channel_id: Some(channel),
            ..Default::default()
        }
    }

    async fn row_clicks(db: &DuckDbBackend, dim_key: &str, hour: i64) -> Option<i64> {
        let conn = db.conn.lock().await;
        conn.prepare("SELECT clicks FROM metrics WHERE dim_key = ?1 AND hour = ?2")
            .ok()?
            .query_row(duckdb::params![dim_key, hour], |row| row.get(0))
            .ok()
    }

    #[tokio::test]
    async fn click_event_touches_every_subset_and_nothing_else() {
        let db = DuckDbBackend::open_in_memory().expect("in-memory duckdb");
        increment_metrics(&db, EventKind::Click, &dims(5, 9), &Amounts::default())
            .await
            .expect("increment");

        // Exactly the three non-empty subsets get +1 clicks at daily grain.
        assert_eq!(row_clicks(&db, "c:5", -1).await, Some(1));
        assert_eq!(row_clicks(&db, "t:9", -1).await, Some(1));
        assert_eq!(row_clicks(&db, "c:5|t:9", -1).await, Some(1));

        // And the same subsets exist at hourly grain; total rows = 3 x 2.
        let total: i64 = {
            let conn = db.conn.lock().await;
            conn.prepare("SELECT COUNT(*) FROM metrics")
                .expect("prepare")
                .query_row([], |row| row.get(0))
                .expect("count")
        };
        assert_eq!(total, 6);
    }

    #[tokio::test]
    async fn repeat_increments_accumulate_atomically() {
        let db = DuckDbBackend::open_in_memory().expect("in-memory duckdb");
        let d = dims(1, 2);
        for _ in 0..3 {
            increment_metrics(&db, EventKind::Click, &d, &Amounts { count: 1, revenue: 0.0, cost: 0.5 })
                .await
                .expect("increment");
        }
        assert_eq!(row_clicks(&db, "c:1|t:2", -1).await, Some(3));

        let (cost, cpc): (f64, f64) = {
            let conn = db.conn.lock().await;
            conn.prepare("SELECT total_cost, cpc FROM metrics WHERE dim_key = 'c:1|t:2' AND hour = -1")
                .expect("prepare")
                .query_row([], |row| Ok((row.get(0)?, row.get(1)?)))
                .expect("row")
        };
        assert!((cost - 1.5).abs() < 1e-9);
        assert!((cpc - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn ratios_recomputed_after_each_event() {
        let db = DuckDbBackend::open_in_memory().expect("in-memory duckdb");
        let d = Dimensions {
            campaign_id: Some(7),
            ..Default::default()
        };
        increment_metrics(
            &db,
            EventKind::Impression,
            &d,
            &Amounts { count: 1000, revenue: 0.0, cost: 100.0 },
        )
        .await
        .expect("impressions");
        increment_metrics(&db, EventKind::Click, &d, &Amounts { count: 50, revenue: 0.0, cost: 0.0 })
            .await
            .expect("clicks");
        increment_metrics(
            &db,
            EventKind::Conversion,
            &d,
            &Amounts { count: 5, revenue: 250.0, cost: 0.0 },
        )
        .await
        .expect("conversions");

        let (ctr, cr, cpc, cpm, roi, epc): (f64, f64, f64, f64, f64, f64) = {
            let conn = db.conn.lock().await;
            conn.prepare(
                "SELECT ctr, cr, cpc, cpm, roi, epc FROM metrics WHERE dim_key = 'c:7' AND hour = -1",
            )
            .expect("prepare")
            .query_row([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .expect("row")
        };
        assert_eq!(ctr, 5.0);
        assert_eq!(cr, 10.0);
        assert_eq!(cpc, 2.0);
        assert_eq!(cpm, 100.0);
        assert_eq!(roi, 150.0);
        assert_eq!(epc, 5.0);
    }

    #[tokio::test]
    async fn summary_uses_campaign_slice_only() {
        let db = DuckDbBackend::open_in_memory().expect("in-memory duckdb");
        increment_metrics(&db, EventKind::Click, &dims(1, 2), &Amounts::default())
            .await
            .expect("increment");

        let today = Utc::now().date_naive();
        let summary = metrics_summary(&db, today, today).await.expect("summary");
        // One event: the campaign-only slice counts it exactly once even
        // though three subset rows were written.
        assert_eq!(summary.clicks, 1);
    }

    #[tokio::test]
    async fn empty_dimensions_write_nothing() {
        let db = DuckDbBackend::open_in_memory().expect("in-memory duckdb");
        increment_metrics(&db, EventKind::Click, &Dimensions::default(), &Amounts::default())
            .await
            .expect("increment");
        let total: i64 = {
            let conn = db.conn.lock().await;
            conn.prepare("SELECT COUNT(*) FROM metrics")
                .expect("prepare")
                .query_row([], |row| row.get(0))
                .expect("count")
        };
        assert_eq!(total, 0);
    }
}
