use anyhow::Result;
use uuid::Uuid;

use tracklane_core::click::{Conversion, NewConversion, NewPostbackLog};

use crate::backend::DuckDbBackend;

const CONVERSION_COLS: &str = "id, click_id, payout, revenue, status, event_name, metadata, \
     postback_sent, postback_response, CAST(created_at AS VARCHAR)";

fn conversion_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Conversion> {
    Ok(Conversion {
        id: row.get(0)?,
        click_id: row.get(1)?,
        payout: row.get(2)?,
        revenue: row.get(3)?,
        status: row.get(4)?,
        event_name: row.get(5)?,
        metadata: row.get(6)?,
        postback_sent: row.get(7)?,
        postback_response: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert-or-return-existing on `click_id`.
///
/// The check and the insert run under the single connection mutex, so the
/// pair is atomic in-process; the UNIQUE constraint on `click_id` backstops
/// it at the storage level. Returns `(row, created)` — a repeat attribution
/// gets the original row back with `created = false` and the caller must
/// not re-increment metrics or re-send postbacks.
pub(crate) async fn record_conversion(
    db: &DuckDbBackend,
    conversion: NewConversion,
) -> Result<(Conversion, bool)> {
    let conn = db.conn.lock().await;

    let existing = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSION_COLS} FROM conversions WHERE click_id = ?1"
        ))?;
        let mut rows = stmt.query_map(duckdb::params![conversion.click_id], conversion_from_row)?;
        match rows.next() {
            Some(row) => Some(row?),
            None => None,
        }
    };
    if let Some(row) = existing {
        return Ok((row, false));
    }

    let id = format!("cv_{}", Uuid::new_v4().simple());
    conn.execute(
        "INSERT INTO conversions (id, click_id, payout, revenue, status, event_name, metadata) \
         VALUES (?1, ?2, ?3, ?4, 'approved', ?5, ?6)",
        duckdb::params![
            id,
            conversion.click_id,
            conversion.payout,
            conversion.revenue,
            conversion.event_name,
            conversion.metadata,
        ],
    )?;

    let row = conn
        .prepare(&format!(
            "SELECT {CONVERSION_COLS} FROM conversions WHERE id = ?1"
        ))?
        .query_row(duckdb::params![id], conversion_from_row)?;
    Ok((row, true))
}

pub(crate) async fn set_postback_result(
    db: &DuckDbBackend,
    conversion_id: &str,
    sent: bool,
    response: Option<&str>,
) -> Result<()> {
    let conn = db.conn.lock().await;
    conn.execute(
        "UPDATE conversions SET postback_sent = ?2, postback_response = ?3 WHERE id = ?1",
        duckdb::params![conversion_id, sent, response],
    )?;
    Ok(())
}

/// Log a raw inbound postback before attribution runs, so failed
/// attributions remain replayable. Returns the log row id.
pub(crate) async fn log_postback(db: &DuckDbBackend, entry: NewPostbackLog) -> Result<i64> {
    let conn = db.conn.lock().await;
    let id: i64 = conn
        .prepare("SELECT nextval('postback_logs_id_seq')")?
        .query_row([], |row| row.get(0))?;
    conn.execute(
        "INSERT INTO postback_logs (id, offer_source_id, click_id, payout, currency, raw_params) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        duckdb::params![
            id,
            entry.offer_source_id,
            entry.click_id,
            entry.payout,
            entry.currency,
            entry.raw_params,
        ],
    )?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DuckDbBackend;

    fn new_conversion(click_id: &str, revenue: f64) -> NewConversion {
        NewConversion {
            click_id: click_id.to_string(),
            payout: revenue,
            revenue,
            event_name: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn second_attribution_returns_original_row() {
        let db = DuckDbBackend::open_in_memory().expect("in-memory duckdb");

        let (first, created) = record_conversion(&db, new_conversion("clk_a", 12.5))
            .await
            .expect("first");
        assert!(created);
        assert_eq!(first.revenue, 12.5);

        // Retried postback with a different payout: original row wins.
        let (second, created) = record_conversion(&db, new_conversion("clk_a", 99.0))
            .await
            .expect("second");
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.revenue, 12.5);
    }

    #[tokio::test]
    async fn postback_result_is_recorded() {
        let db = DuckDbBackend::open_in_memory().expect("in-memory duckdb");
        let (row, _) = record_conversion(&db, new_conversion("clk_b", 5.0))
            .await
            .expect("record");
        set_postback_result(&db, &row.id, true, Some("200 OK"))
            .await
            .expect("update");

        let conn = db.conn.lock().await;
        let (sent, response): (bool, Option<String>) = conn
            .prepare("SELECT postback_sent, postback_response FROM conversions WHERE id = ?1")
            .expect("prepare")
            .query_row(duckdb::params![row.id], |r| Ok((r.get(0)?, r.get(1)?)))
            .expect("row");
        assert!(sent);
        assert_eq!(response.as_deref(), Some("200 OK"));
    }

    #[tokio::test]
    async fn postback_log_ids_are_sequential() {
        let db = DuckDbBackend::open_in_memory().expect("in-memory duckdb");
        let entry = NewPostbackLog {
            offer_source_id: 1,
            click_id: "clk_c".to_string(),
            payout: 3.0,
            currency: Some("USD".to_string()),
            raw_params: "{}".to_string(),
        };
        let first = log_postback(&db, entry.clone()).await.expect("first");
        let second = log_postback(&db, entry).await.expect("second");
        assert_eq!(second, first + 1);
    }
}
