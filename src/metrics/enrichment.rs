//! Secondary lookups that decorate the dashboard but never fail a request.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use super::sql::{conversion_failure, placeholders, query_rows, Args};
use super::{AppointmentCounts, Appointments, ExtractScope, Freshness};
use crate::date_util::roll_back_to_weekday;
use crate::window::{local_midnight_utc, TIMESTAMP_FORMAT};

/// Days of call history scanned for the last full day.
const FULL_DAY_LOOKBACK_DAYS: i64 = 14;
/// A local day needs more than this many calls to count as complete.
const FULL_DAY_MIN_CALLS: i64 = 10;

/// Result of an optional query. Failures are logged and replaced with
/// `Unavailable` so the caller can render without them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum Enrichment<T> {
    Available(T),
    Unavailable,
}

impl<T> Enrichment<T> {
    pub fn from_result<E: fmt::Display>(label: &str, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Enrichment::Available(value),
            Err(e) => {
                log::warn!("[{label}] {e}");
                Enrichment::Unavailable
            }
        }
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            Enrichment::Available(value) => Some(value),
            Enrichment::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Enrichment::Available(_))
    }
}

/// Scheduled appointments from local midnight today onward, split into
/// today and later.
pub fn appointments(
    conn: &Connection,
    scope: &ExtractScope,
) -> Result<Appointments, rusqlite::Error> {
    let sql = format!(
        "SELECT user_id, date(date, ?) AS appt_day,
                CASE
                  WHEN text LIKE '%Discussion%' THEN 'disc'
                  WHEN text LIKE '%Follow%' THEN 'fu'
                  WHEN text LIKE '%Question%' THEN 'q'
                  ELSE 'other'
                END AS kind,
                COUNT(*)
         FROM lead_schedules
         WHERE date >= ?
           AND user_id IS NOT NULL
           AND user_id IN ({})
         GROUP BY user_id, appt_day, kind",
        placeholders(scope.adviser_ids.len())
    );
    let today_start = local_midnight_utc(scope.today, scope.config.utc_offset);
    let args = Args::new()
        .text(scope.bounds.local_modifier())
        .text(today_start.format(TIMESTAMP_FORMAT).to_string())
        .ids(&scope.adviser_ids);

    let rows = query_rows(conn, &sql, &args, |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let today_key = scope.today.to_string();
    let mut appts = Appointments::default();
    for (user_id, day, kind, n) in rows {
        let bucket = if day == today_key {
            &mut appts.today
        } else {
            &mut appts.future
        };
        let counts: &mut AppointmentCounts = bucket.entry(user_id).or_default();
        match kind.as_str() {
            "disc" => counts.disc += n,
            "fu" => counts.fu += n,
            "q" => counts.q += n,
            _ => {}
        }
    }
    Ok(appts)
}

/// Latest call timestamp and the last full day of call data.
pub fn freshness(conn: &Connection, scope: &ExtractScope) -> Result<Freshness, rusqlite::Error> {
    let bounds = &scope.bounds;

    let max_created: Option<String> =
        conn.query_row("SELECT MAX(created) FROM call_records", [], |row| row.get(0))?;
    let last_refresh = max_created
        .map(|raw| {
            NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
                .map(|utc| bounds.to_local(utc))
                .map_err(|e| conversion_failure(0, e))
        })
        .transpose()?;

    let since = local_midnight_utc(
        scope.today - Duration::days(FULL_DAY_LOOKBACK_DAYS),
        scope.config.utc_offset,
    );
    let busiest: Option<String> = conn
        .query_row(
            "SELECT date(created, ?1) AS day
             FROM call_records
             WHERE created >= ?2
             GROUP BY day
             HAVING COUNT(*) > ?3
             ORDER BY day DESC
             LIMIT 1",
            rusqlite::params![
                bounds.local_modifier(),
                since.format(TIMESTAMP_FORMAT).to_string(),
                FULL_DAY_MIN_CALLS
            ],
            |row| row.get(0),
        )
        .optional()?;
    let last_full_day = busiest
        .and_then(|day| NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok())
        .map(roll_back_to_weekday);

    Ok(Freshness {
        last_refresh,
        max_date: last_refresh.map(|dt| dt.date()),
        last_full_day,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::*;
    use crate::storage::repository;
    use crate::storage::Database;

    #[test]
    fn test_from_result() {
        let ok: Enrichment<i32> = Enrichment::from_result("x", Ok::<_, String>(3));
        assert_eq!(ok.available(), Some(&3));
        let err: Enrichment<i32> = Enrichment::from_result("x", Err("boom"));
        assert_eq!(err, Enrichment::Unavailable);
        assert!(!err.is_available());
    }

    #[test]
    fn test_enrichment_serializes_tagged() {
        let json = serde_json::to_value(Enrichment::Available(1)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "available", "data": 1}));
        let json = serde_json::to_value(Enrichment::<i32>::Unavailable).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unavailable"}));
    }

    #[tokio::test]
    async fn test_appointments_today_and_future() {
        let db = Database::open_memory().await.unwrap();
        // scope.today is 2025-03-20; local midnight is 2025-03-19 13:00 UTC.
        let scope = scope(d(2025, 3, 3), d(2025, 3, 7));
        let appts = db
            .writer()
            .call(move |conn| {
                seed_advisers(conn)?;
                repository::insert_schedule(conn, ALICE, "2025-03-19 23:00:00", "Discussion call")?;
                repository::insert_schedule(conn, ALICE, "2025-03-20 01:00:00", "Follow up")?;
                repository::insert_schedule(conn, ALICE, "2025-03-20 02:00:00", "question time")?;
                repository::insert_schedule(conn, ALICE, "2025-03-21 02:00:00", "Discussion")?;
                // Unclassified text is ignored.
                repository::insert_schedule(conn, ALICE, "2025-03-21 03:00:00", "Coffee")?;
                // Yesterday local.
                repository::insert_schedule(conn, ALICE, "2025-03-19 12:00:00", "Discussion")?;
                appointments(conn, &scope)
            })
            .await
            .unwrap();

        let today = appts.today[&ALICE];
        assert_eq!((today.disc, today.fu, today.q), (1, 1, 1));
        let future = appts.future[&ALICE];
        assert_eq!((future.disc, future.fu, future.q), (1, 0, 0));
        assert!(!appts.today.contains_key(&BOB));
    }

    #[tokio::test]
    async fn test_freshness() {
        let db = Database::open_memory().await.unwrap();
        let scope = scope(d(2025, 3, 3), d(2025, 3, 7));
        let fresh = db
            .writer()
            .call(move |conn| {
                // Saturday 2025-03-15 local: 11 calls, a full day.
                for minute in 0..11 {
                    call(conn, "201", 60, &format!("2025-03-14 23:{minute:02}:00"))?;
                }
                // Monday 2025-03-17 local: only 3 calls.
                for minute in 0..3 {
                    call(conn, "201", 60, &format!("2025-03-16 23:{minute:02}:00"))?;
                }
                freshness(conn, &scope)
            })
            .await
            .unwrap();

        let refresh = fresh.last_refresh.unwrap();
        assert_eq!(refresh.to_string(), "2025-03-17 10:02:00");
        assert_eq!(fresh.max_date, Some(d(2025, 3, 17)));
        // Saturday rolls back to Friday.
        assert_eq!(fresh.last_full_day, Some(d(2025, 3, 14)));
    }
}
