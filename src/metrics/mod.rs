pub mod enrichment;
pub mod performance;
pub mod pipeline;
pub mod remediation;
pub mod series;
pub mod sql;
pub mod types;

pub use enrichment::Enrichment;
pub use types::*;

use std::time::Instant;

use chrono::NaiveDate;

use crate::config::DashboardConfig;
use crate::window::{TimeWindow, UtcBounds};

/// Everything an extractor needs to scope its queries for one request.
#[derive(Debug, Clone)]
pub struct ExtractScope {
    pub adviser_ids: Vec<i64>,
    pub window: TimeWindow,
    pub bounds: UtcBounds,
    pub today: NaiveDate,
    pub config: DashboardConfig,
}

impl ExtractScope {
    pub fn new(
        config: &DashboardConfig,
        adviser_ids: Vec<i64>,
        window: TimeWindow,
        today: NaiveDate,
    ) -> Self {
        Self {
            adviser_ids,
            bounds: window.utc_bounds(config.utc_offset),
            window,
            today,
            config: config.clone(),
        }
    }

    /// Map with a default entry for every adviser in scope.
    pub fn zeroed<T: Default>(&self) -> AdviserMap<T> {
        self.adviser_ids.iter().map(|id| (*id, T::default())).collect()
    }
}

/// Raw results of every extractor for one request.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub performance: AdviserMap<MetricRow>,
    pub pipeline: AdviserMap<PipelineFunnel>,
    pub series: BucketSeries,
    pub remediation_counts: AdviserMap<RemediationCounts>,
    pub remediation_details: AdviserMap<Vec<RemediationTask>>,
    pub appointments: Enrichment<Appointments>,
    pub freshness: Enrichment<Freshness>,
}

/// Run every extractor, in order, on one connection. Primary extractors fail
/// the request; enrichments degrade to `Enrichment::Unavailable`.
pub fn extract_all(
    conn: &rusqlite::Connection,
    scope: &ExtractScope,
) -> Result<Extraction, rusqlite::Error> {
    let performance = timed("perf_stats", || performance::extract(conn, scope))?;
    let pipeline = timed("pipeline", || pipeline::extract(conn, scope))?;
    let series = if scope.window.is_single_day() {
        timed("hourly_series", || series::hourly(conn, scope))?
    } else {
        timed("daily_series", || series::daily(conn, scope))?
    };
    let appointments = Enrichment::from_result(
        "appointments",
        timed("appointments", || enrichment::appointments(conn, scope)),
    );
    let (remediation_counts, remediation_details) =
        timed("remediations", || remediation::extract(conn, scope))?;
    let freshness = Enrichment::from_result(
        "freshness",
        timed("freshness", || enrichment::freshness(conn, scope)),
    );

    Ok(Extraction {
        performance,
        pipeline,
        series,
        remediation_counts,
        remediation_details,
        appointments,
        freshness,
    })
}

/// Run `f`, logging its elapsed time under `label`.
pub fn timed<T, E>(label: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let started = Instant::now();
    let result = f();
    log::info!("[{label}] {} ms", started.elapsed().as_millis());
    result
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared seed data for extractor tests. Local time is +11:00, so
    //! `2025-03-03 09:00` local is `2025-03-02 22:00:00` UTC.

    use chrono::NaiveDate;

    use super::ExtractScope;
    use crate::config::DashboardConfig;
    use crate::storage::repository::{self, DailyStatsRecord, QuoteRecord};
    use crate::window::TimeWindow;

    pub const ALICE: i64 = 181;
    pub const BOB: i64 = 182;
    /// In the directory group but never has any rows.
    pub const CARA: i64 = 183;

    pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    pub fn config() -> DashboardConfig {
        let mut config = DashboardConfig::default();
        config.adviser_ids = [ALICE, BOB, CARA].into_iter().collect();
        config
    }

    pub fn scope(start: NaiveDate, end: NaiveDate) -> ExtractScope {
        let config = config();
        ExtractScope::new(
            &config,
            config.adviser_id_list(),
            TimeWindow { start, end },
            d(2025, 3, 20),
        )
    }

    pub fn seed_advisers(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
        for (id, first, last, ext) in [
            (ALICE, "Alice", "Adams", "201"),
            (BOB, "Bob", "Brown", "202"),
            (CARA, "Cara", "Clark", "203"),
        ] {
            repository::insert_user(conn, id, first, last)?;
            repository::add_group_member(conn, 56, id)?;
            repository::set_extension(conn, id, ext)?;
        }
        Ok(())
    }

    pub fn call(
        conn: &rusqlite::Connection,
        ext: &str,
        secs: i64,
        created: &str,
    ) -> Result<(), rusqlite::Error> {
        repository::insert_call_record(conn, ext, secs * 1_000_000, "Hungup", created)?;
        Ok(())
    }

    /// A lead named "C L" assigned to `user_id`.
    pub fn lead(
        conn: &rusqlite::Connection,
        id: i64,
        user_id: i64,
        assigned: &str,
    ) -> Result<(), rusqlite::Error> {
        repository::insert_lead(conn, id, Some(user_id), "C", "L", Some(assigned))
    }

    pub fn lead_action(
        conn: &rusqlite::Connection,
        object_type: &str,
        object_id: i64,
        action_type: &str,
        note: &str,
        created: &str,
    ) -> Result<(), rusqlite::Error> {
        repository::insert_lead_action(conn, object_type, object_id, action_type, note, created)?;
        Ok(())
    }

    pub fn quote(
        conn: &rusqlite::Connection,
        user_id: i64,
        lead_id: i64,
        value: f64,
        created: &str,
    ) -> Result<(), rusqlite::Error> {
        repository::insert_quote(
            conn,
            &QuoteRecord {
                user_id,
                lead_id,
                value,
                sent: true,
                deleted: false,
                created: created.to_string(),
            },
        )?;
        Ok(())
    }

    pub fn stats(
        conn: &rusqlite::Connection,
        user_id: i64,
        date: &str,
        contact: i64,
        apps: i64,
        apps_value: f64,
    ) -> Result<(), rusqlite::Error> {
        repository::upsert_daily_stats(
            conn,
            &DailyStatsRecord {
                user_id,
                date: date.to_string(),
                contact,
                quotes_added: contact / 2,
                apps_added: apps,
                apps_added_value: apps_value,
                apps_inforce: apps,
                apps_inforce_value: apps_value / 2.0,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::storage::{repository, Database};

    #[tokio::test]
    async fn test_extract_all_on_empty_store() {
        let db = Database::open_memory().await.unwrap();
        let scope = scope(d(2025, 3, 3), d(2025, 3, 7));
        let extraction = db
            .writer()
            .call(move |conn| {
                seed_advisers(conn)?;
                extract_all(conn, &scope)
            })
            .await
            .unwrap();

        assert_eq!(extraction.performance.len(), 3);
        assert!(extraction.performance.values().all(|r| *r == MetricRow::default()));
        assert!(extraction.pipeline.values().all(|f| *f == PipelineFunnel::default()));
        assert!(extraction.remediation_details.values().all(Vec::is_empty));
        assert!(extraction.series.data_days.is_empty());
        assert!(extraction.appointments.is_available());
        let freshness = extraction.freshness.available().unwrap();
        assert_eq!(freshness.last_refresh, None);
        assert_eq!(freshness.last_full_day, None);
    }

    #[tokio::test]
    async fn test_extract_all_single_day_uses_hourly_series() {
        let db = Database::open_memory().await.unwrap();
        let scope = scope(d(2025, 3, 3), d(2025, 3, 3));
        let extraction = db
            .writer()
            .call(move |conn| {
                seed_advisers(conn)?;
                // 09:30 local
                call(conn, "201", 60, "2025-03-02 22:30:00")?;
                extract_all(conn, &scope)
            })
            .await
            .unwrap();

        let alice = &extraction.series.points[&ALICE];
        assert_eq!(alice[&crate::window::Bucket::Hour(9)].talk_seconds, 60.0);
        assert_eq!(extraction.performance[&ALICE].talk_seconds, 60.0);
    }

    #[tokio::test]
    async fn test_extract_all_enrichment_failure_does_not_fail_request() {
        let db = Database::open_memory().await.unwrap();
        let scope = scope(d(2025, 3, 3), d(2025, 3, 7));
        let extraction = db
            .writer()
            .call(move |conn| {
                seed_advisers(conn)?;
                conn.execute_batch("DROP TABLE lead_schedules")?;
                extract_all(conn, &scope)
            })
            .await
            .unwrap();

        assert!(!extraction.appointments.is_available());
        assert!(extraction.freshness.is_available());
    }

    #[tokio::test]
    async fn test_extract_all_primary_failure_fails_request() {
        let db = Database::open_memory().await.unwrap();
        let scope = scope(d(2025, 3, 3), d(2025, 3, 7));
        let result = db
            .writer()
            .call(move |conn| {
                conn.execute_batch("DROP TABLE user_daily_stats")?;
                extract_all(conn, &scope)
            })
            .await;
        assert!(result.is_err());

        // The connection is still usable afterwards.
        let ok = db
            .writer()
            .call(|conn| repository::list_config(conn))
            .await;
        assert!(ok.is_ok());
    }
}
