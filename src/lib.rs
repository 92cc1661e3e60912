pub mod config;
pub mod date_util;
pub mod error;
pub mod metrics;
pub mod report;
pub mod storage;
pub mod window;

pub use config::DashboardConfig;
pub use error::{Error, FailureOutcome, Result};
pub use metrics::{Adviser, Enrichment};
pub use report::{Dashboard, RemediationReport};
pub use storage::{Database, PoolOptions};
pub use window::{Preset, TimeWindow, WindowParams};

use std::time::Instant;

use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use metrics::ExtractScope;
use storage::{repository, schema};

/// Today's date at the given fixed offset.
pub fn local_today(offset: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&offset).date_naive()
}

/// Row counts and pool state for the status report.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub tables: Vec<(String, i64)>,
    pub pool_size: usize,
    pub idle_sessions: usize,
}

/// Main entry point: runs analytics requests against a `Database` with the
/// configuration loaded from its `app_config` table.
pub struct AdviserDashboard {
    db: Database,
    config: DashboardConfig,
}

impl AdviserDashboard {
    pub async fn open(db: Database) -> Result<Self> {
        let config = db
            .writer()
            .call(|conn| Ok::<_, rusqlite::Error>(DashboardConfig::load(conn)))
            .await??;
        Ok(Self { db, config })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        local_today(self.config.utc_offset)
    }

    /// Resolve `params` and build the dashboard for that window.
    pub async fn build(&self, params: &WindowParams, today: NaiveDate) -> Result<Dashboard> {
        let window = TimeWindow::resolve(params, today, self.config.min_date);
        self.build_window(window, today).await
    }

    pub async fn build_preset(&self, preset: Preset, today: NaiveDate) -> Result<Dashboard> {
        self.build_window(preset.window(today, self.config.min_date), today)
            .await
    }

    /// One request: a single pooled session for the directory lookup and
    /// every extractor, released before the report is assembled.
    pub async fn build_window(&self, window: TimeWindow, today: NaiveDate) -> Result<Dashboard> {
        let started = Instant::now();
        let session = self.db.pool().acquire().await?;
        let config = self.config.clone();
        let (advisers, extraction) = session
            .conn()
            .call(move |conn| {
                let allowed = config.adviser_id_list();
                let advisers = repository::get_advisers(conn, config.group_id, &allowed)?;
                let ids = advisers.iter().map(|a| a.id).collect();
                let scope = ExtractScope::new(&config, ids, window, today);
                let extraction = metrics::extract_all(conn, &scope)?;
                Ok::<_, rusqlite::Error>((advisers, extraction))
            })
            .await?;
        session.release();

        let dashboard = report::assemble(advisers, extraction, window, today, &self.config);
        log::info!(
            "Dashboard for {window} built in {} ms",
            started.elapsed().as_millis()
        );
        Ok(dashboard)
    }

    /// Advisers on the allow-list that are present in the directory group.
    pub async fn advisers(&self) -> Result<Vec<Adviser>> {
        let session = self.db.pool().acquire().await?;
        let (group_id, ids) = (self.config.group_id, self.config.adviser_id_list());
        let advisers = session
            .conn()
            .call(move |conn| repository::get_advisers(conn, group_id, &ids))
            .await?;
        Ok(advisers)
    }

    /// Remediation tasks for one adviser in the resolved window.
    pub async fn remediation(
        &self,
        adviser_id: i64,
        params: &WindowParams,
        today: NaiveDate,
    ) -> Result<RemediationReport> {
        let window = TimeWindow::resolve(params, today, self.config.min_date);
        let session = self.db.pool().acquire().await?;
        let config = self.config.clone();
        let found = session
            .conn()
            .call(move |conn| -> std::result::Result<Option<RemediationReport>, rusqlite::Error> {
                let allowed = config.adviser_id_list();
                let Some(adviser) =
                    repository::get_adviser(conn, config.group_id, &allowed, adviser_id)?
                else {
                    return Ok(None);
                };
                let scope = ExtractScope::new(&config, vec![adviser.id], window, today);
                let (mut counts, mut details) =
                    metrics::timed("remediations", || metrics::remediation::extract(conn, &scope))?;
                Ok(Some(RemediationReport {
                    window,
                    counts: counts.remove(&adviser.id).unwrap_or_default(),
                    tasks: details.remove(&adviser.id).unwrap_or_default(),
                    adviser,
                }))
            })
            .await?;
        found.ok_or_else(|| Error::NotFound(adviser_id.to_string()))
    }

    // ── Config ─────────────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        Ok(self
            .db
            .writer()
            .call(move |conn| repository::get_config(conn, &key))
            .await?)
    }

    /// Validate and store an override. The running configuration picks it
    /// up immediately.
    pub async fn config_set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.config.clone();
        updated.apply(key, value)?;
        let (key, value) = (key.to_string(), value.trim().to_string());
        self.db
            .writer()
            .call(move |conn| repository::set_config(conn, &key, &value))
            .await?;
        self.config = updated;
        Ok(())
    }

    /// Remove an override, falling back to the default.
    pub async fn config_unset(&mut self, key: &str) -> Result<bool> {
        let key = key.to_string();
        let (removed, config) = self
            .db
            .writer()
            .call(move |conn| {
                let removed = repository::delete_config(conn, &key)?;
                Ok::<_, rusqlite::Error>((removed, DashboardConfig::load(conn)))
            })
            .await?;
        self.config = config?;
        Ok(removed)
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .db
            .writer()
            .call(|conn| repository::list_config(conn))
            .await?)
    }

    pub async fn status(&self) -> Result<StoreStatus> {
        let session = self.db.pool().acquire().await?;
        let tables = session.conn().call(|conn| schema::table_counts(conn)).await?;
        session.release();
        Ok(StoreStatus {
            tables,
            pool_size: self.db.pool().options().size,
            idle_sessions: self.db.pool().idle_count(),
        })
    }
}
