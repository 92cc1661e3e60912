pub mod calculator;
pub mod series;

pub use calculator::{FunnelRow, PerformanceRow, TeamAverages};
pub use series::ChartSeries;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::DashboardConfig;
use crate::date_util::round_to;
use crate::metrics::{
    Adviser, AdviserMap, AppointmentCounts, Enrichment, Extraction, Freshness, MetricRow,
    PipelineFunnel, RemediationCounts, RemediationTask,
};
use crate::window::preset::{resolve_all, PresetRange};
use crate::window::{last_business_day, Bucket, ChartMode, TimeWindow};

use calculator::AdviserFigures;

/// One adviser's remediation tasks, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct AdviserRemediation {
    pub adviser_id: i64,
    pub name: String,
    pub tasks: Vec<RemediationTask>,
}

/// Drill-down for a single adviser's remediation tasks.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationReport {
    pub adviser: Adviser,
    pub window: TimeWindow,
    pub counts: RemediationCounts,
    pub tasks: Vec<RemediationTask>,
}

/// The complete analytics result for one window.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub window: TimeWindow,
    pub today: NaiveDate,
    pub biz_days: u32,
    pub months: f64,
    pub chart_mode: ChartMode,
    pub buckets: Vec<Bucket>,
    pub advisers: Vec<Adviser>,
    pub performance: Vec<PerformanceRow>,
    pub funnel: Vec<FunnelRow>,
    pub series: Vec<ChartSeries>,
    pub team_averages: TeamAverages,
    pub remediation: Vec<AdviserRemediation>,
    pub presets: Vec<PresetRange>,
    pub last_business_day: NaiveDate,
    pub freshness: Enrichment<Freshness>,
    pub appointments_available: bool,
    pub crm_base_url: String,
}

/// Combine extractor output into the dashboard. Rows follow `advisers`
/// order; an adviser missing from any map reads as all zero.
pub fn assemble(
    advisers: Vec<Adviser>,
    extraction: Extraction,
    window: TimeWindow,
    today: NaiveDate,
    config: &DashboardConfig,
) -> Dashboard {
    let biz_days = window.biz_days();
    let months = calculator::months_in_window(biz_days);
    let buckets = window.buckets(&extraction.series.data_days);

    let zero_row = MetricRow::default();
    let zero_funnel = PipelineFunnel::default();
    let appointments = extraction.appointments.available();

    let mut performance = Vec::with_capacity(advisers.len());
    let mut funnel = Vec::with_capacity(advisers.len());
    for adviser in &advisers {
        let figures = AdviserFigures {
            adviser,
            row: extraction.performance.get(&adviser.id).unwrap_or(&zero_row),
            funnel: extraction.pipeline.get(&adviser.id).unwrap_or(&zero_funnel),
            remediation: extraction
                .remediation_counts
                .get(&adviser.id)
                .copied()
                .unwrap_or_default(),
            appointments_today: appointment_counts(appointments.map(|a| &a.today), adviser.id),
            appointments_future: appointment_counts(appointments.map(|a| &a.future), adviser.id),
        };
        let derived = calculator::derive(figures.row, figures.funnel, months);
        let thresholds = &config.thresholds;
        performance.push(calculator::performance_row(&figures, &derived, thresholds));
        funnel.push(calculator::funnel_row(&figures, &derived));
    }

    let team_averages = calculator::team_averages(&performance);
    let series = series::assemble(&advisers, &buckets, &extraction.series);

    let mut details = extraction.remediation_details;
    let remediation = advisers
        .iter()
        .map(|a| AdviserRemediation {
            adviser_id: a.id,
            name: a.name.clone(),
            tasks: details.remove(&a.id).unwrap_or_default(),
        })
        .collect();

    let last_business_day = extraction
        .freshness
        .available()
        .and_then(|f| f.last_full_day)
        .unwrap_or_else(|| last_business_day(today, config.min_date));

    Dashboard {
        window,
        today,
        biz_days,
        months: round_to(months, 2),
        chart_mode: window.chart_mode(),
        buckets,
        advisers,
        performance,
        funnel,
        series,
        team_averages,
        remediation,
        presets: resolve_all(today, config.min_date),
        last_business_day,
        appointments_available: extraction.appointments.is_available(),
        freshness: extraction.freshness,
        crm_base_url: config.crm_base_url.as_str().trim_end_matches('/').to_string(),
    }
}

fn appointment_counts(
    map: Option<&AdviserMap<AppointmentCounts>>,
    adviser_id: i64,
) -> AppointmentCounts {
    map.and_then(|m| m.get(&adviser_id)).copied().unwrap_or_default()
}
