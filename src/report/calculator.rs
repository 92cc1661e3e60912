use serde::Serialize;

use crate::config::{Color, ThresholdTable};
use crate::date_util::{fmt_hm, fmt_hms, round_to};
use crate::metrics::{Adviser, AppointmentCounts, MetricRow, PipelineFunnel, RemediationCounts};

/// Business days per month used to scale inforce value.
pub const BIZ_DAYS_PER_MONTH: f64 = 20.0;

/// Months represented by the window, for monthly inforce. A window with no
/// business days counts as one month.
pub fn months_in_window(biz_days: u32) -> f64 {
    if biz_days == 0 {
        1.0
    } else {
        biz_days as f64 / BIZ_DAYS_PER_MONTH
    }
}

/// Ratios and averages derived from one adviser's totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub quote_avg: f64,
    pub quotes_per_day: f64,
    pub quote_to_app_pct: f64,
    /// Whole talk seconds per worked day.
    pub talk_per_day: f64,
    pub apps_per_day: f64,
    pub apps_avg: f64,
    pub monthly_inforce: f64,
    pub conv_assigned_to_contacted: f64,
    pub conv_contacted_to_booked: f64,
    pub conv_assigned_to_booked: f64,
}

fn ratio(numerator: f64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

fn pct(numerator: i64, denominator: i64) -> f64 {
    round_to(ratio(numerator as f64, denominator) * 100.0, 1)
}

pub fn derive(row: &MetricRow, funnel: &PipelineFunnel, months: f64) -> DerivedMetrics {
    let talk_seconds = row.talk_seconds.trunc();
    DerivedMetrics {
        quote_avg: ratio(row.quotes_value, row.quotes_count),
        quotes_per_day: ratio(row.quotes_count as f64, row.days_worked),
        quote_to_app_pct: ratio(row.apps_count as f64, row.quotes_count) * 100.0,
        talk_per_day: ratio(talk_seconds, row.days_worked),
        apps_per_day: ratio(row.apps_count as f64, row.days_worked),
        apps_avg: round_to(ratio(row.apps_value, row.apps_count), 2),
        monthly_inforce: if months > 0.0 {
            row.inforce_value / months
        } else {
            0.0
        },
        conv_assigned_to_contacted: pct(funnel.contacted, funnel.assigned),
        conv_contacted_to_booked: pct(funnel.booked, funnel.contacted),
        conv_assigned_to_booked: pct(funnel.booked, funnel.assigned),
    }
}

/// One adviser's line in the performance table.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceRow {
    pub adviser_id: i64,
    pub name: String,
    pub initials: String,
    pub days_worked: i64,
    pub talk_time: String,
    pub talk_time_s: i64,
    pub talk_per_day: String,
    pub talk_per_day_s: f64,
    pub talk_color: Color,
    pub quotes_count: i64,
    pub quote_total: f64,
    pub quote_avg: f64,
    pub quotes_per_day: f64,
    pub quotes_color: Color,
    pub apps_count: i64,
    pub apps_value: f64,
    pub apps_avg: f64,
    pub apps_per_day: f64,
    pub apps_color: Color,
    pub q2a_pct: f64,
    pub inforce_count: i64,
    pub inforce_value: f64,
    pub inforce_color: Color,
    pub assigned: i64,
    pub remed_pending: i64,
    pub remed_total: i64,
}

/// One adviser's line in the lead-funnel table.
#[derive(Debug, Clone, Serialize)]
pub struct FunnelRow {
    pub adviser_id: i64,
    pub name: String,
    pub initials: String,
    pub assigned: i64,
    pub contacted: i64,
    pub no_contact: i64,
    pub booked: i64,
    pub quotes_count: i64,
    pub apps_count: i64,
    pub apps_value: f64,
    pub inforce_count: i64,
    pub inforce_value: f64,
    pub conv_ac: f64,
    pub conv_cb: f64,
    pub conv_ab: f64,
    pub appointments_today: AppointmentCounts,
    pub appointments_future: AppointmentCounts,
}

/// Inputs for one adviser's rows.
pub struct AdviserFigures<'a> {
    pub adviser: &'a Adviser,
    pub row: &'a MetricRow,
    pub funnel: &'a PipelineFunnel,
    pub remediation: RemediationCounts,
    pub appointments_today: AppointmentCounts,
    pub appointments_future: AppointmentCounts,
}

pub fn performance_row(
    figures: &AdviserFigures<'_>,
    derived: &DerivedMetrics,
    thresholds: &ThresholdTable,
) -> PerformanceRow {
    let AdviserFigures {
        adviser, row, funnel, ..
    } = figures;
    let talk_seconds = row.talk_seconds.trunc();
    PerformanceRow {
        adviser_id: adviser.id,
        name: adviser.name.clone(),
        initials: adviser.initials(),
        days_worked: row.days_worked,
        talk_time: fmt_hms(talk_seconds),
        talk_time_s: talk_seconds as i64,
        talk_per_day: fmt_hms(derived.talk_per_day),
        talk_per_day_s: derived.talk_per_day,
        talk_color: thresholds.talk_per_day.classify(derived.talk_per_day),
        quotes_count: row.quotes_count,
        quote_total: row.quotes_value,
        quote_avg: derived.quote_avg,
        quotes_per_day: round_to(derived.quotes_per_day, 1),
        quotes_color: thresholds.quotes_per_day.classify(derived.quotes_per_day),
        apps_count: row.apps_count,
        apps_value: row.apps_value,
        apps_avg: derived.apps_avg,
        apps_per_day: round_to(derived.apps_per_day, 1),
        apps_color: thresholds.apps_per_day.classify(derived.apps_per_day),
        q2a_pct: round_to(derived.quote_to_app_pct, 1),
        inforce_count: row.inforce_count,
        inforce_value: row.inforce_value,
        inforce_color: thresholds.monthly_inforce.classify(derived.monthly_inforce),
        assigned: funnel.assigned,
        remed_pending: figures.remediation.pending,
        remed_total: figures.remediation.total,
    }
}

pub fn funnel_row(figures: &AdviserFigures<'_>, derived: &DerivedMetrics) -> FunnelRow {
    let AdviserFigures {
        adviser, row, funnel, ..
    } = figures;
    FunnelRow {
        adviser_id: adviser.id,
        name: adviser.name.clone(),
        initials: adviser.initials(),
        assigned: funnel.assigned,
        contacted: funnel.contacted,
        no_contact: funnel.no_contact,
        booked: funnel.booked,
        quotes_count: row.quotes_count,
        apps_count: row.apps_count,
        apps_value: row.apps_value,
        inforce_count: row.inforce_count,
        inforce_value: row.inforce_value,
        conv_ac: derived.conv_assigned_to_contacted,
        conv_cb: derived.conv_contacted_to_booked,
        conv_ab: derived.conv_assigned_to_booked,
        appointments_today: figures.appointments_today,
        appointments_future: figures.appointments_future,
    }
}

/// Team-wide means of the per-adviser daily rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamAverages {
    pub talk_mins: f64,
    pub talk_fmt: String,
    pub qpd: f64,
    pub apd: f64,
}

/// Averages the displayed row values, so rounding matches the table.
pub fn team_averages(rows: &[PerformanceRow]) -> TeamAverages {
    if rows.is_empty() {
        return TeamAverages {
            talk_mins: 0.0,
            talk_fmt: "0:00".to_string(),
            qpd: 0.0,
            apd: 0.0,
        };
    }
    let n = rows.len() as f64;
    let talk = rows.iter().map(|r| r.talk_per_day_s).sum::<f64>() / n;
    let qpd = rows.iter().map(|r| r.quotes_per_day).sum::<f64>() / n;
    let apd = rows.iter().map(|r| r.apps_per_day).sum::<f64>() / n;
    TeamAverages {
        talk_mins: round_to(talk / 60.0, 2),
        talk_fmt: fmt_hm(talk),
        qpd: round_to(qpd, 2),
        apd: round_to(apd, 2),
    }
}
