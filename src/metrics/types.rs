use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::window::Bucket;

/// Per-adviser results, keyed by adviser id.
pub type AdviserMap<T> = BTreeMap<i64, T>;

/// An adviser from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adviser {
    pub id: i64,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
}

impl Adviser {
    pub fn new(id: i64, first_name: String, last_name: String) -> Self {
        let name = format!("{first_name} {last_name}").trim().to_string();
        Self {
            id,
            name,
            first_name,
            last_name,
        }
    }

    /// First letters of first and last name, upper-cased.
    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .next()
            .into_iter()
            .chain(self.last_name.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

/// Window totals for one adviser.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricRow {
    pub talk_seconds: f64,
    pub quotes_count: i64,
    pub quotes_value: f64,
    pub apps_count: i64,
    pub apps_value: f64,
    pub inforce_count: i64,
    pub inforce_value: f64,
    /// Days with any contact, quote or application activity.
    pub days_worked: i64,
}

/// Lead-funnel stage counts. Each stage is queried on its own, so stages
/// are not numeric subsets of one another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineFunnel {
    pub assigned: i64,
    pub contacted: i64,
    pub no_contact: i64,
    pub booked: i64,
}

/// Performance figures for a single bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub talk_seconds: f64,
    pub quotes_count: i64,
    pub apps_count: i64,
    pub apps_value: f64,
    pub inforce_count: i64,
    pub inforce_value: f64,
}

/// Bucketed performance and funnel figures per adviser. Buckets with no
/// rows are simply absent.
#[derive(Debug, Clone, Default)]
pub struct BucketSeries {
    pub points: AdviserMap<BTreeMap<Bucket, SeriesPoint>>,
    pub funnel: AdviserMap<BTreeMap<Bucket, PipelineFunnel>>,
    /// Local days that produced performance rows (empty for hourly series).
    pub data_days: BTreeSet<NaiveDate>,
}

impl BucketSeries {
    pub fn point_mut(&mut self, adviser_id: i64, bucket: Bucket) -> &mut SeriesPoint {
        self.points
            .entry(adviser_id)
            .or_default()
            .entry(bucket)
            .or_default()
    }

    pub fn funnel_mut(&mut self, adviser_id: i64, bucket: Bucket) -> &mut PipelineFunnel {
        self.funnel
            .entry(adviser_id)
            .or_default()
            .entry(bucket)
            .or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemediationCounts {
    pub total: i64,
    pub pending: i64,
}

/// A compliance follow-up task attached to a lead or application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationTask {
    pub req_id: i64,
    pub lead_id: i64,
    pub object_type: Option<String>,
    pub object_id: Option<i64>,
    pub task_name: String,
    pub description: String,
    pub last_note: String,
    pub status: i64,
    /// Local creation date.
    pub created_date: NaiveDate,
    pub client_name: String,
    /// Set only when the task is linked to an application.
    pub app_id: Option<i64>,
}

impl RemediationTask {
    /// Status 0 and 1 are open; anything else is resolved.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, 0 | 1)
    }
}

/// Appointment counts by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppointmentCounts {
    /// Discussion
    pub disc: i64,
    /// Follow-up
    pub fu: i64,
    /// Questions
    pub q: i64,
}

impl AppointmentCounts {
    pub fn total(&self) -> i64 {
        self.disc + self.fu + self.q
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Appointments {
    pub today: AdviserMap<AppointmentCounts>,
    pub future: AdviserMap<AppointmentCounts>,
}

/// How current the upstream call data is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Freshness {
    /// Latest call-record timestamp, in local time.
    pub last_refresh: Option<NaiveDateTime>,
    /// Local date of `last_refresh`.
    pub max_date: Option<NaiveDate>,
    /// Most recent weekday with a full day of call data.
    pub last_full_day: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adviser_name_and_initials() {
        let a = Adviser::new(181, "nataniel".into(), "Smith".into());
        assert_eq!(a.name, "nataniel Smith");
        assert_eq!(a.initials(), "NS");

        let partial = Adviser::new(1, String::new(), "Lee".into());
        assert_eq!(partial.name, "Lee");
        assert_eq!(partial.initials(), "L");
    }

    #[test]
    fn test_remediation_pending_status() {
        let mut task = RemediationTask {
            req_id: 1,
            lead_id: 2,
            object_type: None,
            object_id: None,
            task_name: String::new(),
            description: String::new(),
            last_note: String::new(),
            status: 0,
            created_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            client_name: String::new(),
            app_id: None,
        };
        assert!(task.is_pending());
        task.status = 1;
        assert!(task.is_pending());
        task.status = 2;
        assert!(!task.is_pending());
    }

    #[test]
    fn test_bucket_series_accessors() {
        let mut s = BucketSeries::default();
        s.point_mut(1, Bucket::Hour(9)).quotes_count += 2;
        s.point_mut(1, Bucket::Hour(9)).quotes_count += 1;
        s.funnel_mut(2, Bucket::Hour(10)).assigned = 4;
        assert_eq!(s.points[&1][&Bucket::Hour(9)].quotes_count, 3);
        assert_eq!(s.funnel[&2][&Bucket::Hour(10)].assigned, 4);
    }
}
