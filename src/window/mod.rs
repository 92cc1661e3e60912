pub mod preset;

pub use preset::Preset;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Serialize, Serializer};

use crate::date_util::{first_of_month, is_weekday, roll_back_to_weekday};

/// First local hour shown in the single-day view.
pub const FIRST_HOUR: u32 = 6;
/// Last local hour shown in the single-day view (inclusive).
pub const LAST_HOUR: u32 = 22;

/// Storage format of every timestamp column in the source relations.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Raw window parameters as supplied by the caller. Either end may be
/// missing or malformed; `TimeWindow::resolve` substitutes defaults.
#[derive(Debug, Clone, Default)]
pub struct WindowParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl WindowParams {
    pub fn new(start: Option<&str>, end: Option<&str>) -> Self {
        Self {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }
}

/// An inclusive range of local calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    /// Build a window clamped to `[min_date, today]`. Inverted ends are
    /// swapped rather than rejected.
    pub fn new(start: NaiveDate, end: NaiveDate, min_date: NaiveDate, today: NaiveDate) -> Self {
        let mut start = start.max(min_date);
        let mut end = end.max(min_date);
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        Self {
            start: start.min(today),
            end: end.min(today),
        }
    }

    /// The default view: month-to-date.
    pub fn default_range(today: NaiveDate, min_date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let end = today;
        let mut start = first_of_month(today).max(min_date);
        if start > end {
            start = (end - Duration::days(20)).max(min_date);
        }
        (start, end)
    }

    /// Resolve caller parameters. A malformed date on either end replaces
    /// both ends with the defaults.
    pub fn resolve(params: &WindowParams, today: NaiveDate, min_date: NaiveDate) -> Self {
        let (default_start, default_end) = Self::default_range(today, min_date);
        let start = parse_param(params.start.as_deref(), default_start);
        let end = parse_param(params.end.as_deref(), default_end);
        let (start, end) = match (start, end) {
            (Ok(s), Ok(e)) => (s, e),
            _ => {
                log::warn!(
                    "Malformed window parameters start={:?} end={:?}, using defaults",
                    params.start,
                    params.end
                );
                (default_start, default_end)
            }
        };
        Self::new(start, end, min_date, today)
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    /// Number of days between start and end (0 for a single day).
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Every calendar date in the window, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn biz_days(&self) -> u32 {
        biz_days_in_range(self.start, self.end)
    }

    pub fn chart_mode(&self) -> ChartMode {
        if self.is_single_day() {
            ChartMode::Hourly
        } else if self.span_days() <= 4 && self.start.weekday() == Weekday::Mon {
            ChartMode::Weekly
        } else {
            ChartMode::Daily
        }
    }

    /// UTC instants bounding the window: local midnight of `start` and local
    /// midnight of `end + 1` (exclusive).
    pub fn utc_bounds(&self, offset: FixedOffset) -> UtcBounds {
        UtcBounds {
            start: local_midnight_utc(self.start, offset),
            end_exclusive: local_midnight_utc(self.end + Duration::days(1), offset),
            offset_seconds: offset.local_minus_utc(),
        }
    }

    /// Canonical ordered bucket list. Single-day windows use hours
    /// `FIRST_HOUR..=LAST_HOUR`; longer windows use every calendar date in
    /// range plus any date that produced data, with weekends removed.
    pub fn buckets(&self, data_days: &BTreeSet<NaiveDate>) -> Vec<Bucket> {
        if self.is_single_day() {
            return (FIRST_HOUR..=LAST_HOUR).map(Bucket::Hour).collect();
        }
        let mut all: BTreeSet<NaiveDate> = self.days().collect();
        all.extend(data_days.iter().copied());
        all.into_iter()
            .filter(|d| is_weekday(*d))
            .map(Bucket::Day)
            .collect()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

fn parse_param(
    raw: Option<&str>,
    default: NaiveDate,
) -> std::result::Result<NaiveDate, chrono::ParseError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d"),
    }
}

/// UTC instant of local midnight at the start of `date`.
pub fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) - Duration::seconds(offset.local_minus_utc() as i64)
}

/// Half-open UTC range `[start, end_exclusive)` computed once per request
/// and bound into every query as plain parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcBounds {
    pub start: NaiveDateTime,
    pub end_exclusive: NaiveDateTime,
    pub offset_seconds: i32,
}

impl UtcBounds {
    pub fn start_key(&self) -> String {
        self.start.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn end_key(&self) -> String {
        self.end_exclusive.format(TIMESTAMP_FORMAT).to_string()
    }

    /// SQLite date modifier shifting a UTC column into local time, used only
    /// for grouping (never in a range filter).
    pub fn local_modifier(&self) -> String {
        format!("{:+} seconds", self.offset_seconds)
    }

    pub fn to_local(&self, utc: NaiveDateTime) -> NaiveDateTime {
        utc + Duration::seconds(self.offset_seconds as i64)
    }
}

/// Chart axis mode for the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    Hourly,
    Weekly,
    Daily,
}

/// A time-grouping unit for series data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    /// Local hour of day.
    Hour(u32),
    /// Local calendar day.
    Day(NaiveDate),
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Hour(h) => write!(f, "{h}"),
            Bucket::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Count of weekday (Mon-Fri) dates in the inclusive range. Inverted ranges
/// are swapped.
pub fn biz_days_in_range(start: NaiveDate, end: NaiveDate) -> u32 {
    let (start, end) = if start <= end { (start, end) } else { (end, start) };
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_weekday(*d))
        .count() as u32
}

/// Most recent weekday strictly before `reference`, never earlier than `min_date`.
pub fn last_business_day(reference: NaiveDate, min_date: NaiveDate) -> NaiveDate {
    let prev = reference.pred_opt().unwrap_or(reference);
    roll_back_to_weekday(prev).max(min_date)
}
