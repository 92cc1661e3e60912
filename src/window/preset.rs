use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::Serialize;

use super::TimeWindow;
use crate::date_util::{first_of_month, monday_of};
use crate::error::{Error, Result};

static RE_PRESET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([DWM])([01])$").unwrap());

/// Quick-filter presets offered alongside the explicit date pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Preset {
    /// Today.
    D0,
    /// Yesterday.
    D1,
    /// Week to date, from Monday.
    W0,
    /// The previous Monday-Friday week.
    W1,
    /// Month to date.
    M0,
    /// The previous calendar month.
    M1,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::D0,
        Preset::D1,
        Preset::W0,
        Preset::W1,
        Preset::M0,
        Preset::M1,
    ];

    /// Parse a preset token such as `w1` or `M0`.
    pub fn parse(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        let caps = RE_PRESET
            .captures(&upper)
            .ok_or_else(|| Error::PresetParse(format!("unrecognized preset: {s}")))?;
        let previous = &caps[2] == "1";
        Ok(match (&caps[1], previous) {
            ("D", false) => Preset::D0,
            ("D", true) => Preset::D1,
            ("W", false) => Preset::W0,
            ("W", true) => Preset::W1,
            ("M", false) => Preset::M0,
            _ => Preset::M1,
        })
    }

    pub fn to_key(&self) -> &'static str {
        match self {
            Preset::D0 => "D0",
            Preset::D1 => "D1",
            Preset::W0 => "W0",
            Preset::W1 => "W1",
            Preset::M0 => "M0",
            Preset::M1 => "M1",
        }
    }

    /// Raw (start, end) dates for this preset relative to `today`. Starts
    /// are clamped to `min_date`; ends are not.
    pub fn date_range(&self, today: NaiveDate, min_date: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Preset::D0 => (today, today),
            Preset::D1 => {
                let y = today - Duration::days(1);
                (y, y)
            }
            Preset::W0 => (monday_of(today).max(min_date), today),
            Preset::W1 => {
                let w0_start = monday_of(today).max(min_date);
                let friday = w0_start - Duration::days(3);
                ((friday - Duration::days(4)).max(min_date), friday)
            }
            Preset::M0 => (first_of_month(today).max(min_date), today),
            Preset::M1 => {
                let prev_end = first_of_month(today).max(min_date) - Duration::days(1);
                (first_of_month(prev_end).max(min_date), prev_end)
            }
        }
    }

    /// The preset as a normalized window.
    pub fn window(&self, today: NaiveDate, min_date: NaiveDate) -> TimeWindow {
        let (start, end) = self.date_range(today, min_date);
        TimeWindow::new(start, end, min_date, today)
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// A preset resolved against a reference date, as handed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PresetRange {
    pub preset: Preset,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Resolve every preset for `today`.
pub fn resolve_all(today: NaiveDate, min_date: NaiveDate) -> Vec<PresetRange> {
    Preset::ALL
        .iter()
        .map(|p| {
            let (start, end) = p.date_range(today, min_date);
            PresetRange {
                preset: *p,
                start,
                end,
            }
        })
        .collect()
}
