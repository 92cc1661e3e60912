use std::collections::BTreeSet;

use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::storage::repository;

pub const DEFAULT_ADVISER_IDS: [i64; 5] = [53, 152, 181, 182, 183];
pub const DEFAULT_GROUP_ID: i64 = 56;
pub const DEFAULT_MIN_DATE: &str = "2025-01-01";
pub const DEFAULT_UTC_OFFSET: &str = "+11:00";
pub const DEFAULT_CONTACT_THRESHOLD_SECS: i64 = 45;
pub const DEFAULT_MIN_TALK_CALL_SECS: i64 = 10;
pub const DEFAULT_REMEDIATION_TYPE_IDS: [i64; 14] = [
    138, 139, 140, 141, 142, 143, 144, 145, 162, 163, 164, 165, 189, 197,
];
pub const DEFAULT_BOOKED_ACTION_TYPE: &str = "doccreate";
pub const DEFAULT_BOOKED_NOTE_MARKER: &str = "Life Insurance Questions";
pub const DEFAULT_CRM_BASE_URL: &str = "https://crm.slife.com.au";

const US_PER_SEC: i64 = 1_000_000;

/// Keys accepted in `app_config`.
pub const CONFIG_KEYS: &[&str] = &[
    "advisers",
    "group_id",
    "min_date",
    "utc_offset",
    "contact_threshold_secs",
    "min_talk_call_secs",
    "remediation_type_ids",
    "booked_action_type",
    "booked_note_marker",
    "crm_base_url",
    "thresholds.talk_per_day",
    "thresholds.quotes_per_day",
    "thresholds.apps_per_day",
    "thresholds.monthly_inforce",
];

/// Three-level traffic-light classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Orange,
    Red,
}

/// Cutoffs for one metric: `>= green` is green, `>= orange` is orange,
/// anything lower is red.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub green: f64,
    pub orange: f64,
}

impl Thresholds {
    pub const fn new(green: f64, orange: f64) -> Self {
        Self { green, orange }
    }

    pub fn classify(&self, value: f64) -> Color {
        if value >= self.green {
            Color::Green
        } else if value >= self.orange {
            Color::Orange
        } else {
            Color::Red
        }
    }

    fn parse(key: &str, value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        let [green, orange] = parts.as_slice() else {
            return Err(Error::Config(format!(
                "{key} expects \"GREEN,ORANGE\", got {value:?}"
            )));
        };
        let green: f64 = parse_value(key, green)?;
        let orange: f64 = parse_value(key, orange)?;
        if !green.is_finite() || !orange.is_finite() {
            return Err(Error::Config(format!(
                "{key} cutoffs must be finite, got {value:?}"
            )));
        }
        if orange > green {
            return Err(Error::Config(format!(
                "{key}: orange cutoff {orange} exceeds green cutoff {green}"
            )));
        }
        Ok(Self { green, orange })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdTable {
    /// Talk seconds per worked day.
    pub talk_per_day: Thresholds,
    pub quotes_per_day: Thresholds,
    pub apps_per_day: Thresholds,
    /// Inforce value per month in window.
    pub monthly_inforce: Thresholds,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            talk_per_day: Thresholds::new(9000.0, 7200.0),
            quotes_per_day: Thresholds::new(6.0, 4.0),
            apps_per_day: Thresholds::new(2.0, 1.0),
            monthly_inforce: Thresholds::new(20000.0, 15000.0),
        }
    }
}

/// Everything that fixes the metric set: who is reported on, how local time
/// maps to UTC, and where the cutoffs sit.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub adviser_ids: BTreeSet<i64>,
    pub group_id: i64,
    pub min_date: NaiveDate,
    pub utc_offset: FixedOffset,
    pub contact_threshold_secs: i64,
    pub min_talk_call_secs: i64,
    pub remediation_type_ids: Vec<i64>,
    pub booked_action_type: String,
    pub booked_note_marker: String,
    pub crm_base_url: Url,
    pub thresholds: ThresholdTable,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            adviser_ids: DEFAULT_ADVISER_IDS.into_iter().collect(),
            group_id: DEFAULT_GROUP_ID,
            min_date: NaiveDate::parse_from_str(DEFAULT_MIN_DATE, "%Y-%m-%d")
                .expect("default min_date is valid"),
            utc_offset: DEFAULT_UTC_OFFSET
                .parse()
                .expect("default UTC offset is valid"),
            contact_threshold_secs: DEFAULT_CONTACT_THRESHOLD_SECS,
            min_talk_call_secs: DEFAULT_MIN_TALK_CALL_SECS,
            remediation_type_ids: DEFAULT_REMEDIATION_TYPE_IDS.to_vec(),
            booked_action_type: DEFAULT_BOOKED_ACTION_TYPE.to_string(),
            booked_note_marker: DEFAULT_BOOKED_NOTE_MARKER.to_string(),
            crm_base_url: Url::parse(DEFAULT_CRM_BASE_URL).expect("default CRM URL is valid"),
            thresholds: ThresholdTable::default(),
        }
    }
}

impl DashboardConfig {
    /// Defaults overlaid with every recognised key in `app_config`.
    pub fn load(conn: &rusqlite::Connection) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in repository::list_config(conn)? {
            if CONFIG_KEYS.contains(&key.as_str()) {
                config.apply(&key, &value)?;
            } else {
                log::debug!("Ignoring unknown config key {key}");
            }
        }
        Ok(config)
    }

    /// Apply a single override.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "advisers" => {
                let ids = parse_id_list(key, value)?;
                if ids.is_empty() {
                    return Err(Error::Config("advisers must list at least one id".into()));
                }
                self.adviser_ids = ids.into_iter().collect();
            }
            "group_id" => self.group_id = parse_value(key, value)?,
            "min_date" => {
                self.min_date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map_err(|e| Error::Config(format!("min_date {value:?}: {e}")))?
            }
            "utc_offset" => {
                self.utc_offset = value
                    .parse::<FixedOffset>()
                    .map_err(|e| Error::Config(format!("utc_offset {value:?}: {e}")))?
            }
            "contact_threshold_secs" => self.contact_threshold_secs = parse_secs(key, value)?,
            "min_talk_call_secs" => self.min_talk_call_secs = parse_secs(key, value)?,
            "remediation_type_ids" => self.remediation_type_ids = parse_id_list(key, value)?,
            "booked_action_type" => self.booked_action_type = value.to_string(),
            "booked_note_marker" => {
                if value.is_empty() {
                    return Err(Error::Config("booked_note_marker cannot be empty".into()));
                }
                self.booked_note_marker = value.to_string()
            }
            "crm_base_url" => {
                self.crm_base_url = Url::parse(value)
                    .map_err(|e| Error::Config(format!("crm_base_url {value:?}: {e}")))?
            }
            "thresholds.talk_per_day" => {
                self.thresholds.talk_per_day = Thresholds::parse(key, value)?
            }
            "thresholds.quotes_per_day" => {
                self.thresholds.quotes_per_day = Thresholds::parse(key, value)?
            }
            "thresholds.apps_per_day" => {
                self.thresholds.apps_per_day = Thresholds::parse(key, value)?
            }
            "thresholds.monthly_inforce" => {
                self.thresholds.monthly_inforce = Thresholds::parse(key, value)?
            }
            other => return Err(Error::Config(format!("unknown config key: {other}"))),
        }
        Ok(())
    }

    pub fn adviser_id_list(&self) -> Vec<i64> {
        self.adviser_ids.iter().copied().collect()
    }

    pub fn contact_threshold_us(&self) -> i64 {
        self.contact_threshold_secs.saturating_mul(US_PER_SEC)
    }

    pub fn min_talk_call_us(&self) -> i64 {
        self.min_talk_call_secs.saturating_mul(US_PER_SEC)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| Error::Config(format!("{key} {value:?}: {e}")))
}

/// Whole seconds that still fit in microseconds.
fn parse_secs(key: &str, value: &str) -> Result<i64> {
    let secs: i64 = parse_value(key, value)?;
    if !(0..=i64::MAX / US_PER_SEC).contains(&secs) {
        return Err(Error::Config(format!("{key} out of range: {secs}")));
    }
    Ok(secs)
}

fn parse_id_list(key: &str, value: &str) -> Result<Vec<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_value(key, s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_defaults() {
        let c = DashboardConfig::default();
        assert_eq!(c.adviser_id_list(), vec![53, 152, 181, 182, 183]);
        assert_eq!(c.utc_offset.local_minus_utc(), 39600);
        assert_eq!(c.contact_threshold_us(), 45_000_000);
        assert_eq!(c.min_talk_call_us(), 10_000_000);
        assert_eq!(c.remediation_type_ids.len(), 14);
        assert_eq!(c.min_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn test_threshold_classification() {
        let t = ThresholdTable::default();
        assert_eq!(t.talk_per_day.classify(9000.0), Color::Green);
        assert_eq!(t.talk_per_day.classify(8999.0), Color::Orange);
        assert_eq!(t.talk_per_day.classify(7199.9), Color::Red);
        assert_eq!(t.quotes_per_day.classify(4.0), Color::Orange);
        assert_eq!(t.apps_per_day.classify(0.0), Color::Red);
        assert_eq!(t.monthly_inforce.classify(25000.0), Color::Green);
    }

    #[test]
    fn test_apply_overrides() {
        let mut c = DashboardConfig::default();
        c.apply("advisers", "7, 3,5").unwrap();
        assert_eq!(c.adviser_id_list(), vec![3, 5, 7]);
        c.apply("utc_offset", "+10:00").unwrap();
        assert_eq!(c.utc_offset.local_minus_utc(), 36000);
        c.apply("thresholds.quotes_per_day", "8,5").unwrap();
        assert_eq!(c.thresholds.quotes_per_day, Thresholds::new(8.0, 5.0));
        c.apply("contact_threshold_secs", "30").unwrap();
        assert_eq!(c.contact_threshold_us(), 30_000_000);
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut c = DashboardConfig::default();
        assert!(c.apply("min_date", "yesterday").is_err());
        assert!(c.apply("utc_offset", "AEDT").is_err());
        assert!(c.apply("thresholds.talk_per_day", "9000").is_err());
        assert!(c.apply("thresholds.talk_per_day", "100,200").is_err());
        assert!(c.apply("crm_base_url", "not a url").is_err());
        assert!(c.apply("advisers", "").is_err());
        assert!(c.apply("nope", "1").is_err());
    }

    #[test]
    fn test_apply_rejects_durations_out_of_range() {
        let mut c = DashboardConfig::default();
        assert!(c.apply("contact_threshold_secs", "10000000000000").is_err());
        assert!(c.apply("contact_threshold_secs", "-5").is_err());
        assert!(c.apply("min_talk_call_secs", "-1").is_err());
        assert_eq!(c.contact_threshold_us(), 45_000_000);

        let max = (i64::MAX / 1_000_000).to_string();
        c.apply("min_talk_call_secs", &max).unwrap();
        assert!(c.min_talk_call_us() > 0);
        c.apply("contact_threshold_secs", "0").unwrap();
        assert_eq!(c.contact_threshold_us(), 0);
    }

    #[test]
    fn test_apply_rejects_non_finite_thresholds() {
        let mut c = DashboardConfig::default();
        assert!(c.apply("thresholds.talk_per_day", "NaN,NaN").is_err());
        assert!(c.apply("thresholds.apps_per_day", "inf,1").is_err());
        assert!(c.apply("thresholds.quotes_per_day", "6,-inf").is_err());
        assert_eq!(c.thresholds, ThresholdTable::default());
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let db = Database::open_memory().await.unwrap();
        let config = db
            .writer()
            .call(|conn| {
                repository::set_config(conn, "advisers", "181,182")?;
                repository::set_config(conn, "min_date", "2025-02-01")?;
                repository::set_config(conn, "unrelated", "x")?;
                Ok::<_, rusqlite::Error>(DashboardConfig::load(conn))
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(config.adviser_id_list(), vec![181, 182]);
        assert_eq!(config.min_date, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
    }
}
