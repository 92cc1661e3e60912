use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// First day of the month containing `d`.
pub fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// Monday of the ISO week containing `d`.
pub fn monday_of(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.weekday().num_days_from_monday() as i64)
}

pub fn is_weekday(d: NaiveDate) -> bool {
    !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Walk backwards from `d` (inclusive) to the nearest weekday.
pub fn roll_back_to_weekday(mut d: NaiveDate) -> NaiveDate {
    while !is_weekday(d) {
        d -= Duration::days(1);
    }
    d
}

/// Format seconds as `H:MM:SS`.
pub fn fmt_hms(seconds: f64) -> String {
    let s = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let (h, rem) = (s / 3600, s % 3600);
    format!("{}:{:02}:{:02}", h, rem / 60, rem % 60)
}

/// Format seconds as `H:MM`.
pub fn fmt_hm(seconds: f64) -> String {
    let s = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", s / 3600, (s % 3600) / 60)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_monday_of() {
        // 2025-03-06 is a Thursday
        assert_eq!(monday_of(d(2025, 3, 6)), d(2025, 3, 3));
        assert_eq!(monday_of(d(2025, 3, 3)), d(2025, 3, 3));
        assert_eq!(monday_of(d(2025, 3, 9)), d(2025, 3, 3));
    }

    #[test]
    fn test_roll_back_to_weekday() {
        assert_eq!(roll_back_to_weekday(d(2025, 3, 9)), d(2025, 3, 7));
        assert_eq!(roll_back_to_weekday(d(2025, 3, 8)), d(2025, 3, 7));
        assert_eq!(roll_back_to_weekday(d(2025, 3, 7)), d(2025, 3, 7));
    }

    #[test]
    fn test_fmt_hms() {
        assert_eq!(fmt_hms(0.0), "0:00:00");
        assert_eq!(fmt_hms(3725.9), "1:02:05");
        assert_eq!(fmt_hms(-5.0), "0:00:00");
        assert_eq!(fmt_hm(9000.0), "2:30");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(33.333, 1), 33.3);
        assert_eq!(round_to(1234.5678, 2), 1234.57);
    }
}
