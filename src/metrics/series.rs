//! Bucketed performance and funnel series for charting.

use chrono::NaiveDate;
use rusqlite::Connection;

use super::sql::{get_date, placeholders, query_rows, Args, Grouping};
use super::{performance, pipeline, BucketSeries, ExtractScope, SeriesPoint};
use crate::window::{Bucket, FIRST_HOUR, LAST_HOUR};

/// Series by local hour of day for a single-day window. Hours outside
/// `FIRST_HOUR..=LAST_HOUR` are dropped. The daily rollup has no hourly
/// grain, so application and inforce figures stay zero.
pub fn hourly(conn: &Connection, scope: &ExtractScope) -> Result<BucketSeries, rusqlite::Error> {
    let grouping = Grouping::LocalHour;
    let mut series = BucketSeries::default();
    let in_view = |bucket: Option<Bucket>| match bucket {
        Some(Bucket::Hour(h)) if (FIRST_HOUR..=LAST_HOUR).contains(&h) => Some(Bucket::Hour(h)),
        _ => None,
    };

    for (user_id, bucket, secs) in performance::talk_seconds(conn, scope, grouping)? {
        if let Some(bucket) = in_view(bucket) {
            series.point_mut(user_id, bucket).talk_seconds = secs;
        }
    }
    for (user_id, bucket, count, _) in performance::latest_quotes(conn, scope, grouping)? {
        if let Some(bucket) = in_view(bucket) {
            series.point_mut(user_id, bucket).quotes_count = count;
        }
    }

    for (user_id, bucket, n) in pipeline::assigned(conn, scope, grouping, false)? {
        if let Some(bucket) = in_view(bucket) {
            series.funnel_mut(user_id, bucket).assigned = n;
        }
    }
    let contacts = pipeline::call_contacts(conn, scope, grouping)?;
    for (user_id, bucket, contacted, no_contact) in contacts {
        if let Some(bucket) = in_view(bucket) {
            let f = series.funnel_mut(user_id, bucket);
            f.contacted = contacted;
            f.no_contact = no_contact;
        }
    }
    for (user_id, bucket, n) in pipeline::booked(conn, scope, grouping, false)? {
        if let Some(bucket) = in_view(bucket) {
            series.funnel_mut(user_id, bucket).booked = n;
        }
    }

    Ok(series)
}

/// Series by local calendar day. Rollup rows and assigned/booked leads are
/// restricted to weekdays; talk time is merged in for any day it occurs,
/// including days missing from the rollup.
pub fn daily(conn: &Connection, scope: &ExtractScope) -> Result<BucketSeries, rusqlite::Error> {
    let grouping = Grouping::LocalDay;
    let mut series = BucketSeries::default();

    for (user_id, date, point) in daily_stats(conn, scope)? {
        series.data_days.insert(date);
        *series.point_mut(user_id, Bucket::Day(date)) = point;
    }
    for (user_id, bucket, secs) in performance::talk_seconds(conn, scope, grouping)? {
        if let Some(bucket @ Bucket::Day(date)) = bucket {
            series.data_days.insert(date);
            series.point_mut(user_id, bucket).talk_seconds = secs;
        }
    }

    for (user_id, bucket, n) in pipeline::assigned(conn, scope, grouping, true)? {
        if let Some(bucket) = bucket {
            series.funnel_mut(user_id, bucket).assigned = n;
        }
    }
    let contacts = pipeline::call_contacts(conn, scope, grouping)?;
    for (user_id, bucket, contacted, no_contact) in contacts {
        if let Some(bucket) = bucket {
            let f = series.funnel_mut(user_id, bucket);
            f.contacted = contacted;
            f.no_contact = no_contact;
        }
    }
    for (user_id, bucket, n) in pipeline::booked(conn, scope, grouping, true)? {
        if let Some(bucket) = bucket {
            series.funnel_mut(user_id, bucket).booked = n;
        }
    }

    Ok(series)
}

/// Weekday rollup rows in the local date range.
fn daily_stats(
    conn: &Connection,
    scope: &ExtractScope,
) -> Result<Vec<(i64, NaiveDate, SeriesPoint)>, rusqlite::Error> {
    let sql = format!(
        "SELECT user_id, date, quotes_added, apps_added, apps_added_value,
                apps_inforce, apps_inforce_value
         FROM user_daily_stats
         WHERE date BETWEEN ? AND ?
           AND strftime('%w', date) NOT IN ('0', '6')
           AND user_id IN ({})
         ORDER BY date, user_id",
        placeholders(scope.adviser_ids.len())
    );
    let args = Args::new()
        .text(scope.window.start.to_string())
        .text(scope.window.end.to_string())
        .ids(&scope.adviser_ids);
    query_rows(conn, &sql, &args, |row| {
        let date = get_date(row, 1)?;
        Ok((
            row.get(0)?,
            date,
            SeriesPoint {
                talk_seconds: 0.0,
                quotes_count: row.get(2)?,
                apps_count: row.get(3)?,
                apps_value: row.get(4)?,
                inforce_count: row.get(5)?,
                inforce_value: row.get(6)?,
            },
        ))
    })
}
