//! Window totals per adviser: talk time, quotes, applications, inforce and
//! days worked.

use rusqlite::Connection;

use super::sql::{placeholders, query_rows, Args, Grouping};
use super::{AdviserMap, ExtractScope, MetricRow};
use crate::window::Bucket;

pub fn extract(
    conn: &Connection,
    scope: &ExtractScope,
) -> Result<AdviserMap<MetricRow>, rusqlite::Error> {
    let mut rows: AdviserMap<MetricRow> = scope.zeroed();

    for (user_id, _, talk_seconds) in talk_seconds(conn, scope, Grouping::Window)? {
        if let Some(row) = rows.get_mut(&user_id) {
            row.talk_seconds = talk_seconds;
        }
    }

    for (user_id, stats) in daily_stats(conn, scope)? {
        if let Some(row) = rows.get_mut(&user_id) {
            row.apps_count = stats.apps_count;
            row.apps_value = stats.apps_value;
            row.inforce_count = stats.inforce_count;
            row.inforce_value = stats.inforce_value;
            row.days_worked = stats.days_worked;
        }
    }

    for (user_id, _, count, value) in latest_quotes(conn, scope, Grouping::Window)? {
        if let Some(row) = rows.get_mut(&user_id) {
            row.quotes_count = count;
            row.quotes_value = value;
        }
    }

    Ok(rows)
}

/// Hungup calls longer than the minimum talk duration, in seconds.
pub(crate) fn talk_seconds(
    conn: &Connection,
    scope: &ExtractScope,
    grouping: Grouping,
) -> Result<Vec<(i64, Option<Bucket>, f64)>, rusqlite::Error> {
    let sql = format!(
        "SELECT up.user_id, {} AS bucket, COALESCE(SUM(cr.duration_us), 0) / 1000000.0
         FROM call_records cr
         JOIN user_profiles up ON up.extension = cr.extension
         WHERE cr.status = 'Hungup'
           AND cr.duration_us > ?
           AND cr.created >= ? AND cr.created < ?
           AND up.user_id IN ({})
         GROUP BY up.user_id, bucket",
        grouping.key_expr("cr.created"),
        placeholders(scope.adviser_ids.len())
    );
    let args = grouping
        .bind_key(Args::new(), scope)
        .int(scope.config.min_talk_call_us())
        .text(scope.bounds.start_key())
        .text(scope.bounds.end_key())
        .ids(&scope.adviser_ids);
    query_rows(conn, &sql, &args, |row| {
        Ok((row.get(0)?, grouping.bucket(&row.get(1)?), row.get(2)?))
    })
}

/// Rollup figures summed over the local date range.
fn daily_stats(
    conn: &Connection,
    scope: &ExtractScope,
) -> Result<Vec<(i64, MetricRow)>, rusqlite::Error> {
    let sql = format!(
        "SELECT user_id,
                COALESCE(SUM(apps_added), 0),
                COALESCE(SUM(apps_added_value), 0),
                COALESCE(SUM(apps_inforce), 0),
                COALESCE(SUM(apps_inforce_value), 0),
                SUM(CASE WHEN contact > 0 OR quotes_added > 0 OR apps_added > 0 THEN 1 ELSE 0 END)
         FROM user_daily_stats
         WHERE date BETWEEN ? AND ?
           AND user_id IN ({})
         GROUP BY user_id",
        placeholders(scope.adviser_ids.len())
    );
    let args = Args::new()
        .text(scope.window.start.to_string())
        .text(scope.window.end.to_string())
        .ids(&scope.adviser_ids);
    query_rows(conn, &sql, &args, |row| {
        Ok((
            row.get(0)?,
            MetricRow {
                apps_count: row.get(1)?,
                apps_value: row.get(2)?,
                inforce_count: row.get(3)?,
                inforce_value: row.get(4)?,
                days_worked: row.get(5)?,
                ..MetricRow::default()
            },
        ))
    })
}

/// Subquery selecting the latest sent, undeleted quote per (adviser, lead)
/// created in the window. Binds: start, end, adviser ids.
fn latest_quotes_subquery(adviser_count: usize) -> String {
    format!(
        "SELECT user_id, lead_id, MAX(created) AS max_created
         FROM lead_quotes
         WHERE sent = 1 AND deleted = 0
           AND created >= ? AND created < ?
           AND user_id IN ({})
         GROUP BY user_id, lead_id",
        placeholders(adviser_count)
    )
}

/// Count and value of the latest quote per (adviser, lead), bucketed by the
/// quote's creation time.
pub(crate) fn latest_quotes(
    conn: &Connection,
    scope: &ExtractScope,
    grouping: Grouping,
) -> Result<Vec<(i64, Option<Bucket>, i64, f64)>, rusqlite::Error> {
    let sql = format!(
        "SELECT lq.user_id, {} AS bucket, COUNT(*), COALESCE(SUM(lq.value), 0)
         FROM lead_quotes lq
         JOIN ({}) latest
           ON lq.user_id = latest.user_id
          AND lq.lead_id = latest.lead_id
          AND lq.created = latest.max_created
         WHERE lq.sent = 1 AND lq.deleted = 0
         GROUP BY lq.user_id, bucket",
        grouping.key_expr("lq.created"),
        latest_quotes_subquery(scope.adviser_ids.len())
    );
    let args = grouping
        .bind_key(Args::new(), scope)
        .text(scope.bounds.start_key())
        .text(scope.bounds.end_key())
        .ids(&scope.adviser_ids);
    query_rows(conn, &sql, &args, |row| {
        Ok((
            row.get(0)?,
            grouping.bucket(&row.get(1)?),
            row.get(2)?,
            row.get(3)?,
        ))
    })
}
