//! Lead-funnel stages per adviser. Assigned and booked count leads by their
//! assignment time; contacted and no-contact count Hungup calls by duration.

use rusqlite::Connection;

use super::sql::{local_weekday_filter, placeholders, query_rows, Args, Grouping};
use super::{AdviserMap, ExtractScope, PipelineFunnel};
use crate::window::Bucket;

pub fn extract(
    conn: &Connection,
    scope: &ExtractScope,
) -> Result<AdviserMap<PipelineFunnel>, rusqlite::Error> {
    let mut funnel: AdviserMap<PipelineFunnel> = scope.zeroed();

    for (user_id, _, n) in assigned(conn, scope, Grouping::Window, false)? {
        if let Some(f) = funnel.get_mut(&user_id) {
            f.assigned = n;
        }
    }
    for (user_id, _, contacted, no_contact) in call_contacts(conn, scope, Grouping::Window)? {
        if let Some(f) = funnel.get_mut(&user_id) {
            f.contacted = contacted;
            f.no_contact = no_contact;
        }
    }
    for (user_id, _, n) in booked(conn, scope, Grouping::Window, false)? {
        if let Some(f) = funnel.get_mut(&user_id) {
            f.booked = n;
        }
    }

    Ok(funnel)
}

/// Leads assigned in the window.
pub(crate) fn assigned(
    conn: &Connection,
    scope: &ExtractScope,
    grouping: Grouping,
    weekdays_only: bool,
) -> Result<Vec<(i64, Option<Bucket>, i64)>, rusqlite::Error> {
    lead_counts(conn, scope, grouping, weekdays_only, None)
}

/// Leads assigned in the window that, at any point in their history,
/// received a booking document action.
pub(crate) fn booked(
    conn: &Connection,
    scope: &ExtractScope,
    grouping: Grouping,
    weekdays_only: bool,
) -> Result<Vec<(i64, Option<Bucket>, i64)>, rusqlite::Error> {
    let exists = "AND EXISTS (
             SELECT 1 FROM lead_actions la
             WHERE la.object_id = l.id
               AND la.object_type = 'lead'
               AND la.action_type = ?
               AND instr(la.note, ?) > 0
           )";
    lead_counts(conn, scope, grouping, weekdays_only, Some(exists))
}

fn lead_counts(
    conn: &Connection,
    scope: &ExtractScope,
    grouping: Grouping,
    weekdays_only: bool,
    booked_filter: Option<&str>,
) -> Result<Vec<(i64, Option<Bucket>, i64)>, rusqlite::Error> {
    let weekday = if weekdays_only {
        format!("AND {}", local_weekday_filter("l.assigned"))
    } else {
        String::new()
    };
    let sql = format!(
        "SELECT l.user_id, {} AS bucket, COUNT(DISTINCT l.id)
         FROM leads l
         WHERE l.assigned >= ? AND l.assigned < ?
           AND l.user_id IN ({})
           {weekday}
           {}
         GROUP BY l.user_id, bucket",
        grouping.key_expr("l.assigned"),
        placeholders(scope.adviser_ids.len()),
        booked_filter.unwrap_or(""),
    );

    let mut args = grouping
        .bind_key(Args::new(), scope)
        .text(scope.bounds.start_key())
        .text(scope.bounds.end_key())
        .ids(&scope.adviser_ids);
    if weekdays_only {
        args = args.text(scope.bounds.local_modifier());
    }
    if booked_filter.is_some() {
        args = args
            .text(scope.config.booked_action_type.clone())
            .text(scope.config.booked_note_marker.clone());
    }

    query_rows(conn, &sql, &args, |row| {
        Ok((row.get(0)?, grouping.bucket(&row.get(1)?), row.get(2)?))
    })
}

/// Hungup calls split at the contact threshold: (contacted, no_contact).
pub(crate) fn call_contacts(
    conn: &Connection,
    scope: &ExtractScope,
    grouping: Grouping,
) -> Result<Vec<(i64, Option<Bucket>, i64, i64)>, rusqlite::Error> {
    let sql = format!(
        "SELECT up.user_id, {} AS bucket,
                SUM(CASE WHEN cr.duration_us >= ? THEN 1 ELSE 0 END),
                SUM(CASE WHEN cr.duration_us < ? THEN 1 ELSE 0 END)
         FROM call_records cr
         JOIN user_profiles up ON up.extension = cr.extension
         WHERE cr.status = 'Hungup'
           AND cr.created >= ? AND cr.created < ?
           AND up.user_id IN ({})
         GROUP BY up.user_id, bucket",
        grouping.key_expr("cr.created"),
        placeholders(scope.adviser_ids.len())
    );
    let threshold = scope.config.contact_threshold_us();
    let args = grouping
        .bind_key(Args::new(), scope)
        .int(threshold)
        .int(threshold)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::*;
    use crate::storage::Database;

    const LIQ: &str = "Created document: Life Insurance Questions (v2)";

    #[tokio::test]
    async fn test_contact_threshold_split() {
        let db = Database::open_memory().await.unwrap();
        let scope = scope(d(2025, 3, 3), d(2025, 3, 7));
        let funnel = db
            .writer()
            .call(move |conn| {
                seed_advisers(conn)?;
                call(conn, "201", 50, "2025-03-03 01:00:00")?;
                call(conn, "201", 40, "2025-03-03 02:00:00")?;
                call(conn, "201", 20, "2025-03-03 03:00:00")?;
                // Exactly at the threshold counts as contacted.
                call(conn, "202", 45, "2025-03-03 03:00:00")?;
                extract(conn, &scope)
            })
            .await
            .unwrap();

        assert_eq!(funnel[&ALICE].contacted, 1);
        assert_eq!(funnel[&ALICE].no_contact, 2);
        assert_eq!(funnel[&BOB].contacted, 1);
        assert_eq!(funnel[&BOB].no_contact, 0);
        assert_eq!(funnel[&CARA], PipelineFunnel::default());
    }

    #[tokio::test]
    async fn test_assigned_and_booked() {
        let db = Database::open_memory().await.unwrap();
        let scope = scope(d(2025, 3, 3), d(2025, 3, 7));
        let funnel = db
            .writer()
            .call(move |conn| {
                seed_advisers(conn)?;
                for id in 1..=4 {
                    lead(conn, id, ALICE, "2025-03-03 00:00:00")?;
                }
                // Assigned before the window: never counted, even when booked.
                lead(conn, 5, ALICE, "2025-02-20 00:00:00")?;
                lead_action(conn, "lead", 5, "doccreate", LIQ, "2025-03-04 00:00:00")?;

                // Booked twice: counted once.
                lead_action(conn, "lead", 1, "doccreate", LIQ, "2025-03-03 01:00:00")?;
                lead_action(conn, "lead", 1, "doccreate", LIQ, "2025-03-03 02:00:00")?;
                // Action after the window still counts.
                lead_action(conn, "lead", 2, "doccreate", LIQ, "2025-04-01 00:00:00")?;
                // Wrong action type, wrong object type, case mismatch.
                lead_action(conn, "lead", 3, "email", LIQ, "2025-03-03 01:00:00")?;
                let app = "application";
                lead_action(conn, app, 3, "doccreate", LIQ, "2025-03-03 01:00:00")?;
                let lower = "life insurance questions";
                lead_action(conn, "lead", 4, "doccreate", lower, "2025-03-03 01:00:00")?;
                extract(conn, &scope)
            })
            .await
            .unwrap();

        assert_eq!(funnel[&ALICE].assigned, 4);
        assert_eq!(funnel[&ALICE].booked, 2);
    }

    #[tokio::test]
    async fn test_stages_are_independent() {
        let db = Database::open_memory().await.unwrap();
        let scope = scope(d(2025, 3, 3), d(2025, 3, 7));
        let funnel = db
            .writer()
            .call(move |conn| {
                seed_advisers(conn)?;
                // Calls with no assigned leads at all.
                call(conn, "202", 60, "2025-03-03 01:00:00")?;
                call(conn, "202", 60, "2025-03-03 02:00:00")?;
                extract(conn, &scope)
            })
            .await
            .unwrap();

        assert_eq!(funnel[&BOB].assigned, 0);
        assert_eq!(funnel[&BOB].contacted, 2);
    }

    #[tokio::test]
    async fn test_assigned_by_local_day_weekdays_only() {
        let db = Database::open_memory().await.unwrap();
        let scope = scope(d(2025, 3, 7), d(2025, 3, 10));
        let rows = db
            .writer()
            .call(move |conn| {
                seed_advisers(conn)?;
                // Friday 10:00 local
                lead(conn, 1, BOB, "2025-03-06 23:00:00")?;
                // Saturday 00:30 local
                lead(conn, 2, BOB, "2025-03-07 13:30:00")?;
                // Monday 09:00 local
                lead(conn, 3, BOB, "2025-03-09 22:00:00")?;
                assigned(conn, &scope, Grouping::LocalDay, true)
            })
            .await
            .unwrap();

        let mut buckets: Vec<(i64, Option<Bucket>, i64)> = rows;
        buckets.sort();
        assert_eq!(
            buckets,
            vec![
                (BOB, Some(Bucket::Day(d(2025, 3, 7))), 1),
                (BOB, Some(Bucket::Day(d(2025, 3, 10))), 1),
            ]
        );
    }
}
