//! Remediation tasks raised in the window, grouped by the lead's adviser.

use rusqlite::Connection;

use super::sql::{get_date, placeholders, query_rows, Args};
use super::{AdviserMap, ExtractScope, RemediationCounts, RemediationTask};

const FROM_WHERE: &str = "FROM lead_requirements lr
         JOIN leads l ON l.id = lr.lead_id
         WHERE lr.created >= ? AND lr.created < ?";

/// Per-adviser totals plus the full task list, oldest first.
#[allow(clippy::type_complexity)]
pub fn extract(
    conn: &Connection,
    scope: &ExtractScope,
) -> Result<(AdviserMap<RemediationCounts>, AdviserMap<Vec<RemediationTask>>), rusqlite::Error> {
    Ok((counts(conn, scope)?, details(conn, scope)?))
}

fn scope_filter(scope: &ExtractScope) -> String {
    format!(
        "AND lr.type_id IN ({}) AND l.user_id IN ({})",
        placeholders(scope.config.remediation_type_ids.len()),
        placeholders(scope.adviser_ids.len())
    )
}

fn counts(
    conn: &Connection,
    scope: &ExtractScope,
) -> Result<AdviserMap<RemediationCounts>, rusqlite::Error> {
    let sql = format!(
        "SELECT l.user_id, COUNT(*), SUM(CASE WHEN lr.status IN (0, 1) THEN 1 ELSE 0 END)
         {FROM_WHERE}
         {}
         GROUP BY l.user_id",
        scope_filter(scope)
    );
    let args = Args::new()
        .text(scope.bounds.start_key())
        .text(scope.bounds.end_key())
        .ids(&scope.config.remediation_type_ids)
        .ids(&scope.adviser_ids);

    let rows = query_rows(conn, &sql, &args, |row| {
        Ok((row.get::<_, i64>(0)?, row.get(1)?, row.get(2)?))
    })?;
    let mut counts: AdviserMap<RemediationCounts> = scope.zeroed();
    for (user_id, total, pending) in rows {
        counts.insert(user_id, RemediationCounts { total, pending });
    }
    Ok(counts)
}

fn details(
    conn: &Connection,
    scope: &ExtractScope,
) -> Result<AdviserMap<Vec<RemediationTask>>, rusqlite::Error> {
    let sql = format!(
        "SELECT l.user_id, lr.id, lr.lead_id, lr.object_type, lr.object_id, lr.name,
                lr.description, lr.last_note, lr.status,
                date(lr.created, ?),
                l.first_name || ' ' || l.last_name,
                CASE WHEN lr.object_type = 'application' THEN lr.object_id END
         {FROM_WHERE}
         {}
         ORDER BY lr.created ASC, lr.id ASC",
        scope_filter(scope)
    );
    let args = Args::new()
        .text(scope.bounds.local_modifier())
        .text(scope.bounds.start_key())
        .text(scope.bounds.end_key())
        .ids(&scope.config.remediation_type_ids)
        .ids(&scope.adviser_ids);

    let rows = query_rows(conn, &sql, &args, |row| {
        let created_date = get_date(row, 9)?;
        Ok((
            row.get::<_, i64>(0)?,
            RemediationTask {
                req_id: row.get(1)?,
                lead_id: row.get(2)?,
                object_type: row.get(3)?,
                object_id: row.get(4)?,
                task_name: row.get(5)?,
                description: trimmed(row.get(6)?),
                last_note: trimmed(row.get(7)?),
                status: row.get(8)?,
                created_date,
                client_name: trimmed(row.get(10)?),
                app_id: row.get(11)?,
            },
        ))
    })?;

    let mut details: AdviserMap<Vec<RemediationTask>> = scope.zeroed();
    for (user_id, task) in rows {
        details.entry(user_id).or_default().push(task);
    }
    Ok(details)
}

fn trimmed(value: Option<String>) -> String {
    value.as_deref().unwrap_or("").trim().to_string()
}
