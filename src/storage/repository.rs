//! Reads over the upstream relations plus the `app_config` table. The row
//! inserts are test-only; the store is populated upstream.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::metrics::types::Adviser;

// ── Adviser directory ──────────────────────────────────────────────

#[cfg(test)]
pub(crate) fn insert_user(
    conn: &Connection,
    id: i64,
    first_name: &str,
    last_name: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO users (id, first_name, last_name) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
           first_name = excluded.first_name,
           last_name = excluded.last_name",
        params![id, first_name, last_name],
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn add_group_member(
    conn: &Connection,
    group_id: i64,
    user_id: i64,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO user_group_members (group_id, user_id) VALUES (?1, ?2)",
        params![group_id, user_id],
    )?;
    Ok(())
}

/// Set the phone extension that links an adviser to their call records.
#[cfg(test)]
pub(crate) fn set_extension(
    conn: &Connection,
    user_id: i64,
    extension: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO user_profiles (user_id, extension) VALUES (?1, ?2)",
        params![user_id, extension],
    )?;
    Ok(())
}

/// Advisers that are both in the directory group and on the allow-list,
/// ordered by last name then first name.
pub fn get_advisers(
    conn: &Connection,
    group_id: i64,
    adviser_ids: &[i64],
) -> Result<Vec<Adviser>, rusqlite::Error> {
    if adviser_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; adviser_ids.len()].join(", ");
    let sql = format!(
        "SELECT u.id, u.first_name, u.last_name
         FROM users u
         JOIN user_group_members g ON g.user_id = u.id
         WHERE g.group_id = ? AND u.id IN ({placeholders})
         ORDER BY u.last_name, u.first_name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let values = std::iter::once(group_id).chain(adviser_ids.iter().copied());
    let rows = stmt.query_map(params_from_iter(values), |row| {
        let first_name: String = row.get(1)?;
        let last_name: String = row.get(2)?;
        Ok(Adviser::new(row.get(0)?, first_name, last_name))
    })?;
    rows.collect()
}

pub fn get_adviser(
    conn: &Connection,
    group_id: i64,
    adviser_ids: &[i64],
    id: i64,
) -> Result<Option<Adviser>, rusqlite::Error> {
    if !adviser_ids.contains(&id) {
        return Ok(None);
    }
    conn.query_row(
        "SELECT u.id, u.first_name, u.last_name
         FROM users u
         JOIN user_group_members g ON g.user_id = u.id
         WHERE g.group_id = ?1 AND u.id = ?2",
        params![group_id, id],
        |row| Ok(Adviser::new(row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()
}

// ── Calls ──────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) fn insert_call_record(
    conn: &Connection,
    extension: &str,
    duration_us: i64,
    status: &str,
    created: &str,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO call_records (extension, duration_us, status, created)
         VALUES (?1, ?2, ?3, ?4)",
        params![extension, duration_us, status, created],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Leads ──────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) fn insert_lead(
    conn: &Connection,
    id: i64,
    user_id: Option<i64>,
    first_name: &str,
    last_name: &str,
    assigned: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO leads (id, user_id, first_name, last_name, assigned)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, first_name, last_name, assigned],
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn insert_lead_action(
    conn: &Connection,
    object_type: &str,
    object_id: i64,
    action_type: &str,
    note: &str,
    created: &str,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO lead_actions (object_type, object_id, action_type, note, created)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![object_type, object_id, action_type, note, created],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A quote row as stored upstream.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct QuoteRecord {
    pub user_id: i64,
    pub lead_id: i64,
    pub value: f64,
    pub sent: bool,
    pub deleted: bool,
    pub created: String,
}

#[cfg(test)]
pub(crate) fn insert_quote(conn: &Connection, quote: &QuoteRecord) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO lead_quotes (user_id, lead_id, value, sent, deleted, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            quote.user_id,
            quote.lead_id,
            quote.value,
            quote.sent as i32,
            quote.deleted as i32,
            quote.created,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Daily stats ────────────────────────────────────────────────────

/// One adviser-day of the upstream rollup. `date` is the local calendar date.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct DailyStatsRecord {
    pub user_id: i64,
    pub date: String,
    pub contact: i64,
    pub quotes_added: i64,
    pub apps_added: i64,
    pub apps_added_value: f64,
    pub apps_inforce: i64,
    pub apps_inforce_value: f64,
}

#[cfg(test)]
pub(crate) fn upsert_daily_stats(
    conn: &Connection,
    stats: &DailyStatsRecord,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO user_daily_stats (
            user_id, date, contact, quotes_added, apps_added,
            apps_added_value, apps_inforce, apps_inforce_value
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(user_id, date) DO UPDATE SET
            contact=excluded.contact, quotes_added=excluded.quotes_added,
            apps_added=excluded.apps_added, apps_added_value=excluded.apps_added_value,
            apps_inforce=excluded.apps_inforce, apps_inforce_value=excluded.apps_inforce_value",
        params![
            stats.user_id,
            stats.date,
            stats.contact,
            stats.quotes_added,
            stats.apps_added,
            stats.apps_added_value,
            stats.apps_inforce,
            stats.apps_inforce_value,
        ],
    )?;
    Ok(())
}

// ── Requirements & schedules ───────────────────────────────────────

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RequirementRecord {
    pub lead_id: i64,
    pub type_id: i64,
    pub object_type: Option<String>,
    pub object_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub last_note: Option<String>,
    pub status: i64,
    pub created: String,
}

#[cfg(test)]
pub(crate) fn insert_requirement(
    conn: &Connection,
    req: &RequirementRecord,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO lead_requirements (
            lead_id, type_id, object_type, object_id, name,
            description, last_note, status, created
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            req.lead_id,
            req.type_id,
            req.object_type,
            req.object_id,
            req.name,
            req.description,
            req.last_note,
            req.status,
            req.created,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
pub(crate) fn insert_schedule(
    conn: &Connection,
    user_id: i64,
    date: &str,
    text: &str,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO lead_schedules (user_id, date, text) VALUES (?1, ?2, ?3)",
        params![user_id, date, text],
    )?;
    Ok(conn.last_insert_rowid())
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_config(conn: &Connection, key: &str) -> Result<bool, rusqlite::Error> {
    let n = conn.execute("DELETE FROM app_config WHERE key = ?1", params![key])?;
    Ok(n > 0)
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                set_config(conn, "group_id", "56")?;
                let val = get_config(conn, "group_id")?;
                assert_eq!(val, Some("56".to_string()));

                set_config(conn, "group_id", "57")?;
                assert_eq!(get_config(conn, "group_id")?, Some("57".to_string()));

                let missing = get_config(conn, "nonexistent")?;
                assert_eq!(missing, None);

                assert!(delete_config(conn, "group_id")?);
                assert!(!delete_config(conn, "group_id")?);
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_config_sorted() {
        let db = Database::open_memory().await.unwrap();
        let all = db
            .writer()
            .call(|conn| {
                set_config(conn, "min_date", "2025-02-01")?;
                set_config(conn, "advisers", "1,2")?;
                list_config(conn)
            })
            .await
            .unwrap();
        assert_eq!(
            all,
            vec![
                ("advisers".to_string(), "1,2".to_string()),
                ("min_date".to_string(), "2025-02-01".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_get_advisers_filters_and_orders() {
        let db = Database::open_memory().await.unwrap();

        let advisers = db
            .writer()
            .call(|conn| {
                insert_user(conn, 1, "Zoe", "Baker")?;
                insert_user(conn, 2, "Adam", "Baker")?;
                insert_user(conn, 3, "Carl", "Adams")?;
                insert_user(conn, 4, "Not", "Listed")?;
                insert_user(conn, 5, "Other", "Group")?;
                for id in 1..=4 {
                    add_group_member(conn, 56, id)?;
                }
                add_group_member(conn, 99, 5)?;
                get_advisers(conn, 56, &[1, 2, 3, 5])
            })
            .await
            .unwrap();

        let ids: Vec<i64> = advisers.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(advisers[0].name, "Carl Adams");
    }

    #[tokio::test]
    async fn test_get_advisers_empty_allow_list() {
        let db = Database::open_memory().await.unwrap();
        let advisers = db
            .writer()
            .call(|conn| get_advisers(conn, 56, &[]))
            .await
            .unwrap();
        assert!(advisers.is_empty());
    }

    #[tokio::test]
    async fn test_get_adviser() {
        let db = Database::open_memory().await.unwrap();
        let (found, off_list, missing) = db
            .writer()
            .call(|conn| {
                insert_user(conn, 7, "Kim", "Lee")?;
                add_group_member(conn, 56, 7)?;
                Ok::<_, rusqlite::Error>((
                    get_adviser(conn, 56, &[7], 7)?,
                    get_adviser(conn, 56, &[8], 7)?,
                    get_adviser(conn, 56, &[9], 9)?,
                ))
            })
            .await
            .unwrap();
        assert_eq!(found.map(|a| a.name), Some("Kim Lee".to_string()));
        assert!(off_list.is_none());
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_daily_stats_upsert_replaces() {
        let db = Database::open_memory().await.unwrap();
        let contact: i64 = db
            .writer()
            .call(|conn| {
                let mut stats = DailyStatsRecord {
                    user_id: 1,
                    date: "2025-03-03".into(),
                    contact: 4,
                    ..Default::default()
                };
                upsert_daily_stats(conn, &stats)?;
                stats.contact = 9;
                upsert_daily_stats(conn, &stats)?;
                conn.query_row(
                    "SELECT contact FROM user_daily_stats WHERE user_id = 1",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(contact, 9);
    }

    #[tokio::test]
    async fn test_requirement_needs_existing_lead() {
        let db = Database::open_memory().await.unwrap();
        let result = db
            .writer()
            .call(|conn| {
                insert_requirement(
                    conn,
                    &RequirementRecord {
                        lead_id: 404,
                        type_id: 138,
                        created: "2025-03-03 00:00:00".into(),
                        ..Default::default()
                    },
                )
            })
            .await;
        assert!(result.is_err());
    }
}
