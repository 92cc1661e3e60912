use rusqlite_migration::{Migrations, M};

/// Source relations the extractors read from, in dependency order.
pub const SOURCE_TABLES: &[&str] = &[
    "users",
    "user_group_members",
    "user_profiles",
    "call_records",
    "leads",
    "lead_actions",
    "lead_quotes",
    "user_daily_stats",
    "lead_requirements",
    "lead_schedules",
];

pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))])
}

/// Row count of every source relation, for the status report.
pub fn table_counts(conn: &rusqlite::Connection) -> Result<Vec<(String, i64)>, rusqlite::Error> {
    SOURCE_TABLES
        .iter()
        .map(|table| {
            // Table names come from the fixed list above.
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok((table.to_string(), count))
        })
        .collect()
}
