use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, Row};

use super::ExtractScope;
use crate::window::Bucket;

/// `?, ?, ?` for an `IN (...)` list of `n` values.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Positional bind values, pushed in the order their `?` appears in the SQL.
#[derive(Debug, Default, Clone)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.0.push(Value::Text(value.into()));
        self
    }

    pub fn int(mut self, value: i64) -> Self {
        self.0.push(Value::Integer(value));
        self
    }

    pub fn ids(mut self, ids: &[i64]) -> Self {
        self.0.extend(ids.iter().map(|id| Value::Integer(*id)));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How an extractor groups rows: one total for the window, or one value per
/// local hour or local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Window,
    LocalHour,
    LocalDay,
}

impl Grouping {
    /// SELECT expression yielding the bucket key for a UTC timestamp column.
    /// Binds the local modifier unless grouping by window.
    pub fn key_expr(&self, column: &str) -> String {
        match self {
            Grouping::Window => "NULL".to_string(),
            Grouping::LocalHour => format!("CAST(strftime('%H', {column}, ?) AS INTEGER)"),
            Grouping::LocalDay => format!("date({column}, ?)"),
        }
    }

    /// Push the bind for `key_expr`, if any.
    pub fn bind_key(&self, args: Args, scope: &ExtractScope) -> Args {
        match self {
            Grouping::Window => args,
            Grouping::LocalHour | Grouping::LocalDay => args.text(scope.bounds.local_modifier()),
        }
    }

    /// Bucket for a key read back from `key_expr`.
    pub fn bucket(&self, key: &Value) -> Option<Bucket> {
        match (self, key) {
            (Grouping::LocalHour, Value::Integer(h)) => u32::try_from(*h).ok().map(Bucket::Hour),
            (Grouping::LocalDay, Value::Text(s)) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Bucket::Day)
            }
            _ => None,
        }
    }
}

/// Weekday filter on the local date of a UTC timestamp column. Binds the
/// local modifier.
pub fn local_weekday_filter(column: &str) -> String {
    format!("strftime('%w', {column}, ?) NOT IN ('0', '6')")
}

/// Run `sql` with `args` and map every row.
pub fn query_rows<T, F>(
    conn: &Connection,
    sql: &str,
    args: &Args,
    f: F,
) -> Result<Vec<T>, rusqlite::Error>
where
    F: FnMut(&Row<'_>) -> Result<T, rusqlite::Error>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(args.0.iter()), f)?;
    rows.collect()
}

/// Read a `YYYY-MM-DD` text column as a date.
pub fn get_date(row: &Row<'_>, idx: usize) -> Result<NaiveDate, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_failure(idx, e))
}

/// A text column in `idx` that did not parse.
pub fn conversion_failure(idx: usize, err: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}
