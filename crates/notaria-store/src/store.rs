//! The DuckDB connection and the row-conversion helpers shared by the
//! repository modules.

use std::error::Error as StdError;
use std::path::Path;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use duckdb::types::Type;
use duckdb::{Connection, Row, ToSql};
use notaria_core::User;
use serde_json::Value;
use tracing::{debug, info};

use crate::StoreError;
use crate::schema::{SCHEMA, TABLES};

/// Relational store for every Notaria entity.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and
/// [`open_persistent`](Self::open_persistent) for a database file that
/// survives restarts. Both run the schema migration.
pub struct Store {
    pub(crate) conn: Connection,
}

/// Row visibility for list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Admins and superusers.
    All,
    /// Rows owned by this user id.
    Owner(i64),
}

impl Scope {
    pub fn for_user(user: &User) -> Self {
        if user.is_privileged() {
            Scope::All
        } else {
            Scope::Owner(user.id)
        }
    }
}

/// Dashboard tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardCounts {
    pub clients: i64,
    pub matters: i64,
    pub open_checks: i64,
    pub documents: i64,
}

impl Store {
    /// Open an in-memory database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open or create a database file at `path`.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        info!(path = %path.display(), "opened database");
        Ok(store)
    }

    /// Create any missing sequences and tables.
    pub fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA)?;
        debug!(tables = TABLES.len(), "schema migrated");
        Ok(())
    }

    /// Row count per table, in schema order.
    pub fn table_counts(&self) -> Result<Vec<(&'static str, i64)>, StoreError> {
        TABLES
            .iter()
            .map(|table| {
                let sql = format!("SELECT count(*) FROM {table}");
                let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
                Ok((*table, n))
            })
            .collect()
    }

    pub fn dashboard_counts(&self, scope: Scope) -> Result<DashboardCounts, StoreError> {
        let count = |sql: &str, params: &[&dyn ToSql]| -> Result<i64, StoreError> {
            Ok(self.conn.query_row(sql, params, |row| row.get(0))?)
        };
        let open = "status IN ('pending', 'in_progress', 'requires_review')";
        Ok(match scope {
            Scope::All => DashboardCounts {
                clients: count("SELECT count(*) FROM clients", &[])?,
                matters: count("SELECT count(*) FROM matters", &[])?,
                open_checks: count(&format!("SELECT count(*) FROM compliance_checks WHERE {open}"), &[])?,
                documents: count("SELECT count(*) FROM documents", &[])?,
            },
            Scope::Owner(uid) => DashboardCounts {
                clients: count("SELECT count(*) FROM clients WHERE created_by = ?", &[&uid])?,
                matters: count(
                    "SELECT count(*) FROM matters WHERE created_by = ? \
                     OR id IN (SELECT matter_id FROM matter_users WHERE user_id = ?)",
                    &[&uid, &uid],
                )?,
                open_checks: count(
                    &format!("SELECT count(*) FROM compliance_checks WHERE initiated_by = ? AND {open}"),
                    &[&uid],
                )?,
                documents: count("SELECT count(*) FROM documents WHERE uploaded_by = ?", &[&uid])?,
            },
        })
    }

    /// Run `sql` and map every row with `f`.
    pub(crate) fn query_list<T>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        f: impl FnMut(&Row<'_>) -> duckdb::Result<T>,
    ) -> Result<Vec<T>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, f)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

// ── Value encoding ──

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const TS_PARSE: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub(crate) fn fmt_opt_ts(ts: Option<NaiveDateTime>) -> Option<String> {
    ts.map(fmt_ts)
}

pub(crate) fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn fmt_opt_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(fmt_date)
}

pub(crate) fn fmt_json(value: &Value) -> String {
    value.to_string()
}

pub(crate) fn fmt_list(items: &[String]) -> String {
    Value::from(items.to_vec()).to_string()
}

// ── Row decoding ──

fn conversion<E>(idx: usize, err: E) -> duckdb::Error
where
    E: StdError + Send + Sync + 'static,
{
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Text column parsed through `FromStr` (enums).
pub(crate) fn parsed<T>(row: &Row<'_>, idx: usize) -> duckdb::Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion(idx, e))
}

pub(crate) fn ts(row: &Row<'_>, idx: usize) -> duckdb::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TS_PARSE).map_err(|e| conversion(idx, e))
}

pub(crate) fn opt_ts(row: &Row<'_>, idx: usize) -> duckdb::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDateTime::parse_from_str(&s, TS_PARSE).map_err(|e| conversion(idx, e)))
        .transpose()
}

pub(crate) fn date(row: &Row<'_>, idx: usize) -> duckdb::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion(idx, e))
}

pub(crate) fn opt_date(row: &Row<'_>, idx: usize) -> duckdb::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion(idx, e)))
        .transpose()
}

pub(crate) fn opt_json(row: &Row<'_>, idx: usize) -> duckdb::Result<Option<Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion(idx, e)))
        .transpose()
}

pub(crate) fn list(row: &Row<'_>, idx: usize) -> duckdb::Result<Vec<String>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(Vec::new()),
        Some(s) => serde_json::from_str(&s).map_err(|e| conversion(idx, e)),
    }
}
