use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::schema::table_exists;

/// Bookkeeping table. Layout matches what the application's earlier
/// migration scripts created, so existing history is honoured.
pub const MIGRATIONS_TABLE: &str = "migrations";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One applied migration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub(crate) fn ensure_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            migration_name TEXT UNIQUE NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )
}

/// All records in application order. A store without the bookkeeping table
/// has no records.
pub fn load_all(conn: &Connection) -> rusqlite::Result<Vec<MigrationRecord>> {
    if !table_exists(conn, MIGRATIONS_TABLE)? {
        return Ok(Vec::new());
    }

    let mut stmt =
        conn.prepare("SELECT id, migration_name, applied_at FROM migrations ORDER BY id ASC")?;
    let records = stmt
        .query_map([], read_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

pub(crate) fn is_applied(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE migration_name = ?1)",
        params![name],
        |row| row.get(0),
    )
}

pub(crate) fn latest(conn: &Connection) -> rusqlite::Result<Option<MigrationRecord>> {
    if !table_exists(conn, MIGRATIONS_TABLE)? {
        return Ok(None);
    }
    conn.query_row(
        "SELECT id, migration_name, applied_at FROM migrations ORDER BY id DESC LIMIT 1",
        [],
        read_record,
    )
    .optional()
}

pub(crate) fn insert(
    conn: &Connection,
    name: &str,
    applied_at: DateTime<Utc>,
) -> rusqlite::Result<MigrationRecord> {
    let applied_at = applied_at.trunc_subsecs(0);
    conn.execute(
        "INSERT INTO migrations (migration_name, applied_at) VALUES (?1, ?2)",
        params![name, applied_at.format(TIMESTAMP_FORMAT).to_string()],
    )?;
    Ok(MigrationRecord {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        applied_at,
    })
}

pub(crate) fn delete(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM migrations WHERE id = ?1", params![id])?;
    Ok(())
}

fn read_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MigrationRecord> {
    let applied_at: Option<String> = row.get(2)?;
    Ok(MigrationRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        applied_at: applied_at
            .as_deref()
            .map(parse_datetime)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // CURRENT_TIMESTAMP produces "YYYY-MM-DD HH:MM:SS"
            NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                .map(|naive| naive.and_utc())
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        })
}
