//! Introspection and additive-change helpers used by migration steps.
//!
//! Every helper here is safe to call against a store where the change has
//! already been made: "already present" is reported, never raised.

use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

/// Run one or more statements, logging the statement text if the store
/// rejects it.
pub fn exec(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    conn.execute_batch(sql)
        .inspect_err(|e| log_failed_statement(sql, e))
}

pub fn log_failed_statement(sql: &str, err: &rusqlite::Error) {
    warn!(statement = %compact(sql), error = %err, "statement failed");
}

fn compact(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )
}

pub fn index_exists(conn: &Connection, index: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
        params![index],
        |row| row.get(0),
    )
}

/// Column names of `table` in declaration order. Empty when the table does
/// not exist.
pub fn column_names(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = stmt
        .query_map(params![table], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    Ok(column_names(conn, table)?.iter().any(|c| c == column))
}

/// `ALTER TABLE .. ADD COLUMN` unless the column is already there.
///
/// Returns `true` when the column was added by this call.
pub fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> rusqlite::Result<bool> {
    if column_exists(conn, table, column)? {
        debug!("column {table}.{column} already present");
        return Ok(false);
    }

    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {definition}");
    match conn.execute_batch(&sql) {
        Ok(()) => {
            info!("added column {table}.{column}");
            Ok(true)
        }
        Err(rusqlite::Error::SqliteFailure(_, Some(ref msg)))
            if msg.contains("duplicate column name") =>
        {
            debug!("column {table}.{column} already present");
            Ok(false)
        }
        Err(e) => {
            log_failed_statement(&sql, &e);
            Err(e)
        }
    }
}

/// `CREATE TABLE` statement built from an explicit column list.
pub fn create_table_sql(table: &str, columns: &[(&str, &str)], constraints: &[&str]) -> String {
    let body = columns
        .iter()
        .map(|(name, definition)| format!("{name} {definition}"))
        .chain(constraints.iter().map(|c| c.to_string()))
        .collect::<Vec<_>>()
        .join(",\n    ");
    format!("CREATE TABLE IF NOT EXISTS {table} (\n    {body}\n)")
}

/// Target shape for [`rebuild_table`].
///
/// The shape is always supplied by the caller. It is never derived from the
/// live table, whose columns may have drifted from the historical state the
/// rebuild is meant to restore.
#[derive(Debug, Clone, Copy)]
pub struct TableRebuild<'a> {
    pub table: &'a str,
    /// `(name, definition)` pairs in the desired order.
    pub columns: &'a [(&'a str, &'a str)],
    /// Table constraints such as `FOREIGN KEY (..) REFERENCES ..`.
    pub constraints: &'a [&'a str],
    /// Index statements to run once the rebuilt table is in place.
    pub indexes: &'a [&'a str],
}

/// Reshape a table without `DROP COLUMN`: copy the named columns into a new
/// table with the target shape, drop the original and rename the copy.
///
/// Must run inside the caller's transaction. Target columns missing from
/// the live table are left to their declared defaults; live columns outside
/// the target list are discarded.
pub fn rebuild_table(conn: &Connection, rebuild: &TableRebuild<'_>) -> rusqlite::Result<()> {
    let table = rebuild.table;
    let staging = format!("{table}__rebuild");

    let live = column_names(conn, table)?;
    let copied: Vec<&str> = rebuild
        .columns
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| live.iter().any(|c| c == name))
        .collect();

    exec(conn, &format!("DROP TABLE IF EXISTS {staging}"))?;
    exec(
        conn,
        &create_table_sql(&staging, rebuild.columns, rebuild.constraints),
    )?;

    if !copied.is_empty() {
        let list = copied.join(", ");
        exec(
            conn,
            &format!("INSERT INTO {staging} ({list}) SELECT {list} FROM {table}"),
        )?;
    }

    exec(conn, &format!("DROP TABLE {table}"))?;
    exec(conn, &format!("ALTER TABLE {staging} RENAME TO {table}"))?;

    for index in rebuild.indexes {
        exec(conn, index)?;
    }

    info!(
        table,
        columns = rebuild.columns.len(),
        copied = copied.len(),
        "table rebuilt"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_users() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, email TEXT NOT NULL);
             INSERT INTO users (email) VALUES ('a@example.com'), ('b@example.com');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn introspection_reports_tables_and_columns() {
        let conn = conn_with_users();
        assert!(table_exists(&conn, "users").unwrap());
        assert!(!table_exists(&conn, "result").unwrap());
        assert_eq!(column_names(&conn, "users").unwrap(), vec!["id", "email"]);
        assert!(column_names(&conn, "missing").unwrap().is_empty());
        assert!(column_exists(&conn, "users", "email").unwrap());
        assert!(!column_exists(&conn, "users", "username").unwrap());
    }

    #[test]
    fn add_column_if_missing_is_idempotent() {
        let conn = conn_with_users();
        assert!(add_column_if_missing(&conn, "users", "username", "TEXT NOT NULL DEFAULT ''").unwrap());
        assert!(!add_column_if_missing(&conn, "users", "username", "TEXT NOT NULL DEFAULT ''").unwrap());
        assert_eq!(
            column_names(&conn, "users").unwrap(),
            vec!["id", "email", "username"]
        );
    }

    #[test]
    fn add_column_to_missing_table_fails() {
        let conn = conn_with_users();
        assert!(add_column_if_missing(&conn, "nope", "x", "TEXT").is_err());
    }

    #[test]
    fn create_table_sql_joins_columns_and_constraints() {
        let sql = create_table_sql(
            "t",
            &[("id", "INTEGER PRIMARY KEY"), ("owner", "INTEGER")],
            &["FOREIGN KEY (owner) REFERENCES users(id)"],
        );
        let conn = conn_with_users();
        conn.execute_batch(&sql).unwrap();
        assert_eq!(column_names(&conn, "t").unwrap(), vec!["id", "owner"]);
    }

    #[test]
    fn rebuild_drops_columns_and_keeps_rows() {
        let conn = conn_with_users();
        add_column_if_missing(&conn, "users", "rank", "INTEGER DEFAULT NULL").unwrap();
        conn.execute("UPDATE users SET rank = 3", []).unwrap();

        rebuild_table(
            &conn,
            &TableRebuild {
                table: "users",
                columns: &[
                    ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
                    ("email", "TEXT NOT NULL"),
                ],
                constraints: &[],
                indexes: &["CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)"],
            },
        )
        .unwrap();

        assert_eq!(column_names(&conn, "users").unwrap(), vec!["id", "email"]);
        assert!(index_exists(&conn, "idx_users_email").unwrap());
        assert!(!table_exists(&conn, "users__rebuild").unwrap());

        let emails: Vec<String> = conn
            .prepare("SELECT email FROM users ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn rebuild_fills_absent_target_columns_with_defaults() {
        let conn = conn_with_users();
        rebuild_table(
            &conn,
            &TableRebuild {
                table: "users",
                columns: &[
                    ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
                    ("email", "TEXT NOT NULL"),
                    ("is_active", "BOOLEAN DEFAULT TRUE"),
                ],
                constraints: &[],
                indexes: &[],
            },
        )
        .unwrap();

        let active: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE is_active = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(active, 2);
    }
}
