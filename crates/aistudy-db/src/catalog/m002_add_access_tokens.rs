use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rusqlite::{Connection, params};
use tracing::info;

use crate::migrate::Migration;
use crate::schema::{add_column_if_missing, exec, log_failed_statement};

pub const NAME: &str = "002_add_access_tokens";

const TOKEN_BYTES: usize = 32;

pub fn migration() -> Migration {
    Migration::new(NAME, up)
}

/// Random URL-safe share token for a stored analysis result.
pub fn generate_access_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn up(conn: &Connection) -> rusqlite::Result<()> {
    // SQLite refuses UNIQUE on ADD COLUMN; the index carries it instead.
    add_column_if_missing(conn, "result", "access_token", "TEXT")?;
    exec(
        conn,
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_result_access_token ON result(access_token)",
    )?;

    let ids: Vec<i64> = conn
        .prepare("SELECT id FROM result WHERE access_token IS NULL ORDER BY id")?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let sql = "UPDATE result SET access_token = ?1 WHERE id = ?2 AND access_token IS NULL";
    let mut update = conn.prepare(sql)?;
    for id in &ids {
        update
            .execute(params![generate_access_token(), id])
            .inspect_err(|e| log_failed_statement(sql, e))?;
    }

    info!(rows = ids.len(), "backfilled result access tokens");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn result_table(rows: usize) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE result (id INTEGER PRIMARY KEY AUTOINCREMENT, filename TEXT)")
            .unwrap();
        for i in 0..rows {
            conn.execute("INSERT INTO result (filename) VALUES (?1)", params![format!("f{i}.pdf")])
                .unwrap();
        }
        conn
    }

    fn tokens(conn: &Connection) -> Vec<Option<String>> {
        conn.prepare("SELECT access_token FROM result ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap()
    }

    #[test]
    fn tokens_are_url_safe_and_unpadded() {
        let token = generate_access_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(token, generate_access_token());
    }

    #[test]
    fn backfills_distinct_tokens_once() {
        let conn = result_table(3);
        up(&conn).unwrap();

        let first = tokens(&conn);
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(Option::is_some));
        let distinct: HashSet<_> = first.iter().collect();
        assert_eq!(distinct.len(), 3);

        up(&conn).unwrap();
        assert_eq!(tokens(&conn), first);
    }

    #[test]
    fn only_fills_rows_without_a_token() {
        let conn = result_table(2);
        up(&conn).unwrap();
        conn.execute("INSERT INTO result (filename) VALUES ('late.pdf')", [])
            .unwrap();
        let before = tokens(&conn);
        assert!(before[2].is_none());

        up(&conn).unwrap();
        let after = tokens(&conn);
        assert_eq!(after[..2], before[..2]);
        assert!(after[2].is_some());
    }
}
