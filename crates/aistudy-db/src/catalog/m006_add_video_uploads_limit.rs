use rusqlite::Connection;

use crate::migrate::Migration;
use crate::schema::{add_column_if_missing, exec};

pub const NAME: &str = "006_add_video_uploads_limit";

const USAGE_COLUMNS: &[&str] = &[
    "monthly_pdf_pages_used",
    "monthly_video_uploads_used",
    "ai_chat_messages_used",
];

pub fn migration() -> Migration {
    Migration::new(NAME, up)
}

fn up(conn: &Connection) -> rusqlite::Result<()> {
    for column in USAGE_COLUMNS {
        add_column_if_missing(conn, "users", column, "INTEGER DEFAULT 0")?;
        exec(
            conn,
            &format!("UPDATE users SET {column} = 0 WHERE {column} IS NULL"),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_counters_become_zero() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, ai_chat_messages_used INTEGER);
             INSERT INTO users (ai_chat_messages_used) VALUES (NULL), (7);",
        )
        .unwrap();

        up(&conn).unwrap();

        let values: Vec<(i64, i64, i64)> = conn
            .prepare(
                "SELECT monthly_pdf_pages_used, monthly_video_uploads_used, ai_chat_messages_used
                 FROM users ORDER BY id",
            )
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(values, vec![(0, 0, 0), (0, 0, 7)]);
    }
}
