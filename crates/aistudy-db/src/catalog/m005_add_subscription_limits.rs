use rusqlite::Connection;
use tracing::info;

use crate::migrate::Migration;
use crate::schema::{add_column_if_missing, exec, log_failed_statement};

pub const NAME: &str = "005_add_subscription_limits";

const SUBSCRIPTION_COLUMNS: &[(&str, &str)] = &[
    ("subscription_type", "TEXT DEFAULT 'starter'"),
    ("subscription_start_date", "TIMESTAMP"),
    ("subscription_end_date", "TIMESTAMP"),
    ("monthly_analyses_used", "INTEGER DEFAULT 0"),
    ("monthly_reset_date", "TIMESTAMP"),
    ("total_pdf_pages_used", "INTEGER DEFAULT 0"),
    ("total_video_minutes_used", "INTEGER DEFAULT 0"),
    ("ai_chat_messages_used", "INTEGER DEFAULT 0"),
    ("subscription_status", "TEXT DEFAULT 'active'"),
];

const TABLES: &str = "
CREATE TABLE IF NOT EXISTS subscription_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    usage_type TEXT NOT NULL,
    amount INTEGER DEFAULT 1,
    resource_info TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS subscription_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    old_plan TEXT,
    new_plan TEXT,
    change_reason TEXT,
    changed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);
";

const INIT_STARTER: &str = "
UPDATE users
SET subscription_type = 'starter',
    monthly_reset_date = datetime('now', '+1 month'),
    subscription_start_date = datetime('now'),
    subscription_status = 'active'
WHERE subscription_type IS NULL OR subscription_type = 'free'
";

// SQLite keeps the added user columns; only the tables go.
const DOWN: &str = "
DROP TABLE IF EXISTS subscription_usage;
DROP TABLE IF EXISTS subscription_history;
";

pub fn migration() -> Migration {
    Migration::new(NAME, up).with_down_sql(DOWN)
}

fn up(conn: &Connection) -> rusqlite::Result<()> {
    for (column, definition) in SUBSCRIPTION_COLUMNS {
        add_column_if_missing(conn, "users", column, definition)?;
    }
    exec(conn, TABLES)?;

    let moved = conn
        .execute(INIT_STARTER, [])
        .inspect_err(|e| log_failed_statement(INIT_STARTER, e))?;
    info!(rows = moved, "moved free users onto the starter plan");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::table_exists;

    #[test]
    fn free_users_become_starter_and_keep_paid_plans() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT, subscription_type TEXT DEFAULT 'free');
             INSERT INTO users (email, subscription_type) VALUES ('a@x', 'free'), ('b@x', 'pro'), ('c@x', NULL);",
        )
        .unwrap();

        up(&conn).unwrap();
        up(&conn).unwrap();

        let plans: Vec<(String, Option<String>)> = conn
            .prepare("SELECT subscription_type, subscription_status FROM users ORDER BY id")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(plans[0].0, "starter");
        assert_eq!(plans[1].0, "pro");
        assert_eq!(plans[2].0, "starter");
        assert!(plans.iter().all(|(_, s)| s.as_deref() == Some("active")));
        assert!(table_exists(&conn, "subscription_usage").unwrap());
        assert!(table_exists(&conn, "subscription_history").unwrap());
    }
}
