use rusqlite::Connection;

use crate::migrate::Migration;
use crate::schema::{create_table_sql, exec};

pub const NAME: &str = "008_add_analysis_tasks";

pub(crate) const ANALYSIS_TASKS_COLUMNS: &[(&str, &str)] = &[
    ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
    ("user_id", "INTEGER NOT NULL"),
    ("filename", "TEXT NOT NULL"),
    ("status", "TEXT NOT NULL DEFAULT 'processing'"),
    ("created_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP"),
    ("completed_at", "TIMESTAMP NULL"),
    ("cancelled_at", "TIMESTAMP NULL"),
    ("result_id", "INTEGER NULL"),
];

pub(crate) const ANALYSIS_TASKS_CONSTRAINTS: &[&str] = &[
    "FOREIGN KEY (user_id) REFERENCES users (id)",
    "FOREIGN KEY (result_id) REFERENCES result (id)",
];

pub(crate) const ANALYSIS_TASKS_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_analysis_tasks_user_id ON analysis_tasks(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_analysis_tasks_status ON analysis_tasks(status)",
    "CREATE INDEX IF NOT EXISTS idx_analysis_tasks_created_at ON analysis_tasks(created_at)",
];

pub fn migration() -> Migration {
    Migration::new(NAME, up).with_down_sql("DROP TABLE IF EXISTS analysis_tasks")
}

fn up(conn: &Connection) -> rusqlite::Result<()> {
    exec(
        conn,
        &create_table_sql(
            "analysis_tasks",
            ANALYSIS_TASKS_COLUMNS,
            ANALYSIS_TASKS_CONSTRAINTS,
        ),
    )?;
    for index in ANALYSIS_TASKS_INDEXES {
        exec(conn, index)?;
    }
    Ok(())
}
