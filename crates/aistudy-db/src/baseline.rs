//! Base tables the web application expects before any migration runs.

use rusqlite::Connection;
use tracing::info;

use crate::schema::exec;

const BASELINE_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT UNIQUE NOT NULL,
    username TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    is_active BOOLEAN DEFAULT TRUE,
    subscription_type TEXT DEFAULT 'free',
    last_login TIMESTAMP,
    profile_image TEXT
);

CREATE TABLE IF NOT EXISTS result (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    file_type TEXT NOT NULL,
    topics_json TEXT NOT NULL,
    summary TEXT NOT NULL,
    flashcards_json TEXT NOT NULL,
    mind_map_json TEXT,
    study_plan_json TEXT,
    quality_json TEXT,
    video_segments_json TEXT,
    key_moments_json TEXT,
    full_text TEXT,
    user_id INTEGER,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS user_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    result_id INTEGER,
    flashcard_id INTEGER,
    user_id INTEGER,
    last_review TIMESTAMP,
    next_review TIMESTAMP,
    ease_factor REAL DEFAULT 2.5,
    consecutive_correct INTEGER DEFAULT 0,
    FOREIGN KEY (result_id) REFERENCES result(id),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS chat_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    result_id INTEGER,
    user_id INTEGER,
    user_message TEXT NOT NULL,
    ai_response TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (result_id) REFERENCES result(id),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS user_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    session_token TEXT UNIQUE NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    expires_at TIMESTAMP NOT NULL,
    is_active BOOLEAN DEFAULT TRUE,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS user_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    total_files_processed INTEGER DEFAULT 0,
    total_flashcards_created INTEGER DEFAULT 0,
    total_study_time_minutes INTEGER DEFAULT 0,
    streak_days INTEGER DEFAULT 0,
    last_activity TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);
";

pub const BASELINE_TABLES: &[&str] = &[
    "users",
    "result",
    "user_progress",
    "chat_history",
    "user_sessions",
    "user_stats",
];

/// Create the base application tables if they are missing. Existing tables
/// are left untouched.
pub fn init_baseline(conn: &Connection) -> rusqlite::Result<()> {
    exec(conn, BASELINE_SQL)?;
    info!(tables = BASELINE_TABLES.len(), "baseline schema created/verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::table_exists;

    #[test]
    fn creates_every_baseline_table() {
        let conn = Connection::open_in_memory().unwrap();
        init_baseline(&conn).unwrap();
        for table in BASELINE_TABLES {
            assert!(table_exists(&conn, table).unwrap(), "{table} missing");
        }
    }

    #[test]
    fn keeps_existing_rows_on_rerun() {
        let conn = Connection::open_in_memory().unwrap();
        init_baseline(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (email, username, password_hash) VALUES ('a@b.c', 'a', 'x')",
            [],
        )
        .unwrap();
        init_baseline(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
