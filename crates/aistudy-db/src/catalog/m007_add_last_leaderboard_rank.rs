use rusqlite::Connection;

use crate::migrate::Migration;
use crate::schema::{TableRebuild, add_column_if_missing, column_exists, rebuild_table};

pub const NAME: &str = "007_add_last_leaderboard_rank";

/// Shape of `users` after the baseline schema and steps 001 to 006.
pub(crate) const USERS_BEFORE_RANK: &[(&str, &str)] = &[
    ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
    ("email", "TEXT UNIQUE NOT NULL"),
    ("username", "TEXT NOT NULL"),
    ("password_hash", "TEXT NOT NULL"),
    ("created_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP"),
    ("is_active", "BOOLEAN DEFAULT TRUE"),
    ("subscription_type", "TEXT DEFAULT 'free'"),
    ("last_login", "TIMESTAMP"),
    ("profile_image", "TEXT"),
    ("subscription_start_date", "TIMESTAMP"),
    ("subscription_end_date", "TIMESTAMP"),
    ("monthly_analyses_used", "INTEGER DEFAULT 0"),
    ("monthly_reset_date", "TIMESTAMP"),
    ("total_pdf_pages_used", "INTEGER DEFAULT 0"),
    ("total_video_minutes_used", "INTEGER DEFAULT 0"),
    ("ai_chat_messages_used", "INTEGER DEFAULT 0"),
    ("subscription_status", "TEXT DEFAULT 'active'"),
    ("monthly_video_uploads_used", "INTEGER DEFAULT 0"),
    ("monthly_pdf_pages_used", "INTEGER DEFAULT 0"),
];

/// Shape of a pre-auth `users` table (one carrying `plan`) after steps 001
/// to 006, where 001 added the auth columns with empty-string defaults.
pub(crate) const LEGACY_USERS_BEFORE_RANK: &[(&str, &str)] = &[
    ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
    ("email", "TEXT UNIQUE NOT NULL"),
    ("plan", "TEXT"),
    ("subscription_start", "TIMESTAMP"),
    ("subscription_end", "TIMESTAMP"),
    ("created_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP"),
    ("username", "TEXT NOT NULL DEFAULT ''"),
    ("password_hash", "TEXT NOT NULL DEFAULT ''"),
    ("is_active", "BOOLEAN DEFAULT TRUE"),
    ("subscription_type", "TEXT DEFAULT 'free'"),
    ("last_login", "TIMESTAMP"),
    ("profile_image", "TEXT"),
    ("subscription_start_date", "TIMESTAMP"),
    ("subscription_end_date", "TIMESTAMP"),
    ("monthly_analyses_used", "INTEGER DEFAULT 0"),
    ("monthly_reset_date", "TIMESTAMP"),
    ("total_pdf_pages_used", "INTEGER DEFAULT 0"),
    ("total_video_minutes_used", "INTEGER DEFAULT 0"),
    ("ai_chat_messages_used", "INTEGER DEFAULT 0"),
    ("subscription_status", "TEXT DEFAULT 'active'"),
    ("monthly_video_uploads_used", "INTEGER DEFAULT 0"),
    ("monthly_pdf_pages_used", "INTEGER DEFAULT 0"),
];

pub fn migration() -> Migration {
    Migration::new(NAME, up).with_down(down)
}

fn up(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "users", "last_leaderboard_rank", "INTEGER DEFAULT NULL")?;
    add_column_if_missing(conn, "users", "last_rank_update", "TIMESTAMP DEFAULT NULL")?;
    Ok(())
}

/// Picks between the two known pre-007 shapes; the `plan` column marks a
/// store that predates the baseline schema.
fn down(conn: &Connection) -> rusqlite::Result<()> {
    let columns = if column_exists(conn, "users", "plan")? {
        LEGACY_USERS_BEFORE_RANK
    } else {
        USERS_BEFORE_RANK
    };
    rebuild_table(
        conn,
        &TableRebuild {
            table: "users",
            columns,
            constraints: &[],
            indexes: &[],
        },
    )
}
