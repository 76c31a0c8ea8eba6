use rusqlite::Connection;
use tracing::info;

use crate::migrate::Migration;
use crate::schema::{add_column_if_missing, column_exists, exec, log_failed_statement};

pub const NAME: &str = "001_add_user_columns";

/// Columns the authentication layer expects on `users`.
const USER_COLUMNS: &[(&str, &str)] = &[
    ("username", "TEXT NOT NULL DEFAULT ''"),
    ("password_hash", "TEXT NOT NULL DEFAULT ''"),
    ("is_active", "BOOLEAN DEFAULT TRUE"),
    ("subscription_type", "TEXT DEFAULT 'free'"),
    ("last_login", "TIMESTAMP"),
    ("profile_image", "TEXT"),
];

pub fn migration() -> Migration {
    Migration::new(NAME, up)
}

fn up(conn: &Connection) -> rusqlite::Result<()> {
    let mut added_subscription_type = false;
    for (column, definition) in USER_COLUMNS {
        let added = add_column_if_missing(conn, "users", column, definition)?;
        if *column == "subscription_type" {
            added_subscription_type = added;
        }
    }

    // Default username is the local part of the email address.
    let updated = conn
        .execute(
            "UPDATE users
             SET username = SUBSTR(email, 1, INSTR(email, '@') - 1)
             WHERE (username = '' OR username IS NULL) AND INSTR(email, '@') > 1",
            [],
        )
        .inspect_err(|e| log_failed_statement("UPDATE users SET username", e))?;
    if updated > 0 {
        info!(rows = updated, "backfilled default usernames");
    }

    // Legacy stores kept the plan in `plan`; carry it over the first time
    // `subscription_type` appears.
    if added_subscription_type && column_exists(conn, "users", "plan")? {
        exec(
            conn,
            "UPDATE users SET subscription_type = plan WHERE plan IS NOT NULL AND plan != ''",
        )?;
        info!("copied legacy plan into subscription_type");
    }

    Ok(())
}
