use rusqlite::Connection;

use super::m008_add_analysis_tasks::{
    ANALYSIS_TASKS_COLUMNS, ANALYSIS_TASKS_CONSTRAINTS, ANALYSIS_TASKS_INDEXES,
};
use crate::migrate::Migration;
use crate::schema::{TableRebuild, add_column_if_missing, rebuild_table};

pub const NAME: &str = "009_add_analysis_progress";

// The web UI shows `current_stage` verbatim; 'Подготовка' reads "Preparing".
const PROGRESS_COLUMNS: &[(&str, &str)] = &[
    ("progress", "INTEGER DEFAULT 0"),
    ("current_stage", "TEXT DEFAULT 'Подготовка'"),
    ("stage_details", "TEXT DEFAULT ''"),
];

pub fn migration() -> Migration {
    Migration::new(NAME, up).with_down(down)
}

fn up(conn: &Connection) -> rusqlite::Result<()> {
    for (column, definition) in PROGRESS_COLUMNS {
        add_column_if_missing(conn, "analysis_tasks", column, definition)?;
    }
    Ok(())
}

fn down(conn: &Connection) -> rusqlite::Result<()> {
    rebuild_table(
        conn,
        &TableRebuild {
            table: "analysis_tasks",
            columns: ANALYSIS_TASKS_COLUMNS,
            constraints: ANALYSIS_TASKS_CONSTRAINTS,
            indexes: ANALYSIS_TASKS_INDEXES,
        },
    )
}
