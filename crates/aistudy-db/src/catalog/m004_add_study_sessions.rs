use crate::migrate::Migration;

pub const NAME: &str = "004_add_study_sessions";

const UP: &str = "
CREATE TABLE IF NOT EXISTS study_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    result_id INTEGER,
    session_type TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    phase TEXT NOT NULL,
    difficulty TEXT NOT NULL,
    duration_minutes INTEGER DEFAULT 45,
    status TEXT DEFAULT 'available',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    started_at TIMESTAMP,
    completed_at TIMESTAMP,
    progress INTEGER DEFAULT 0,
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (result_id) REFERENCES result(id)
);

CREATE TABLE IF NOT EXISTS session_activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    activity_type TEXT NOT NULL,
    duration_seconds INTEGER,
    cards_reviewed INTEGER DEFAULT 0,
    cards_mastered INTEGER DEFAULT 0,
    notes TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (session_id) REFERENCES study_sessions(id),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_study_sessions_user ON study_sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_study_sessions_status ON study_sessions(user_id, status);
CREATE INDEX IF NOT EXISTS idx_session_activities_session ON session_activities(session_id);
";

const DOWN: &str = "
DROP INDEX IF EXISTS idx_study_sessions_user;
DROP INDEX IF EXISTS idx_study_sessions_status;
DROP INDEX IF EXISTS idx_session_activities_session;
DROP TABLE IF EXISTS session_activities;
DROP TABLE IF EXISTS study_sessions;
";

pub fn migration() -> Migration {
    Migration::sql(NAME, UP).with_down_sql(DOWN)
}
