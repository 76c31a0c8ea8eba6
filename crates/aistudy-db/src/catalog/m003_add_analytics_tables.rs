use crate::migrate::Migration;

pub const NAME: &str = "003_add_analytics_tables";

const UP: &str = "
CREATE TABLE IF NOT EXISTS element_interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    session_id TEXT,
    element_type TEXT NOT NULL,
    element_id TEXT,
    action_type TEXT NOT NULL,
    page_url TEXT,
    page_title TEXT,
    metadata TEXT,
    timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS analytics_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT UNIQUE NOT NULL,
    user_id INTEGER,
    start_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    end_time TIMESTAMP,
    page_views INTEGER DEFAULT 0,
    total_interactions INTEGER DEFAULT 0,
    user_agent TEXT,
    ip_address TEXT,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS element_popularity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    element_type TEXT NOT NULL,
    element_id TEXT,
    action_type TEXT NOT NULL,
    total_interactions INTEGER DEFAULT 0,
    unique_users INTEGER DEFAULT 0,
    last_updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(element_type, element_id, action_type)
);

CREATE INDEX IF NOT EXISTS idx_interactions_user_time ON element_interactions(user_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_interactions_element ON element_interactions(element_type, element_id);
CREATE INDEX IF NOT EXISTS idx_interactions_session ON element_interactions(session_id);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON analytics_sessions(user_id);
";

const DOWN: &str = "
DROP INDEX IF EXISTS idx_interactions_user_time;
DROP INDEX IF EXISTS idx_interactions_element;
DROP INDEX IF EXISTS idx_interactions_session;
DROP INDEX IF EXISTS idx_sessions_user;
DROP TABLE IF EXISTS element_popularity;
DROP TABLE IF EXISTS element_interactions;
DROP TABLE IF EXISTS analytics_sessions;
";

pub fn migration() -> Migration {
    Migration::sql(NAME, UP).with_down_sql(DOWN)
}
