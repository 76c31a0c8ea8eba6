use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::migrate::Migration;
use crate::schema::{add_column_if_missing, column_exists, exec};

pub const NAME: &str = "006_add_gamification_tables";

const TABLES: &str = "
CREATE TABLE IF NOT EXISTS user_gamification (
    user_id INTEGER PRIMARY KEY,
    level INTEGER DEFAULT 1,
    total_xp INTEGER DEFAULT 0,
    current_streak INTEGER DEFAULT 0,
    longest_streak INTEGER DEFAULT 0,
    last_activity_date DATE,
    achievements_json TEXT DEFAULT '[]',
    weekly_goals_json TEXT DEFAULT '{}',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS xp_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    action_type TEXT NOT NULL,
    xp_gained INTEGER NOT NULL,
    description TEXT,
    metadata_json TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS user_achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    achievement_id TEXT NOT NULL,
    unlocked_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(user_id, achievement_id),
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS weekly_challenges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    week_start DATE NOT NULL,
    challenge_type TEXT NOT NULL,
    target_value INTEGER NOT NULL,
    current_progress INTEGER DEFAULT 0,
    completed BOOLEAN DEFAULT FALSE,
    reward_xp INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

-- action is one of 'upgraded', 'dismissed', 'clicked'
CREATE TABLE IF NOT EXISTS upgrade_triggers_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    trigger_reason TEXT NOT NULL,
    offer_details TEXT,
    shown_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    action TEXT,
    action_at TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_xp_history_user ON xp_history(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_achievements_user ON user_achievements(user_id);
CREATE INDEX IF NOT EXISTS idx_challenges_user_week ON weekly_challenges(user_id, week_start);
CREATE INDEX IF NOT EXISTS idx_triggers_user_date ON upgrade_triggers_log(user_id, shown_at);
";

const DOWN: &str = "
DROP TABLE IF EXISTS upgrade_triggers_log;
DROP TABLE IF EXISTS weekly_challenges;
DROP TABLE IF EXISTS user_achievements;
DROP TABLE IF EXISTS xp_history;
DROP TABLE IF EXISTS user_gamification;
";

/// Activity that earned XP before gamification existed.
struct RetroactiveSource {
    table: &'static str,
    action_type: &'static str,
    xp_each: i64,
    noun: &'static str,
}

const RETROACTIVE_SOURCES: &[RetroactiveSource] = &[
    RetroactiveSource {
        table: "result",
        action_type: "retroactive_analyses",
        xp_each: 50,
        noun: "analyses",
    },
    RetroactiveSource {
        table: "chat_history",
        action_type: "retroactive_chat",
        xp_each: 5,
        noun: "AI messages",
    },
    RetroactiveSource {
        table: "user_progress",
        action_type: "retroactive_flashcards",
        xp_each: 10,
        noun: "flashcard reviews",
    },
];

/// `(minimum total XP, level)`, highest first.
const LEVEL_THRESHOLDS: &[(i64, i64)] = &[
    (40_000, 100),
    (25_000, 75),
    (16_000, 50),
    (10_000, 35),
    (6_000, 25),
    (3_000, 15),
    (1_500, 10),
    (500, 5),
];

pub fn level_for_xp(total_xp: i64) -> i64 {
    LEVEL_THRESHOLDS
        .iter()
        .find(|(min, _)| total_xp >= *min)
        .map(|(_, level)| *level)
        .unwrap_or(1)
}

pub fn migration() -> Migration {
    Migration::new(NAME, up).with_down_sql(DOWN)
}

fn up(conn: &Connection) -> rusqlite::Result<()> {
    exec(conn, TABLES)?;
    add_column_if_missing(
        conn,
        "users",
        "monthly_video_uploads_used",
        "INTEGER DEFAULT 0",
    )?;

    exec(
        conn,
        "INSERT OR IGNORE INTO user_gamification (user_id, level, total_xp) SELECT id, 1, 0 FROM users",
    )?;

    for source in RETROACTIVE_SOURCES {
        award_retroactive_xp(conn, source)?;
    }

    update_levels(conn)
}

/// Award XP once per user and source; users already holding a history row
/// for the source are skipped.
fn award_retroactive_xp(conn: &Connection, source: &RetroactiveSource) -> rusqlite::Result<()> {
    if !column_exists(conn, source.table, "user_id")? {
        debug!(table = source.table, "no user_id column, skipping retroactive xp");
        return Ok(());
    }

    let counts: Vec<(i64, i64)> = conn
        .prepare(&format!(
            "SELECT user_id, COUNT(*) FROM {table}
             WHERE user_id IS NOT NULL AND user_id != 0
               AND user_id NOT IN (SELECT user_id FROM xp_history WHERE action_type = ?1)
             GROUP BY user_id",
            table = source.table
        ))?
        .query_map(params![source.action_type], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;

    for (user_id, count) in &counts {
        let xp = count * source.xp_each;
        conn.execute(
            "UPDATE user_gamification SET total_xp = total_xp + ?1 WHERE user_id = ?2",
            params![xp, user_id],
        )?;
        conn.execute(
            "INSERT INTO xp_history (user_id, action_type, xp_gained, description)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id,
                source.action_type,
                xp,
                format!("Retroactive XP for {count} {}", source.noun)
            ],
        )?;
    }

    info!(
        source = source.action_type,
        users = counts.len(),
        "awarded retroactive xp"
    );
    Ok(())
}

fn update_levels(conn: &Connection) -> rusqlite::Result<()> {
    let totals: Vec<(i64, i64)> = conn
        .prepare("SELECT user_id, total_xp FROM user_gamification")?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;

    let mut update = conn.prepare("UPDATE user_gamification SET level = ?1 WHERE user_id = ?2")?;
    for (user_id, total_xp) in totals {
        update.execute(params![level_for_xp(total_xp), user_id])?;
    }
    Ok(())
}
