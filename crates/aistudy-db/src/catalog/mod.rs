//! The AI study application's schema history, oldest first.

mod m001_add_user_columns;
mod m002_add_access_tokens;
mod m003_add_analytics_tables;
mod m004_add_study_sessions;
mod m005_add_subscription_limits;
mod m006_add_gamification_tables;
mod m006_add_video_uploads_limit;
mod m007_add_last_leaderboard_rank;
mod m008_add_analysis_tasks;
mod m009_add_analysis_progress;

pub use m002_add_access_tokens::generate_access_token;
pub use m006_add_gamification_tables::level_for_xp;

use crate::migrate::{Migration, MigrationRunner, Result};

/// Every application migration in the order it must be applied.
pub fn migrations() -> Vec<Migration> {
    vec![
        m001_add_user_columns::migration(),
        m002_add_access_tokens::migration(),
        m003_add_analytics_tables::migration(),
        m004_add_study_sessions::migration(),
        m005_add_subscription_limits::migration(),
        m006_add_gamification_tables::migration(),
        m006_add_video_uploads_limit::migration(),
        m007_add_last_leaderboard_rank::migration(),
        m008_add_analysis_tasks::migration(),
        m009_add_analysis_progress::migration(),
    ]
}

/// A runner with the full application catalog registered.
pub fn registry() -> Result<MigrationRunner> {
    let mut runner = MigrationRunner::new();
    for migration in migrations() {
        runner.register(migration)?;
    }
    Ok(runner)
}
