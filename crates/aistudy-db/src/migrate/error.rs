use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    /// Two steps registered under the same name.
    #[error("migration step already registered: {0}")]
    DuplicateStep(String),

    /// A step's `up` procedure failed; its transaction was rolled back.
    #[error("migration {step} failed: {source}")]
    MigrationFailed {
        step: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("migration {0} has no down procedure")]
    NoDownProcedure(String),

    #[error("no applied migrations to roll back")]
    NoAppliedMigrations,

    /// A step's `down` procedure failed; its transaction was rolled back.
    #[error("rollback of {step} failed: {source}")]
    RollbackFailed {
        step: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The store records a step this registry does not know about.
    #[error("applied migration {0} is not registered")]
    UnknownStep(String),

    /// Reading or writing the bookkeeping table failed outside of a step.
    #[error("migration bookkeeping failed: {0}")]
    Bookkeeping(#[from] rusqlite::Error),
}

impl MigrationError {
    /// Name of the step the error concerns, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::DuplicateStep(step)
            | Self::NoDownProcedure(step)
            | Self::UnknownStep(step)
            | Self::MigrationFailed { step, .. }
            | Self::RollbackFailed { step, .. } => Some(step),
            Self::NoAppliedMigrations | Self::Bookkeeping(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::MigrationError;

    #[test]
    fn error_display_names_the_step() {
        let e = MigrationError::DuplicateStep("001_add_user_columns".into());
        assert_eq!(
            e.to_string(),
            "migration step already registered: 001_add_user_columns"
        );
        assert_eq!(e.step(), Some("001_add_user_columns"));

        let e = MigrationError::NoAppliedMigrations;
        assert_eq!(e.to_string(), "no applied migrations to roll back");
        assert_eq!(e.step(), None);
    }

    #[test]
    fn migration_failed_wraps_the_store_error() {
        let e = MigrationError::MigrationFailed {
            step: "002_add_access_tokens".into(),
            source: rusqlite::Error::InvalidQuery,
        };
        assert!(e.to_string().starts_with("migration 002_add_access_tokens failed"));
        assert!(e.source().is_some());
    }
}
