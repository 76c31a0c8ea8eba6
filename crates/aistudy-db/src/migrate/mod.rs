//! Migration system for tracking and applying database schema changes.
//!
//! Each migration has a stable name, an `up` procedure and an optional
//! `down` procedure. Migrations are applied in registration order, each in
//! its own transaction, and tracked in the `migrations` table.

mod error;
pub mod record;

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, error, info, warn};

pub use error::MigrationError;
pub use record::MigrationRecord;

pub type Result<T> = std::result::Result<T, MigrationError>;

/// Body of an `up` or `down` step. Receives the step's transaction.
pub type Procedure = Box<dyn Fn(&Connection) -> rusqlite::Result<()> + Send + Sync>;

/// A named schema and/or data change.
pub struct Migration {
    name: String,
    up: Procedure,
    down: Option<Procedure>,
}

impl Migration {
    pub fn new<F>(name: impl Into<String>, up: F) -> Self
    where
        F: Fn(&Connection) -> rusqlite::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            up: Box::new(up),
            down: None,
        }
    }

    /// A step whose `up` is a fixed batch of SQL.
    pub fn sql(name: impl Into<String>, up_sql: &'static str) -> Self {
        Self::new(name, move |conn| crate::schema::exec(conn, up_sql))
    }

    pub fn with_down<F>(mut self, down: F) -> Self
    where
        F: Fn(&Connection) -> rusqlite::Result<()> + Send + Sync + 'static,
    {
        self.down = Some(Box::new(down));
        self
    }

    pub fn with_down_sql(self, down_sql: &'static str) -> Self {
        self.with_down(move |conn| crate::schema::exec(conn, down_sql))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_down(&self) -> bool {
        self.down.is_some()
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name)
            .field("has_down", &self.has_down())
            .finish()
    }
}

/// One line of [`MigrationRunner::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStatus {
    pub name: String,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Result of [`MigrationRunner::apply_pending`].
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Names applied by this run, in order.
    pub applied: Vec<String>,
    /// Steps that were already recorded.
    pub skipped: usize,
    pub duration: Duration,
}

/// Ordered registry of migration steps.
#[derive(Debug, Default)]
pub struct MigrationRunner {
    steps: Vec<Migration>,
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `step` to the registry.
    pub fn register(&mut self, step: Migration) -> Result<&mut Self> {
        if self.steps.iter().any(|s| s.name == step.name) {
            return Err(MigrationError::DuplicateStep(step.name));
        }
        self.steps.push(step);
        Ok(self)
    }

    pub fn steps(&self) -> impl Iterator<Item = &Migration> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn find(&self, name: &str) -> Option<&Migration> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Apply every unrecorded step in registration order.
    ///
    /// Each step runs in its own transaction together with the insert of its
    /// record. The first failing step is rolled back and the run stops;
    /// steps committed before it stay committed.
    ///
    /// Foreign key enforcement is off for the duration of the run so that
    /// table rebuilds can drop referenced tables.
    pub fn apply_pending(&self, conn: &mut Connection) -> Result<ApplyReport> {
        with_foreign_keys_off(conn, |conn| self.apply_all(conn))
    }

    fn apply_all(&self, conn: &mut Connection) -> Result<ApplyReport> {
        let started = Instant::now();
        record::ensure_table(conn)?;

        let mut report = ApplyReport::default();
        for step in &self.steps {
            if record::is_applied(conn, &step.name)? {
                debug!(step = %step.name, outcome = "skipped", "migration already applied");
                report.skipped += 1;
                continue;
            }
            self.apply_one(conn, step)?;
            report.applied.push(step.name.clone());
        }

        report.duration = started.elapsed();
        if report.applied.is_empty() {
            info!("no pending migrations");
        } else {
            info!(
                applied = report.applied.len(),
                skipped = report.skipped,
                duration_ms = report.duration.as_millis() as u64,
                "migrations applied"
            );
        }
        Ok(report)
    }

    fn apply_one(&self, conn: &mut Connection, step: &Migration) -> Result<()> {
        let started = Instant::now();
        info!(step = %step.name, "applying migration");

        let tx = conn
            .transaction()
            .map_err(|source| MigrationError::MigrationFailed {
                step: step.name.clone(),
                source,
            })?;
        let outcome = (step.up)(&tx).and_then(|()| record::insert(&tx, &step.name, Utc::now()));

        match outcome {
            Ok(_) => {
                tx.commit().map_err(|source| MigrationError::MigrationFailed {
                    step: step.name.clone(),
                    source,
                })?;
                info!(
                    step = %step.name,
                    outcome = "applied",
                    duration_ms = started.elapsed().as_millis() as u64,
                    "migration applied"
                );
                Ok(())
            }
            Err(source) => {
                if let Err(e) = tx.rollback() {
                    error!(step = %step.name, error = %e, "rollback after failed migration failed");
                }
                error!(
                    step = %step.name,
                    outcome = "failed",
                    duration_ms = started.elapsed().as_millis() as u64,
                    error = %source,
                    "migration failed"
                );
                Err(MigrationError::MigrationFailed {
                    step: step.name.clone(),
                    source,
                })
            }
        }
    }

    /// Undo the most recently applied step and delete its record.
    pub fn rollback_last(&self, conn: &mut Connection) -> Result<MigrationRecord> {
        with_foreign_keys_off(conn, |conn| self.rollback_latest(conn))
    }

    fn rollback_latest(&self, conn: &mut Connection) -> Result<MigrationRecord> {
        let started = Instant::now();
        let last = record::latest(conn)?.ok_or(MigrationError::NoAppliedMigrations)?;
        let step = self
            .find(&last.name)
            .ok_or_else(|| MigrationError::UnknownStep(last.name.clone()))?;
        let down = step
            .down
            .as_ref()
            .ok_or_else(|| MigrationError::NoDownProcedure(last.name.clone()))?;

        info!(step = %last.name, "rolling back migration");
        let tx = conn
            .transaction()
            .map_err(|source| MigrationError::RollbackFailed {
                step: last.name.clone(),
                source,
            })?;
        let outcome = down(&tx).and_then(|()| record::delete(&tx, last.id));
        match outcome {
            Ok(()) => {
                tx.commit().map_err(|source| MigrationError::RollbackFailed {
                    step: last.name.clone(),
                    source,
                })?;
                info!(
                    step = %last.name,
                    outcome = "rolled_back",
                    duration_ms = started.elapsed().as_millis() as u64,
                    "migration rolled back"
                );
                Ok(last)
            }
            Err(source) => {
                if let Err(e) = tx.rollback() {
                    error!(step = %last.name, error = %e, "rollback of failed down step failed");
                }
                error!(
                    step = %last.name,
                    outcome = "failed",
                    duration_ms = started.elapsed().as_millis() as u64,
                    error = %source,
                    "migration rollback failed"
                );
                Err(MigrationError::RollbackFailed {
                    step: last.name,
                    source,
                })
            }
        }
    }

    /// Applied/pending state of every registered step, in registration
    /// order. Records are read once; the lines are produced lazily.
    pub fn status<'a>(
        &'a self,
        conn: &Connection,
    ) -> Result<impl Iterator<Item = StepStatus> + use<'a>> {
        let applied: HashMap<String, MigrationRecord> = record::load_all(conn)?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        Ok(self.steps.iter().map(move |step| {
            let record = applied.get(&step.name);
            StepStatus {
                name: step.name.clone(),
                applied: record.is_some(),
                applied_at: record.map(|r| r.applied_at),
            }
        }))
    }

    /// Names registered but not yet recorded.
    pub fn pending(&self, conn: &Connection) -> Result<Vec<String>> {
        Ok(self
            .status(conn)?
            .filter(|s| !s.applied)
            .map(|s| s.name)
            .collect())
    }
}

/// Run `f` with `PRAGMA foreign_keys` off and restore the previous setting.
/// The pragma is a no-op inside a transaction, so this wraps the per-step
/// transactions.
fn with_foreign_keys_off<T>(
    conn: &mut Connection,
    f: impl FnOnce(&mut Connection) -> Result<T>,
) -> Result<T> {
    let enabled: bool = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    if !enabled {
        return f(conn);
    }

    conn.execute_batch("PRAGMA foreign_keys = OFF")?;
    let result = f(conn);
    if let Err(e) = conn.execute_batch("PRAGMA foreign_keys = ON") {
        warn!(error = %e, "failed to re-enable foreign keys");
    }
    result
}
