//! aistudy CLI
//!
//! Applies, inspects and rolls back schema migrations on the application's
//! SQLite store, and runs the periodic housekeeping jobs.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use aistudy_config::{ConfigLoader, LogFormat, MaintenanceConfig, max_age_from_hours};
use aistudy_db::{catalog, init_baseline};
use aistudy_maint::{check_tag_balance, cleanup_uploads};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;
use tracing::info;
use tracing_subscriber::EnvFilter;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "aistudy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Schema migrations and housekeeping for the AI study database")]
struct Cli {
    /// SQLite database file (overrides `database.path` from the config)
    #[arg(long, global = true, env = "AISTUDY_DB")]
    db: Option<PathBuf>,

    /// Config file (YAML or TOML); defaults to ./aistudy.yml when present
    #[arg(long, global = true, env = "AISTUDY_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format (overrides `logging.format`)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Migrate,

    /// Show every migration with its applied flag and timestamp
    Status {
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Roll back the most recently applied migration
    Rollback,

    /// Create the baseline application tables
    Init,

    /// Remove stale uploaded files
    CleanupUploads {
        /// Upload directory (overrides `uploads.dir`)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Maximum file age in hours (overrides `uploads.max_age_hours`)
        #[arg(long)]
        max_age_hours: Option<u64>,
        /// Report what would be removed without deleting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Report unbalanced HTML tags in a template
    CheckHtml {
        /// HTML file to check
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let loader = ConfigLoader::new(cli.config.clone());
    let config = loader
        .load()
        .with_context(|| format!("failed to load config from {}", loader.path().display()))?;

    let format = cli
        .log_format
        .map(LogFormat::from)
        .unwrap_or(config.logging.format);
    init_tracing(&config.logging.level, format);

    let db_path = cli.db.clone().unwrap_or_else(|| config.database.path.clone());

    match cli.command.unwrap_or(Command::Migrate) {
        Command::Migrate => run_migrate(&db_path),
        Command::Status { json } => run_status(&db_path, json),
        Command::Rollback => run_rollback(&db_path),
        Command::Init => run_init(&db_path),
        Command::CleanupUploads {
            dir,
            max_age_hours,
            dry_run,
        } => run_cleanup(&config, dir, max_age_hours, dry_run),
        Command::CheckHtml { file } => run_check_html(&file),
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn open_store(path: &Path) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn run_migrate(db_path: &Path) -> anyhow::Result<ExitCode> {
    let mut conn = open_store(db_path)?;
    let runner = catalog::registry()?;
    let report = runner.apply_pending(&mut conn)?;

    if report.applied.is_empty() {
        println!("No pending migrations.");
    } else {
        for name in &report.applied {
            println!("applied  {name}");
        }
        println!(
            "{} applied, {} already present ({} ms)",
            report.applied.len(),
            report.skipped,
            report.duration.as_millis()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_status(db_path: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let conn = open_store(db_path)?;
    let runner = catalog::registry()?;
    let status: Vec<_> = runner.status(&conn)?.collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(ExitCode::SUCCESS);
    }

    let width = status.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for step in &status {
        let mark = if step.applied { "x" } else { " " };
        let at = step
            .applied_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "pending".to_string());
        println!("[{mark}] {:<width$}  {at}", step.name);
    }
    let pending = status.iter().filter(|s| !s.applied).count();
    println!("\n{} migrations, {pending} pending", status.len());
    Ok(ExitCode::SUCCESS)
}

fn run_rollback(db_path: &Path) -> anyhow::Result<ExitCode> {
    let mut conn = open_store(db_path)?;
    let runner = catalog::registry()?;
    let record = runner.rollback_last(&mut conn)?;
    println!("rolled back {}", record.name);
    Ok(ExitCode::SUCCESS)
}

fn run_init(db_path: &Path) -> anyhow::Result<ExitCode> {
    let conn = open_store(db_path)?;
    init_baseline(&conn).context("failed to create baseline schema")?;
    info!(db = %db_path.display(), "database initialised");
    println!("Baseline schema ready in {}", db_path.display());
    Ok(ExitCode::SUCCESS)
}

fn run_cleanup(
    config: &MaintenanceConfig,
    dir: Option<PathBuf>,
    max_age_hours: Option<u64>,
    dry_run: bool,
) -> anyhow::Result<ExitCode> {
    let dir = dir.unwrap_or_else(|| config.uploads.dir.clone());
    let max_age = match max_age_hours {
        Some(hours) => max_age_from_hours(hours)?,
        None => config.uploads.max_age()?,
    };

    let report = cleanup_uploads(&dir, max_age, &config.uploads.keep, dry_run)?;
    let verb = if dry_run { "would remove" } else { "removed" };
    println!(
        "{verb} {} files, {:.1} MB ({} failures)",
        report.removed.len(),
        report.bytes_freed as f64 / (1024.0 * 1024.0),
        report.failed
    );
    Ok(if report.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_check_html(file: &Path) -> anyhow::Result<ExitCode> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let report = check_tag_balance(&html)?;

    if report.is_balanced() {
        println!("All HTML tags are properly matched!");
    } else {
        println!("Unmatched HTML tags:");
        for count in &report.unbalanced {
            println!(
                "  {}: {} opening, {} closing",
                count.tag, count.opening, count.closing
            );
        }
    }

    println!("\nTag statistics:");
    println!("Total opening tags: {}", report.total_opening);
    println!("Total closing tags: {}", report.total_closing);
    let common: Vec<String> = report
        .most_common
        .iter()
        .map(|(tag, count)| format!("{tag} ({count})"))
        .collect();
    println!("Most common tags: {}", common.join(", "));

    Ok(if report.is_balanced() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_migrate() {
        let cli = Cli::try_parse_from(["aistudy", "--db", "app.db"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.db, Some(PathBuf::from("app.db")));
    }

    #[test]
    fn parses_cleanup_overrides() {
        let cli = Cli::try_parse_from([
            "aistudy",
            "cleanup-uploads",
            "--dir",
            "/srv/uploads",
            "--max-age-hours",
            "6",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Some(Command::CleanupUploads {
                dir,
                max_age_hours,
                dry_run,
            }) => {
                assert_eq!(dir, Some(PathBuf::from("/srv/uploads")));
                assert_eq!(max_age_hours, Some(6));
                assert!(dry_run);
            }
            _ => panic!("expected cleanup-uploads"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli =
            Cli::try_parse_from(["aistudy", "status", "--json", "--log-format", "json"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Status { json: true })));
        assert!(matches!(cli.log_format, Some(LogFormatArg::Json)));
    }

    #[test]
    fn migrate_then_rollback_against_a_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("ai_study.db");

        run_init(&db).unwrap();
        run_migrate(&db).unwrap();
        run_rollback(&db).unwrap();

        let conn = open_store(&db).unwrap();
        let pending = catalog::registry().unwrap().pending(&conn).unwrap();
        assert_eq!(pending, vec!["009_add_analysis_progress".to_string()]);
    }

    #[test]
    fn cleanup_rejects_overflowing_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("fresh.pdf");
        std::fs::write(&upload, b"pdf").unwrap();

        let result = run_cleanup(
            &MaintenanceConfig::default(),
            Some(dir.path().to_path_buf()),
            Some(u64::MAX),
            false,
        );
        assert!(result.is_err());
        assert!(upload.exists());
    }

    #[test]
    fn check_html_fails_on_unbalanced_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("result.html");
        std::fs::write(&file, "<div><p>text</div>").unwrap();
        assert_eq!(run_check_html(&file).unwrap(), ExitCode::FAILURE);

        std::fs::write(&file, "<div><p>text</p></div>").unwrap();
        assert_eq!(run_check_html(&file).unwrap(), ExitCode::SUCCESS);
    }
}
