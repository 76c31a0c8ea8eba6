//! Stale upload removal, meant to run from cron once a day.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{error, info, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// File names removed (or, on a dry run, that would have been).
    pub removed: Vec<String>,
    pub bytes_freed: u64,
    /// Files that could not be inspected or removed.
    pub failed: usize,
}

/// Remove regular files directly under `dir` older than `max_age`.
///
/// Names listed in `keep` and subdirectories are never touched. A missing
/// directory is reported with a warning and yields an empty report. Errors
/// on individual files are logged and counted in [`CleanupReport::failed`].
pub fn cleanup_uploads(
    dir: &Path,
    max_age: Duration,
    keep: &[String],
    dry_run: bool,
) -> aistudy_common::Result<CleanupReport> {
    let mut report = CleanupReport::default();

    if !dir.exists() {
        warn!(dir = %dir.display(), "upload directory does not exist");
        return Ok(report);
    }

    info!(
        dir = %dir.display(),
        max_age_hours = max_age.as_secs_f64() / 3600.0,
        dry_run,
        "starting upload cleanup"
    );

    let now = SystemTime::now();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("failed to read upload directory entry: {e}");
                report.failed += 1;
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        if keep.iter().any(|k| *k == name) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(file = %name, "failed to stat upload: {e}");
                report.failed += 1;
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        // mtime in the future counts as fresh
        let age = metadata
            .modified()
            .map(|mtime| now.duration_since(mtime).unwrap_or_default());
        let age = match age {
            Ok(age) => age,
            Err(e) => {
                error!(file = %name, "failed to read upload mtime: {e}");
                report.failed += 1;
                continue;
            }
        };
        if age <= max_age {
            continue;
        }

        if !dry_run {
            if let Err(e) = fs::remove_file(entry.path()) {
                error!(file = %name, "failed to remove upload: {e}");
                report.failed += 1;
                continue;
            }
        }

        let size = metadata.len();
        info!(
            file = %name,
            dry_run,
            "removed: age {:.1} hours, size {:.1} MB",
            age.as_secs_f64() / 3600.0,
            size as f64 / BYTES_PER_MB
        );
        report.removed.push(name);
        report.bytes_freed += size;
    }

    info!(
        removed = report.removed.len(),
        failed = report.failed,
        dry_run,
        "cleanup complete, freed {:.1} MB",
        report.bytes_freed as f64 / BYTES_PER_MB
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;

    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn write_file(dir: &Path, name: &str, bytes: usize, age: Duration) {
        let mut file = File::create(dir.join(name)).unwrap();
        file.write_all(&vec![b'x'; bytes]).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    fn keep_gitkeep() -> Vec<String> {
        vec![".gitkeep".to_string()]
    }

    #[test]
    fn removes_only_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "old.pdf", 100, 2 * DAY);
        write_file(dir.path(), "fresh.pdf", 50, Duration::from_secs(60));

        let report = cleanup_uploads(dir.path(), DAY, &keep_gitkeep(), false).unwrap();

        assert_eq!(report.removed, vec!["old.pdf".to_string()]);
        assert_eq!(report.bytes_freed, 100);
        assert_eq!(report.failed, 0);
        assert!(!dir.path().join("old.pdf").exists());
        assert!(dir.path().join("fresh.pdf").exists());
    }

    #[test]
    fn skips_kept_names_and_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), ".gitkeep", 0, 30 * DAY);
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_file(&dir.path().join("nested"), "deep.mp4", 10, 30 * DAY);

        let report = cleanup_uploads(dir.path(), DAY, &keep_gitkeep(), false).unwrap();

        assert!(report.removed.is_empty());
        assert!(dir.path().join(".gitkeep").exists());
        assert!(dir.path().join("nested/deep.mp4").exists());
    }

    #[test]
    fn dry_run_reports_without_deleting() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "old.pptx", 42, 3 * DAY);

        let report = cleanup_uploads(dir.path(), DAY, &keep_gitkeep(), true).unwrap();

        assert_eq!(report.removed, vec!["old.pptx".to_string()]);
        assert_eq!(report.bytes_freed, 42);
        assert!(dir.path().join("old.pptx").exists());
    }

    #[test]
    fn missing_directory_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let report =
            cleanup_uploads(&dir.path().join("uploads"), DAY, &keep_gitkeep(), false).unwrap();
        assert_eq!(report, CleanupReport::default());
    }
}
