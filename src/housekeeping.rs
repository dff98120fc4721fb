/// End-of-run housekeeping: log retention and the failed-city report.
///
/// Nothing here can fail a run. Errors are logged and the summary reports
/// what was actually removed.
///
/// # Clock injection
/// `prune_logs_at` takes `now` as a parameter so tests can age files without
/// touching their modification times.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

use crate::logging::{self, Stage};
use crate::model::FailedCity;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneSummary {
    pub files_removed: usize,
    pub dirs_removed: usize,
    pub errors: usize,
}

/// Delete `*.log` files under `dir` older than `retention_days`, then any
/// empty directories below `dir`.
pub fn prune_logs(dir: &Path, retention_days: u64) -> PruneSummary {
    prune_logs_at(dir, retention_days, SystemTime::now())
}

/// A file is stale when `now - mtime > retention_days` days.
pub fn prune_logs_at(dir: &Path, retention_days: u64, now: SystemTime) -> PruneSummary {
    let mut summary = PruneSummary::default();

    if !dir.is_dir() {
        logging::debug(
            Stage::Cleanup,
            None,
            &format!("Log directory {} does not exist, nothing to prune", dir.display()),
        );
        return summary;
    }

    let max_age = Duration::from_secs(retention_days.saturating_mul(SECONDS_PER_DAY));

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                logging::warn(Stage::Cleanup, None, &format!("Skipping unreadable entry: {}", e));
                summary.errors += 1;
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "log") {
            continue;
        }

        match is_older_than(path, max_age, now) {
            Ok(true) => match fs::remove_file(path) {
                Ok(()) => summary.files_removed += 1,
                Err(e) => {
                    logging::warn(
                        Stage::Cleanup,
                        None,
                        &format!("Failed to remove {}: {}", path.display(), e),
                    );
                    summary.errors += 1;
                }
            },
            Ok(false) => {}
            Err(e) => {
                logging::warn(
                    Stage::Cleanup,
                    None,
                    &format!("Failed to stat {}: {}", path.display(), e),
                );
                summary.errors += 1;
            }
        }
    }

    // Children before parents so nested empty trees collapse in one pass
    for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_dir() && is_empty_dir(entry.path()) {
            match fs::remove_dir(entry.path()) {
                Ok(()) => summary.dirs_removed += 1,
                Err(_) => summary.errors += 1,
            }
        }
    }

    logging::info(
        Stage::Cleanup,
        None,
        &format!(
            "Cleaned logs older than {} days in {}: {} files, {} directories removed",
            retention_days,
            dir.display(),
            summary.files_removed,
            summary.dirs_removed
        ),
    );

    summary
}

fn is_older_than(path: &Path, max_age: Duration, now: SystemTime) -> io::Result<bool> {
    let modified = fs::metadata(path)?.modified()?;
    // A modification time in the future is not stale
    Ok(now.duration_since(modified).is_ok_and(|age| age > max_age))
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_none())
}

/// Report cities that produced no weather this run.
pub fn report_failed_cities(failed: &[FailedCity]) {
    if failed.is_empty() {
        logging::info(Stage::Cleanup, None, "Cleanup complete. All operations successful.");
    } else {
        logging::warn(
            Stage::Cleanup,
            None,
            &format!(
                "Cleanup complete. Note: {} cities failed: {:?}",
                failed.len(),
                failed
            ),
        );
    }
}
