pub mod bucket;
pub mod cancel;
pub mod date;
pub mod error;
pub mod media;
pub mod namer;
pub mod oplog;
pub mod organizer;
pub mod scan;

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

pub use cancel::CancellationToken;
pub use error::{Result, VaultError};
pub use oplog::{revert, RenameLogEntry, RevertSummary, LOG_FILENAME};
pub use organizer::{OrganizerState, RenameOrganizer};

fn default_true() -> bool {
    true
}

fn default_bucket_threshold() -> u32 {
    u32::MAX
}

/// Everything a run can be tuned with. The defaults rename in place under
/// `<root>/<year>/`, guess from filenames, and never create day folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeOptions {
    pub root: PathBuf,
    /// Fall back to filename patterns when metadata has no date.
    #[serde(default = "default_true")]
    pub best_effort: bool,
    /// Files per effective day from which that day gets its own folder.
    #[serde(default = "default_bucket_threshold")]
    pub bucket_threshold: u32,
    /// Captures before this hour (0-23) count towards the previous day.
    #[serde(default)]
    pub day_boundary_hour: u32,
    /// `<year>/<month>/` instead of `<year>/`.
    #[serde(default)]
    pub monthly: bool,
    #[serde(default)]
    pub recursive: bool,
    /// Folder under the root that receives files without a usable date.
    #[serde(default)]
    pub unprocessed_dir: Option<String>,
    /// Defaults to `<root>/_mediavault_log.md`.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub dry_run: bool,
    /// Set the modification time of renamed files to their capture time.
    #[serde(default)]
    pub touch: bool,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            best_effort: true,
            bucket_threshold: default_bucket_threshold(),
            day_boundary_hour: 0,
            monthly: false,
            recursive: false,
            unprocessed_dir: None,
            log_path: None,
            dry_run: false,
            touch: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizeSummary {
    pub scanned: u64,
    pub renamed: u64,
    /// Already carrying the right name in the right folder.
    pub unchanged: u64,
    /// No usable capture date (includes `invalid`).
    pub skipped: u64,
    /// Dates rejected as too old or in the future.
    pub invalid: u64,
    pub unprocessed_moved: u64,
    pub failed: u64,
    pub dry_run: bool,
    /// Log written by this run, if any rename happened.
    pub log_path: Option<PathBuf>,
}

impl OrganizeSummary {
    pub fn processed(&self) -> u64 {
        self.renamed + self.unchanged
    }
}

/// How a run ended when no setup error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizeOutcome {
    Completed(OrganizeSummary),
    /// Nothing could be organized; no file was touched.
    NothingToDo(OrganizeSummary),
}

impl OrganizeOutcome {
    pub fn summary(&self) -> &OrganizeSummary {
        match self {
            OrganizeOutcome::Completed(s) | OrganizeOutcome::NothingToDo(s) => s,
        }
    }
}

/// Control options for a run.
#[derive(Debug, Clone, Default)]
pub struct OrganizeControl {
    pub cancel_token: Option<CancellationToken>,
}

impl OrganizeControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

/// Type alias for progress callback. The lifetime lets callers pass closures
/// that borrow their own locals.
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Throttled progress reporter: emits at most every 200ms, and always on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        let start = Instant::now()
            .checked_sub(Duration::from_secs(1))
            .unwrap_or_else(Instant::now);
        Self {
            inner,
            last_emit: Mutex::new(start),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let Ok(mut last) = self.last_emit.lock() else {
                return;
            };
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Ingest and organize `options.root`.
pub fn organize(
    options: &OrganizeOptions,
    progress_callback: &ProgressCallback<'_>,
) -> Result<OrganizeOutcome> {
    organize_with_control(options, &OrganizeControl::default(), progress_callback)
}

/// Ingest and organize `options.root`, honouring the cancellation token.
pub fn organize_with_control(
    options: &OrganizeOptions,
    control: &OrganizeControl,
    progress_callback: &ProgressCallback<'_>,
) -> Result<OrganizeOutcome> {
    let tp = ThrottledProgress::new(progress_callback);
    let cancel = control.cancel_token.as_ref();

    let mut organizer = RenameOrganizer::new(options.clone())?;
    info!(root = %organizer.root().display(), "scanning");
    organizer.ingest_tree(&tp, cancel)?;

    if !organizer.has_work() {
        return Ok(OrganizeOutcome::NothingToDo(organizer.summary().clone()));
    }

    let summary = organizer.organize(&tp, cancel)?;
    Ok(OrganizeOutcome::Completed(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_disable_bucketing() {
        let opts = OrganizeOptions::default();
        assert!(opts.best_effort);
        assert_eq!(opts.bucket_threshold, u32::MAX);
        assert_eq!(opts.day_boundary_hour, 0);
        assert!(!opts.recursive && !opts.monthly && !opts.dry_run);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: OrganizeOptions =
            serde_json::from_str(r#"{"root": "/photos", "monthly": true}"#).unwrap();
        assert_eq!(opts.root, PathBuf::from("/photos"));
        assert!(opts.monthly);
        assert!(opts.best_effort);
        assert_eq!(opts.bucket_threshold, u32::MAX);
        assert_eq!(opts.unprocessed_dir, None);
    }

    #[test]
    fn test_nothing_to_do_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("holiday.jpg"), b"no date").unwrap();
        let options = OrganizeOptions {
            root: dir.path().to_path_buf(),
            ..OrganizeOptions::default()
        };

        let outcome = organize(&options, &|_, _, _, _| {}).unwrap();
        match outcome {
            OrganizeOutcome::NothingToDo(s) => {
                assert_eq!(s.scanned, 1);
                assert_eq!(s.skipped, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(dir.path().join("holiday.jpg").exists());
        assert!(!dir.path().join(LOG_FILENAME).exists());
    }

    #[test]
    fn test_organize_accepts_callback_borrowing_locals() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("IMG-20190921-WA0064.jpg"), b"a").unwrap();
        let options = OrganizeOptions {
            root: dir.path().to_path_buf(),
            ..OrganizeOptions::default()
        };

        let stages = Mutex::new(Vec::new());
        let verbose = true;
        let callback = |stage: &str, _: u64, _: u64, _: &str| {
            if verbose {
                stages.lock().unwrap().push(stage.to_string());
            }
        };
        let outcome = organize_with_control(&options, &OrganizeControl::new(), &callback).unwrap();
        assert_eq!(outcome.summary().renamed, 1);
        let stages = stages.into_inner().unwrap();
        assert!(stages.contains(&"ingest".to_string()));
        assert!(stages.contains(&"organize".to_string()));
    }

    #[test]
    fn test_throttled_progress_always_reports_completion() {
        let calls = Mutex::new(Vec::new());
        {
            let cb = |stage: &str, current: u64, _total: u64, _msg: &str| {
                calls.lock().unwrap().push((stage.to_string(), current));
            };
            let tp = ThrottledProgress::new(&cb);
            tp.report("organize", 0, 3, "");
            tp.report("organize", 1, 3, "");
            tp.report("organize", 2, 3, "");
        }
        let calls = calls.into_inner().unwrap();
        assert_eq!(calls.first(), Some(&("organize".to_string(), 0)));
        assert_eq!(calls.last(), Some(&("organize".to_string(), 2)));
    }
}
