use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bucket::DayBucketer;
use crate::cancel::CancellationToken;
use crate::date::{self, guess, Resolution};
use crate::error::{Result, VaultError};
use crate::media::MediaRecord;
use crate::namer::UniqueNamer;
use crate::oplog::OperationLog;
use crate::scan;
use crate::{OrganizeOptions, OrganizeSummary, ThrottledProgress};

/// Lifecycle of one organizer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizerState {
    Idle,
    Ingesting,
    ReadyToOrganize,
    Organizing,
    Done,
    Failed,
}

/// Two-pass organizer: resolve every file first, then move them.
///
/// Day counts must be complete before the first file is placed, which is why
/// ingestion and organization are separate passes over the same ledger.
pub struct RenameOrganizer {
    options: OrganizeOptions,
    root: PathBuf,
    log_path: PathBuf,
    state: OrganizerState,
    ledger: Vec<MediaRecord>,
    unresolved: Vec<PathBuf>,
    bucketer: DayBucketer,
    namer: UniqueNamer,
    log: Option<OperationLog>,
    summary: OrganizeSummary,
}

impl RenameOrganizer {
    /// Validate the setup. Nothing on disk is touched here.
    pub fn new(options: OrganizeOptions) -> Result<Self> {
        if options.day_boundary_hour > 23 {
            return Err(VaultError::InvalidOption(format!(
                "day boundary hour must be 0-23, got {}",
                options.day_boundary_hour
            )));
        }
        let root = fs::canonicalize(&options.root).map_err(|source| VaultError::RootUnavailable {
            path: options.root.clone(),
            source,
        })?;
        if !root.is_dir() {
            return Err(VaultError::RootUnavailable {
                path: options.root.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            });
        }

        let log_path = options
            .log_path
            .clone()
            .unwrap_or_else(|| root.join(crate::oplog::LOG_FILENAME));
        if !options.dry_run && log_path.exists() {
            return Err(VaultError::LogExists(log_path));
        }

        let bucketer = DayBucketer::new(options.day_boundary_hour, options.bucket_threshold);
        let summary = OrganizeSummary {
            dry_run: options.dry_run,
            ..OrganizeSummary::default()
        };
        Ok(Self {
            options,
            root,
            log_path,
            state: OrganizerState::Idle,
            ledger: Vec::new(),
            unresolved: Vec::new(),
            bucketer,
            namer: UniqueNamer::new(),
            log: None,
            summary,
        })
    }

    pub fn state(&self) -> OrganizerState {
        self.state
    }

    /// Canonical media root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn ledger(&self) -> &[MediaRecord] {
        &self.ledger
    }

    pub fn summary(&self) -> &OrganizeSummary {
        &self.summary
    }

    fn unprocessed_dir(&self) -> Option<PathBuf> {
        self.options.unprocessed_dir.as_ref().map(|name| self.root.join(name))
    }

    /// Whether the organize pass would do anything at all.
    pub fn has_work(&self) -> bool {
        !self.ledger.is_empty() || (!self.unresolved.is_empty() && self.options.unprocessed_dir.is_some())
    }

    fn expect_state(&self, expected: OrganizerState, action: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(VaultError::InvalidState {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    fn fail<T>(&mut self, err: VaultError) -> Result<T> {
        self.state = OrganizerState::Failed;
        Err(err)
    }

    /// Walk the root (per the recursive option) and ingest what is found.
    pub fn ingest_tree(
        &mut self,
        progress: &ThrottledProgress,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let mut exclude = vec![self.log_path.clone()];
        exclude.extend(self.unprocessed_dir());
        let files = scan::scan_media(&self.root, self.options.recursive, &exclude);
        self.ingest(&files, progress, cancel)
    }

    /// Resolve the capture date of every file, in the given order.
    pub fn ingest(
        &mut self,
        files: &[PathBuf],
        progress: &ThrottledProgress,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.expect_state(OrganizerState::Idle, "ingest")?;
        self.state = OrganizerState::Ingesting;

        let total = files.len() as u64;
        for (i, path) in files.iter().enumerate() {
            if let Some(token) = cancel {
                if let Err(e) = token.check() {
                    return self.fail(e);
                }
            }
            self.summary.scanned += 1;

            match date::resolve(path, self.options.best_effort) {
                Resolution::Resolved(capture) => {
                    let day = self.bucketer.record(capture.date, capture.time);
                    debug!(?path, date = %capture.date, source = ?capture.source, "resolved");
                    self.ledger.push(MediaRecord::new(path.clone(), capture, day));
                }
                Resolution::Invalid(capture) => {
                    info!(?path, date = %capture.date, "implausible capture date, skipping");
                    self.summary.invalid += 1;
                    self.summary.skipped += 1;
                    self.unresolved.push(path.clone());
                }
                Resolution::NotFound => {
                    info!(?path, "no capture date found, skipping");
                    self.summary.skipped += 1;
                    self.unresolved.push(path.clone());
                }
            }
            progress.report("ingest", i as u64, total, "Reading capture dates");
        }

        self.state = OrganizerState::ReadyToOrganize;
        Ok(())
    }

    /// `root/<year>[/<month>][/<YYYY.MM.DD>]`, all taken from the effective day.
    pub fn destination_dir(&self, record: &MediaRecord) -> PathBuf {
        let day = record.effective_day;
        let mut dir = self.root.join(day.format("%Y").to_string());
        if self.options.monthly {
            dir = dir.join(day.format("%m").to_string());
        }
        if self.bucketer.should_bucket(day) {
            dir = dir.join(day.format("%Y.%m.%d").to_string());
        }
        dir
    }

    /// Move every ledger entry into place, then the unresolved files if a
    /// holding folder is configured. Each rename is logged before the next.
    pub fn organize(
        &mut self,
        progress: &ThrottledProgress,
        cancel: Option<&CancellationToken>,
    ) -> Result<OrganizeSummary> {
        self.expect_state(OrganizerState::ReadyToOrganize, "organize")?;
        self.state = OrganizerState::Organizing;

        let ledger = std::mem::take(&mut self.ledger);
        let total = ledger.len() as u64;
        for (i, record) in ledger.iter().enumerate() {
            if let Some(token) = cancel {
                if let Err(e) = token.check() {
                    return self.fail(e);
                }
            }
            if let Err(e) = self.place(record) {
                return self.fail(e);
            }
            progress.report("organize", i as u64, total, "Renaming files");
        }

        if let Some(holding) = self.unprocessed_dir() {
            let unresolved = std::mem::take(&mut self.unresolved);
            for path in &unresolved {
                if let Some(token) = cancel {
                    if let Err(e) = token.check() {
                        return self.fail(e);
                    }
                }
                if let Err(e) = self.hold(path, &holding) {
                    return self.fail(e);
                }
            }
        }

        self.unresolved.clear();
        if let Some(log) = &self.log {
            self.summary.log_path = Some(log.path().to_path_buf());
        }
        self.state = OrganizerState::Done;
        info!(
            renamed = self.summary.renamed,
            unchanged = self.summary.unchanged,
            skipped = self.summary.skipped,
            failed = self.summary.failed,
            "organize finished"
        );
        Ok(self.summary.clone())
    }

    fn place(&mut self, record: &MediaRecord) -> Result<()> {
        let src = &record.original_path;
        let dest_dir = self.destination_dir(record);
        let base = record.display_name();
        let ext = src.extension().and_then(|e| e.to_str());

        let already_named = src.parent() == Some(dest_dir.as_path())
            && src
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| guess::is_own_name_for(stem, &base));
        if already_named {
            debug!(?src, "already in place");
            self.summary.unchanged += 1;
            return Ok(());
        }

        if !self.options.dry_run {
            if let Err(e) = fs::create_dir_all(&dest_dir) {
                warn!(dir = ?dest_dir, error = %e, "cannot create destination folder");
                self.summary.failed += 1;
                return Ok(());
            }
        }

        let dest = self.namer.claim(&dest_dir, &base, ext, Some(src.as_path()));
        if &dest == src {
            self.summary.unchanged += 1;
            return Ok(());
        }

        if self.move_logged(src, &dest)? {
            self.summary.renamed += 1;
            if self.options.touch && !self.options.dry_run {
                if let Some(time) = record.capture_time {
                    set_mtime(&dest, record.capture_date.and_time(time));
                }
            }
        }
        Ok(())
    }

    fn hold(&mut self, src: &Path, holding: &Path) -> Result<()> {
        if !self.options.dry_run {
            if let Err(e) = fs::create_dir_all(holding) {
                warn!(dir = ?holding, error = %e, "cannot create unprocessed folder");
                self.summary.failed += 1;
                return Ok(());
            }
        }
        let stem = src.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
        let ext = src.extension().and_then(|e| e.to_str());
        let dest = self.namer.claim(holding, stem, ext, Some(src));
        if self.move_logged(src, &dest)? {
            self.summary.unprocessed_moved += 1;
        }
        Ok(())
    }

    /// Rename `src` to `dest` and log it. `Ok(false)` is a per-file failure;
    /// `Err` means the log itself is unusable and the run must stop.
    fn move_logged(&mut self, src: &Path, dest: &Path) -> Result<bool> {
        if self.options.dry_run {
            info!("would rename {} -> {}", src.display(), dest.display());
            return Ok(true);
        }

        // Opened right before the first rename, so setup failures leave the tree untouched.
        let log = match self.log.take() {
            Some(log) => log,
            None => OperationLog::create(&self.log_path)?,
        };
        let log = self.log.insert(log);

        if let Err(e) = fs::rename(src, dest) {
            warn!(?src, ?dest, error = %e, "rename failed, leaving file in place");
            self.summary.failed += 1;
            return Ok(false);
        }
        if let Err(e) = log.append(src, dest) {
            // An unlogged rename could never be reverted; put it back and stop.
            if let Err(undo) = fs::rename(dest, src) {
                warn!(?src, ?dest, error = %undo, "could not undo unlogged rename");
            }
            return Err(e);
        }
        info!("renamed {} -> {}", src.display(), dest.display());
        Ok(true)
    }
}

fn set_mtime(path: &Path, captured: chrono::NaiveDateTime) {
    // NaiveDateTime is local time; convert back to UTC epoch for mtime
    if let Some(local) = captured.and_local_timezone(chrono::Local).single() {
        let ft = filetime::FileTime::from_unix_time(local.timestamp(), 0);
        if let Err(e) = filetime::set_file_mtime(path, ft) {
            debug!(?path, error = %e, "cannot set modification time");
        }
    }
}
