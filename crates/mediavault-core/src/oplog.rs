//! Append-only rename log and its reverter.
//!
//! The log is a two-column markdown table so it can be read by eye and split
//! by any line-oriented tool:
//!
//! ```text
//! | Old File Path | New File Path |
//! | ------------- | ------------- |
//! | /photos/IMG-20190921-WA0064.jpg | /photos/2019/2019.09.21.jpg |
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VaultError};

/// Default log file name, created in the media root.
pub const LOG_FILENAME: &str = "_mediavault_log.md";

const HEADER: &str = "| Old File Path | New File Path |\n| ------------- | ------------- |\n";
const OLD_COLUMN: &str = "Old File Path";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameLogEntry {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
}

/// Open log, written one flushed line per rename.
pub struct OperationLog {
    path: PathBuf,
    file: File,
    entries: u64,
}

impl OperationLog {
    /// Create a fresh log. An existing file at `path` is never overwritten.
    pub fn create(path: &Path) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(VaultError::LogExists(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(HEADER.as_bytes())?;
        file.sync_data()?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            entries: 0,
        })
    }

    pub fn append(&mut self, old_path: &Path, new_path: &Path) -> Result<()> {
        writeln!(
            self.file,
            "| {} | {} |",
            escape_cell(&old_path.to_string_lossy()),
            escape_cell(&new_path.to_string_lossy())
        )?;
        self.file.sync_data()?;
        self.entries += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

/// Split a table row on unescaped pipes.
fn split_row(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cur = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cur.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    cells.push(cur);

    let mut cells: Vec<String> = cells.into_iter().map(|c| c.trim().to_string()).collect();
    if cells.first().is_some_and(|c| c.is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

/// `None` for blank, header and separator rows.
fn parse_line(line: &str) -> Option<std::result::Result<RenameLogEntry, String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cells = split_row(trimmed);
    if cells.first().map(String::as_str) == Some(OLD_COLUMN) {
        return None;
    }
    if !cells.is_empty()
        && cells
            .iter()
            .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'))
    {
        return None;
    }
    match cells.as_slice() {
        [old, new] if !old.is_empty() && !new.is_empty() => Some(Ok(RenameLogEntry {
            old_path: PathBuf::from(old),
            new_path: PathBuf::from(new),
        })),
        _ => Some(Err(format!("expected 2 columns, found {}", cells.len()))),
    }
}

/// Read every entry of a log, failing on the first malformed row.
pub fn read_entries(path: &Path) -> Result<Vec<RenameLogEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        match parse_line(&line?) {
            None => {}
            Some(Ok(entry)) => entries.push(entry),
            Some(Err(reason)) => return Err(VaultError::LogFormat { line: idx + 1, reason }),
        }
    }
    Ok(entries)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertSummary {
    pub reverted: u64,
    /// Entries whose new path no longer exists.
    pub missing: u64,
    pub failed: u64,
}

/// Replay a log in file order, moving each new path back to its old path.
///
/// Missing files are skipped and every other per-entry problem is reported
/// without stopping the remaining entries. Only an unreadable log is an error.
pub fn revert(log_path: &Path) -> Result<RevertSummary> {
    let reader = BufReader::new(File::open(log_path)?);
    let mut summary = RevertSummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let entry = match parse_line(&line?) {
            None => continue,
            Some(Ok(entry)) => entry,
            Some(Err(reason)) => {
                warn!(line = idx + 1, %reason, "skipping malformed log line");
                summary.failed += 1;
                continue;
            }
        };

        if !entry.new_path.exists() {
            info!(path = %entry.new_path.display(), "no longer exists, skipping");
            summary.missing += 1;
            continue;
        }
        match revert_entry(&entry) {
            Ok(()) => {
                info!(from = %entry.new_path.display(), to = %entry.old_path.display(), "reverted");
                summary.reverted += 1;
            }
            Err(e) => {
                warn!(path = %entry.new_path.display(), error = %e, "revert failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

fn revert_entry(entry: &RenameLogEntry) -> io::Result<()> {
    if entry.old_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} is occupied", entry.old_path.display()),
        ));
    }
    if let Some(parent) = entry.old_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&entry.new_path, &entry.old_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILENAME);
        fs::write(&path, "precious").unwrap();

        assert!(matches!(OperationLog::create(&path), Err(VaultError::LogExists(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "precious");
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILENAME);
        let mut log = OperationLog::create(&path).unwrap();
        log.append(Path::new("/p/IMG-20190921-WA0064.jpg"), Path::new("/p/2019/2019.09.21.jpg"))
            .unwrap();
        log.append(Path::new("/p/odd|name.jpg"), Path::new("/p/2020/2020.01.01.jpg"))
            .unwrap();
        assert_eq!(log.len(), 2);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("| Old File Path | New File Path |"));
        assert!(text.contains("odd\\|name.jpg"));

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].old_path, PathBuf::from("/p/IMG-20190921-WA0064.jpg"));
        assert_eq!(entries[1].old_path, PathBuf::from("/p/odd|name.jpg"));
        assert_eq!(entries[1].new_path, PathBuf::from("/p/2020/2020.01.01.jpg"));
    }

    #[test]
    fn test_read_entries_rejects_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.md");
        fs::write(&path, format!("{}| only-one-column |\n", HEADER)).unwrap();
        assert!(matches!(read_entries(&path), Err(VaultError::LogFormat { line: 3, .. })));
    }

    #[test]
    fn test_revert_skips_missing_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("2019")).unwrap();
        fs::write(root.join("2019/2019.09.21.jpg"), b"a").unwrap();
        fs::write(root.join("2019/2019.09.22.jpg"), b"c").unwrap();

        let log_path = root.join(LOG_FILENAME);
        let mut log = OperationLog::create(&log_path).unwrap();
        log.append(&root.join("IMG-20190921-WA0064.jpg"), &root.join("2019/2019.09.21.jpg")).unwrap();
        log.append(&root.join("gone.jpg"), &root.join("2019/deleted-by-user.jpg")).unwrap();
        log.append(&root.join("IMG-20190922-WA0001.jpg"), &root.join("2019/2019.09.22.jpg")).unwrap();
        drop(log);

        let summary = revert(&log_path).unwrap();
        assert_eq!(summary, RevertSummary { reverted: 2, missing: 1, failed: 0 });
        assert!(root.join("IMG-20190921-WA0064.jpg").exists());
        assert!(root.join("IMG-20190922-WA0001.jpg").exists());
        assert!(!root.join("2019/2019.09.21.jpg").exists());
        assert!(!root.join("gone.jpg").exists());
    }

    #[test]
    fn test_revert_does_not_clobber_occupied_original() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("new.jpg"), b"moved").unwrap();
        fs::write(root.join("old.jpg"), b"someone else").unwrap();

        let log_path = root.join("log.md");
        let mut log = OperationLog::create(&log_path).unwrap();
        log.append(&root.join("old.jpg"), &root.join("new.jpg")).unwrap();
        drop(log);

        let summary = revert(&log_path).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(fs::read(root.join("old.jpg")).unwrap(), b"someone else");
        assert!(root.join("new.jpg").exists());
    }
}
