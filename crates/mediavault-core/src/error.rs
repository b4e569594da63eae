use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that abort a whole run. Per-file problems never surface here;
/// they are counted in the summary instead.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("log file already exists, refusing to overwrite: {}", .0.display())]
    LogExists(PathBuf),

    #[error("cannot use {} as the media root: {source}", .path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot {action} while the organizer is {state:?}")]
    InvalidState {
        action: &'static str,
        state: crate::organizer::OrganizerState,
    },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("malformed log line {line}: {reason}")]
    LogFormat { line: usize, reason: String },

    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
}
