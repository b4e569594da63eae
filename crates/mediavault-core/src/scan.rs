use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::date::video::VIDEO_EXTENSIONS;

/// Still-image extensions taken into account besides the video containers.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "heif", "tif", "tiff", "webp", "gif", "dng", "cr2", "nef", "arw",
];

pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .chain(VIDEO_EXTENSIONS)
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
}

/// List media files under `root`, sorted by name within each directory.
/// Hidden entries and everything under `exclude` are left out.
pub fn scan_media(root: &Path, recursive: bool, exclude: &[PathBuf]) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && !exclude.iter().any(|x| e.path() == x));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "cannot read directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if is_media_file(entry.path()) {
            files.push(entry.into_path());
        } else {
            debug!(path = ?entry.path(), "not a media file, ignoring");
        }
    }
    files
}
