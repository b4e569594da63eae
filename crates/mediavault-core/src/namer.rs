use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn file_name(base: &str, counter: u32, ext: Option<&str>) -> String {
    match (counter, ext) {
        (0, Some(ext)) => format!("{}.{}", base, ext),
        (0, None) => base.to_string(),
        (n, Some(ext)) => format!("{} ({}).{}", base, n, ext),
        (n, None) => format!("{} ({})", base, n),
    }
}

/// Hands out collision-free names: `base.ext`, `base (1).ext`, `base (2).ext`, ...
///
/// Existence is checked on disk for every candidate. Names already handed
/// out by this namer count as taken too, so a dry run that never touches the
/// disk still plans distinct names.
#[derive(Debug, Default)]
pub struct UniqueNamer {
    claimed: HashSet<PathBuf>,
}

impl UniqueNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a free path in `dir`. `current` is the file being placed: landing
    /// on its own path is allowed and means "leave it where it is".
    pub fn claim(
        &mut self,
        dir: &Path,
        base: &str,
        ext: Option<&str>,
        current: Option<&Path>,
    ) -> PathBuf {
        let mut counter = 0u32;
        let dest = loop {
            let candidate = dir.join(file_name(base, counter, ext));
            if current == Some(candidate.as_path()) {
                break candidate;
            }
            if !self.claimed.contains(&candidate) && !candidate.exists() {
                break candidate;
            }
            counter += 1;
        };
        self.claimed.insert(dest.clone());
        dest
    }
}

/// One-shot form: the first name of the `base (N).ext` series not present in `dir`.
pub fn make_unique(dir: &Path, base: &str, ext: Option<&str>) -> PathBuf {
    UniqueNamer::new().claim(dir, base, ext, None)
}
