pub mod exif;
pub mod guess;
pub mod video;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// EXIF 1.0 was published in 1995; nothing earlier can carry a capture tag.
pub const MIN_PLAUSIBLE_YEAR: i32 = 1995;

/// Where a capture date came from, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateSource {
    Exif,
    VideoContainer,
    Filename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub source: DateSource,
}

impl CaptureDate {
    fn from_datetime(dt: NaiveDateTime, source: DateSource) -> Self {
        Self {
            date: dt.date(),
            time: Some(dt.time()),
            source,
        }
    }

    /// Date-only values count from midnight, so today is never in the future.
    fn earliest_instant(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or_default())
    }

    pub fn is_plausible(&self, now: NaiveDateTime) -> bool {
        self.date.year() >= MIN_PLAUSIBLE_YEAR && self.earliest_instant() <= now
    }
}

/// Outcome of resolving one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(CaptureDate),
    /// No strategy produced anything.
    NotFound,
    /// Something was found, but every candidate failed validation.
    Invalid(CaptureDate),
}

/// How the embedded metadata of a file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Videos are picked by container extension; anything else is probed as an image.
    pub fn of(path: &Path) -> Self {
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(video::is_video_extension);
        if is_video {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn read_capture_time(self, path: &Path) -> Option<CaptureDate> {
        match self {
            MediaKind::Image => exif::read_exif_date(path).map(|(date, time)| CaptureDate {
                date,
                time,
                source: DateSource::Exif,
            }),
            MediaKind::Video => video::read_video_date(path)
                .map(|dt| CaptureDate::from_datetime(dt, DateSource::VideoContainer)),
        }
    }
}

/// Resolve the capture date of `path` against the current local time.
pub fn resolve(path: &Path, allow_guess: bool) -> Resolution {
    resolve_at(path, allow_guess, chrono::Local::now().naive_local())
}

/// Metadata first, then (if allowed) the filename. A candidate that fails
/// validation falls through to the next strategy.
pub fn resolve_at(path: &Path, allow_guess: bool, now: NaiveDateTime) -> Resolution {
    let mut rejected = None;

    if let Some(found) = MediaKind::of(path).read_capture_time(path) {
        if found.is_plausible(now) {
            return Resolution::Resolved(found);
        }
        debug!(?path, date = %found.date, "implausible metadata date");
        rejected = Some(found);
    }

    if allow_guess {
        let guessed = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(guess::guess_date_from_filename);
        if let Some(g) = guessed {
            let found = CaptureDate {
                date: g.date,
                time: g.time,
                source: DateSource::Filename,
            };
            if found.is_plausible(now) {
                return Resolution::Resolved(found);
            }
            debug!(?path, date = %found.date, "implausible filename date");
            rejected = Some(found);
        }
    }

    match rejected {
        Some(c) => Resolution::Invalid(c),
        None => Resolution::NotFound,
    }
}
