use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};

use crate::date::{CaptureDate, DateSource};

/// A file whose capture date was resolved during ingestion.
#[derive(Debug, Clone)]
pub struct MediaRecord {
    /// Absolute path at ingestion time
    pub original_path: PathBuf,
    pub capture_date: NaiveDate,
    pub capture_time: Option<NaiveTime>,
    pub source: DateSource,
    /// Day used for folder placement (may differ from `capture_date`)
    pub effective_day: NaiveDate,
}

impl MediaRecord {
    pub fn new(original_path: PathBuf, capture: CaptureDate, effective_day: NaiveDate) -> Self {
        Self {
            original_path,
            capture_date: capture.date,
            capture_time: capture.time,
            source: capture.source,
            effective_day,
        }
    }

    /// `2021.01.14 (15h30m00s)` with a known time, `2021.01.14` otherwise.
    pub fn display_name(&self) -> String {
        let date = self.capture_date.format("%Y.%m.%d");
        match self.capture_time {
            Some(t) => format!("{} ({})", date, t.format("%Hh%Mm%Ss")),
            None => date.to_string(),
        }
    }
}
