use std::collections::HashMap;

use chrono::{Days, NaiveDate, NaiveTime, Timelike};

/// Day a capture is attributed to for folder placement. Captures before
/// `boundary_hour` belong to the previous day; without a time the date is kept.
pub fn effective_day(date: NaiveDate, time: Option<NaiveTime>, boundary_hour: u32) -> NaiveDate {
    match time {
        Some(t) if t.hour() < boundary_hour => date.checked_sub_days(Days::new(1)).unwrap_or(date),
        _ => date,
    }
}

/// Per-effective-day counts and the "does this day get its own folder" rule.
#[derive(Debug, Clone)]
pub struct DayBucketer {
    boundary_hour: u32,
    threshold: u32,
    counts: HashMap<NaiveDate, u32>,
}

impl DayBucketer {
    pub fn new(boundary_hour: u32, threshold: u32) -> Self {
        Self {
            boundary_hour,
            threshold,
            counts: HashMap::new(),
        }
    }

    pub fn effective_day(&self, date: NaiveDate, time: Option<NaiveTime>) -> NaiveDate {
        effective_day(date, time, self.boundary_hour)
    }

    /// Count a capture and return its effective day.
    pub fn record(&mut self, date: NaiveDate, time: Option<NaiveTime>) -> NaiveDate {
        let day = self.effective_day(date, time);
        *self.counts.entry(day).or_insert(0) += 1;
        day
    }

    pub fn count(&self, day: NaiveDate) -> u32 {
        self.counts.get(&day).copied().unwrap_or(0)
    }

    pub fn should_bucket(&self, day: NaiveDate) -> bool {
        self.count(day) >= self.threshold
    }
}
