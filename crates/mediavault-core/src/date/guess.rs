use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Date (and time, when the name carries one) read from a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessedDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

struct DatePattern {
    name: &'static str,
    regex: &'static LazyLock<Regex>,
}

// All patterns expose named groups y/m/d and optionally H/M/S.
// Our own output: "2019.09.21", "2019.09.21 (15h30m00s)", "2019.09.21 (15h30m00s) (2)"
static RE_OWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<y>\d{4})\.(?P<m>\d{2})\.(?P<d>\d{2})(?: \((?P<H>\d{2})h(?P<M>\d{2})m(?P<S>\d{2})s\))?(?: \(\d+\))?$").unwrap()
});
// WhatsApp exports: IMG-20190921-WA0064
static RE_WHATSAPP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:IMG|VID|AUD|PTT|STK)-(?P<y>(19|20)\d{2})(?P<m>\d{2})(?P<d>\d{2})-WA\d+").unwrap()
});
static RE_SCREENSHOT_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Screenshot_(?P<y>(19|20)\d{2})-?(?P<m>\d{2})-?(?P<d>\d{2})[-_](?P<H>\d{2})-?(?P<M>\d{2})-?(?P<S>\d{2})").unwrap()
});
static RE_SCREENSHOT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Screenshot_(?P<y>(19|20)\d{2})-?(?P<m>\d{2})-?(?P<d>\d{2})").unwrap()
});
// Camera apps: IMG_20190509_154733, PXL_20230101_101010123
static RE_CAMERA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:IMG|VID|PXL|MVIMG|PANO)_(?P<y>(19|20)\d{2})(?P<m>\d{2})(?P<d>\d{2})_(?P<H>\d{2})(?P<M>\d{2})(?P<S>\d{2})").unwrap()
});
static RE_0: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<y>(20|19)\d{2})(?P<m>0[1-9]|1[0-2])(?P<d>[0-3]\d)-(?P<H>\d{2})(?P<M>\d{2})(?P<S>\d{2})").unwrap());
static RE_1: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<y>(20|19)\d{2})(?P<m>0[1-9]|1[0-2])(?P<d>[0-3]\d)_(?P<H>\d{2})(?P<M>\d{2})(?P<S>\d{2})").unwrap());
static RE_2: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<y>(20|19)\d{2})-(?P<m>0[1-9]|1[0-2])-(?P<d>[0-3]\d)-(?P<H>\d{2})-(?P<M>\d{2})-(?P<S>\d{2})").unwrap());
static RE_3: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<y>(20|19)\d{2})-(?P<m>0[1-9]|1[0-2])-(?P<d>[0-3]\d)-(?P<H>\d{2})(?P<M>\d{2})(?P<S>\d{2})").unwrap());
static RE_4: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<y>(20|19)\d{2})(?P<m>0[1-9]|1[0-2])(?P<d>[0-3]\d)(?P<H>\d{2})(?P<M>\d{2})(?P<S>\d{2})").unwrap());
static RE_5: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<y>(20|19)\d{2})_(?P<m>0[1-9]|1[0-2])_(?P<d>[0-3]\d)_(?P<H>\d{2})_(?P<M>\d{2})_(?P<S>\d{2})").unwrap());
// Names that start with the date: "20210114_beach", "2021-01-14 party"
static RE_DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<y>(19|20)\d{2})(?P<m>0[1-9]|1[0-2])(?P<d>[0-3]\d)(?:\D|$)").unwrap()
});
static RE_DASHED_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<y>(19|20)\d{2})-(?P<m>0[1-9]|1[0-2])-(?P<d>[0-3]\d)(?:\D|$)").unwrap()
});

static PATTERNS: &[DatePattern] = &[
    DatePattern { name: "own", regex: &RE_OWN },
    DatePattern { name: "whatsapp", regex: &RE_WHATSAPP },
    DatePattern { name: "screenshot", regex: &RE_SCREENSHOT_TIME },
    DatePattern { name: "screenshot-date", regex: &RE_SCREENSHOT_DATE },
    DatePattern { name: "camera", regex: &RE_CAMERA },
    DatePattern { name: "ymd-hms", regex: &RE_0 },
    DatePattern { name: "ymd_hms", regex: &RE_1 },
    DatePattern { name: "y-m-d-h-m-s", regex: &RE_2 },
    DatePattern { name: "y-m-d-hms", regex: &RE_3 },
    DatePattern { name: "ymdhms", regex: &RE_4 },
    DatePattern { name: "y_m_d_h_m_s", regex: &RE_5 },
    DatePattern { name: "date-prefix", regex: &RE_DATE_PREFIX },
    DatePattern { name: "dashed-date-prefix", regex: &RE_DASHED_PREFIX },
];

/// Guess a capture date from the filename. The first pattern that matches
/// and forms a real calendar date wins.
pub fn guess_date_from_filename(filename: &str) -> Option<GuessedDate> {
    let basename = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    let stem = Path::new(basename)
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or(basename);

    for pat in PATTERNS {
        let Some(caps) = pat.regex.captures(stem) else {
            continue;
        };
        let num = |group: &str| caps.name(group).and_then(|m| m.as_str().parse::<u32>().ok());

        let (Some(y), Some(m), Some(d)) = (num("y"), num("m"), num("d")) else {
            continue;
        };
        let Some(date) = NaiveDate::from_ymd_opt(y as i32, m, d) else {
            continue;
        };
        let time = match (num("H"), num("M"), num("S")) {
            (Some(h), Some(mi), Some(s)) => match NaiveTime::from_hms_opt(h, mi, s) {
                Some(t) => Some(t),
                None => continue,
            },
            _ => None,
        };
        tracing::trace!(filename, pattern = pat.name, "filename pattern matched");
        return Some(GuessedDate { date, time });
    }

    None
}

/// Whether `stem` is `base` or `base (N)`, i.e. a name we would have produced.
pub fn is_own_name_for(stem: &str, base: &str) -> bool {
    let Some(rest) = stem.strip_prefix(base) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    rest.strip_prefix(" (")
        .and_then(|r| r.strip_suffix(')'))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
