use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use exif::{In, Reader, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Containers kamadak-exif walks segment by segment, stopping at the EXIF
/// block. Their size does not matter.
const SEGMENTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "heif", "webp"];

/// TIFF-based files (plain TIFF and camera RAW) are read into memory whole,
/// so larger ones are not opened.
pub const MAX_TIFF_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// `DateTimeOriginal` split into its date and, when the camera recorded one, its time.
pub type ExifDate = (NaiveDate, Option<NaiveTime>);

fn is_segmented(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SEGMENTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// Read `DateTimeOriginal` from a file, treating it as an EXIF container.
/// EXIF datetimes have no timezone info - they are local time as-is.
pub fn read_exif_date(path: &Path) -> Option<ExifDate> {
    let file = File::open(path)
        .map_err(|e| debug!(?path, error = %e, "cannot open for EXIF"))
        .ok()?;
    if !is_segmented(path) {
        let size = file.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
        if size > MAX_TIFF_FILE_SIZE {
            debug!(?path, size, "too large for EXIF probing");
            return None;
        }
    }

    let exif = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .map_err(|e| debug!(?path, error = %e, "no readable EXIF"))
        .ok()?;

    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;
    let val = field.display_value().to_string();
    let parsed = parse_exif_datetime(&val);
    if parsed.is_none() {
        debug!(?path, value = %val, "unparsable DateTimeOriginal");
    }
    parsed
}

fn parse_exif_datetime(s: &str) -> Option<ExifDate> {
    let cleaned = s
        .trim()
        .trim_matches('"')
        .replace('-', ":")
        .replace('/', ":")
        .replace('\\', ":")
        .replace('.', ":");

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some((dt.date(), Some(dt.time())));
    }

    // Cameras that blank out the time still carry a usable date.
    let date = NaiveDate::parse_from_str(cleaned.split(' ').next()?, "%Y:%m:%d").ok()?;
    Some((date, None))
}
