//! Creation time from ISO base media containers (MP4, QuickTime and 3GPP).
//!
//! Only the box headers on the path `moov/mvhd` are read, so a truncated or
//! corrupt file costs a handful of small reads before giving up.

use chrono::{DateTime, NaiveDateTime};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Extensions handled as video containers. Everything else is probed as an image.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "3gp", "3g2"];

/// Seconds between 1904-01-01 (QuickTime epoch) and 1970-01-01.
const QUICKTIME_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Boxes scanned per level before the file is considered malformed.
const MAX_BOXES_PER_LEVEL: usize = 4096;

pub fn is_video_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext))
}

/// Read the movie header creation time, converted to local time.
pub fn read_video_date(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path)
        .map_err(|e| debug!(?path, error = %e, "cannot open video"))
        .ok()?;
    let mut reader = BufReader::new(file);
    match read_mvhd_creation_time(&mut reader) {
        Ok(Some(secs)) => quicktime_to_local(secs),
        Ok(None) => {
            debug!(?path, "no mvhd creation time");
            None
        }
        Err(e) => {
            debug!(?path, error = %e, "malformed video container");
            None
        }
    }
}

fn quicktime_to_local(secs: u64) -> Option<NaiveDateTime> {
    // Zero is what most encoders write when the time is unknown.
    if secs == 0 {
        return None;
    }
    let unix = i64::try_from(secs).ok()? - QUICKTIME_EPOCH_OFFSET;
    let utc = DateTime::from_timestamp(unix, 0)?;
    Some(utc.with_timezone(&chrono::Local).naive_local())
}

struct BoxHeader {
    kind: [u8; 4],
    /// 8, or 16 with a 64-bit large size.
    header_len: u64,
    /// Payload length, `None` when the box runs to the end of its parent.
    payload: Option<u64>,
}

fn read_box_header<R: Read>(r: &mut R) -> io::Result<Option<BoxHeader>> {
    let mut head = [0u8; 8];
    match r.read_exact(&mut head) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let size = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as u64;
    let kind = [head[4], head[5], head[6], head[7]];

    let (header_len, payload) = match size {
        0 => (8, None),
        1 => {
            let mut large = [0u8; 8];
            r.read_exact(&mut large)?;
            let size = u64::from_be_bytes(large);
            (16, Some(size.checked_sub(16).ok_or_else(|| invalid("box smaller than its header"))?))
        }
        _ => (8, Some(size.checked_sub(8).ok_or_else(|| invalid("box smaller than its header"))?)),
    };
    Ok(Some(BoxHeader {
        kind,
        header_len,
        payload,
    }))
}

/// Walk `moov` -> `mvhd` and return the raw creation time field.
fn read_mvhd_creation_time<R: Read + Seek>(r: &mut R) -> io::Result<Option<u64>> {
    let Some(moov_len) = find_box(r, b"moov", None)? else {
        return Ok(None);
    };
    if find_box(r, b"mvhd", moov_len)?.is_none() {
        return Ok(None);
    }

    let mut version_flags = [0u8; 4];
    r.read_exact(&mut version_flags)?;
    let secs = if version_flags[0] == 1 {
        let mut buf = [0u8; 8];
        r.read_exact(&mut buf)?;
        u64::from_be_bytes(buf)
    } else {
        let mut buf = [0u8; 4];
        r.read_exact(&mut buf)?;
        u32::from_be_bytes(buf) as u64
    };
    Ok(Some(secs))
}

/// Advance to the payload of the first `kind` box within `limit` bytes.
/// Returns the payload length (`Some(None)` for run-to-end boxes).
fn find_box<R: Read + Seek>(
    r: &mut R,
    kind: &[u8; 4],
    limit: Option<u64>,
) -> io::Result<Option<Option<u64>>> {
    let mut consumed = 0u64;
    for _ in 0..MAX_BOXES_PER_LEVEL {
        if limit.is_some_and(|l| consumed >= l) {
            return Ok(None);
        }
        let Some(header) = read_box_header(r)? else {
            return Ok(None);
        };
        if &header.kind == kind {
            return Ok(Some(header.payload));
        }
        let Some(payload) = header.payload else {
            return Ok(None);
        };
        let skip = i64::try_from(payload).map_err(|_| invalid("box too large"))?;
        r.seek(SeekFrom::Current(skip))?;
        consumed += payload + header.header_len;
    }
    Err(invalid("too many boxes"))
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}
