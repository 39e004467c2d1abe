//! Primitive field codecs shared by every SCANCO header variant.
//!
//! All multi-byte integers in SCANCO files are little-endian. Floating
//! point values use a legacy VMS-era encoding with swapped 16-bit
//! half-words and an exponent bias that differs from IEEE 754 by a factor
//! of four. Timestamps count 100-nanosecond intervals since the VMS epoch
//! (1858-11-17).

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Offset between the astronomical Julian day (counting from 4713 BC) and
/// the VMS epoch (1858-11-17).
const JULIAN_OFFSET: u64 = 2_400_001;
const MILLIS_PER_SECOND: u64 = 1000;
const MILLIS_PER_MINUTE: u64 = 60 * 1000;
const MILLIS_PER_HOUR: u64 = 3600 * 1000;
const MILLIS_PER_DAY: u64 = 3600 * 24 * 1000;

/// Month abbreviations used by SCANCO date strings; index 0 marks an
/// unknown month.
const MONTHS: [&str; 13] = [
    "XXX", "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

fn ensure_len(data: &[u8], needed: usize, what: &'static str) -> Result<()> {
    if data.len() < needed {
        return Err(Error::truncated(what, (needed - data.len()) as u64));
    }
    Ok(())
}

/// Decode a little-endian 32-bit integer.
pub fn decode_i32(data: &[u8]) -> Result<i32> {
    ensure_len(data, 4, "int32 field")?;
    Ok(LittleEndian::read_i32(&data[..4]))
}

/// Decode a little-endian 64-bit integer.
pub fn decode_i64(data: &[u8]) -> Result<i64> {
    ensure_len(data, 8, "int64 field")?;
    Ok(LittleEndian::read_i64(&data[..8]))
}

/// Encode a 32-bit integer as little-endian bytes.
pub fn encode_i32(value: i32, target: &mut [u8]) {
    LittleEndian::write_i32(&mut target[..4], value);
}

/// Encode a 64-bit integer as little-endian bytes.
pub fn encode_i64(value: i64, target: &mut [u8]) {
    LittleEndian::write_i64(&mut target[..8], value);
}

/// Decode a SCANCO single-precision float.
///
/// The stored half-words are swapped relative to IEEE 754 and the
/// exponent bias differs by two, hence the factor 0.25.
pub fn decode_scanco_float(data: &[u8]) -> Result<f32> {
    ensure_len(data, 4, "float field")?;
    let bits = (u32::from(data[0]) << 16)
        | (u32::from(data[1]) << 24)
        | u32::from(data[2])
        | (u32::from(data[3]) << 8);
    Ok(0.25 * f32::from_bits(bits))
}

/// Encode a SCANCO single-precision float; exact inverse of
/// [`decode_scanco_float`].
pub fn encode_scanco_float(value: f32, target: &mut [u8]) {
    let bits = (value / 0.25).to_bits();
    target[0] = (bits >> 16) as u8;
    target[1] = (bits >> 24) as u8;
    target[2] = bits as u8;
    target[3] = (bits >> 8) as u8;
}

/// Decode a SCANCO double-precision float: two swapped 32-bit words, each
/// with the single-precision byte order, high word first.
pub fn decode_scanco_double(data: &[u8]) -> Result<f64> {
    ensure_len(data, 8, "double field")?;
    let high = (u64::from(data[0]) << 16)
        | (u64::from(data[1]) << 24)
        | u64::from(data[2])
        | (u64::from(data[3]) << 8);
    let low = (u64::from(data[4]) << 16)
        | (u64::from(data[5]) << 24)
        | u64::from(data[6])
        | (u64::from(data[7]) << 8);
    Ok(f64::from_bits((high << 32) | low) * 0.25)
}

/// Encode a SCANCO double-precision float; exact inverse of
/// [`decode_scanco_double`].
pub fn encode_scanco_double(value: f64, target: &mut [u8]) {
    let bits = (value / 0.25).to_bits();
    let high = (bits >> 32) as u32;
    let low = bits as u32;
    target[0] = (high >> 16) as u8;
    target[1] = (high >> 24) as u8;
    target[2] = high as u8;
    target[3] = (high >> 8) as u8;
    target[4] = (low >> 16) as u8;
    target[5] = (low >> 24) as u8;
    target[6] = low as u8;
    target[7] = (low >> 8) as u8;
}

/// A calendar date extracted from a VMS timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDate {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
    pub millis: i32,
}

/// Convert a Julian day number to a Gregorian date.
///
/// Integer algorithm by Henry F. Fliegel and Thomas C. Van Flandern,
/// valid for the Gregorian calendar from October 15, 1582.
fn gregorian_from_julian(julian_day: i64) -> (i32, i32, i32) {
    let mut ell = julian_day + 68569;
    let n = (4 * ell) / 146097;
    ell -= (146097 * n + 3) / 4;
    let i = (4000 * (ell + 1)) / 1461001;
    ell = ell - (1461 * i) / 4 + 31;
    let j = (80 * ell) / 2447;
    let day = ell - (2447 * j) / 80;
    ell = j / 11;
    let month = j + 2 - 12 * ell;
    let year = 100 * (n - 49) + i + ell;
    (year as i32, month as i32, day as i32)
}

/// Convert a Gregorian date to a Julian day number (Fliegel / Van
/// Flandern, inverse of [`gregorian_from_julian`]).
fn julian_from_gregorian(year: i32, month: i32, day: i32) -> i64 {
    let (mut y, mut m) = (i64::from(year), i64::from(month));
    if m <= 2 {
        y -= 1;
        m += 12;
    }
    let a = y / 100;
    let b = 2 - a + a / 4;
    let i1 = (365.25 * (y + 4716) as f64) as i64;
    let i2 = (30.6001 * (m + 1) as f64) as i64;
    // The textbook formula ends in -1524.5, giving the midnight Julian
    // date; the day number the inverse conversion expects is that value
    // rounded up. The VMS epoch 17-NOV-1858 lands exactly on 2400001.
    i1 + i2 + i64::from(day) + b - 1524
}

/// Decode an 8-byte VMS timestamp (100-ns intervals since 1858-11-17).
pub fn decode_vms_date(data: &[u8]) -> Result<CalendarDate> {
    ensure_len(data, 8, "timestamp field")?;
    let ticks = LittleEndian::read_u64(&data[..8]);
    let mut time = ticks / 10000 + JULIAN_OFFSET * MILLIS_PER_DAY;

    let julian_day = (time / MILLIS_PER_DAY) as i64;
    time -= MILLIS_PER_DAY * julian_day as u64;
    let (year, month, day) = gregorian_from_julian(julian_day);

    let hour = (time / MILLIS_PER_HOUR) as i32;
    time -= hour as u64 * MILLIS_PER_HOUR;
    let minute = (time / MILLIS_PER_MINUTE) as i32;
    time -= minute as u64 * MILLIS_PER_MINUTE;
    let second = (time / MILLIS_PER_SECOND) as i32;
    time -= second as u64 * MILLIS_PER_SECOND;

    Ok(CalendarDate {
        year,
        month,
        day,
        hour,
        minute,
        second,
        millis: time as i32,
    })
}

/// Format a calendar date as `DD-MMM-YYYY HH:MM:SS.mmm`.
pub fn format_date(date: &CalendarDate) -> String {
    let month = if date.month < 1 || date.month > 12 {
        0
    } else {
        date.month
    };
    format!(
        "{}-{}-{} {:02}:{:02}:{:02}.{:03}",
        date.day % 100,
        MONTHS[month as usize],
        date.year % 10000,
        date.hour % 100,
        date.minute % 100,
        date.second % 100,
        date.millis % 1000,
    )
}

/// Parse a `DD-MMM-YYYY HH:MM:SS.mmm` string into its components.
///
/// The month abbreviation is matched case-sensitively against the fixed
/// table; unrecognized three-letter tokens become month 0 (`XXX`).
fn parse_date_string(text: &str) -> Option<(i32, i32, i32, i32, i32, i32, i32)> {
    let text = text.trim_end();
    let (date_part, time_part) = text.split_once(' ')?;

    let mut date_fields = date_part.splitn(3, '-');
    let day: i32 = date_fields.next()?.parse().ok()?;
    let month_token = date_fields.next()?;
    let year: i32 = date_fields.next()?.parse().ok()?;
    if month_token.len() != 3 || !month_token.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let month = MONTHS
        .iter()
        .position(|m| *m == month_token)
        .unwrap_or(0) as i32;

    let (clock_part, millis_part) = time_part.rsplit_once('.')?;
    let mut clock_fields = clock_part.splitn(3, ':');
    let hour: i32 = clock_fields.next()?.parse().ok()?;
    let minute: i32 = clock_fields.next()?.parse().ok()?;
    let second: i32 = clock_fields.next()?.parse().ok()?;
    let millis: i32 = millis_part.parse().ok()?;

    Some((year, month, day, hour, minute, second, millis))
}

/// Encode a `DD-MMM-YYYY HH:MM:SS.mmm` date string as an 8-byte VMS
/// timestamp.
pub fn encode_vms_date(date_string: &str, target: &mut [u8]) -> Result<()> {
    let (year, month, day, hour, minute, second, millis) = parse_date_string(date_string)
        .ok_or_else(|| Error::BadDate(date_string.to_string()))?;

    let time_of_day = hour as u64 * MILLIS_PER_HOUR
        + minute as u64 * MILLIS_PER_MINUTE
        + second as u64 * MILLIS_PER_SECOND
        + millis as u64;
    let julian_day = julian_from_gregorian(year, month, day);
    let time = (julian_day as u64).wrapping_mul(MILLIS_PER_DAY) + time_of_day;
    let ticks = time.wrapping_sub(JULIAN_OFFSET * MILLIS_PER_DAY).wrapping_mul(10000);

    LittleEndian::write_u64(&mut target[..8], ticks);
    Ok(())
}

/// The current local wall-clock time formatted as a SCANCO date string.
pub fn current_date_string() -> String {
    use chrono::{Datelike, Local, Timelike};
    let now = Local::now();
    format_date(&CalendarDate {
        year: now.year(),
        month: now.month() as i32,
        day: now.day() as i32,
        hour: now.hour() as i32,
        minute: now.minute() as i32,
        second: now.second() as i32,
        millis: (now.nanosecond() / 1_000_000) as i32,
    })
}

/// Read a fixed-length text field: stop at the first NUL, strip trailing
/// spaces.
pub fn strip_string(source: &[u8]) -> String {
    let end = source.iter().position(|&b| b == 0).unwrap_or(source.len());
    let text = String::from_utf8_lossy(&source[..end]);
    text.trim_end_matches(' ').to_string()
}

/// Write a fixed-length text field: copy the source, space-pad the rest.
pub fn pad_string(target: &mut [u8], source: &str) {
    let bytes = source.as_bytes();
    let n = bytes.len().min(target.len());
    target[..n].copy_from_slice(&bytes[..n]);
    for b in &mut target[n..] {
        *b = b' ';
    }
}
