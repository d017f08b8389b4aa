//! Strict positional validation for text-protocol DATE / DATETIME /
//! TIME cells.
//!
//! The grammars are fixed byte-position checks, no regex engine. The
//! recognised "zero" forms (`0000-00-00`, `00:00:00`, combined and
//! fractional variants) map to NULL regardless of range validation;
//! anything else that fails validation is reported as `Invalid` so the
//! decoder can substitute a configured value or fall back to the raw
//! text.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Outcome of validating one temporal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Temporal<T> {
    Value(T),
    /// A recognised zero form; decodes to NULL.
    Zero,
    /// Failed validation; the caller substitutes or keeps the text.
    Invalid,
}

fn digit(b: u8) -> Option<u32> {
    b.is_ascii_digit().then(|| u32::from(b - b'0'))
}

fn two_digits(s: &[u8], at: usize) -> Option<u32> {
    Some(digit(*s.get(at)?)? * 10 + digit(*s.get(at + 1)?)?)
}

fn four_digits(s: &[u8], at: usize) -> Option<u32> {
    Some(two_digits(s, at)? * 100 + two_digits(s, at + 2)?)
}

/// `YYYY-MM-DD` structure and field ranges. Calendar validity (e.g.
/// February 30th) is left to the chrono constructor.
fn date_fields(s: &[u8]) -> Temporal<(i32, u32, u32)> {
    if s.len() != 10 || s[4] != b'-' || s[7] != b'-' {
        return Temporal::Invalid;
    }
    let (Some(year), Some(month), Some(day)) =
        (four_digits(s, 0), two_digits(s, 5), two_digits(s, 8))
    else {
        return Temporal::Invalid;
    };
    if year == 0 && month == 0 && day == 0 {
        return Temporal::Zero;
    }
    if year == 0 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Temporal::Invalid;
    }
    Temporal::Value((year as i32, month, day))
}

/// `HH:MM:SS` clock time (hours bounded to a day).
fn clock_fields(s: &[u8]) -> Option<(u32, u32, u32)> {
    if s.len() != 8 || s[2] != b':' || s[5] != b':' {
        return None;
    }
    let hour = two_digits(s, 0)?;
    let minute = two_digits(s, 3)?;
    let second = two_digits(s, 6)?;
    (hour <= 23 && minute <= 59 && second <= 59).then_some((hour, minute, second))
}

/// Optional `.mmm` (milliseconds) or `.mmmmmm` (microseconds) suffix,
/// normalised to microseconds. Empty input means no fraction.
fn fraction_micros(s: &[u8]) -> Option<u32> {
    match s.len() {
        0 => Some(0),
        4 if s[0] == b'.' => {
            let millis = digit(s[1])? * 100 + digit(s[2])? * 10 + digit(s[3])?;
            Some(millis * 1000)
        }
        7 if s[0] == b'.' => {
            let hi = digit(s[1])? * 100 + digit(s[2])? * 10 + digit(s[3])?;
            let lo = digit(s[4])? * 100 + digit(s[5])? * 10 + digit(s[6])?;
            Some(hi * 1000 + lo)
        }
        _ => None,
    }
}

pub(crate) fn parse_date(s: &[u8]) -> Temporal<NaiveDate> {
    match date_fields(s) {
        Temporal::Value((year, month, day)) => match NaiveDate::from_ymd_opt(year, month, day) {
            Some(date) => Temporal::Value(date),
            None => Temporal::Invalid,
        },
        Temporal::Zero => Temporal::Zero,
        Temporal::Invalid => Temporal::Invalid,
    }
}

/// `DATE (' ' | 'T') TIME` with an optional fractional suffix.
pub(crate) fn parse_datetime(s: &[u8]) -> Temporal<NaiveDateTime> {
    if s.len() < 19 || !(s[10] == b' ' || s[10] == b'T') {
        return Temporal::Invalid;
    }
    let Some((hour, minute, second)) = clock_fields(&s[11..19]) else {
        return Temporal::Invalid;
    };
    let Some(micros) = fraction_micros(&s[19..]) else {
        return Temporal::Invalid;
    };
    match date_fields(&s[..10]) {
        Temporal::Value((year, month, day)) => {
            let dt = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|d| d.and_hms_micro_opt(hour, minute, second, micros));
            match dt {
                Some(dt) => Temporal::Value(dt),
                None => Temporal::Invalid,
            }
        }
        // A zero date only combines with a zero time.
        Temporal::Zero if hour == 0 && minute == 0 && second == 0 && micros == 0 => Temporal::Zero,
        Temporal::Zero | Temporal::Invalid => Temporal::Invalid,
    }
}

/// TIME as a signed duration: optional leading `-`, 1 to 3 hour digits
/// (`H:MM:SS` through `HHH:MM:SS`), optional fractional suffix.
pub(crate) fn parse_duration(s: &[u8]) -> Temporal<TimeDelta> {
    let (negative, body) = match s.first() {
        Some(b'-') => (true, &s[1..]),
        _ => (false, s),
    };
    if body.len() < 7 {
        return Temporal::Invalid;
    }
    // Hour digits run up to the first ':', at index 1, 2 or 3.
    let Some(colon) = body.iter().position(|&b| b == b':') else {
        return Temporal::Invalid;
    };
    if !(1..=3).contains(&colon) {
        return Temporal::Invalid;
    }
    let mut hours = 0u32;
    for &b in &body[..colon] {
        let Some(d) = digit(b) else {
            return Temporal::Invalid;
        };
        hours = hours * 10 + d;
    }
    let base_end = colon + 6;
    if body.len() < base_end || body[colon + 3] != b':' {
        return Temporal::Invalid;
    }
    let (Some(minutes), Some(seconds)) =
        (two_digits(body, colon + 1), two_digits(body, colon + 4))
    else {
        return Temporal::Invalid;
    };
    if minutes > 59 || seconds > 59 {
        return Temporal::Invalid;
    }
    let Some(micros) = fraction_micros(&body[base_end..]) else {
        return Temporal::Invalid;
    };
    if hours == 0 && minutes == 0 && seconds == 0 && micros == 0 {
        return Temporal::Zero;
    }
    let total_micros = i64::from(hours * 3600 + minutes * 60 + seconds) * 1_000_000
        + i64::from(micros);
    let total = if negative { -total_micros } else { total_micros };
    Temporal::Value(TimeDelta::microseconds(total))
}
