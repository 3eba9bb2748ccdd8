//! Tolerant parsing for the `Expires` attribute.
//!
//! Servers emit cookie dates in every format that has ever been popular,
//! so this follows the forgiving scan that interoperable clients use
//! rather than a strict grammar: split the input into tokens, then claim
//! the first plausible time-of-day, day, month, and year in whatever
//! order they appear.

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Parses a cookie date, returning `None` if no date can be extracted.
///
/// Handles the three classic HTTP shapes (`Sun, 06 Nov 1994 08:49:37 GMT`,
/// `Sunday, 06-Nov-94 08:49:37 GMT`, `Sun Nov  6 08:49:37 1994`) along
/// with the long tail of variants that differ only in delimiters or
/// trailing junk. Two-digit years 0-69 land in the 2000s, 70-99 in the
/// 1900s. Dates before 1601 and impossible calendar dates are rejected.
pub(crate) fn parse_cookie_date(input: &str) -> Option<OffsetDateTime> {
    let mut time_of_day: Option<(u8, u8, u8)> = None;
    let mut day: Option<u8> = None;
    let mut month: Option<Month> = None;
    let mut year: Option<i32> = None;

    for token in input.split(is_delimiter).filter(|t| !t.is_empty()) {
        if time_of_day.is_none() {
            if let Some(found) = parse_time_of_day(token) {
                time_of_day = Some(found);
                continue;
            }
        }
        if day.is_none() {
            if let Some(found) = leading_digits(token, 1, 2) {
                day = Some(found as u8);
                continue;
            }
        }
        if month.is_none() {
            if let Some(found) = parse_month(token) {
                month = Some(found);
                continue;
            }
        }
        if year.is_none() {
            if let Some(found) = leading_digits(token, 2, 4) {
                year = Some(found as i32);
                continue;
            }
        }
    }

    let (hour, minute, second) = time_of_day?;
    let mut year = year?;
    if (70..=99).contains(&year) {
        year += 1900;
    } else if (0..=69).contains(&year) {
        year += 2000;
    }
    if year < 1601 {
        return None;
    }
    let date = Date::from_calendar_date(year, month?, day?).ok()?;
    let time = Time::from_hms(hour, minute, second).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc())
}

/// Date delimiters: everything printable except digits, letters, and `:`.
fn is_delimiter(c: char) -> bool {
    matches!(c, '\x09' | '\x20'..='\x2f' | '\x3b'..='\x40' | '\x5b'..='\x60' | '\x7b'..='\x7e')
}

/// `hh:mm:ss`, each field one or two digits, trailing junk allowed.
fn parse_time_of_day(token: &str) -> Option<(u8, u8, u8)> {
    let bytes = token.as_bytes();
    let mut pos = 0;
    let mut fields = [0u8; 3];
    for (i, field) in fields.iter_mut().enumerate() {
        let start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if !(1..=2).contains(&(pos - start)) {
            return None;
        }
        *field = token[start..pos].parse().ok()?;
        if i < 2 {
            if bytes.get(pos) != Some(&b':') {
                return None;
            }
            pos += 1;
        }
    }
    Some((fields[0], fields[1], fields[2]))
}

/// A run of `min..=max` leading digits, trailing junk allowed.
fn leading_digits(token: &str, min: usize, max: usize) -> Option<u32> {
    let digits = token
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(token.len());
    if !(min..=max).contains(&digits) {
        return None;
    }
    token[..digits].parse().ok()
}

/// Case-insensitive match on the first three characters of a month name.
fn parse_month(token: &str) -> Option<Month> {
    let bytes = token.as_bytes();
    if bytes.len() < 3 {
        return None;
    }
    let mut prefix = [0u8; 3];
    prefix.copy_from_slice(&bytes[..3]);
    prefix.make_ascii_lowercase();
    let month = match &prefix {
        b"jan" => Month::January,
        b"feb" => Month::February,
        b"mar" => Month::March,
        b"apr" => Month::April,
        b"may" => Month::May,
        b"jun" => Month::June,
        b"jul" => Month::July,
        b"aug" => Month::August,
        b"sep" => Month::September,
        b"oct" => Month::October,
        b"nov" => Month::November,
        b"dec" => Month::December,
        _ => return None,
    };
    Some(month)
}
