//! ISO-8601 recognition for event strings.
//!
//! A date comes first, as a calendar date (`YYYY`, `YYYY-MM`, `YYYY-MM-DD`,
//! `YYYYMMDD`), a week date (`YYYY-Www`, `YYYY-Www-D`, `YYYYWww`, `YYYYWwwD`)
//! or an ordinal date (`YYYY-DDD`, `YYYYDDD`). Anything after it is one
//! separator character of any kind and a time of day: `HH`, `HH:MM`,
//! `HH:MM:SS`, `HHMM` or `HHMMSS`. Seconds may carry a `.` or `,` fraction,
//! and the time may end in `Z`, `z`, `±HH`, `±HHMM` or `±HH:MM`. `24:00` is
//! midnight of the following day.
//!
//! Numeric fields are read leniently: surrounding whitespace, one sign and
//! `_` between digits are tolerated, so `2020 10` is day 10 of 2020.
use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

/// Fraction digits kept; anything finer is truncated.
const FRACTION_DIGITS: usize = 6;

/// True when `text` parses as an ISO-8601 date or date-time.
pub fn is_iso8601(text: &str) -> bool {
    parse(text).is_some()
}

pub fn parse(text: &str) -> Option<(NaiveDateTime, Option<FixedOffset>)> {
    if !text.is_ascii() {
        return None;
    }
    let bytes = text.as_bytes();
    // A well-formed calendar date is final; invalid values do not fall
    // through to the week and ordinal forms.
    let (date, end) = match calendar_fields(bytes) {
        Some(((year, month, day), end)) => (calendar_date(year, month, day)?, end),
        None => week_or_ordinal_date(bytes)?,
    };
    if bytes.len() <= end {
        return Some((date.and_time(NaiveTime::MIN), None));
    }
    let clock = time_of_day(&bytes[end + 1..])?;
    let date_time = match clock.hour {
        24 => within_years(date.succ_opt()?)?.and_time(NaiveTime::MIN),
        hour => date.and_time(NaiveTime::from_hms_micro_opt(
            u32::try_from(hour).ok()?,
            u32::try_from(clock.minute).ok()?,
            u32::try_from(clock.second).ok()?,
            u32::try_from(clock.micros).ok()?,
        )?),
    };
    Some((date_time, clock.offset))
}

struct Clock {
    hour: i64,
    minute: i64,
    second: i64,
    micros: i64,
    offset: Option<FixedOffset>,
}

/// `bytes[start..end]`, clamped to the input.
fn window(bytes: &[u8], start: usize, end: usize) -> &[u8] {
    let len = bytes.len();
    &bytes[start.min(len)..end.min(len)]
}

/// Reads a numeric field, allowing surrounding whitespace, one leading sign
/// and single underscores between digits.
fn int(field: &[u8]) -> Option<i64> {
    let is_space = |b: &u8| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c);
    let start = field.iter().position(|b| !is_space(b))?;
    let end = field.iter().rposition(|b| !is_space(b))? + 1;
    let (negative, digits) = match &field[start..end] {
        [b'-', digits @ ..] => (true, digits),
        [b'+', digits @ ..] => (false, digits),
        digits => (false, digits),
    };
    match (digits.first(), digits.last()) {
        (Some(first), Some(last)) if first.is_ascii_digit() && last.is_ascii_digit() => {}
        _ => return None,
    }
    let mut value: i64 = 0;
    let mut underscore = false;
    for &b in digits {
        match b {
            b'0'..=b'9' => {
                value = value.checked_mul(10)?.checked_add(i64::from(b - b'0'))?;
                underscore = false;
            }
            b'_' if !underscore => underscore = true,
            _ => return None,
        }
    }
    Some(if negative { -value } else { value })
}

fn checked_year(year: i64) -> Option<i32> {
    if (1..=9999).contains(&year) {
        i32::try_from(year).ok()
    } else {
        None
    }
}

fn calendar_date(year: i64, month: i64, day: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        checked_year(year)?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )
}

fn within_years(date: NaiveDate) -> Option<NaiveDate> {
    checked_year(i64::from(date.year())).map(|_| date)
}

/// `YYYY`, `YYYY-MM`, `YYYY-MM-DD` or `YYYYMMDD`, unvalidated, with the index
/// just past the date.
fn calendar_fields(bytes: &[u8]) -> Option<((i64, i64, i64), usize)> {
    let len = bytes.len();
    if len < 4 {
        return None;
    }
    let year = int(&bytes[..4])?;
    let mut pos = 4;
    if pos >= len {
        return Some(((year, 1, 1), pos));
    }
    let dashed = bytes[pos] == b'-';
    if dashed {
        pos += 1;
    }
    if len - pos < 2 {
        return None;
    }
    let month = int(&bytes[pos..pos + 2])?;
    pos += 2;
    if pos >= len {
        // YYYYMM is not a calendar date
        return if dashed {
            Some(((year, month, 1), pos))
        } else {
            None
        };
    }
    if dashed {
        if bytes[pos] != b'-' {
            return None;
        }
        pos += 1;
    }
    if len - pos < 2 {
        return None;
    }
    let day = int(&bytes[pos..pos + 2])?;
    Some(((year, month, day), pos + 2))
}

fn week_or_ordinal_date(bytes: &[u8]) -> Option<(NaiveDate, usize)> {
    if bytes.len() < 4 {
        return None;
    }
    let year = int(&bytes[..4])?;
    let dashed = bytes.get(4) == Some(&b'-');
    let mut pos = 4 + usize::from(dashed);

    if bytes.get(pos) == Some(&b'W') {
        pos += 1;
        let week = int(window(bytes, pos, pos + 2))?;
        pos += 2;
        let mut day = 1;
        if bytes.len() > pos {
            if (bytes[pos] == b'-') != dashed {
                return None;
            }
            pos += usize::from(dashed);
            day = int(window(bytes, pos, pos + 1))?;
            pos += 1;
        }
        return Some((week_date(year, week, day)?, pos));
    }

    if bytes.len().saturating_sub(pos) < 3 {
        return None;
    }
    let ordinal = int(&bytes[pos..pos + 3])?;
    let date = NaiveDate::from_yo_opt(checked_year(year)?, u32::try_from(ordinal).ok()?)?;
    Some((date, pos + 3))
}

/// Counts from the Monday of the week holding 4 January. Week 53 is accepted
/// for every year and may land in the next one.
fn week_date(year: i64, week: i64, day: i64) -> Option<NaiveDate> {
    if !(1..=53).contains(&week) || !(1..=7).contains(&day) {
        return None;
    }
    let january_4 = NaiveDate::from_ymd_opt(checked_year(year)?, 1, 4)?;
    let monday = january_4.checked_sub_signed(Duration::days(i64::from(
        january_4.weekday().num_days_from_monday(),
    )))?;
    let date = monday.checked_add_signed(Duration::days((week - 1) * 7 + day - 1))?;
    within_years(date)
}

fn time_of_day(bytes: &[u8]) -> Option<Clock> {
    let len = bytes.len();
    if len < 2 {
        return None;
    }
    let mut fields = [0i64; 3];
    let mut micros = 0;
    let mut offset = None;
    let mut pos = 0;
    let mut colons = false;

    // hour, minute, second, fraction, then two idle slots before giving up
    for component in 0..6 {
        if pos >= len {
            break;
        }
        if matches!(bytes[pos], b'-' | b'+' | b'Z' | b'z') {
            offset = Some(utc_offset(&bytes[pos..])?);
            pos = len;
            break;
        }
        if component == 1 && bytes[pos] == b':' {
            colons = true;
            pos += 1;
        } else if component == 2 && colons {
            if bytes[pos] != b':' {
                return None;
            }
            pos += 1;
        }
        match component {
            0..=2 => {
                fields[component] = int(window(bytes, pos, pos + 2))?;
                pos += 2;
            }
            3 => {
                if let Some((value, consumed)) = fraction(&bytes[pos..]) {
                    micros = value;
                    pos += consumed;
                }
            }
            _ => {}
        }
    }
    if pos < len {
        return None;
    }

    let [hour, minute, second] = fields;
    if hour == 24 && (minute != 0 || second != 0 || micros != 0) {
        return None;
    }
    Some(Clock {
        hour,
        minute,
        second,
        micros,
        offset,
    })
}

/// A `.` or `,` and at least one digit. Returns microseconds and the bytes
/// consumed; every digit is consumed even past microsecond precision.
fn fraction(bytes: &[u8]) -> Option<(i64, usize)> {
    match bytes.first() {
        Some(b'.') | Some(b',') => {}
        _ => return None,
    }
    let digits = bytes[1..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let kept = &bytes[1..1 + digits.min(FRACTION_DIGITS)];
    let mut micros = int(kept)?;
    for _ in kept.len()..FRACTION_DIGITS {
        micros *= 10;
    }
    Some((micros, 1 + digits))
}

fn utc_offset(bytes: &[u8]) -> Option<FixedOffset> {
    if bytes == b"Z" || bytes == b"z" {
        return FixedOffset::east_opt(0);
    }
    if !matches!(bytes.len(), 3 | 5 | 6) {
        return None;
    }
    let sign = match bytes[0] {
        b'-' => -1,
        b'+' => 1,
        _ => return None,
    };
    let hours = int(&bytes[1..3])?;
    let minutes = match bytes.len() {
        3 => 0,
        _ if bytes[3] == b':' => int(&bytes[4..])?,
        _ => int(&bytes[3..])?,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(i32::try_from(sign * (hours * 60 + minutes) * 60).ok()?)
}
