use chrono::{Datelike, NaiveDate, Weekday};

/// Saturday and Sunday are the non-working days. Regional holiday
/// calendars are out of scope for now.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Advances `base` until `n` non-weekend days have been counted.
/// `n = 0` returns `base` unchanged, even if `base` itself is a weekend.
pub fn add_workdays(base: NaiveDate, n: u32) -> NaiveDate {
    let mut date = base;
    let mut remaining = n;
    while remaining > 0 {
        match date.succ_opt() {
            Some(next) => date = next,
            None => return date,
        }
        if !is_weekend(date) {
            remaining -= 1;
        }
    }
    date
}

/// Calendar-day identifier used as the idempotence partition for
/// notifications. Two timestamps on the same day yield the same key.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Reads the `YYYY-MM-DD` prefix of a loosely formatted timestamp.
/// Lifecycle dates come from the CRUD layer as free text; anything that
/// does not parse means "skip this entity", so the result is an Option
/// rather than an error.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let prefix = trimmed.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Whole-day difference `b - a`, or None when either side fails to
/// parse. Callers must treat None as "skip", never as zero.
pub fn diff_calendar_days(a: &str, b: &str) -> Option<i64> {
    let from = parse_day(a)?;
    let to = parse_day(b)?;
    Some((to - from).num_days())
}

/// Expands an inclusive date range into one entry per day. An inverted
/// range yields an empty list.
pub fn expand_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut current = start;
    while current <= end {
        out.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }
    out
}

/// Next occurrence of a recorded birth month/day on or after `today`.
/// Feb 29 birthdays roll over to Mar 1 in non-leap years, matching how
/// the imported personnel records have always been interpreted.
pub fn next_birthday(birth: &str, today: NaiveDate) -> Option<NaiveDate> {
    let born = parse_day(birth)?;
    let this_year = anniversary(born, today.year());
    if this_year >= today {
        Some(this_year)
    } else {
        Some(anniversary(born, today.year() + 1))
    }
}

fn anniversary(born: NaiveDate, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, born.month(), born.day())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 3, 1).expect("Mar 1 is always valid"))
}
