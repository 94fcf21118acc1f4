//! Natural-language time phrases.
//!
//! Resolves phrases such as `tomorrow at 2 PM`, `in 20 minutes`,
//! `on friday at 9am` or `April 2nd at 2:21 AM` against a reference time.
//! All arithmetic is on local wall-clock time.
//!
//! Resolution rules:
//! - A day with no time defaults to 09:00 (`tonight` defaults to 20:00).
//! - A time with no day is today, or tomorrow if that moment has passed.
//! - A weekday is its next occurrence; today counts unless the moment has
//!   passed or the phrase says `next`.
//! - A month and day with no year rolls to next year once passed.
//! - An explicit `today` is never moved, even when already past.
//! - Hours without `am`/`pm` are read on a 24-hour clock, except after
//!   `tonight` where 1-11 means the evening.

use crate::models::time::parse_timestamp;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use regex::{Captures, Regex};
use std::sync::LazyLock;

const DEFAULT_DAY_TIME: (u32, u32) = (9, 0);
const TONIGHT_TIME: (u32, u32) = (20, 0);

const DAY_PATTERN: &str = r"(?P<day>today|tonight|tomorrow|(?:on |this |(?P<next>next ))?(?P<weekday>monday|tuesday|wednesday|thursday|friday|saturday|sunday)|(?:on )?(?P<month>jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?) (?P<mday>\d{1,2})(?:st|nd|rd|th)?(?:,? (?P<year>\d{4}))?)";

const TIME_PATTERN: &str = r"(?:(?P<at>at |by )?(?P<hour>\d{1,2})(?::(?P<minute>\d{2}))? ?(?P<meridiem>am|pm)?|(?:at )?(?P<named>noon|midnight))";

static DAY_THEN_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^(?:{DAY_PATTERN})?(?: ?{TIME_PATTERN})?$"))
        .unwrap_or_else(|_| unreachable!())
});

static TIME_THEN_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{TIME_PATTERN} {DAY_PATTERN}$")).unwrap_or_else(|_| unreachable!())
});

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^in (?P<amount>\d{1,4}|a|an|one|half an) (?P<unit>minutes?|mins?|hours?|hrs?|days?|weeks?)$")
        .unwrap_or_else(|_| unreachable!())
});

/// Leading words dropped from the subject of a reminder.
const FILLER_PREFIXES: &[&str] = &["remind me to ", "remind me ", "remember to ", "to "];

/// Resolves a time phrase against `now`.
///
/// The whole phrase must be a time expression; returns `None` otherwise.
#[must_use]
pub fn parse_time_phrase(phrase: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if let Some(at) = parse_timestamp(phrase) {
        return Some(at);
    }

    let phrase = normalize(phrase);
    if phrase.is_empty() {
        return None;
    }

    if let Some(caps) = RELATIVE.captures(&phrase) {
        return resolve_relative(&caps, now);
    }

    let caps = DAY_THEN_TIME
        .captures(&phrase)
        .or_else(|| TIME_THEN_DAY.captures(&phrase))?;
    resolve_absolute(&caps, now)
}

/// Splits `"call mom tomorrow at 2 PM"` into the subject `"call mom"` and
/// the resolved time.
///
/// The time expression is the longest trailing run of words that parses.
/// Leading filler such as "remind me to" is dropped from the subject.
/// Returns `None` when no trailing time expression exists or the subject
/// would be empty.
#[must_use]
pub fn split_time_phrase(text: &str, now: NaiveDateTime) -> Option<(String, NaiveDateTime)> {
    let words: Vec<&str> = text.split_whitespace().collect();

    (1..words.len()).find_map(|split| {
        let at = parse_time_phrase(&words[split..].join(" "), now)?;
        let subject = strip_filler(words[..split].join(" ").trim_end_matches(','));
        (!subject.is_empty()).then_some((subject, at))
    })
}

fn strip_filler(subject: &str) -> String {
    let lower = subject.to_lowercase();
    FILLER_PREFIXES
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .and_then(|prefix| subject.get(prefix.len()..))
        .unwrap_or(subject)
        .trim()
        .to_string()
}

fn normalize(phrase: &str) -> String {
    let lower = phrase
        .to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace("a.m", "am")
        .replace("p.m", "pm");
    lower
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', ',', '!', '?'])
        .to_string()
}

fn resolve_relative(caps: &Captures<'_>, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let amount = &caps["amount"];
    let unit = &caps["unit"];

    if amount == "half an" {
        return unit
            .starts_with("hour")
            .then(|| now.checked_add_signed(TimeDelta::minutes(30)))
            .flatten();
    }

    let amount: i64 = match amount {
        "a" | "an" | "one" => 1,
        digits => digits.parse().ok()?,
    };

    let delta = if unit.starts_with("min") {
        TimeDelta::try_minutes(amount)
    } else if unit.starts_with('h') {
        TimeDelta::try_hours(amount)
    } else if unit.starts_with("day") {
        TimeDelta::try_days(amount)
    } else {
        TimeDelta::try_weeks(amount)
    }?;

    now.checked_add_signed(delta)
}

fn resolve_absolute(caps: &Captures<'_>, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let day = caps.name("day").map(|m| m.as_str());
    let has_time = caps.name("hour").is_some() || caps.name("named").is_some();
    if day.is_none() && !has_time {
        return None;
    }

    let tonight = day == Some("tonight");
    let time = if has_time {
        resolve_time(caps, tonight)?
    } else if tonight {
        NaiveTime::from_hms_opt(TONIGHT_TIME.0, TONIGHT_TIME.1, 0)?
    } else {
        NaiveTime::from_hms_opt(DEFAULT_DAY_TIME.0, DEFAULT_DAY_TIME.1, 0)?
    };

    let today = now.date();
    match day {
        None => {
            let at = today.and_time(time);
            if at <= now { at.checked_add_signed(TimeDelta::days(1)) } else { Some(at) }
        },
        Some("today" | "tonight") => Some(today.and_time(time)),
        Some("tomorrow") => today.succ_opt().map(|d| d.and_time(time)),
        Some(_) if caps.name("weekday").is_some() => {
            let target = parse_weekday(&caps["weekday"])?;
            let skip_today = caps.name("next").is_some();
            Some(next_weekday(now, target, time, skip_today))
        },
        Some(_) => {
            let month = parse_month(&caps["month"])?;
            let mday: u32 = caps["mday"].parse().ok()?;
            match caps.name("year") {
                Some(year) => {
                    let year: i32 = year.as_str().parse().ok()?;
                    NaiveDate::from_ymd_opt(year, month, mday).map(|d| d.and_time(time))
                },
                None => {
                    let at = NaiveDate::from_ymd_opt(today.year(), month, mday)?.and_time(time);
                    if at < now {
                        NaiveDate::from_ymd_opt(today.year() + 1, month, mday).map(|d| d.and_time(time))
                    } else {
                        Some(at)
                    }
                },
            }
        },
    }
}

fn resolve_time(caps: &Captures<'_>, evening: bool) -> Option<NaiveTime> {
    if let Some(named) = caps.name("named") {
        return match named.as_str() {
            "noon" => NaiveTime::from_hms_opt(12, 0, 0),
            _ => NaiveTime::from_hms_opt(0, 0, 0),
        };
    }

    let hour: u32 = caps["hour"].parse().ok()?;
    let minute: u32 = caps.name("minute").map_or(Some(0), |m| m.as_str().parse().ok())?;
    let meridiem = caps.name("meridiem").map(|m| m.as_str());

    // A bare number is only a time when introduced by "at"/"by" or written as hh:mm.
    if meridiem.is_none() && caps.name("at").is_none() && caps.name("minute").is_none() {
        return None;
    }

    let hour = match meridiem {
        Some(_) if !(1..=12).contains(&hour) => return None,
        Some("am") => hour % 12,
        Some(_) => hour % 12 + 12,
        None if evening && (1..12).contains(&hour) => hour + 12,
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn next_weekday(now: NaiveDateTime, target: Weekday, time: NaiveTime, skip_today: bool) -> NaiveDateTime {
    let today = now.date();
    let mut days_ahead = (i64::from(target.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday()))
    .rem_euclid(7);

    if days_ahead == 0 && (skip_today || today.and_time(time) <= now) {
        days_ahead = 7;
    }

    (today + TimeDelta::days(days_ahead)).and_time(time)
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    s.parse().ok()
}

fn parse_month(s: &str) -> Option<u32> {
    let month = match s.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
