//! RRULE expansion for recurring events.
//!
//! Expands a master recurring event into the concrete occurrences that can
//! touch a [`DayWindow`], honoring EXDATEs. Overrides (RECURRENCE-ID
//! instances) are applied by the caller.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::error::{DigestError, DigestResult, Service};
use crate::ics::{EventTime, FeedEvent};
use crate::window::{DayWindow, resolve_local};

/// RRULE parts defined by RFC 5545. Anything else is dropped before parsing.
const RRULE_KEYS: [&str; 14] = [
    "FREQ",
    "UNTIL",
    "COUNT",
    "INTERVAL",
    "BYSECOND",
    "BYMINUTE",
    "BYHOUR",
    "BYDAY",
    "BYMONTHDAY",
    "BYYEARDAY",
    "BYWEEKNO",
    "BYMONTH",
    "BYSETPOS",
    "WKST",
];

const MAX_OCCURRENCES: u16 = 366;

/// One generated instance of a recurring event, in the report timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Expand `master` into the occurrences overlapping `window`.
///
/// The rule is evaluated in the zone of the master's DTSTART so wall-clock
/// times stay fixed across DST changes. Non-recurring events yield nothing.
pub fn expand_occurrences(master: &FeedEvent, window: &DayWindow) -> DigestResult<Vec<Occurrence>> {
    let Some(raw_rule) = master.rrule.as_deref() else {
        return Ok(Vec::new());
    };

    let report_tz = window.timezone();
    let zone = master.start.zone(report_tz);

    let Some(rule) = sanitize_rrule(raw_rule, zone) else {
        return Ok(Vec::new());
    };

    let rrule_str = build_rrule_string(master, &rule, zone);
    let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
        DigestError::malformed(
            Service::Calendar,
            format!("failed to parse RRULE for event '{}': {}", master.uid, e),
        )
    })?;

    let first_start = master.start.resolve(report_tz);
    let first_end = master.end.resolve(report_tz);
    let duration = (first_end - first_start).max(Duration::zero());
    let day_span = all_day_span(master);

    // Pad by the duration so occurrences starting the previous day are found,
    // and by a second on each side since after/before are exclusive.
    let rrule_tz: rrule::Tz = zone.into();
    let after = (window.start_utc() - duration - Duration::seconds(1)).with_timezone(&rrule_tz);
    let before = (window.end_utc() + Duration::seconds(1)).with_timezone(&rrule_tz);

    let result = rrule_set.after(after).before(before).all(MAX_OCCURRENCES);

    let occurrences = result
        .dates
        .iter()
        .map(|occ| {
            let start = occ.with_timezone(&report_tz);
            let end = match day_span {
                Some(days) => {
                    let last = occ.naive_local().date() + Duration::days(days);
                    resolve_local(last.and_time(NaiveTime::MIN), zone).with_timezone(&report_tz)
                }
                None => start + duration,
            };
            Occurrence { start, end }
        })
        .filter(|occ| window.overlaps(&occ.start, &occ.end))
        .collect();

    Ok(occurrences)
}

/// Keep only RFC 5545 parts and pin UNTIL to UTC, which is what the rrule
/// parser requires once DTSTART carries a TZID. Returns None when no usable
/// rule remains.
fn sanitize_rrule(rule: &str, zone: Tz) -> Option<String> {
    let parts: Vec<String> = rule
        .trim()
        .trim_start_matches("RRULE:")
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let key = key.trim().to_ascii_uppercase();
            if !RRULE_KEYS.contains(&key.as_str()) {
                return None;
            }
            let value = value.trim();
            let value = if key == "UNTIL" {
                until_in_utc(value, zone)
            } else {
                value.to_string()
            };
            Some(format!("{key}={value}"))
        })
        .collect();

    if parts.iter().any(|p| p.starts_with("FREQ=")) {
        Some(parts.join(";"))
    } else {
        None
    }
}

fn until_in_utc(value: &str, zone: Tz) -> String {
    if value.ends_with('Z') {
        return value.to_string();
    }

    let local = if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        // Date-only UNTIL is inclusive of the whole day
        date.and_hms_opt(23, 59, 59)
    } else {
        NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()
    };

    match local {
        Some(naive) => resolve_local(naive, zone)
            .with_timezone(&Utc)
            .format("%Y%m%dT%H%M%SZ")
            .to_string(),
        None => value.to_string(),
    }
}

/// Build an iCalendar-format rule set for the rrule parser, with DTSTART and
/// EXDATEs written in `zone`.
fn build_rrule_string(master: &FeedEvent, rule: &str, zone: Tz) -> String {
    let mut lines = vec![format_time_line("DTSTART", &master.start, zone)];
    lines.push(format!("RRULE:{rule}"));
    for exdate in &master.exdates {
        lines.push(format_time_line("EXDATE", exdate, zone));
    }
    lines.join("\n")
}

fn format_time_line(name: &str, time: &EventTime, zone: Tz) -> String {
    let local = time.resolve(zone);
    if zone == Tz::UTC {
        format!("{}:{}", name, local.format("%Y%m%dT%H%M%SZ"))
    } else {
        format!("{};TZID={}:{}", name, zone.name(), local.format("%Y%m%dT%H%M%S"))
    }
}

/// Whole-day length of an all-day master, None for timed events.
fn all_day_span(master: &FeedEvent) -> Option<i64> {
    match (&master.start, &master.end) {
        (EventTime::Date(start), EventTime::Date(end)) => Some((*end - *start).num_days().max(1)),
        (EventTime::Date(_), _) => Some(1),
        _ => None,
    }
}
