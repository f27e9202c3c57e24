//! ICS feed parsing using the icalendar crate's parser.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar},
};
use tracing::debug;

use super::{EventTime, FeedEvent, sanitize};
use crate::error::{DigestError, DigestResult, Service};

const UNTITLED: &str = "(no title)";

/// Parse a whole feed into its VEVENTs.
///
/// VEVENTs without a usable DTSTART are skipped; anything that is not
/// iCalendar data at all is a malformed response.
pub fn parse_feed(content: &str) -> DigestResult<Vec<FeedEvent>> {
    let sanitized = sanitize(content);

    if !sanitized.contains("BEGIN:VCALENDAR") {
        return Err(DigestError::malformed(
            Service::Calendar,
            "feed does not contain a VCALENDAR",
        ));
    }

    let calendar = read_calendar(&sanitized).map_err(|e| {
        DigestError::malformed(Service::Calendar, format!("invalid iCalendar data: {e}"))
    })?;

    let mut vevents = Vec::new();
    collect_vevents(&calendar.components, &mut vevents);

    Ok(vevents.into_iter().filter_map(parse_vevent).collect())
}

fn collect_vevents<'a>(components: &'a [Component<'a>], out: &mut Vec<&'a Component<'a>>) {
    for component in components {
        if component.name == "VEVENT" {
            out.push(component);
        } else {
            collect_vevents(&component.components, out);
        }
    }
}

fn parse_vevent(vevent: &Component<'_>) -> Option<FeedEvent> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .unwrap_or_default();

    let Some(start) = vevent.find_prop("DTSTART").and_then(to_event_time) else {
        debug!(uid = %uid, "Skipping VEVENT without a usable DTSTART");
        return None;
    };

    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let end = vevent
        .find_prop("DTEND")
        .and_then(to_event_time)
        .or_else(|| {
            vevent
                .find_prop("DURATION")
                .and_then(|p| parse_duration(p.val.as_ref()))
                .map(|d| start.plus(d))
        })
        .unwrap_or_else(|| start.default_end());

    let cancelled = vevent
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case("CANCELLED"));

    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());

    let exdates: Vec<EventTime> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();

    let recurrence_id = vevent.find_prop("RECURRENCE-ID").and_then(to_event_time);

    Some(FeedEvent {
        uid,
        summary,
        start,
        end,
        cancelled,
        rrule,
        exdates,
        recurrence_id,
    })
}

/// Convert a date/date-time property to an EventTime, preserving its zone.
fn to_event_time(prop: &Property<'_>) -> Option<EventTime> {
    let value = DatePerhapsTime::try_from(prop).ok()?;
    Some(match value {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => EventTime::DateTimeUtc(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            EventTime::DateTimeFloating(naive)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            EventTime::DateTimeZoned {
                datetime: date_time,
                tzid,
            }
        }
    })
}

/// Parse an EXDATE property, which may carry TZID or VALUE=DATE parameters and
/// a comma-separated list of values.
fn parse_exdate_property(prop: &Property<'_>) -> Vec<EventTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| parse_time_value(s, tzid.as_deref(), is_date))
        .collect()
}

fn parse_time_value(value: &str, tzid: Option<&str>, is_date: bool) -> Option<EventTime> {
    if is_date || value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .map(EventTime::Date);
    }

    if let Some(utc) = value.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| EventTime::DateTimeUtc(dt.and_utc()));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    Some(match tzid {
        Some(tz) => EventTime::DateTimeZoned {
            datetime: naive,
            tzid: tz.to_string(),
        },
        None => EventTime::DateTimeFloating(naive),
    })
}

/// Parse a DURATION value (`PT30M`, `P1D`, ...). Negative durations are ignored.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.starts_with('-') {
        return None;
    }
    let duration = iso8601::duration(value.trim_start_matches('+')).ok()?;
    let std_duration: std::time::Duration = duration.into();
    Duration::from_std(std_duration).ok()
}

/// Undo RFC 5545 TEXT escaping. Newlines collapse to spaces since titles are
/// rendered on one line.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push(' '),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
