//! iCalendar feed handling.
//!
//! Feeds are sanitized, parsed into [`FeedEvent`]s, and later resolved to
//! instants in the report timezone.

mod parse;
mod sanitize;

pub use parse::parse_feed;
pub use sanitize::sanitize;

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use tracing::warn;

use crate::window::resolve_local;

/// A DTSTART/DTEND/EXDATE/RECURRENCE-ID value as written in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    /// All-day value (`VALUE=DATE`)
    Date(NaiveDate),
    /// `...Z` values
    DateTimeUtc(DateTime<chrono::Utc>),
    /// No zone at all; read in the report timezone
    DateTimeFloating(NaiveDateTime),
    /// `TZID=...` values
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// The zone this value's wall-clock time belongs to.
    ///
    /// Unknown TZIDs (e.g. Windows zone names) fall back to `report_tz`.
    pub fn zone(&self, report_tz: Tz) -> Tz {
        match self {
            EventTime::DateTimeUtc(_) => Tz::UTC,
            EventTime::DateTimeZoned { tzid, .. } => parse_tzid(tzid).unwrap_or_else(|| {
                warn!(tzid = %tzid, fallback = report_tz.name(), "Unknown TZID in calendar feed");
                report_tz
            }),
            EventTime::Date(_) | EventTime::DateTimeFloating(_) => report_tz,
        }
    }

    /// Wall-clock time of this value in its own zone.
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            EventTime::Date(d) => d.and_time(NaiveTime::MIN),
            EventTime::DateTimeUtc(dt) => dt.naive_utc(),
            EventTime::DateTimeFloating(dt) => *dt,
            EventTime::DateTimeZoned { datetime, .. } => *datetime,
        }
    }

    /// The instant this value denotes, expressed in `report_tz`.
    pub fn resolve(&self, report_tz: Tz) -> DateTime<Tz> {
        match self {
            EventTime::DateTimeUtc(dt) => dt.with_timezone(&report_tz),
            other => resolve_local(other.naive(), other.zone(report_tz)).with_timezone(&report_tz),
        }
    }

    /// Shift by a duration, keeping the variant (all-day values move by whole days).
    pub fn plus(&self, duration: Duration) -> EventTime {
        match self {
            EventTime::Date(d) => EventTime::Date(*d + Duration::days(duration.num_days().max(1))),
            EventTime::DateTimeUtc(dt) => EventTime::DateTimeUtc(*dt + duration),
            EventTime::DateTimeFloating(dt) => EventTime::DateTimeFloating(*dt + duration),
            EventTime::DateTimeZoned { datetime, tzid } => EventTime::DateTimeZoned {
                datetime: *datetime + duration,
                tzid: tzid.clone(),
            },
        }
    }

    /// Default end when a VEVENT has neither DTEND nor DURATION:
    /// +1 day for all-day starts, +1 hour otherwise.
    pub fn default_end(&self) -> EventTime {
        if self.is_date() {
            self.plus(Duration::days(1))
        } else {
            self.plus(Duration::hours(1))
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} ({})", datetime.format("%Y-%m-%dT%H:%M:%S"), tzid)
            }
        }
    }
}

/// A VEVENT as read from the feed, before recurrence expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub uid: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub cancelled: bool,
    /// Raw RRULE value (without the `RRULE:` prefix)
    pub rrule: Option<String>,
    pub exdates: Vec<EventTime>,
    /// Set on instance overrides of a recurring series
    pub recurrence_id: Option<EventTime>,
}

impl FeedEvent {
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some() && self.recurrence_id.is_none()
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_date()
    }
}

fn parse_tzid(tzid: &str) -> Option<Tz> {
    tzid.trim_matches('"').parse::<Tz>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chrono_tz::America::{New_York, Sao_Paulo};

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    #[test]
    fn zoned_time_converts_to_report_zone() {
        let time = EventTime::DateTimeZoned {
            datetime: naive("2025-09-19T10:00:00"),
            tzid: "America/New_York".into(),
        };
        let resolved = time.resolve(Sao_Paulo);
        assert_eq!(resolved.to_rfc3339(), "2025-09-19T11:00:00-03:00");
        assert_eq!(time.zone(Sao_Paulo), New_York);
    }

    #[test]
    fn unknown_tzid_falls_back_to_report_zone() {
        let time = EventTime::DateTimeZoned {
            datetime: naive("2025-09-19T10:00:00"),
            tzid: "E. South America Standard Time".into(),
        };
        assert_eq!(time.zone(Sao_Paulo), Sao_Paulo);
        assert_eq!(time.resolve(Sao_Paulo).to_rfc3339(), "2025-09-19T10:00:00-03:00");
    }

    #[test]
    fn floating_and_date_values_use_report_zone() {
        let floating = EventTime::DateTimeFloating(naive("2025-09-19T08:00:00"));
        assert_eq!(floating.resolve(Sao_Paulo).to_rfc3339(), "2025-09-19T08:00:00-03:00");

        let date = EventTime::Date(NaiveDate::from_ymd_opt(2025, 9, 19).unwrap());
        assert_eq!(date.resolve(Sao_Paulo).to_rfc3339(), "2025-09-19T00:00:00-03:00");
    }

    #[test]
    fn default_end_depends_on_kind() {
        let date = EventTime::Date(NaiveDate::from_ymd_opt(2025, 9, 19).unwrap());
        assert_eq!(
            date.default_end(),
            EventTime::Date(NaiveDate::from_ymd_opt(2025, 9, 20).unwrap())
        );

        let utc = EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2025, 9, 19, 12, 0, 0).unwrap());
        assert_eq!(
            utc.default_end(),
            EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2025, 9, 19, 13, 0, 0).unwrap())
        );
    }
}
