//! The local calendar day a digest covers.
//!
//! Every date comparison in the crate goes through [`DayWindow`]: timestamps
//! are converted to instants and compared against `[local midnight, next local
//! midnight)` in the report timezone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::model::{CalendarEvent, StatusMovement};

/// Half-open window `[start, end)` covering one calendar day in a timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayWindow {
    date: NaiveDate,
    tz: Tz,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
}

impl DayWindow {
    pub fn new(date: NaiveDate, tz: Tz) -> Self {
        let next = date.succ_opt().unwrap_or(NaiveDate::MAX);
        DayWindow {
            date,
            tz,
            start: local_midnight(date, tz),
            end: local_midnight(next, tz),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end.with_timezone(&Utc)
    }

    /// Whether a point in time falls on this day.
    pub fn contains<T: TimeZone>(&self, at: &DateTime<T>) -> bool {
        let at = at.with_timezone(&Utc);
        at >= self.start_utc() && at < self.end_utc()
    }

    /// Whether `[start, end)` overlaps this day. An empty range is treated as
    /// a point at `start`.
    pub fn overlaps<A: TimeZone, B: TimeZone>(&self, start: &DateTime<A>, end: &DateTime<B>) -> bool {
        let start = start.with_timezone(&Utc);
        let end = end.with_timezone(&Utc);

        if end <= start {
            return self.contains(&start);
        }

        start < self.end_utc() && end > self.start_utc()
    }

    /// Keep the point-in-time items that happened on this day.
    pub fn points<I: Timestamped>(&self, items: impl IntoIterator<Item = I>) -> Vec<I> {
        items
            .into_iter()
            .filter(|item| self.contains(&item.timestamp()))
            .collect()
    }

    /// Keep the ranged items that overlap this day.
    pub fn spans<I: Spanning>(&self, items: impl IntoIterator<Item = I>) -> Vec<I> {
        items
            .into_iter()
            .filter(|item| {
                let (start, end) = item.span();
                self.overlaps(&start, &end)
            })
            .collect()
    }
}

/// Items anchored at a single instant.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Items covering a range of time.
pub trait Spanning {
    fn span(&self) -> (DateTime<Utc>, DateTime<Utc>);
}

impl Timestamped for StatusMovement {
    fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }
}

impl Spanning for CalendarEvent {
    fn span(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start.with_timezone(&Utc), self.end.with_timezone(&Utc))
    }
}

/// First instant of `date` in `tz`.
fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Tz> {
    resolve_local(date.and_time(NaiveTime::MIN), tz)
}

/// Pin a wall-clock time to an instant in `tz`.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times that
/// do not exist (DST spring-forward) are read with the offset in force before
/// the jump, so a skipped midnight becomes the moment the clocks jump.
pub(crate) fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    tz.from_local_datetime(&naive).earliest().unwrap_or_else(|| {
        let offset_before = tz
            .offset_from_utc_datetime(&(naive - Duration::days(1)))
            .fix()
            .local_minus_utc();
        tz.from_utc_datetime(&(naive - Duration::seconds(i64::from(offset_before))))
    })
}
