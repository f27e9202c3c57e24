//! Turn parsed feed events into the concrete occurrences of one day.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::ics::FeedEvent;
use crate::model::CalendarEvent;
use crate::recurrence::expand_occurrences;
use crate::window::DayWindow;

/// Concrete events overlapping `window`, sorted by start, end, then title.
///
/// Recurring masters are expanded; an override (same UID plus RECURRENCE-ID)
/// replaces the occurrence it names, and cancelled events are dropped along
/// with every override of a cancelled series. A master whose RRULE cannot be
/// parsed is skipped with a warning.
pub fn events_on_day(feed: &[FeedEvent], window: &DayWindow) -> Vec<CalendarEvent> {
    let tz = window.timezone();
    let overrides: Vec<&FeedEvent> = feed.iter().filter(|e| e.recurrence_id.is_some()).collect();
    let cancelled_series: HashSet<&str> = feed
        .iter()
        .filter(|e| e.recurrence_id.is_none() && e.cancelled)
        .map(|e| e.uid.as_str())
        .collect();

    let mut events = Vec::new();

    for event in feed.iter().filter(|e| e.recurrence_id.is_none()) {
        if event.cancelled {
            continue;
        }

        if !event.is_recurring() {
            events.push(CalendarEvent {
                title: event.summary.clone(),
                start: event.start.resolve(tz),
                end: event.end.resolve(tz),
                all_day: event.is_all_day(),
            });
            continue;
        }

        let occurrences = match expand_occurrences(event, window) {
            Ok(occurrences) => occurrences,
            Err(e) => {
                warn!(uid = %event.uid, error = %e, "Skipping recurring event");
                continue;
            }
        };

        for occurrence in occurrences {
            let replaced = overrides.iter().any(|o| {
                o.uid == event.uid
                    && o.recurrence_id
                        .as_ref()
                        .is_some_and(|rid| rid.resolve(tz) == occurrence.start)
            });
            if replaced {
                debug!(uid = %event.uid, start = %occurrence.start, "Occurrence replaced by override");
                continue;
            }

            events.push(CalendarEvent {
                title: event.summary.clone(),
                start: occurrence.start,
                end: occurrence.end,
                all_day: event.is_all_day(),
            });
        }
    }

    // Overrides stand on their own: a moved instance may land on this day even
    // when the occurrence it replaces does not.
    for instance in overrides
        .into_iter()
        .filter(|o| !o.cancelled && !cancelled_series.contains(o.uid.as_str()))
    {
        events.push(CalendarEvent {
            title: instance.summary.clone(),
            start: instance.start.resolve(tz),
            end: instance.end.resolve(tz),
            all_day: instance.is_all_day(),
        });
    }

    let mut events = window.spans(events);
    sort_events(&mut events);
    events
}

/// Order by start, then end, then title.
pub fn sort_events(events: &mut [CalendarEvent]) {
    events.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.end.cmp(&b.end))
            .then_with(|| a.title.cmp(&b.title))
    });
}
