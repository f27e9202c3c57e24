//! Report data model.
//!
//! Fetchers convert API responses into these types and the renderer works
//! exclusively with them. Nothing here outlives a single run.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// A pull request the user was involved in on the target day.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestSummary {
    pub title: String,
    /// Repository as `owner/name`
    pub repo: String,
    pub state: PrState,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrState::Open => "open",
            PrState::Closed => "closed",
            PrState::Merged => "merged",
        };
        f.write_str(s)
    }
}

/// An assigned issue currently sitting in one of the tracked statuses.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueSummary {
    pub key: String,
    pub title: String,
    /// Status bucket (one of the tracked status names)
    pub status: String,
}

/// A status transition recorded in an issue's changelog.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMovement {
    pub issue_key: String,
    pub issue_title: String,
    pub from: String,
    pub to: String,
    pub at: DateTime<Utc>,
}

/// Current issues plus the movements that happened on the target day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueReport {
    pub current: Vec<IssueSummary>,
    pub movements: Vec<StatusMovement>,
}

/// One concrete calendar occurrence, expressed in the report timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub all_day: bool,
}

/// Everything the renderer needs for one report.
#[derive(Debug, Clone)]
pub struct Digest {
    pub date: NaiveDate,
    pub timezone: Tz,
    /// Tracked status names in their declared order
    pub status_order: Vec<String>,
    pub pull_requests: Vec<PullRequestSummary>,
    pub issues: IssueReport,
    pub events: Vec<CalendarEvent>,
}
