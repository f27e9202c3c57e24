//! Clients for the external services a digest is built from.
//!
//! Each client borrows the shared HTTP client and its own config section,
//! and returns plain model values already filtered to the target day.

pub mod calendar;
pub mod github;
pub mod jira;

pub use calendar::Calendar;
pub use github::GitHub;
pub use jira::Jira;
