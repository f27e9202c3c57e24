//! Core types for daily-digest.
//!
//! This crate holds everything that does not talk to the network:
//! - the report data model and error type
//! - `window`, the day filter every timestamp goes through
//! - `ics` and `recurrence` for calendar feeds
//! - `render` for the final text layout

pub mod calendar;
pub mod error;
pub mod ics;
pub mod model;
pub mod recurrence;
pub mod render;
pub mod window;

pub use calendar::events_on_day;
pub use error::{DigestError, DigestResult, Service};
pub use model::*;
pub use render::render;
pub use window::DayWindow;
