//! Shared utilities

pub mod time;

pub use time::{format_duration, parse_sexagesimal};
