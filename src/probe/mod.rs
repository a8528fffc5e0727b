//! Media probing: per-file durations and external tool presence

pub mod prober;
pub mod tools;

pub use prober::{DurationProber, ProbeOutcome};
pub use tools::{check_dependencies, Dependencies};
