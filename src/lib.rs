//! VMux media exporter library
//!
//! Assembles ordered video clips with crossfades, mixes in a gain-staged
//! music bed and exports the result through FFmpeg as a subprocess. Hardware
//! encoders are detected at runtime and tried in priority order with
//! automatic software fallback.

pub mod cli;
pub mod config;
pub mod domain;
pub mod encoders;
pub mod engine;
pub mod error;
pub mod export;
pub mod planner;
pub mod probe;
pub mod utils;

// Re-export commonly used types
pub use domain::model::{Clip, Project, Settings, SpeedPreset, Track};
pub use error::{VmuxError, VmuxResult};
pub use export::{ExportOutcome, Exporter};
pub use planner::{build_plan, RenderPlan};
