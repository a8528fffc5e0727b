//! Render engine: ffmpeg command assembly, subprocess supervision,
//! encoder fallback and cancellation

pub mod command;
pub mod job;
pub mod orchestrator;
pub mod process;
pub mod progress;

pub use job::{CancelToken, JobGuard, JobRegistry};
pub use orchestrator::{JobState, Orchestrator, RenderOutcome};
pub use process::{EncodeBackend, EncodeChild, ExitReport, FfmpegBackend};
pub use progress::{ProgressEmitter, ProgressParser};
