//! Error handling module for VMux

use thiserror::Error;

/// Main error type for VMux operations
#[derive(Error, Debug)]
pub enum VmuxError {
    /// Required external tool is not installed
    #[error("Required tool not found on PATH: {tool}")]
    ToolMissing { tool: String },

    /// Per-file probe failure (non-fatal to a batch)
    #[error("Failed to probe {path}: {reason}")]
    ProbeFailure { path: String, reason: String },

    /// Render plan rejected before any process was launched
    #[error("Invalid render plan: {reason}")]
    InvalidPlan { reason: String },

    /// One encoder candidate failed; consumed internally by the fallback loop
    #[error("Encoder {encoder} exited with code {code}: {diagnostic}")]
    EncoderExitFailure {
        encoder: String,
        code: i32,
        diagnostic: String,
    },

    /// Every candidate, including the software encoder, failed
    #[error("No capable encoder: last attempt ({encoder}) failed: {diagnostic}")]
    NoCapableEncoder { encoder: String, diagnostic: String },

    /// An export or preview is already running
    #[error("An encode job is already running; cancel it before starting another")]
    JobBusy,

    /// Project file could not be read or parsed
    #[error("Failed to load project: {message}")]
    ProjectError { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for VMux operations
pub type VmuxResult<T> = std::result::Result<T, VmuxError>;
