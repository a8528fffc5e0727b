//! External tool presence checks
//!
//! The pipeline shells out to ffmpeg/ffprobe/ffplay; the UI layer asks for
//! their presence up front so it can disable the matching actions.

use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{VmuxError, VmuxResult};

/// Availability of the external toolchain
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dependencies {
    /// Encoder engine
    pub has_ffmpeg: bool,
    /// Duration/stream prober
    pub has_ffprobe: bool,
    /// Preview player (optional)
    pub has_ffplay: bool,
}

/// Returns true if `name -version` runs successfully.
pub fn has_tool(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Check the whole toolchain at once.
pub fn check_dependencies() -> Dependencies {
    Dependencies {
        has_ffmpeg: has_tool("ffmpeg"),
        has_ffprobe: has_tool("ffprobe"),
        has_ffplay: has_tool("ffplay"),
    }
}

/// Error out early when a required tool is absent, before any pipeline work.
pub fn require(tool: &str) -> VmuxResult<()> {
    if has_tool(tool) {
        Ok(())
    } else {
        Err(VmuxError::ToolMissing {
            tool: tool.to_string(),
        })
    }
}
