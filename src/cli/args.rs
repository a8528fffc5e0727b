//! Command-line argument definitions

use clap::Args;
use crate::domain::model::SpeedPreset;

fn volume_percent(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if v < 0.0 {
        return Err(format!("{v} is less than minimum of 0"));
    }
    if v > 110.0 {
        return Err(format!("{v} exceeds maximum of 110"));
    }
    Ok(v)
}

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Project file path (JSON)
    #[arg(short, long)]
    pub project: String,

    /// Destination file path (.mkv, .mp4 or .webm)
    #[arg(short, long)]
    pub output: String,

    /// Override the project's speed preset
    #[arg(long)]
    pub preset: Option<SpeedPreset>,

    /// Force software encoding even when a GPU encoder is available
    #[arg(long)]
    pub no_gpu: bool,

    /// Override the source audio volume (percent, 0-110)
    #[arg(long = "video-volume", value_parser = volume_percent)]
    pub source_volume: Option<f64>,

    /// Override the master track volume (percent, 0-110)
    #[arg(long = "music-volume", value_parser = volume_percent)]
    pub track_volume: Option<f64>,

    /// Emit machine-readable progress events on stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the preview command
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Project file path (JSON)
    #[arg(short, long)]
    pub project: String,

    /// Render the full timeline instead of the capped preview length
    #[arg(long)]
    pub full: bool,

    /// Open the rendered preview with ffplay
    #[arg(long)]
    pub play: bool,
}

/// Arguments for the probe command
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Media files or directories to probe (directories are walked for
    /// supported media)
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the doctor command
#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
