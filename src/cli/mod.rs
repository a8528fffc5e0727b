//! CLI module for VMux
//!
//! This module handles command-line argument parsing and command execution.

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

/// VMux media exporter
///
/// Assembles ordered video clips with crossfades, mixes in a music bed and
/// exports the result through FFmpeg, preferring hardware encoders with
/// automatic software fallback.
#[derive(Parser)]
#[command(name = "vmux")]
#[command(about = "VMux - assemble clips and music into one export via FFmpeg")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Export a project to a video file
    Export(args::ExportArgs),
    /// Render a short capped preview of a project
    Preview(args::PreviewArgs),
    /// Probe media files for their durations
    Probe(args::ProbeArgs),
    /// Check the external toolchain and GPU encoder availability
    Doctor(args::DoctorArgs),
}
