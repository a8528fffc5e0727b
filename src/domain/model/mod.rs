//! Project data model
//!
//! These types mirror the JSON project format written by the editor UI:
//! ordered clip paths, ordered track entries and the settings block. Probed
//! durations are never persisted; they are filled in by the duration prober
//! after a project is loaded.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{VmuxError, VmuxResult};

/// Video container extensions accepted as clip inputs
pub const SUPPORTED_VIDEO: &[&str] = &["mp4", "mkv", "mov", "avi", "webm"];

/// Audio container extensions accepted as track inputs
pub const SUPPORTED_AUDIO: &[&str] = &["mp3", "wav", "flac", "aac", "ogg"];

/// Hard ceiling on any gain value (110% amplification)
pub const MAX_GAIN: f64 = 1.1;

/// Returns true if the path has a recognized video or audio extension.
pub fn is_supported_media(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_VIDEO.contains(&ext.as_str()) || SUPPORTED_AUDIO.contains(&ext.as_str())
        }
        None => false,
    }
}

/// One input video file placed in the assembly order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Source file path
    pub path: String,
    /// Display name (defaults to the file name)
    #[serde(default)]
    pub name: String,
    /// Probed duration in seconds; unset until probed, never persisted
    #[serde(skip)]
    pub duration: Option<f64>,
}

impl Clip {
    /// Create a clip for a path, with the display name derived from it
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        Self {
            path,
            name,
            duration: None,
        }
    }
}

/// One input audio file available for mixing into the export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Source file path
    pub path: String,
    /// Display name (defaults to the file name)
    #[serde(default)]
    pub name: String,
    /// Volume fraction in [0.0, 1.1]
    #[serde(default = "default_track_gain")]
    pub volume: f64,
    /// Muted tracks never contribute audio, even when soloed
    #[serde(default)]
    pub mute: bool,
    /// When any track is soloed, only soloed tracks contribute
    #[serde(default)]
    pub solo: bool,
    /// Probed duration in seconds; unset until probed, never persisted
    #[serde(skip)]
    pub duration: Option<f64>,
}

impl Track {
    /// Create a track with default volume and flags
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        Self {
            path,
            name,
            volume: 1.0,
            mute: false,
            solo: false,
            duration: None,
        }
    }
}

fn default_track_gain() -> f64 {
    1.0
}

fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Encoder speed/quality trade-off selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    Ultrafast,
    Fast,
    Balanced,
    Quality,
}

impl SpeedPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedPreset::Ultrafast => "ultrafast",
            SpeedPreset::Fast => "fast",
            SpeedPreset::Balanced => "balanced",
            SpeedPreset::Quality => "quality",
        }
    }
}

impl Default for SpeedPreset {
    fn default() -> Self {
        SpeedPreset::Balanced
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeedPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ultrafast" => Ok(SpeedPreset::Ultrafast),
            "fast" => Ok(SpeedPreset::Fast),
            "balanced" => Ok(SpeedPreset::Balanced),
            "quality" => Ok(SpeedPreset::Quality),
            other => Err(format!(
                "unknown speed preset '{}' (expected ultrafast, fast, balanced or quality)",
                other
            )),
        }
    }
}

/// Output container, derived from the destination extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Matroska: H.264 + AAC
    Matroska,
    /// MP4: H.264 + AAC
    Mp4,
    /// WebM: VP9 + Vorbis
    WebM,
}

impl OutputFormat {
    /// Pick the container from a destination path; unknown extensions fall
    /// back to Matroska.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("webm") => OutputFormat::WebM,
            Some("mp4") => OutputFormat::Mp4,
            _ => OutputFormat::Matroska,
        }
    }
}

/// Export settings, serialized verbatim into the project JSON
///
/// Field names on the wire match the editor's format exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Include the clips' own audio in the mix
    #[serde(rename = "video_audio", default = "default_true")]
    pub include_source_audio: bool,
    /// Include the music tracks in the mix
    #[serde(rename = "music_audio", default = "default_true")]
    pub include_tracks: bool,
    /// Crossfade between adjacent music tracks, seconds in [1, 20]
    #[serde(rename = "cross_fade_audio", default = "default_audio_crossfade")]
    pub audio_crossfade_seconds: f64,
    /// Crossfade between adjacent clips, seconds in [0, 5]
    #[serde(rename = "cross_fade_video", default = "default_video_crossfade")]
    pub video_crossfade_seconds: f64,
    /// Truncate the music bed at the end of the video
    #[serde(rename = "cut_music", default)]
    pub cut_tracks_at_clip_end: bool,
    /// Source audio volume, percent in [0, 110]
    #[serde(rename = "video_volume", default = "default_source_volume")]
    pub source_audio_volume: f64,
    /// Master track volume, percent in [0, 110]
    #[serde(rename = "music_volume", default = "default_track_volume")]
    pub track_volume: f64,
    /// Prefer hardware encoders when available
    #[serde(default = "default_true")]
    pub use_gpu: bool,
    /// Encoder speed preset
    #[serde(default)]
    pub speed_preset: SpeedPreset,
}

fn default_true() -> bool {
    true
}
fn default_audio_crossfade() -> f64 {
    10.0
}
fn default_video_crossfade() -> f64 {
    1.0
}
fn default_source_volume() -> f64 {
    100.0
}
fn default_track_volume() -> f64 {
    70.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            include_source_audio: true,
            include_tracks: true,
            audio_crossfade_seconds: default_audio_crossfade(),
            video_crossfade_seconds: default_video_crossfade(),
            cut_tracks_at_clip_end: false,
            source_audio_volume: default_source_volume(),
            track_volume: default_track_volume(),
            use_gpu: true,
            speed_preset: SpeedPreset::default(),
        }
    }
}

impl Settings {
    /// Validate every value against its documented domain.
    ///
    /// Called before planning so out-of-domain settings are rejected as an
    /// invalid plan rather than producing a broken filter graph.
    pub fn validate(&self) -> VmuxResult<()> {
        if !(0.0..=5.0).contains(&self.video_crossfade_seconds) {
            return Err(VmuxError::InvalidPlan {
                reason: format!(
                    "video crossfade {}s outside [0, 5]",
                    self.video_crossfade_seconds
                ),
            });
        }
        if !(1.0..=20.0).contains(&self.audio_crossfade_seconds) {
            return Err(VmuxError::InvalidPlan {
                reason: format!(
                    "audio crossfade {}s outside [1, 20]",
                    self.audio_crossfade_seconds
                ),
            });
        }
        if !(0.0..=110.0).contains(&self.source_audio_volume) {
            return Err(VmuxError::InvalidPlan {
                reason: format!(
                    "source audio volume {}% outside [0, 110]",
                    self.source_audio_volume
                ),
            });
        }
        if !(0.0..=110.0).contains(&self.track_volume) {
            return Err(VmuxError::InvalidPlan {
                reason: format!("track volume {}% outside [0, 110]", self.track_volume),
            });
        }
        Ok(())
    }

    /// Source audio gain as a fraction
    pub fn source_audio_gain(&self) -> f64 {
        self.source_audio_volume / 100.0
    }

    /// Master track gain as a fraction
    pub fn track_gain(&self) -> f64 {
        self.track_volume / 100.0
    }
}

/// Complete project snapshot: ordered clips, ordered tracks, settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "videos", default)]
    pub clips: Vec<Clip>,
    #[serde(rename = "audio_tracks", default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub settings: Settings,
}

impl Project {
    /// Load a project snapshot from a JSON file written by the editor.
    pub fn load(path: &Path) -> VmuxResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| VmuxError::ProjectError {
            message: format!("{}: {}", path.display(), e),
        })?;
        let mut project: Project =
            serde_json::from_str(&data).map_err(|e| VmuxError::ProjectError {
                message: format!("{}: {}", path.display(), e),
            })?;
        for clip in &mut project.clips {
            if clip.name.is_empty() {
                clip.name = file_name_of(&clip.path);
            }
        }
        for track in &mut project.tracks {
            if track.name.is_empty() {
                track.name = file_name_of(&track.path);
            }
            track.volume = track.volume.clamp(0.0, MAX_GAIN);
        }
        Ok(project)
    }
}
