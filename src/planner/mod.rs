//! Composition planner
//!
//! Pure derivation of a [`RenderPlan`] from the ordered clips, the ordered
//! tracks and the export settings. No I/O happens here: identical inputs
//! always produce an identical plan, which the tests check by equality.

use serde::{Deserialize, Serialize};

use crate::domain::model::{Clip, Settings, Track, MAX_GAIN};
use crate::error::{VmuxError, VmuxResult};

/// How a segment joins the one before it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    /// Hard concatenation, no overlap
    Cut,
    /// Overlap-blend with the previous segment
    CrossFade { seconds: f64 },
}

/// One clip resolved into the output timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSegment {
    pub path: String,
    /// Probed source duration in seconds
    pub duration: f64,
    /// Start position in the output timeline
    pub start_offset: f64,
    /// Join with the previous segment (`Cut` for the first)
    pub transition_in: Transition,
}

/// One active track resolved into the music bed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub path: String,
    /// Probed source duration in seconds
    pub duration: f64,
    /// Effective gain: track volume x master track volume, capped at 110%
    pub gain: f64,
    /// Start position in the bed timeline
    pub start_offset: f64,
}

/// Fully resolved, side-effect-free description of what to encode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    /// Clips in assembly order
    pub clips: Vec<ClipSegment>,
    /// Active tracks in bed order; empty means a silent bed
    pub tracks: Vec<TrackSegment>,
    /// Mix the clips' own audio into the output
    pub include_source_audio: bool,
    /// Gain applied to the clips' own audio
    pub source_audio_gain: f64,
    /// Crossfade between adjacent clips, seconds
    pub video_crossfade: f64,
    /// Crossfade between adjacent tracks, seconds
    pub audio_crossfade: f64,
    /// Truncate the music bed at the end of the video; when false the mix
    /// runs to the longest input (silence under black past the video end)
    pub trim_bed_to_video: bool,
    /// Total output duration: sum of clip durations minus crossfade overlap
    pub total_duration: f64,
    /// Duration of the music bed after trim policy
    pub bed_duration: f64,
    /// Hard cap applied for previews; `None` for full exports
    pub duration_limit: Option<f64>,
}

impl RenderPlan {
    /// Apply a preview duration cap. The encode stops at the cap, and
    /// progress is reported against the capped duration.
    pub fn cap_duration(mut self, seconds: f64) -> Self {
        if seconds > 0.0 {
            self.duration_limit = Some(seconds);
        }
        self
    }

    /// Duration the encoder will actually produce
    pub fn effective_duration(&self) -> f64 {
        match self.duration_limit {
            Some(limit) => self.total_duration.min(limit),
            None => self.total_duration,
        }
    }
}

/// Resolve the mute/solo policy into the active track set.
///
/// If any track is soloed the active set is exactly the soloed, unmuted
/// tracks; otherwise every unmuted track is active. Mute always wins over
/// solo on the same track.
pub fn active_tracks(tracks: &[Track]) -> Vec<&Track> {
    let solos: Vec<&Track> = tracks.iter().filter(|t| t.solo).collect();
    if !solos.is_empty() {
        solos.into_iter().filter(|t| !t.mute).collect()
    } else {
        tracks.iter().filter(|t| !t.mute).collect()
    }
}

/// Build the render plan for a project snapshot.
///
/// Rejects zero clips and out-of-domain settings with
/// [`VmuxError::InvalidPlan`] so nothing downstream ever launches a process
/// for an unencodable plan.
pub fn build_plan(clips: &[Clip], tracks: &[Track], settings: &Settings) -> VmuxResult<RenderPlan> {
    settings.validate()?;

    if clips.is_empty() {
        return Err(VmuxError::InvalidPlan {
            reason: "no clips to assemble".to_string(),
        });
    }

    let crossfade = settings.video_crossfade_seconds;
    let blend = crossfade > 0.0 && clips.len() >= 2;

    let mut clip_segments = Vec::with_capacity(clips.len());
    let mut cursor = 0.0_f64;
    for (index, clip) in clips.iter().enumerate() {
        let duration = clip.duration.unwrap_or(0.0).max(0.0);
        let (start_offset, transition_in) = if index == 0 {
            (0.0, Transition::Cut)
        } else if blend {
            (
                (cursor - crossfade).max(0.0),
                Transition::CrossFade { seconds: crossfade },
            )
        } else {
            (cursor, Transition::Cut)
        };
        clip_segments.push(ClipSegment {
            path: clip.path.clone(),
            duration,
            start_offset,
            transition_in,
        });
        if index == 0 {
            cursor = duration;
        } else if blend {
            cursor += (duration - crossfade).max(0.0);
        } else {
            cursor += duration;
        }
    }

    let clip_sum: f64 = clip_segments.iter().map(|c| c.duration).sum();
    let overlap = crossfade * (clips.len().saturating_sub(1)) as f64;
    let total_duration = (clip_sum - if blend { overlap } else { 0.0 }).max(0.0);

    let audio_crossfade = settings.audio_crossfade_seconds;
    let mut track_segments = Vec::new();
    let mut bed_duration = 0.0_f64;
    if settings.include_tracks {
        let active = active_tracks(tracks);
        let mut bed_cursor = 0.0_f64;
        for (index, track) in active.iter().enumerate() {
            let duration = track.duration.unwrap_or(0.0).max(0.0);
            let gain = (track.volume * settings.track_gain()).clamp(0.0, MAX_GAIN);
            let start_offset = if index == 0 {
                0.0
            } else {
                (bed_cursor - audio_crossfade).max(0.0)
            };
            track_segments.push(TrackSegment {
                path: track.path.clone(),
                duration,
                gain,
                start_offset,
            });
            if index == 0 {
                bed_cursor = duration;
            } else {
                bed_cursor += (duration - audio_crossfade).max(0.0);
            }
        }
        bed_duration = if settings.cut_tracks_at_clip_end {
            bed_cursor.min(total_duration)
        } else {
            bed_cursor
        };
    }

    Ok(RenderPlan {
        clips: clip_segments,
        tracks: track_segments,
        include_source_audio: settings.include_source_audio,
        source_audio_gain: settings.source_audio_gain().clamp(0.0, MAX_GAIN),
        video_crossfade: crossfade,
        audio_crossfade,
        trim_bed_to_video: settings.cut_tracks_at_clip_end,
        total_duration,
        bed_duration,
        duration_limit: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(path: &str, duration: f64) -> Clip {
        let mut clip = Clip::new(path);
        clip.duration = Some(duration);
        clip
    }

    fn track(path: &str, duration: f64, mute: bool, solo: bool) -> Track {
        let mut track = Track::new(path);
        track.duration = Some(duration);
        track.mute = mute;
        track.solo = solo;
        track
    }

    #[test]
    fn test_total_duration_with_crossfade() {
        // 3 clips of 10s with a 2s crossfade overlap: 30 - 2*2 = 26
        let clips = vec![clip("a.mp4", 10.0), clip("b.mp4", 10.0), clip("c.mp4", 10.0)];
        let mut settings = Settings::default();
        settings.video_crossfade_seconds = 2.0;

        let plan = build_plan(&clips, &[], &settings).unwrap();
        assert_eq!(plan.total_duration, 26.0);
        assert_eq!(plan.clips[1].start_offset, 8.0);
        assert_eq!(plan.clips[2].start_offset, 16.0);
        assert_eq!(
            plan.clips[1].transition_in,
            Transition::CrossFade { seconds: 2.0 }
        );
    }

    #[test]
    fn test_total_duration_floored_at_zero() {
        let clips = vec![clip("a.mp4", 1.0), clip("b.mp4", 1.0), clip("c.mp4", 1.0)];
        let mut settings = Settings::default();
        settings.video_crossfade_seconds = 5.0;

        let plan = build_plan(&clips, &[], &settings).unwrap();
        assert_eq!(plan.total_duration, 0.0);
    }

    #[test]
    fn test_zero_crossfade_hard_cuts() {
        let clips = vec![clip("a.mp4", 10.0), clip("b.mp4", 5.0)];
        let mut settings = Settings::default();
        settings.video_crossfade_seconds = 0.0;

        let plan = build_plan(&clips, &[], &settings).unwrap();
        assert_eq!(plan.total_duration, 15.0);
        assert_eq!(plan.clips[1].start_offset, 10.0);
        assert_eq!(plan.clips[1].transition_in, Transition::Cut);
    }

    #[test]
    fn test_single_clip_has_no_transition() {
        let clips = vec![clip("a.mp4", 10.0)];
        let mut settings = Settings::default();
        settings.video_crossfade_seconds = 3.0;

        let plan = build_plan(&clips, &[], &settings).unwrap();
        assert_eq!(plan.total_duration, 10.0);
        assert_eq!(plan.clips[0].transition_in, Transition::Cut);
    }

    #[test]
    fn test_zero_clips_rejected() {
        let result = build_plan(&[], &[], &Settings::default());
        assert!(matches!(result, Err(VmuxError::InvalidPlan { .. })));
    }

    #[test]
    fn test_out_of_domain_settings_rejected() {
        let clips = vec![clip("a.mp4", 10.0)];
        let mut settings = Settings::default();
        settings.audio_crossfade_seconds = 25.0;
        assert!(matches!(
            build_plan(&clips, &[], &settings),
            Err(VmuxError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn test_solo_excludes_non_solo_tracks() {
        let tracks = vec![
            track("a.mp3", 60.0, true, false),
            track("b.mp3", 60.0, false, true),
            track("c.mp3", 60.0, false, false),
        ];
        let active = active_tracks(&tracks);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].path, "b.mp3");
    }

    #[test]
    fn test_mute_overrides_solo() {
        let tracks = vec![
            track("a.mp3", 60.0, true, true),
            track("b.mp3", 60.0, false, false),
        ];
        // The soloed track is muted, so the solo set resolves to nothing.
        let active = active_tracks(&tracks);
        assert!(active.is_empty());
    }

    #[test]
    fn test_all_muted_yields_silent_bed_not_error() {
        let clips = vec![clip("a.mp4", 10.0)];
        let tracks = vec![
            track("a.mp3", 60.0, true, false),
            track("b.mp3", 60.0, true, false),
        ];
        let plan = build_plan(&clips, &tracks, &Settings::default()).unwrap();
        assert!(plan.tracks.is_empty());
        assert_eq!(plan.bed_duration, 0.0);
    }

    #[test]
    fn test_track_gain_is_product_with_ceiling() {
        let clips = vec![clip("a.mp4", 10.0)];
        let mut loud = track("a.mp3", 60.0, false, false);
        loud.volume = 1.1;
        let mut settings = Settings::default();
        settings.track_volume = 110.0;

        let plan = build_plan(&clips, &[loud], &settings).unwrap();
        // 1.1 x 1.1 = 1.21, capped at the 110% ceiling
        assert_eq!(plan.tracks[0].gain, MAX_GAIN);
    }

    #[test]
    fn test_bed_trimmed_to_video_duration() {
        let clips = vec![clip("a.mp4", 30.0)];
        let tracks = vec![track("a.mp3", 100.0, false, false)];
        let mut settings = Settings::default();
        settings.cut_tracks_at_clip_end = true;

        let plan = build_plan(&clips, &tracks, &settings).unwrap();
        assert_eq!(plan.bed_duration, 30.0);

        settings.cut_tracks_at_clip_end = false;
        let plan = build_plan(&clips, &tracks, &settings).unwrap();
        assert_eq!(plan.bed_duration, 100.0);
    }

    #[test]
    fn test_track_offsets_overlap_by_audio_crossfade() {
        let clips = vec![clip("a.mp4", 300.0)];
        let tracks = vec![
            track("a.mp3", 60.0, false, false),
            track("b.mp3", 60.0, false, false),
        ];
        let mut settings = Settings::default();
        settings.audio_crossfade_seconds = 10.0;

        let plan = build_plan(&clips, &tracks, &settings).unwrap();
        assert_eq!(plan.tracks[0].start_offset, 0.0);
        assert_eq!(plan.tracks[1].start_offset, 50.0);
        assert_eq!(plan.bed_duration, 110.0);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let clips = vec![clip("a.mp4", 12.5), clip("b.mp4", 7.25)];
        let tracks = vec![
            track("a.mp3", 60.0, false, false),
            track("b.mp3", 45.0, false, true),
        ];
        let settings = Settings::default();

        let first = build_plan(&clips, &tracks, &settings).unwrap();
        let second = build_plan(&clips, &tracks, &settings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_preview_cap() {
        let clips = vec![clip("a.mp4", 120.0)];
        let plan = build_plan(&clips, &[], &Settings::default())
            .unwrap()
            .cap_duration(60.0);
        assert_eq!(plan.effective_duration(), 60.0);
        assert_eq!(plan.total_duration, 120.0);
    }
}
