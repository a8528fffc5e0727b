//! ffmpeg command assembly
//!
//! Turns a [`RenderPlan`] plus an encoder candidate into the full argument
//! vector for one encode attempt. The filter graph layout follows the
//! classic xfade/acrossfade chain: every clip is normalized to yuv420p,
//! adjacent clips overlap at the offsets the planner resolved, the music
//! bed is gain-staged per track and chained with acrossfade, then mixed
//! with the source audio.

use std::path::Path;

use crate::domain::model::{OutputFormat, SpeedPreset};
use crate::encoders::{hwaccel_args, tuning_args, EncoderCandidate};
use crate::planner::RenderPlan;

/// Build the complete argument vector (without the leading program name).
pub fn build_args(
    plan: &RenderPlan,
    candidate: &EncoderCandidate,
    preset: SpeedPreset,
    output: &Path,
) -> Vec<String> {
    let format = OutputFormat::from_path(output);
    let mut args: Vec<String> = vec!["-y".into()];

    if format != OutputFormat::WebM {
        args.extend(hwaccel_args(candidate.vendor));
    }

    for clip in &plan.clips {
        args.extend(["-i".into(), clip.path.clone()]);
    }
    for track in &plan.tracks {
        args.extend(["-i".into(), track.path.clone()]);
    }

    let (graph, video_tag, audio_tag) = filter_graph(plan);
    args.extend(["-filter_complex".into(), graph]);

    args.extend(["-map".into(), video_tag]);
    match audio_tag {
        Some(tag) => args.extend(["-map".into(), tag]),
        None => args.push("-an".into()),
    }

    match format {
        OutputFormat::WebM => {
            args.extend([
                "-c:v".into(),
                "libvpx-vp9".into(),
                "-b:v".into(),
                "0".into(),
                "-crf".into(),
                "30".into(),
            ]);
            args.extend(["-c:a".into(), "libvorbis".into()]);
        }
        OutputFormat::Matroska | OutputFormat::Mp4 => {
            args.extend(["-c:v".into(), candidate.encoder.into()]);
            args.extend(tuning_args(candidate.vendor, preset));
            args.extend(["-c:a".into(), "aac".into(), "-b:a".into(), "192k".into()]);
        }
    }

    if let Some(limit) = plan.duration_limit {
        args.extend(["-t".into(), format_seconds(limit)]);
    }

    args.extend(["-progress".into(), "pipe:1".into(), "-nostats".into()]);
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Build the filter graph. Returns (graph, video output tag, audio output
/// tag); the audio tag is `None` when the output carries no audio at all.
fn filter_graph(plan: &RenderPlan) -> (String, String, Option<String>) {
    let mut parts: Vec<String> = Vec::new();

    // Every filter output must be consumed, so the clip-audio chain is only
    // built when the source audio actually ends up in the mix.
    let (video_tag, source_audio_tag) =
        video_chain(plan, &mut parts, plan.include_source_audio);

    let source_tag = source_audio_tag.map(|src| {
        parts.push(format!("{}volume={}[va]", src, plan.source_audio_gain));
        "[va]".to_string()
    });

    let music_tag = music_chain(plan, &mut parts);

    let audio_tag = match (source_tag, music_tag) {
        (Some(source), Some(music)) => {
            parts.push(format!(
                "{}{}amix=inputs=2:duration=longest:dropout_transition=0[aout]",
                source, music
            ));
            Some("[aout]".to_string())
        }
        (Some(source), None) => Some(source),
        (None, Some(music)) => Some(music),
        (None, None) => None,
    };

    (parts.join(";"), video_tag, audio_tag)
}

/// Normalize each clip, then join them: xfade/acrossfade chains when the
/// plan has a crossfade, a plain concat otherwise.
fn video_chain(
    plan: &RenderPlan,
    parts: &mut Vec<String>,
    with_audio: bool,
) -> (String, Option<String>) {
    let n = plan.clips.len();
    for i in 0..n {
        parts.push(format!("[{}:v]format=yuv420p,setsar=1[v{}]", i, i));
        if with_audio {
            parts.push(format!("[{}:a]anull[ca{}]", i, i));
        }
    }

    if n == 1 {
        return (
            "[v0]".to_string(),
            with_audio.then(|| "[ca0]".to_string()),
        );
    }

    if plan.video_crossfade > 0.0 {
        let mut prev_v = "v0".to_string();
        let mut prev_a = "ca0".to_string();
        for (j, clip) in plan.clips.iter().enumerate().skip(1) {
            let out_v = format!("vx{}", j);
            parts.push(format!(
                "[{}][v{}]xfade=transition=fade:duration={}:offset={}[{}]",
                prev_v, j, plan.video_crossfade, clip.start_offset, out_v
            ));
            prev_v = out_v;
            if with_audio {
                let out_a = format!("cax{}", j);
                parts.push(format!(
                    "[{}][ca{}]acrossfade=d={}:c1=qsin:c2=qsin[{}]",
                    prev_a, j, plan.video_crossfade, out_a
                ));
                prev_a = out_a;
            }
        }
        (
            format!("[{}]", prev_v),
            with_audio.then(|| format!("[{}]", prev_a)),
        )
    } else if with_audio {
        // Hard cuts: a single concat keeps A/V in sync without a zero-length
        // xfade, which ffmpeg rejects.
        let inputs: String = (0..n).map(|i| format!("[v{}][ca{}]", i, i)).collect();
        parts.push(format!("{}concat=n={}:v=1:a=1[vcat][acat]", inputs, n));
        ("[vcat]".to_string(), Some("[acat]".to_string()))
    } else {
        let inputs: String = (0..n).map(|i| format!("[v{}]", i)).collect();
        parts.push(format!("{}concat=n={}:v=1:a=0[vcat]", inputs, n));
        ("[vcat]".to_string(), None)
    }
}

/// Gain-stage each active track, chain them with acrossfade and apply the
/// trim policy. Returns the bed's output tag, or `None` for a silent bed.
fn music_chain(plan: &RenderPlan, parts: &mut Vec<String>) -> Option<String> {
    if plan.tracks.is_empty() {
        return None;
    }

    let base = plan.clips.len();
    for (i, track) in plan.tracks.iter().enumerate() {
        parts.push(format!("[{}:a]volume={}[ma{}]", base + i, track.gain, i));
    }

    let mut tag = "ma0".to_string();
    for j in 1..plan.tracks.len() {
        let out = format!("mx{}", j);
        parts.push(format!(
            "[{}][ma{}]acrossfade=d={}:c1=qsin:c2=qsin[{}]",
            tag, j, plan.audio_crossfade, out
        ));
        tag = out;
    }

    if plan.trim_bed_to_video {
        parts.push(format!(
            "[{}]atrim=duration={}[mus]",
            tag,
            format_seconds(plan.total_duration)
        ));
        return Some("[mus]".to_string());
    }

    Some(format!("[{}]", tag))
}

fn format_seconds(seconds: f64) -> String {
    // Trim trailing zeros so filter args stay readable in logs
    let text = format!("{:.3}", seconds);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
