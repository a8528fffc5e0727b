//! Planning behavior driven through the project file format, the way the
//! editor uses it: load a saved project, fill in probed durations, plan.

use std::io::Write;

use vmux_cli::domain::model::Project;
use vmux_cli::planner::{build_plan, Transition};
use vmux_cli::VmuxError;

fn load_project(json: &str) -> Project {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    Project::load(file.path()).unwrap()
}

const PROJECT_JSON: &str = r#"{
    "videos": [
        { "path": "/media/intro.mp4" },
        { "path": "/media/main.mkv" },
        { "path": "/media/outro.mp4" }
    ],
    "audio_tracks": [
        { "path": "/media/theme.mp3", "volume": 0.8 },
        { "path": "/media/quiet.mp3", "volume": 0.5, "mute": true }
    ],
    "settings": {
        "cross_fade_video": 2.0,
        "cross_fade_audio": 4.0,
        "cut_music": true,
        "video_volume": 100.0,
        "music_volume": 50.0
    }
}"#;

fn probed(mut project: Project) -> Project {
    for (clip, duration) in project.clips.iter_mut().zip([10.0, 20.0, 10.0]) {
        clip.duration = Some(duration);
    }
    for track in &mut project.tracks {
        track.duration = Some(300.0);
    }
    project
}

#[test]
fn loaded_project_plans_with_crossfade_offsets() {
    let project = probed(load_project(PROJECT_JSON));
    let plan = build_plan(&project.clips, &project.tracks, &project.settings).unwrap();

    // 10 + 20 + 10 minus two 2s overlaps
    assert_eq!(plan.total_duration, 36.0);
    assert_eq!(plan.clips.len(), 3);
    assert_eq!(plan.clips[0].start_offset, 0.0);
    assert_eq!(plan.clips[1].start_offset, 8.0);
    assert_eq!(plan.clips[2].start_offset, 26.0);
    assert!(matches!(plan.clips[0].transition_in, Transition::Cut));
    assert!(matches!(
        plan.clips[1].transition_in,
        Transition::CrossFade { .. }
    ));
}

#[test]
fn muted_track_is_dropped_and_gain_is_staged() {
    let project = probed(load_project(PROJECT_JSON));
    let plan = build_plan(&project.clips, &project.tracks, &project.settings).unwrap();

    assert_eq!(plan.tracks.len(), 1);
    assert_eq!(plan.tracks[0].path, "/media/theme.mp3");
    // track volume 0.8 times master 50%
    assert!((plan.tracks[0].gain - 0.4).abs() < 1e-9);
}

#[test]
fn cut_music_trims_the_bed_to_the_video() {
    let project = probed(load_project(PROJECT_JSON));
    let plan = build_plan(&project.clips, &project.tracks, &project.settings).unwrap();

    assert!(plan.trim_bed_to_video);
    assert_eq!(plan.bed_duration, 36.0);
}

#[test]
fn plan_is_deterministic_for_the_same_project() {
    let project = probed(load_project(PROJECT_JSON));
    let a = build_plan(&project.clips, &project.tracks, &project.settings).unwrap();
    let b = build_plan(&project.clips, &project.tracks, &project.settings).unwrap();
    assert_eq!(a, b);
}

#[test]
fn out_of_domain_settings_are_rejected() {
    let mut project = probed(load_project(PROJECT_JSON));
    project.settings.audio_crossfade_seconds = 0.5;
    let err = build_plan(&project.clips, &project.tracks, &project.settings).unwrap_err();
    assert!(matches!(err, VmuxError::InvalidPlan { .. }));
}

#[test]
fn persisted_overdriven_volume_is_clamped_on_load() {
    let project = load_project(
        r#"{
            "videos": [ { "path": "/media/a.mp4" } ],
            "audio_tracks": [ { "path": "/media/loud.mp3", "volume": 9.0 } ]
        }"#,
    );
    assert!((project.tracks[0].volume - 1.1).abs() < 1e-9);
    assert_eq!(project.tracks[0].name, "loud.mp3");
}
