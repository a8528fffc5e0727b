//! Fallback, cancellation and exhaustion behavior of the render engine,
//! exercised against a scripted fake encoder process.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use vmux_cli::config::AppConfig;
use vmux_cli::domain::model::{Clip, Settings, SpeedPreset};
use vmux_cli::encoders::{EncoderCandidate, Vendor};
use vmux_cli::engine::{
    CancelToken, EncodeBackend, EncodeChild, ExitReport, Orchestrator, RenderOutcome,
};
use vmux_cli::error::VmuxError;
use vmux_cli::planner::{build_plan, RenderPlan};

/// Script for one spawned child: the progress lines it emits, how it exits,
/// and whether it hangs (like a stuck encoder) once the lines run out.
struct Script {
    lines: Vec<&'static str>,
    exit: ExitReport,
    hang: bool,
    killed: Arc<AtomicBool>,
}

impl Script {
    fn exits(lines: Vec<&'static str>, success: bool, diagnostic: &str) -> Self {
        Self {
            lines,
            exit: ExitReport {
                success,
                code: if success { 0 } else { 1 },
                diagnostic: diagnostic.to_string(),
            },
            hang: false,
            killed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn hangs(lines: Vec<&'static str>) -> Self {
        Self {
            lines,
            exit: ExitReport {
                success: false,
                code: -1,
                diagnostic: "killed".to_string(),
            },
            hang: true,
            killed: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct FakeChild {
    lines: VecDeque<&'static str>,
    exit: ExitReport,
    hang: bool,
    killed: Arc<AtomicBool>,
}

#[async_trait]
impl EncodeChild for FakeChild {
    async fn next_line(&mut self) -> Option<String> {
        if let Some(line) = self.lines.pop_front() {
            return Some(line.to_string());
        }
        if self.hang && !self.killed.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        None
    }

    async fn wait(&mut self) -> vmux_cli::VmuxResult<ExitReport> {
        Ok(self.exit.clone())
    }

    async fn kill(&mut self) -> vmux_cli::VmuxResult<()> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out scripted children in order; panics on an unexpected spawn.
struct FakeBackend {
    scripts: Mutex<VecDeque<Script>>,
    spawned: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            spawned: Mutex::new(Vec::new()),
        }
    }

    fn spawned_commands(&self) -> Vec<String> {
        self.spawned.lock().unwrap().clone()
    }
}

#[async_trait]
impl EncodeBackend for FakeBackend {
    async fn spawn(&self, args: &[String]) -> vmux_cli::VmuxResult<Box<dyn EncodeChild>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("more spawns than scripted children");
        self.spawned.lock().unwrap().push(args.join(" "));
        Ok(Box::new(FakeChild {
            lines: script.lines.into(),
            exit: script.exit,
            hang: script.hang,
            killed: script.killed,
        }))
    }
}

fn hundred_second_plan() -> RenderPlan {
    let mut clip = Clip::new("input.mp4");
    clip.duration = Some(100.0);
    build_plan(&[clip], &[], &Settings::default()).unwrap()
}

fn candidates() -> Vec<EncoderCandidate> {
    vec![
        EncoderCandidate {
            vendor: Vendor::Nvidia,
            encoder: "h264_nvenc",
        },
        EncoderCandidate::software(),
    ]
}

fn orchestrator(backend: FakeBackend, config: &AppConfig) -> Orchestrator<FakeBackend> {
    Orchestrator::with_backend(backend, config)
}

#[tokio::test(start_paused = true)]
async fn hardware_failure_falls_back_to_software() {
    let backend = FakeBackend::new(vec![
        Script::exits(vec![], false, "nvenc init failed"),
        Script::exits(
            vec!["out_time_us=50000000", "progress=continue", "progress=end"],
            true,
            "",
        ),
    ]);
    let config = AppConfig::default();
    let orchestrator = orchestrator(backend, &config);
    let (tx, rx) = watch::channel(0.0f32);

    let outcome = orchestrator
        .render(
            &hundred_second_plan(),
            SpeedPreset::Balanced,
            &candidates(),
            std::path::Path::new("/tmp/vmux-test-fallback.mkv"),
            CancelToken::new(),
            tx,
        )
        .await
        .unwrap();

    match outcome {
        RenderOutcome::Completed { encoder, .. } => assert_eq!(encoder.encoder, "libx264"),
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(*rx.borrow(), 100.0);

    let commands = orchestrator.backend().spawned_commands();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].contains("h264_nvenc"));
    assert!(commands[1].contains("libx264"));
}

#[tokio::test(start_paused = true)]
async fn exhaustion_reports_last_diagnostic() {
    let backend = FakeBackend::new(vec![
        Script::exits(vec![], false, "nvenc init failed"),
        Script::exits(vec![], false, "x264 rejected the filter graph"),
    ]);
    let config = AppConfig::default();
    let orchestrator = orchestrator(backend, &config);
    let (tx, _rx) = watch::channel(0.0f32);

    let err = orchestrator
        .render(
            &hundred_second_plan(),
            SpeedPreset::Balanced,
            &candidates(),
            std::path::Path::new("/tmp/vmux-test-exhaustion.mkv"),
            CancelToken::new(),
            tx,
        )
        .await
        .unwrap_err();

    match err {
        VmuxError::NoCapableEncoder { encoder, diagnostic } => {
            assert_eq!(encoder, "libx264");
            assert!(diagnostic.contains("x264 rejected"));
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_candidate_is_killed_and_replaced() {
    let stalled = Script::hangs(vec![]);
    let stalled_killed = Arc::clone(&stalled.killed);
    let backend = FakeBackend::new(vec![
        stalled,
        Script::exits(vec!["progress=end"], true, ""),
    ]);
    let config = AppConfig {
        startup_grace_secs: 0,
        ..AppConfig::default()
    };
    let orchestrator = orchestrator(backend, &config);
    let (tx, _rx) = watch::channel(0.0f32);

    let outcome = orchestrator
        .render(
            &hundred_second_plan(),
            SpeedPreset::Balanced,
            &candidates(),
            std::path::Path::new("/tmp/vmux-test-stall.mkv"),
            CancelToken::new(),
            tx,
        )
        .await
        .unwrap();

    assert!(stalled_killed.load(Ordering::SeqCst));
    assert!(matches!(outcome, RenderOutcome::Completed { .. }));
}

#[tokio::test(start_paused = true)]
async fn cancellation_kills_the_child_and_removes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("partial.mkv");
    std::fs::write(&output, b"partial").unwrap();

    // Cancel arrives at 99%: still cancelled, never reported as success.
    let running = Script::hangs(vec!["out_time_us=99000000", "progress=continue"]);
    let running_killed = Arc::clone(&running.killed);
    let backend = FakeBackend::new(vec![running]);
    let config = AppConfig::default();
    let orchestrator = orchestrator(backend, &config);
    let (tx, mut rx) = watch::channel(0.0f32);

    let cancel = CancelToken::new();
    let watcher_cancel = cancel.clone();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            if *rx.borrow_and_update() >= 99.0 {
                watcher_cancel.cancel();
                break;
            }
        }
    });

    let outcome = orchestrator
        .render(
            &hundred_second_plan(),
            SpeedPreset::Balanced,
            &[EncoderCandidate::software()],
            &output,
            cancel,
            tx,
        )
        .await
        .unwrap();
    watcher.abort();

    assert!(matches!(outcome, RenderOutcome::Cancelled { .. }));
    assert!(running_killed.load(Ordering::SeqCst));
    assert!(!output.exists());
}

#[tokio::test(start_paused = true)]
async fn pre_cancelled_job_never_spawns() {
    let backend = FakeBackend::new(vec![]);
    let config = AppConfig::default();
    let orchestrator = orchestrator(backend, &config);
    let (tx, _rx) = watch::channel(0.0f32);

    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = orchestrator
        .render(
            &hundred_second_plan(),
            SpeedPreset::Balanced,
            &candidates(),
            std::path::Path::new("/tmp/vmux-test-precancel.mkv"),
            cancel,
            tx,
        )
        .await
        .unwrap();

    assert!(matches!(outcome, RenderOutcome::Cancelled { .. }));
    assert!(orchestrator.backend().spawned_commands().is_empty());
}
