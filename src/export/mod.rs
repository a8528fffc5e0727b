//! Export/Preview facade
//!
//! The only surface the UI layer talks to. Wraps probing, planning,
//! capability detection and the orchestrator behind two operations (full
//! export, bounded preview) plus cancellation and a percent progress
//! stream. Process handles and raw progress lines never leak out of here.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::model::{Project, SpeedPreset};
use crate::encoders::candidate_list;
use crate::engine::{JobRegistry, Orchestrator, RenderOutcome};
use crate::error::{VmuxError, VmuxResult};
use crate::planner::build_plan;
use crate::probe::DurationProber;

const PREVIEW_PREFIX: &str = "vmux_preview_";

/// User-facing result of an export
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub success: bool,
    pub cancelled: bool,
    /// Human-readable reason when the encode itself failed
    pub error: Option<String>,
    /// Encoder that completed (or, on failure, the last one attempted)
    pub encoder: Option<String>,
    pub elapsed_seconds: f64,
}

/// Facade over the composition and export pipeline
pub struct Exporter {
    config: AppConfig,
    registry: Arc<JobRegistry>,
    progress_tx: watch::Sender<f32>,
    progress_rx: watch::Receiver<f32>,
}

impl Exporter {
    pub fn new(config: AppConfig) -> Self {
        let (progress_tx, progress_rx) = watch::channel(0.0f32);
        Self {
            config,
            registry: Arc::new(JobRegistry::new()),
            progress_tx,
            progress_rx,
        }
    }

    /// Percent progress stream (0-100, monotone per job) for the UI.
    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.progress_rx.clone()
    }

    /// Request cancellation of the active job, if any.
    pub fn cancel(&self) -> bool {
        self.registry.cancel_active()
    }

    /// Export the project to `destination`.
    ///
    /// Pre-flight failures (invalid plan, missing tool, busy job) return an
    /// error; encode-level exhaustion is absorbed into the outcome with its
    /// diagnostic so the UI always has a displayable reason.
    pub async fn export(&self, project: &Project, destination: &Path) -> VmuxResult<ExportOutcome> {
        self.run_pipeline(project, destination, project.settings.speed_preset, None)
            .await
    }

    /// Render a preview to a scratch file, capped to the configured length
    /// unless the full timeline is requested. Previews always force the
    /// ultrafast preset. Returns the scratch path, or `None` when the
    /// preview was cancelled.
    pub async fn preview(&self, project: &Project, capped: bool) -> VmuxResult<Option<PathBuf>> {
        let scratch = tempfile::Builder::new()
            .prefix(PREVIEW_PREFIX)
            .suffix(".mkv")
            .tempfile()?
            .into_temp_path();
        let path = scratch
            .keep()
            .map_err(|e| VmuxError::IoError(e.error))?;

        let cap = if capped {
            Some(self.config.preview_seconds as f64)
        } else {
            None
        };

        match self
            .run_pipeline(project, &path, SpeedPreset::Ultrafast, cap)
            .await
        {
            Ok(outcome) if outcome.success => Ok(Some(path)),
            Ok(outcome) => {
                let _ = std::fs::remove_file(&path);
                if outcome.cancelled {
                    info!("Preview cancelled after {:.2}s", outcome.elapsed_seconds);
                    Ok(None)
                } else {
                    Err(VmuxError::NoCapableEncoder {
                        encoder: outcome.encoder.unwrap_or_else(|| "none".to_string()),
                        diagnostic: outcome
                            .error
                            .unwrap_or_else(|| "preview encode failed".to_string()),
                    })
                }
            }
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        project: &Project,
        destination: &Path,
        preset: SpeedPreset,
        duration_cap: Option<f64>,
    ) -> VmuxResult<ExportOutcome> {
        // Cheap, pure validation first: a zero-clip project or out-of-domain
        // settings never reach a subprocess.
        project.settings.validate()?;
        if project.clips.is_empty() {
            return Err(VmuxError::InvalidPlan {
                reason: "no clips to assemble".to_string(),
            });
        }

        crate::probe::tools::require("ffmpeg")?;
        crate::probe::tools::require("ffprobe")?;

        let mut project = project.clone();
        let prober = DurationProber::from_config(&self.config);
        let failures = prober.probe_project(&mut project).await;
        for failure in &failures {
            warn!("Skipping duration for {}", failure.path);
        }

        let mut plan = build_plan(&project.clips, &project.tracks, &project.settings)?;
        if let Some(cap) = duration_cap {
            plan = plan.cap_duration(cap);
        }

        let candidates = candidate_list(project.settings.use_gpu);
        info!(
            "Exporting {:.1}s to {} via {} candidate(s)",
            plan.effective_duration(),
            destination.display(),
            candidates.len()
        );

        let guard = self.registry.try_acquire()?;
        let orchestrator = Orchestrator::new(&self.config);
        let result = orchestrator
            .render(
                &plan,
                preset,
                &candidates,
                destination,
                guard.token(),
                self.progress_tx.clone(),
            )
            .await;
        drop(guard);

        match result {
            Ok(RenderOutcome::Completed { encoder, elapsed }) => Ok(ExportOutcome {
                success: true,
                cancelled: false,
                error: None,
                encoder: Some(encoder.encoder.to_string()),
                elapsed_seconds: elapsed.as_secs_f64(),
            }),
            Ok(RenderOutcome::Cancelled { elapsed }) => Ok(ExportOutcome {
                success: false,
                cancelled: true,
                error: None,
                encoder: None,
                elapsed_seconds: elapsed.as_secs_f64(),
            }),
            Err(VmuxError::NoCapableEncoder { encoder, diagnostic }) => {
                let failure = VmuxError::NoCapableEncoder {
                    encoder: encoder.clone(),
                    diagnostic,
                };
                Ok(ExportOutcome {
                    success: false,
                    cancelled: false,
                    error: Some(failure.to_string()),
                    encoder: Some(encoder),
                    elapsed_seconds: 0.0,
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Play a rendered file with ffplay.
pub fn play(path: &Path) -> VmuxResult<()> {
    crate::probe::tools::require("ffplay")?;
    Command::new("ffplay")
        .args(["-autoexit", "-loglevel", "quiet", "-window_title", "Preview"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

/// Remove stale preview scratch files left behind by earlier runs.
pub fn cleanup_previews() -> usize {
    let mut removed = 0;
    let temp_dir = std::env::temp_dir();
    if let Ok(entries) = std::fs::read_dir(&temp_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(PREVIEW_PREFIX) && name.ends_with(".mkv") {
                if std::fs::remove_file(entry.path()).is_ok() {
                    removed += 1;
                }
            }
        }
    }
    removed
}
