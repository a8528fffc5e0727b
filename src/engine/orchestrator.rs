//! Render orchestrator
//!
//! Drives one encode job through `Pending -> Running -> {Succeeded |
//! Cancelled | Failed}` with an internal fallback sub-loop over the encoder
//! candidates: a candidate that exits non-zero, fails to launch or produces
//! no valid progress inside the startup grace window is silently replaced
//! by the next one. Only candidate exhaustion surfaces as an error; the
//! caller learns which encoder actually completed from the outcome.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::domain::model::SpeedPreset;
use crate::encoders::EncoderCandidate;
use crate::engine::command::build_args;
use crate::engine::job::CancelToken;
use crate::engine::process::{EncodeBackend, EncodeChild, FfmpegBackend};
use crate::engine::progress::{ProgressEmitter, ProgressParser};
use crate::error::{VmuxError, VmuxResult};

/// Lifecycle states of a render job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Cancelled,
    Failed,
}

/// Terminal result of a render job that did not error
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    /// Encode finished; `encoder` is the candidate that actually completed
    Completed {
        encoder: EncoderCandidate,
        elapsed: Duration,
    },
    /// Job was cancelled cooperatively; not an error
    Cancelled { elapsed: Duration },
}

/// How one encode attempt ended
enum AttemptEnd {
    Exited(crate::engine::process::ExitReport),
    CancelRequested,
    Stalled,
}

/// Supervises encode subprocesses for one job at a time
pub struct Orchestrator<B: EncodeBackend> {
    backend: B,
    startup_grace: Duration,
    cancel_grace: Duration,
    poll_interval: Duration,
    progress_interval: Duration,
}

impl Orchestrator<FfmpegBackend> {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_backend(FfmpegBackend, config)
    }
}

impl<B: EncodeBackend> Orchestrator<B> {
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn with_backend(backend: B, config: &AppConfig) -> Self {
        Self {
            backend,
            startup_grace: config.startup_grace(),
            cancel_grace: config.cancel_grace(),
            // Cancellation must be observed well under a second
            poll_interval: Duration::from_millis(250),
            progress_interval: config.progress_interval(),
        }
    }

    /// Run the fallback loop for one job.
    ///
    /// `candidates` must end with the software candidate; `cancel` is the
    /// job's cooperative flag; percent progress goes to `progress`.
    pub async fn render(
        &self,
        plan: &crate::planner::RenderPlan,
        preset: SpeedPreset,
        candidates: &[EncoderCandidate],
        output: &Path,
        cancel: CancelToken,
        progress: watch::Sender<f32>,
    ) -> VmuxResult<RenderOutcome> {
        let started = Instant::now();
        let mut emitter = ProgressEmitter::new(progress, self.progress_interval);
        let mut last_failure: Option<(String, String)> = None;

        info!("Render job: {:?} -> {:?}", JobState::Pending, JobState::Running);

        for candidate in candidates {
            if cancel.is_cancelled() {
                info!("Render job: {:?} -> {:?}", JobState::Running, JobState::Cancelled);
                return Ok(RenderOutcome::Cancelled {
                    elapsed: started.elapsed(),
                });
            }

            info!("Attempting encoder {} ({})", candidate.encoder, candidate.vendor.as_str());
            let args = build_args(plan, candidate, preset, output);

            let mut child = match self.backend.spawn(&args).await {
                Ok(child) => child,
                Err(VmuxError::ToolMissing { tool }) => {
                    // No ffmpeg at all: no candidate can ever work
                    return Err(VmuxError::ToolMissing { tool });
                }
                Err(e) => {
                    warn!("Encoder {} failed to launch: {}", candidate.encoder, e);
                    last_failure = Some((candidate.encoder.to_string(), e.to_string()));
                    continue;
                }
            };

            let mut parser = ProgressParser::new(plan.effective_duration());
            match self
                .supervise(child.as_mut(), &mut parser, &mut emitter, &cancel)
                .await?
            {
                AttemptEnd::Exited(report) if report.success => {
                    emitter.finish();
                    info!(
                        "Render job: {:?} -> {:?} (encoder {}, {:.2}s)",
                        JobState::Running,
                        JobState::Succeeded,
                        candidate.encoder,
                        started.elapsed().as_secs_f64()
                    );
                    return Ok(RenderOutcome::Completed {
                        encoder: *candidate,
                        elapsed: started.elapsed(),
                    });
                }
                AttemptEnd::Exited(report) => {
                    let failure = VmuxError::EncoderExitFailure {
                        encoder: candidate.encoder.to_string(),
                        code: report.code,
                        diagnostic: report.diagnostic.clone(),
                    };
                    warn!("{}; falling back to next candidate", failure);
                    last_failure = Some((candidate.encoder.to_string(), report.diagnostic));
                }
                AttemptEnd::CancelRequested => {
                    self.stop_child(child.as_mut()).await;
                    remove_partial_output(output).await;
                    info!("Render job: {:?} -> {:?}", JobState::Running, JobState::Cancelled);
                    return Ok(RenderOutcome::Cancelled {
                        elapsed: started.elapsed(),
                    });
                }
                AttemptEnd::Stalled => {
                    self.stop_child(child.as_mut()).await;
                    warn!(
                        "Encoder {} produced no progress within {:?}; falling back",
                        candidate.encoder, self.startup_grace
                    );
                    last_failure = Some((
                        candidate.encoder.to_string(),
                        format!("no progress within {:?} startup grace", self.startup_grace),
                    ));
                }
            }
        }

        let (encoder, diagnostic) = last_failure.unwrap_or_else(|| {
            ("none".to_string(), "empty candidate list".to_string())
        });
        info!("Render job: {:?} -> {:?}", JobState::Running, JobState::Failed);
        Err(VmuxError::NoCapableEncoder { encoder, diagnostic })
    }

    /// Supervise one running attempt: pump progress lines, watch the cancel
    /// flag at the poll interval, and enforce the startup grace window.
    async fn supervise(
        &self,
        child: &mut dyn EncodeChild,
        parser: &mut ProgressParser,
        emitter: &mut ProgressEmitter,
        cancel: &CancelToken,
    ) -> VmuxResult<AttemptEnd> {
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let grace_deadline = Instant::now() + self.startup_grace;
        let mut saw_progress = false;

        loop {
            tokio::select! {
                line = child.next_line() => match line {
                    Some(line) => {
                        if let Some(fraction) = parser.parse_line(&line) {
                            saw_progress = true;
                            emitter.emit(fraction);
                        }
                    }
                    None => {
                        let report = child.wait().await?;
                        return Ok(AttemptEnd::Exited(report));
                    }
                },
                _ = poll.tick() => {
                    if cancel.is_cancelled() {
                        return Ok(AttemptEnd::CancelRequested);
                    }
                    if !saw_progress && Instant::now() >= grace_deadline {
                        return Ok(AttemptEnd::Stalled);
                    }
                }
            }
        }
    }

    /// Terminate a child, waiting at most the cancellation grace for it to
    /// exit before trying once more and giving up.
    async fn stop_child(&self, child: &mut dyn EncodeChild) {
        if child.kill().await.is_err() {
            return;
        }
        if tokio::time::timeout(self.cancel_grace, child.wait())
            .await
            .is_err()
        {
            warn!("Encoder did not exit within cancellation grace; force-killing");
            let _ = child.kill().await;
            let _ = tokio::time::timeout(self.cancel_grace, child.wait()).await;
        }
    }
}

/// A cancelled encode leaves a truncated file behind; remove it.
async fn remove_partial_output(output: &Path) {
    let output = PathBuf::from(output);
    if tokio::fs::try_exists(&output).await.unwrap_or(false) {
        if let Err(e) = tokio::fs::remove_file(&output).await {
            warn!("Could not remove partial output {}: {}", output.display(), e);
        }
    }
}
