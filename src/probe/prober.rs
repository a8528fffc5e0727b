//! Duration prober
//!
//! Runs ffprobe once per file, many files at a time, with a bounded
//! parallelism ceiling and a per-probe timeout. Each path gets its own
//! result: a corrupt file or a hung probe never takes its siblings down.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::domain::model::Project;
use crate::error::{VmuxError, VmuxResult};
use crate::utils::time::parse_sexagesimal;

/// Result of probing one path
#[derive(Debug)]
pub struct ProbeOutcome {
    pub path: String,
    pub result: VmuxResult<f64>,
}

/// Concurrent ffprobe duration prober
pub struct DurationProber {
    parallelism: usize,
    timeout: Duration,
}

impl DurationProber {
    pub fn new(parallelism: usize, timeout: Duration) -> Self {
        Self {
            parallelism: parallelism.max(1),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.probe_parallelism(), config.probe_timeout())
    }

    /// Probe every path, returning outcomes in input order.
    pub async fn probe_paths(&self, paths: &[String]) -> Vec<ProbeOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut set = JoinSet::new();

        for (index, path) in paths.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let path = path.clone();
            let timeout = self.timeout;
            set.spawn(async move {
                // Closed-semaphore acquire cannot happen; the semaphore
                // outlives every task here.
                let _permit = semaphore.acquire_owned().await;
                let result = probe_one(&path, timeout).await;
                (index, ProbeOutcome { path, result })
            });
        }

        let mut outcomes: Vec<Option<ProbeOutcome>> = (0..paths.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => warn!("Probe task panicked: {}", e),
            }
        }

        outcomes
            .into_iter()
            .zip(paths)
            .map(|(slot, path)| {
                slot.unwrap_or_else(|| ProbeOutcome {
                    path: path.clone(),
                    result: Err(VmuxError::ProbeFailure {
                        path: path.clone(),
                        reason: "probe task aborted".to_string(),
                    }),
                })
            })
            .collect()
    }

    /// Probe all clip and track paths of a project and fill in durations.
    /// Returns the failed outcomes so the caller can flag individual files.
    pub async fn probe_project(&self, project: &mut Project) -> Vec<ProbeOutcome> {
        let paths: Vec<String> = project
            .clips
            .iter()
            .map(|c| c.path.clone())
            .chain(project.tracks.iter().map(|t| t.path.clone()))
            .collect();

        let outcomes = self.probe_paths(&paths).await;

        let clip_count = project.clips.len();
        for (index, outcome) in outcomes.iter().enumerate() {
            let duration = match &outcome.result {
                Ok(d) => Some(*d),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            };
            if index < clip_count {
                project.clips[index].duration = duration;
            } else {
                project.tracks[index - clip_count].duration = duration;
            }
        }

        outcomes
            .into_iter()
            .filter(|o| o.result.is_err())
            .collect()
    }
}

/// Probe one file, trying the quick ffprobe query first and the JSON query
/// as a fallback (Matroska often reports duration only via stream tags).
async fn probe_one(path: &str, timeout: Duration) -> VmuxResult<f64> {
    if !Path::new(path).exists() {
        return Err(VmuxError::ProbeFailure {
            path: path.to_string(),
            reason: "file not found".to_string(),
        });
    }

    let probe = async {
        if let Some(duration) = duration_quick(path).await? {
            return Ok(duration);
        }
        if let Some(duration) = duration_json(path).await? {
            return Ok(duration);
        }
        Err(VmuxError::ProbeFailure {
            path: path.to_string(),
            reason: "duration could not be determined".to_string(),
        })
    };

    match tokio::time::timeout(timeout, probe).await {
        Ok(result) => {
            if let Ok(duration) = &result {
                debug!("Probed {}: {:.3}s", path, duration);
            }
            result
        }
        Err(_) => Err(VmuxError::ProbeFailure {
            path: path.to_string(),
            reason: format!("probe timed out after {}s", timeout.as_secs()),
        }),
    }
}

/// `ffprobe -show_entries format=duration` with plain output
async fn duration_quick(path: &str) -> VmuxResult<Option<f64>> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=nw=1:nk=1",
            path,
        ])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| probe_error(path, e))?;

    let text = String::from_utf8_lossy(&output.stdout);
    let text = text.trim();
    if !text.is_empty() && text != "N/A" {
        if let Ok(duration) = text.parse::<f64>() {
            if duration > 0.0 {
                return Ok(Some(duration));
            }
        }
    }
    Ok(None)
}

/// JSON probe taking the maximum of format, stream and tag durations
async fn duration_json(path: &str) -> VmuxResult<Option<f64>> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_entries",
            "format=duration,stream=duration,stream_tags",
            path,
        ])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| probe_error(path, e))?;

    let json: serde_json::Value = match serde_json::from_slice(&output.stdout) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let mut durations: Vec<f64> = Vec::new();
    if let Some(d) = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|d| d.parse::<f64>().ok())
    {
        durations.push(d);
    }
    if let Some(streams) = json.get("streams").and_then(|s| s.as_array()) {
        for stream in streams {
            if let Some(d) = stream
                .get("duration")
                .and_then(|d| d.as_str())
                .and_then(|d| d.parse::<f64>().ok())
            {
                durations.push(d);
            }
            if let Some(d) = stream
                .get("tags")
                .and_then(|t| t.get("DURATION"))
                .and_then(|d| d.as_str())
                .and_then(parse_sexagesimal)
            {
                durations.push(d);
            }
        }
    }

    Ok(durations
        .into_iter()
        .filter(|d| *d > 0.0)
        .fold(None, |acc: Option<f64>, d| {
            Some(acc.map_or(d, |a| a.max(d)))
        }))
}

fn probe_error(path: &str, e: std::io::Error) -> VmuxError {
    if e.kind() == std::io::ErrorKind::NotFound {
        VmuxError::ToolMissing {
            tool: "ffprobe".to_string(),
        }
    } else {
        VmuxError::ProbeFailure {
            path: path.to_string(),
            reason: e.to_string(),
        }
    }
}
