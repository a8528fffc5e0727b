//! Command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::args::{DoctorArgs, ExportArgs, PreviewArgs, ProbeArgs};
use crate::config::AppConfig;
use crate::domain::model::{is_supported_media, Project, Settings};
use crate::encoders::gpu_status;
use crate::export::{self, Exporter};
use crate::probe::{check_dependencies, DurationProber};
use crate::utils::format_duration;

/// Execute the export command
pub async fn export(args: ExportArgs, config: AppConfig) -> Result<()> {
    info!("Starting export operation");
    info!("Project: {}", args.project);
    info!("Output: {}", args.output);

    let mut project = Project::load(Path::new(&args.project))
        .context("Failed to load project file")?;
    apply_overrides(&mut project.settings, &args);

    let exporter = Arc::new(Exporter::new(config));
    let cancel_task = spawn_cancel_handler(&exporter);
    let progress_task = spawn_progress_reporter(&exporter, args.json);

    let outcome = exporter.export(&project, Path::new(&args.output)).await;

    progress_task.abort();
    cancel_task.abort();
    let outcome = outcome?;

    if args.json {
        emit_event("done", json!({ "outcome": outcome }));
    }

    if outcome.success {
        if !args.json {
            println!(
                "Export complete: {} (encoder {}, {})",
                args.output,
                outcome.encoder.as_deref().unwrap_or("unknown"),
                format_duration(outcome.elapsed_seconds)
            );
        }
        info!("Export operation completed successfully");
        Ok(())
    } else if outcome.cancelled {
        if !args.json {
            println!(
                "Export cancelled after {}",
                format_duration(outcome.elapsed_seconds)
            );
        }
        info!("Export operation cancelled");
        Ok(())
    } else {
        let reason = outcome
            .error
            .unwrap_or_else(|| "encode failed".to_string());
        Err(anyhow::anyhow!(reason))
    }
}

/// Execute the preview command
pub async fn preview(args: PreviewArgs, config: AppConfig) -> Result<()> {
    info!("Starting preview operation");
    info!("Project: {}", args.project);

    let removed = export::cleanup_previews();
    if removed > 0 {
        info!("Removed {} stale preview file(s)", removed);
    }

    let project = Project::load(Path::new(&args.project))
        .context("Failed to load project file")?;

    let exporter = Arc::new(Exporter::new(config));
    let cancel_task = spawn_cancel_handler(&exporter);
    let progress_task = spawn_progress_reporter(&exporter, false);

    let result = exporter.preview(&project, !args.full).await;

    progress_task.abort();
    cancel_task.abort();
    let Some(path) = result.context("Failed to render preview")? else {
        println!("Preview cancelled");
        return Ok(());
    };

    println!("Preview written to {}", path.display());

    if args.play {
        export::play(&path).context("Failed to launch ffplay")?;
    }

    info!("Preview operation completed successfully");
    Ok(())
}

/// Execute the probe command
pub async fn probe(args: ProbeArgs, config: AppConfig) -> Result<()> {
    let paths = expand_inputs(&args.inputs);
    if paths.is_empty() {
        return Err(anyhow::anyhow!("No supported media files found"));
    }

    crate::probe::tools::require("ffprobe").context("ffprobe is required for probing")?;
    info!("Probing {} file(s)", paths.len());

    let prober = DurationProber::from_config(&config);
    let outcomes = prober.probe_paths(&paths).await;

    if args.json {
        let entries: Vec<_> = outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(duration) => json!({ "path": o.path, "duration": duration }),
                Err(e) => json!({ "path": o.path, "error": e.to_string() }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for outcome in &outcomes {
            match &outcome.result {
                Ok(duration) => {
                    println!("{:>12}  {}", format_duration(*duration), outcome.path)
                }
                Err(e) => println!("{:>12}  {} ({})", "error", outcome.path, e),
            }
        }
    }

    let failures = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failures > 0 {
        warn!("{} of {} file(s) could not be probed", failures, outcomes.len());
    }
    Ok(())
}

/// Execute the doctor command
pub async fn doctor(args: DoctorArgs) -> Result<()> {
    let deps = check_dependencies();
    let gpu = if deps.has_ffmpeg {
        Some(gpu_status())
    } else {
        None
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "tools": deps,
                "gpu": gpu,
            }))?
        );
        return Ok(());
    }

    println!("Toolchain");
    println!("=========");
    println!("  {} ffmpeg", mark(deps.has_ffmpeg));
    println!("  {} ffprobe", mark(deps.has_ffprobe));
    println!("  {} ffplay (optional, preview playback)", mark(deps.has_ffplay));
    println!();

    match gpu {
        Some(status) if status.available => {
            println!("GPU encoder");
            println!("===========");
            println!(
                "  {} {} ({})",
                mark(true),
                status.encoder.as_deref().unwrap_or("unknown"),
                status.vendor.as_deref().unwrap_or("unknown")
            );
        }
        Some(_) => {
            println!("GPU encoder");
            println!("===========");
            println!("  {} none usable; exports fall back to libx264", mark(false));
        }
        None => println!("GPU detection skipped (ffmpeg missing)"),
    }

    if !deps.has_ffmpeg || !deps.has_ffprobe {
        return Err(anyhow::anyhow!(
            "ffmpeg and ffprobe are required; install FFmpeg and ensure it is on PATH"
        ));
    }
    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

fn apply_overrides(settings: &mut Settings, args: &ExportArgs) {
    if let Some(preset) = args.preset {
        settings.speed_preset = preset;
    }
    if args.no_gpu {
        settings.use_gpu = false;
    }
    if let Some(volume) = args.source_volume {
        settings.source_audio_volume = volume;
    }
    if let Some(volume) = args.track_volume {
        settings.track_volume = volume;
    }
}

/// Flatten files and directories into a probe list; directories are walked
/// recursively for supported media, in name order.
fn expand_inputs(inputs: &[String]) -> Vec<String> {
    let mut paths = Vec::new();
    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name().into_iter().flatten() {
                if entry.file_type().is_file() && is_supported_media(entry.path()) {
                    paths.push(entry.path().to_string_lossy().into_owned());
                }
            }
        } else {
            paths.push(input.clone());
        }
    }
    paths
}

/// Cancel the active job on Ctrl-C instead of killing the process outright,
/// so partial output cleanup still runs.
fn spawn_cancel_handler(exporter: &Arc<Exporter>) -> tokio::task::JoinHandle<()> {
    let exporter = Arc::clone(exporter);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested");
            exporter.cancel();
        }
    })
}

/// Report percent progress: JSON events on stdout, or an updating line on
/// stderr for humans.
fn spawn_progress_reporter(exporter: &Arc<Exporter>, as_json: bool) -> tokio::task::JoinHandle<()> {
    let mut rx = exporter.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let percent = *rx.borrow_and_update();
            if as_json {
                emit_event("progress", json!({ "percent": percent }));
            } else {
                eprint!("\rProgress: {:5.1}%", percent);
                if percent >= 100.0 {
                    eprintln!();
                }
            }
        }
    })
}

fn emit_event(event: &str, mut fields: serde_json::Value) {
    if let Some(obj) = fields.as_object_mut() {
        obj.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        obj.insert("event".to_string(), json!(event));
    }
    println!("{}", fields);
}
