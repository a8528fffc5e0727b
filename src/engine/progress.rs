//! Progress parsing and rate-limited emission
//!
//! ffmpeg is run with `-progress pipe:1 -nostats`, which prints
//! `key=value` lines. The parser turns those into a monotone completion
//! fraction; the emitter forwards it to a watch channel at a bounded rate
//! so a slow consumer can never stall the encode loop.

use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Parses `-progress` output lines into a fraction of the total duration.
///
/// Pure per-line state machine, so the orchestrator is testable without a
/// real ffmpeg process.
#[derive(Debug)]
pub struct ProgressParser {
    total_seconds: f64,
    fraction: f64,
}

impl ProgressParser {
    pub fn new(total_seconds: f64) -> Self {
        Self {
            total_seconds,
            fraction: 0.0,
        }
    }

    /// Feed one line; returns the updated fraction when the line carried a
    /// valid position. The fraction never decreases and stays in [0, 1].
    ///
    /// ffmpeg emits `out_time_us` and the misnamed `out_time_ms`, both in
    /// microseconds.
    pub fn parse_line(&mut self, line: &str) -> Option<f64> {
        let line = line.trim();

        if line == "progress=end" {
            self.fraction = 1.0;
            return Some(self.fraction);
        }

        let micros: f64 = line
            .strip_prefix("out_time_us=")
            .or_else(|| line.strip_prefix("out_time_ms="))
            .and_then(|v| v.trim().parse().ok())?;

        if self.total_seconds <= 0.0 || micros < 0.0 {
            return None;
        }

        let fraction = (micros / 1_000_000.0 / self.total_seconds).clamp(0.0, 1.0);
        if fraction > self.fraction {
            self.fraction = fraction;
        }
        Some(self.fraction)
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

/// Rate-limited, monotone percent emitter over a watch channel
pub struct ProgressEmitter {
    tx: watch::Sender<f32>,
    interval: Duration,
    last_emit: Option<Instant>,
    max_percent: f32,
}

impl ProgressEmitter {
    pub fn new(tx: watch::Sender<f32>, interval: Duration) -> Self {
        let _ = tx.send(0.0);
        Self {
            tx,
            interval,
            last_emit: None,
            max_percent: 0.0,
        }
    }

    /// Emit a fraction in [0, 1], rate-limited. Falling back to another
    /// encoder restarts the encode, but the emitted percent stays monotone
    /// so the retry is invisible to the consumer.
    pub fn emit(&mut self, fraction: f64) {
        let due = match self.last_emit {
            Some(at) => at.elapsed() >= self.interval,
            None => true,
        };
        if !due {
            return;
        }
        let percent = (fraction * 100.0).clamp(0.0, 100.0) as f32;
        if percent > self.max_percent {
            self.max_percent = percent;
            self.last_emit = Some(Instant::now());
            let _ = self.tx.send(percent);
        }
    }

    /// Emit a terminal value immediately, bypassing the rate limit.
    pub fn finish(&mut self) {
        self.max_percent = 100.0;
        let _ = self.tx.send(100.0);
    }
}
