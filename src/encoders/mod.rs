//! Encoder capability detection and ranking
//!
//! Probes the host once per process for usable hardware H.264 encoders and
//! produces the ordered candidate list the orchestrator falls back across.
//! Detection never fails: a missing encoder, missing hardware or a failed
//! test encode narrows the list instead of surfacing an error. The
//! software encoder is always present and always last.

use std::process::{Command, Stdio};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::model::SpeedPreset;

/// Encoder vendor families, in fallback priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Nvidia,
    Intel,
    Amd,
    Vaapi,
    Software,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Nvidia => "nvidia",
            Vendor::Intel => "intel",
            Vendor::Amd => "amd",
            Vendor::Vaapi => "vaapi",
            Vendor::Software => "software",
        }
    }
}

/// One hardware-or-software encoder option considered by the fallback loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncoderCandidate {
    pub vendor: Vendor,
    pub encoder: &'static str,
}

impl EncoderCandidate {
    pub const fn software() -> Self {
        Self {
            vendor: Vendor::Software,
            encoder: "libx264",
        }
    }

    pub fn is_hardware(&self) -> bool {
        self.vendor != Vendor::Software
    }
}

/// GPU status surfaced to the UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuStatus {
    pub available: bool,
    pub vendor: Option<String>,
    pub encoder: Option<String>,
}

/// Hardware candidates in priority order, highest first
const HARDWARE_CANDIDATES: &[EncoderCandidate] = &[
    EncoderCandidate {
        vendor: Vendor::Nvidia,
        encoder: "h264_nvenc",
    },
    EncoderCandidate {
        vendor: Vendor::Intel,
        encoder: "h264_qsv",
    },
    EncoderCandidate {
        vendor: Vendor::Amd,
        encoder: "h264_amf",
    },
    EncoderCandidate {
        vendor: Vendor::Vaapi,
        encoder: "h264_vaapi",
    },
];

const VAAPI_DEVICE: &str = "/dev/dri/renderD128";

/// Assemble the candidate list from an `ffmpeg -encoders` listing and a
/// per-candidate test. Split out from [`detect_candidates`] so the ordering
/// policy is testable without hardware.
fn candidates_from<F>(listing: &str, mut usable: F) -> Vec<EncoderCandidate>
where
    F: FnMut(&EncoderCandidate) -> bool,
{
    let mut candidates: Vec<EncoderCandidate> = HARDWARE_CANDIDATES
        .iter()
        .filter(|c| listing.contains(c.encoder))
        .filter(|c| usable(c))
        .copied()
        .collect();
    candidates.push(EncoderCandidate::software());
    candidates
}

/// Detect the ordered encoder candidate list, cached for the process
/// lifetime. Never fails: with no ffmpeg at all the list is just the
/// software candidate (whose own launch failure is reported at encode time).
pub fn detect_candidates() -> &'static [EncoderCandidate] {
    static CANDIDATES: OnceLock<Vec<EncoderCandidate>> = OnceLock::new();
    CANDIDATES.get_or_init(|| {
        let listing = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
            .unwrap_or_default();

        let candidates = candidates_from(&listing, |c| {
            let ok = test_encoder(c);
            debug!("Encoder {} usable: {}", c.encoder, ok);
            ok
        });
        info!(
            "Encoder candidates: {}",
            candidates
                .iter()
                .map(|c| c.encoder)
                .collect::<Vec<_>>()
                .join(" > ")
        );
        candidates
    })
}

/// Candidate list honoring the GPU preference. With `use_gpu` off the list
/// begins (and ends) at the software candidate.
pub fn candidate_list(use_gpu: bool) -> Vec<EncoderCandidate> {
    if use_gpu {
        detect_candidates().to_vec()
    } else {
        vec![EncoderCandidate::software()]
    }
}

/// GPU status for the UI boundary.
pub fn gpu_status() -> GpuStatus {
    let first_hw = detect_candidates().iter().find(|c| c.is_hardware());
    GpuStatus {
        available: first_hw.is_some(),
        vendor: first_hw.map(|c| c.vendor.as_str().to_string()),
        encoder: first_hw.map(|c| c.encoder.to_string()),
    }
}

/// Try a tiny test encode of a synthetic source. Any failure (missing
/// hardware, missing device node, driver refusal) means "not usable".
fn test_encoder(candidate: &EncoderCandidate) -> bool {
    let mut cmd = Command::new("ffmpeg");
    cmd.args([
        "-hide_banner",
        "-f",
        "lavfi",
        "-i",
        "color=black:s=256x256:d=0.1",
    ]);

    if candidate.vendor == Vendor::Vaapi {
        cmd.args(["-vaapi_device", VAAPI_DEVICE]);
        cmd.args(["-vf", "format=nv12,hwupload"]);
    }

    cmd.args(["-c:v", candidate.encoder, "-f", "null", "-"]);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    cmd.status().map(|s| s.success()).unwrap_or(false)
}

/// Input-side hardware acceleration flags, placed before the `-i` inputs.
pub fn hwaccel_args(vendor: Vendor) -> Vec<String> {
    match vendor {
        Vendor::Nvidia => vec!["-hwaccel".into(), "cuda".into()],
        Vendor::Intel => vec!["-hwaccel".into(), "qsv".into()],
        Vendor::Vaapi => vec!["-vaapi_device".into(), VAAPI_DEVICE.into()],
        Vendor::Amd | Vendor::Software => Vec::new(),
    }
}

/// Quality/speed tuning for one candidate: the vendor-specific preset flag
/// plus fixed rate-control parameters.
pub fn tuning_args(vendor: Vendor, preset: SpeedPreset) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    match vendor {
        Vendor::Nvidia => {
            let p = match preset {
                SpeedPreset::Ultrafast => "p1",
                SpeedPreset::Fast => "p4",
                SpeedPreset::Balanced => "p5",
                SpeedPreset::Quality => "p7",
            };
            args.extend(["-preset".into(), p.into()]);
            args.extend([
                "-rc".into(),
                "vbr".into(),
                "-cq".into(),
                "20".into(),
                "-b:v".into(),
                "0".into(),
            ]);
        }
        Vendor::Amd => {
            let q = match preset {
                SpeedPreset::Ultrafast => "speed",
                SpeedPreset::Fast | SpeedPreset::Balanced => "balanced",
                SpeedPreset::Quality => "quality",
            };
            args.extend(["-quality".into(), q.into()]);
            args.extend([
                "-rc".into(),
                "vbr_latency".into(),
                "-qp_p".into(),
                "20".into(),
                "-qp_i".into(),
                "20".into(),
            ]);
        }
        Vendor::Intel => {
            let p = match preset {
                SpeedPreset::Ultrafast => "veryfast",
                SpeedPreset::Fast => "fast",
                SpeedPreset::Balanced => "medium",
                SpeedPreset::Quality => "veryslow",
            };
            args.extend(["-preset".into(), p.into()]);
            args.extend([
                "-global_quality".into(),
                "20".into(),
                "-look_ahead".into(),
                "1".into(),
            ]);
        }
        Vendor::Vaapi => {
            args.extend(["-qp".into(), "20".into()]);
        }
        Vendor::Software => {
            let p = match preset {
                SpeedPreset::Ultrafast => "ultrafast",
                SpeedPreset::Fast => "veryfast",
                SpeedPreset::Balanced => "medium",
                SpeedPreset::Quality => "slow",
            };
            args.extend(["-preset".into(), p.into()]);
            args.extend(["-crf".into(), "20".into()]);
        }
    }
    args
}
