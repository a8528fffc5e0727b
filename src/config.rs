//! Application configuration
//!
//! Precedence follows CLI > environment > file > defaults. The CLI layer
//! applies its own overrides after calling [`AppConfig::load`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Tunables for probing, encoding supervision and progress emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Concurrent duration probes (0 means "number of CPUs")
    pub probe_parallelism: usize,
    /// Per-file probe timeout in seconds
    pub probe_timeout_secs: u64,
    /// How long a candidate may run without emitting valid progress before
    /// the orchestrator falls back to the next one
    pub startup_grace_secs: u64,
    /// How long to wait for a cancelled encoder to exit before force-killing
    pub cancel_grace_secs: u64,
    /// Minimum interval between progress events
    pub progress_interval_ms: u64,
    /// Capped preview length in seconds
    pub preview_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            probe_parallelism: 0,
            probe_timeout_secs: 5,
            startup_grace_secs: 10,
            cancel_grace_secs: 3,
            progress_interval_ms: 100,
            preview_seconds: 60,
        }
    }
}

const CONFIG_PATHS: &[&str] = &["vmux.toml", "config/vmux.toml"];

impl AppConfig {
    /// Load configuration: defaults, then the first config file found, then
    /// `VMUX_*` environment variables.
    pub fn load() -> Self {
        let mut config = Self::default();

        for path in CONFIG_PATHS {
            if Path::new(path).exists() {
                match std::fs::read_to_string(path) {
                    Ok(data) => match toml::from_str::<AppConfig>(&data) {
                        Ok(loaded) => {
                            info!("Loaded configuration from {}", path);
                            config = loaded;
                            break;
                        }
                        Err(e) => debug!("Ignoring malformed config {}: {}", path, e),
                    },
                    Err(e) => debug!("Could not read config {}: {}", path, e),
                }
            }
        }

        config.apply_env(std::env::vars());
        config
    }

    /// Apply `VMUX_*` overrides from an environment snapshot.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "VMUX_PROBE_PARALLELISM" => {
                    if let Ok(v) = value.parse() {
                        self.probe_parallelism = v;
                    }
                }
                "VMUX_PROBE_TIMEOUT_SECS" => {
                    if let Ok(v) = value.parse() {
                        self.probe_timeout_secs = v;
                    }
                }
                "VMUX_STARTUP_GRACE_SECS" => {
                    if let Ok(v) = value.parse() {
                        self.startup_grace_secs = v;
                    }
                }
                "VMUX_CANCEL_GRACE_SECS" => {
                    if let Ok(v) = value.parse() {
                        self.cancel_grace_secs = v;
                    }
                }
                "VMUX_PROGRESS_INTERVAL_MS" => {
                    if let Ok(v) = value.parse() {
                        self.progress_interval_ms = v;
                    }
                }
                "VMUX_PREVIEW_SECONDS" => {
                    if let Ok(v) = value.parse() {
                        self.preview_seconds = v;
                    }
                }
                _ => {}
            }
        }
    }

    /// Effective probe parallelism ceiling
    pub fn probe_parallelism(&self) -> usize {
        if self.probe_parallelism == 0 {
            num_cpus::get()
        } else {
            self.probe_parallelism
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_secs(self.startup_grace_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.probe_timeout_secs, 5);
        assert_eq!(config.preview_seconds, 60);
        assert!(config.probe_parallelism() >= 1);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(vec![
            ("VMUX_PROBE_TIMEOUT_SECS".to_string(), "9".to_string()),
            ("VMUX_PREVIEW_SECONDS".to_string(), "30".to_string()),
            ("HOME".to_string(), "/root".to_string()),
            ("VMUX_CANCEL_GRACE_SECS".to_string(), "bogus".to_string()),
        ]);
        assert_eq!(config.probe_timeout_secs, 9);
        assert_eq!(config.preview_seconds, 30);
        // Unparseable values keep the previous setting.
        assert_eq!(config.cancel_grace_secs, 3);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: AppConfig = toml::from_str("probe_timeout_secs = 2\n").unwrap();
        assert_eq!(parsed.probe_timeout_secs, 2);
        assert_eq!(parsed.startup_grace_secs, 10);
    }
}
