//! Weft runtime configuration
//!
//! Supports file-level and environment-level configuration with merge
//! semantics.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high -> low):
//! 1. Environment variables (WEFT_*)
//! 2. Config file (weft.json, or $WEFT_CONFIG)
//! 3. Default values
//! ```

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of locales the runtime models.
    #[serde(default = "default_num_locales")]
    pub num_locales: u16,
    /// Worker threads per locale.
    #[serde(default = "default_workers_per_locale")]
    pub workers_per_locale: usize,
    /// Work stealing batch size.
    #[serde(default = "default_steal_batch")]
    pub steal_batch: usize,
    /// Idle timeout in milliseconds before a parked worker re-checks its
    /// queues.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

fn default_num_locales() -> u16 {
    1
}

fn default_workers_per_locale() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_steal_batch() -> usize {
    4
}

fn default_idle_timeout_ms() -> u64 {
    1
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_locales: default_num_locales(),
            workers_per_locale: default_workers_per_locale(),
            steal_batch: default_steal_batch(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl RuntimeConfig {
    /// Load a config file (JSON).
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply `WEFT_*` environment variable overrides.
    pub fn merge_env(mut self) -> Self {
        if let Some(n) = env_parse::<u16>("WEFT_NUM_LOCALES") {
            self.num_locales = n;
        }
        if let Some(n) = env_parse::<usize>("WEFT_WORKERS_PER_LOCALE") {
            self.workers_per_locale = n;
        }
        if let Some(n) = env_parse::<usize>("WEFT_STEAL_BATCH") {
            self.steal_batch = n;
        }
        if let Some(n) = env_parse::<u64>("WEFT_IDLE_TIMEOUT_MS") {
            self.idle_timeout_ms = n;
        }
        self
    }

    /// Defaults, then the config file if present, then the environment.
    pub fn from_env() -> Self {
        let path = std::env::var("WEFT_CONFIG").unwrap_or_else(|_| "weft.json".to_string());
        let base = if Path::new(&path).exists() {
            match Self::load(&path) {
                Ok(config) => config,
                Err(err) => {
                    warn!("ignoring unreadable config {}: {}", path, err);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        base.merge_env()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(val) => Some(val),
        Err(_) => {
            warn!("ignoring malformed {}={}", key, raw);
            None
        }
    }
}

/// Process-wide config snapshot, resolved once on first use.
pub static DEFAULT_CONFIG: Lazy<RuntimeConfig> = Lazy::new(RuntimeConfig::from_env);
