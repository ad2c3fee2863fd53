//! Runtime configuration and its on-disk form
//!
//! The configuration is stored as pretty-printed JSON. Writes go through a
//! temporary file and a rename so a crash never leaves a half-written file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Configuration for evaluating procedures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads for the tokio runtime (0 uses one per core)
    pub worker_threads: usize,

    /// Enable debug tracing
    pub debug: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            debug: false,
        }
    }
}

impl RuntimeConfig {
    /// Build the multi-threaded tokio runtime procedures are evaluated on
    pub fn build_runtime(&self) -> Result<tokio::runtime::Runtime> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name("technique-worker");
        if self.worker_threads > 0 {
            builder.worker_threads(self.worker_threads);
        }
        builder.build().context("Failed to build tokio runtime")
    }

    /// Default tracing filter directive for this configuration
    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

/// Write configuration to `path`
pub fn write_config(path: &Path, config: &RuntimeConfig) -> Result<()> {
    let json = serde_json::to_vec_pretty(config).context("Failed to serialize config")?;
    replace_file(path, &json)
}

/// Load configuration from `path`
pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let data = fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let config: RuntimeConfig =
        serde_json::from_slice(&data).context("Failed to deserialize config")?;
    Ok(config)
}

/// Load configuration from `path`, first writing the defaults there if
/// nothing exists yet.
pub fn load_or_init_config(path: &Path) -> Result<RuntimeConfig> {
    if path.exists() {
        return load_config(path);
    }
    let config = RuntimeConfig::default();
    write_config(path, &config)?;
    tracing::info!(path = %path.display(), "wrote default runtime config");
    Ok(config)
}

/// Replace the contents of `path` with `data`. The bytes land in a sibling
/// `.partial` file first and are renamed over `path` once synced.
fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let partial = path.with_extension("partial");
    {
        let mut file = File::create(&partial)
            .with_context(|| format!("Failed to create {:?}", partial))?;
        file.write_all(data)
            .and_then(|()| file.sync_all())
            .with_context(|| format!("Failed to write {:?}", partial))?;
    }
    fs::rename(&partial, path).with_context(|| format!("Failed to replace {:?}", path))
}
