//! Top-level TOML configuration.
//!
//! Only `[config].script` is required for config generation; the remaining
//! sections describe the out-of-scope build/install pipeline and are parsed
//! here so a complete file validates early.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Parsed `/etc/autokernel/config.toml` (or `--config` override).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutokernelConfig {
    pub config: ConfigSection,
    #[serde(default)]
    pub initramfs: InitramfsSection,
    #[serde(default)]
    pub install: InstallSection,
}

/// `[config]`: the configuration program and output location.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// The configuration program (.lua, .txt or .config).
    pub script: PathBuf,
    /// Default output path for generate-config.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// `[initramfs]`: consumed by the external build pipeline.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitramfsSection {
    #[serde(default)]
    pub enable: bool,
    /// Integrate the initramfs into the kernel image.
    #[serde(default)]
    pub builtin: bool,
    /// Generator command; `{OUTPUT}`, `{KERNEL_VERSION}` and
    /// `{MODULES_DIR}` are substituted.
    #[serde(default)]
    pub command: Vec<String>,
}

/// `[install]`: artifact destinations, `{KERNEL_VERSION}` substituted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallSection {
    #[serde(default)]
    pub config: Option<PathBuf>,
    #[serde(default)]
    pub initramfs: Option<PathBuf>,
}

/// Load and validate the configuration file.
pub fn load(path: &Path) -> Result<AutokernelConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("could not read configuration {}", path.display()))?;
    let config: AutokernelConfig = toml::from_str(&content)
        .with_context(|| format!("could not parse configuration {}", path.display()))?;
    Ok(config)
}
