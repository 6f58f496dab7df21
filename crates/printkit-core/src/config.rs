//! Configuration for printkit
//!
//! Collapses the mode flags of the post-processing pipeline into one
//! immutable record that is handed to the transformer and orchestrator
//! at pass start. Supports JSON and TOML file formats.
//!
//! Configuration is organized into logical sections:
//! - Post-processing flags (corrections, dual-toolhead, MMU)
//! - Slicer acceptance policy (unsupported versions, unknown generators)
//! - Worker scheduling (timeout, poll interval, yield granularity)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tool-select command form written by the transformer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCommandStyle {
    /// Bare `T<n>` token with appended targets
    Bare,
    /// Multi-material-unit form: `TOOL T=<n> X=... Y=... Z=...`
    Mmu,
}

impl Default for ToolCommandStyle {
    fn default() -> Self {
        Self::Bare
    }
}

impl std::fmt::Display for ToolCommandStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bare => write!(f, "bare"),
            Self::Mmu => write!(f, "mmu"),
        }
    }
}

/// Complete post-processing configuration
///
/// Built once by the caller, consumed by value at pass start, never
/// mutated mid-pass. The boolean policy flags that were scattered over
/// the command handlers in older firmwares live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessConfig {
    /// Rewrite the file in place; when false the pass only extracts the
    /// first motion coordinates and exits early
    pub apply_corrections: bool,
    /// Printer has two independent tool carriages
    pub idex: bool,
    /// Tool-select command form (bare token or MMU named command)
    pub tool_command_style: ToolCommandStyle,
    /// Accept slicer versions the worker does not know
    pub allow_unsupported_slicer_versions: bool,
    /// Treat an unrecognized slicer header as acceptable instead of fatal
    pub allow_unknown_generator: bool,
    /// Worker deadline in seconds, measured from pass start
    pub worker_timeout_secs: u64,
    /// Worker poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Cede control to the host after this many processed lines
    pub yield_every_lines: usize,
    /// Post-processor executable for the out-of-process path
    pub worker_command: String,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            apply_corrections: true,
            idex: false,
            tool_command_style: ToolCommandStyle::default(),
            allow_unsupported_slicer_versions: false,
            allow_unknown_generator: false,
            worker_timeout_secs: 600,
            poll_interval_ms: 50,
            yield_every_lines: 1000,
            worker_command: "printkit-postprocessor".to_string(),
        }
    }
}

impl PostProcessConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::other(format!("Failed to read config file: {}", e)))?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| Error::other(format!("Invalid JSON config: {}", e)))?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| Error::other(format!("Invalid TOML config: {}", e)))?
        } else {
            return Err(Error::other(
                "Config file must be .json or .toml".to_string(),
            ));
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)
                .map_err(|e| Error::other(format!("Failed to serialize config: {}", e)))?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self)
                .map_err(|e| Error::other(format!("Failed to serialize config: {}", e)))?
        } else {
            return Err(Error::other(
                "Config file must be .json or .toml".to_string(),
            ));
        };

        std::fs::write(path, content)
            .map_err(|e| Error::other(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_timeout_secs == 0 {
            return Err(Error::other("Worker timeout must be > 0".to_string()));
        }

        if self.poll_interval_ms == 0 {
            return Err(Error::other("Poll interval must be > 0".to_string()));
        }

        if self.yield_every_lines == 0 {
            return Err(Error::other("Yield granularity must be > 0".to_string()));
        }

        if self.worker_command.trim().is_empty() {
            return Err(Error::other("Worker command must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(PostProcessConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = PostProcessConfig {
            worker_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printkit.toml");

        let mut config = PostProcessConfig::default();
        config.idex = true;
        config.tool_command_style = ToolCommandStyle::Mmu;
        config.save_to_file(&path).unwrap();

        let loaded = PostProcessConfig::load_from_file(&path).unwrap();
        assert!(loaded.idex);
        assert_eq!(loaded.tool_command_style, ToolCommandStyle::Mmu);
    }

    #[test]
    fn unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printkit.ini");
        assert!(PostProcessConfig::default().save_to_file(&path).is_err());
    }
}
