//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.loescope.toml` files.

use crate::analysis::{GroupingKey, DEFAULT_TOP_SECTIONS};
use crate::cli::OutputFormat;
use crate::questionnaire::{RequiredPolicy, WireVersion};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".loescope.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Assessment service settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Questionnaire settings.
    #[serde(default)]
    pub assessment: AssessmentConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Write reports to this file instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Assessment service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the assessment service API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds. 0 waits indefinitely.
    #[serde(default)]
    pub timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: 0,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Sections shown in the hours distribution chart.
    #[serde(default = "default_top_sections")]
    pub top_sections: usize,

    /// Field used to group sub-areas into sections.
    #[serde(default)]
    pub grouping: GroupingKey,

    /// Cross-check the service LOE summary against a local rollup.
    #[serde(default)]
    pub verify_consistency: bool,

    /// List indicators of compliance under each sub-area.
    #[serde(default = "default_true")]
    pub show_indicators: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            top_sections: default_top_sections(),
            grouping: GroupingKey::default(),
            verify_consistency: false,
            show_indicators: true,
        }
    }
}

fn default_top_sections() -> usize {
    DEFAULT_TOP_SECTIONS
}

fn default_true() -> bool {
    true
}

/// Questionnaire settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentConfig {
    /// Wire format for submitted answers.
    #[serde(default)]
    pub wire_version: WireVersion,

    /// Which questions must be answered.
    #[serde(default)]
    pub required: RequiredPolicy,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.loescope.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually supplied.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.service.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.service.timeout_seconds = timeout;
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
