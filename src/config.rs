//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.physio-agg.toml` files.

use crate::analysis::DEFAULT_CHUNK_SIZE;
use crate::cli::{Args, OutputFormat};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".physio-agg.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input settings.
    #[serde(default)]
    pub data: DataConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Input locations and chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Folder holding `{SID}_whole_df.csv` files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Participant info CSV with the `SID` column.
    #[serde(default = "default_roster")]
    pub roster: PathBuf,

    /// Maximum rows per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            roster: default_roster(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_roster() -> PathBuf {
    PathBuf::from("./participant_info.csv")
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Report file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report file to write, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Report file format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Include the per-subject sleep-stage section in Markdown reports.
    #[serde(default = "default_true")]
    pub include_stage_distribution: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: None,
            format: OutputFormat::default(),
            include_stage_distribution: true,
        }
    }
}

fn default_true() -> bool {
    true
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
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref dir) = args.data_dir {
            self.data.data_dir = dir.clone();
        }
        if let Some(ref roster) = args.roster {
            self.data.roster = roster.clone();
        }
        if let Some(size) = args.chunk_size {
            self.data.chunk_size = size;
        }

        if let Some(ref output) = args.output {
            self.report.output = Some(output.clone());
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check that the inputs exist before any subject is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if !self.data.data_dir.is_dir() {
            return Err(ConfigError::InvalidDataDir(self.data.data_dir.clone()));
        }
        if !self.data.roster.is_file() {
            return Err(ConfigError::MissingRoster(self.data.roster.clone()));
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.data_dir, PathBuf::from("./data"));
        assert_eq!(config.data.roster, PathBuf::from("./participant_info.csv"));
        assert_eq!(config.data.chunk_size, 1_000_000);
        assert!(config.report.output.is_none());
        assert!(config.report.include_stage_distribution);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[data]
data_dir = "/srv/cohort/data"
chunk_size = 50000

[report]
output = "summary.json"
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.data.data_dir, PathBuf::from("/srv/cohort/data"));
        assert_eq!(config.data.roster, PathBuf::from("./participant_info.csv"));
        assert_eq!(config.data.chunk_size, 50000);
        assert_eq!(config.report.output, Some(PathBuf::from("summary.json")));
        assert_eq!(config.report.format, OutputFormat::Json);
    }

    #[test]
    fn test_merge_only_explicit_args() {
        let mut config = Config::default();
        config.data.chunk_size = 500;

        let mut args = crate::cli::tests::make_args();
        args.roster = Some(PathBuf::from("roster.csv"));
        args.format = Some(OutputFormat::Json);
        config.merge_with_args(&args);

        assert_eq!(config.data.roster, PathBuf::from("roster.csv"));
        assert_eq!(config.data.chunk_size, 500);
        assert_eq!(config.data.data_dir, PathBuf::from("./data"));
        assert_eq!(config.report.format, OutputFormat::Json);
    }

    #[test]
    fn test_validate_paths() {
        let dir = TempDir::new().unwrap();
        let roster = dir.path().join("participant_info.csv");
        fs::write(&roster, "SID\nA\n").unwrap();

        let mut config = Config::default();
        config.data.data_dir = dir.path().to_path_buf();
        config.data.roster = roster;
        assert!(config.validate().is_ok());

        config.data.chunk_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroChunkSize)));

        config.data.chunk_size = 10;
        config.data.data_dir = dir.path().join("missing");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDataDir(_))
        ));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[data]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("chunk_size = 1000000"));
    }
}
