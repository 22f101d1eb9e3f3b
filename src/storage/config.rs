//! Configuration handling for hwtrack
//!
//! Configuration is stored in `{project}/hwtrack.toml` (project) and
//! `~/.config/hwtrack/config.toml` (global). Both are optional.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exchange::{CsvField, CsvOptions, JsonExportOptions};

/// Project config file name, at the project root
pub const PROJECT_CONFIG_FILE: &str = "hwtrack.toml";

/// Overrides the global config directory
pub const CONFIG_DIR_ENV: &str = "HWTRACK_CONFIG_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// JSON export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub pretty_print: bool,
    pub include_metadata: bool,
    pub indent_spaces: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let options = JsonExportOptions::default();
        Self {
            pretty_print: options.pretty_print,
            include_metadata: options.include_metadata,
            indent_spaces: options.indent_spaces,
        }
    }
}

impl ExportConfig {
    pub fn json_options(&self) -> JsonExportOptions {
        JsonExportOptions {
            pretty_print: self.pretty_print,
            include_metadata: self.include_metadata,
            indent_spaces: self.indent_spaces,
        }
    }
}

/// Components CSV settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub include_bom: bool,
    pub fields: Vec<CsvField>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            include_bom: false,
            fields: CsvField::ALL.to_vec(),
        }
    }
}

impl CsvConfig {
    pub fn csv_options(&self) -> CsvOptions {
        CsvOptions {
            fields: self.fields.clone(),
            include_bom: self.include_bom,
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub export: ExportConfig,
    pub csv: CsvConfig,
}

/// Global user configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Log filter used when `HWTRACK_LOG` is unset (e.g. "info")
    pub log_level: Option<String>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
}

const DEFAULT_PROJECT_CONFIG: &str = r#"# hwtrack project configuration

[export]
# JSON export formatting
pretty_print = true
include_metadata = true
indent_spaces = 2

[csv]
# Prefix CSV exports with a UTF-8 byte order mark (helps spreadsheet apps)
include_bom = false
# Columns for the components CSV
fields = ["id", "title", "status", "cost", "supplier", "partNumber", "tags", "customFields", "created", "modified"]
"#;

impl Config {
    /// Loads global configuration plus the project's, if `project_root` has one
    pub fn load(project_root: &Path) -> Result<Self> {
        Ok(Self {
            project: Self::load_project_config(project_root)?,
            global: Self::load_global()?,
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Some(PathBuf::from(dir));
        }
        ProjectDirs::from("dev", "hwtrack", "hwtrack").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        read_toml(&config_dir.join("config.toml"), "global")
    }

    /// Loads project configuration from a specific root
    pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        read_toml(&project_root.join(PROJECT_CONFIG_FILE), "project")
    }

    /// Writes a commented default `hwtrack.toml` unless one exists
    pub fn write_default_project_config(project_root: &Path) -> Result<()> {
        let config_path = project_root.join(PROJECT_CONFIG_FILE);
        if config_path.exists() {
            return Ok(());
        }

        fs::write(&config_path, DEFAULT_PROJECT_CONFIG)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))
    }
}

fn read_toml<T>(path: &Path, label: &str) -> Result<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;

    toml::from_str(&content)
        .map_err(|e| ConfigError::Parse(e.to_string()))
        .with_context(|| format!("Failed to parse {} config: {}", label, path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.project.export.pretty_print);
        assert_eq!(config.project.export.indent_spaces, 2);
        assert_eq!(config.project.csv.fields.len(), 10);
        assert_eq!(config.global.default_format, OutputFormat::Text);
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
[export]
indent_spaces = 4

[csv]
include_bom = true
fields = ["title", "partNumber", "cost"]
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.export.indent_spaces, 4);
        assert!(config.export.include_metadata);
        assert!(config.csv.include_bom);
        assert_eq!(
            config.csv.fields,
            vec![CsvField::Title, CsvField::PartNumber, CsvField::Cost]
        );
        assert_eq!(config.export.json_options().indent_spaces, 4);
    }

    #[test]
    fn parse_global_config() {
        let toml = r#"
default_format = "json"
log_level = "debug"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn default_file_matches_defaults() {
        let config: ProjectConfig = toml::from_str(DEFAULT_PROJECT_CONFIG).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_project_config(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[export\npretty_print = ").unwrap();

        let err = Config::load_project_config(dir.path()).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn write_default_is_not_destructive() {
        let dir = TempDir::new().unwrap();
        Config::write_default_project_config(dir.path()).unwrap();
        fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[csv]\ninclude_bom = true\n").unwrap();
        Config::write_default_project_config(dir.path()).unwrap();

        let config = Config::load_project_config(dir.path()).unwrap();
        assert!(config.csv.include_bom);
    }
}
