//! Settings file (`.tlint.yaml`) model and loader
//!
//! The settings file names where the shared golangci-lint config comes from,
//! how to obtain the golangci-lint binary, and the team overrides merged on
//! top of the shared config.

use serde::{Deserialize, Deserializer};
use serde_yaml::Mapping;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use url::Url;

/// Default settings file path
pub const DEFAULT_SETTINGS_PATH: &str = ".tlint.yaml";

/// Working directory used when `tlint.dir` is not set
pub const DEFAULT_WORKING_DIR: &str = ".tlint";

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid settings: {}", violations.join("; "))]
    Validation { violations: Vec<String> },
}

/// `tlint` section
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TlintSection {
    /// Working directory for the materialized config and downloaded binary
    #[serde(default, deserialize_with = "empty_as_none")]
    pub dir: Option<PathBuf>,
}

/// Where the shared golangci-lint config is read from
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DownstreamConfig {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub file: Option<PathBuf>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub url: Option<String>,
}

/// How the golangci-lint binary is obtained
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DownstreamTool {
    /// Use `golangci-lint` from the search path
    #[serde(default)]
    pub local: bool,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub file: Option<PathBuf>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub url: Option<String>,
}

/// Parsed settings file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tlint: TlintSection,

    #[serde(default)]
    pub config: DownstreamConfig,

    #[serde(default, rename = "golangci-lint")]
    pub golangci_lint: DownstreamTool,

    /// Team overrides, shaped like golangci-lint's own config
    #[serde(default, rename = "override", deserialize_with = "null_as_empty")]
    pub overrides: Mapping,
}

impl Settings {
    /// Load and validate settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SettingsError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let settings: Settings =
            serde_yaml::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Working directory, falling back to [`DEFAULT_WORKING_DIR`]
    pub fn working_dir(&self) -> PathBuf {
        self.tlint
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKING_DIR))
    }

    /// Validate field-level constraints, reporting every violation
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut violations = Vec::new();

        if let Some(dir) = &self.tlint.dir {
            if dir.exists() && !dir.is_dir() {
                violations.push(format!(
                    "tlint.dir: {} exists and is not a directory",
                    dir.display()
                ));
            }
        }

        check_file("config.file", self.config.file.as_deref(), &mut violations);
        check_url("config.url", self.config.url.as_deref(), &mut violations);
        check_file(
            "golangci-lint.file",
            self.golangci_lint.file.as_deref(),
            &mut violations,
        );
        check_url(
            "golangci-lint.url",
            self.golangci_lint.url.as_deref(),
            &mut violations,
        );

        if self.config.file.is_some() && self.config.url.is_some() {
            warn!("both config.file and config.url are set, config.file takes precedence");
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Validation { violations })
        }
    }
}

fn check_file(field: &str, path: Option<&Path>, violations: &mut Vec<String>) {
    let Some(path) = path else {
        return;
    };
    if !path.is_file() {
        violations.push(format!("{field}: {} is not an existing file", path.display()));
    }
}

fn check_url(field: &str, raw: Option<&str>, violations: &mut Vec<String>) {
    let Some(raw) = raw else {
        return;
    };
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => violations.push(format!(
            "{field}: unsupported scheme '{}' in {raw}",
            url.scheme()
        )),
        Err(e) => violations.push(format!("{field}: malformed URL {raw}: {e}")),
    }
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()).map(T::from))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Mapping, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Mapping> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
