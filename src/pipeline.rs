//! Pipeline orchestration for tlint
//!
//! Stages, each run to completion before the next:
//! - Load and validate settings
//! - Fetch the shared config and merge team overrides
//! - Materialize the merged config into the working directory
//! - Resolve (and provision) golangci-lint, probe its version
//! - Run golangci-lint against the materialized config
//!
//! A failure in any stage aborts before golangci-lint runs. The exit code
//! of golangci-lint itself is returned as-is, not as an error.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::{
    resolve_and_merge, write_config, MaterializeError, MergeError, Settings, SettingsError,
};
use crate::run::{self, RunError};
use crate::signal::{CancelToken, EXIT_CODE_CANCELLED};
use crate::source::{HttpFetcher, SourceError, SourceFetcher};
use crate::toolchain::{ToolError, ToolResolver};

/// Exit code for failures inside tlint, before or around the golangci-lint run
pub const EXIT_CODE_INTERNAL: i32 = 90;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config: {0}")]
    Settings(#[from] SettingsError),

    #[error("{0}")]
    Merge(#[from] MergeError),

    #[error("{0}")]
    Materialize(#[from] MaterializeError),

    #[error("{0}")]
    Tool(#[from] ToolError),

    #[error("golangci-lint run: {0}")]
    Run(RunError),

    #[error("HTTP client: {0}")]
    Client(#[source] SourceError),

    #[error("cancelled")]
    Cancelled,
}

impl From<RunError> for PipelineError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Cancelled { .. } => PipelineError::Cancelled,
            other => PipelineError::Run(other),
        }
    }
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Cancelled => EXIT_CODE_CANCELLED,
            _ => EXIT_CODE_INTERNAL,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Drives one tlint invocation
pub struct Pipeline {
    fetcher: Box<dyn SourceFetcher>,
    search_path: Option<OsString>,
}

impl Pipeline {
    /// Pipeline using the default HTTP fetcher and `PATH`
    pub fn new() -> PipelineResult<Self> {
        let fetcher = HttpFetcher::new().map_err(PipelineError::Client)?;
        Ok(Self::with_fetcher(Box::new(fetcher)))
    }

    /// Pipeline using a custom fetcher
    pub fn with_fetcher(fetcher: Box<dyn SourceFetcher>) -> Self {
        Self {
            fetcher,
            search_path: None,
        }
    }

    /// Search these directories for golangci-lint instead of `PATH`
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Load settings from `settings_path` and run the full pipeline.
    ///
    /// Returns golangci-lint's exit code.
    pub fn run(&self, settings_path: &Path, cancel: &CancelToken) -> PipelineResult<i32> {
        let settings = Settings::load(settings_path)?;
        info!("Using config: {}", settings_path.display());
        self.run_with_settings(&settings, cancel)
    }

    /// Run the pipeline for already-loaded settings
    pub fn run_with_settings(&self, settings: &Settings, cancel: &CancelToken) -> PipelineResult<i32> {
        let config_path = self.materialize(settings)?;
        check_cancelled(cancel)?;

        let executable = self.resolve_tool(settings)?;
        check_cancelled(cancel)?;

        Ok(run::run(&executable, &config_path, cancel)?)
    }

    /// Fetch, merge, and write the golangci-lint config; returns its path
    pub fn materialize(&self, settings: &Settings) -> PipelineResult<PathBuf> {
        let merged = resolve_and_merge(settings, self.fetcher.as_ref())?;
        let path = write_config(&settings.working_dir(), &merged)?;
        info!("Materialized golangci-lint config: {}", path.display());
        Ok(path)
    }

    fn resolve_tool(&self, settings: &Settings) -> PipelineResult<PathBuf> {
        let mut resolver = ToolResolver::new(self.fetcher.as_ref(), settings.working_dir());
        if let Some(search_path) = &self.search_path {
            resolver = resolver.with_search_path(search_path.clone());
        }
        Ok(resolver.resolve(&settings.golangci_lint)?.executable_path)
    }
}

fn check_cancelled(cancel: &CancelToken) -> PipelineResult<()> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}
