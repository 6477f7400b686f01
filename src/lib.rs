//! tlint - GolangCI Lint for teams
//!
//! Fetches a shared golangci-lint config (local file or URL), merges the
//! team's overrides on top, writes the result into a working directory,
//! locates or downloads golangci-lint, and runs it against that config,
//! passing its exit code through.

pub mod config;
pub mod pipeline;
pub mod run;
pub mod signal;
pub mod source;
pub mod toolchain;

pub use config::{MergedConfig, Settings, SettingsError};
pub use pipeline::{Pipeline, PipelineError, EXIT_CODE_INTERNAL};
pub use signal::{CancelToken, SignalHandler, EXIT_CODE_CANCELLED};
pub use source::{HttpFetcher, Source, SourceFetcher};
pub use toolchain::{ResolvedTool, ToolResolver};
