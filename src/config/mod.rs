//! Configuration pipeline
//!
//! 1. Settings file (`.tlint.yaml`) load + validation
//! 2. Shared golangci-lint config fetch + team override merge
//! 3. Materialization into the working directory

mod materialize;
mod merge;
mod settings;

pub use materialize::{ensure_dir, write_config, MaterializeError, MATERIALIZED_CONFIG_NAME};
pub use merge::{
    decode_mapping, deep_merge, merge_mappings, resolve_and_merge, MergeError, MergedConfig,
};
pub use settings::{
    DownstreamConfig, DownstreamTool, Settings, SettingsError, TlintSection, DEFAULT_SETTINGS_PATH,
    DEFAULT_WORKING_DIR,
};
