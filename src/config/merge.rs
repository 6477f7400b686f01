//! Shared config resolution and override merge
//!
//! Merge semantics (override wins at every level):
//! - Mappings: deep-merge by key (recursive), base key order preserved
//! - Sequences: REPLACE (override wins entirely, no union)
//! - Scalars, null, tagged values: override replaces
//! - Mapping vs non-mapping: override replaces outright

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::settings::Settings;
use crate::source::{select_config_source, SourceError, SourceFetcher};

/// Merge errors
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no golangci-lint config source: set config.file or config.url")]
    NoConfigSource,

    #[error("golangci-lint config source: {0}")]
    Source(#[from] SourceError),

    #[error("cannot decode golangci-lint config from {origin}: {reason}")]
    Decode { origin: String, reason: String },
}

/// The shared config with team overrides applied, ready to be written out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedConfig(Mapping);

impl MergedConfig {
    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn into_mapping(self) -> Mapping {
        self.0
    }
}

impl From<Mapping> for MergedConfig {
    fn from(mapping: Mapping) -> Self {
        Self(mapping)
    }
}

/// Deep merge two YAML values, `overlay` taking precedence.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            Value::Mapping(merge_mappings(base_map, overlay_map))
        }

        // Sequences: REPLACE (no concatenation)
        (Value::Sequence(_), overlay @ Value::Sequence(_)) => overlay,

        // Scalars and any other case: overlay wins
        (_, overlay) => overlay,
    }
}

/// Deep merge `overlay` into `base`, keeping the position of existing keys
pub fn merge_mappings(mut base: Mapping, overlay: Mapping) -> Mapping {
    for (key, overlay_value) in overlay {
        match base.get_mut(&key) {
            Some(slot) => {
                let base_value = std::mem::take(slot);
                *slot = deep_merge(base_value, overlay_value);
            }
            None => {
                base.insert(key, overlay_value);
            }
        }
    }
    base
}

/// Decode the first YAML document of `bytes`, whose root must be a mapping.
/// Later documents are ignored; an empty stream decodes to an empty mapping.
pub fn decode_mapping(bytes: &[u8], origin: &str) -> Result<Mapping, MergeError> {
    let decode_err = |reason: String| MergeError::Decode {
        origin: origin.to_string(),
        reason,
    };

    let text = std::str::from_utf8(bytes).map_err(|e| decode_err(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Mapping::new());
    }

    let Some(document) = serde_yaml::Deserializer::from_str(text).next() else {
        return Ok(Mapping::new());
    };

    match Value::deserialize(document).map_err(|e| decode_err(e.to_string()))? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        other => Err(decode_err(format!(
            "expected a mapping at the document root, found {}",
            value_kind(&other)
        ))),
    }
}

/// Fetch the shared config selected by `settings` and merge the overrides
/// on top of it.
pub fn resolve_and_merge(
    settings: &Settings,
    fetcher: &dyn SourceFetcher,
) -> Result<MergedConfig, MergeError> {
    let source = select_config_source(&settings.config).ok_or(MergeError::NoConfigSource)?;
    debug!(%source, "using golangci-lint config");

    let bytes = source.read_all(fetcher)?;
    let base = decode_mapping(&bytes, &source.to_string())?;

    Ok(MergedConfig(merge_mappings(base, settings.overrides.clone())))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
