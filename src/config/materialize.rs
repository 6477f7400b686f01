//! Writes the merged config where golangci-lint can read it

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use super::merge::MergedConfig;

/// File name of the materialized config inside the working directory
pub const MATERIALIZED_CONFIG_NAME: &str = "golangci-lint.yaml";

/// Materialization errors
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("cannot create working directory {}: {source}", path.display())]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write config {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}

/// Create `dir` (and its parents) if absent. An existing directory is fine.
pub fn ensure_dir(dir: &Path) -> Result<(), MaterializeError> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(source) => Err(MaterializeError::WorkingDir {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Write `merged` to `{working_dir}/golangci-lint.yaml`, replacing any
/// previous content, and return the absolute path of the written file.
pub fn write_config(working_dir: &Path, merged: &MergedConfig) -> Result<PathBuf, MaterializeError> {
    ensure_dir(working_dir)?;

    let path = working_dir.join(MATERIALIZED_CONFIG_NAME);
    let write_err = |reason: String| MaterializeError::Write {
        path: path.clone(),
        reason,
    };

    let encoded = serde_yaml::to_string(merged.as_mapping()).map_err(|e| write_err(e.to_string()))?;

    let file = File::create(&path).map_err(|e| write_err(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(encoded.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(|e| write_err(e.to_string()))?;

    let absolute = fs::canonicalize(&path).map_err(|e| write_err(e.to_string()))?;
    debug!(
        path = %absolute.display(),
        sha256 = %hex::encode(Sha256::digest(encoded.as_bytes())),
        "materialized golangci-lint config"
    );
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Mapping;
    use tempfile::TempDir;

    fn merged(s: &str) -> MergedConfig {
        let mapping: Mapping = serde_yaml::from_str(s).unwrap();
        MergedConfig::from(mapping)
    }

    #[test]
    fn test_creates_missing_working_dir() {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("nested").join(".tlint");

        let path = write_config(&work, &merged("run: {timeout: 1m}")).unwrap();

        assert!(work.is_dir());
        assert!(path.is_absolute());
        assert!(path.ends_with(MATERIALIZED_CONFIG_NAME));
        let written: Mapping = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, merged("run: {timeout: 1m}").into_mapping());
    }

    #[test]
    fn test_existing_working_dir_is_fine() {
        let dir = TempDir::new().unwrap();
        assert!(ensure_dir(dir.path()).is_ok());
        assert!(ensure_dir(dir.path()).is_ok());
    }

    #[test]
    fn test_overwrites_previous_content() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join(MATERIALIZED_CONFIG_NAME);
        fs::write(&stale, "linters:\n  enable: [a, b, c, d, e, f, g]\nrun: {timeout: 99m}\n").unwrap();

        let path = write_config(dir.path(), &merged("run: {timeout: 1m}")).unwrap();

        let written: Mapping = serde_yaml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written, merged("run: {timeout: 1m}").into_mapping());
    }

    #[test]
    fn test_working_dir_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let result = write_config(&blocker, &merged("{}"));
        assert!(matches!(result, Err(MaterializeError::WorkingDir { .. })));
    }

    #[test]
    fn test_config_path_is_a_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(MATERIALIZED_CONFIG_NAME)).unwrap();

        let result = write_config(dir.path(), &merged("{}"));
        assert!(matches!(result, Err(MaterializeError::Write { .. })));
    }
}
