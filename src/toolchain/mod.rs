//! golangci-lint binary resolution
//!
//! Resolution order, first match wins:
//! 1. `golangci-lint.local` → `golangci-lint` from the search path
//! 2. `golangci-lint.file`  → that path, used as is
//! 3. `golangci-lint.url`   → downloaded to `{dir}/bin/golangci-lint`
//! 4. nothing set           → search path, as in 1
//!
//! The resolved binary is probed with `golangci-lint version` and the
//! version is taken from the `version <token> built` part of its output.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use regex_lite::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::{ensure_dir, DownstreamTool};
use crate::source::{Source, SourceError, SourceFetcher};

/// Executable name looked up on the search path
pub const TOOL_NAME: &str = "golangci-lint";

/// Directory (inside the working directory) holding downloaded binaries
pub const BIN_DIR: &str = "bin";

/// Pattern extracting the version from `golangci-lint version` output
const VERSION_PATTERN: &str = r"version ([\w.+]+) built";

/// Tool resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("golangci-lint not found on the search path: {0}")]
    NotOnSearchPath(#[source] which::Error),

    #[error("cannot download golangci-lint from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: SourceError,
    },

    #[error("cannot write golangci-lint binary to {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("cannot run {} version: {source}", path.display())]
    Invocation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} version exited with code {code:?}: {stderr}", path.display())]
    ProbeFailed {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error("golangci-lint version was not found in: {output:?}")]
    VersionNotFound { output: String },
}

/// Where the golangci-lint binary comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSource {
    SearchPath,
    LocalFile(PathBuf),
    Download(String),
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolSource::SearchPath => write!(f, "search path"),
            ToolSource::LocalFile(path) => write!(f, "local binary {}", path.display()),
            ToolSource::Download(url) => write!(f, "download from {url}"),
        }
    }
}

type ToolProvider = fn(&DownstreamTool) -> Option<ToolSource>;

/// Tool source providers in priority order
const TOOL_PROVIDERS: &[(&str, ToolProvider)] = &[
    ("golangci-lint.local", search_path_provider),
    ("golangci-lint.file", local_file_provider),
    ("golangci-lint.url", download_provider),
];

fn search_path_provider(tool: &DownstreamTool) -> Option<ToolSource> {
    tool.local.then_some(ToolSource::SearchPath)
}

fn local_file_provider(tool: &DownstreamTool) -> Option<ToolSource> {
    tool.file.clone().map(ToolSource::LocalFile)
}

fn download_provider(tool: &DownstreamTool) -> Option<ToolSource> {
    tool.url.clone().map(ToolSource::Download)
}

/// Pick the tool source for `tool`, falling back to the search path
pub fn select_tool_source(tool: &DownstreamTool) -> ToolSource {
    TOOL_PROVIDERS
        .iter()
        .find_map(|(field, provider)| {
            let source = provider(tool)?;
            debug!(field, %source, "selected {TOOL_NAME} source");
            Some(source)
        })
        .unwrap_or_else(|| {
            debug!("no {TOOL_NAME} source configured, using search path (fallback)");
            ToolSource::SearchPath
        })
}

/// A golangci-lint binary known to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub executable_path: PathBuf,
    pub version: String,
}

/// Resolves, provisions, and probes the golangci-lint binary
pub struct ToolResolver<'a> {
    fetcher: &'a dyn SourceFetcher,
    working_dir: PathBuf,
    search_path: Option<OsString>,
}

impl<'a> ToolResolver<'a> {
    /// Resolver that downloads into `working_dir` and searches `PATH`
    pub fn new(fetcher: &'a dyn SourceFetcher, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            working_dir: working_dir.into(),
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Search these directories instead of `PATH`
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Resolve the binary and probe its version
    pub fn resolve(&self, tool: &DownstreamTool) -> Result<ResolvedTool, ToolError> {
        let executable_path = self.locate(&select_tool_source(tool))?;
        let version = probe_version(&executable_path)?;
        info!("Using {TOOL_NAME} {version}");
        Ok(ResolvedTool {
            executable_path,
            version,
        })
    }

    /// Turn a tool source into a path on disk, downloading if needed
    pub fn locate(&self, source: &ToolSource) -> Result<PathBuf, ToolError> {
        match source {
            ToolSource::SearchPath => {
                let cwd = std::env::current_dir().unwrap_or_default();
                let path = which::which_in(TOOL_NAME, self.search_path.as_ref(), cwd)
                    .map_err(ToolError::NotOnSearchPath)?;
                debug!(path = %path.display(), "using {TOOL_NAME} from search path");
                Ok(path)
            }
            ToolSource::LocalFile(path) => {
                debug!(path = %path.display(), "using local {TOOL_NAME} binary");
                Ok(path.clone())
            }
            ToolSource::Download(url) => self.download(url),
        }
    }

    fn download(&self, url: &str) -> Result<PathBuf, ToolError> {
        let bytes = Source::Url(url.to_string())
            .read_all(self.fetcher)
            .map_err(|source| ToolError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let bin_dir = self.working_dir.join(BIN_DIR);
        let path = bin_dir.join(TOOL_NAME);
        install_executable(&bin_dir, &path, &bytes)?;

        debug!(
            url,
            path = %path.display(),
            bytes = bytes.len(),
            sha256 = %hex::encode(Sha256::digest(&bytes)),
            "downloaded {TOOL_NAME}"
        );
        Ok(path)
    }
}

fn install_executable(bin_dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), ToolError> {
    let write_err = |reason: String| ToolError::Write {
        path: path.to_path_buf(),
        reason,
    };

    ensure_dir(bin_dir).map_err(|e| write_err(e.to_string()))?;

    fs::write(path, bytes).map_err(|e| write_err(e.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| write_err(e.to_string()))?;
    }

    Ok(())
}

/// Run `<path> version` and extract the version token
pub fn probe_version(path: &Path) -> Result<String, ToolError> {
    let output = Command::new(path)
        .arg("version")
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ToolError::Invocation {
            path: path.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        return Err(ToolError::ProbeFailed {
            path: path.to_path_buf(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_version(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the version from `golangci-lint version` output
pub fn parse_version(output: &str) -> Result<String, ToolError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(VERSION_PATTERN).expect("valid version pattern"));

    pattern
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ToolError::VersionNotFound {
            output: output.to_string(),
        })
}
