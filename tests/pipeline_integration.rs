//! End-to-end pipeline tests
//!
//! A shell script stands in for golangci-lint: it answers `version` with a
//! realistic banner and, for `run`, records its arguments and the config it
//! was pointed at before exiting with a chosen code. Remote sources are
//! served from memory.

#![cfg(unix)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use serde_yaml::{Mapping, Value};
use tempfile::TempDir;

use tlint::config::{MergeError, SettingsError, MATERIALIZED_CONFIG_NAME};
use tlint::source::{ByteStream, Source, SourceError, SourceFetcher};
use tlint::toolchain::{ToolError, BIN_DIR, TOOL_NAME};
use tlint::{CancelToken, Pipeline, PipelineError, EXIT_CODE_CANCELLED, EXIT_CODE_INTERNAL};

const VERSION_BANNER: &str =
    "golangci-lint has version 1.55.2 built with go1.21.3 from e3c2265f on 2023-11-03T12:59:25Z";

// =============================================================================
// Helpers
// =============================================================================

/// Serves URLs from memory, files from disk, and records every fetch
struct MemoryFetcher {
    urls: HashMap<String, Vec<u8>>,
    fetched: RefCell<Vec<Source>>,
}

impl MemoryFetcher {
    fn new(urls: Vec<(&str, Vec<u8>)>) -> Self {
        Self {
            urls: urls.into_iter().map(|(u, b)| (u.to_string(), b)).collect(),
            fetched: RefCell::new(Vec::new()),
        }
    }
}

impl SourceFetcher for MemoryFetcher {
    fn fetch(&self, source: &Source) -> Result<ByteStream, SourceError> {
        self.fetched.borrow_mut().push(source.clone());
        match source {
            Source::File(path) => File::open(path)
                .map(|f| Box::new(f) as ByteStream)
                .map_err(|e| SourceError::File {
                    path: path.clone(),
                    source: e,
                }),
            Source::Url(url) => match self.urls.get(url) {
                Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
                None => Err(SourceError::Read {
                    origin: url.clone(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                }),
            },
        }
    }
}

/// Shared handle so a test can inspect fetches after the pipeline owns the fetcher
struct SharedFetcher(std::rc::Rc<MemoryFetcher>);

impl SourceFetcher for SharedFetcher {
    fn fetch(&self, source: &Source) -> Result<ByteStream, SourceError> {
        self.0.fetch(source)
    }
}

fn fake_tool_script(run_exit: i32, run_body: &str) -> String {
    format!(
        r#"#!/bin/sh
here="$(dirname "$0")"
case "$1" in
  version)
    echo "{VERSION_BANNER}"
    ;;
  run)
    echo "$@" > "$here/run-args"
    cp "$3" "$here/seen-config.yaml"
    {run_body}
    exit {run_exit}
    ;;
  *)
    exit 64
    ;;
esac
"#
    )
}

fn install_script(dir: &Path, contents: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(TOOL_NAME);
    fs::write(&path, contents).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_settings(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join(".tlint.yaml");
    fs::write(&path, contents).unwrap();
    path
}

fn mapping(s: &str) -> Mapping {
    match serde_yaml::from_str::<Value>(s).unwrap() {
        Value::Mapping(m) => m,
        other => panic!("not a mapping: {other:?}"),
    }
}

fn read_mapping(path: &Path) -> Mapping {
    mapping(&fs::read_to_string(path).unwrap())
}

// =============================================================================
// Happy paths
// =============================================================================

#[test]
fn test_file_config_with_override_and_local_binary() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("base.yaml");
    fs::write(&base, "run:\n  timeout: 5m\n").unwrap();
    let tool = install_script(&dir.path().join("tools"), &fake_tool_script(3, ""));
    let work = dir.path().join("work");

    let settings = write_settings(
        dir.path(),
        &format!(
            "tlint:\n  dir: {}\nconfig:\n  file: {}\ngolangci-lint:\n  file: {}\noverride:\n  run:\n    timeout: 1m\n",
            work.display(),
            base.display(),
            tool.display()
        ),
    );

    let pipeline = Pipeline::with_fetcher(Box::new(MemoryFetcher::new(vec![])));
    let code = pipeline.run(&settings, &CancelToken::new()).unwrap();

    // golangci-lint's own exit code comes back unchanged
    assert_eq!(code, 3);

    let materialized = fs::canonicalize(work.join(MATERIALIZED_CONFIG_NAME)).unwrap();
    assert_eq!(read_mapping(&materialized), mapping("run: {timeout: 1m}"));

    let tools = dir.path().join("tools");
    let args = fs::read_to_string(tools.join("run-args")).unwrap();
    assert_eq!(args.trim(), format!("run --config {}", materialized.display()));
    assert_eq!(read_mapping(&tools.join("seen-config.yaml")), mapping("run: {timeout: 1m}"));
}

#[test]
fn test_url_config_and_downloaded_binary() {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("work");
    let config_url = "https://lint.example.com/golangci.yaml";
    let tool_url = "https://lint.example.com/golangci-lint";

    let fetcher = std::rc::Rc::new(MemoryFetcher::new(vec![
        (
            config_url,
            b"linters:\n  enable: [govet, errcheck]\nissues:\n  max-same-issues: 3\n".to_vec(),
        ),
        (tool_url, fake_tool_script(0, "").into_bytes()),
    ]));

    let settings = write_settings(
        dir.path(),
        &format!(
            r#"
tlint:
  dir: {work}
config:
  url: {config_url}
golangci-lint:
  url: {tool_url}
override:
  linters:
    enable: [staticcheck]
"#,
            work = work.display()
        ),
    );

    let pipeline = Pipeline::with_fetcher(Box::new(SharedFetcher(fetcher.clone())));
    let code = pipeline.run(&settings, &CancelToken::new()).unwrap();
    assert_eq!(code, 0);

    let binary = work.join(BIN_DIR).join(TOOL_NAME);
    let mode = fs::metadata(&binary).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111, "downloaded binary must be executable");

    // The binary comes from the tool URL, not the config URL
    assert_eq!(
        *fetcher.fetched.borrow(),
        vec![
            Source::Url(config_url.to_string()),
            Source::Url(tool_url.to_string())
        ]
    );

    assert_eq!(
        read_mapping(&work.join(MATERIALIZED_CONFIG_NAME)),
        mapping("linters: {enable: [staticcheck]}\nissues: {max-same-issues: 3}")
    );
}

#[test]
fn test_use_local_resolves_from_search_path() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("base.yaml");
    fs::write(&base, "run: {tests: true}\n").unwrap();
    let path_dir = dir.path().join("path-bin");
    install_script(&path_dir, &fake_tool_script(1, ""));
    let explicit_dir = dir.path().join("explicit");
    let explicit = install_script(&explicit_dir, &fake_tool_script(0, ""));

    let settings = write_settings(
        dir.path(),
        &format!(
            "tlint:\n  dir: {}\nconfig:\n  file: {}\ngolangci-lint:\n  local: true\n  file: {}\n",
            dir.path().join("work").display(),
            base.display(),
            explicit.display()
        ),
    );

    let pipeline =
        Pipeline::with_fetcher(Box::new(MemoryFetcher::new(vec![]))).with_search_path(&path_dir);
    let code = pipeline.run(&settings, &CancelToken::new()).unwrap();

    assert_eq!(code, 1);
    assert!(path_dir.join("run-args").exists());
    assert!(!explicit_dir.join("run-args").exists());
}

// =============================================================================
// Failures before golangci-lint runs
// =============================================================================

#[test]
fn test_missing_settings_file() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::with_fetcher(Box::new(MemoryFetcher::new(vec![])));
    let err = pipeline
        .run(&dir.path().join(".tlint.yaml"), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, PipelineError::Settings(SettingsError::NotFound { .. })));
    assert_eq!(err.exit_code(), EXIT_CODE_INTERNAL);
}

#[test]
fn test_no_config_source_stops_before_run() {
    let dir = TempDir::new().unwrap();
    let tools = dir.path().join("tools");
    let tool = install_script(&tools, &fake_tool_script(0, ""));
    let settings = write_settings(
        dir.path(),
        &format!(
            "tlint:\n  dir: {}\ngolangci-lint:\n  file: {}\n",
            dir.path().join("work").display(),
            tool.display()
        ),
    );

    let pipeline = Pipeline::with_fetcher(Box::new(MemoryFetcher::new(vec![])));
    let err = pipeline.run(&settings, &CancelToken::new()).unwrap_err();

    assert!(matches!(err, PipelineError::Merge(MergeError::NoConfigSource)));
    assert!(!tools.join("run-args").exists());
}

#[test]
fn test_unparseable_version_stops_before_run() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("base.yaml");
    fs::write(&base, "run: {}\n").unwrap();
    let tools = dir.path().join("tools");
    let tool = install_script(
        &tools,
        "#!/bin/sh\nif [ \"$1\" = version ]; then echo 'golangci-lint 1.55.2'; exit 0; fi\ntouch \"$(dirname \"$0\")/run-args\"\n",
    );
    let settings = write_settings(
        dir.path(),
        &format!(
            "tlint:\n  dir: {}\nconfig:\n  file: {}\ngolangci-lint:\n  file: {}\n",
            dir.path().join("work").display(),
            base.display(),
            tool.display()
        ),
    );

    let pipeline = Pipeline::with_fetcher(Box::new(MemoryFetcher::new(vec![])));
    let err = pipeline.run(&settings, &CancelToken::new()).unwrap_err();

    assert!(matches!(err, PipelineError::Tool(ToolError::VersionNotFound { .. })));
    assert!(!tools.join("run-args").exists());
}

#[test]
fn test_malformed_shared_config() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("base.yaml");
    fs::write(&base, "run: {timeout: [\n").unwrap();
    let settings = write_settings(
        dir.path(),
        &format!(
            "tlint:\n  dir: {}\nconfig:\n  file: {}\n",
            dir.path().join("work").display(),
            base.display()
        ),
    );

    let pipeline = Pipeline::with_fetcher(Box::new(MemoryFetcher::new(vec![])));
    let err = pipeline.run(&settings, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, PipelineError::Merge(MergeError::Decode { .. })));
    assert!(!dir.path().join("work").join(MATERIALIZED_CONFIG_NAME).exists());
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_cancel_during_run() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("base.yaml");
    fs::write(&base, "run: {}\n").unwrap();
    let tool = install_script(
        &dir.path().join("tools"),
        &fake_tool_script(0, "exec sleep 30"),
    );
    let settings = write_settings(
        dir.path(),
        &format!(
            "tlint:\n  dir: {}\nconfig:\n  file: {}\ngolangci-lint:\n  file: {}\n",
            dir.path().join("work").display(),
            base.display(),
            tool.display()
        ),
    );

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        trigger.cancel();
    });

    let start = Instant::now();
    let pipeline = Pipeline::with_fetcher(Box::new(MemoryFetcher::new(vec![])));
    let err = pipeline.run(&settings, &cancel).unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(err.exit_code(), EXIT_CODE_CANCELLED);
    assert!(start.elapsed() < Duration::from_secs(15));
}

#[test]
fn test_cancel_before_start() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("base.yaml");
    fs::write(&base, "run: {}\n").unwrap();
    let tools = dir.path().join("tools");
    let tool = install_script(&tools, &fake_tool_script(0, ""));
    let settings = write_settings(
        dir.path(),
        &format!(
            "tlint:\n  dir: {}\nconfig:\n  file: {}\ngolangci-lint:\n  file: {}\n",
            dir.path().join("work").display(),
            base.display(),
            tool.display()
        ),
    );

    let cancel = CancelToken::new();
    cancel.cancel();
    let pipeline = Pipeline::with_fetcher(Box::new(MemoryFetcher::new(vec![])));
    let err = pipeline.run(&settings, &cancel).unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert!(!tools.join("run-args").exists());
}
