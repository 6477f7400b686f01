//! Byte sources for the shared config and the golangci-lint binary
//!
//! A [`Source`] is either a local file or a remote URL. Fetching is behind
//! the [`SourceFetcher`] trait so callers can swap the transport; the
//! default [`HttpFetcher`] opens files directly and retrieves URLs with a
//! blocking HTTP client. Fetches are never retried.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::config::DownstreamConfig;

/// User agent sent with remote retrievals
const USER_AGENT: &str = concat!("tlint/", env!("CARGO_PKG_VERSION"));

/// Connect timeout for remote retrievals
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Readable byte stream returned by a fetch. Dropping it releases the
/// underlying file or connection.
pub type ByteStream = Box<dyn Read + Send>;

/// Source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot open {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed reading from {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A single place bytes can come from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    File(PathBuf),
    Url(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "file {}", path.display()),
            Source::Url(url) => write!(f, "URL {url}"),
        }
    }
}

impl Source {
    /// Fetch this source and read it to the end
    pub fn read_all(&self, fetcher: &dyn SourceFetcher) -> Result<Vec<u8>, SourceError> {
        let mut stream = fetcher.fetch(self)?;
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|source| SourceError::Read {
                origin: self.to_string(),
                source,
            })?;
        Ok(bytes)
    }
}

/// Something that can turn a [`Source`] into a readable stream
pub trait SourceFetcher {
    fn fetch(&self, source: &Source) -> Result<ByteStream, SourceError>;
}

/// Default fetcher: local files plus blocking HTTP(S)
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default client settings
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            // Binary downloads can be large; no overall deadline.
            .timeout(None)
            .build()
            .map_err(SourceError::Client)?;
        Ok(Self { client })
    }

    fn open_file(path: &Path) -> Result<ByteStream, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Box::new(file))
    }

    fn get(&self, url: &str) -> Result<ByteStream, SourceError> {
        let fetch_err = |source| SourceError::Fetch {
            url: url.to_string(),
            source,
        };
        let response = self
            .client
            .get(url)
            .send()
            .map_err(fetch_err)?
            .error_for_status()
            .map_err(fetch_err)?;
        debug!(url, status = %response.status(), "fetched remote source");
        Ok(Box::new(response))
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, source: &Source) -> Result<ByteStream, SourceError> {
        match source {
            Source::File(path) => Self::open_file(path),
            Source::Url(url) => self.get(url),
        }
    }
}

type ConfigProvider = fn(&DownstreamConfig) -> Option<Source>;

/// Config source providers in priority order
const CONFIG_PROVIDERS: &[(&str, ConfigProvider)] =
    &[("config.file", config_file), ("config.url", config_url)];

fn config_file(config: &DownstreamConfig) -> Option<Source> {
    config.file.clone().map(Source::File)
}

fn config_url(config: &DownstreamConfig) -> Option<Source> {
    config.url.clone().map(Source::Url)
}

/// Pick the shared config source: `file` first, then `url`
pub fn select_config_source(config: &DownstreamConfig) -> Option<Source> {
    CONFIG_PROVIDERS.iter().find_map(|(field, provider)| {
        let source = provider(config)?;
        debug!(field, %source, "selected golangci-lint config source");
        Some(source)
    })
}
