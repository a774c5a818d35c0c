//! Blocking resource reads for stylesheets and remote tutorials.
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;

pub use url::Url;

const USER_AGENT: &str = "livedoc/0.1";
const TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Remote(Url),
    File(PathBuf),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Remote(url) => f.write_str(url.as_str()),
            Location::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug)]
pub enum FetchError {
    Client(String),
    Request { url: String, message: String },
    Status { url: String, status: u16 },
    Io { path: String, message: String },
    NotFound(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Client(msg) => write!(f, "client build error: {msg}"),
            FetchError::Request { url, message } => write!(f, "request to {url} failed: {message}"),
            FetchError::Status { url, status } => write!(f, "{url} answered with status {status}"),
            FetchError::Io { path, message } => write!(f, "cannot read {path}: {message}"),
            FetchError::NotFound(loc) => write!(f, "{loc} not found"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Source of external resources. Implementations must be shareable across render threads.
pub trait ResourceReader: Send + Sync {
    fn read_bytes(&self, location: &Location) -> Result<Vec<u8>, FetchError>;

    fn read_text(&self, location: &Location) -> Result<String, FetchError> {
        let bytes = self.read_bytes(location)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Reads files from disk and URLs over HTTP(S).
pub struct NetReader {
    client: reqwest::blocking::Client,
}

impl NetReader {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(NetReader { client })
    }

    fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let start = std::time::Instant::now();
        let request_error = |e: &dyn fmt::Display| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        };
        let resp = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| request_error(&e))?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        let mut limited = resp.take(MAX_BYTES);
        let mut buf = Vec::new();
        limited
            .read_to_end(&mut buf)
            .map_err(|e| request_error(&e))?;
        log::debug!(
            target: "net",
            "fetched {url} status={status} bytes={} in {}ms",
            buf.len(),
            start.elapsed().as_millis()
        );
        Ok(buf)
    }
}

impl ResourceReader for NetReader {
    fn read_bytes(&self, location: &Location) -> Result<Vec<u8>, FetchError> {
        match location {
            Location::Remote(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| FetchError::NotFound(url.to_string()))?;
                read_file(&path)
            }
            Location::Remote(url) => self.fetch(url),
            Location::File(path) => read_file(path),
        }
    }
}

fn read_file(path: &std::path::Path) -> Result<Vec<u8>, FetchError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
        _ => FetchError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        },
    })
}

/// In-memory reader keyed by the location's display form.
#[derive(Default)]
pub struct MemoryReader {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: &Location, body: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(location.to_string(), body.as_bytes().to_vec());
        }
    }

    pub fn with(self, location: &Location, body: &str) -> Self {
        self.insert(location, body);
        self
    }
}

impl ResourceReader for MemoryReader {
    fn read_bytes(&self, location: &Location) -> Result<Vec<u8>, FetchError> {
        let key = location.to_string();
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(&key).cloned())
            .ok_or(FetchError::NotFound(key))
    }
}
