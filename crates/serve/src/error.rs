use std::fmt;
use std::io;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeError {
    /// The path tries to leave the server root.
    IllegalPath(String),
    NotFound(String),
    Io { path: String, message: String },
}

impl ServeError {
    pub(crate) fn io(path: &str, err: &io::Error) -> Self {
        ServeError::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    /// The request path the error is about.
    pub fn path(&self) -> &str {
        match self {
            ServeError::IllegalPath(p) | ServeError::NotFound(p) => p,
            ServeError::Io { path, .. } => path,
        }
    }
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::IllegalPath(p) => write!(f, "illegal path {p}"),
            ServeError::NotFound(p) => write!(f, "{p} not found"),
            ServeError::Io { path, message } => write!(f, "cannot read {path}: {message}"),
        }
    }
}

impl std::error::Error for ServeError {}
