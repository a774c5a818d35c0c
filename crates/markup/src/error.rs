use std::fmt;

use core_types::SessionId;

/// Failure reported by one handler invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerError {
    Failed(String),
    /// The handler panicked; the payload message is kept when it is a string.
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl fmt::Display) -> Self {
        HandlerError::Failed(message.to_string())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Failed(msg) => write!(f, "handler failed: {msg}"),
            HandlerError::Panicked(msg) => write!(f, "handler panicked: {msg}"),
        }
    }
}

impl std::error::Error for HandlerError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssembleError {
    /// A handler failed while strict handling was requested.
    Handler {
        handler: String,
        session: SessionId,
        error: HandlerError,
    },
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssembleError::Handler {
                handler,
                session,
                error,
            } => write!(f, "{handler} ({session}): {error}"),
        }
    }
}

impl std::error::Error for AssembleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssembleError::Handler { error, .. } => Some(error),
        }
    }
}
