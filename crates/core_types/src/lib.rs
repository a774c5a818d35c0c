use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide monotonic counter shared by page ids and session ids.
pub fn next_uid() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(String);

impl PageId {
    pub fn fresh() -> Self {
        PageId(next_uid().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        PageId(s.to_string())
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `"{page_id}:{counter}"`. The page prefix routes output to the page's channel queue.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn fresh(page: &PageId) -> Self {
        SessionId(format!("{}:{}", page.as_str(), next_uid()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Page part of the id. Ids without a `:` are their own page.
    pub fn page(&self) -> PageId {
        match self.0.split_once(':') {
            Some((page, _)) => PageId(page.to_string()),
            None => PageId(self.0.clone()),
        }
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered trust tiers; each tier's allowed set contains every lower tier's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    Paranoid,
    Severe,
    Normal,
    Trusted,
}

impl TrustTier {
    pub const ALL: [TrustTier; 4] = [
        TrustTier::Paranoid,
        TrustTier::Severe,
        TrustTier::Normal,
        TrustTier::Trusted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrustTier::Paranoid => "paranoid",
            TrustTier::Severe => "severe",
            TrustTier::Normal => "normal",
            TrustTier::Trusted => "trusted",
        }
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    Compiling,
    Running,
    Completed,
    CompileFailed,
    RuntimeFailed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::CompileFailed | SessionState::RuntimeFailed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Compiling => "compiling",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::CompileFailed => "compile-failed",
            SessionState::RuntimeFailed => "runtime-failed",
        }
    }
}

/// How far shared interpreter namespaces reach.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharingScope {
    /// Widgets on one page share a namespace; a reload starts fresh.
    #[default]
    Page,
    /// One namespace for every shared widget in the process.
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTier(pub String);

impl fmt::Display for UnknownTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown trust tier: {:?}", self.0)
    }
}

impl std::error::Error for UnknownTier {}

impl FromStr for TrustTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paranoid" => Ok(TrustTier::Paranoid),
            "severe" => Ok(TrustTier::Severe),
            "normal" => Ok(TrustTier::Normal),
            "trusted" => Ok(TrustTier::Trusted),
            _ => Err(UnknownTier(s.to_string())),
        }
    }
}
