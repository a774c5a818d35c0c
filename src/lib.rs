//! livedoc serves HTML tutorials whose marked elements become live editors and
//! consoles. Documents are sanitized before any widget sees them; code submitted from
//! a widget runs on its own worker thread and streams its output back to the page.
//!
//! [`App`] is the entry point for an HTTP layer; [`Settings`] configures it.
mod app;
mod settings;

pub use crate::app::{App, Submitted};
pub use crate::settings::{ConfigError, Settings};

pub use bus::{ChannelEvent, ChannelHub, Stream};
pub use core_types::{PageId, SessionId, SessionState, SharingScope, TrustTier};
pub use markup::{AssembleOptions, POLL_PATH};
pub use serve::Response;
pub use widgets::{EXEC_PATH, INPUT_PATH, REMOTE_PATH};
