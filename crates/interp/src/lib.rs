//! A small Python-flavoured language for executable tutorials, and the sessions that
//! run it on worker threads with stdio bound to a page's channel.
pub mod ast;
pub mod doctest;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod namespace;
pub mod parser;
pub mod session;
pub mod value;

pub use crate::engine::{Engine, EngineConfig, SubmitError};
pub use crate::error::{CompileError, ErrorKind, RuntimeError};
pub use crate::namespace::Namespace;
pub use crate::session::{ExecutionSession, Mode, Outcome, SessionLog, Sharing, SharingGroup};
pub use crate::value::Value;

