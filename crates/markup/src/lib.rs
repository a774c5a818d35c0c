//! Markup dispatch: sanitizes a document, hands directive-bearing elements to registered
//! handlers in document order and serializes the result with the channel bootstrap.
mod assemble;
mod bootstrap;
mod directive;
mod error;
mod page;
mod registry;

pub use crate::assemble::{AssembleOptions, AssemblerConfig, MENU_INCLUDED, PageAssembler};
pub use crate::bootstrap::{CHANNEL_SCRIPT, POLL_PATH, error_page, onload_for};
pub use crate::directive::Directive;
pub use crate::error::{AssembleError, HandlerError};
pub use crate::page::{
    DOCTYPE, DispatchReport, Dispatched, HandlerFailure, Page, PageContext, PageFlags,
};
pub use crate::registry::{
    Lookup, MENU_HANDLER, MarkupRegistry, MarkupRegistryBuilder, PageHandler, TagHandler,
};
