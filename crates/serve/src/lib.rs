//! Request-shaped collaborators of the HTTP layer: files under the server root and
//! tutorials fetched from other sites.
mod error;
mod files;
mod remote;
mod response;
mod templates;

pub use crate::error::ServeError;
pub use crate::files::{DEFAULT_PAGES, Target, path_to_response, resolve};
pub use crate::remote::{NO_CACHE, remote_page, remote_url_from_query};
pub use crate::response::{HTML, Response, content_type};
pub use crate::templates::{directory_listing, illegal_path_page};
