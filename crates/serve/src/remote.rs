use markup::{AssembleOptions, PageAssembler, error_page};
use net::{Location, ResourceReader, Url};

use crate::response::Response;

/// Remote pages change under us; browsers must not keep them.
pub const NO_CACHE: &str = "no-cache, must-revalidate, no-store";

/// The `url` parameter of a `/remote?url=…` query string, form-decoded.
pub fn remote_url_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
}

/// Fetches `url` through `reader` and renders it as a remote tutorial.
pub fn remote_page(url: &str, reader: &dyn ResourceReader, assembler: &PageAssembler) -> Response {
    let location = match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Location::Remote(parsed),
        Ok(parsed) => {
            let message = format!("unsupported scheme {}", parsed.scheme());
            return Response::html(error_page(url, &message)).with_status(400);
        }
        Err(err) => {
            return Response::html(error_page(url, &err.to_string())).with_status(400);
        }
    };
    let bytes = match reader.read_bytes(&location) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!(target: "serve", "remote tutorial {url}: {err}");
            return Response::html(error_page(url, &err.to_string())).with_status(502);
        }
    };
    let options = AssembleOptions {
        remote: true,
        ..AssembleOptions::default()
    };
    Response::html(assembler.render(&bytes, url, options)).with_header("Cache-Control", NO_CACHE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_form_decoded() {
        assert_eq!(
            remote_url_from_query("x=1&url=http%3A%2F%2Fpython.org%2Fa+b").as_deref(),
            Some("http://python.org/a b")
        );
        assert_eq!(remote_url_from_query("x=1"), None);
    }
}
