use core_types::SessionId;
use html::Element;
use markup::{Directive, HandlerError, PageContext};

/// Path that loads a tutorial from another site.
pub const REMOTE_PATH: &str = "/remote";

/// `load_remote`: a form that opens the URL typed in it through [`REMOTE_PATH`].
/// The element's text, if any, is the initial URL.
pub fn insert_load_remote(
    _page: &mut PageContext,
    element: &mut Element,
    _session: &SessionId,
    _directive: &Directive,
) -> Result<(), HandlerError> {
    let initial = element.text_content().trim().to_string();
    element.text.clear();
    element.children.clear();
    element.children.push(
        Element::new("form")
            .with_attr("method", "get")
            .with_attr("action", REMOTE_PATH)
            .with_child(
                Element::new("input")
                    .with_attr("name", "url")
                    .with_attr("size", "80")
                    .with_attr("value", &initial),
            )
            .with_child(
                Element::new("input")
                    .with_attr("type", "submit")
                    .with_attr("value", "Load remote tutorial"),
            ),
    );
    Ok(())
}
