use core_types::SessionId;
use html::Element;
use interp::{Engine, Mode};
use markup::{Directive, HandlerError, PageContext};

use crate::editor::{insert_editor_subwidget, insert_execute_button};
use crate::io::{InputRole, insert_io_subwidget};
use crate::{into_container, open_session, take_source};

/// `doctest`: the element holds `>>>` examples. The learner writes code in an empty
/// editor; running it checks the examples against the resulting namespace.
pub fn insert_doctest(
    engine: &Engine,
    page: &mut PageContext,
    element: &mut Element,
    session: &SessionId,
    directive: &Directive,
) -> Result<(), HandlerError> {
    let examples = take_source(element);
    if !examples.lines().any(|l| l.trim_start().starts_with(">>>")) {
        return Err(HandlerError::failed(format!(
            "doctest {session} has no >>> examples"
        )));
    }
    into_container(element, "doctest");
    element.children.push(
        Element::new("pre")
            .with_attr("class", "source")
            .with_text(&examples),
    );
    insert_editor_subwidget(element, session, "");
    insert_execute_button(page, element, session, "Run Doctest");
    insert_io_subwidget(page, element, session, InputRole::Stdin);
    open_session(engine, session, Mode::Doctest(examples), directive);
    Ok(())
}
