use core_types::SessionId;
use html::Element;
use interp::{Engine, Mode};
use markup::{Directive, HandlerError, PageContext};

use crate::io::{InputRole, insert_io_subwidget};
use crate::{into_container, open_session, take_source};

/// `interpreter [isolated] [log]`: the authored text stays visible as a transcript,
/// followed by a console whose lines run one statement at a time.
pub fn insert_interpreter(
    engine: &Engine,
    page: &mut PageContext,
    element: &mut Element,
    session: &SessionId,
    directive: &Directive,
) -> Result<(), HandlerError> {
    let transcript = take_source(element);
    into_container(element, "interpreter");
    if !transcript.is_empty() {
        element.children.push(
            Element::new("pre")
                .with_attr("class", "source")
                .with_text(&transcript),
        );
    }
    insert_io_subwidget(page, element, session, InputRole::Console);
    open_session(engine, session, Mode::Console, directive);
    Ok(())
}
