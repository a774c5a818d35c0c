use core_types::SessionId;
use html::Element;
use interp::{Engine, Mode};
use markup::{Directive, HandlerError, PageContext};

use crate::io::{InputRole, insert_io_subwidget};
use crate::{into_container, open_session, take_source};

pub const EDITOR_INCLUDED: &str = "editor_included";

const EDITOR_SCRIPT: &str = r#"
function exec_code(session) {
    var code = document.getElementById("code_" + session).value;
    var out = document.getElementById("out_" + session);
    if (out) { out.innerHTML = ""; out.removeAttribute("data-state"); }
    var input = document.getElementById("in_" + session);
    if (input) { input.style.display = "inline"; }
    var h = new XMLHttpRequest();
    h.open("POST", "/exec?uid=" + session, true);
    h.send(code);
}
"#;

/// `<textarea id="code_…">` holding `code`.
pub fn insert_editor_subwidget(element: &mut Element, session: &SessionId, code: &str) {
    element.children.push(
        Element::new("textarea")
            .with_attr("rows", "10")
            .with_attr("cols", "80")
            .with_attr("id", &format!("code_{session}"))
            .with_text(if code.is_empty() { "\n" } else { code }),
    );
}

/// Line break, a button running the editor's code, line break.
pub(crate) fn insert_execute_button(
    page: &mut PageContext,
    element: &mut Element,
    session: &SessionId,
    label: &str,
) {
    if page.add_include(EDITOR_INCLUDED) {
        page.add_script(EDITOR_SCRIPT);
    }
    element.children.push(Element::new("br"));
    element.children.push(
        Element::new("button")
            .with_attr("onclick", &format!("exec_code('{session}')"))
            .with_text(label),
    );
    element.children.push(Element::new("br"));
}

/// `editor [no_copy] [no_pre] [isolated] [log]`.
///
/// The authored code is shown above the editor unless `no_pre` is given and copied
/// into it unless `no_copy` is given. Editor code runs as a whole program.
pub fn insert_editor(
    engine: &Engine,
    page: &mut PageContext,
    element: &mut Element,
    session: &SessionId,
    directive: &Directive,
) -> Result<(), HandlerError> {
    let code = take_source(element);
    into_container(element, "editor");
    if !directive.has_arg("no_pre") && !code.is_empty() {
        element.children.push(
            Element::new("pre")
                .with_attr("class", "source")
                .with_text(&code),
        );
    }
    let initial = if directive.has_arg("no_copy") { "" } else { code.as_str() };
    insert_editor_subwidget(element, session, initial);
    insert_execute_button(page, element, session, "Execute");
    insert_io_subwidget(page, element, session, InputRole::Stdin);
    open_session(engine, session, Mode::Editor, directive);
    Ok(())
}
