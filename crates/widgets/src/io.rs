//! Output area and input line shared by every executable widget.
use core_types::SessionId;
use html::Element;
use markup::PageContext;

pub const IO_INCLUDED: &str = "io_included";

/// Path that receives a line typed into a running program.
pub const INPUT_PATH: &str = "/input";
/// Path that receives code to execute.
pub const EXEC_PATH: &str = "/exec";

const IO_SCRIPT: &str = r#"
function push_keys(event, session, console) {
    if (event.keyCode != 13) { return; }
    var input = document.getElementById("in_" + session);
    var data = input.value;
    input.value = "";
    if (console) { appendOutput(session, "stdin", ">>> " + data + "\n"); }
    var h = new XMLHttpRequest();
    h.open("POST", (console ? "/exec" : "/input") + "?uid=" + session, true);
    h.send(data + "\n");
}
"#;

const IO_CSS: &str = r#"
.stdout { color: blue; }
.stderr { color: red; }
.stdin { color: darkgreen; font-weight: bold; }
.input { display: none; width: 90%; font: 10pt monospace; border-width: 1px; }
.console { display: inline; }
.output { font: 10pt monospace; white-space: pre-wrap; }
"#;

/// How the input line is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputRole {
    /// Lines feed `input()` of a running program; hidden until the program asks.
    Stdin,
    /// Every line is submitted as code.
    Console,
}

/// Appends `<span id="out_…">` and `<input id="in_…">` for `session` to `element`.
/// The script and stylesheet are added once per page.
pub fn insert_io_subwidget(
    page: &mut PageContext,
    element: &mut Element,
    session: &SessionId,
    role: InputRole,
) {
    if page.add_include(IO_INCLUDED) {
        page.add_script(IO_SCRIPT);
        page.add_stylesheet(IO_CSS);
    }
    let console = role == InputRole::Console;
    element.children.push(
        Element::new("span")
            .with_attr("class", "output")
            .with_attr("id", &format!("out_{session}"))
            .with_text("\n"),
    );
    element.children.push(
        Element::new("input")
            .with_attr("id", &format!("in_{session}"))
            .with_attr("type", "text")
            .with_attr("class", if console { "input console" } else { "input" })
            .with_attr(
                "onkeydown",
                &format!("push_keys(event, \"{session}\", {console})"),
            ),
    );
}
