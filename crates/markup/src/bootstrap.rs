//! Browser side of the output channel, and the page shown when a render fails.
use core_types::PageId;
use html::escape_text;

/// Path the long-poll client requests with `?pageid=`.
pub const POLL_PATH: &str = "/comet";

/// Long-poll client. Each response body is a sequence of `appendOutput` and
/// `sessionFinished` calls, evaluated as it arrives.
pub const CHANNEL_SCRIPT: &str = r#"
function appendOutput(session, stream, text) {
    var out = document.getElementById("out_" + session);
    if (!out) { return; }
    var span = document.createElement("span");
    span.className = stream;
    span.appendChild(document.createTextNode(text));
    out.appendChild(span);
}
function sessionFinished(session, state) {
    var out = document.getElementById("out_" + session);
    if (out) { out.setAttribute("data-state", state); }
    var input = document.getElementById("in_" + session);
    if (input) { input.style.display = "none"; }
}
function runOutput(page) {
    var h = new XMLHttpRequest();
    h.onreadystatechange = function() {
        if (h.readyState != 4) { return; }
        if (h.status == 200) {
            eval(h.responseText);
            runOutput(page);
        }
    };
    h.open("GET", "/comet?pageid=" + page, true);
    h.send("");
}
"#;

/// `onload` value that starts polling for `page`.
pub fn onload_for(page: &PageId) -> String {
    format!("runOutput(\"{page}\")")
}

/// Fixed page returned instead of a document whose assembly failed.
pub fn error_page(url: &str, message: &str) -> String {
    format!(
        "{doctype}<html><head><title>Error</title></head><body>\
<h1>This page could not be prepared</h1>\
<p>{url}</p><pre>{message}</pre></body></html>",
        doctype = crate::page::DOCTYPE,
        url = escape_text(url),
        message = escape_text(message),
    )
}
