use crate::types::{Document, Element, Token};

/// Open elements beyond this depth are attached but not entered; their content
/// continues in the deepest open element.
pub const MAX_OPEN_ELEMENTS: usize = 512;

/// Builds a text/tail element tree from tokens. Comments and doctypes are dropped;
/// unmatched end tags are ignored; unclosed elements are closed at end of input.
pub fn build_document(tokens: &[Token]) -> Document {
    // Slot 0 is a synthetic container for top-level content.
    let mut open: Vec<Element> = vec![Element::default()];

    for token in tokens {
        match token {
            Token::Doctype(_) | Token::Comment(_) => {}
            Token::Text(txt) => {
                if let Some(top) = open.last_mut() {
                    top.push_text(txt);
                }
            }
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                while open.len() > 1 && implies_end(&open[open.len() - 1].tag, name) {
                    close_top(&mut open);
                }
                let mut el = Element::new(name);
                el.attributes = attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone().unwrap_or_default()))
                    .collect();
                if *self_closing || open.len() > MAX_OPEN_ELEMENTS {
                    if let Some(top) = open.last_mut() {
                        top.children.push(el);
                    }
                } else {
                    open.push(el);
                }
            }
            Token::EndTag(name) => {
                let Some(pos) = open.iter().skip(1).rposition(|el| el.tag == *name) else {
                    log::trace!(target: "html.builder", "ignoring unmatched </{name}>");
                    continue;
                };
                // rposition over the skipped iterator is relative to slot 1.
                while open.len() > pos + 1 {
                    close_top(&mut open);
                }
            }
        }
    }
    while open.len() > 1 {
        close_top(&mut open);
    }
    let container = open.pop().unwrap_or_default();
    into_document(container)
}

fn close_top(open: &mut Vec<Element>) {
    if let Some(el) = open.pop() {
        if let Some(parent) = open.last_mut() {
            parent.children.push(el);
        }
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "address"
            | "blockquote"
            | "div"
            | "dl"
            | "fieldset"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
            | "ol"
            | "p"
            | "pre"
            | "table"
            | "ul"
    )
}

/// Whether opening `incoming` implicitly closes the open element `top`.
fn implies_end(top: &str, incoming: &str) -> bool {
    match top {
        "p" => is_block(incoming),
        "li" => incoming == "li",
        "dt" | "dd" => matches!(incoming, "dt" | "dd"),
        "option" => matches!(incoming, "option" | "optgroup"),
        "td" | "th" => matches!(incoming, "td" | "th" | "tr"),
        "tr" => incoming == "tr",
        _ => false,
    }
}

fn into_document(mut container: Element) -> Document {
    let Some(pos) = container.children.iter().position(|c| c.tag == "html") else {
        let mut root = Element::new("html");
        root.text = container.text;
        root.children = container.children;
        return Document::from_root(root);
    };
    let mut root = container.children.remove(pos);
    let stray_tail = std::mem::take(&mut root.tail);
    // Content outside `<html>` is kept, appended after the root's own content.
    let before_text = container.text;
    let before: Vec<Element> = container.children.drain(..pos).collect();
    if !before_text.trim().is_empty() {
        root.push_text(&before_text);
    }
    root.children.extend(before);
    if !stray_tail.trim().is_empty() {
        root.push_text(&stray_tail);
    }
    root.children.extend(container.children);
    Document::from_root(root)
}
