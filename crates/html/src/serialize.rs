use crate::entities::{escape_attr, escape_text};
use crate::tokenizer::is_void_element;
use crate::types::{Document, Element};

pub fn serialize_document(doc: &Document) -> String {
    let mut out = String::new();
    write_element(doc.root(), &mut out);
    out
}

pub fn serialize_element(el: &Element) -> String {
    let mut out = String::new();
    write_element(el, &mut out);
    out
}

fn is_rawtext(tag: &str) -> bool {
    tag == "script" || tag == "style"
}

/// Writes `el` including its tail. Void elements without content use `<tag />`;
/// other empty elements always get an explicit end tag.
fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (name, value) in &el.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    if is_void_element(&el.tag) && el.text.is_empty() && el.children.is_empty() {
        out.push_str(" />");
    } else {
        out.push('>');
        if is_rawtext(&el.tag) {
            out.push_str(&el.text);
        } else {
            out.push_str(&escape_text(&el.text));
        }
        for child in &el.children {
            write_element(child, out);
        }
        out.push_str("</");
        out.push_str(&el.tag);
        out.push('>');
    }
    out.push_str(&escape_text(&el.tail));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn serializes_in_document_order() {
        let doc = parse("<div class=\"a\">x &lt; y<br>z<script>if (a<b) {}</script></div>");
        let html = serialize_element(&doc.root().children[0]);
        assert_eq!(
            html,
            "<div class=\"a\">x &lt; y<br />z<script>if (a<b) {}</script></div>"
        );
    }

    #[test]
    fn empty_non_void_elements_keep_end_tag() {
        let el = Element::new("script").with_attr("src", "/a.js");
        assert_eq!(serialize_element(&el), "<script src=\"/a.js\"></script>");
    }

    #[test]
    fn serialized_output_reparses_to_same_tree() {
        let doc = parse("<html><head><title>t</title></head><body><p id=\"q\">a \"b\"</p></body></html>");
        let again = parse(&serialize_document(&doc));
        assert_eq!(again, doc);
    }
}
