pub type NodeId = u32;

/// Node identity assigned by `traverse::assign_node_ids`; `Id(0)` means unassigned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Id(pub NodeId);

#[derive(Debug)]
pub enum Token {
    Doctype(String),
    StartTag {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        self_closing: bool,
    },
    EndTag(String),
    Comment(String),
    Text(String),
}

/// An element in text/tail form: `text` precedes the first child, `tail` follows the
/// element's own end tag and belongs to the parent's content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub id: Id,
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub tail: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_ascii_lowercase(),
            ..Element::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces the value in place when present, keeping attribute order.
    pub fn set(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name, value.to_string())),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self
            .attributes
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.attributes.remove(pos).1)
    }

    /// Appends text after the last child, or to `text` when there are no children.
    pub fn push_text(&mut self, s: &str) {
        match self.children.last_mut() {
            Some(last) => last.tail.push_str(s),
            None => self.text.push_str(s),
        }
    }

    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    /// Text of this element and its descendants in document order, excluding the own tail.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(el: &Element, out: &mut String) {
    out.push_str(&el.text);
    for child in &el.children {
        collect_text(child, out);
        out.push_str(&child.tail);
    }
}

/// A parsed document. The root element is always `html`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Wraps `root` in an `html` element when it is something else.
    pub fn from_root(root: Element) -> Self {
        if root.tag == "html" {
            return Document { root };
        }
        Document {
            root: Element::new("html").with_child(root),
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    pub fn head(&self) -> Option<&Element> {
        self.root.child("head")
    }

    pub fn head_mut(&mut self) -> Option<&mut Element> {
        self.root.child_mut("head")
    }

    pub fn body(&self) -> Option<&Element> {
        self.root.child("body")
    }

    pub fn body_mut(&mut self) -> Option<&mut Element> {
        self.root.child_mut("body")
    }

    pub fn frameset_mut(&mut self) -> Option<&mut Element> {
        self.root.child_mut("frameset")
    }

    /// Inserts an empty `<head>` at position 0 of the root if none exists.
    pub fn ensure_head(&mut self) -> &mut Element {
        let pos = match self.root.children.iter().position(|c| c.tag == "head") {
            Some(pos) => pos,
            None => {
                log::trace!(target: "html.document", "synthesizing <head>");
                self.root.children.insert(0, Element::new("head"));
                0
            }
        };
        &mut self.root.children[pos]
    }

    /// Moves everything but `<head>` into a synthesized `<body>`. Documents with a
    /// `<frameset>` are left alone.
    pub fn ensure_body(&mut self) {
        if self.root.child("body").is_some() || self.root.child("frameset").is_some() {
            return;
        }
        log::trace!(target: "html.document", "synthesizing <body>");
        let mut body = Element::new("body");
        let mut kept = Vec::new();
        let root_text = std::mem::take(&mut self.root.text);
        if !root_text.trim().is_empty() {
            body.push_text(&root_text);
        }
        for mut child in std::mem::take(&mut self.root.children) {
            if child.tag == "head" {
                let tail = std::mem::take(&mut child.tail);
                body.push_text(&tail);
                kept.push(child);
            } else {
                body.children.push(child);
            }
        }
        kept.push(body);
        self.root.children = kept;
    }

    pub fn text_content(&self) -> String {
        self.root.text_content()
    }
}
