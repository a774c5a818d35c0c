use std::collections::HashSet;

use core_types::{PageId, SessionId};
use html::{Document, Element, serialize_document};
use security::SecurityReport;

use crate::error::HandlerError;

/// Doctype written ahead of every assembled page.
pub const DOCTYPE: &str = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \
\"http://www.w3.org/TR/xhtml1/DTD/strict.dtd\">\n\n";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageFlags {
    /// Loaded from the local filesystem outside the server root.
    pub local: bool,
    /// Fetched from another site.
    pub remote: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum HeadEdit {
    Append(Element),
    Prepend(Element),
}

/// Everything a handler may touch besides its own element. Head and body edits are
/// queued and applied once dispatch is over.
#[derive(Debug)]
pub struct PageContext {
    id: PageId,
    url: String,
    flags: PageFlags,
    included: HashSet<String>,
    head_edits: Vec<HeadEdit>,
    body_prepends: Vec<Element>,
}

impl PageContext {
    pub fn new(id: PageId, url: &str, flags: PageFlags) -> Self {
        PageContext {
            id,
            url: url.to_string(),
            flags,
            included: HashSet::new(),
            head_edits: Vec::new(),
            body_prepends: Vec::new(),
        }
    }

    pub fn id(&self) -> &PageId {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn flags(&self) -> PageFlags {
        self.flags
    }

    pub fn fresh_session_id(&self) -> SessionId {
        SessionId::fresh(&self.id)
    }

    /// Records that a once-per-page resource is present. Returns `false` if it already was.
    pub fn add_include(&mut self, name: &str) -> bool {
        self.included.insert(name.to_string())
    }

    pub fn has_include(&self, name: &str) -> bool {
        self.included.contains(name)
    }

    /// Inline script appended to `<head>`.
    pub fn add_script(&mut self, code: &str) {
        let script = Element::new("script")
            .with_attr("type", "text/javascript")
            .with_text(code);
        self.append_to_head(script);
    }

    pub fn append_to_head(&mut self, element: Element) {
        self.head_edits.push(HeadEdit::Append(element));
    }

    /// Inline stylesheet placed first in `<head>`.
    pub fn add_stylesheet(&mut self, css: &str) {
        let style = Element::new("style")
            .with_attr("type", "text/css")
            .with_text(css);
        self.head_edits.push(HeadEdit::Prepend(style));
    }

    /// External script placed first in `<head>`, ahead of inline scripts.
    pub fn insert_script_file(&mut self, src: &str) {
        // A single space keeps browsers from treating the element as self-closed.
        let script = Element::new("script")
            .with_attr("src", src)
            .with_attr("type", "text/javascript")
            .with_text(" ");
        self.head_edits.push(HeadEdit::Prepend(script));
    }

    pub fn prepend_to_body(&mut self, element: Element) {
        self.body_prepends.push(element);
    }

    fn has_pending_edits(&self) -> bool {
        !self.head_edits.is_empty() || !self.body_prepends.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatched {
    pub tag: String,
    pub keyword: String,
    pub session: SessionId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerFailure {
    pub handler: String,
    pub session: SessionId,
    pub error: HandlerError,
}

/// What dispatch did to a page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Successful tag-handler invocations, in dispatch order.
    pub dispatched: Vec<Dispatched>,
    pub failures: Vec<HandlerFailure>,
    /// `(tag, keyword)` pairs whose attribute is registered but whose keyword is not.
    pub unmatched: Vec<(String, String)>,
}

/// One document being assembled.
#[derive(Debug)]
pub struct Page {
    context: PageContext,
    document: Document,
    security: SecurityReport,
    dispatch: DispatchReport,
}

impl Page {
    pub fn new(context: PageContext, document: Document, security: SecurityReport) -> Self {
        Page {
            context,
            document,
            security,
            dispatch: DispatchReport::default(),
        }
    }

    pub fn context(&self) -> &PageContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut PageContext {
        &mut self.context
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Split borrow used while a handler holds one element of the tree.
    pub(crate) fn parts_mut(&mut self) -> (&mut PageContext, &mut Document, &mut DispatchReport) {
        (&mut self.context, &mut self.document, &mut self.dispatch)
    }

    pub fn id(&self) -> &PageId {
        self.context.id()
    }

    pub fn url(&self) -> &str {
        self.context.url()
    }

    pub fn security(&self) -> &SecurityReport {
        &self.security
    }

    pub fn dispatch(&self) -> &DispatchReport {
        &self.dispatch
    }

    pub(crate) fn dispatch_mut(&mut self) -> &mut DispatchReport {
        &mut self.dispatch
    }

    /// Moves queued head and body edits into the document.
    pub fn apply_edits(&mut self) {
        if !self.context.has_pending_edits() {
            return;
        }
        let head = self.document.ensure_head();
        for edit in self.context.head_edits.drain(..) {
            match edit {
                HeadEdit::Append(el) => head.children.push(el),
                HeadEdit::Prepend(el) => head.children.insert(0, el),
            }
        }
        let prepends = std::mem::take(&mut self.context.body_prepends);
        if prepends.is_empty() {
            return;
        }
        let Some(body) = self.document.body_mut() else {
            log::warn!(
                target: "markup.page",
                "page {} has no body; dropping {} prepended elements",
                self.context.id,
                prepends.len()
            );
            return;
        };
        let leading = std::mem::take(&mut body.text);
        let count = prepends.len();
        body.children.splice(0..0, prepends);
        body.children[count - 1].tail.push_str(&leading);
    }

    /// Serialized page with the fixed doctype.
    pub fn to_html(&self) -> String {
        let mut out = String::from(DOCTYPE);
        out.push_str(&serialize_document(&self.document));
        out
    }
}
