use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use core_types::SessionId;
use html::Element;

use crate::directive::Directive;
use crate::error::HandlerError;
use crate::page::{Page, PageContext};

/// Name of the no-tag handler run last, unless the page already carries a menu.
pub const MENU_HANDLER: &str = "menu";

/// Handles one element carrying a recognized directive.
pub trait TagHandler: Send + Sync {
    fn handle(
        &self,
        page: &mut PageContext,
        element: &mut Element,
        session: &SessionId,
        directive: &Directive,
    ) -> Result<(), HandlerError>;
}

impl<F> TagHandler for F
where
    F: Fn(&mut PageContext, &mut Element, &SessionId, &Directive) -> Result<(), HandlerError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        page: &mut PageContext,
        element: &mut Element,
        session: &SessionId,
        directive: &Directive,
    ) -> Result<(), HandlerError> {
        self(page, element, session, directive)
    }
}

/// Runs once per page, independent of any element.
pub trait PageHandler: Send + Sync {
    fn handle(&self, page: &mut Page, session: &SessionId) -> Result<(), HandlerError>;
}

impl<F> PageHandler for F
where
    F: Fn(&mut Page, &SessionId) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, page: &mut Page, session: &SessionId) -> Result<(), HandlerError> {
        self(page, session)
    }
}

pub enum Lookup {
    Matched(Directive, Arc<dyn TagHandler>),
    /// The attribute is registered for the tag but its keyword is not.
    NoMatch(String),
    NotRegistered,
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Matched(d, _) => f.debug_tuple("Matched").field(d).finish(),
            Lookup::NoMatch(k) => f.debug_tuple("NoMatch").field(k).finish(),
            Lookup::NotRegistered => f.write_str("NotRegistered"),
        }
    }
}

type Keywords = HashMap<String, Arc<dyn TagHandler>>;

#[derive(Default)]
pub struct MarkupRegistryBuilder {
    tags: BTreeMap<(String, String), Keywords>,
    no_tag: Vec<(String, Arc<dyn PageHandler>)>,
    default_markup: Option<String>,
}

impl MarkupRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations for the same `(tag, attribute, keyword)` replace earlier ones.
    pub fn register(
        &mut self,
        tag: &str,
        attribute: &str,
        keyword: &str,
        handler: Arc<dyn TagHandler>,
    ) -> &mut Self {
        let key = (tag.to_ascii_lowercase(), attribute.to_ascii_lowercase());
        self.tags
            .entry(key)
            .or_default()
            .insert(keyword.to_lowercase(), handler);
        self
    }

    /// Page handlers keep registration order; re-registering a name replaces it in place.
    pub fn register_no_tag(&mut self, name: &str, handler: Arc<dyn PageHandler>) -> &mut Self {
        match self.no_tag.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = handler,
            None => self.no_tag.push((name.to_string(), handler)),
        }
        self
    }

    /// Directive given to undecorated elements; `"none"` disables the fallback.
    pub fn register_default_markup(&mut self, keyword: &str) -> &mut Self {
        let keyword = keyword.trim().to_lowercase();
        self.default_markup = (!keyword.is_empty() && keyword != "none").then_some(keyword);
        self
    }

    pub fn build(self) -> Arc<MarkupRegistry> {
        Arc::new(MarkupRegistry {
            tags: self.tags,
            no_tag: self.no_tag,
            default_markup: self.default_markup,
        })
    }
}

/// Frozen table of handlers, shared by every render.
pub struct MarkupRegistry {
    tags: BTreeMap<(String, String), Keywords>,
    no_tag: Vec<(String, Arc<dyn PageHandler>)>,
    default_markup: Option<String>,
}

impl MarkupRegistry {
    pub fn lookup(&self, tag: &str, attribute: &str, value: &str) -> Lookup {
        let key = (tag.to_ascii_lowercase(), attribute.to_ascii_lowercase());
        let Some(keywords) = self.tags.get(&key) else {
            return Lookup::NotRegistered;
        };
        let Some(directive) = Directive::parse(value) else {
            return Lookup::NoMatch(String::new());
        };
        match keywords.get(&directive.keyword) {
            Some(handler) => Lookup::Matched(directive, Arc::clone(handler)),
            None => Lookup::NoMatch(directive.keyword),
        }
    }

    /// Attributes that carry directives on `tag`, in sorted order.
    pub fn dispatch_attributes<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .keys()
            .filter(move |(t, _)| t == tag)
            .map(|(_, a)| a.as_str())
    }

    /// True when `element` carries any attribute registered for its tag.
    pub fn has_dispatch_attribute(&self, element: &Element) -> bool {
        self.dispatch_attributes(&element.tag)
            .any(|attr| element.has(attr))
    }

    pub fn default_markup(&self) -> Option<&str> {
        self.default_markup.as_deref()
    }

    /// Page handlers in registration order, the menu excluded.
    pub fn page_handlers(&self) -> impl Iterator<Item = (&str, &Arc<dyn PageHandler>)> {
        self.no_tag
            .iter()
            .filter(|(name, _)| name != MENU_HANDLER)
            .map(|(name, h)| (name.as_str(), h))
    }

    pub fn menu_handler(&self) -> Option<&Arc<dyn PageHandler>> {
        self.no_tag
            .iter()
            .find(|(name, _)| name == MENU_HANDLER)
            .map(|(_, h)| h)
    }

    pub fn keywords(&self, tag: &str, attribute: &str) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .tags
            .get(&(tag.to_string(), attribute.to_string()))
            .map(|k| k.keys().map(String::as_str).collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }
}

impl fmt::Debug for MarkupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkupRegistry")
            .field("tags", &self.tags.keys().collect::<Vec<_>>())
            .field(
                "no_tag",
                &self.no_tag.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("default_markup", &self.default_markup)
            .finish()
    }
}
