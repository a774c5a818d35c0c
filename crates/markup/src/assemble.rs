use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bus::ChannelHub;
use core_types::{SessionId, TrustTier};
use html::Id;
use html::traverse::{assign_node_ids, collect_ids, find_node_by_id, find_node_by_id_mut};
use security::SecurityPolicy;

use crate::bootstrap::{CHANNEL_SCRIPT, error_page, onload_for};
use crate::error::{AssembleError, HandlerError};
use crate::page::{Dispatched, HandlerFailure, Page, PageContext, PageFlags};
use crate::registry::{Lookup, MENU_HANDLER, MarkupRegistry};

/// Include marking that a page already carries a menu.
pub const MENU_INCLUDED: &str = "menu_included";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    pub local: bool,
    pub remote: bool,
    /// Sanitize at this tier instead of the one resolved from the URL.
    pub trust_override: Option<TrustTier>,
    /// Abort on the first handler failure instead of recording it.
    pub strict_handlers: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Tags that receive the default directive when they carry none.
    pub default_markup_tags: Vec<String>,
    /// Makes every render strict, whatever the options say.
    pub strict_handlers: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        AssemblerConfig {
            default_markup_tags: vec!["pre".to_string()],
            strict_handlers: false,
        }
    }
}

/// Turns raw documents into sanitized pages with live widgets.
pub struct PageAssembler {
    registry: Arc<MarkupRegistry>,
    policy: Arc<SecurityPolicy>,
    hub: Arc<ChannelHub>,
    config: AssemblerConfig,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn guarded<F>(f: F) -> Result<(), HandlerError>
where
    F: FnOnce() -> Result<(), HandlerError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(HandlerError::Panicked(panic_message(payload.as_ref()))),
    }
}

impl PageAssembler {
    pub fn new(
        registry: Arc<MarkupRegistry>,
        policy: Arc<SecurityPolicy>,
        hub: Arc<ChannelHub>,
        config: AssemblerConfig,
    ) -> Self {
        PageAssembler {
            registry,
            policy,
            hub,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<MarkupRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &Arc<SecurityPolicy> {
        &self.policy
    }

    pub fn assemble(
        &self,
        bytes: &[u8],
        url: &str,
        options: AssembleOptions,
    ) -> Result<Page, AssembleError> {
        let strict = options.strict_handlers || self.config.strict_handlers;
        let source = String::from_utf8_lossy(bytes);
        let mut document = html::parse(&source);
        document.ensure_head();
        document.ensure_body();

        let tier = self.policy.tier_for(url, options.trust_override);
        let report = self.policy.sanitize(&mut document, url, tier);
        document.ensure_head();
        document.ensure_body();
        log::debug!(
            target: "markup.dispatch",
            "{url}: sanitized at {tier}, {} removals",
            report.removed_count
        );

        let flags = PageFlags {
            local: options.local,
            remote: options.remote,
        };
        let context = PageContext::new(core_types::PageId::fresh(), url, flags);
        let mut page = Page::new(context, document, report);

        html::traverse::clear_node_ids(page.document_mut().root_mut());
        assign_node_ids(page.document_mut().root_mut());
        let registry = &self.registry;
        let root = page.document().root();
        let marked = collect_ids(root, &|el| registry.has_dispatch_attribute(el));
        let defaultable = match registry.default_markup() {
            Some(_) => collect_ids(root, &|el| {
                self.config.default_markup_tags.iter().any(|t| *t == el.tag)
                    && !registry.has_dispatch_attribute(el)
            }),
            None => Vec::new(),
        };

        for id in marked {
            self.dispatch_element(&mut page, id, strict)?;
        }

        let page_handlers: Vec<_> = registry
            .page_handlers()
            .map(|(name, h)| (name.to_string(), Arc::clone(h)))
            .collect();
        for (name, handler) in page_handlers {
            let session = page.context().fresh_session_id();
            let result = guarded(|| handler.handle(&mut page, &session));
            self.settle(&mut page, &name, session, result, strict)?;
        }

        if let Some(default) = registry.default_markup() {
            for id in defaultable {
                let (_, document, _) = page.parts_mut();
                let Some(el) = find_node_by_id_mut(document.root_mut(), id) else {
                    continue;
                };
                if registry.has_dispatch_attribute(el) {
                    continue;
                }
                let attr = registry
                    .dispatch_attributes(&el.tag)
                    .next()
                    .unwrap_or("title")
                    .to_string();
                el.set(&attr, default);
                self.dispatch_element(&mut page, id, strict)?;
            }
        }

        if !page.context().has_include(MENU_INCLUDED)
            && let Some(menu) = registry.menu_handler().cloned()
        {
            let session = page.context().fresh_session_id();
            let result = guarded(|| menu.handle(&mut page, &session));
            self.settle(&mut page, MENU_HANDLER, session, result, strict)?;
        }

        self.bootstrap_channel(&mut page);
        page.apply_edits();
        html::traverse::clear_node_ids(page.document_mut().root_mut());
        Ok(page)
    }

    /// Runs the handler for every registered attribute `id` carries.
    fn dispatch_element(&self, page: &mut Page, id: Id, strict: bool) -> Result<(), AssembleError> {
        let Some(el) = find_node_by_id(page.document().root(), id) else {
            return Ok(());
        };
        let tag = el.tag.clone();
        let attrs: Vec<(String, String)> = self
            .registry
            .dispatch_attributes(&el.tag)
            .filter_map(|a| el.get(a).map(|v| (a.to_string(), v.to_string())))
            .collect();
        for (attr, value) in attrs {
            match self.registry.lookup(&tag, &attr, &value) {
                Lookup::Matched(directive, handler) => {
                    let (context, document, _) = page.parts_mut();
                    let Some(el) = find_node_by_id_mut(document.root_mut(), id) else {
                        return Ok(());
                    };
                    let session = context.fresh_session_id();
                    log::trace!(
                        target: "markup.dispatch",
                        "<{tag} {attr}=\"{}\"> -> {session}",
                        directive.raw
                    );
                    let result = guarded(|| handler.handle(context, el, &session, &directive));
                    if result.is_ok() {
                        page.dispatch_mut().dispatched.push(Dispatched {
                            tag: tag.clone(),
                            keyword: directive.keyword.clone(),
                            session: session.clone(),
                        });
                    }
                    self.settle(page, &directive.keyword, session, result, strict)?;
                }
                Lookup::NoMatch(keyword) => {
                    log::debug!(target: "markup.dispatch", "no handler for <{tag} {attr}=\"{keyword}\">");
                    page.dispatch_mut().unmatched.push((tag.clone(), keyword));
                }
                Lookup::NotRegistered => {}
            }
        }
        Ok(())
    }

    fn settle(
        &self,
        page: &mut Page,
        handler: &str,
        session: SessionId,
        result: Result<(), HandlerError>,
        strict: bool,
    ) -> Result<(), AssembleError> {
        let Err(error) = result else {
            return Ok(());
        };
        log::warn!(target: "markup.dispatch", "{}: {handler} ({session}): {error}", page.url());
        if strict {
            return Err(AssembleError::Handler {
                handler: handler.to_string(),
                session,
                error,
            });
        }
        page.dispatch_mut().failures.push(HandlerFailure {
            handler: handler.to_string(),
            session,
            error,
        });
        Ok(())
    }

    fn bootstrap_channel(&self, page: &mut Page) {
        let id = page.id().clone();
        self.hub.register_page(&id);
        page.context_mut().add_script(CHANNEL_SCRIPT);
        match page.document_mut().body_mut() {
            Some(body) => body.set("onload", &onload_for(&id)),
            None => log::debug!(target: "markup.dispatch", "page {id} has no body, assuming frameset"),
        }
    }

    /// Assembled and serialized page; failures become the fixed error page.
    pub fn render(&self, bytes: &[u8], url: &str, options: AssembleOptions) -> Vec<u8> {
        match self.assemble(bytes, url, options) {
            Ok(page) => page.to_html().into_bytes(),
            Err(err) => {
                log::warn!(target: "markup.dispatch", "render of {url} failed: {err}");
                error_page(url, &err.to_string()).into_bytes()
            }
        }
    }
}
