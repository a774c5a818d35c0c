//! Concrete handlers turning directive-bearing elements into live widgets.
//!
//! [`Widgets::register`] installs all of them:
//!
//! | element | attribute | keyword |
//! |---|---|---|
//! | `pre` | `title` | `editor`, `interpreter`, `doctest` |
//! | `span` | `title` | `load_remote` |
//! | `meta` | `name` | `livedoc_menu` |
//! | `meta` | `content` | `slideshow` |
//!
//! plus the `slideshow` and `menu` page handlers.
use std::path::PathBuf;
use std::sync::Arc;

use core_types::SessionId;
use html::Element;
use interp::session::trim_trailing_blank_lines;
use interp::{Engine, Mode};
use markup::{
    Directive, HandlerError, MENU_HANDLER, MarkupRegistryBuilder, Page, PageContext,
    PageHandler, TagHandler,
};
use net::ResourceReader;

mod doctest;
mod editor;
mod interpreter;
mod io;
mod menu;
mod remote;
mod slideshow;

pub use crate::doctest::insert_doctest;
pub use crate::editor::{EDITOR_INCLUDED, insert_editor, insert_editor_subwidget};
pub use crate::interpreter::insert_interpreter;
pub use crate::io::{EXEC_PATH, INPUT_PATH, IO_INCLUDED, InputRole, insert_io_subwidget};
pub use crate::menu::{CUSTOM_MENU, Menu, insert_custom_menu, insert_default_menu};
pub use crate::remote::{REMOTE_PATH, insert_load_remote};
pub use crate::slideshow::{
    SLIDES_SCRIPT, SLIDESHOW_INCLUDED, insert_interactive_slides, insert_slides_script,
};

/// Text of a widget element with the parser's leading newline and trailing blank
/// lines removed. The element is left empty.
pub(crate) fn take_source(element: &mut Element) -> String {
    let text = element.text_content();
    element.text.clear();
    element.children.clear();
    let text = text.strip_prefix('\n').unwrap_or(&text);
    trim_trailing_blank_lines(text)
}

/// Turns the authored element into a `<div class="livedoc {kind}">`, keeping its id.
pub(crate) fn into_container(element: &mut Element, kind: &str) {
    element.tag = "div".to_string();
    element.attributes.retain(|(name, _)| name == "id" || name == "title");
    element.set("class", &format!("livedoc {kind}"));
}

/// Doctests always run isolated; other widgets share unless `isolated` is given.
pub(crate) fn open_session(engine: &Engine, session: &SessionId, mode: Mode, directive: &Directive) {
    let shared = !matches!(mode, Mode::Doctest(_)) && !directive.has_arg("isolated");
    engine.create_session(session.clone(), mode, shared);
    if directive.has_arg("log") {
        engine.register_logging(session);
    }
}

/// Everything the handlers need at render time.
pub struct Widgets {
    engine: Arc<Engine>,
    reader: Arc<dyn ResourceReader>,
    server_root: PathBuf,
    menu: Menu,
}

impl Widgets {
    pub fn new(engine: Arc<Engine>, reader: Arc<dyn ResourceReader>, server_root: PathBuf) -> Self {
        Widgets {
            engine,
            reader,
            server_root,
            menu: Menu::default(),
        }
    }

    pub fn with_menu(mut self, menu: Menu) -> Self {
        self.menu = menu;
        self
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Registers every widget with `builder`.
    pub fn register(self, builder: &mut MarkupRegistryBuilder) {
        let w = Arc::new(self);
        builder
            .register("pre", "title", "editor", tag_handler(&w, |w, p, e, s, d| {
                insert_editor(&w.engine, p, e, s, d)
            }))
            .register("pre", "title", "interpreter", tag_handler(&w, |w, p, e, s, d| {
                insert_interpreter(&w.engine, p, e, s, d)
            }))
            .register("pre", "title", "doctest", tag_handler(&w, |w, p, e, s, d| {
                insert_doctest(&w.engine, p, e, s, d)
            }))
            .register("span", "title", "load_remote", tag_handler(&w, |_, p, e, s, d| {
                insert_load_remote(p, e, s, d)
            }))
            .register("meta", "name", CUSTOM_MENU, tag_handler(&w, |w, p, e, _, d| {
                insert_custom_menu(w.reader.as_ref(), &w.server_root, p, e, d)
            }))
            .register("meta", "content", "slideshow", tag_handler(&w, |_, p, e, _, d| {
                insert_slides_script(p, e, d)
            }))
            .register_no_tag("slideshow", page_handler(&w, |w, p| {
                insert_interactive_slides(&w.engine, p)
            }))
            .register_no_tag(MENU_HANDLER, page_handler(&w, |w, p| {
                insert_default_menu(&w.menu, p)
            }));
    }
}

type TagFn = fn(&Widgets, &mut PageContext, &mut Element, &SessionId, &Directive) -> Result<(), HandlerError>;
type PageFn = fn(&Widgets, &mut Page) -> Result<(), HandlerError>;

fn tag_handler(widgets: &Arc<Widgets>, f: TagFn) -> Arc<dyn TagHandler> {
    let widgets = Arc::clone(widgets);
    Arc::new(
        move |page: &mut PageContext,
              el: &mut Element,
              session: &SessionId,
              directive: &Directive|
              -> Result<(), HandlerError> { f(&widgets, page, el, session, directive) },
    )
}

fn page_handler(widgets: &Arc<Widgets>, f: PageFn) -> Arc<dyn PageHandler> {
    let widgets = Arc::clone(widgets);
    Arc::new(move |page: &mut Page, _: &SessionId| -> Result<(), HandlerError> {
        f(&widgets, page)
    })
}
