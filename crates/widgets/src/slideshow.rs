//! Slide shows: pages declaring `<meta content="slideshow">` get the slide script and
//! two extra slides holding an interpreter and an editor.
use html::Element;
use interp::Engine;
use markup::{Directive, HandlerError, Page, PageContext};

use crate::editor::insert_editor;
use crate::interpreter::insert_interpreter;

pub const SLIDESHOW_INCLUDED: &str = "slideshow_included";
pub const SLIDES_SCRIPT: &str = "/javascript/slides.js";

// The slide script builds its title list from the first 50 characters of each slide.
const INTERPRETER_BANNER: &str = "# Interpreter                                      #";
const EDITOR_BANNER: &str = "# Editor                                           #";

pub fn insert_slides_script(
    page: &mut PageContext,
    _element: &mut Element,
    _directive: &Directive,
) -> Result<(), HandlerError> {
    if page.add_include(SLIDESHOW_INCLUDED) {
        page.insert_script_file(SLIDES_SCRIPT);
    }
    Ok(())
}

fn is_presentation(el: &Element) -> bool {
    el.tag == "div" && el.get("class") == Some("presentation")
}

fn has_presentation(el: &Element) -> bool {
    is_presentation(el) || el.children.iter().any(has_presentation)
}

fn find_presentation(el: &mut Element) -> Option<&mut Element> {
    if is_presentation(el) {
        return Some(el);
    }
    el.children.iter_mut().find_map(find_presentation)
}

fn slide(
    engine: &Engine,
    page: &mut PageContext,
    id: &str,
    keyword: &str,
    banner: &str,
) -> Result<Element, HandlerError> {
    let session = page.fresh_session_id();
    let directive = Directive::parse(keyword)
        .ok_or_else(|| HandlerError::failed(format!("bad slide keyword {keyword:?}")))?;
    let mut pre = Element::new("pre")
        .with_attr("title", keyword)
        .with_text(banner);
    match keyword {
        "interpreter" => insert_interpreter(engine, page, &mut pre, &session, &directive)?,
        _ => insert_editor(engine, page, &mut pre, &session, &directive)?,
    }
    Ok(Element::new("div")
        .with_attr("class", "slide")
        .with_attr("style", "height: 70%; overflow: auto;")
        .with_attr("id", id)
        .with_child(pre))
}

/// Appends the interpreter and editor slides to the first presentation `<div>`.
pub fn insert_interactive_slides(engine: &Engine, page: &mut Page) -> Result<(), HandlerError> {
    if !page.context().has_include(SLIDESHOW_INCLUDED) {
        return Ok(());
    }
    if !has_presentation(page.document().root()) {
        log::debug!(target: "widgets.slideshow", "{}: no presentation div", page.url());
        return Ok(());
    }
    let interpreter = slide(
        engine,
        page.context_mut(),
        "livedoc_interpreter",
        "interpreter",
        INTERPRETER_BANNER,
    )?;
    let editor = slide(engine, page.context_mut(), "livedoc_editor", "editor", EDITOR_BANNER)?;
    if let Some(div) = find_presentation(page.document_mut().root_mut()) {
        div.children.push(interpreter);
        div.children.push(editor);
    }
    Ok(())
}
