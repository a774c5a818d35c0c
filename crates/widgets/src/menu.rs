//! Site navigation menu inserted at the top of every page.
use std::path::{Path, PathBuf};

use html::Element;
use markup::{Directive, HandlerError, MENU_INCLUDED, Page, PageContext};
use net::{Location, ResourceReader};

/// Keyword of `<meta name="livedoc_menu" content="file.html">`.
pub const CUSTOM_MENU: &str = "livedoc_menu";

const DEFAULT_MENU: &str = r#"<html><head>
<link rel="stylesheet" type="text/css" href="/menu.css" />
</head><body><div class="livedoc_menu"><ul>
<li><a href="/">Home</a></li>
<li><a href="/remote.html">Load a remote tutorial</a></li>
</ul></div></body></html>"#;

/// A menu and the stylesheet link that comes with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Menu {
    pub div: Element,
    pub link: Option<Element>,
}

impl Menu {
    /// The first `<div>` and the first `<link>` of `source`, in document order.
    pub fn extract(source: &str) -> Option<Menu> {
        let doc = html::parse(source);
        let div = find_first(doc.root(), "div")?.clone();
        let link = find_first(doc.root(), "link").cloned();
        Some(Menu { div, link })
    }

    fn insert(&self, page: &mut PageContext) {
        let mut div = self.div.clone();
        div.tail.clear();
        page.prepend_to_body(div);
        if let Some(link) = &self.link {
            let mut link = link.clone();
            link.tail.clear();
            page.append_to_head(link);
        }
    }
}

impl Default for Menu {
    fn default() -> Self {
        Menu::extract(DEFAULT_MENU).unwrap_or_else(|| Menu {
            div: Element::new("div").with_attr("class", "livedoc_menu"),
            link: None,
        })
    }
}

fn find_first<'a>(el: &'a Element, tag: &str) -> Option<&'a Element> {
    if el.tag == tag {
        return Some(el);
    }
    el.children.iter().find_map(|c| find_first(c, tag))
}

/// Runs last on pages that did not bring their own menu. Framesets get none.
pub fn insert_default_menu(menu: &Menu, page: &mut Page) -> Result<(), HandlerError> {
    if page.document().body().is_none() {
        log::debug!(target: "widgets.menu", "{}: no body, skipping menu", page.url());
        return Ok(());
    }
    menu.insert(page.context_mut());
    Ok(())
}

/// Where a page-relative menu file lives on disk.
fn menu_path(page: &PageContext, file: &str, server_root: &Path) -> Result<PathBuf, HandlerError> {
    let flags = page.flags();
    if flags.remote {
        return Err(HandlerError::failed(
            "custom menus are not available on remote pages",
        ));
    }
    let dir = Path::new(page.url()).parent().unwrap_or(Path::new(""));
    if flags.local {
        return Ok(dir.join(file));
    }
    let relative = dir.strip_prefix("/").unwrap_or(dir);
    Ok(server_root.join(relative).join(file))
}

/// `<meta name="livedoc_menu" content="…">` replaces the default menu with one read
/// from a file next to the page.
pub fn insert_custom_menu(
    reader: &dyn ResourceReader,
    server_root: &Path,
    page: &mut PageContext,
    element: &mut Element,
    _directive: &Directive,
) -> Result<(), HandlerError> {
    let Some(file) = element.get("content").map(str::to_string) else {
        return Err(HandlerError::failed("menu meta without content"));
    };
    let path = menu_path(page, &file, server_root)?;
    let source = reader
        .read_text(&Location::File(path.clone()))
        .map_err(HandlerError::failed)?;
    let menu = Menu::extract(&source)
        .ok_or_else(|| HandlerError::failed(format!("no menu in {}", path.display())))?;
    menu.insert(page);
    page.add_include(MENU_INCLUDED);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PageId;
    use markup::PageFlags;
    use net::MemoryReader;

    #[test]
    fn default_menu_has_a_div_and_a_stylesheet() {
        let menu = Menu::default();
        assert_eq!(menu.div.get("class"), Some("livedoc_menu"));
        assert_eq!(menu.link.as_ref().and_then(|l| l.get("href")), Some("/menu.css"));
    }

    #[test]
    fn custom_menu_is_read_next_to_the_page() {
        let root = PathBuf::from("/srv/tutorials");
        let reader = MemoryReader::new().with(
            &Location::File(root.join("course/menu.html")),
            "<div id=\"m\"><a href=\"/\">up</a></div>",
        );
        let mut page = PageContext::new(PageId::from("1"), "/course/intro.html", PageFlags::default());
        let mut meta = Element::new("meta")
            .with_attr("name", CUSTOM_MENU)
            .with_attr("content", "menu.html");
        let directive = Directive::parse(CUSTOM_MENU).expect("directive");
        insert_custom_menu(&reader, &root, &mut page, &mut meta, &directive).expect("menu");
        assert!(page.has_include(MENU_INCLUDED));
    }

    #[test]
    fn remote_pages_cannot_load_menu_files() {
        let flags = PageFlags {
            remote: true,
            ..PageFlags::default()
        };
        let page = PageContext::new(PageId::from("1"), "http://example.com/a.html", flags);
        assert!(menu_path(&page, "m.html", Path::new("/srv")).is_err());
    }
}
