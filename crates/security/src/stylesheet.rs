//! `<link>` stylesheet location and content scanning.
use std::path::{Component, Path, PathBuf};

use html::Element;
use net::{Location, ResourceReader, Url};

/// Substrings that disqualify a style once spaces and tabs are removed.
pub const DANGEROUS_STRINGS: &[&str] = &["url(", "&#"];

/// Lowercases and removes spaces and tabs.
pub fn squish(s: &str) -> String {
    s.chars()
        .filter(|c| *c != ' ' && *c != '\t')
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn is_dangerous(style: &str) -> bool {
    let squished = squish(style);
    DANGEROUS_STRINGS.iter().any(|d| squished.contains(d))
}

/// First line of `css` containing a dangerous substring, squished.
pub fn find_dangerous_line(css: &str) -> Option<String> {
    css.lines().map(squish).find(|line| {
        DANGEROUS_STRINGS
            .iter()
            .any(|d| line.contains(d))
    })
}

/// Where the stylesheet referenced by `href` on `page_url` lives.
///
/// Absolute page URLs join `href` against themselves; absolute `href`s are used as is;
/// root-relative `href`s and paths relative to a local page are resolved under
/// `server_root`, never above it.
pub fn resolve_stylesheet(page_url: &str, href: &str, server_root: &Path) -> Option<Location> {
    if page_url.contains("://") {
        let base = Url::parse(page_url).ok()?;
        return base.join(href).ok().map(Location::Remote);
    }
    if href.contains("://") {
        return Url::parse(href).ok().map(Location::Remote);
    }
    let relative = match href.strip_prefix('/') {
        Some(rooted) => PathBuf::from(rooted),
        None => {
            let page = Path::new(page_url.trim_start_matches('/'));
            page.parent().unwrap_or(Path::new("")).join(href)
        }
    };
    Some(Location::File(server_root.join(normalize(&relative))))
}

/// Lexical normalization that drops `..` at the top instead of escaping.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

/// Why a `<link>` must go, or `None` when it references a safe stylesheet.
pub(crate) fn check_link(
    link: &Element,
    page_url: &str,
    server_root: &Path,
    reader: &dyn ResourceReader,
) -> Option<String> {
    match link.get("type") {
        Some(t) if t.eq_ignore_ascii_case("text/css") => {}
        Some(_) => return Some("type != \"text/css\"".to_string()),
        None => return Some("type not found".to_string()),
    }
    match link.get("rel") {
        Some(r) if r.eq_ignore_ascii_case("stylesheet") => {}
        Some(_) => return Some("rel != \"stylesheet\"".to_string()),
        None => return Some("rel not found".to_string()),
    }
    let Some(href) = link.get("href") else {
        return Some("href not found".to_string());
    };
    let Some(location) = resolve_stylesheet(page_url, href, server_root) else {
        return Some(format!("cannot resolve {href}"));
    };
    match reader.read_text(&location) {
        Ok(css) => find_dangerous_line(&css),
        Err(e) => {
            log::warn!(target: "security.sanitize", "stylesheet rejected: {e}");
            Some(format!("cannot read {location}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squish_removes_spaces_and_tabs() {
        assert_eq!(squish("Background: URL (x)\t;"), "background:url(x);");
        assert!(is_dangerous("background: url( evil )"));
        assert!(is_dangerous("color: &#114;ed"));
        assert!(!is_dangerous("color: red"));
    }

    #[test]
    fn dangerous_line_is_reported_squished() {
        let css = "p { color: red }\nbody { background: URL(x.png) }\n";
        assert_eq!(
            find_dangerous_line(css).as_deref(),
            Some("body{background:url(x.png)}")
        );
        assert_eq!(find_dangerous_line("p {}"), None);
    }

    #[test]
    fn stylesheet_locations() {
        let root = Path::new("/srv/root");
        assert_eq!(
            resolve_stylesheet("http://a.org/t/page.html", "s.css", root),
            Url::parse("http://a.org/t/s.css").ok().map(Location::Remote)
        );
        assert_eq!(
            resolve_stylesheet("/t/page.html", "http://b.org/s.css", root),
            Url::parse("http://b.org/s.css").ok().map(Location::Remote)
        );
        assert_eq!(
            resolve_stylesheet("/t/page.html", "/css/s.css", root),
            Some(Location::File(PathBuf::from("/srv/root/css/s.css")))
        );
        assert_eq!(
            resolve_stylesheet("/t/page.html", "../../../etc/s.css", root),
            Some(Location::File(PathBuf::from("/srv/root/etc/s.css")))
        );
        assert_eq!(
            resolve_stylesheet("/t/page.html", "s.css", root),
            Some(Location::File(PathBuf::from("/srv/root/t/s.css")))
        );
    }
}
