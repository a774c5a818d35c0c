use std::path::Path;

use core_types::TrustTier;
use html::{Document, Element};
use net::ResourceReader;
use percent_encoding::percent_decode_str;

use crate::report::{ReportBuilder, SecurityReport};
use crate::stylesheet::{check_link, is_dangerous};
use crate::tables::AllowedSet;

/// Page-level inputs the sanitizer needs to judge `<link>` stylesheets.
pub struct SanitizeContext<'a> {
    pub page_url: &'a str,
    pub server_root: &'a Path,
    pub reader: &'a dyn ResourceReader,
}

/// Element state between the marking passes and cleanup.
#[derive(Debug)]
enum Marked {
    Live {
        el: Element,
        children: Vec<Marked>,
    },
    Removed {
        text: String,
        tail: String,
        children: Vec<Marked>,
    },
}

/// Tags whose content is discarded along with them; other removed tags keep theirs.
fn drops_content(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Whitelist-sanitizes `doc` in place for `tier`.
///
/// Surviving text keeps its document order: removed elements are spliced out, their
/// text and children taking their place, except for `script`/`style` (and purged
/// `<link>`/`<style>`) whose content goes with them. The root element is kept.
pub fn sanitize(doc: &mut Document, tier: TrustTier, ctx: &SanitizeContext<'_>) -> SecurityReport {
    let allowed = AllowedSet::for_tier(tier);
    let mut report = ReportBuilder::default();
    let root = doc.root_mut();

    let mut marked: Vec<Marked> = std::mem::take(&mut root.children)
        .into_iter()
        .map(|child| mark(child, allowed, &mut report))
        .collect();

    filter_attributes(root, allowed, tier, &mut report);
    for m in &mut marked {
        inspect(m, allowed, tier, ctx, &mut report);
    }

    root.children = resolve(&mut root.text, marked);

    let report = report.finish(tier);
    log::debug!(
        target: "security.sanitize",
        "{} at {tier}: removed {} ({} tags, {} attributes, {} styles)",
        ctx.page_url,
        report.removed_count,
        report.removed_tags.len(),
        report.removed_attributes.len(),
        report.removed_styles.len()
    );
    report
}

fn mark(mut el: Element, allowed: &AllowedSet, report: &mut ReportBuilder) -> Marked {
    if !allowed.allows_tag(&el.tag) {
        report.tag(&el.tag);
        if drops_content(&el.tag) {
            return Marked::Removed {
                text: String::new(),
                tail: el.tail,
                children: Vec::new(),
            };
        }
        let children = el
            .children
            .into_iter()
            .map(|c| mark(c, allowed, report))
            .collect();
        return Marked::Removed {
            text: el.text,
            tail: el.tail,
            children,
        };
    }
    let children = std::mem::take(&mut el.children)
        .into_iter()
        .map(|c| mark(c, allowed, report))
        .collect();
    Marked::Live { el, children }
}

fn inspect(
    marked: &mut Marked,
    allowed: &AllowedSet,
    tier: TrustTier,
    ctx: &SanitizeContext<'_>,
    report: &mut ReportBuilder,
) {
    let (el, children) = match marked {
        Marked::Removed { children, .. } => {
            for c in children {
                inspect(c, allowed, tier, ctx, report);
            }
            return;
        }
        Marked::Live { el, children } => (el, children),
    };

    if tier != TrustTier::Trusted && el.tag == "link" {
        if let Some(reason) = check_link(el, ctx.page_url, ctx.server_root, ctx.reader) {
            report.style("link", "", &reason);
            purge(marked);
            return;
        }
    }

    filter_attributes(el, allowed, tier, report);

    // A `</` inside style text can close the element in a browser.
    if tier != TrustTier::Trusted
        && el.tag == "style"
        && (is_dangerous(&el.text) || el.text.contains("</"))
    {
        report.style("style", "", &el.text);
        purge(marked);
        return;
    }

    for c in children {
        inspect(c, allowed, tier, ctx, report);
    }
}

/// Turns a live element into a removed one that keeps only its tail.
fn purge(marked: &mut Marked) {
    let tail = match marked {
        Marked::Live { el, .. } => std::mem::take(&mut el.tail),
        Marked::Removed { tail, .. } => std::mem::take(tail),
    };
    *marked = Marked::Removed {
        text: String::new(),
        tail,
        children: Vec::new(),
    };
}

fn filter_attributes(
    el: &mut Element,
    allowed: &AllowedSet,
    tier: TrustTier,
    report: &mut ReportBuilder,
) {
    let tag = el.tag.clone();
    el.attributes.retain(|(name, value)| {
        if !allowed.allows_attr(&tag, name) {
            report.attribute(&tag, name, "");
            return false;
        }
        if name == "href" && is_javascript_href(value) {
            report.attribute(&tag, name, value);
            return false;
        }
        if name == "style" && tier != TrustTier::Trusted && is_dangerous(value) {
            report.style(&tag, name, value);
            return false;
        }
        true
    });
}

/// Percent-decodes (`+` as space), strips CR/LF/TAB, trims and lowercases before testing.
pub fn is_javascript_href(href: &str) -> bool {
    let decoded: String = percent_decode_plus(href)
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .collect();
    decoded
        .trim()
        .to_ascii_lowercase()
        .starts_with("javascript:")
}

fn percent_decode_plus(s: &str) -> String {
    percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

/// Splices removed elements out of `marked`: a removed element's text lands on the
/// previous surviving sibling's tail (or `parent_text`), its children take its place,
/// and its tail follows them.
fn resolve(parent_text: &mut String, marked: Vec<Marked>) -> Vec<Element> {
    fn push_text(parent_text: &mut String, out: &mut [Element], s: &str) {
        match out.last_mut() {
            Some(last) => last.tail.push_str(s),
            None => parent_text.push_str(s),
        }
    }

    let mut out: Vec<Element> = Vec::with_capacity(marked.len());
    for m in marked {
        match m {
            Marked::Live { mut el, children } => {
                el.children = resolve(&mut el.text, children);
                out.push(el);
            }
            Marked::Removed {
                mut text,
                tail,
                children,
            } => {
                let spliced = resolve(&mut text, children);
                push_text(parent_text, &mut out, &text);
                out.extend(spliced);
                push_text(parent_text, &mut out, &tail);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use net::MemoryReader;

    fn run(input: &str, tier: TrustTier) -> (Document, SecurityReport) {
        let reader = MemoryReader::new();
        let ctx = SanitizeContext {
            page_url: "/test.html",
            server_root: Path::new("/srv"),
            reader: &reader,
        };
        let mut doc = html::parse(input);
        let report = sanitize(&mut doc, tier, &ctx);
        (doc, report)
    }

    #[test]
    fn href_decoding_catches_obfuscated_javascript() {
        assert!(is_javascript_href("JAVASCRIPT:alert(1)"));
        assert!(is_javascript_href("  java%0Ascript:x"));
        assert!(is_javascript_href("%6A%61vascript:x"));
        assert!(is_javascript_href("\tjava\rscript:x"));
        assert!(!is_javascript_href("http://python.org/?q=javascript:"));
        assert!(!is_javascript_href("100%"));
        assert!(is_javascript_href("++javascript:x"));
        assert!(!is_javascript_href("%FFjavascript:x"));
    }

    #[test]
    fn removed_elements_splice_children_in_place() {
        let (doc, report) = run(
            "<div>a<form>b<p>c</p>d</form>e</div>",
            TrustTier::Normal,
        );
        let div = &doc.root().children[0];
        assert_eq!(div.text, "ab");
        assert_eq!(div.children.len(), 1);
        assert_eq!(div.children[0].tag, "p");
        assert_eq!(div.children[0].tail, "de");
        assert_eq!(report.tag_count("form"), 1);
    }

    #[test]
    fn nested_removed_elements_keep_text_order() {
        let (doc, _) = run(
            "<p>1<form>2<button>3</button>4<i>5</i>6</form>7</p>",
            TrustTier::Normal,
        );
        assert_eq!(doc.text_content(), "1234567");
    }

    #[test]
    fn dangerous_style_element_is_purged_below_trusted() {
        let input = "<html><head><style>body { background: url(x) }</style></head><body>t</body></html>";
        let (doc, report) = run(input, TrustTier::Normal);
        assert!(doc.head().is_some_and(|h| h.children.is_empty()));
        assert_eq!(report.removed_styles.len(), 1);
        let (doc, report) = run(input, TrustTier::Trusted);
        assert!(doc.head().is_some_and(|h| h.children.len() == 1));
        assert!(report.is_clean());
    }

    #[test]
    fn event_handler_attributes_are_removed() {
        let (doc, report) = run("<p onclick=\"x()\" class=\"c\">t</p>", TrustTier::Trusted);
        let p = &doc.root().children[0];
        assert_eq!(p.attributes, vec![("class".to_string(), "c".to_string())]);
        assert_eq!(
            report.removed_attributes,
            vec![("p".to_string(), "onclick".to_string(), String::new())]
        );
    }
}
