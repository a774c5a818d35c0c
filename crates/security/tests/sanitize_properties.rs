use std::path::{Path, PathBuf};

use core_types::TrustTier;
use html::{Document, parse, serialize_document};
use html_test_support::{SAMPLE_PAGES, diff_lines};
use net::{Location, MemoryReader, ResourceReader};
use security::{SanitizeContext, SecurityReport, sanitize};

fn sanitize_with(
    doc: &mut Document,
    tier: TrustTier,
    reader: &dyn ResourceReader,
) -> SecurityReport {
    let ctx = SanitizeContext {
        page_url: "/tutorial/page.html",
        server_root: Path::new("/srv/root"),
        reader,
    };
    sanitize(doc, tier, &ctx)
}

fn lines(s: &str) -> Vec<String> {
    s.split('>').map(|l| format!("{l}>")).collect()
}

#[test]
fn script_and_disallowed_tags_vanish_without_gaps() {
    let mut doc = parse("<div><script>evil()</script>Hello<b>World</b></div>");
    let report = sanitize_with(&mut doc, TrustTier::Paranoid, &MemoryReader::new());
    let div = &doc.root().children[0];
    assert_eq!(div.tag, "div");
    assert!(div.children.is_empty(), "got: {div:?}");
    assert_eq!(div.text_content(), "HelloWorld");
    assert_eq!(report.tag_count("script"), 1);
    assert_eq!(report.tag_count("b"), 1);
    assert_eq!(report.removed_tags.len(), 2);
}

#[test]
fn javascript_href_is_removed_even_when_trusted() {
    let mut doc = parse("<a href=\"JAVASCRIPT:alert(1)\">x</a>");
    let report = sanitize_with(&mut doc, TrustTier::Trusted, &MemoryReader::new());
    let a = &doc.root().children[0];
    assert_eq!(a.tag, "a");
    assert_eq!(a.text, "x");
    assert!(!a.has("href"));
    assert_eq!(
        report.removed_attributes,
        vec![(
            "a".to_string(),
            "href".to_string(),
            "JAVASCRIPT:alert(1)".to_string()
        )]
    );
}

#[test]
fn javascript_href_is_removed_at_every_tier() {
    for tier in TrustTier::ALL {
        let mut doc = parse("<p><a href=\" java%09script:x()\">go</a></p>");
        sanitize_with(&mut doc, tier, &MemoryReader::new());
        let a = &doc.root().children[0].children[0];
        assert!(!a.has("href"), "href survived at {tier}");
    }
}

#[test]
fn dangerous_style_attribute_removed_below_trusted_only() {
    let input = "<p style=\"background: URL (x.png)\">t</p>";
    let mut doc = parse(input);
    let report = sanitize_with(&mut doc, TrustTier::Normal, &MemoryReader::new());
    assert!(!doc.root().children[0].has("style"));
    assert_eq!(report.removed_styles.len(), 1);
    assert_eq!(report.removed_styles[0].2, "background: URL (x.png)");

    let mut doc = parse(input);
    sanitize_with(&mut doc, TrustTier::Trusted, &MemoryReader::new());
    assert!(doc.root().children[0].has("style"));
}

#[test]
fn sanitize_is_idempotent() {
    let reader = MemoryReader::new();
    for tier in TrustTier::ALL {
        for page in SAMPLE_PAGES {
            let mut doc = parse(page);
            sanitize_with(&mut doc, tier, &reader);
            let once = serialize_document(&doc);
            let report = sanitize_with(&mut doc, tier, &reader);
            let twice = serialize_document(&doc);
            assert!(
                report.is_clean(),
                "second pass removed {report:?} at {tier} for {page}"
            );
            assert!(
                once == twice,
                "{}",
                diff_lines(&lines(&once), &lines(&twice))
            );
        }
    }
}

#[test]
fn surviving_text_is_a_subsequence_in_order() {
    let reader = MemoryReader::new();
    for page in SAMPLE_PAGES {
        let original = parse(page).text_content();
        let mut doc = parse(page);
        sanitize_with(&mut doc, TrustTier::Paranoid, &reader);
        let mut rest = original.chars();
        for c in doc.text_content().chars() {
            assert!(
                rest.any(|o| o == c),
                "{c:?} out of order for {page}"
            );
        }
    }
}

#[test]
fn higher_tiers_never_remove_more_tags() {
    let reader = MemoryReader::new();
    for page in SAMPLE_PAGES {
        let counts: Vec<usize> = TrustTier::ALL
            .iter()
            .map(|tier| {
                let mut doc = parse(page);
                let report = sanitize_with(&mut doc, *tier, &reader);
                report.removed_tags.iter().map(|(_, n)| n).sum()
            })
            .collect();
        assert!(
            counts.windows(2).all(|w| w[0] >= w[1]),
            "{counts:?} for {page}"
        );
    }
}

#[test]
fn link_is_removed_when_stylesheet_cannot_be_read() {
    let mut doc = parse(
        "<html><head><link rel=\"stylesheet\" type=\"text/css\" href=\"/missing.css\">x</head></html>",
    );
    let report = sanitize_with(&mut doc, TrustTier::Normal, &MemoryReader::new());
    let head = doc.head().expect("head");
    assert!(head.children.is_empty());
    assert_eq!(head.text, "x");
    assert_eq!(report.removed_styles.len(), 1);
    assert!(report.removed_styles[0].2.starts_with("cannot read"));
}

#[test]
fn link_to_clean_stylesheet_survives() {
    let reader = MemoryReader::new().with(
        &Location::File(PathBuf::from("/srv/root/tutorial/site.css")),
        "p { color: red }\n",
    );
    let mut doc = parse(
        "<html><head><link rel=\"stylesheet\" type=\"text/css\" href=\"site.css\"></head></html>",
    );
    let report = sanitize_with(&mut doc, TrustTier::Normal, &reader);
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(doc.head().expect("head").children[0].tag, "link");
}

#[test]
fn link_reasons_are_recorded() {
    let reader = MemoryReader::new().with(
        &Location::File(PathBuf::from("/srv/root/bad.css")),
        "p {\n  background : url(evil.png)\n}\n",
    );
    let cases = [
        ("<link rel=\"stylesheet\" href=\"/a.css\">", "type not found"),
        ("<link type=\"text/plain\" rel=\"stylesheet\" href=\"/a.css\">", "type != \"text/css\""),
        ("<link type=\"text/css\" href=\"/a.css\">", "rel not found"),
        ("<link type=\"text/css\" rel=\"icon\" href=\"/a.css\">", "rel != \"stylesheet\""),
        ("<link type=\"text/css\" rel=\"stylesheet\">", "href not found"),
        (
            "<link type=\"text/css\" rel=\"stylesheet\" href=\"/bad.css\">",
            "background:url(evil.png)",
        ),
    ];
    for (link, reason) in cases {
        let mut doc = parse(&format!("<html><head>{link}</head></html>"));
        let report = sanitize_with(&mut doc, TrustTier::Normal, &reader);
        assert_eq!(
            report.removed_styles,
            vec![("link".to_string(), String::new(), reason.to_string())],
            "for {link}"
        );
    }
}

#[test]
fn trusted_pages_keep_links_without_reading_them() {
    let mut doc = parse("<html><head><link rel=\"icon\" href=\"/favicon.ico\"></head></html>");
    let report = sanitize_with(&mut doc, TrustTier::Trusted, &MemoryReader::new());
    assert!(report.is_clean());
}

#[test]
fn style_close_tag_variants_cannot_smuggle_markup() {
    for input in [
        "<html><head><style>p{}</style/><script>alert(1)</script></style></head><body>t</body></html>",
        "<html><head><style>p{}</style x><script>alert(1)</script></style></head><body>t</body></html>",
    ] {
        for tier in [TrustTier::Paranoid, TrustTier::Severe, TrustTier::Normal] {
            let mut doc = parse(input);
            let report = sanitize_with(&mut doc, tier, &MemoryReader::new());
            let html = serialize_document(&doc);
            assert!(!html.contains("<script"), "{tier}: {html}");
            assert!(report.tag_count("script") >= 1, "{tier}: {report:?}");
        }
    }
}

#[test]
fn style_text_holding_an_end_tag_is_purged_below_trusted() {
    let mut style = html::Element::new("style").with_text("p{}</style><script>x()</script>");
    style.tail = "after".to_string();
    let head = html::Element::new("head").with_child(style);
    let root = html::Element::new("html").with_child(head);

    let mut doc = Document::from_root(root.clone());
    let report = sanitize_with(&mut doc, TrustTier::Normal, &MemoryReader::new());
    let head = doc.head().expect("head");
    assert!(head.children.is_empty(), "got: {head:?}");
    assert_eq!(head.text, "after");
    assert_eq!(report.removed_styles.len(), 1);

    let mut doc = Document::from_root(root);
    sanitize_with(&mut doc, TrustTier::Trusted, &MemoryReader::new());
    assert_eq!(doc.head().expect("head").children.len(), 1);
}
