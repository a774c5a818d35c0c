use std::fs;
use std::path::Path;
use std::sync::Arc;

use bus::ChannelHub;
use core_types::TrustTier;
use markup::{AssemblerConfig, MarkupRegistryBuilder, PageAssembler};
use net::{Location, MemoryReader, Url};
use security::{SecurityPolicy, SiteAccess};
use serve::{NO_CACHE, path_to_response, remote_page};
use tempfile::TempDir;

fn assembler(root: &Path, reader: Arc<MemoryReader>) -> PageAssembler {
    let policy = SecurityPolicy::new(SiteAccess::with_defaults(TrustTier::Normal), root.to_path_buf(), reader);
    PageAssembler::new(
        MarkupRegistryBuilder::new().build(),
        Arc::new(policy),
        ChannelHub::new(),
        AssemblerConfig::default(),
    )
}

fn site() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path();
    fs::create_dir_all(root.join("docs/images")).expect("mkdir");
    fs::write(root.join("docs/intro.html"), "<p onclick=\"x()\">Intro</p>").expect("write");
    fs::write(root.join("docs/notes.txt"), "plain & simple").expect("write");
    fs::write(root.join("docs/b.css"), "p {}").expect("write");
    dir
}

#[test]
fn dotdot_paths_get_the_illegal_path_page() {
    let dir = site();
    let root = dir.path();
    let assembler = assembler(&root, Arc::new(MemoryReader::new()));
    let response = path_to_response("/docs/../../etc/passwd", &root, &assembler);
    assert_eq!(response.status, 404);
    let text = response.text();
    assert!(text.contains("Illegal Path, Page not Found"));
    assert!(text.contains("<b>/docs/../../etc/passwd</b>"));

    let missing = path_to_response("/docs/missing.html", &root, &assembler);
    assert_eq!(missing.status, 404);
    assert!(missing.text().contains("<b>/docs/missing.html</b>"));
}

#[test]
fn directories_redirect_then_list() {
    let dir = site();
    let root = dir.path();
    let assembler = assembler(&root, Arc::new(MemoryReader::new()));
    let redirect = path_to_response("/docs", &root, &assembler);
    assert_eq!(redirect.status, 301);
    assert_eq!(redirect.header("Location"), Some("/docs/"));

    let listing = path_to_response("/docs/", &root, &assembler).text();
    let expected = [
        r#"<li><a href="../">..</a></li>"#,
        r#"<li><a href="b.css">b.css</a></li>"#,
        r#"<li><a href="images/">images/</a></li>"#,
        r#"<li><a href="intro.html">intro.html</a></li>"#,
        r#"<li><a href="notes.txt">notes.txt</a></li>"#,
    ];
    let mut last = 0;
    for item in expected {
        let at = listing[last..].find(item).unwrap_or_else(|| panic!("{item} in {listing}"));
        last += at + item.len();
    }
}

#[test]
fn default_page_wins_over_the_listing() {
    let dir = site();
    let root = dir.path();
    fs::write(root.join("docs/index.html"), "<p>Welcome</p>").expect("write");
    let assembler = assembler(&root, Arc::new(MemoryReader::new()));
    let response = path_to_response("/docs/", &root, &assembler);
    assert_eq!(response.status, 200);
    let text = response.text();
    assert!(text.starts_with("<!DOCTYPE html PUBLIC"));
    assert!(text.contains("<p>Welcome</p>"));
}

#[test]
fn pages_are_assembled_and_other_files_served_verbatim() {
    let dir = site();
    let root = dir.path();
    let assembler = assembler(&root, Arc::new(MemoryReader::new()));
    let page = path_to_response("/docs/intro.html", &root, &assembler);
    assert_eq!(page.header("Content-Type"), Some(serve::HTML));
    let text = page.text();
    assert!(text.contains("<p>Intro</p>"), "{text}");
    assert!(text.contains("runOutput("));

    let notes = path_to_response("/docs/notes.txt", &root, &assembler);
    assert_eq!(notes.body, b"plain & simple");
    assert_eq!(notes.header("content-type"), Some("text/plain; charset=utf-8"));
}

#[test]
fn remote_pages_are_rendered_uncached() {
    let dir = site();
    let root = dir.path();
    let url = "http://example.com/tutorial.html";
    let reader = Arc::new(MemoryReader::new().with(
        &Location::Remote(Url::parse(url).expect("url")),
        "<h1>Remote</h1><script>alert(1)</script>",
    ));
    let assembler = assembler(&root, Arc::clone(&reader));
    let response = remote_page(url, reader.as_ref(), &assembler);
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Cache-Control"), Some(NO_CACHE));
    let text = response.text();
    assert!(text.contains("<h1>Remote</h1>"));
    assert!(!text.contains("alert(1)"));

    let missing = remote_page("http://example.com/gone.html", reader.as_ref(), &assembler);
    assert_eq!(missing.status, 502);
    let bad = remote_page("ftp://example.com/x", reader.as_ref(), &assembler);
    assert_eq!(bad.status, 400);
}
