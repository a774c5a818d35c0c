use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bus::{ChannelEvent, ChannelHub, Stream};
use core_types::{SessionState, TrustTier};
use html::Element;
use interp::{Engine, EngineConfig, Mode, Outcome};
use markup::{AssembleOptions, AssemblerConfig, MarkupRegistryBuilder, Page, PageAssembler};
use net::MemoryReader;
use security::{SecurityPolicy, SiteAccess};
use widgets::{EDITOR_INCLUDED, IO_INCLUDED, SLIDES_SCRIPT, Widgets};

struct Fixture {
    assembler: PageAssembler,
    engine: Arc<Engine>,
    hub: Arc<ChannelHub>,
}

fn fixture(default_markup: &str, tier: TrustTier) -> Fixture {
    let hub = ChannelHub::new();
    let engine = Arc::new(Engine::new(Arc::clone(&hub), EngineConfig::default()));
    let reader = Arc::new(MemoryReader::new());
    let root = PathBuf::from("/srv/livedoc");
    let mut builder = MarkupRegistryBuilder::new();
    Widgets::new(Arc::clone(&engine), reader.clone(), root.clone()).register(&mut builder);
    builder.register_default_markup(default_markup);
    let policy = SecurityPolicy::new(SiteAccess::new(tier), root, reader);
    let assembler = PageAssembler::new(
        builder.build(),
        Arc::new(policy),
        Arc::clone(&hub),
        AssemblerConfig::default(),
    );
    Fixture {
        assembler,
        engine,
        hub,
    }
}

fn assemble(f: &Fixture, source: &str) -> Page {
    f.assembler
        .assemble(source.as_bytes(), "/lesson.html", AssembleOptions::default())
        .expect("assemble")
}

fn find<'a>(el: &'a Element, pred: &dyn Fn(&Element) -> bool) -> Option<&'a Element> {
    if pred(el) {
        return Some(el);
    }
    el.children.iter().find_map(|c| find(c, pred))
}

fn drain(hub: &ChannelHub, page: &Page) -> Vec<ChannelEvent> {
    let mut events = Vec::new();
    loop {
        let batch = hub.poll(page.id(), Duration::from_millis(200));
        if batch.is_empty() {
            return events;
        }
        events.extend(batch);
    }
}

#[test]
fn editor_output_reaches_the_page_channel() {
    let f = fixture("none", TrustTier::Normal);
    let page = assemble(&f, r#"<body><pre title="editor">print(6 * 7)</pre></body>"#);
    let session = page.dispatch().dispatched[0].session.clone();

    let textarea = find(page.document().root(), &|e| e.tag == "textarea").expect("textarea");
    assert_eq!(textarea.get("id"), Some(format!("code_{session}").as_str()));
    assert!(page.context().has_include(EDITOR_INCLUDED));
    assert!(page.context().has_include(IO_INCLUDED));

    let handle = f.engine.submit(&session, &textarea.text).expect("submit");
    assert_eq!(
        handle.join().expect("worker"),
        Outcome::Finished(SessionState::Completed)
    );
    let events = drain(&f.hub, &page);
    assert_eq!(
        events,
        vec![
            ChannelEvent::Output {
                session: session.clone(),
                stream: Stream::Stdout,
                text: "42\n".to_string(),
            },
            ChannelEvent::Finished {
                session,
                state: SessionState::Completed,
            },
        ]
    );
}

#[test]
fn default_markup_turns_plain_pre_into_doctests() {
    let f = fixture("doctest", TrustTier::Normal);
    let page = assemble(
        &f,
        "<body><pre>\n&gt;&gt;&gt; 1 + 1\n2\n</pre><pre title=\"interpreter\"></pre></body>",
    );
    let keywords: Vec<&str> = page
        .dispatch()
        .dispatched
        .iter()
        .map(|d| d.keyword.as_str())
        .collect();
    assert_eq!(keywords, vec!["interpreter", "doctest"]);
    let doctest = &page.dispatch().dispatched[1].session;
    let session = f.engine.session(doctest).expect("session");
    assert_eq!(session.mode(), &Mode::Doctest(">>> 1 + 1\n2".to_string()));
}

#[test]
fn widgets_shared_on_one_page_see_each_other() {
    let f = fixture("none", TrustTier::Normal);
    let page = assemble(
        &f,
        r#"<body><pre title="editor">x = 5</pre><pre title="interpreter"></pre></body>"#,
    );
    let editor = page.dispatch().dispatched[0].session.clone();
    let console = page.dispatch().dispatched[1].session.clone();
    f.engine
        .submit(&editor, "x = 5")
        .expect("submit")
        .join()
        .expect("worker");
    let console = f.engine.session(&console).expect("console");
    assert_eq!(console.namespace().get("x"), Some(interp::Value::Int(5)));
}

#[test]
fn menu_is_prepended_unless_the_page_brings_one() {
    let f = fixture("none", TrustTier::Normal);
    let page = assemble(&f, "<body>Intro<p>text</p></body>");
    let body = page.document().body().expect("body");
    assert_eq!(body.children[0].get("class"), Some("livedoc_menu"));
    assert_eq!(body.children[0].tail, "Intro");
    let head = page.document().head().expect("head");
    assert!(head.children.iter().any(|c| c.tag == "link"));
}

#[test]
fn slideshow_pages_gain_interactive_slides() {
    let f = fixture("none", TrustTier::Trusted);
    let page = assemble(
        &f,
        r#"<html><head><meta name="generator" content="slideshow" /></head>
<body><div class="presentation"><div class="slide">one</div></div></body></html>"#,
    );
    let head = page.document().head().expect("head");
    assert!(head.children.iter().any(|c| c.get("src") == Some(SLIDES_SCRIPT)));
    let presentation =
        find(page.document().root(), &|e| e.get("class") == Some("presentation")).expect("div");
    let ids: Vec<Option<&str>> = presentation.children.iter().map(|c| c.get("id")).collect();
    assert_eq!(
        ids,
        vec![None, Some("livedoc_interpreter"), Some("livedoc_editor")]
    );
    assert_eq!(f.engine.session_count(), 2);
}

#[test]
fn sanitized_pages_never_reach_widgets_with_scripts() {
    let f = fixture("none", TrustTier::Severe);
    let page = assemble(
        &f,
        r#"<body><pre title="editor" onclick="steal()">print(1)<script>evil()</script></pre></body>"#,
    );
    let html = page.to_html();
    assert!(!html.contains("steal"), "{html}");
    assert!(!html.contains("evil"), "{html}");
    assert_eq!(page.dispatch().dispatched.len(), 1);
}
