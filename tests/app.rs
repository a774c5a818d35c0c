use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use html::Element;
use livedoc::{App, SessionId, SessionState, Settings, Submitted, TrustTier};
use net::MemoryReader;
use tempfile::TempDir;

/// App serving from a fresh directory; keep the `TempDir` alive for the test.
fn app(tweak: impl FnOnce(&mut Settings)) -> (App, TempDir) {
    let root = tempfile::tempdir().expect("temp dir");
    let mut settings = Settings {
        server_root: root.path().to_path_buf(),
        ..Settings::default()
    };
    tweak(&mut settings);
    (App::with_reader(settings, Arc::new(MemoryReader::new())), root)
}

fn ids_with_prefix(el: &Element, prefix: &str, out: &mut Vec<String>) {
    if let Some(id) = el.get("id").and_then(|id| id.strip_prefix(prefix)) {
        out.push(id.to_string());
    }
    for child in &el.children {
        ids_with_prefix(child, prefix, out);
    }
}

/// Session ids of the widgets on a served page, in document order.
fn sessions(body: &str, prefix: &str) -> Vec<SessionId> {
    let doc = html::parse(body);
    let mut out = Vec::new();
    ids_with_prefix(doc.root(), prefix, &mut out);
    out.iter().map(|s| SessionId::from(s.as_str())).collect()
}

fn wait_for(app: &App, session: &SessionId, state: SessionState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    let session = app.engine().session(session).expect("session");
    while session.state() != state {
        assert!(Instant::now() < deadline, "session never reached {state:?}");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn served_editor_runs_code_and_streams_output() {
    let (app, root) = app(|_| {});
    fs::write(
        root.path().join("lesson.html"),
        r#"<html><head><title>Lesson</title></head><body>
<h1>Division</h1><pre title="editor log">print(1/0)</pre></body></html>"#,
    )
    .expect("write");

    let response = app.render_path("/lesson.html");
    assert_eq!(response.status, 200);
    let body = response.text();
    let editor = sessions(&body, "code_").remove(0);

    let Submitted::Worker(handle) = app.execute(&editor, "print(1/0)").expect("execute") else {
        panic!("editor code must start a worker");
    };
    handle.join().expect("worker");

    let script = app.poll(&editor.page(), Duration::from_secs(1));
    assert!(script.contains("ZeroDivisionError"), "{script}");
    assert!(script.contains("\"stderr\""), "{script}");
    assert!(script.trim_end().ends_with("\"runtime-failed\");"), "{script}");
    assert_eq!(
        app.session_log(&editor),
        vec!["<span class='stdin'>print(1/0)\n</span>".to_string()]
    );
}

#[test]
fn console_lines_feed_a_waiting_program() {
    let (app, root) = app(|_| {});
    fs::write(root.path().join("c.html"), r#"<pre title="interpreter"></pre>"#).expect("write");
    let body = app.render_path("/c.html").text();
    let console = sessions(&body, "out_").remove(0);

    let Submitted::Worker(handle) = app
        .execute(&console, "name = input('who? ')\n")
        .expect("execute")
    else {
        panic!("first line starts a worker");
    };
    wait_for(&app, &console, SessionState::Running);
    assert!(matches!(
        app.execute(&console, "Ada\n").expect("input"),
        Submitted::Input
    ));
    handle.join().expect("worker");

    let Submitted::Worker(handle) = app.execute(&console, "name").expect("echo") else {
        panic!("finished console takes code again");
    };
    handle.join().expect("worker");
    let script = app.poll(&console.page(), Duration::from_secs(1));
    assert!(script.contains("\"who? \""), "{script}");
    assert!(script.contains("\"'Ada'\\n\""), "{script}");
}

#[test]
fn default_markup_and_site_tiers_come_from_settings() {
    let (app, root) = app(|s| {
        s.default_markup = "doctest".to_string();
        s.default_tier = TrustTier::Paranoid;
    });
    fs::write(
        root.path().join("d.html"),
        "<body><b>bold</b><pre>\n&gt;&gt;&gt; 2 ** 10\n1024\n</pre></body>",
    )
    .expect("write");
    let body = app.render_path("/d.html").text();
    assert!(!body.contains("<b>"), "{body}");
    let doctest = sessions(&body, "code_").remove(0);
    let Submitted::Worker(handle) = app.execute(&doctest, "pass").expect("execute") else {
        panic!("doctest runs on a worker");
    };
    handle.join().expect("worker");
    let script = app.poll(&doctest.page(), Duration::from_secs(1));
    assert!(script.contains("passed all (1) tests"), "{script}");
}

#[test]
fn remote_requests_need_a_url() {
    let (app, _) = app(|_| {});
    assert_eq!(app.render_remote("x=1").status, 400);
    assert_eq!(app.render_remote("url=http%3A%2F%2Fexample.com%2Fnone").status, 502);
    assert!(app.execute(&SessionId::from("0:0"), "x").is_err());
}

#[test]
fn released_pages_leave_nothing_behind() {
    let (app, root) = app(|_| {});
    fs::write(
        root.path().join("two.html"),
        r#"<pre title="editor">x = 1</pre><pre title="interpreter"></pre>"#,
    )
    .expect("write");
    let body = app.render_path("/two.html").text();
    let editor = sessions(&body, "code_").remove(0);
    let page = editor.page();
    assert_eq!(app.engine().session_count(), 2);
    assert!(app.hub().is_registered(&page));

    app.release_page(&page);
    assert_eq!(app.engine().session_count(), 0);
    assert_eq!(app.hub().page_count(), 0);
    assert!(!app.push_input(&editor, "late"));
    assert_eq!(app.poll(&page, Duration::from_secs(5)), "");
    assert!(app.execute(&editor, "print(1)").is_err());
}
