use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bus::{ChannelEvent, ChannelHub, Stream};
use core_types::{PageId, SessionId, SessionState, SharingScope};
use interp::{Engine, EngineConfig, ExecutionSession, Mode, Outcome};

fn engine(config: EngineConfig) -> (Engine, Arc<ChannelHub>) {
    let hub = ChannelHub::new();
    (Engine::new(Arc::clone(&hub), config), hub)
}

fn submit(session: &Arc<ExecutionSession>, code: &str) -> Outcome {
    session
        .submit(code)
        .expect("spawn")
        .join()
        .expect("worker panicked")
}

/// Concatenated output per stream for one session, from everything queued on its page.
fn drain(hub: &ChannelHub, session: &ExecutionSession) -> (String, String) {
    let mut stdout = String::new();
    let mut stderr = String::new();
    for event in hub.poll(&session.id().page(), Duration::from_millis(50)) {
        if let ChannelEvent::Output {
            session: id,
            stream,
            text,
        } = event
        {
            if id != *session.id() {
                continue;
            }
            match stream {
                Stream::Stdout => stdout.push_str(&text),
                Stream::Stderr => stderr.push_str(&text),
                Stream::Stdin => {}
            }
        }
    }
    (stdout, stderr)
}

#[test]
fn division_by_zero_is_reported_on_stderr() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    hub.register_page(&page);
    let session = engine.create_session(SessionId::fresh(&page), Mode::Editor, false);

    let outcome = submit(&session, "1/0\n\n");
    assert_eq!(outcome, Outcome::Finished(SessionState::RuntimeFailed));
    let (stdout, stderr) = drain(&hub, &session);
    assert_eq!(stdout, "");
    assert!(stderr.contains("ZeroDivisionError: division by zero"), "got: {stderr}");
    assert!(stderr.starts_with("Error on line 1:"), "got: {stderr}");
}

#[test]
fn raw_errors_use_traceback_form() {
    let (engine, hub) = engine(EngineConfig {
        friendly: false,
        ..EngineConfig::default()
    });
    let page = PageId::fresh();
    let session = engine.create_session(SessionId::fresh(&page), Mode::Editor, false);
    submit(&session, "x = 1\nprint(x / 0)");
    let (_, stderr) = drain(&hub, &session);
    assert!(stderr.starts_with("Traceback (most recent call last):\n"), "got: {stderr}");
    assert!(stderr.contains("line 2, in <module>"), "got: {stderr}");
}

#[test]
fn finished_event_follows_output() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    let session = engine.create_session(SessionId::fresh(&page), Mode::Editor, false);
    submit(&session, "print('a')\nprint('b')");
    let events = hub.poll(&page, Duration::from_millis(50));
    assert_eq!(
        events.last(),
        Some(&ChannelEvent::Finished {
            session: session.id().clone(),
            state: SessionState::Completed,
        })
    );
    assert_eq!(session.state(), SessionState::Completed);
}

#[test]
fn compile_errors_do_not_run_anything() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    let session = engine.create_session(SessionId::fresh(&page), Mode::Editor, false);
    let outcome = submit(&session, "print('never')\nx = (1 +");
    assert_eq!(outcome, Outcome::Finished(SessionState::CompileFailed));
    let (stdout, stderr) = drain(&hub, &session);
    assert_eq!(stdout, "");
    assert!(stderr.contains("SyntaxError"), "got: {stderr}");
}

#[test]
fn restart_clears_isolated_bindings() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    let session = engine.create_session(SessionId::fresh(&page), Mode::Editor, false);

    submit(&session, "a = 1");
    submit(&session, "restart()");
    let outcome = submit(&session, "print(a)");
    assert_eq!(outcome, Outcome::Finished(SessionState::RuntimeFailed));
    let (_, stderr) = drain(&hub, &session);
    assert!(stderr.contains("NameError: name 'a' is not defined"), "got: {stderr}");

    assert_eq!(
        submit(&session, "print(tutor.session)"),
        Outcome::Finished(SessionState::Completed)
    );
    let (stdout, _) = drain(&hub, &session);
    assert_eq!(stdout, format!("{}\n", session.id()));
}

#[test]
fn shared_sessions_see_each_other_within_a_page_only() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    let other_page = PageId::fresh();
    let first = engine.create_session(SessionId::fresh(&page), Mode::Editor, true);
    let second = engine.create_session(SessionId::fresh(&page), Mode::Editor, true);
    let elsewhere = engine.create_session(SessionId::fresh(&other_page), Mode::Editor, true);

    submit(&first, "shared_value = 41");
    assert_eq!(
        submit(&second, "print(shared_value + 1)"),
        Outcome::Finished(SessionState::Completed)
    );
    assert_eq!(drain(&hub, &second).0, "42\n");
    assert_eq!(
        submit(&elsewhere, "print(shared_value)"),
        Outcome::Finished(SessionState::RuntimeFailed)
    );
    assert_eq!(
        submit(&first, "restart()"),
        Outcome::Finished(SessionState::RuntimeFailed),
        "shared namespaces have no restart"
    );
}

#[test]
fn process_scope_shares_across_pages() {
    let (engine, _hub) = engine(EngineConfig {
        sharing_scope: SharingScope::Process,
        ..EngineConfig::default()
    });
    let a = engine.create_session(SessionId::fresh(&PageId::fresh()), Mode::Editor, true);
    let b = engine.create_session(SessionId::fresh(&PageId::fresh()), Mode::Editor, true);
    assert!(a.namespace().same_as(b.namespace()));
}

#[test]
fn console_buffers_incomplete_input() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    let session = engine.create_session(SessionId::fresh(&page), Mode::Console, false);

    assert_eq!(submit(&session, "for i in range(3):"), Outcome::NeedMore);
    assert_eq!(submit(&session, "    print(i)"), Outcome::NeedMore);
    assert!(hub.poll(&page, Duration::from_millis(10)).is_empty());
    assert_eq!(
        submit(&session, ""),
        Outcome::Finished(SessionState::Completed)
    );
    assert_eq!(drain(&hub, &session).0, "0\n1\n2\n");

    submit(&session, "x = 6 * 7");
    submit(&session, "x");
    assert_eq!(drain(&hub, &session).0, "42\n");
}

#[test]
fn second_binding_of_a_running_session_is_rejected() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    let session = engine.create_session(SessionId::fresh(&page), Mode::Editor, false);

    let running = session.submit("name = input()\nprint('hi ' + name)").expect("spawn");
    for _ in 0..400 {
        if session.state() == SessionState::Running {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.run("print('again')"), Outcome::ChannelBusy);
    hub.push_input(session.id(), "Ada");
    assert_eq!(
        running.join().expect("worker"),
        Outcome::Finished(SessionState::Completed)
    );
    assert!(drain(&hub, &session).0.contains("hi Ada\n"));
}

#[test]
fn doctest_reports_only_the_summary() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    let tests = ">>> double(4)\n8\n>>> double('a')\n'aa'\n";
    let session = engine.create_session(SessionId::fresh(&page), Mode::Doctest(tests.to_string()), false);

    let outcome = submit(&session, "def double(x):\n    print('working')\n    return x * 2\n");
    assert_eq!(outcome, Outcome::Finished(SessionState::Completed));
    let (stdout, stderr) = drain(&hub, &session);
    assert_eq!(stdout, "");
    assert!(stderr.starts_with("Failed example:\n    double(4)\n"), "got: {stderr}");

    let session = engine.create_session(SessionId::fresh(&page), Mode::Doctest(tests.to_string()), false);
    submit(&session, "def double(x):\n    return x * 2\n");
    let (stdout, stderr) = drain(&hub, &session);
    assert_eq!(stdout, "Congratulations, your code passed all (2) tests!\n");
    assert_eq!(stderr, "");
}

#[test]
fn logged_sessions_record_escaped_input() {
    let (engine, _hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    let session = engine.create_session(SessionId::fresh(&page), Mode::Editor, false);
    engine.register_logging(session.id());
    submit(&session, "print(1 < 2)\n\n\n");
    assert_eq!(
        engine.log_entries(session.id()),
        vec!["<span class='stdin'>print(1 &lt; 2)\n</span>".to_string()]
    );

    let unlogged = engine.create_session(SessionId::fresh(&page), Mode::Editor, false);
    submit(&unlogged, "print(3)");
    assert!(engine.log_entries(unlogged.id()).is_empty());
}

#[test]
fn unknown_session_cannot_be_submitted() {
    let (engine, _hub) = engine(EngineConfig::default());
    let err = engine
        .submit(&"nope:1".into(), "print(1)")
        .err()
        .expect("error");
    assert!(matches!(err, interp::SubmitError::UnknownSession(_)));
}

#[test]
fn runaway_list_nesting_fails_the_session_not_the_process() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    hub.register_page(&page);

    let cyclic = engine.create_session(SessionId::fresh(&page), Mode::Editor, true);
    let outcome = submit(
        &cyclic,
        "a = [1]\na.append(a)\nb = [1]\nb.append(b)\nprint(a == b)",
    );
    assert_eq!(outcome, Outcome::Finished(SessionState::RuntimeFailed));
    let (_, stderr) = drain(&hub, &cyclic);
    assert!(stderr.contains("RecursionError"), "got: {stderr}");

    let deep = engine.create_session(SessionId::fresh(&page), Mode::Editor, true);
    let outcome = submit(
        &deep,
        "a = []\ni = 0\nwhile i < 300000:\n    a = [a]\n    i += 1\na = 0\nprint('done')",
    );
    assert_eq!(outcome, Outcome::Finished(SessionState::Completed));
    assert_eq!(drain(&hub, &deep).0, "done\n");
}

#[test]
fn releasing_a_page_drops_its_sessions_and_shared_namespace() {
    let (engine, hub) = engine(EngineConfig::default());
    let page = PageId::fresh();
    hub.register_page(&page);
    let first = engine.create_session(SessionId::fresh(&page), Mode::Editor, true);
    submit(&first, "x = 41");
    assert_eq!(engine.session_count(), 1);

    engine.release_page(&page);
    assert_eq!(engine.session_count(), 0);
    assert!(engine.session(first.id()).is_none());

    let second = engine.create_session(SessionId::fresh(&page), Mode::Editor, true);
    assert_eq!(
        submit(&second, "print(x)"),
        Outcome::Finished(SessionState::RuntimeFailed)
    );
}
