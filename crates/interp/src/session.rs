use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use bus::{CaptureIo, ChannelIo, Stdio};
use bus::{ChannelHub, Stream};
use core_types::{SessionId, SessionState};

use crate::doctest::{parse_examples, run_examples};
use crate::error::{CompileError, render_compile_error, render_runtime_error};
use crate::eval::Interpreter;
use crate::namespace::Namespace;
use crate::parser::{parse, parse_console};

/// Worker stack size; evaluation recurses once per nested call and expression level.
const WORKER_STACK: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Line at a time, with a push buffer for incomplete input.
    Console,
    /// Whole program per submit.
    Editor,
    /// Program followed by the given `>>>` examples; only the summary is shown.
    Doctest(String),
}

/// Key into the engine's pool of shared namespaces.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SharingGroup(String);

impl SharingGroup {
    pub fn new(name: impl Into<String>) -> Self {
        SharingGroup(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SharingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sharing {
    Isolated,
    Shared(SharingGroup),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Console input was incomplete and is buffered.
    NeedMore,
    /// Another submit already holds the session's channel.
    ChannelBusy,
    Finished(SessionState),
}

/// Learner input recorded per session, as HTML fragments.
#[derive(Clone, Debug, Default)]
pub struct SessionLog(Arc<Mutex<HashMap<SessionId, Vec<String>>>>);

impl SessionLog {
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Vec<String>>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, session: &SessionId) {
        self.lock().entry(session.clone()).or_default();
    }

    pub fn is_registered(&self, session: &SessionId) -> bool {
        self.lock().contains_key(session)
    }

    /// Appends `code` for a registered session; unregistered sessions are not logged.
    pub fn record_input(&self, session: &SessionId, code: &str) {
        let mut map = self.lock();
        let Some(entries) = map.get_mut(session) else {
            return;
        };
        let mut text = html::escape_text(code);
        if !text.ends_with('\n') {
            text.push('\n');
        }
        entries.push(format!("<span class='stdin'>{text}</span>"));
    }

    pub fn entries(&self, session: &SessionId) -> Vec<String> {
        self.lock().get(session).cloned().unwrap_or_default()
    }
}

pub struct ExecutionSession {
    id: SessionId,
    namespace: Namespace,
    sharing: Sharing,
    mode: Mode,
    friendly: bool,
    hub: Arc<ChannelHub>,
    log: SessionLog,
    state: Mutex<SessionState>,
    console_buffer: Mutex<String>,
}

impl fmt::Debug for ExecutionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionSession")
            .field("id", &self.id)
            .field("sharing", &self.sharing)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish()
    }
}

/// Drops trailing lines that hold only whitespace.
pub fn trim_trailing_blank_lines(source: &str) -> String {
    let mut lines: Vec<&str> = source.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

impl ExecutionSession {
    pub(crate) fn new(
        id: SessionId,
        namespace: Namespace,
        sharing: Sharing,
        mode: Mode,
        friendly: bool,
        hub: Arc<ChannelHub>,
        log: SessionLog,
    ) -> Self {
        ExecutionSession {
            id,
            namespace,
            sharing,
            mode,
            friendly,
            hub,
            log,
            state: Mutex::new(SessionState::Created),
            console_buffer: Mutex::new(String::new()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn sharing(&self) -> &Sharing {
        &self.sharing
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Runs `source` on a fresh worker thread bound to this session's channel.
    pub fn submit(self: &Arc<Self>, source: &str) -> io::Result<JoinHandle<Outcome>> {
        let session = Arc::clone(self);
        let source = source.to_string();
        thread::Builder::new()
            .name(format!("session-{}", self.id))
            .stack_size(WORKER_STACK)
            .spawn(move || session.run(&source))
    }

    /// Same as [`submit`](Self::submit) on the calling thread.
    pub fn run(&self, source: &str) -> Outcome {
        let mut io = match ChannelIo::bind(&self.hub, &self.id) {
            Ok(io) => io,
            Err(err) => {
                log::warn!(target: "interp.session", "{}: {err}", self.id);
                return Outcome::ChannelBusy;
            }
        };
        let Some(code) = self.take_code(source) else {
            log::trace!(target: "interp.session", "{}: waiting for more input", self.id);
            return Outcome::NeedMore;
        };
        self.log.record_input(&self.id, &code);

        self.set_state(SessionState::Compiling);
        let compiled = match self.mode {
            Mode::Console => parse_console(&code),
            _ => parse(&code),
        };
        let state = match compiled {
            Err(err) => {
                self.report_compile_error(&mut io, &err, &code);
                SessionState::CompileFailed
            }
            Ok(program) => {
                self.set_state(SessionState::Running);
                match &self.mode {
                    Mode::Doctest(tests) => self.run_doctest(&mut io, &program, &code, tests),
                    mode => {
                        let result = Interpreter::new(&self.namespace, &mut io)
                            .echo_expressions(*mode == Mode::Console)
                            .run(&program);
                        match result {
                            Ok(()) => SessionState::Completed,
                            Err(err) => {
                                let text = render_runtime_error(&err, &code, self.friendly);
                                io.write(Stream::Stderr, &text);
                                SessionState::RuntimeFailed
                            }
                        }
                    }
                }
            }
        };
        log::debug!(target: "interp.session", "{}: {}", self.id, state.as_str());
        self.set_state(state);
        io.finish(state);
        Outcome::Finished(state)
    }

    /// Code to compile for this submit, or `None` while console input is incomplete.
    fn take_code(&self, source: &str) -> Option<String> {
        if self.mode != Mode::Console {
            return Some(trim_trailing_blank_lines(source));
        }
        let mut buffer = self
            .console_buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        buffer.push_str(source.trim_end_matches(['\r', '\n']));
        buffer.push('\n');
        match parse_console(&buffer) {
            Err(err) if err.incomplete => None,
            _ => Some(std::mem::take(&mut *buffer)),
        }
    }

    fn report_compile_error(&self, io: &mut dyn Stdio, err: &CompileError, code: &str) {
        io.write(Stream::Stderr, &render_compile_error(err, code, self.friendly));
    }

    fn run_doctest(
        &self,
        io: &mut ChannelIo,
        program: &crate::ast::Program,
        code: &str,
        tests: &str,
    ) -> SessionState {
        let mut capture = CaptureIo::new();
        let result = Interpreter::new(&self.namespace, &mut capture).run(program);
        if let Err(err) = result {
            io.write(Stream::Stderr, &render_runtime_error(&err, code, self.friendly));
            return SessionState::RuntimeFailed;
        }
        let report = run_examples(&parse_examples(tests), &self.namespace);
        let (message, success) = report.render(self.friendly);
        let stream = if success { Stream::Stdout } else { Stream::Stderr };
        io.write(stream, &message);
        SessionState::Completed
    }
}
