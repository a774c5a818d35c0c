//! Channel between execution workers and the browser: per-page output queues drained by
//! long-poll, and per-session input queues fed by posted lines.
mod io;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use core_types::{PageId, SessionId, SessionState};

pub use crate::io::{CaptureIo, ChannelIo, Stdio};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
    /// Echo of a line read from the browser.
    Stdin,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
            Stream::Stdin => "stdin",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    Output {
        session: SessionId,
        stream: Stream,
        text: String,
    },
    Finished {
        session: SessionId,
        state: SessionState,
    },
}

impl ChannelEvent {
    pub fn session(&self) -> &SessionId {
        match self {
            ChannelEvent::Output { session, .. } | ChannelEvent::Finished { session, .. } => {
                session
            }
        }
    }

    /// JavaScript statement the long-poll client evaluates for this event.
    pub fn to_script(&self) -> String {
        let quote = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
        match self {
            ChannelEvent::Output {
                session,
                stream,
                text,
            } => format!(
                "appendOutput({}, {}, {});",
                quote(session.as_str()),
                quote(stream.as_str()),
                quote(text)
            ),
            ChannelEvent::Finished { session, state } => format!(
                "sessionFinished({}, {});",
                quote(session.as_str()),
                quote(state.as_str())
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    WriterBound(SessionId),
    ReaderBound(SessionId),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::WriterBound(id) => write!(f, "session {id} already has an output binding"),
            ChannelError::ReaderBound(id) => write!(f, "session {id} already has an input binding"),
        }
    }
}

impl std::error::Error for ChannelError {}

struct PageQueue {
    tx: Sender<ChannelEvent>,
    rx: Mutex<Receiver<ChannelEvent>>,
}

impl PageQueue {
    fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel();
        Arc::new(PageQueue {
            tx,
            rx: Mutex::new(rx),
        })
    }
}

struct InputQueue {
    tx: Sender<String>,
    rx: Arc<Mutex<Receiver<String>>>,
}

impl InputQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        InputQueue {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

#[derive(Default)]
struct HubState {
    pages: HashMap<PageId, Arc<PageQueue>>,
    inputs: HashMap<SessionId, InputQueue>,
    writers: HashSet<SessionId>,
    readers: HashSet<SessionId>,
}

/// Shared by the render pipeline, every worker and the long-poll endpoint.
#[derive(Default)]
pub struct ChannelHub {
    state: Mutex<HubState>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChannelHub {
    pub fn new() -> Arc<Self> {
        Arc::new(ChannelHub::default())
    }

    /// Creates the output queue for a page. Registering twice keeps the existing queue.
    pub fn register_page(&self, page: &PageId) {
        let mut state = lock(&self.state);
        if !state.pages.contains_key(page) {
            log::debug!(target: "bus.hub", "page {page} registered");
            state.pages.insert(page.clone(), PageQueue::new());
        }
    }

    pub fn is_registered(&self, page: &PageId) -> bool {
        lock(&self.state).pages.contains_key(page)
    }

    fn page_queue(&self, page: &PageId) -> Arc<PageQueue> {
        let mut state = lock(&self.state);
        state
            .pages
            .entry(page.clone())
            .or_insert_with(PageQueue::new)
            .clone()
    }

    /// Binds `session`'s output to its page queue until the guard drops.
    pub fn register_writer(self: &Arc<Self>, session: &SessionId) -> Result<WriterGuard, ChannelError> {
        let queue = self.page_queue(&session.page());
        let mut state = lock(&self.state);
        if !state.writers.insert(session.clone()) {
            return Err(ChannelError::WriterBound(session.clone()));
        }
        log::trace!(target: "bus.hub", "writer bound for {session}");
        Ok(WriterGuard {
            hub: Arc::clone(self),
            session: session.clone(),
            tx: queue.tx.clone(),
        })
    }

    /// Binds `session`'s input queue until the guard drops. Lines posted before the
    /// binding are kept.
    pub fn register_reader(self: &Arc<Self>, session: &SessionId) -> Result<ReaderGuard, ChannelError> {
        let mut state = lock(&self.state);
        if !state.readers.insert(session.clone()) {
            return Err(ChannelError::ReaderBound(session.clone()));
        }
        let rx = state
            .inputs
            .entry(session.clone())
            .or_insert_with(InputQueue::new)
            .rx
            .clone();
        Ok(ReaderGuard {
            hub: Arc::clone(self),
            session: session.clone(),
            rx,
        })
    }

    /// Delivers one line of browser input to `session`. Lines for sessions of
    /// unregistered pages without a bound reader are dropped; returns whether the line
    /// was queued.
    pub fn push_input(&self, session: &SessionId, line: &str) -> bool {
        let mut state = lock(&self.state);
        if !state.inputs.contains_key(session) && !state.pages.contains_key(&session.page()) {
            log::debug!(target: "bus.hub", "input for unknown session {session} dropped");
            return false;
        }
        let queue = state
            .inputs
            .entry(session.clone())
            .or_insert_with(InputQueue::new);
        // The hub owns the receiver, so the send cannot fail.
        let _ = queue.tx.send(line.to_string());
        true
    }

    /// Waits up to `timeout` for output on `page`, then drains whatever is queued.
    /// Unregistered pages yield nothing at once.
    pub fn poll(&self, page: &PageId, timeout: Duration) -> Vec<ChannelEvent> {
        let Some(queue) = lock(&self.state).pages.get(page).cloned() else {
            log::debug!(target: "bus.hub", "poll for unknown page {page}");
            return Vec::new();
        };
        let rx = lock(&queue.rx);
        let mut out = Vec::new();
        match rx.recv_timeout(timeout) {
            Ok(ev) => out.push(ev),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return out,
        }
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    /// Drops the page's queues and any input queued for its sessions.
    pub fn unregister_page(&self, page: &PageId) {
        let mut state = lock(&self.state);
        if state.pages.remove(page).is_some() {
            log::debug!(target: "bus.hub", "page {page} released");
        }
        state.inputs.retain(|id, _| id.page() != *page);
    }

    pub fn page_count(&self) -> usize {
        lock(&self.state).pages.len()
    }
}

pub struct WriterGuard {
    hub: Arc<ChannelHub>,
    session: SessionId,
    tx: Sender<ChannelEvent>,
}

impl WriterGuard {
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn write(&self, stream: Stream, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.tx.send(ChannelEvent::Output {
            session: self.session.clone(),
            stream,
            text: text.to_string(),
        });
    }

    pub fn finish(&self, state: SessionState) {
        let _ = self.tx.send(ChannelEvent::Finished {
            session: self.session.clone(),
            state,
        });
    }
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        lock(&self.hub.state).writers.remove(&self.session);
        log::trace!(target: "bus.hub", "writer released for {}", self.session);
    }
}

pub struct ReaderGuard {
    hub: Arc<ChannelHub>,
    session: SessionId,
    rx: Arc<Mutex<Receiver<String>>>,
}

impl ReaderGuard {
    /// Blocks until a line is posted for this session.
    pub fn read_line(&self) -> Option<String> {
        lock(&self.rx).recv().ok()
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.hub.state);
        state.readers.remove(&self.session);
        if !state.pages.contains_key(&self.session.page()) {
            state.inputs.remove(&self.session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_routed_to_the_session_page() {
        let hub = ChannelHub::new();
        let page = PageId::from("7");
        hub.register_page(&page);
        let session = SessionId::fresh(&page);
        {
            let writer = hub.register_writer(&session).expect("bind");
            writer.write(Stream::Stdout, "hi\n");
            writer.write(Stream::Stdout, "");
            writer.finish(SessionState::Completed);
        }
        let events = hub.poll(&page, Duration::from_millis(10));
        assert!(
            matches!(
                events.as_slice(),
                [
                    ChannelEvent::Output { stream: Stream::Stdout, text, .. },
                    ChannelEvent::Finished { state: SessionState::Completed, .. }
                ] if text == "hi\n"
            ),
            "got: {events:?}"
        );
        assert!(hub.poll(&page, Duration::from_millis(1)).is_empty());
    }

    #[test]
    fn one_writer_per_session_at_a_time() {
        let hub = ChannelHub::new();
        let session = SessionId::from("1:2");
        let first = hub.register_writer(&session).expect("bind");
        assert_eq!(
            hub.register_writer(&session).err(),
            Some(ChannelError::WriterBound(session.clone()))
        );
        drop(first);
        assert!(hub.register_writer(&session).is_ok());
    }

    #[test]
    fn input_posted_before_binding_is_kept() {
        let hub = ChannelHub::new();
        hub.register_page(&PageId::from("3"));
        let session = SessionId::from("3:4");
        assert!(hub.push_input(&session, "42"));
        let reader = hub.register_reader(&session).expect("bind");
        assert_eq!(reader.read_line().as_deref(), Some("42"));
    }

    #[test]
    fn poll_waits_for_a_worker_thread() {
        let hub = ChannelHub::new();
        let page = PageId::from("9");
        let session = SessionId::fresh(&page);
        let worker_hub = Arc::clone(&hub);
        let handle = std::thread::spawn(move || {
            let writer = worker_hub.register_writer(&session).expect("bind");
            writer.write(Stream::Stderr, "boom");
        });
        handle.join().expect("worker");
        let events = hub.poll(&page, Duration::from_secs(1));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn unknown_ids_from_clients_leave_no_state() {
        let hub = ChannelHub::new();
        let stale = PageId::from("404");
        assert!(hub.poll(&stale, Duration::from_secs(5)).is_empty());
        assert!(!hub.push_input(&SessionId::from("404:1"), "x"));
        assert_eq!(hub.page_count(), 0);
        assert!(lock(&hub.state).inputs.is_empty());
    }

    #[test]
    fn unregistering_a_page_drops_its_queues() {
        let hub = ChannelHub::new();
        let page = PageId::from("12");
        hub.register_page(&page);
        let session = SessionId::fresh(&page);
        assert!(hub.push_input(&session, "queued"));
        hub.register_writer(&session).expect("bind").write(Stream::Stdout, "lost");
        hub.unregister_page(&page);
        assert!(!hub.is_registered(&page));
        assert!(hub.poll(&page, Duration::from_millis(1)).is_empty());
        assert!(lock(&hub.state).inputs.is_empty());
        assert!(!hub.push_input(&session, "late"));
    }

    #[test]
    fn scripts_quote_text_as_json() {
        let ev = ChannelEvent::Output {
            session: SessionId::from("1:2"),
            stream: Stream::Stderr,
            text: "a\"</script>\n".to_string(),
        };
        assert_eq!(
            ev.to_script(),
            "appendOutput(\"1:2\", \"stderr\", \"a\\\"</script>\\n\");"
        );
    }
}
