use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use bus::ChannelHub;
use core_types::{PageId, SessionId, SharingScope};

use crate::namespace::Namespace;
use crate::session::{ExecutionSession, Mode, Outcome, SessionLog, Sharing, SharingGroup};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Simplified error messages instead of full tracebacks.
    pub friendly: bool,
    pub sharing_scope: SharingScope,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            friendly: true,
            sharing_scope: SharingScope::Page,
        }
    }
}

#[derive(Debug)]
pub enum SubmitError {
    UnknownSession(SessionId),
    Spawn(io::Error),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::UnknownSession(id) => write!(f, "no session with id {id}"),
            SubmitError::Spawn(err) => write!(f, "cannot start worker: {err}"),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::Spawn(err) => Some(err),
            SubmitError::UnknownSession(_) => None,
        }
    }
}

/// Owns every session and the pool of shared namespaces.
pub struct Engine {
    config: EngineConfig,
    hub: Arc<ChannelHub>,
    log: SessionLog,
    sessions: Mutex<HashMap<SessionId, Arc<ExecutionSession>>>,
    shared: Mutex<HashMap<SharingGroup, Namespace>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Engine {
    pub fn new(hub: Arc<ChannelHub>, config: EngineConfig) -> Self {
        Engine {
            config,
            hub,
            log: SessionLog::default(),
            sessions: Mutex::new(HashMap::new()),
            shared: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    pub fn sharing_group(&self, page: &PageId) -> SharingGroup {
        match self.config.sharing_scope {
            SharingScope::Page => SharingGroup::new(format!("page:{page}")),
            SharingScope::Process => SharingGroup::new("process"),
        }
    }

    /// Namespace for `group`, created on first use.
    pub fn shared_namespace(&self, group: &SharingGroup) -> Namespace {
        lock(&self.shared).entry(group.clone()).or_default().clone()
    }

    /// Creates the session bound to `id`, replacing any earlier session with that id.
    pub fn create_session(&self, id: SessionId, mode: Mode, shared: bool) -> Arc<ExecutionSession> {
        let (namespace, sharing) = if shared {
            let group = self.sharing_group(&id.page());
            (self.shared_namespace(&group), Sharing::Shared(group))
        } else {
            (Namespace::isolated(id.as_str()), Sharing::Isolated)
        };
        log::debug!(target: "interp.session", "created {id} ({sharing:?}, {mode:?})");
        let session = Arc::new(ExecutionSession::new(
            id.clone(),
            namespace,
            sharing,
            mode,
            self.config.friendly,
            Arc::clone(&self.hub),
            self.log.clone(),
        ));
        lock(&self.sessions).insert(id, Arc::clone(&session));
        session
    }

    pub fn session(&self, id: &SessionId) -> Option<Arc<ExecutionSession>> {
        lock(&self.sessions).get(id).cloned()
    }

    pub fn submit(&self, id: &SessionId, code: &str) -> Result<JoinHandle<Outcome>, SubmitError> {
        let session = self
            .session(id)
            .ok_or_else(|| SubmitError::UnknownSession(id.clone()))?;
        session.submit(code).map_err(SubmitError::Spawn)
    }

    pub fn register_logging(&self, id: &SessionId) {
        self.log.register(id);
    }

    pub fn log_entries(&self, id: &SessionId) -> Vec<String> {
        self.log.entries(id)
    }

    /// Forgets a page's sessions and its page-scoped namespace.
    pub fn release_page(&self, page: &PageId) {
        lock(&self.sessions).retain(|id, _| id.page() != *page);
        if self.config.sharing_scope == SharingScope::Page {
            lock(&self.shared).remove(&self.sharing_group(page));
        }
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("sessions", &self.session_count())
            .finish()
    }
}
