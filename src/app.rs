use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bus::ChannelHub;
use core_types::{PageId, SessionId, SessionState};
use interp::{Engine, EngineConfig, Mode, Outcome, SubmitError};
use markup::{AssembleOptions, AssemblerConfig, MarkupRegistryBuilder, PageAssembler};
use net::{FetchError, NetReader, ResourceReader};
use security::{SecurityPolicy, SiteAccess};
use serve::{Response, path_to_response, remote_page, remote_url_from_query};
use widgets::Widgets;

use crate::settings::Settings;

/// What [`App::execute`] did with the submitted text.
#[derive(Debug)]
pub enum Submitted {
    /// A worker is running the code.
    Worker(JoinHandle<Outcome>),
    /// The console's program was waiting in `input()`; the line went there.
    Input,
}

/// Everything an HTTP layer needs, wired from one [`Settings`].
pub struct App {
    settings: Settings,
    hub: Arc<ChannelHub>,
    engine: Arc<Engine>,
    reader: Arc<dyn ResourceReader>,
    assembler: PageAssembler,
}

impl App {
    /// Reads stylesheets and remote tutorials from disk and the network.
    pub fn new(settings: Settings) -> Result<Self, FetchError> {
        Ok(Self::with_reader(settings, Arc::new(NetReader::new()?)))
    }

    pub fn with_reader(settings: Settings, reader: Arc<dyn ResourceReader>) -> Self {
        let hub = ChannelHub::new();
        let engine = Arc::new(Engine::new(
            Arc::clone(&hub),
            EngineConfig {
                friendly: settings.friendly_errors,
                sharing_scope: settings.sharing_scope,
            },
        ));

        let mut builder = MarkupRegistryBuilder::new();
        Widgets::new(
            Arc::clone(&engine),
            Arc::clone(&reader),
            settings.server_root.clone(),
        )
        .register(&mut builder);
        builder.register_default_markup(&settings.default_markup);

        let mut sites = SiteAccess::with_defaults(settings.default_tier);
        for (host, tier) in &settings.sites {
            sites.set(host, *tier);
        }
        let policy = SecurityPolicy::new(sites, settings.server_root.clone(), Arc::clone(&reader));
        let assembler = PageAssembler::new(
            builder.build(),
            Arc::new(policy),
            Arc::clone(&hub),
            AssemblerConfig {
                default_markup_tags: settings.default_markup_tags.clone(),
                strict_handlers: settings.strict_handlers,
            },
        );
        log::debug!(
            target: "livedoc",
            "serving {} at {} by default",
            settings.server_root.display(),
            settings.default_tier
        );
        App {
            settings,
            hub,
            engine,
            reader,
            assembler,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    pub fn assembler(&self) -> &PageAssembler {
        &self.assembler
    }

    /// GET of a path under the server root.
    pub fn render_path(&self, path: &str) -> Response {
        path_to_response(path, &self.settings.server_root, &self.assembler)
    }

    /// GET of `/remote?{query}`.
    pub fn render_remote(&self, query: &str) -> Response {
        match remote_url_from_query(query) {
            Some(url) => remote_page(&url, self.reader.as_ref(), &self.assembler),
            None => Response::html(markup::error_page("/remote", "missing url parameter"))
                .with_status(400),
        }
    }

    /// Assembles a document that did not come from the server root.
    pub fn render_bytes(&self, bytes: &[u8], url: &str, options: AssembleOptions) -> Vec<u8> {
        self.assembler.render(bytes, url, options)
    }

    /// POST of code for `session`.
    pub fn execute(&self, session: &SessionId, code: &str) -> Result<Submitted, SubmitError> {
        let target = self
            .engine
            .session(session)
            .ok_or_else(|| SubmitError::UnknownSession(session.clone()))?;
        if *target.mode() == Mode::Console && target.state() == SessionState::Running {
            self.push_input(session, code.trim_end_matches(['\r', '\n']));
            return Ok(Submitted::Input);
        }
        self.engine.submit(session, code).map(Submitted::Worker)
    }

    /// POST of one line for a program blocked in `input()`. Returns whether the line
    /// reached a live session.
    pub fn push_input(&self, session: &SessionId, line: &str) -> bool {
        self.hub.push_input(session, line)
    }

    /// The browser left `page`: forgets its sessions, its page-scoped namespace and its
    /// queues. Workers still running finish with their output discarded.
    pub fn release_page(&self, page: &PageId) {
        log::debug!(target: "livedoc", "releasing page {page}");
        self.engine.release_page(page);
        self.hub.unregister_page(page);
    }

    /// Long-poll response body: the queued events of `page` as JavaScript.
    pub fn poll(&self, page: &PageId, timeout: Duration) -> String {
        self.hub
            .poll(page, timeout)
            .iter()
            .map(|event| event.to_script())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Recorded input of a session opened with the `log` option.
    pub fn session_log(&self, session: &SessionId) -> Vec<String> {
        self.engine.log_entries(session)
    }
}
