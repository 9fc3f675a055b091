//! Runtime bootstrap for the ServerDeck shell core.
//!
//! Provides `AppBuilder` (adapter injection), the tokio-backed `ShellRuntime` actor with its
//! cloneable `ShellHandle`, settings loading and logging setup.

pub mod config;
pub mod logging;
pub mod runtime;

use std::sync::Arc;

use serverdeck_core::error::{CoreError, CoreResult};
use serverdeck_core::services::ServiceContext;
use serverdeck_core::traits::{
    BufferedEventSink, DeepLinkErrorPresenter, ExternalBrowserOpener, HostWindow,
    LoadingScreenPresenter, ModalPresenter, PopupWindowFactory, ProtocolConfirmationPrompt,
    SurfaceFactory, ViewEventSink,
};
use serverdeck_core::types::ShellSettings;
use serverdeck_core::Shell;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

pub use runtime::{ShellCommand, ShellHandle, ShellRuntime, TokioScheduler};

/// Builder for a running shell with platform-specific adapters.
///
/// # Required adapters
/// - `host_window`: window live views attach to
/// - `surface_factory`: creates rendering surfaces
/// - `popup_factory`: creates managed popup windows
/// - `loading_screen`, `protocol_prompt`, `external_browser`, `deep_link_errors`,
///   `modal_presenter`: presentation collaborators
///
/// # Optional
/// - `event_sink`: defaults to `BufferedEventSink`
/// - `settings`: defaults to `ShellSettings::default()`
pub struct AppBuilder {
    host_window: Option<Arc<dyn HostWindow>>,
    surface_factory: Option<Arc<dyn SurfaceFactory>>,
    popup_factory: Option<Arc<dyn PopupWindowFactory>>,
    loading_screen: Option<Arc<dyn LoadingScreenPresenter>>,
    protocol_prompt: Option<Arc<dyn ProtocolConfirmationPrompt>>,
    external_browser: Option<Arc<dyn ExternalBrowserOpener>>,
    deep_link_errors: Option<Arc<dyn DeepLinkErrorPresenter>>,
    modal_presenter: Option<Arc<dyn ModalPresenter>>,
    event_sink: Option<Arc<dyn ViewEventSink>>,
    settings: ShellSettings,
}

fn required<T>(value: Option<T>, name: &str) -> CoreResult<T> {
    value.ok_or_else(|| CoreError::ValidationError(format!("{name} is required")))
}

impl AppBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            host_window: None,
            surface_factory: None,
            popup_factory: None,
            loading_screen: None,
            protocol_prompt: None,
            external_browser: None,
            deep_link_errors: None,
            modal_presenter: None,
            event_sink: None,
            settings: ShellSettings::default(),
        }
    }

    #[must_use]
    pub fn host_window(mut self, window: Arc<dyn HostWindow>) -> Self {
        self.host_window = Some(window);
        self
    }

    #[must_use]
    pub fn surface_factory(mut self, factory: Arc<dyn SurfaceFactory>) -> Self {
        self.surface_factory = Some(factory);
        self
    }

    #[must_use]
    pub fn popup_factory(mut self, factory: Arc<dyn PopupWindowFactory>) -> Self {
        self.popup_factory = Some(factory);
        self
    }

    #[must_use]
    pub fn loading_screen(mut self, presenter: Arc<dyn LoadingScreenPresenter>) -> Self {
        self.loading_screen = Some(presenter);
        self
    }

    #[must_use]
    pub fn protocol_prompt(mut self, prompt: Arc<dyn ProtocolConfirmationPrompt>) -> Self {
        self.protocol_prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn external_browser(mut self, opener: Arc<dyn ExternalBrowserOpener>) -> Self {
        self.external_browser = Some(opener);
        self
    }

    #[must_use]
    pub fn deep_link_errors(mut self, presenter: Arc<dyn DeepLinkErrorPresenter>) -> Self {
        self.deep_link_errors = Some(presenter);
        self
    }

    #[must_use]
    pub fn modal_presenter(mut self, presenter: Arc<dyn ModalPresenter>) -> Self {
        self.modal_presenter = Some(presenter);
        self
    }

    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn ViewEventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: ShellSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Spawn the shell runtime on the current tokio runtime.
    ///
    /// # Errors
    /// Returns `CoreError::ValidationError` if required adapters are missing or the settings
    /// are invalid, and `CoreError::ConfigError` when called outside a tokio runtime.
    pub fn build(self) -> CoreResult<ShellHandle> {
        self.settings.validate()?;
        let handle = Handle::try_current()
            .map_err(|e| CoreError::ConfigError(format!("No tokio runtime: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(TokioScheduler::new(handle.clone(), &tx));

        let ctx = Arc::new(ServiceContext {
            host_window: required(self.host_window, "host_window")?,
            surface_factory: required(self.surface_factory, "surface_factory")?,
            popup_factory: required(self.popup_factory, "popup_factory")?,
            loading_screen: required(self.loading_screen, "loading_screen")?,
            protocol_prompt: required(self.protocol_prompt, "protocol_prompt")?,
            external_browser: required(self.external_browser, "external_browser")?,
            deep_link_errors: required(self.deep_link_errors, "deep_link_errors")?,
            modal_presenter: required(self.modal_presenter, "modal_presenter")?,
            event_sink: self
                .event_sink
                .unwrap_or_else(|| Arc::new(BufferedEventSink::new())),
            scheduler,
            settings: self.settings,
        });

        let runtime = ShellRuntime::new(Shell::new(ctx), rx);
        handle.spawn(runtime.run());
        Ok(ShellHandle::new(tx))
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
