//! 业务逻辑服务层

mod modal_queue;
pub mod navigation_policy;
mod popup_window_controller;
mod shell;
mod view_load_controller;
mod view_manager;

pub use modal_queue::ModalQueue;
pub use navigation_policy::NavigationGuard;
pub use popup_window_controller::{PopupWindowController, PopupWindowEntry};
pub use shell::Shell;
pub use view_load_controller::{LiveView, ViewLoadController, ViewTransition};
pub use view_manager::{ClosedView, ViewManager};

use std::sync::Arc;

use crate::traits::{
    DeepLinkErrorPresenter, ExternalBrowserOpener, HostWindow, LoadingScreenPresenter,
    ModalPresenter, PopupWindowFactory, ProtocolConfirmationPrompt, Scheduler, SurfaceFactory,
    ViewEventSink,
};
use crate::types::{ShellSettings, ViewEvent};

/// 服务上下文 - 持有所有外部协作者
///
/// The host layer constructs this once per session and injects its window, surface and
/// presentation adapters.
pub struct ServiceContext {
    /// Application window that live views attach to
    pub host_window: Arc<dyn HostWindow>,
    /// Creates rendering surfaces for materialized views
    pub surface_factory: Arc<dyn SurfaceFactory>,
    /// Creates managed popup windows
    pub popup_factory: Arc<dyn PopupWindowFactory>,
    pub loading_screen: Arc<dyn LoadingScreenPresenter>,
    pub protocol_prompt: Arc<dyn ProtocolConfirmationPrompt>,
    pub external_browser: Arc<dyn ExternalBrowserOpener>,
    pub deep_link_errors: Arc<dyn DeepLinkErrorPresenter>,
    pub modal_presenter: Arc<dyn ModalPresenter>,
    /// Receives view lifecycle events
    pub event_sink: Arc<dyn ViewEventSink>,
    /// Runs timers and navigation futures
    pub scheduler: Arc<dyn Scheduler>,
    pub settings: ShellSettings,
}

impl ServiceContext {
    /// Emit a lifecycle event
    pub fn emit(&self, event: ViewEvent) {
        log::debug!("View event: {event:?}");
        self.event_sink.emit(event);
    }
}
