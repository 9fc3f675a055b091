//! External collaborator abstract Trait definitions

mod event_sink;
mod host_window;
mod popup_window;
mod presenters;
mod rendering_surface;
mod scheduler;

pub use event_sink::{BufferedEventSink, ViewEventSink};
pub use host_window::HostWindow;
pub use popup_window::{PopupWindow, PopupWindowFactory};
pub use presenters::{
    DeepLinkErrorPresenter, ExternalBrowserOpener, LoadingScreenPresenter, ModalPresenter,
    ProtocolConfirmationPrompt,
};
pub use rendering_surface::{RenderingSurface, SurfaceFactory};
pub use scheduler::Scheduler;
