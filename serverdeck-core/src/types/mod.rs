//! 类型定义模块

mod events;
mod modal;
mod navigation;
mod server;
mod settings;
mod view;

pub use events::{LoadAttempt, ScheduledEvent, SurfaceEvent, TimerId, ViewEvent};
pub use modal::{ModalError, ModalOutcome, ModalResult};
pub use navigation::{
    NavigationDecision, NewWindowVerdict, PopupKind, PopupOpenOutcome, WindowOpenAction,
};
pub use server::{Server, ServerSnapshot, ViewDescriptor, ViewType};
pub use settings::{BaselineReadPolicy, ShellSettings};
pub use view::{
    ContentId, LiveViewInfo, LoadStatus, NavigationError, NavigationErrorKind, Rect,
    RenderGoneReason,
};

/// Message channels sent to hosted pages through `RenderingSurface::send`.
pub mod channels {
    /// In-app SPA navigation to a server-relative path
    pub const BROWSER_HISTORY_PUSH: &str = "browser-history-push";
    /// Back/forward availability
    pub const BROWSER_HISTORY_BUTTON: &str = "browser-history-button";
    /// Unread state derived from the favicon
    pub const IS_UNREAD: &str = "is-unread";
}
