//! 事件类型：对外的视图生命周期事件与内部的调度完成事件

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::view::{NavigationError, RenderGoneReason};

/// Lifecycle events emitted to the UI-chrome layer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewEvent {
    LoadSuccess {
        view_id: String,
        url: String,
    },
    LoadRetryScheduled {
        view_id: String,
        next_attempt_at: DateTime<Utc>,
        error: String,
        url: String,
    },
    LoadFailed {
        view_id: String,
        error: String,
        url: String,
    },
    LoadscreenEnd {
        view_id: String,
    },
    /// Hovered link target; `None` when the link stays inside the server.
    UpdateTargetUrl {
        view_id: String,
        url: Option<String>,
    },
    ActiveViewChanged {
        server_id: String,
        view_id: String,
    },
    MentionsUpdated {
        view_id: String,
        mentions: u32,
    },
    BackBarToggled {
        view_id: String,
        visible: bool,
    },
}

/// Token returned by the scheduler for a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Which kind of load produced a `LoadFinished` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAttempt {
    /// `load()` or `reload()`
    Initial,
    /// Bounded foreground retry
    Retry,
    /// Silent retry after foreground retries were exhausted
    Background,
}

/// Completions delivered back to the core by the scheduler.
///
/// Every event carries the generation of the view at scheduling time; a mismatch
/// means the view was reset, superseded or destroyed in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledEvent {
    LoadFinished {
        view_id: String,
        generation: u64,
        attempt: LoadAttempt,
        url: String,
        result: Result<(), NavigationError>,
    },
    RetryDue {
        view_id: String,
        generation: u64,
    },
    AppReadyTimeout {
        view_id: String,
        generation: u64,
    },
}

/// Fire-and-forget events reported by a rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    DidNavigate { url: String },
    TitleUpdated { title: String },
    FaviconUpdated { favicons: Vec<String> },
    UpdateTargetUrl { url: String },
    RenderProcessGone { reason: RenderGoneReason },
    Closed,
}

