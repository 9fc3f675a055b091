//! 视图运行时状态类型

use serde::{Deserialize, Serialize};

/// Identifier of a rendering surface's content, stable for the surface's lifetime.
pub type ContentId = u64;

/// Loading status of a live view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStatus {
    /// Navigation in progress (initial state, and after a reset)
    Loading,
    /// Page loaded, waiting for the hosted application to signal initialization
    WaitingForAppReady,
    /// Fully loaded
    Ready,
    /// Foreground retries exhausted or certificate failure
    Error,
}

/// Failure classes of a navigation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationErrorKind {
    /// TLS/certificate failure, never retried automatically
    Certificate,
    /// Superseded or cancelled navigation, not a failure
    Aborted,
    /// DNS, connection, timeout and everything else
    Transient,
}

/// Navigation failure reported by a rendering surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigationError {
    /// Engine error code, e.g. `ERR_CONNECTION_REFUSED`
    pub code: String,
    /// Human readable description
    pub description: String,
}

impl NavigationError {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }

    pub fn kind(&self) -> NavigationErrorKind {
        if self.code.starts_with("ERR_CERT") {
            NavigationErrorKind::Certificate
        } else if self.code.starts_with("ERR_ABORTED") {
            NavigationErrorKind::Aborted
        } else {
            NavigationErrorKind::Transient
        }
    }
}

impl std::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code, self.description)
    }
}

/// Window-relative rectangle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Why a renderer process went away.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RenderGoneReason {
    CleanExit,
    AbnormalExit,
    Killed,
    Crashed,
    Oom,
    LaunchFailed,
    IntegrityFailure,
}

/// Read-only view of a live view's state, for hosts and diagnostics.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LiveViewInfo {
    pub id: String,
    #[serde(rename = "serverId")]
    pub server_id: String,
    pub status: LoadStatus,
    #[serde(rename = "isVisible")]
    pub is_visible: bool,
    #[serde(rename = "isLoggedIn")]
    pub is_logged_in: bool,
    #[serde(rename = "isAtRoot")]
    pub is_at_root: bool,
    #[serde(rename = "currentUrl")]
    pub current_url: Option<String>,
}
