//! 导航策略判定结果类型

use serde::Serialize;

/// Verdict for an in-place navigation or redirect.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NavigationDecision {
    Allow,
    /// The host must prevent the navigation
    Deny,
}

impl NavigationDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Answer returned to the rendering primitive for a new-window request.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WindowOpenAction {
    /// Let the primitive create the window natively
    Allow,
    Deny,
}

/// Side effect chosen by the policy engine for a new-window request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewWindowVerdict {
    /// Unparseable URL, logged and dropped
    Ignore,
    /// `devtools:` scheme
    AllowDevTools,
    /// `about:blank` child of a known view, created natively under containment
    AllowBlankPopup,
    OpenExternal,
    PromptProtocol { scheme: String },
    /// Resolve through the deep-link path (app scheme or another server's team URL)
    DeepLink,
    /// Team URL of the originating server, shown in the main window
    ShowInMainWindow,
    /// Admin console, never opened anywhere
    DenyAdminConsole,
    /// Plugin or managed resource, opened in the single constrained popup
    OpenPopup,
}

/// How a popup window came to exist.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PopupKind {
    /// Created by the shell for a plugin or managed-resource URL
    Managed,
    /// Created natively by the primitive for an `about:blank` request
    Blank,
}

/// Result of asking the popup controller to show a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupOpenOutcome {
    /// The popup already points at the URL, nothing changed
    AlreadyOpen,
    Created,
    /// A popup at a different URL was closed and a new one created
    Replaced,
}
