//! UI collaborator Traits driven by the core

use serde_json::Value;

use crate::types::Rect;

/// Loading overlay shown above views that are not ready yet.
pub trait LoadingScreenPresenter: Send + Sync {
    fn show(&self);
    fn fade(&self);
}

/// Confirmation flow for non-web protocols.
pub trait ProtocolConfirmationPrompt: Send + Sync {
    /// # Arguments
    /// * `scheme` - Scheme without `:`
    /// * `url` - Full URL requested by the page
    fn handle(&self, scheme: &str, url: &str);
}

/// Opens URLs in the OS default browser.
pub trait ExternalBrowserOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Error presentation for deep links.
pub trait DeepLinkErrorPresenter: Send + Sync {
    /// No configured server matches the deep link
    fn show_no_matching_server(&self, url: &str);
}

/// Dialog surfaces managed by the modal queue.
pub trait ModalPresenter: Send + Sync {
    /// Display (or re-display) a modal and give it focus
    ///
    /// # Arguments
    /// * `key` - Modal key
    /// * `payload` - Data handed to the dialog
    /// * `uncloseable` - Whether the dialog hides its close affordance
    fn show(&self, key: &str, payload: &Value, uncloseable: bool);

    fn hide(&self, key: &str);

    fn focus(&self, key: &str);

    fn set_bounds(&self, key: &str, bounds: Rect);
}
