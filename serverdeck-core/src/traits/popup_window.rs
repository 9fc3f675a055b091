//! Secondary window abstract Trait

use std::sync::Arc;

use url::Url;

use crate::error::CoreResult;
use crate::types::ContentId;

/// A top-level secondary window hosting plugin or managed-resource content.
pub trait PopupWindow: Send + Sync {
    fn content_id(&self) -> ContentId;

    /// Start loading a URL; failures are reported through the window's own events
    fn load_url(&self, url: &Url);

    fn current_url(&self) -> Option<String>;

    fn show(&self);

    fn focus(&self);

    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Remove every event listener attached by the shell
    fn detach_listeners(&self) -> CoreResult<()>;

    /// Release the context menu attached to the window, if any
    fn dispose_context_menu(&self);
}

/// Creates managed popup windows.
pub trait PopupWindowFactory: Send + Sync {
    /// # Arguments
    /// * `parent` - Content id of the view that requested the popup
    /// * `url` - Initial URL
    fn create(&self, parent: ContentId, url: &Url) -> CoreResult<Arc<dyn PopupWindow>>;
}
