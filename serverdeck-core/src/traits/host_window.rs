//! Host window abstract Trait

use crate::types::{ContentId, Rect};

/// The application window that live views are attached to.
pub trait HostWindow: Send + Sync {
    /// Attach a surface to the window
    fn add_view(&self, content_id: ContentId);

    /// Detach a surface from the window; no-op when not attached
    fn remove_view(&self, content_id: ContentId);

    /// Position an attached surface
    fn set_bounds(&self, content_id: ContentId, bounds: Rect);

    /// Content area available to views
    fn bounds(&self) -> Rect;
}
