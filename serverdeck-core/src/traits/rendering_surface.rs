//! Rendering surface abstract Trait

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::CoreResult;
use crate::types::{ContentId, NavigationError, Server, ViewDescriptor};

/// An embeddable, navigable web-rendering context.
///
/// The core never renders anything itself; it drives surfaces through this contract and
/// receives their events through the `Shell` entry points.
#[async_trait]
pub trait RenderingSurface: Send + Sync {
    /// Stable content id used to route events back to the owning view
    fn content_id(&self) -> ContentId;

    /// Navigate to a URL, resolving once the navigation finishes or fails
    ///
    /// # Arguments
    /// * `url` - Destination URL
    async fn load_url(&self, url: &Url) -> Result<(), NavigationError>;

    /// URL currently committed in the surface, if any
    fn current_url(&self) -> Option<String>;

    /// Whether history navigation by `offset` entries is possible
    fn can_go_to_offset(&self, offset: i32) -> bool;

    /// Navigate history by `offset` entries
    fn go_to_offset(&self, offset: i32) -> CoreResult<()>;

    fn focus(&self);

    /// Current document title
    fn title(&self) -> String;

    /// Send a message to the hosted page
    ///
    /// # Arguments
    /// * `channel` - Message channel, see `types::channels`
    /// * `args` - JSON payload
    fn send(&self, channel: &str, args: Value);

    fn is_destroyed(&self) -> bool;

    /// Release the surface; must tolerate repeated calls
    fn destroy(&self);
}

/// Creates rendering surfaces for newly materialized views.
pub trait SurfaceFactory: Send + Sync {
    /// # Arguments
    /// * `server` - Owning server
    /// * `descriptor` - View slot being materialized
    fn create(
        &self,
        server: &Server,
        descriptor: &ViewDescriptor,
    ) -> CoreResult<Arc<dyn RenderingSurface>>;
}
