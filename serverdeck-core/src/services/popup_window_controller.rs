//! Secondary window bookkeeping and containment.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::error::CoreResult;
use crate::services::navigation_policy::popup_will_navigate;
use crate::services::ServiceContext;
use crate::traits::PopupWindow;
use crate::types::{
    ContentId, NavigationDecision, PopupKind, PopupOpenOutcome, RenderGoneReason,
    WindowOpenAction,
};

/// A live secondary window and the view that spawned it.
pub struct PopupWindowEntry {
    pub content_id: ContentId,
    pub parent_view_id: String,
    /// URL the popup was created with; the only navigation target allowed
    pub initial_url: String,
    pub kind: PopupKind,
    window: Arc<dyn PopupWindow>,
    listeners_attached: bool,
}

impl PopupWindowEntry {
    pub fn listeners_attached(&self) -> bool {
        self.listeners_attached
    }
}

/// Tracks open popups. At most one managed (plugin/managed-resource) popup exists at a time.
pub struct PopupWindowController {
    ctx: Arc<ServiceContext>,
    popups: HashMap<ContentId, PopupWindowEntry>,
    managed: Option<ContentId>,
}

impl PopupWindowController {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            ctx,
            popups: HashMap::new(),
            managed: None,
        }
    }

    pub fn len(&self) -> usize {
        self.popups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.popups.is_empty()
    }

    pub fn is_popup(&self, content_id: ContentId) -> bool {
        self.popups.contains_key(&content_id)
    }

    pub fn entry(&self, content_id: ContentId) -> Option<&PopupWindowEntry> {
        self.popups.get(&content_id)
    }

    pub fn managed_content_id(&self) -> Option<ContentId> {
        self.managed
    }

    /// Show `url` in the managed popup, reusing it when it already points there.
    ///
    /// # Arguments
    /// * `parent` - Content id of the requesting view
    /// * `parent_view_id` - View id of the requesting view
    /// * `url` - Plugin or managed-resource URL
    pub fn open_managed(
        &mut self,
        parent: ContentId,
        parent_view_id: &str,
        url: &Url,
    ) -> CoreResult<PopupOpenOutcome> {
        let mut replaced = false;
        if let Some(existing) = self.managed {
            match self.popups.get(&existing) {
                Some(entry) if !entry.window.is_closed() => {
                    let current = entry
                        .window
                        .current_url()
                        .unwrap_or_else(|| entry.initial_url.clone());
                    if current == url.as_str() {
                        entry.window.focus();
                        return Ok(PopupOpenOutcome::AlreadyOpen);
                    }
                    log::info!("Replacing popup at {current} with {url}");
                    self.close(existing);
                    replaced = true;
                }
                _ => {
                    self.handle_closed(existing);
                }
            }
        }

        let window = self.ctx.popup_factory.create(parent, url)?;
        let content_id = window.content_id();
        window.load_url(url);
        window.show();
        self.popups.insert(
            content_id,
            PopupWindowEntry {
                content_id,
                parent_view_id: parent_view_id.to_string(),
                initial_url: url.to_string(),
                kind: PopupKind::Managed,
                window,
                listeners_attached: true,
            },
        );
        self.managed = Some(content_id);
        log::info!("Opened popup {content_id} for {url}");

        Ok(if replaced {
            PopupOpenOutcome::Replaced
        } else {
            PopupOpenOutcome::Created
        })
    }

    /// Register a window the rendering primitive created natively (`about:blank` children).
    pub fn register_created(
        &mut self,
        parent_view_id: &str,
        url: &str,
        window: Arc<dyn PopupWindow>,
    ) {
        let content_id = window.content_id();
        self.popups.insert(
            content_id,
            PopupWindowEntry {
                content_id,
                parent_view_id: parent_view_id.to_string(),
                initial_url: url.to_string(),
                kind: PopupKind::Blank,
                window,
                listeners_attached: true,
            },
        );
        log::debug!("Registered popup {content_id} for view {parent_view_id}");
    }

    /// `None` when the content id is not a popup.
    pub fn will_navigate(&self, content_id: ContentId, url: &str) -> Option<NavigationDecision> {
        let entry = self.popups.get(&content_id)?;
        let decision = popup_will_navigate(&entry.initial_url, url);
        if decision == NavigationDecision::Deny {
            log::info!("Prevented popup {content_id} from navigating to {url}");
        }
        Some(decision)
    }

    pub fn will_redirect(&self, content_id: ContentId, url: &str) -> Option<NavigationDecision> {
        self.popups.get(&content_id)?;
        log::info!("Prevented popup {content_id} from redirecting to {url}");
        Some(NavigationDecision::Deny)
    }

    pub fn new_window(&self, content_id: ContentId, url: &str) -> Option<WindowOpenAction> {
        self.popups.get(&content_id)?;
        log::info!("Prevented popup {content_id} from opening {url}");
        Some(WindowOpenAction::Deny)
    }

    /// Detach listeners of a crashed popup. Teardown failures are logged, never propagated.
    pub fn handle_render_process_gone(&mut self, content_id: ContentId, reason: RenderGoneReason) {
        let Some(entry) = self.popups.get_mut(&content_id) else {
            return;
        };
        if reason != RenderGoneReason::CleanExit {
            log::error!("Popup {content_id} renderer gone: {reason:?}");
        }
        if !entry.listeners_attached {
            return;
        }
        match entry.window.detach_listeners() {
            Ok(()) => entry.listeners_attached = false,
            Err(e) => log::warn!("Failed to detach listeners of popup {content_id}: {e}"),
        }
    }

    /// The window closed; drop its entry and context menu.
    pub fn handle_closed(&mut self, content_id: ContentId) {
        if let Some(entry) = self.popups.remove(&content_id) {
            entry.window.dispose_context_menu();
            log::debug!("Popup {content_id} closed");
        }
        if self.managed == Some(content_id) {
            self.managed = None;
        }
    }

    pub fn close(&mut self, content_id: ContentId) {
        if let Some(entry) = self.popups.get(&content_id) {
            if !entry.window.is_closed() {
                entry.window.close();
            }
        }
        self.handle_closed(content_id);
    }

    /// Close every popup spawned by the given view.
    pub fn close_children_of(&mut self, view_id: &str) {
        let children: Vec<_> = self
            .popups
            .values()
            .filter(|entry| entry.parent_view_id == view_id)
            .map(|entry| entry.content_id)
            .collect();
        for content_id in children {
            self.close(content_id);
        }
    }

    pub fn close_all(&mut self) {
        let all: Vec<_> = self.popups.keys().copied().collect();
        for content_id in all {
            self.close(content_id);
        }
    }
}
