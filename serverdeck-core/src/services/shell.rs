//! Session facade over the view registry, navigation policy, modals and popups.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::error::{CoreError, CoreResult};
use crate::services::navigation_policy::{self, NavigationContext};
use crate::services::{
    ModalQueue, NavigationGuard, PopupWindowController, ServiceContext, ViewManager,
};
use crate::traits::PopupWindow;
use crate::types::{
    ContentId, LiveViewInfo, ModalOutcome, NavigationDecision, NewWindowVerdict, Rect,
    ScheduledEvent, Server, ServerSnapshot, SurfaceEvent, WindowOpenAction,
};
use crate::utils::url::{find_server_for_url, parse_url};

/// One application session.
///
/// Every host-facing entry point goes through here; the host must call them from a single
/// control thread (see `ShellRuntime` in the app crate).
pub struct Shell {
    ctx: Arc<ServiceContext>,
    views: ViewManager,
    modals: ModalQueue,
    popups: PopupWindowController,
    guard: NavigationGuard,
    shut_down: bool,
}

impl Shell {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            views: ViewManager::new(Arc::clone(&ctx)),
            modals: ModalQueue::new(Arc::clone(&ctx.modal_presenter)),
            popups: PopupWindowController::new(Arc::clone(&ctx)),
            guard: NavigationGuard::new(),
            shut_down: false,
            ctx,
        }
    }

    pub fn views(&self) -> &ViewManager {
        &self.views
    }

    pub fn popups(&self) -> &PopupWindowController {
        &self.popups
    }

    pub fn views_info(&self) -> Vec<LiveViewInfo> {
        self.views.views_info()
    }

    pub fn current_view_id(&self) -> Option<String> {
        self.views.current_view_id().map(str::to_string)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn ensure_running(&self) -> CoreResult<()> {
        if self.shut_down {
            return Err(CoreError::RuntimeClosed);
        }
        Ok(())
    }

    // ===== Configuration =====

    pub fn load_configuration(&mut self, snapshots: Vec<ServerSnapshot>) -> CoreResult<()> {
        self.ensure_running()?;
        log::info!("Loading {} server(s)", snapshots.len());
        self.views.load_configuration(snapshots);
        Ok(())
    }

    pub fn reload_configuration(&mut self, snapshots: Vec<ServerSnapshot>) -> CoreResult<()> {
        self.ensure_running()?;
        log::info!("Reloading configuration with {} server(s)", snapshots.len());
        let before: HashSet<String> = self.views.open_view_ids().into_iter().collect();
        self.views.reload_configuration(snapshots);
        let after: HashSet<String> = self.views.open_view_ids().into_iter().collect();
        for removed in before.difference(&after) {
            self.popups.close_children_of(removed);
        }
        Ok(())
    }

    // ===== Views =====

    pub fn show_by_id(&mut self, id: &str) {
        self.views.show_by_id(id);
        if self.modals.is_displayed() {
            self.modals.show_modal();
        }
    }

    pub fn handle_deep_link(&mut self, url: &str) {
        self.views.handle_deep_link(url);
    }

    pub fn send_to_all_views(&self, channel: &str, args: &Value) {
        self.views.send_to_all_views(channel, args);
    }

    pub fn close_view(&mut self, id: &str) -> CoreResult<()> {
        self.views.close_view(id)?;
        self.popups.close_children_of(id);
        Ok(())
    }

    pub fn open_closed_view(&mut self, id: &str, url: Option<&str>) -> CoreResult<()> {
        self.views.open_closed_view(id, url)?;
        self.views.show_by_id(id);
        Ok(())
    }

    pub fn reload_current_view(&mut self) {
        self.views.reload_current_view();
    }

    pub fn go_to_offset_current(&mut self, offset: i32) {
        self.views.go_to_offset_current(offset);
    }

    pub fn set_remote_version(&mut self, server_id: &str, version: &str) {
        self.views.set_remote_version(server_id, version);
    }

    pub fn handle_app_initialized(&mut self, content_id: ContentId) {
        self.views.handle_app_initialized(content_id);
    }

    pub fn handle_login_changed(&mut self, content_id: ContentId, logged_in: bool) {
        self.views.handle_login_changed(content_id, logged_in);
    }

    pub fn handle_browser_history_push(&mut self, content_id: ContentId, path: &str) {
        self.views.handle_browser_history_push(content_id, path);
    }

    /// Focus the displayed modal, else the active view.
    pub fn focus_current(&self) {
        if !self.modals.focus_current() {
            self.views.focus_current_view();
        }
    }

    // ===== Navigation =====

    /// Server a content id acts on behalf of: its view's server, or the server a trusted
    /// window was registered for.
    fn source_server(&self, content_id: ContentId) -> Option<&Server> {
        if let Some(view) = self.views.view_by_content_id(content_id) {
            return Some(view.server());
        }
        let url = self.guard.trusted_window_server(content_id)?;
        find_server_for_url(self.views.servers(), url, false)
    }

    fn policy_context<'a>(&'a self, source_server: Option<&'a Server>) -> NavigationContext<'a> {
        NavigationContext {
            servers: self.views.servers(),
            source_server,
            settings: &self.ctx.settings,
        }
    }

    pub fn will_navigate(&self, content_id: ContentId, url: &str) -> NavigationDecision {
        if let Some(decision) = self.popups.will_navigate(content_id, url) {
            return decision;
        }
        let ctx = self.policy_context(self.source_server(content_id));
        let decision = navigation_policy::will_navigate(
            &ctx,
            url,
            self.guard.is_trusted_window(content_id),
            self.guard.custom_login_in_progress(content_id),
        );
        if decision == NavigationDecision::Deny {
            log::info!("Prevented content {content_id} from navigating to {url}");
        }
        decision
    }

    pub fn did_start_navigation(&mut self, content_id: ContentId, url: &str) {
        if self.popups.is_popup(content_id) {
            return;
        }
        let source = self.source_server(content_id).cloned();
        self.guard
            .did_start_navigation(content_id, source.as_ref(), url);
    }

    pub fn will_redirect(&self, content_id: ContentId, url: &str) -> NavigationDecision {
        self.popups
            .will_redirect(content_id, url)
            .unwrap_or(NavigationDecision::Allow)
    }

    /// Decide a new-window request and perform its side effect.
    pub fn new_window(&mut self, content_id: ContentId, url: &str) -> WindowOpenAction {
        if let Some(action) = self.popups.new_window(content_id, url) {
            return action;
        }
        let verdict = {
            let ctx = self.policy_context(self.source_server(content_id));
            navigation_policy::new_window(&ctx, url)
        };
        log::debug!("New window {url} from content {content_id}: {verdict:?}");

        match verdict {
            NewWindowVerdict::AllowDevTools | NewWindowVerdict::AllowBlankPopup => {
                return WindowOpenAction::Allow;
            }
            NewWindowVerdict::Ignore | NewWindowVerdict::DenyAdminConsole => {}
            NewWindowVerdict::OpenExternal => self.ctx.external_browser.open(url),
            NewWindowVerdict::PromptProtocol { scheme } => {
                self.ctx.protocol_prompt.handle(&scheme, url);
            }
            NewWindowVerdict::DeepLink | NewWindowVerdict::ShowInMainWindow => {
                self.views.handle_deep_link(url);
            }
            NewWindowVerdict::OpenPopup => self.open_popup(content_id, url),
        }
        WindowOpenAction::Deny
    }

    fn open_popup(&mut self, content_id: ContentId, url: &str) {
        let Some(parsed) = parse_url(url) else {
            return;
        };
        let parent_view_id = self
            .views
            .view_by_content_id(content_id)
            .map(|v| v.id().to_string())
            .unwrap_or_default();
        if let Err(e) = self.popups.open_managed(content_id, &parent_view_id, &parsed) {
            e.log(&format!("Failed to open popup for {url}"));
        }
    }

    /// The rendering primitive created an allowed `about:blank` child window.
    pub fn popup_created(
        &mut self,
        parent: ContentId,
        url: &str,
        window: Arc<dyn PopupWindow>,
    ) -> CoreResult<()> {
        let parent_view_id = self
            .views
            .view_by_content_id(parent)
            .map(|v| v.id().to_string())
            .ok_or_else(|| CoreError::PopupError(format!("Unknown parent content {parent}")))?;
        self.popups.register_created(&parent_view_id, url, window);
        Ok(())
    }

    /// Mark an auxiliary host window as trusted for `server_url`.
    pub fn register_trusted_window(&mut self, content_id: ContentId, server_url: Url) {
        log::debug!("Trusted window {content_id} registered for {server_url}");
        self.guard.register_trusted_window(content_id, server_url);
    }

    // ===== Events =====

    pub fn handle_surface_event(&mut self, content_id: ContentId, event: SurfaceEvent) {
        if self.popups.is_popup(content_id) {
            match event {
                SurfaceEvent::RenderProcessGone { reason } => {
                    self.popups.handle_render_process_gone(content_id, reason);
                    self.guard.forget(content_id);
                }
                SurfaceEvent::Closed => {
                    self.popups.handle_closed(content_id);
                    self.guard.forget(content_id);
                }
                _ => {}
            }
            return;
        }
        if matches!(
            event,
            SurfaceEvent::RenderProcessGone { .. } | SurfaceEvent::Closed
        ) {
            self.guard.forget(content_id);
        }
        self.views.handle_surface_event(content_id, event);
    }

    pub fn handle_scheduled(&mut self, event: ScheduledEvent) {
        if self.shut_down {
            return;
        }
        self.views.handle_scheduled(event);
    }

    // ===== Modals =====

    pub fn add_modal(&mut self, key: &str, payload: Value, uncloseable: bool) -> ModalOutcome {
        self.modals.add_modal(key, payload, uncloseable)
    }

    pub fn add_modal_first(&mut self, key: &str, payload: Value, uncloseable: bool) -> ModalOutcome {
        self.modals.add_modal_first(key, payload, uncloseable)
    }

    pub fn resolve_modal(&mut self, key: &str, data: Value) -> CoreResult<()> {
        let emptied = self.modals.resolve(key, data)?;
        self.after_modal_completed(emptied);
        Ok(())
    }

    pub fn reject_modal(&mut self, key: &str, data: Value) -> CoreResult<()> {
        let emptied = self.modals.reject(key, data)?;
        self.after_modal_completed(emptied);
        Ok(())
    }

    pub fn remove_modal(&mut self, key: &str) -> CoreResult<()> {
        let emptied = self.modals.remove_modal(key)?;
        self.after_modal_completed(emptied);
        Ok(())
    }

    fn after_modal_completed(&self, emptied: bool) {
        if emptied {
            self.views.focus_current_view();
        }
    }

    pub fn is_modal_displayed(&self) -> bool {
        self.modals.is_displayed()
    }

    pub fn resize_modal(&self, bounds: Rect) {
        self.modals.resize(bounds);
    }

    /// Tear the session down: close popups, fail pending modals and destroy every view.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        log::info!("Shutting down shell session");
        self.shut_down = true;
        self.popups.close_all();
        self.modals.clear();
        self.views.destroy();
        self.guard.clear();
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.shutdown();
    }
}
