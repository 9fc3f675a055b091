//! View registry: open and closed views, the active view, reconciliation and deep links.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{json, Value};
use url::Url;

use crate::error::{CoreError, CoreResult};
use crate::services::view_load_controller::{LiveView, ViewTransition};
use crate::services::ServiceContext;
use crate::types::{
    channels, ContentId, LiveViewInfo, ScheduledEvent, Server, ServerSnapshot, SurfaceEvent,
    ViewDescriptor, ViewEvent, ViewType,
};
use crate::utils::url::{find_server_for_url, formatted_path, parse_url, strip_server_subpath};
use crate::utils::version::is_at_least;

/// A configured view that is not materialized.
#[derive(Debug, Clone)]
pub struct ClosedView {
    pub server: Server,
    pub descriptor: ViewDescriptor,
}

/// Identity used to recycle views across reloads: normalized server URL + view type.
fn view_identity(server: &Server, view_type: ViewType) -> (String, ViewType) {
    let url = &server.url;
    (
        format!(
            "{}{}",
            url.origin().ascii_serialization(),
            formatted_path(url.path())
        ),
        view_type,
    )
}

/// View type addressed by a server-relative path.
fn view_type_for_path(relative_path: &str) -> ViewType {
    let first = relative_path
        .trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    ViewType::ALL
        .into_iter()
        .find(|view_type| view_type.path_segment() == Some(first.as_str()))
        .unwrap_or(ViewType::Messaging)
}

pub struct ViewManager {
    ctx: Arc<ServiceContext>,
    servers: Vec<Server>,
    views: HashMap<String, LiveView>,
    closed: HashMap<String, ClosedView>,
    current: Option<String>,
    last_active: Option<String>,
    remote_versions: HashMap<String, String>,
    /// Views loading a deep link, shown once the load succeeds
    pending_deep_links: HashSet<String>,
}

impl ViewManager {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            ctx,
            servers: Vec::new(),
            views: HashMap::new(),
            closed: HashMap::new(),
            current: None,
            last_active: None,
            remote_versions: HashMap::new(),
            pending_deep_links: HashSet::new(),
        }
    }

    // ===== Queries =====

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn current_view_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_view(&self) -> Option<&LiveView> {
        self.current.as_ref().and_then(|id| self.views.get(id))
    }

    pub fn view(&self, id: &str) -> Option<&LiveView> {
        self.views.get(id)
    }

    pub fn view_by_content_id(&self, content_id: ContentId) -> Option<&LiveView> {
        self.views.values().find(|v| v.content_id() == content_id)
    }

    fn view_id_by_content_id(&self, content_id: ContentId) -> Option<String> {
        self.view_by_content_id(content_id)
            .map(|v| v.id().to_string())
    }

    pub fn closed_view(&self, id: &str) -> Option<&ClosedView> {
        self.closed.get(id)
    }

    pub fn open_view_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.views.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn closed_view_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.closed.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn views_info(&self) -> Vec<LiveViewInfo> {
        let mut info: Vec<_> = self.views.values().map(LiveView::info).collect();
        info.sort_by(|a, b| a.id.cmp(&b.id));
        info
    }

    pub fn remote_version(&self, server_id: &str) -> Option<&str> {
        self.remote_versions.get(server_id).map(String::as_str)
    }

    // ===== Configuration =====

    /// Startup: materialize every configured server and show the initial view.
    pub fn load_configuration(&mut self, snapshots: Vec<ServerSnapshot>) {
        let mut snapshots = snapshots;
        snapshots.sort_by_key(|s| s.server.order);
        self.servers = snapshots.iter().map(|s| s.server.clone()).collect();
        for snapshot in &snapshots {
            self.load_server(snapshot);
        }
        self.show_initial();
    }

    /// Materialize the open views of one server and record its closed ones.
    pub fn load_server(&mut self, snapshot: &ServerSnapshot) {
        if !self.servers.iter().any(|s| s.id == snapshot.server.id) {
            self.servers.push(snapshot.server.clone());
            self.servers.sort_by_key(|s| s.order);
        }
        for descriptor in &snapshot.views {
            if descriptor.is_open {
                self.materialize(snapshot.server.clone(), descriptor.clone(), None);
            } else {
                self.closed.insert(
                    descriptor.id.clone(),
                    ClosedView {
                        server: snapshot.server.clone(),
                        descriptor: descriptor.clone(),
                    },
                );
            }
        }
    }

    fn materialize(&mut self, server: Server, descriptor: ViewDescriptor, url: Option<&str>) {
        let surface = match self.ctx.surface_factory.create(&server, &descriptor) {
            Ok(surface) => surface,
            Err(e) => {
                log::error!("Failed to create surface for {}: {e}", descriptor.id);
                return;
            }
        };
        let id = descriptor.id.clone();
        let mut view = LiveView::new(Arc::clone(&self.ctx), server, descriptor, surface);
        view.load(url);
        if let Some(mut previous) = self.views.insert(id.clone(), view) {
            log::warn!("Replacing live view {id}");
            previous.destroy();
        }
    }

    /// Reconcile live views against a fresh configuration, recycling matching views.
    pub fn reload_configuration(&mut self, snapshots: Vec<ServerSnapshot>) {
        let mut snapshots = snapshots;
        snapshots.sort_by_key(|s| s.server.order);

        let mut old_views = std::mem::take(&mut self.views);
        let previous_current = self
            .current
            .take()
            .and_then(|id| old_views.get(&id))
            .map(|v| view_identity(v.server(), v.descriptor().view_type));

        let mut views = HashMap::new();
        let mut closed = HashMap::new();
        let mut to_create = Vec::new();

        for snapshot in &snapshots {
            for descriptor in &snapshot.views {
                let identity = view_identity(&snapshot.server, descriptor.view_type);
                let recycled_key = old_views
                    .iter()
                    .find(|(_, v)| view_identity(v.server(), v.descriptor().view_type) == identity)
                    .map(|(k, _)| k.clone());
                let recycled = recycled_key.and_then(|k| old_views.remove(&k));

                if descriptor.is_open {
                    if let Some(mut view) = recycled {
                        log::debug!("Recycling view {} as {}", view.id(), descriptor.id);
                        view.refresh(snapshot.server.clone(), descriptor.clone());
                        views.insert(descriptor.id.clone(), view);
                    } else {
                        to_create.push((snapshot.server.clone(), descriptor.clone()));
                    }
                } else {
                    if let Some(mut view) = recycled {
                        view.destroy();
                    }
                    closed.insert(
                        descriptor.id.clone(),
                        ClosedView {
                            server: snapshot.server.clone(),
                            descriptor: descriptor.clone(),
                        },
                    );
                }
            }
        }

        for (id, mut view) in old_views {
            log::info!("Destroying removed view {id}");
            view.destroy();
        }

        self.servers = snapshots.iter().map(|s| s.server.clone()).collect();
        self.views = views;
        self.closed = closed;
        for (server, descriptor) in to_create {
            self.materialize(server, descriptor, None);
        }

        let server_ids: HashSet<_> = self.servers.iter().map(|s| s.id.clone()).collect();
        self.remote_versions.retain(|id, _| server_ids.contains(id));
        let views = &self.views;
        self.pending_deep_links.retain(|id| views.contains_key(id));
        if self.last_active.as_ref().is_some_and(|id| !views.contains_key(id)) {
            self.last_active = None;
        }

        let kept = previous_current.and_then(|identity| {
            self.views
                .values()
                .find(|v| view_identity(v.server(), v.descriptor().view_type) == identity)
                .map(|v| v.id().to_string())
        });
        match kept {
            Some(id) => {
                self.current = Some(id.clone());
                self.last_active = Some(id);
            }
            None => self.show_initial(),
        }
    }

    /// Show the last active view, else the first view of the first server.
    pub fn show_initial(&mut self) {
        let candidate = self
            .last_active
            .clone()
            .filter(|id| self.views.contains_key(id))
            .or_else(|| {
                self.servers.iter().find_map(|server| {
                    self.views
                        .values()
                        .filter(|v| v.server().id == server.id)
                        .min_by_key(|v| v.descriptor().order)
                        .map(|v| v.id().to_string())
                })
            });
        match candidate {
            Some(id) => self.show_by_id(&id),
            None => {
                log::info!("No view to show");
                self.current = None;
            }
        }
    }

    // ===== Presentation =====

    /// Make `id` the active view. Errored views become active without being shown.
    pub fn show_by_id(&mut self, id: &str) {
        let Some(target) = self.views.get(id) else {
            log::warn!("Cannot show unknown view {id}");
            return;
        };
        if target.is_visible() {
            return;
        }

        for view in self.views.values_mut().filter(|v| v.id() != id) {
            view.hide();
        }

        self.current = Some(id.to_string());
        self.last_active = Some(id.to_string());

        let Some(view) = self.views.get_mut(id) else {
            return;
        };
        if view.is_errored() {
            log::info!("View {id} is in error state, not showing it");
        } else {
            view.show();
            if view.needs_loading_screen() {
                self.ctx.loading_screen.show();
            }
        }
        let server_id = view.server().id.clone();
        self.ctx.emit(ViewEvent::ActiveViewChanged {
            server_id,
            view_id: id.to_string(),
        });
    }

    pub fn focus_current_view(&self) {
        if let Some(view) = self.current_view() {
            view.focus();
        }
    }

    pub fn reload_current_view(&mut self) {
        if let Some(view) = self.current.as_ref().and_then(|id| self.views.get_mut(id)) {
            view.reload(None);
        }
    }

    pub fn go_to_offset_current(&mut self, offset: i32) {
        if let Some(view) = self.current.as_ref().and_then(|id| self.views.get_mut(id)) {
            view.go_to_offset(offset);
        }
    }

    /// Broadcast a message to every live view.
    pub fn send_to_all_views(&self, channel: &str, args: &Value) {
        for view in self.views.values().filter(|v| !v.is_destroyed()) {
            view.send(channel, args.clone());
        }
    }

    // ===== Open / close =====

    /// Materialize a closed view, optionally at a specific URL.
    pub fn open_closed_view(&mut self, id: &str, url: Option<&str>) -> CoreResult<()> {
        let closed = self
            .closed
            .remove(id)
            .ok_or_else(|| CoreError::ViewNotFound(id.to_string()))?;
        let mut descriptor = closed.descriptor;
        descriptor.is_open = true;
        log::info!("Opening closed view {id}");
        self.materialize(closed.server, descriptor, url);
        if self.views.contains_key(id) {
            Ok(())
        } else {
            Err(CoreError::SurfaceError {
                view_id: id.to_string(),
                message: "surface could not be created".to_string(),
            })
        }
    }

    /// Close an open view, keeping it configured.
    pub fn close_view(&mut self, id: &str) -> CoreResult<()> {
        let view = self
            .views
            .get(id)
            .ok_or_else(|| CoreError::ViewNotFound(id.to_string()))?;
        if !view.descriptor().view_type.can_close() {
            return Err(CoreError::ValidationError(format!(
                "View {id} cannot be closed"
            )));
        }
        let Some(mut view) = self.views.remove(id) else {
            return Err(CoreError::ViewNotFound(id.to_string()));
        };
        let server = view.server().clone();
        let mut descriptor = view.descriptor().clone();
        view.destroy();
        descriptor.is_open = false;
        self.closed.insert(
            id.to_string(),
            ClosedView {
                server: server.clone(),
                descriptor,
            },
        );
        self.pending_deep_links.remove(id);

        if self.current.as_deref() == Some(id) {
            self.current = None;
            let fallback = self
                .views
                .values()
                .find(|v| v.server().id == server.id && v.descriptor().view_type == ViewType::Messaging)
                .map(|v| v.id().to_string());
            match fallback {
                Some(fallback) => self.show_by_id(&fallback),
                None => {
                    self.last_active = None;
                    self.show_initial();
                }
            }
        }
        Ok(())
    }

    // ===== Deep links =====

    /// Route an external URL to the matching server and view.
    pub fn handle_deep_link(&mut self, url: &str) {
        let Some(parsed) = parse_url(url) else {
            log::warn!("Invalid deep link: {url}");
            self.ctx.deep_link_errors.show_no_matching_server(url);
            return;
        };
        let Some(server) = find_server_for_url(&self.servers, &parsed, true).cloned() else {
            log::info!("No server matches deep link {url}");
            self.ctx.deep_link_errors.show_no_matching_server(url);
            return;
        };

        let mut target: Url = server.url.clone();
        target.set_path(parsed.path());
        target.set_query(parsed.query());
        target.set_fragment(None);

        let relative = strip_server_subpath(&server.url, target.path());
        let Some(view_id) = self.view_id_for(&server, view_type_for_path(&relative)) else {
            log::warn!("Server {} has no view for deep link {url}", server.id);
            self.ctx.deep_link_errors.show_no_matching_server(url);
            return;
        };

        if self.closed.contains_key(&view_id) {
            if let Err(e) = self.open_closed_view(&view_id, Some(target.as_str())) {
                log::error!("Failed to open view {view_id} for deep link: {e}");
                return;
            }
            self.pending_deep_links.insert(view_id);
            return;
        }

        let min_version = self.ctx.settings.history_push_min_version();
        let modern = is_at_least(self.remote_version(&server.id), &min_version);
        let Some(view) = self.views.get_mut(&view_id) else {
            return;
        };
        if view.is_ready() && modern {
            let mut path = relative;
            if let Some(query) = target.query() {
                path.push('?');
                path.push_str(query);
            }
            log::info!("Delivering deep link to {view_id} as history push: {path}");
            view.send(channels::BROWSER_HISTORY_PUSH, json!(path));
            self.show_by_id(&view_id);
        } else {
            view.reset_loading_status();
            view.load(Some(target.as_str()));
            self.pending_deep_links.insert(view_id);
        }
    }

    /// Open or closed view id of the given type, falling back to the messaging view.
    fn view_id_for(&self, server: &Server, view_type: ViewType) -> Option<String> {
        let find = |view_type: ViewType| {
            self.views
                .values()
                .map(LiveView::descriptor)
                .chain(self.closed.values().map(|c| &c.descriptor))
                .find(|d| d.server_id == server.id && d.view_type == view_type)
                .map(|d| d.id.clone())
        };
        find(view_type).or_else(|| find(ViewType::Messaging))
    }

    // ===== Events from views =====

    /// Deliver a scheduler completion to its view and react to the outcome.
    pub fn handle_scheduled(&mut self, event: ScheduledEvent) {
        let view_id = match &event {
            ScheduledEvent::LoadFinished { view_id, .. }
            | ScheduledEvent::RetryDue { view_id, .. }
            | ScheduledEvent::AppReadyTimeout { view_id, .. } => view_id.clone(),
        };
        let Some(view) = self.views.get_mut(&view_id) else {
            log::debug!("Dropping scheduled event for removed view {view_id}");
            return;
        };
        let transition = view.handle_scheduled(event);
        self.apply_transition(&view_id, transition);
    }

    fn apply_transition(&mut self, view_id: &str, transition: ViewTransition) {
        let is_current = self.current.as_deref() == Some(view_id);
        match transition {
            ViewTransition::None => {}
            ViewTransition::LoadSucceeded => {
                if self.pending_deep_links.remove(view_id) || is_current {
                    self.show_by_id(view_id);
                }
            }
            ViewTransition::LoadscreenEnd => {
                if is_current {
                    self.show_by_id(view_id);
                    self.ctx.loading_screen.fade();
                }
            }
            ViewTransition::LoadFailed => {
                if self.pending_deep_links.remove(view_id) {
                    log::error!("Deep link failed to load in view {view_id}");
                }
                self.ctx.loading_screen.fade();
                if is_current {
                    if let Some(view) = self.views.get_mut(view_id) {
                        view.hide();
                    }
                }
            }
        }
    }

    /// The hosted app signalled it finished starting.
    pub fn handle_app_initialized(&mut self, content_id: ContentId) {
        let Some(id) = self.view_id_by_content_id(content_id) else {
            return;
        };
        if let Some(view) = self.views.get_mut(&id) {
            view.set_initialized(false);
        }
        if self.current.as_deref() == Some(id.as_str()) {
            self.ctx.loading_screen.fade();
        }
    }

    /// Login state changed in one view; every view of that server follows.
    pub fn handle_login_changed(&mut self, content_id: ContentId, logged_in: bool) {
        let Some(server_id) = self
            .view_by_content_id(content_id)
            .map(|v| v.server().id.clone())
        else {
            return;
        };
        for view in self
            .views
            .values_mut()
            .filter(|v| v.server().id == server_id)
        {
            view.on_login(logged_in);
        }
    }

    /// SPA navigation reported by the hosted app.
    pub fn handle_browser_history_push(&mut self, content_id: ContentId, path: &str) {
        let Some(source) = self.view_by_content_id(content_id) else {
            return;
        };
        let source_id = source.id().to_string();
        let server = source.server().clone();
        let clean_path = strip_server_subpath(&server.url, path);
        let target_type = view_type_for_path(&clean_path);

        let candidate = self
            .views
            .values()
            .find(|v| {
                v.server().id == server.id
                    && v.descriptor().view_type == target_type
                    && v.id() != source_id
            })
            .filter(|v| v.is_logged_in() || clean_path == "/")
            .map(|v| v.id().to_string());

        // Without a switch the push stays with the view that issued it.
        let redirected = candidate.is_some();
        let target_id = candidate.unwrap_or(source_id);
        if redirected {
            self.show_by_id(&target_id);
        }

        // A plugin view navigating to "/" must not force the messaging view back to root.
        let suppress = redirected && target_type == ViewType::Messaging && clean_path == "/";
        if !suppress {
            if let Some(view) = self.views.get(&target_id) {
                view.send(channels::BROWSER_HISTORY_PUSH, json!(clean_path));
                view.update_history_state();
            }
        }
    }

    pub fn handle_surface_event(&mut self, content_id: ContentId, event: SurfaceEvent) {
        let Some(id) = self.view_id_by_content_id(content_id) else {
            return;
        };
        let Some(view) = self.views.get_mut(&id) else {
            return;
        };
        match event {
            SurfaceEvent::DidNavigate { url } => view.handle_did_navigate(&url),
            SurfaceEvent::TitleUpdated { title } => view.handle_title_updated(&title),
            SurfaceEvent::FaviconUpdated { favicons } => view.handle_favicon_updated(&favicons),
            SurfaceEvent::UpdateTargetUrl { url } => view.handle_update_target_url(&url),
            SurfaceEvent::RenderProcessGone { reason } => {
                log::error!("Renderer of view {id} gone: {reason:?}, reloading");
                view.reload(None);
            }
            SurfaceEvent::Closed => {
                log::warn!("Surface of view {id} closed underneath the registry");
            }
        }
    }

    pub fn set_remote_version(&mut self, server_id: &str, version: &str) {
        self.remote_versions
            .insert(server_id.to_string(), version.to_string());
    }

    /// Destroy every view. The registry stays usable for a later `load_configuration`.
    pub fn destroy(&mut self) {
        self.current = None;
        for (_, mut view) in self.views.drain() {
            view.destroy();
        }
        self.closed.clear();
        self.pending_deep_links.clear();
    }
}
