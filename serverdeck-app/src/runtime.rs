//! Single-task actor that owns the `Shell`.
//!
//! Host calls, timer expiries and navigation completions are all funneled through one
//! mpsc channel, so the core only ever runs on the actor task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use serverdeck_core::error::{CoreError, CoreResult};
use serverdeck_core::traits::{PopupWindow, Scheduler};
use serverdeck_core::types::{
    ContentId, LiveViewInfo, ModalOutcome, NavigationDecision, Rect, ScheduledEvent,
    ServerSnapshot, SurfaceEvent, TimerId, WindowOpenAction,
};
use serverdeck_core::Shell;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use url::Url;

/// Commands accepted by the runtime.
pub enum ShellCommand {
    LoadConfiguration {
        snapshots: Vec<ServerSnapshot>,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    ReloadConfiguration {
        snapshots: Vec<ServerSnapshot>,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    ShowById {
        id: String,
    },
    HandleDeepLink {
        url: String,
    },
    SendToAllViews {
        channel: String,
        args: Value,
    },
    CloseView {
        id: String,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    OpenClosedView {
        id: String,
        url: Option<String>,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    ReloadCurrentView,
    GoToOffset {
        offset: i32,
    },
    SetRemoteVersion {
        server_id: String,
        version: String,
    },
    WillNavigate {
        content_id: ContentId,
        url: String,
        reply: oneshot::Sender<NavigationDecision>,
    },
    DidStartNavigation {
        content_id: ContentId,
        url: String,
    },
    WillRedirect {
        content_id: ContentId,
        url: String,
        reply: oneshot::Sender<NavigationDecision>,
    },
    NewWindow {
        content_id: ContentId,
        url: String,
        reply: oneshot::Sender<WindowOpenAction>,
    },
    PopupCreated {
        parent: ContentId,
        url: String,
        window: Arc<dyn PopupWindow>,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    RegisterTrustedWindow {
        content_id: ContentId,
        server_url: Url,
    },
    SurfaceEvent {
        content_id: ContentId,
        event: SurfaceEvent,
    },
    AppInitialized {
        content_id: ContentId,
    },
    LoginChanged {
        content_id: ContentId,
        logged_in: bool,
    },
    BrowserHistoryPush {
        content_id: ContentId,
        path: String,
    },
    AddModal {
        key: String,
        payload: Value,
        uncloseable: bool,
        first: bool,
        reply: oneshot::Sender<ModalOutcome>,
    },
    ResolveModal {
        key: String,
        data: Value,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    RejectModal {
        key: String,
        data: Value,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    RemoveModal {
        key: String,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    IsModalDisplayed {
        reply: oneshot::Sender<bool>,
    },
    ResizeModal {
        bounds: Rect,
    },
    FocusCurrent,
    ViewsInfo {
        reply: oneshot::Sender<Vec<LiveViewInfo>>,
    },
    CurrentViewId {
        reply: oneshot::Sender<Option<String>>,
    },
    /// Timer expiry or navigation completion from the scheduler
    Scheduled(ScheduledEvent),
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ===== Scheduler =====

/// Tokio-backed `Scheduler` that feeds completions back into the runtime channel.
///
/// Holds only a weak sender, so dropping every `ShellHandle` still ends the actor.
pub struct TokioScheduler {
    handle: Handle,
    tx: mpsc::WeakUnboundedSender<ShellCommand>,
    next_id: AtomicU64,
    timers: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

impl TokioScheduler {
    pub fn new(handle: Handle, tx: &mpsc::UnboundedSender<ShellCommand>) -> Self {
        Self {
            handle,
            tx: tx.downgrade(),
            next_id: AtomicU64::new(1),
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn pending_timers(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn deliver(tx: &mpsc::WeakUnboundedSender<ShellCommand>, event: ScheduledEvent) {
    match tx.upgrade() {
        Some(tx) => {
            if tx.send(ShellCommand::Scheduled(event)).is_err() {
                log::debug!("Shell runtime stopped, dropping scheduled event");
            }
        }
        None => log::debug!("Shell runtime gone, dropping scheduled event"),
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, event: ScheduledEvent) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let tx = self.tx.clone();
        let timers = Arc::clone(&self.timers);

        // The lock is held across spawn so the task cannot remove its entry before it exists.
        let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            deliver(&tx, event);
        });
        guard.insert(id, task.abort_handle());
        id
    }

    fn cancel(&self, timer: TimerId) {
        let removed = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&timer);
        if let Some(handle) = removed {
            handle.abort();
        }
    }

    fn spawn(&self, task: BoxFuture<'static, ScheduledEvent>) {
        let tx = self.tx.clone();
        self.handle.spawn(async move {
            let event = task.await;
            deliver(&tx, event);
        });
    }
}

// ===== Runtime =====

/// Owns the `Shell` and processes commands one at a time.
pub struct ShellRuntime {
    shell: Shell,
    rx: mpsc::UnboundedReceiver<ShellCommand>,
}

/// Replies are best effort: a caller that stopped waiting is not an error.
fn reply<T>(sender: oneshot::Sender<T>, value: T) {
    let _ = sender.send(value);
}

/// Like `reply`, logging a failed result first.
fn reply_logged<T>(
    sender: oneshot::Sender<CoreResult<T>>,
    operation: &str,
    result: CoreResult<T>,
) {
    if let Err(e) = &result {
        e.log(operation);
    }
    reply(sender, result);
}

impl ShellRuntime {
    pub fn new(shell: Shell, rx: mpsc::UnboundedReceiver<ShellCommand>) -> Self {
        Self { shell, rx }
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        log::info!("Shell runtime started");
        while let Some(command) = self.rx.recv().await {
            match command {
                ShellCommand::Shutdown { reply: sender } => {
                    self.shell.shutdown();
                    reply(sender, ());
                    break;
                }
                command => self.dispatch(command),
            }
        }
        self.shell.shutdown();
        log::info!("Shell runtime stopped");
    }

    fn dispatch(&mut self, command: ShellCommand) {
        let shell = &mut self.shell;
        match command {
            ShellCommand::LoadConfiguration { snapshots, reply: r } => {
                reply_logged(r, "load_configuration", shell.load_configuration(snapshots));
            }
            ShellCommand::ReloadConfiguration { snapshots, reply: r } => {
                reply_logged(r, "reload_configuration", shell.reload_configuration(snapshots));
            }
            ShellCommand::ShowById { id } => shell.show_by_id(&id),
            ShellCommand::HandleDeepLink { url } => shell.handle_deep_link(&url),
            ShellCommand::SendToAllViews { channel, args } => {
                shell.send_to_all_views(&channel, &args);
            }
            ShellCommand::CloseView { id, reply: r } => {
                reply_logged(r, "close_view", shell.close_view(&id));
            }
            ShellCommand::OpenClosedView { id, url, reply: r } => {
                reply_logged(r, "open_closed_view", shell.open_closed_view(&id, url.as_deref()));
            }
            ShellCommand::ReloadCurrentView => shell.reload_current_view(),
            ShellCommand::GoToOffset { offset } => shell.go_to_offset_current(offset),
            ShellCommand::SetRemoteVersion { server_id, version } => {
                shell.set_remote_version(&server_id, &version);
            }
            ShellCommand::WillNavigate {
                content_id,
                url,
                reply: r,
            } => reply(r, shell.will_navigate(content_id, &url)),
            ShellCommand::DidStartNavigation { content_id, url } => {
                shell.did_start_navigation(content_id, &url);
            }
            ShellCommand::WillRedirect {
                content_id,
                url,
                reply: r,
            } => reply(r, shell.will_redirect(content_id, &url)),
            ShellCommand::NewWindow {
                content_id,
                url,
                reply: r,
            } => reply(r, shell.new_window(content_id, &url)),
            ShellCommand::PopupCreated {
                parent,
                url,
                window,
                reply: r,
            } => reply_logged(r, "popup_created", shell.popup_created(parent, &url, window)),
            ShellCommand::RegisterTrustedWindow {
                content_id,
                server_url,
            } => shell.register_trusted_window(content_id, server_url),
            ShellCommand::SurfaceEvent { content_id, event } => {
                shell.handle_surface_event(content_id, event);
            }
            ShellCommand::AppInitialized { content_id } => {
                shell.handle_app_initialized(content_id);
            }
            ShellCommand::LoginChanged {
                content_id,
                logged_in,
            } => shell.handle_login_changed(content_id, logged_in),
            ShellCommand::BrowserHistoryPush { content_id, path } => {
                shell.handle_browser_history_push(content_id, &path);
            }
            ShellCommand::AddModal {
                key,
                payload,
                uncloseable,
                first,
                reply: r,
            } => {
                let outcome = if first {
                    shell.add_modal_first(&key, payload, uncloseable)
                } else {
                    shell.add_modal(&key, payload, uncloseable)
                };
                reply(r, outcome);
            }
            ShellCommand::ResolveModal { key, data, reply: r } => {
                reply_logged(r, "resolve_modal", shell.resolve_modal(&key, data));
            }
            ShellCommand::RejectModal { key, data, reply: r } => {
                reply_logged(r, "reject_modal", shell.reject_modal(&key, data));
            }
            ShellCommand::RemoveModal { key, reply: r } => {
                reply_logged(r, "remove_modal", shell.remove_modal(&key));
            }
            ShellCommand::IsModalDisplayed { reply: r } => reply(r, shell.is_modal_displayed()),
            ShellCommand::ResizeModal { bounds } => shell.resize_modal(bounds),
            ShellCommand::FocusCurrent => shell.focus_current(),
            ShellCommand::ViewsInfo { reply: r } => reply(r, shell.views_info()),
            ShellCommand::CurrentViewId { reply: r } => reply(r, shell.current_view_id()),
            ShellCommand::Scheduled(event) => shell.handle_scheduled(event),
            ShellCommand::Shutdown { reply: r } => {
                shell.shutdown();
                reply(r, ());
            }
        }
    }
}

// ===== Handle =====

/// Cloneable async front door to a running shell.
#[derive(Clone)]
pub struct ShellHandle {
    tx: mpsc::UnboundedSender<ShellCommand>,
}

impl ShellHandle {
    pub fn new(tx: mpsc::UnboundedSender<ShellCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, command: ShellCommand) -> CoreResult<()> {
        self.tx.send(command).map_err(|_| CoreError::RuntimeClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ShellCommand,
    ) -> CoreResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx))?;
        rx.await.map_err(|_| CoreError::RuntimeClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    // ===== Configuration & views =====

    pub async fn load_configuration(&self, snapshots: Vec<ServerSnapshot>) -> CoreResult<()> {
        self.request(|reply| ShellCommand::LoadConfiguration { snapshots, reply })
            .await?
    }

    pub async fn reload_configuration(&self, snapshots: Vec<ServerSnapshot>) -> CoreResult<()> {
        self.request(|reply| ShellCommand::ReloadConfiguration { snapshots, reply })
            .await?
    }

    pub fn show_by_id(&self, id: &str) -> CoreResult<()> {
        self.send(ShellCommand::ShowById { id: id.to_string() })
    }

    pub fn handle_deep_link(&self, url: &str) -> CoreResult<()> {
        self.send(ShellCommand::HandleDeepLink {
            url: url.to_string(),
        })
    }

    pub fn send_to_all_views(&self, channel: &str, args: Value) -> CoreResult<()> {
        self.send(ShellCommand::SendToAllViews {
            channel: channel.to_string(),
            args,
        })
    }

    pub async fn close_view(&self, id: &str) -> CoreResult<()> {
        let id = id.to_string();
        self.request(|reply| ShellCommand::CloseView { id, reply })
            .await?
    }

    pub async fn open_closed_view(&self, id: &str, url: Option<&str>) -> CoreResult<()> {
        let id = id.to_string();
        let url = url.map(str::to_string);
        self.request(|reply| ShellCommand::OpenClosedView { id, url, reply })
            .await?
    }

    pub fn reload_current_view(&self) -> CoreResult<()> {
        self.send(ShellCommand::ReloadCurrentView)
    }

    pub fn go_to_offset(&self, offset: i32) -> CoreResult<()> {
        self.send(ShellCommand::GoToOffset { offset })
    }

    pub fn set_remote_version(&self, server_id: &str, version: &str) -> CoreResult<()> {
        self.send(ShellCommand::SetRemoteVersion {
            server_id: server_id.to_string(),
            version: version.to_string(),
        })
    }

    pub async fn views_info(&self) -> CoreResult<Vec<LiveViewInfo>> {
        self.request(|reply| ShellCommand::ViewsInfo { reply }).await
    }

    pub async fn current_view_id(&self) -> CoreResult<Option<String>> {
        self.request(|reply| ShellCommand::CurrentViewId { reply })
            .await
    }

    // ===== Navigation =====

    pub async fn will_navigate(
        &self,
        content_id: ContentId,
        url: &str,
    ) -> CoreResult<NavigationDecision> {
        let url = url.to_string();
        self.request(|reply| ShellCommand::WillNavigate {
            content_id,
            url,
            reply,
        })
        .await
    }

    pub fn did_start_navigation(&self, content_id: ContentId, url: &str) -> CoreResult<()> {
        self.send(ShellCommand::DidStartNavigation {
            content_id,
            url: url.to_string(),
        })
    }

    pub async fn will_redirect(
        &self,
        content_id: ContentId,
        url: &str,
    ) -> CoreResult<NavigationDecision> {
        let url = url.to_string();
        self.request(|reply| ShellCommand::WillRedirect {
            content_id,
            url,
            reply,
        })
        .await
    }

    pub async fn new_window(
        &self,
        content_id: ContentId,
        url: &str,
    ) -> CoreResult<WindowOpenAction> {
        let url = url.to_string();
        self.request(|reply| ShellCommand::NewWindow {
            content_id,
            url,
            reply,
        })
        .await
    }

    pub async fn popup_created(
        &self,
        parent: ContentId,
        url: &str,
        window: Arc<dyn PopupWindow>,
    ) -> CoreResult<()> {
        let url = url.to_string();
        self.request(|reply| ShellCommand::PopupCreated {
            parent,
            url,
            window,
            reply,
        })
        .await?
    }

    pub fn register_trusted_window(
        &self,
        content_id: ContentId,
        server_url: Url,
    ) -> CoreResult<()> {
        self.send(ShellCommand::RegisterTrustedWindow {
            content_id,
            server_url,
        })
    }

    // ===== Surface events =====

    pub fn surface_event(&self, content_id: ContentId, event: SurfaceEvent) -> CoreResult<()> {
        self.send(ShellCommand::SurfaceEvent { content_id, event })
    }

    pub fn app_initialized(&self, content_id: ContentId) -> CoreResult<()> {
        self.send(ShellCommand::AppInitialized { content_id })
    }

    pub fn login_changed(&self, content_id: ContentId, logged_in: bool) -> CoreResult<()> {
        self.send(ShellCommand::LoginChanged {
            content_id,
            logged_in,
        })
    }

    pub fn browser_history_push(&self, content_id: ContentId, path: &str) -> CoreResult<()> {
        self.send(ShellCommand::BrowserHistoryPush {
            content_id,
            path: path.to_string(),
        })
    }

    // ===== Modals =====

    /// Queue a modal and return its shared outcome.
    ///
    /// # Arguments
    /// * `key` - Deduplication key
    /// * `payload` - Data handed to the modal presenter
    /// * `uncloseable` - Whether the user may dismiss the modal
    pub async fn add_modal(
        &self,
        key: &str,
        payload: Value,
        uncloseable: bool,
    ) -> CoreResult<ModalOutcome> {
        self.enqueue_modal(key, payload, uncloseable, false).await
    }

    /// Queue a modal ahead of the displayed one.
    pub async fn add_modal_first(
        &self,
        key: &str,
        payload: Value,
        uncloseable: bool,
    ) -> CoreResult<ModalOutcome> {
        self.enqueue_modal(key, payload, uncloseable, true).await
    }

    async fn enqueue_modal(
        &self,
        key: &str,
        payload: Value,
        uncloseable: bool,
        first: bool,
    ) -> CoreResult<ModalOutcome> {
        let key = key.to_string();
        self.request(|reply| ShellCommand::AddModal {
            key,
            payload,
            uncloseable,
            first,
            reply,
        })
        .await
    }

    pub async fn resolve_modal(&self, key: &str, data: Value) -> CoreResult<()> {
        let key = key.to_string();
        self.request(|reply| ShellCommand::ResolveModal { key, data, reply })
            .await?
    }

    pub async fn reject_modal(&self, key: &str, data: Value) -> CoreResult<()> {
        let key = key.to_string();
        self.request(|reply| ShellCommand::RejectModal { key, data, reply })
            .await?
    }

    pub async fn remove_modal(&self, key: &str) -> CoreResult<()> {
        let key = key.to_string();
        self.request(|reply| ShellCommand::RemoveModal { key, reply })
            .await?
    }

    pub async fn is_modal_displayed(&self) -> CoreResult<bool> {
        self.request(|reply| ShellCommand::IsModalDisplayed { reply })
            .await
    }

    pub fn resize_modal(&self, bounds: Rect) -> CoreResult<()> {
        self.send(ShellCommand::ResizeModal { bounds })
    }

    pub fn focus_current(&self) -> CoreResult<()> {
        self.send(ShellCommand::FocusCurrent)
    }

    /// Stop the runtime and tear down every view. Calling it again is a no-op.
    pub async fn shutdown(&self) -> CoreResult<()> {
        match self.request(|reply| ShellCommand::Shutdown { reply }).await {
            Ok(()) | Err(CoreError::RuntimeClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
