//! 测试辅助模块
//!
//! 提供 mock 实现和便捷的测试工厂方法。

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use url::Url;

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::traits::{
    DeepLinkErrorPresenter, ExternalBrowserOpener, HostWindow, LoadingScreenPresenter,
    ModalPresenter, PopupWindow, PopupWindowFactory, ProtocolConfirmationPrompt,
    RenderingSurface, Scheduler, SurfaceFactory, ViewEventSink,
};
use crate::types::{
    ContentId, NavigationError, Rect, ScheduledEvent, Server, ServerSnapshot, ShellSettings,
    TimerId, ViewDescriptor, ViewEvent,
};

// ===== MockSurface =====

pub struct MockSurface {
    content_id: ContentId,
    pub loads: Mutex<Vec<String>>,
    load_results: Mutex<VecDeque<Result<(), NavigationError>>>,
    default_result: Mutex<Result<(), NavigationError>>,
    current_url: Mutex<Option<String>>,
    title: Mutex<String>,
    can_go: AtomicBool,
    /// 如果 Some，go_to_offset 时返回此错误
    go_error: Mutex<Option<String>>,
    pub offsets: Mutex<Vec<i32>>,
    pub sent: Mutex<Vec<(String, Value)>>,
    destroyed: AtomicBool,
    pub destroy_calls: AtomicUsize,
    pub focus_calls: AtomicUsize,
}

impl MockSurface {
    pub fn new(content_id: ContentId) -> Self {
        Self {
            content_id,
            loads: Mutex::new(Vec::new()),
            load_results: Mutex::new(VecDeque::new()),
            default_result: Mutex::new(Ok(())),
            current_url: Mutex::new(None),
            title: Mutex::new(String::new()),
            can_go: AtomicBool::new(false),
            go_error: Mutex::new(None),
            offsets: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            destroy_calls: AtomicUsize::new(0),
            focus_calls: AtomicUsize::new(0),
        }
    }

    /// Queue the result of the next `load_url` call
    pub fn push_load_result(&self, result: Result<(), NavigationError>) {
        self.load_results.lock().unwrap().push_back(result);
    }

    /// Result used once the queue is empty
    pub fn set_default_result(&self, result: Result<(), NavigationError>) {
        *self.default_result.lock().unwrap() = result;
    }

    pub fn set_current_url(&self, url: &str) {
        *self.current_url.lock().unwrap() = Some(url.to_string());
    }

    pub fn set_title(&self, title: &str) {
        *self.title.lock().unwrap() = title.to_string();
    }

    pub fn set_can_go(&self, can_go: bool) {
        self.can_go.store(can_go, Ordering::SeqCst);
    }

    pub fn set_go_error(&self, err: Option<String>) {
        *self.go_error.lock().unwrap() = err;
    }

    pub fn load_count(&self) -> usize {
        self.loads.lock().unwrap().len()
    }

    pub fn sent_on(&self, channel: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

#[async_trait]
impl RenderingSurface for MockSurface {
    fn content_id(&self) -> ContentId {
        self.content_id
    }

    async fn load_url(&self, url: &Url) -> Result<(), NavigationError> {
        self.loads.lock().unwrap().push(url.to_string());
        let queued = self.load_results.lock().unwrap().pop_front();
        let result = queued.unwrap_or_else(|| self.default_result.lock().unwrap().clone());
        if result.is_ok() {
            self.set_current_url(url.as_str());
        }
        result
    }

    fn current_url(&self) -> Option<String> {
        self.current_url.lock().unwrap().clone()
    }

    fn can_go_to_offset(&self, _offset: i32) -> bool {
        self.can_go.load(Ordering::SeqCst)
    }

    fn go_to_offset(&self, offset: i32) -> CoreResult<()> {
        if let Some(ref msg) = *self.go_error.lock().unwrap() {
            return Err(CoreError::HistoryNavigation(msg.clone()));
        }
        self.offsets.lock().unwrap().push(offset);
        Ok(())
    }

    fn focus(&self) {
        self.focus_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn title(&self) -> String {
        self.title.lock().unwrap().clone()
    }

    fn send(&self, channel: &str, args: Value) {
        self.sent.lock().unwrap().push((channel.to_string(), args));
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn destroy(&self) {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

// ===== MockSurfaceFactory =====

pub struct MockSurfaceFactory {
    next_id: AtomicU64,
    created: Mutex<Vec<(String, Arc<MockSurface>)>>,
    default_result: Mutex<Result<(), NavigationError>>,
    /// 这些视图 ID 创建时返回错误
    fail_for: Mutex<HashSet<String>>,
}

impl MockSurfaceFactory {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            created: Mutex::new(Vec::new()),
            default_result: Mutex::new(Ok(())),
            fail_for: Mutex::new(HashSet::new()),
        }
    }

    /// Default load result for surfaces created from now on
    pub fn set_default_result(&self, result: Result<(), NavigationError>) {
        *self.default_result.lock().unwrap() = result;
    }

    pub fn fail_for(&self, view_id: &str) {
        self.fail_for.lock().unwrap().insert(view_id.to_string());
    }

    /// Most recently created surface for a view
    pub fn surface(&self, view_id: &str) -> Arc<MockSurface> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id == view_id)
            .map(|(_, s)| Arc::clone(s))
            .unwrap()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl SurfaceFactory for MockSurfaceFactory {
    fn create(
        &self,
        _server: &Server,
        descriptor: &ViewDescriptor,
    ) -> CoreResult<Arc<dyn RenderingSurface>> {
        if self.fail_for.lock().unwrap().contains(&descriptor.id) {
            return Err(CoreError::SurfaceError {
                view_id: descriptor.id.clone(),
                message: "injected".to_string(),
            });
        }
        let surface = Arc::new(MockSurface::new(
            self.next_id.fetch_add(1, Ordering::SeqCst),
        ));
        surface.set_default_result(self.default_result.lock().unwrap().clone());
        self.created
            .lock()
            .unwrap()
            .push((descriptor.id.clone(), Arc::clone(&surface)));
        Ok(surface)
    }
}

// ===== MockHostWindow =====

pub struct MockHostWindow {
    pub attached: Mutex<Vec<ContentId>>,
    pub bounds_calls: AtomicUsize,
}

impl MockHostWindow {
    pub fn new() -> Self {
        Self {
            attached: Mutex::new(Vec::new()),
            bounds_calls: AtomicUsize::new(0),
        }
    }

    pub fn attached(&self) -> Vec<ContentId> {
        self.attached.lock().unwrap().clone()
    }
}

impl HostWindow for MockHostWindow {
    fn add_view(&self, content_id: ContentId) {
        let mut attached = self.attached.lock().unwrap();
        if !attached.contains(&content_id) {
            attached.push(content_id);
        }
    }

    fn remove_view(&self, content_id: ContentId) {
        self.attached.lock().unwrap().retain(|id| *id != content_id);
    }

    fn set_bounds(&self, _content_id: ContentId, _bounds: Rect) {
        self.bounds_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn bounds(&self) -> Rect {
        Rect {
            x: 0,
            y: 40,
            width: 1000,
            height: 700,
        }
    }
}

// ===== Presenters =====

#[derive(Default)]
pub struct MockLoadingScreen {
    pub shows: AtomicUsize,
    pub fades: AtomicUsize,
}

impl LoadingScreenPresenter for MockLoadingScreen {
    fn show(&self) {
        self.shows.fetch_add(1, Ordering::SeqCst);
    }

    fn fade(&self) {
        self.fades.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockProtocolPrompt {
    pub calls: Mutex<Vec<(String, String)>>,
}

impl ProtocolConfirmationPrompt for MockProtocolPrompt {
    fn handle(&self, scheme: &str, url: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((scheme.to_string(), url.to_string()));
    }
}

#[derive(Default)]
pub struct MockExternalBrowser {
    pub opened: Mutex<Vec<String>>,
}

impl ExternalBrowserOpener for MockExternalBrowser {
    fn open(&self, url: &str) {
        self.opened.lock().unwrap().push(url.to_string());
    }
}

#[derive(Default)]
pub struct MockDeepLinkErrors {
    pub no_match: Mutex<Vec<String>>,
}

impl DeepLinkErrorPresenter for MockDeepLinkErrors {
    fn show_no_matching_server(&self, url: &str) {
        self.no_match.lock().unwrap().push(url.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalCall {
    Show(String),
    Hide(String),
    Focus(String),
    Bounds(String),
}

#[derive(Default)]
pub struct MockModalPresenter {
    pub calls: Mutex<Vec<ModalCall>>,
}

impl MockModalPresenter {
    pub fn take_calls(&self) -> Vec<ModalCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl ModalPresenter for MockModalPresenter {
    fn show(&self, key: &str, _payload: &Value, _uncloseable: bool) {
        self.calls.lock().unwrap().push(ModalCall::Show(key.to_string()));
    }

    fn hide(&self, key: &str) {
        self.calls.lock().unwrap().push(ModalCall::Hide(key.to_string()));
    }

    fn focus(&self, key: &str) {
        self.calls.lock().unwrap().push(ModalCall::Focus(key.to_string()));
    }

    fn set_bounds(&self, key: &str, _bounds: Rect) {
        self.calls
            .lock()
            .unwrap()
            .push(ModalCall::Bounds(key.to_string()));
    }
}

// ===== RecordingEventSink =====

#[derive(Default)]
pub struct RecordingEventSink {
    pub events: Mutex<Vec<ViewEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&ViewEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl ViewEventSink for RecordingEventSink {
    fn emit(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ===== ManualScheduler =====

/// Scheduler that only runs work when the test asks it to.
pub struct ManualScheduler {
    next_id: AtomicU64,
    timers: Mutex<Vec<(TimerId, Duration, ScheduledEvent)>>,
    pub cancelled: Mutex<Vec<TimerId>>,
    tasks: Mutex<Vec<BoxFuture<'static, ScheduledEvent>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            timers: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Run every spawned task to completion, in spawn order
    pub fn run_tasks(&self) -> Vec<ScheduledEvent> {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        tasks.into_iter().map(futures::executor::block_on).collect()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Pending (not cancelled, not fired) timers
    pub fn pending(&self) -> Vec<(TimerId, Duration, ScheduledEvent)> {
        self.timers.lock().unwrap().clone()
    }

    /// Fire and remove every pending timer whose event matches
    pub fn fire_matching(&self, pred: impl Fn(&ScheduledEvent) -> bool) -> Vec<ScheduledEvent> {
        let mut timers = self.timers.lock().unwrap();
        let (fired, kept): (Vec<_>, Vec<_>) = timers.drain(..).partition(|(_, _, e)| pred(e));
        *timers = kept;
        fired.into_iter().map(|(_, _, e)| e).collect()
    }

    pub fn fire_retries(&self) -> Vec<ScheduledEvent> {
        self.fire_matching(|e| matches!(e, ScheduledEvent::RetryDue { .. }))
    }

    pub fn fire_ready_timeouts(&self) -> Vec<ScheduledEvent> {
        self.fire_matching(|e| matches!(e, ScheduledEvent::AppReadyTimeout { .. }))
    }

    pub fn pending_retries(&self) -> usize {
        self.pending()
            .iter()
            .filter(|(_, _, e)| matches!(e, ScheduledEvent::RetryDue { .. }))
            .count()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, event: ScheduledEvent) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.timers.lock().unwrap().push((id, delay, event));
        id
    }

    fn cancel(&self, timer: TimerId) {
        self.timers.lock().unwrap().retain(|(id, _, _)| *id != timer);
        self.cancelled.lock().unwrap().push(timer);
    }

    fn spawn(&self, task: BoxFuture<'static, ScheduledEvent>) {
        self.tasks.lock().unwrap().push(task);
    }
}

// ===== MockPopupWindow =====

pub struct MockPopupWindow {
    content_id: ContentId,
    pub loads: Mutex<Vec<String>>,
    closed: AtomicBool,
    pub close_calls: AtomicUsize,
    pub focus_calls: AtomicUsize,
    pub detach_calls: AtomicUsize,
    /// 如果 Some，detach_listeners 时返回此错误
    detach_error: Mutex<Option<String>>,
    pub context_menu_disposed: AtomicBool,
}

impl MockPopupWindow {
    pub fn new(content_id: ContentId) -> Self {
        Self {
            content_id,
            loads: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            focus_calls: AtomicUsize::new(0),
            detach_calls: AtomicUsize::new(0),
            detach_error: Mutex::new(None),
            context_menu_disposed: AtomicBool::new(false),
        }
    }

    pub fn set_detach_error(&self, err: Option<String>) {
        *self.detach_error.lock().unwrap() = err;
    }
}

impl PopupWindow for MockPopupWindow {
    fn content_id(&self) -> ContentId {
        self.content_id
    }

    fn load_url(&self, url: &Url) {
        self.loads.lock().unwrap().push(url.to_string());
    }

    fn current_url(&self) -> Option<String> {
        self.loads.lock().unwrap().last().cloned()
    }

    fn show(&self) {}

    fn focus(&self) {
        self.focus_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn detach_listeners(&self) -> CoreResult<()> {
        self.detach_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref msg) = *self.detach_error.lock().unwrap() {
            return Err(CoreError::PopupError(msg.clone()));
        }
        Ok(())
    }

    fn dispose_context_menu(&self) {
        self.context_menu_disposed.store(true, Ordering::SeqCst);
    }
}

// ===== MockPopupFactory =====

pub struct MockPopupFactory {
    next_id: AtomicU64,
    pub created: Mutex<Vec<Arc<MockPopupWindow>>>,
    fail: AtomicBool,
}

impl MockPopupFactory {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            created: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<Arc<MockPopupWindow>> {
        self.created.lock().unwrap().clone()
    }
}

impl PopupWindowFactory for MockPopupFactory {
    fn create(&self, _parent: ContentId, _url: &Url) -> CoreResult<Arc<dyn PopupWindow>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::PopupError("injected".to_string()));
        }
        let window = Arc::new(MockPopupWindow::new(
            self.next_id.fetch_add(1, Ordering::SeqCst),
        ));
        self.created.lock().unwrap().push(Arc::clone(&window));
        Ok(window)
    }
}

// ===== 工厂方法 =====

/// All mocks behind one `ServiceContext`.
pub struct TestHarness {
    pub ctx: Arc<ServiceContext>,
    pub window: Arc<MockHostWindow>,
    pub surfaces: Arc<MockSurfaceFactory>,
    pub popups: Arc<MockPopupFactory>,
    pub loading: Arc<MockLoadingScreen>,
    pub protocol: Arc<MockProtocolPrompt>,
    pub external: Arc<MockExternalBrowser>,
    pub deep_link_errors: Arc<MockDeepLinkErrors>,
    pub modals: Arc<MockModalPresenter>,
    pub events: Arc<RecordingEventSink>,
    pub scheduler: Arc<ManualScheduler>,
}

pub fn create_test_harness() -> TestHarness {
    create_test_harness_with(ShellSettings::default())
}

pub fn create_test_harness_with(settings: ShellSettings) -> TestHarness {
    let window = Arc::new(MockHostWindow::new());
    let surfaces = Arc::new(MockSurfaceFactory::new());
    let popups = Arc::new(MockPopupFactory::new());
    let loading = Arc::new(MockLoadingScreen::default());
    let protocol = Arc::new(MockProtocolPrompt::default());
    let external = Arc::new(MockExternalBrowser::default());
    let deep_link_errors = Arc::new(MockDeepLinkErrors::default());
    let modals = Arc::new(MockModalPresenter::default());
    let events = Arc::new(RecordingEventSink::default());
    let scheduler = Arc::new(ManualScheduler::new());

    let ctx = Arc::new(ServiceContext {
        host_window: window.clone(),
        surface_factory: surfaces.clone(),
        popup_factory: popups.clone(),
        loading_screen: loading.clone(),
        protocol_prompt: protocol.clone(),
        external_browser: external.clone(),
        deep_link_errors: deep_link_errors.clone(),
        modal_presenter: modals.clone(),
        event_sink: events.clone(),
        scheduler: scheduler.clone(),
        settings,
    });

    TestHarness {
        ctx,
        window,
        surfaces,
        popups,
        loading,
        protocol,
        external,
        deep_link_errors,
        modals,
        events,
        scheduler,
    }
}

pub fn test_server(id: &str, url: &str, order: usize) -> Server {
    Server::new(id, id, url, order).unwrap()
}

/// Server with every view type open
pub fn test_snapshot(id: &str, url: &str, order: usize) -> ServerSnapshot {
    ServerSnapshot::with_default_views(test_server(id, url, order))
}

pub fn transient_error() -> NavigationError {
    NavigationError::new("ERR_CONNECTION_REFUSED", "connection refused")
}

pub fn cert_error() -> NavigationError {
    NavigationError::new("ERR_CERT_AUTHORITY_INVALID", "untrusted certificate")
}

pub fn aborted_error() -> NavigationError {
    NavigationError::new("ERR_ABORTED", "navigation aborted")
}
