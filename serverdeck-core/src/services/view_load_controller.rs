//! Per-view load/retry state machine and the live view that drives it.
//!
//! `ViewLoadController` holds the pure state (status, retry budget, generation, timers);
//! `LiveView` pairs it with a rendering surface and performs the side effects.

use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use serde_json::json;
use url::Url;

use crate::services::ServiceContext;
use crate::traits::RenderingSurface;
use crate::types::{
    channels, BaselineReadPolicy, ContentId, LiveViewInfo, LoadAttempt, LoadStatus,
    NavigationError, NavigationErrorKind, ScheduledEvent, Server, ShellSettings, TimerId,
    ViewDescriptor, ViewEvent,
};
use crate::utils::url::{formatted_path, is_internal_url, is_trusted_url, parse_url};

/// What a failed attempt leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Aborted navigation, nothing changes
    Ignore,
    /// Certificate failure, `ERROR` without retry
    Fatal,
    /// Foreground retry scheduled
    Retry,
    /// Foreground retries exhausted, `ERROR` and background mode entered
    Exhausted,
    /// Silent background retry
    Background,
}

/// Load/retry/error state of one view.
#[derive(Debug)]
pub struct ViewLoadController {
    status: LoadStatus,
    retries_left: u32,
    max_retries: u32,
    generation: u64,
    background: bool,
    retry_timer: Option<TimerId>,
    ready_timer: Option<TimerId>,
    baseline_policy: BaselineReadPolicy,
    baseline_taken: bool,
}

impl ViewLoadController {
    pub fn new(settings: &ShellSettings) -> Self {
        Self {
            status: LoadStatus::Loading,
            retries_left: settings.max_retries,
            max_retries: settings.max_retries,
            generation: 0,
            background: false,
            retry_timer: None,
            ready_timer: None,
            baseline_policy: settings.baseline_read,
            baseline_taken: false,
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Starts a new attempt; older continuations become stale.
    pub fn begin_attempt(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Invalidates every outstanding continuation without starting a new attempt.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn on_failure(&mut self, attempt: LoadAttempt, error: &NavigationError) -> FailureAction {
        let kind = error.kind();
        // Only a first attempt may be aborted in place; retries always reschedule.
        if kind == NavigationErrorKind::Aborted && attempt == LoadAttempt::Initial {
            return FailureAction::Ignore;
        }
        if kind == NavigationErrorKind::Certificate {
            self.status = LoadStatus::Error;
            self.background = false;
            return FailureAction::Fatal;
        }
        if attempt == LoadAttempt::Background || self.background {
            return FailureAction::Background;
        }
        if self.retries_left > 0 {
            self.retries_left -= 1;
            FailureAction::Retry
        } else {
            self.status = LoadStatus::Error;
            self.background = true;
            FailureAction::Exhausted
        }
    }

    /// Records a success; returns whether the title/unread baseline should be read.
    pub fn on_success(&mut self) -> bool {
        self.status = LoadStatus::WaitingForAppReady;
        self.retries_left = self.max_retries;
        self.background = false;
        let read_baseline = match self.baseline_policy {
            BaselineReadPolicy::EverySuccess => true,
            BaselineReadPolicy::FirstSuccessOnly => !self.baseline_taken,
        };
        self.baseline_taken = true;
        read_baseline
    }

    pub fn set_ready(&mut self) {
        self.status = LoadStatus::Ready;
    }

    /// Back to `LOADING` with a full retry budget; returns false when already loading.
    pub fn reset(&mut self) -> bool {
        if self.status == LoadStatus::Loading {
            return false;
        }
        self.status = LoadStatus::Loading;
        self.retries_left = self.max_retries;
        self.background = false;
        true
    }

    pub fn needs_loading_screen(&self) -> bool {
        !matches!(self.status, LoadStatus::Ready | LoadStatus::Error)
    }

    pub fn replace_retry_timer(&mut self, timer: Option<TimerId>) -> Option<TimerId> {
        std::mem::replace(&mut self.retry_timer, timer)
    }

    pub fn replace_ready_timer(&mut self, timer: Option<TimerId>) -> Option<TimerId> {
        std::mem::replace(&mut self.ready_timer, timer)
    }
}

/// Registry-level consequence of a view event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTransition {
    None,
    LoadSucceeded,
    LoadFailed,
    /// The ready ceiling expired and the view was forced to `READY`
    LoadscreenEnd,
}

/// A view descriptor materialized onto a rendering surface.
pub struct LiveView {
    ctx: Arc<ServiceContext>,
    server: Server,
    descriptor: ViewDescriptor,
    surface: Arc<dyn RenderingSurface>,
    controller: ViewLoadController,
    /// URL of the most recent attempt, reused by retries
    attempt_url: Option<Url>,
    is_visible: bool,
    is_logged_in: bool,
    is_at_root: bool,
    destroyed: bool,
}

impl LiveView {
    pub fn new(
        ctx: Arc<ServiceContext>,
        server: Server,
        descriptor: ViewDescriptor,
        surface: Arc<dyn RenderingSurface>,
    ) -> Self {
        let controller = ViewLoadController::new(&ctx.settings);
        Self {
            ctx,
            server,
            descriptor,
            surface,
            controller,
            attempt_url: None,
            is_visible: false,
            is_logged_in: false,
            is_at_root: true,
            destroyed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn descriptor(&self) -> &ViewDescriptor {
        &self.descriptor
    }

    pub fn content_id(&self) -> ContentId {
        self.surface.content_id()
    }

    pub fn surface(&self) -> &Arc<dyn RenderingSurface> {
        &self.surface
    }

    pub fn status(&self) -> LoadStatus {
        self.controller.status()
    }

    pub fn controller(&self) -> &ViewLoadController {
        &self.controller
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    pub fn is_ready(&self) -> bool {
        self.status() == LoadStatus::Ready
    }

    pub fn is_errored(&self) -> bool {
        self.status() == LoadStatus::Error
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn root_url(&self) -> Url {
        self.descriptor.root_url(&self.server)
    }

    pub fn current_url(&self) -> Option<String> {
        if self.destroyed || self.surface.is_destroyed() {
            return None;
        }
        self.surface.current_url()
    }

    pub fn needs_loading_screen(&self) -> bool {
        self.controller.needs_loading_screen()
    }

    pub fn info(&self) -> LiveViewInfo {
        LiveViewInfo {
            id: self.descriptor.id.clone(),
            server_id: self.server.id.clone(),
            status: self.status(),
            is_visible: self.is_visible,
            is_logged_in: self.is_logged_in,
            is_at_root: self.is_at_root,
            current_url: self.current_url(),
        }
    }

    /// Refresh server and descriptor data when the view is recycled by a reload.
    pub fn refresh(&mut self, server: Server, descriptor: ViewDescriptor) {
        self.server = server;
        self.descriptor = descriptor;
    }

    // ===== Loading =====

    /// Navigate to `url`, or to the root URL when `url` is missing or not a web URL.
    pub fn load(&mut self, url: Option<&str>) {
        if self.destroyed {
            return;
        }
        let target = url
            .and_then(parse_url)
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or_else(|| self.root_url());
        log::info!("[{}] Loading {}", self.id(), target);
        self.start_attempt(target, LoadAttempt::Initial);
    }

    fn start_attempt(&mut self, url: Url, attempt: LoadAttempt) {
        if let Some(timer) = self.controller.replace_retry_timer(None) {
            self.ctx.scheduler.cancel(timer);
        }
        let generation = self.controller.begin_attempt();
        self.attempt_url = Some(url.clone());

        let surface = Arc::clone(&self.surface);
        let view_id = self.descriptor.id.clone();
        self.ctx.scheduler.spawn(
            async move {
                let result = surface.load_url(&url).await;
                ScheduledEvent::LoadFinished {
                    view_id,
                    generation,
                    attempt,
                    url: url.to_string(),
                    result,
                }
            }
            .boxed(),
        );
    }

    /// Reset to `LOADING` unless already there, dropping any pending retry.
    pub fn reset_loading_status(&mut self) {
        if self.controller.reset() {
            if let Some(timer) = self.controller.replace_retry_timer(None) {
                self.ctx.scheduler.cancel(timer);
            }
        }
    }

    pub fn reload(&mut self, url: Option<&str>) {
        self.reset_loading_status();
        self.load(url);
    }

    /// Route a scheduler completion to this view.
    pub fn handle_scheduled(&mut self, event: ScheduledEvent) -> ViewTransition {
        if self.destroyed {
            return ViewTransition::None;
        }
        match event {
            ScheduledEvent::LoadFinished {
                generation,
                attempt,
                url,
                result,
                ..
            } => {
                if !self.controller.is_current(generation) {
                    log::debug!("[{}] Dropping stale load result for {url}", self.id());
                    return ViewTransition::None;
                }
                match result {
                    Ok(()) => self.finish_load_success(&url),
                    Err(error) => self.handle_load_failure(attempt, &url, &error),
                }
            }
            ScheduledEvent::RetryDue { generation, .. } => {
                if self.controller.is_current(generation) {
                    self.controller.replace_retry_timer(None);
                    self.retry();
                }
                ViewTransition::None
            }
            ScheduledEvent::AppReadyTimeout { generation, .. } => {
                if !self.controller.is_current(generation) {
                    return ViewTransition::None;
                }
                self.set_initialized(true)
            }
        }
    }

    fn retry(&mut self) {
        let url = self.attempt_url.clone().unwrap_or_else(|| self.root_url());
        let attempt = if self.controller.is_background() {
            LoadAttempt::Background
        } else {
            LoadAttempt::Retry
        };
        log::info!("[{}] Retrying {url} ({attempt:?})", self.id());
        self.start_attempt(url, attempt);
    }

    fn schedule_retry(&mut self) {
        let timer = self.ctx.scheduler.schedule(
            self.ctx.settings.retry_interval(),
            ScheduledEvent::RetryDue {
                view_id: self.descriptor.id.clone(),
                generation: self.controller.generation(),
            },
        );
        if let Some(previous) = self.controller.replace_retry_timer(Some(timer)) {
            self.ctx.scheduler.cancel(previous);
        }
    }

    fn handle_load_failure(
        &mut self,
        attempt: LoadAttempt,
        url: &str,
        error: &NavigationError,
    ) -> ViewTransition {
        match self.controller.on_failure(attempt, error) {
            FailureAction::Ignore => {
                log::info!("[{}] Navigation to {url} aborted: {error}", self.id());
                ViewTransition::None
            }
            FailureAction::Fatal => {
                log::error!("[{}] Certificate error loading {url}: {error}", self.id());
                self.emit_load_failed(url, error);
                ViewTransition::LoadFailed
            }
            FailureAction::Retry => {
                log::warn!(
                    "[{}] Failed to load {url}: {error}, {} retries left",
                    self.id(),
                    self.controller.retries_left()
                );
                self.schedule_retry();
                let interval = chrono::Duration::from_std(self.ctx.settings.retry_interval())
                    .unwrap_or_else(|_| chrono::Duration::zero());
                self.ctx.emit(ViewEvent::LoadRetryScheduled {
                    view_id: self.descriptor.id.clone(),
                    next_attempt_at: Utc::now() + interval,
                    error: error.to_string(),
                    url: url.to_string(),
                });
                ViewTransition::None
            }
            FailureAction::Exhausted => {
                log::error!(
                    "[{}] Giving up on {url} after {} retries: {error}",
                    self.id(),
                    self.ctx.settings.max_retries
                );
                self.emit_load_failed(url, error);
                self.schedule_retry();
                ViewTransition::LoadFailed
            }
            FailureAction::Background => {
                log::debug!("[{}] Background retry of {url} failed: {error}", self.id());
                self.schedule_retry();
                ViewTransition::None
            }
        }
    }

    fn emit_load_failed(&self, url: &str, error: &NavigationError) {
        self.ctx.emit(ViewEvent::LoadFailed {
            view_id: self.descriptor.id.clone(),
            error: error.to_string(),
            url: url.to_string(),
        });
    }

    fn finish_load_success(&mut self, url: &str) -> ViewTransition {
        log::info!("[{}] Loaded {url}", self.id());
        let read_baseline = self.controller.on_success();
        self.ctx.emit(ViewEvent::LoadSuccess {
            view_id: self.descriptor.id.clone(),
            url: url.to_string(),
        });
        if read_baseline {
            let title = self.surface.title();
            self.handle_title_updated(&title);
        }
        self.handle_did_navigate(url);

        let timer = self.ctx.scheduler.schedule(
            self.ctx.settings.app_ready_timeout(),
            ScheduledEvent::AppReadyTimeout {
                view_id: self.descriptor.id.clone(),
                generation: self.controller.generation(),
            },
        );
        if let Some(previous) = self.controller.replace_ready_timer(Some(timer)) {
            self.ctx.scheduler.cancel(previous);
        }
        ViewTransition::LoadSucceeded
    }

    /// The hosted application finished its own startup, or the ready ceiling expired.
    pub fn set_initialized(&mut self, timed_out: bool) -> ViewTransition {
        if self.destroyed {
            return ViewTransition::None;
        }
        self.controller.set_ready();
        if let Some(timer) = self.controller.replace_ready_timer(None) {
            self.ctx.scheduler.cancel(timer);
        }
        if timed_out {
            log::info!("[{}] App did not signal readiness in time", self.id());
            self.ctx.emit(ViewEvent::LoadscreenEnd {
                view_id: self.descriptor.id.clone(),
            });
            return ViewTransition::LoadscreenEnd;
        }
        ViewTransition::None
    }

    // ===== Navigation =====

    /// Navigate history by `offset`, falling back to a full reload on failure.
    pub fn go_to_offset(&mut self, offset: i32) {
        if self.destroyed || !self.surface.can_go_to_offset(offset) {
            return;
        }
        match self.surface.go_to_offset(offset) {
            Ok(()) => self.update_history_state(),
            Err(e) => {
                log::error!("[{}] History navigation failed, reloading: {e}", self.id());
                self.reload(None);
            }
        }
    }

    pub fn on_login(&mut self, logged_in: bool) {
        if self.is_logged_in == logged_in {
            return;
        }
        self.is_logged_in = logged_in;
        if !logged_in {
            return;
        }
        let root = self.root_url();
        let under_root = self
            .current_url()
            .as_deref()
            .and_then(parse_url)
            .is_some_and(|current| {
                current.origin() == root.origin()
                    && formatted_path(current.path()).starts_with(&formatted_path(root.path()))
            });
        if !under_root {
            self.reload(None);
        }
    }

    pub fn handle_did_navigate(&mut self, url: &str) {
        let Some(parsed) = parse_url(url) else {
            return;
        };
        let root = self.root_url();
        self.is_at_root = parsed.origin() == root.origin()
            && formatted_path(parsed.path()) == formatted_path(root.path());
        self.ctx.emit(ViewEvent::BackBarToggled {
            view_id: self.descriptor.id.clone(),
            visible: !is_trusted_url(&parsed, &self.server.url),
        });
        self.update_history_state();
    }

    pub fn update_history_state(&self) {
        if self.destroyed {
            return;
        }
        self.send(
            channels::BROWSER_HISTORY_BUTTON,
            json!({
                "canGoBack": self.surface.can_go_to_offset(-1),
                "canGoForward": self.surface.can_go_to_offset(1),
            }),
        );
    }

    pub fn handle_title_updated(&self, title: &str) {
        let mentions = parse_mention_count(title);
        self.ctx.emit(ViewEvent::MentionsUpdated {
            view_id: self.descriptor.id.clone(),
            mentions,
        });
    }

    pub fn handle_favicon_updated(&self, favicons: &[String]) {
        self.send(
            channels::IS_UNREAD,
            json!({ "favicon": favicons.first(), "viewId": self.descriptor.id }),
        );
    }

    pub fn handle_update_target_url(&self, url: &str) {
        let internal = parse_url(url).is_some_and(|target| is_internal_url(&target, &self.server.url));
        self.ctx.emit(ViewEvent::UpdateTargetUrl {
            view_id: self.descriptor.id.clone(),
            url: (!internal && !url.is_empty()).then(|| url.to_string()),
        });
    }

    // ===== Presentation =====

    pub fn show(&mut self) {
        if self.destroyed || self.is_visible {
            return;
        }
        self.is_visible = true;
        let content_id = self.content_id();
        let window = &self.ctx.host_window;
        window.add_view(content_id);
        window.set_bounds(content_id, window.bounds());
        if self.is_ready() {
            self.surface.focus();
        }
    }

    pub fn hide(&mut self) {
        if !self.is_visible {
            return;
        }
        self.is_visible = false;
        self.ctx.host_window.remove_view(self.content_id());
    }

    pub fn focus(&self) {
        if !self.destroyed && !self.surface.is_destroyed() {
            self.surface.focus();
        }
    }

    pub fn send(&self, channel: &str, args: serde_json::Value) {
        if self.destroyed || self.surface.is_destroyed() {
            return;
        }
        self.surface.send(channel, args);
    }

    /// Cancel timers, detach from the window and release the surface. Safe to repeat.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        for timer in [
            self.controller.replace_retry_timer(None),
            self.controller.replace_ready_timer(None),
        ]
        .into_iter()
        .flatten()
        {
            self.ctx.scheduler.cancel(timer);
        }
        self.controller.invalidate();
        self.ctx.host_window.remove_view(self.content_id());
        self.is_visible = false;
        self.destroyed = true;
        if !self.surface.is_destroyed() {
            self.surface.destroy();
        }
        log::debug!("[{}] Destroyed", self.id());
    }
}

/// Mention count from a `(N) Title` style document title.
fn parse_mention_count(title: &str) -> u32 {
    title
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .and_then(|(count, _)| count.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        aborted_error, cert_error, create_test_harness, create_test_harness_with, test_server,
        transient_error, MockSurface, TestHarness,
    };
    use crate::types::{ViewType, ShellSettings};

    fn create_test_view(h: &TestHarness) -> (LiveView, Arc<MockSurface>) {
        let server = test_server("srv", "https://chat.example.com", 0);
        let descriptor = ViewDescriptor::new(&server, ViewType::Messaging, true, 0);
        let surface = Arc::new(MockSurface::new(7));
        let view = LiveView::new(Arc::clone(&h.ctx), server, descriptor, surface.clone());
        (view, surface)
    }

    fn run(h: &TestHarness, view: &mut LiveView) -> Vec<ViewTransition> {
        h.scheduler
            .run_tasks()
            .into_iter()
            .map(|e| view.handle_scheduled(e))
            .collect()
    }

    fn retry(h: &TestHarness, view: &mut LiveView) -> Vec<ViewTransition> {
        for e in h.scheduler.fire_retries() {
            view.handle_scheduled(e);
        }
        run(h, view)
    }

    fn load_failed_count(h: &TestHarness) -> usize {
        h.events.count(|e| matches!(e, ViewEvent::LoadFailed { .. }))
    }

    #[test]
    fn load_success_waits_for_app_then_times_out_to_ready() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);

        view.load(None);
        assert_eq!(view.status(), LoadStatus::Loading);
        assert_eq!(run(&h, &mut view), vec![ViewTransition::LoadSucceeded]);
        assert_eq!(surface.loads.lock().unwrap().as_slice(), ["https://chat.example.com/"]);
        assert_eq!(view.status(), LoadStatus::WaitingForAppReady);
        assert!(view.needs_loading_screen());

        let timeouts = h.scheduler.fire_ready_timeouts();
        assert_eq!(timeouts.len(), 1);
        let transition = view.handle_scheduled(timeouts[0].clone());
        assert_eq!(transition, ViewTransition::LoadscreenEnd);
        assert!(view.is_ready());
        assert_eq!(
            h.events.count(|e| matches!(e, ViewEvent::LoadscreenEnd { .. })),
            1
        );
    }

    #[test]
    fn app_initialized_cancels_ready_ceiling() {
        let h = create_test_harness();
        let (mut view, _) = create_test_view(&h);
        view.load(None);
        run(&h, &mut view);

        assert_eq!(view.set_initialized(false), ViewTransition::None);
        assert!(view.is_ready());
        assert!(h.scheduler.fire_ready_timeouts().is_empty());
        assert_eq!(
            h.events.count(|e| matches!(e, ViewEvent::LoadscreenEnd { .. })),
            0
        );
    }

    #[test]
    fn invalid_url_falls_back_to_root() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        view.load(Some("javascript:alert(1)"));
        run(&h, &mut view);
        assert_eq!(surface.loads.lock().unwrap()[0], "https://chat.example.com/");
    }

    #[test]
    fn retry_exhaustion_emits_one_load_failed_then_retries_silently() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.set_default_result(Err(transient_error()));

        view.load(None);
        run(&h, &mut view);
        assert_eq!(view.status(), LoadStatus::Loading);
        assert_eq!(
            h.events.count(|e| matches!(e, ViewEvent::LoadRetryScheduled { .. })),
            1
        );

        // Three foreground retries
        for _ in 0..2 {
            retry(&h, &mut view);
            assert_eq!(view.status(), LoadStatus::Loading);
            assert_eq!(load_failed_count(&h), 0);
        }
        let transitions = retry(&h, &mut view);
        assert_eq!(transitions, vec![ViewTransition::LoadFailed]);
        assert!(view.is_errored());
        assert!(view.controller().is_background());
        assert_eq!(load_failed_count(&h), 1);
        assert_eq!(surface.load_count(), 4);

        // Background retries stay silent
        for _ in 0..3 {
            assert_eq!(h.scheduler.pending_retries(), 1);
            retry(&h, &mut view);
        }
        assert_eq!(load_failed_count(&h), 1);
        assert_eq!(surface.load_count(), 7);

        // A background success leaves error mode
        surface.set_default_result(Ok(()));
        let transitions = retry(&h, &mut view);
        assert_eq!(transitions, vec![ViewTransition::LoadSucceeded]);
        assert_eq!(view.status(), LoadStatus::WaitingForAppReady);
        assert!(!view.controller().is_background());
        assert_eq!(view.controller().retries_left(), 3);
        assert_eq!(h.scheduler.pending_retries(), 0);
    }

    #[test]
    fn certificate_error_short_circuits_to_error() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.push_load_result(Err(cert_error()));

        view.load(None);
        assert_eq!(run(&h, &mut view), vec![ViewTransition::LoadFailed]);
        assert!(view.is_errored());
        assert_eq!(h.scheduler.pending_retries(), 0);
        assert_eq!(load_failed_count(&h), 1);
        assert!(!view.needs_loading_screen());
    }

    #[test]
    fn certificate_error_in_background_stops_retrying() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.set_default_result(Err(transient_error()));

        view.load(None);
        run(&h, &mut view);
        for _ in 0..3 {
            retry(&h, &mut view);
        }
        assert!(view.controller().is_background());
        assert_eq!(h.scheduler.pending_retries(), 1);

        surface.push_load_result(Err(cert_error()));
        assert_eq!(retry(&h, &mut view), vec![ViewTransition::LoadFailed]);
        assert!(view.is_errored());
        assert!(!view.controller().is_background());
        assert_eq!(h.scheduler.pending_retries(), 0);
    }

    #[test]
    fn aborted_retry_still_reschedules() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.push_load_result(Err(transient_error()));
        surface.push_load_result(Err(aborted_error()));

        view.load(None);
        run(&h, &mut view);
        assert_eq!(h.scheduler.pending_retries(), 1);

        assert_eq!(retry(&h, &mut view), vec![ViewTransition::None]);
        assert_eq!(view.status(), LoadStatus::Loading);
        assert_eq!(h.scheduler.pending_retries(), 1);
        assert_eq!(view.controller().retries_left(), 1);

        assert_eq!(retry(&h, &mut view), vec![ViewTransition::LoadSucceeded]);
    }

    #[test]
    fn aborted_error_changes_nothing() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.push_load_result(Err(aborted_error()));

        let before_status = view.status();
        let before_retries = view.controller().retries_left();
        view.load(None);
        assert_eq!(run(&h, &mut view), vec![ViewTransition::None]);
        assert_eq!(view.status(), before_status);
        assert_eq!(view.controller().retries_left(), before_retries);
        assert_eq!(h.scheduler.pending_retries(), 0);
        assert!(h.events.events().is_empty());
    }

    #[test]
    fn superseded_load_result_is_dropped() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.push_load_result(Err(transient_error()));

        view.load(Some("https://chat.example.com/first"));
        view.load(Some("https://chat.example.com/second"));
        let transitions = run(&h, &mut view);
        assert_eq!(
            transitions,
            vec![ViewTransition::None, ViewTransition::LoadSucceeded]
        );
        assert_eq!(h.scheduler.pending_retries(), 0);
    }

    #[test]
    fn destroy_cancels_timers_and_ignores_late_results() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.set_default_result(Err(transient_error()));
        view.load(None);
        run(&h, &mut view);
        assert_eq!(h.scheduler.pending_retries(), 1);

        view.show();
        view.destroy();
        assert_eq!(h.scheduler.pending_retries(), 0);
        assert!(surface.is_destroyed());
        assert!(h.window.attached().is_empty());

        // A second destroy is a no-op
        view.destroy();
        assert_eq!(
            surface.destroy_calls.load(std::sync::atomic::Ordering::SeqCst),
            1
        );

        view.load(None);
        assert_eq!(h.scheduler.task_count(), 0);
    }

    #[test]
    fn reload_resets_retry_budget() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.push_load_result(Err(cert_error()));
        view.load(None);
        run(&h, &mut view);
        assert!(view.is_errored());

        view.reload(None);
        assert_eq!(view.status(), LoadStatus::Loading);
        assert_eq!(run(&h, &mut view), vec![ViewTransition::LoadSucceeded]);
    }

    #[test]
    fn go_to_offset_falls_back_to_reload() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);

        view.go_to_offset(-1);
        assert!(surface.offsets.lock().unwrap().is_empty());

        surface.set_can_go(true);
        view.go_to_offset(-1);
        assert_eq!(surface.offsets.lock().unwrap().as_slice(), [-1]);

        surface.set_go_error(Some("boom".to_string()));
        view.go_to_offset(1);
        assert_eq!(h.scheduler.task_count(), 1);
    }

    #[test]
    fn baseline_read_first_success_only() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.set_title("(3) Town Square");
        view.load(None);
        run(&h, &mut view);
        view.reload(None);
        run(&h, &mut view);
        let mentions = h.events.count(|e| matches!(e, ViewEvent::MentionsUpdated { mentions: 3, .. }));
        assert_eq!(mentions, 1);
    }

    #[test]
    fn baseline_read_every_success_when_configured() {
        let h = create_test_harness_with(ShellSettings {
            baseline_read: BaselineReadPolicy::EverySuccess,
            ..ShellSettings::default()
        });
        let (mut view, surface) = create_test_view(&h);
        surface.set_title("(2) Town Square");
        view.load(None);
        run(&h, &mut view);
        view.reload(None);
        run(&h, &mut view);
        let mentions = h.events.count(|e| matches!(e, ViewEvent::MentionsUpdated { mentions: 2, .. }));
        assert_eq!(mentions, 2);
    }

    #[test]
    fn login_reloads_when_off_root() {
        let h = create_test_harness();
        let (mut view, surface) = create_test_view(&h);
        surface.set_current_url("https://chat.example.com/team/channels/town");
        view.on_login(true);
        assert_eq!(h.scheduler.task_count(), 0);

        view.on_login(false);
        surface.set_current_url("https://idp.example.com/saml");
        view.on_login(true);
        assert_eq!(h.scheduler.task_count(), 1);
    }

    #[test]
    fn update_target_url_hides_internal_links() {
        let h = create_test_harness();
        let (view, _) = create_test_view(&h);
        view.handle_update_target_url("https://chat.example.com/team/pl/abc");
        view.handle_update_target_url("https://example.org/docs");
        let urls: Vec<_> = h
            .events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::UpdateTargetUrl { url, .. } => Some(url),
                _ => None,
            })
            .collect();
        assert_eq!(urls, vec![None, Some("https://example.org/docs".to_string())]);
    }

    #[test]
    fn show_attaches_and_hide_detaches() {
        let h = create_test_harness();
        let (mut view, _) = create_test_view(&h);
        view.show();
        view.show();
        assert_eq!(h.window.attached(), vec![7]);
        assert!(view.is_visible());
        view.hide();
        assert!(h.window.attached().is_empty());
    }

    #[test]
    fn mention_count_parsing() {
        assert_eq!(parse_mention_count("(12) Town Square - Team"), 12);
        assert_eq!(parse_mention_count("Town Square"), 0);
        assert_eq!(parse_mention_count("(x) Oops"), 0);
    }
}
