//! Timer and task scheduling abstract Trait

use std::time::Duration;

use futures::future::BoxFuture;

use crate::types::{ScheduledEvent, TimerId};

/// Runs timers and navigation futures outside the core.
///
/// Every completion is handed back to the core as a `ScheduledEvent`, on the same control
/// thread that owns the `Shell`.
pub trait Scheduler: Send + Sync {
    /// Deliver `event` after `delay`
    fn schedule(&self, delay: Duration, event: ScheduledEvent) -> TimerId;

    /// Best-effort cancellation; unknown or already fired timers are ignored
    fn cancel(&self, timer: TimerId);

    /// Drive `task` to completion and deliver its output
    fn spawn(&self, task: BoxFuture<'static, ScheduledEvent>);
}
