//! View lifecycle event observer Trait

use std::sync::{Arc, Mutex, PoisonError};

use crate::types::ViewEvent;

/// Typed observer for view lifecycle events.
pub trait ViewEventSink: Send + Sync {
    fn emit(&self, event: ViewEvent);
}

/// Event sink that buffers events until drained.
///
/// Default implementation for hosts that poll instead of subscribing.
#[derive(Clone, Default)]
pub struct BufferedEventSink {
    events: Arc<Mutex<Vec<ViewEvent>>>,
}

impl BufferedEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every buffered event, oldest first
    pub fn drain(&self) -> Vec<ViewEvent> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *events)
    }
}

impl ViewEventSink for BufferedEventSink {
    fn emit(&self, event: ViewEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
