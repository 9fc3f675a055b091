//! Single-flight modal queue.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::FutureExt;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::traits::ModalPresenter;
use crate::types::{ModalError, ModalOutcome, ModalResult, Rect};

struct ModalEntry {
    key: String,
    payload: Value,
    uncloseable: bool,
    sender: Option<oneshot::Sender<ModalResult>>,
    outcome: ModalOutcome,
}

impl ModalEntry {
    fn new(key: &str, payload: Value, uncloseable: bool) -> Self {
        let (sender, receiver) = oneshot::channel();
        let outcome = receiver
            .map(|received| received.unwrap_or(Err(ModalError::Dropped)))
            .boxed()
            .shared();
        Self {
            key: key.to_string(),
            payload,
            uncloseable,
            sender: Some(sender),
            outcome,
        }
    }

    fn complete(mut self, result: ModalResult) {
        if let Some(sender) = self.sender.take() {
            // Fails only when every outcome handle was dropped.
            let _ = sender.send(result);
        }
    }
}

/// FIFO queue where only the head modal is shown.
///
/// Requests are deduplicated by key: a repeated key returns the outcome of the queued
/// request and never adds a second entry.
pub struct ModalQueue {
    presenter: Arc<dyn ModalPresenter>,
    queue: VecDeque<ModalEntry>,
}

impl ModalQueue {
    #[must_use]
    pub fn new(presenter: Arc<dyn ModalPresenter>) -> Self {
        Self {
            presenter,
            queue: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.queue.iter().map(|entry| entry.key.clone()).collect()
    }

    fn existing(&self, key: &str) -> Option<ModalOutcome> {
        self.queue
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.outcome.clone())
    }

    /// Queue a modal at the back; shown immediately when the queue was empty.
    pub fn add_modal(&mut self, key: &str, payload: Value, uncloseable: bool) -> ModalOutcome {
        if let Some(outcome) = self.existing(key) {
            log::debug!("Modal {key} already queued");
            return outcome;
        }
        let entry = ModalEntry::new(key, payload, uncloseable);
        let outcome = entry.outcome.clone();
        self.queue.push_back(entry);
        if self.queue.len() == 1 {
            self.show_modal();
        }
        outcome
    }

    /// Queue a modal at the front, displacing the displayed one back to waiting.
    pub fn add_modal_first(&mut self, key: &str, payload: Value, uncloseable: bool) -> ModalOutcome {
        if let Some(outcome) = self.existing(key) {
            return outcome;
        }
        let entry = ModalEntry::new(key, payload, uncloseable);
        let outcome = entry.outcome.clone();
        self.queue.push_front(entry);
        self.show_modal();
        outcome
    }

    /// Show the head of the queue and hide everything behind it.
    pub fn show_modal(&self) {
        for (index, entry) in self.queue.iter().enumerate() {
            if index == 0 {
                self.presenter
                    .show(&entry.key, &entry.payload, entry.uncloseable);
            } else {
                self.presenter.hide(&entry.key);
            }
        }
    }

    /// Whether a modal is currently shown.
    pub fn is_displayed(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Focus the displayed modal; false when the queue is empty.
    pub fn focus_current(&self) -> bool {
        match self.queue.front() {
            Some(entry) => {
                self.presenter.focus(&entry.key);
                true
            }
            None => false,
        }
    }

    pub fn resize(&self, bounds: Rect) {
        if let Some(entry) = self.queue.front() {
            self.presenter.set_bounds(&entry.key, bounds);
        }
    }

    /// Resolve a modal. Returns true when the queue became empty.
    pub fn resolve(&mut self, key: &str, data: Value) -> CoreResult<bool> {
        self.finish(key, Ok(data))
    }

    /// Reject a modal. Returns true when the queue became empty.
    pub fn reject(&mut self, key: &str, data: Value) -> CoreResult<bool> {
        self.finish(key, Err(ModalError::Rejected(data)))
    }

    /// Withdraw a modal, resolving it with `null`.
    pub fn remove_modal(&mut self, key: &str) -> CoreResult<bool> {
        self.finish(key, Ok(Value::Null))
    }

    fn finish(&mut self, key: &str, result: ModalResult) -> CoreResult<bool> {
        let index = self
            .queue
            .iter()
            .position(|entry| entry.key == key)
            .ok_or_else(|| CoreError::ModalNotFound(key.to_string()))?;
        let Some(entry) = self.queue.remove(index) else {
            return Err(CoreError::ModalNotFound(key.to_string()));
        };
        self.presenter.hide(&entry.key);
        entry.complete(result);

        if self.queue.is_empty() {
            return Ok(true);
        }
        self.show_modal();
        Ok(false)
    }

    /// Hide every modal and fail their outcomes with `ModalError::Dropped`.
    pub fn clear(&mut self) {
        for entry in self.queue.drain(..) {
            self.presenter.hide(&entry.key);
            entry.complete(Err(ModalError::Dropped));
        }
    }
}
