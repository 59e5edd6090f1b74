/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Observers receive every protocol milestone in the order it happened.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use rendezvous_model::StepEvent;

/// Receives step events. Called from both the orchestrator and worker threads, often while
/// the caller holds the lock that orders the event, so implementations must not block on
/// either rendezvous lock.
pub trait StepObserver: Send + Sync {
    /// One milestone happened.
    fn observe(&self, event: &StepEvent);
}

impl<T: StepObserver + ?Sized> StepObserver for Arc<T> {
    fn observe(&self, event: &StepEvent) {
        (**self).observe(event)
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl StepObserver for NullObserver {
    fn observe(&self, _event: &StepEvent) {}
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<StepEvent>>,
}

impl EventLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the events recorded so far.
    pub fn events(&self) -> Vec<StepEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The events rendered as `kind(worker)`, e.g. `["start(W1)", "ready(W1)"]`.
    pub fn rendered(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }

    /// Number of events recorded.
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StepObserver for EventLog {
    fn observe(&self, event: &StepEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use rendezvous_model::EventKind;
    use rendezvous_model::Instruction;

    use super::*;

    #[test]
    fn log_keeps_order() {
        let log = Arc::new(EventLog::new());
        let as_observer: Arc<dyn StepObserver> = log.clone();
        as_observer.observe(&StepEvent::new(Instruction::FIRST, "a", EventKind::Start));
        as_observer.observe(&StepEvent::new(Instruction::FIRST, "a", EventKind::Ready));
        assert_eq!(log.rendered(), vec!["start(a)", "ready(a)"]);
        assert_eq!(log.len(), 2);
    }
}
