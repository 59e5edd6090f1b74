/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The worker side of the protocol: signal readiness, then run the instrumented path while
//! holding the instrumented lock.

use std::panic;
use std::panic::AssertUnwindSafe;

use rendezvous_model::EventKind;
use rendezvous_model::Instruction;
use rendezvous_model::StepEvent;
use tracing::debug;

use crate::context::SyncContext;
use crate::error::panic_message;
use crate::error::StepError;
use crate::worker::Runnable;
use crate::worker::WorkerReport;

/// Body of every worker thread.
pub(crate) fn run_worker(
    ctx: &SyncContext,
    instruction: Instruction,
    task: &dyn Runnable,
) -> WorkerReport {
    let _done = CompletionGuard { ctx, instruction };
    task.enter();
    signal_ready(ctx, instruction, task.name());
    let result = trigger(ctx, instruction, task);
    task.exit();
    result
}

/// Step 1. The ready event is recorded under the rendezvous lock, before the notification, so
/// it is ordered before anything the orchestrator does after its wait returns.
fn signal_ready(ctx: &SyncContext, instruction: Instruction, name: &str) {
    ctx.rendezvous().signal(instruction, || {
        ctx.record(StepEvent::new(instruction, name, EventKind::Ready))
    });
}

/// Steps 2 and 3. The instrumented lock is scoped to this function, so it is released on every
/// way out of the instrumented path, panics included.
pub(crate) fn trigger(
    ctx: &SyncContext,
    instruction: Instruction,
    task: &dyn Runnable,
) -> Result<(), StepError> {
    let name = task.name();
    let _held = ctx.lock_instrumented();
    let _inside = ctx.trigger_gauge().enter();
    ctx.record(StepEvent::new(instruction, name, EventKind::Trigger));

    match panic::catch_unwind(AssertUnwindSafe(|| task.instrumented())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            debug!("worker {}: instrumented path failed: {}", name, err);
            Err(StepError::InstrumentedPathFailure {
                worker: name.to_owned(),
                message: err.to_string(),
            })
        }
        Err(payload) => {
            debug!("worker {}: instrumented path panicked", name);
            Err(StepError::InstrumentedPathFailure {
                worker: name.to_owned(),
                message: panic_message(payload.as_ref()),
            })
        }
    }
}

/// Marks the worker complete when its thread body ends, however it ends. The rendezvous latch is
/// woken too, so an orchestrator still waiting for readiness sees that none is coming.
struct CompletionGuard<'a> {
    ctx: &'a SyncContext,
    instruction: Instruction,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.ctx.completion().signal(self.instruction, || {});
        self.ctx.rendezvous().wake_all();
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::observer::EventLog;
    use crate::worker::FnWorker;

    #[test]
    fn worker_signals_then_triggers() {
        let log = Arc::new(EventLog::new());
        let ctx = SyncContext::with_observer(log.clone());
        let task = FnWorker::new("w", || Ok(()));

        let report = run_worker(&ctx, Instruction::FIRST, &task);

        assert_eq!(report, Ok(()));
        assert_eq!(log.rendered(), vec!["ready(w)", "trigger(w)"]);
        assert!(ctx.rendezvous().has_signaled(Instruction::FIRST));
        assert!(ctx.completion().has_signaled(Instruction::FIRST));
    }

    #[test]
    fn failing_path_releases_lock() {
        let ctx = SyncContext::new();
        let task = FnWorker::new("w", || {
            Err(io::Error::new(io::ErrorKind::Other, "nope").into())
        });

        let res = trigger(&ctx, Instruction::FIRST, &task);

        assert_eq!(
            res,
            Err(StepError::InstrumentedPathFailure {
                worker: "w".into(),
                message: "nope".into(),
            })
        );
        assert!(ctx.try_lock_instrumented().is_some());
        assert_eq!(ctx.trigger_gauge().active(), 0);
    }

    #[test]
    fn panicking_path_releases_lock() {
        let ctx = SyncContext::new();
        let task = FnWorker::new("w", || panic!("kaboom"));

        let res = trigger(&ctx, Instruction::FIRST, &task);

        assert!(matches!(
            res,
            Err(StepError::InstrumentedPathFailure { ref message, .. }) if message == "kaboom"
        ));
        assert!(ctx.try_lock_instrumented().is_some());
    }
}
