/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The orchestrator side of a worker's lifecycle: start it and wait until it is ready, then
//! wait until it is done.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use rendezvous_model::EventKind;
use rendezvous_model::Instruction;
use rendezvous_model::StepEvent;
use rendezvous_model::StepState;
use tracing::debug;
use tracing::warn;

use crate::context::SyncContext;
use crate::error::panic_message;
use crate::error::StepError;
use crate::error::WaitPhase;
use crate::trigger;
use crate::worker::WorkerHandle;

/// Proof that a worker signaled readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    /// The instruction the worker was started for.
    pub instruction: Instruction,
    /// How long the orchestrator was blocked.
    pub waited: Duration,
}

/// Starts workers and waits on them, with a bound on every wait.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    ctx: Arc<SyncContext>,
    ready_timeout: Duration,
    join_timeout: Duration,
}

impl Synchronizer {
    /// A synchronizer over `ctx` with the given wait bounds.
    pub fn new(ctx: Arc<SyncContext>, ready_timeout: Duration, join_timeout: Duration) -> Self {
        Synchronizer {
            ctx,
            ready_timeout,
            join_timeout,
        }
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<SyncContext> {
        &self.ctx
    }

    /// Start `worker` on a new thread for `instruction` and block until it signals readiness.
    ///
    /// The rendezvous lock is taken before the thread is spawned and released only by the wait
    /// itself, so the worker's signal cannot slip in between the two. A worker whose thread ends
    /// before signaling fails the wait at once with `EndedBeforeReady`. On failure the worker may
    /// still be running; it stays attached to `worker` so its completion can be awaited.
    pub fn start_and_await_ready(
        &self,
        worker: &mut WorkerHandle,
        instruction: Instruction,
    ) -> Result<Ready, StepError> {
        let name = worker.name().to_owned();
        let guard = self.ctx.rendezvous().lock();

        self.ctx
            .record(StepEvent::new(instruction, name.as_str(), EventKind::Start));
        let ctx = Arc::clone(&self.ctx);
        let task = Arc::clone(worker.task());
        let spawned = thread::Builder::new()
            .name(name.clone())
            .spawn(move || trigger::run_worker(&ctx, instruction, task.as_ref()));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                warn!("could not spawn worker {}: {}", name, err);
                worker.fail();
                return Err(StepError::Spawn {
                    worker: name,
                    message: err.to_string(),
                });
            }
        };
        worker.attach(instruction, thread);
        worker.transition(StepState::Started);

        let start = Instant::now();
        let completion = self.ctx.completion();
        match guard.wait_unless(
            instruction,
            WaitPhase::Ready,
            self.ready_timeout,
            self.ctx.pending_interrupt(),
            || completion.has_signaled(instruction),
        ) {
            Ok(()) => {
                worker.transition(StepState::ReadySignaled);
                Ok(Ready {
                    instruction,
                    waited: start.elapsed(),
                })
            }
            Err(err) => {
                warn!("worker {} did not become ready: {}", name, err);
                worker.fail();
                Err(err)
            }
        }
    }

    /// Wait, within the join bound, for a started worker to finish, then join its thread.
    ///
    /// A worker that does not finish in time is abandoned: its handle is dropped and the thread
    /// is left to run detached. A worker that was never started is trivially complete.
    pub fn await_completion(&self, worker: &mut WorkerHandle) -> Result<(), StepError> {
        let (instruction, thread) = match (worker.instruction(), worker.detach()) {
            (Some(instruction), Some(thread)) => (instruction, thread),
            _ => return Ok(()),
        };
        let name = worker.name().to_owned();

        let waited = self.ctx.completion().lock().wait_for(
            instruction,
            WaitPhase::Completion,
            self.join_timeout,
            self.ctx.pending_interrupt(),
        );
        if let Err(err) = waited {
            warn!("abandoning worker {}: {}", name, err);
            worker.fail();
            return Err(err);
        }

        // The completion latch fires as the thread body unwinds, so this join is short.
        let report = match thread.join() {
            Ok(report) => report,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("worker {} panicked: {}", name, message);
                worker.fail();
                self.ctx
                    .record(StepEvent::new(instruction, name.as_str(), EventKind::Finish));
                return Err(StepError::WorkerPanicked {
                    worker: name,
                    message,
                });
            }
        };
        self.ctx
            .record(StepEvent::new(instruction, name.as_str(), EventKind::Finish));

        if worker.state() == StepState::ReadySignaled {
            worker.transition(StepState::Triggered);
        }
        match report {
            Ok(()) => {
                if worker.state() == StepState::Triggered {
                    worker.transition(StepState::Finished);
                }
                debug!("worker {} finished", name);
                Ok(())
            }
            Err(err) => {
                worker.fail();
                Err(err)
            }
        }
    }
}
