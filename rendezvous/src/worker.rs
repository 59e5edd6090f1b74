/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Workers: the units of work the dispatcher drives one instruction at a time.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

use rendezvous_model::Instruction;
use rendezvous_model::StepState;
use tracing::trace;

use crate::error::StepError;

/// What the instrumented path returns. Any error fails the step.
pub type PathResult = Result<(), Box<dyn Error + Send + Sync>>;

/// A named unit of work whose `instrumented` method is the code location a controller wants
/// to intercept.
///
/// The worker thread runs `enter`, signals readiness, runs `instrumented` under the
/// instrumented lock, and finally runs `exit`.
pub trait Runnable: Send + Sync + 'static {
    /// Name of the worker; also used as its thread name.
    fn name(&self) -> &str;

    /// Runs on the worker thread before readiness is signaled.
    fn enter(&self) {}

    /// The instrumented path, run while the instrumented lock is held.
    fn instrumented(&self) -> PathResult;

    /// Runs on the worker thread after the instrumented lock is released.
    fn exit(&self) {}
}

/// What a worker thread hands back when it is joined: the outcome of its instrumented path.
pub(crate) type WorkerReport = Result<(), StepError>;

/// A worker plus its lifecycle state. Owned by the dispatcher for the duration of one step and
/// discarded after the worker is joined.
pub struct WorkerHandle {
    name: String,
    task: Arc<dyn Runnable>,
    state: StepState,
    instruction: Option<Instruction>,
    thread: Option<JoinHandle<WorkerReport>>,
}

impl WorkerHandle {
    /// Wrap a worker that has not been started.
    pub fn new<R: Runnable>(task: R) -> Self {
        Self::from_arc(Arc::new(task))
    }

    /// Wrap a shared worker that has not been started.
    pub fn from_arc(task: Arc<dyn Runnable>) -> Self {
        WorkerHandle {
            name: task.name().to_owned(),
            task,
            state: StepState::NotStarted,
            instruction: None,
            thread: None,
        }
    }

    /// The worker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the worker is in the protocol.
    pub fn state(&self) -> StepState {
        self.state
    }

    /// The instruction that started this worker, once started.
    pub fn instruction(&self) -> Option<Instruction> {
        self.instruction
    }

    pub(crate) fn task(&self) -> &Arc<dyn Runnable> {
        &self.task
    }

    pub(crate) fn attach(&mut self, instruction: Instruction, thread: JoinHandle<WorkerReport>) {
        self.instruction = Some(instruction);
        self.thread = Some(thread);
    }

    pub(crate) fn detach(&mut self) -> Option<JoinHandle<WorkerReport>> {
        self.thread.take()
    }

    /// Whether a thread was spawned and not yet joined or abandoned.
    pub fn is_attached(&self) -> bool {
        self.thread.is_some()
    }

    /// Move to `next`. Protocol violations are bugs in the dispatcher, not runtime failures.
    pub(crate) fn transition(&mut self, next: StepState) {
        assert!(
            self.state.can_transition_to(next),
            "worker {}: illegal transition {} -> {}",
            self.name,
            self.state,
            next
        );
        trace!("worker {}: {} -> {}", self.name, self.state, next);
        self.state = next;
    }

    /// Move to `Failed` unless already terminal.
    pub(crate) fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.transition(StepState::Failed);
        }
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("instruction", &self.instruction)
            .field("attached", &self.thread.is_some())
            .finish()
    }
}

/// Adapts a closure into a `Runnable`.
pub struct FnWorker<F> {
    name: String,
    body: F,
}

impl<F> FnWorker<F>
where
    F: Fn() -> PathResult + Send + Sync + 'static,
{
    /// A worker called `name` whose instrumented path is `body`.
    pub fn new(name: impl Into<String>, body: F) -> Self {
        FnWorker {
            name: name.into(),
            body,
        }
    }
}

impl<F> Runnable for FnWorker<F>
where
    F: Fn() -> PathResult + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn instrumented(&self) -> PathResult {
        (self.body)()
    }
}
