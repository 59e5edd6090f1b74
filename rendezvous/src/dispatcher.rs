/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The instruction dispatcher drives a list of workers through the rendezvous protocol, one
//! instruction at a time.
//!
//! Every step is start, await-ready, await-completion (join), and the next step does not
//! begin until the previous worker has been joined or abandoned. Step failures are recorded
//! and the dispatcher moves on; only the final `ExitStatus` says whether anything went wrong.

use std::fmt;
use std::sync::Arc;
use std::vec;

use rendezvous_model::Config;
use rendezvous_model::ExitStatus;
use rendezvous_model::Instruction;
use rendezvous_model::StepState;
use tracing::info;
use tracing::warn;

use crate::context::SyncContext;
use crate::error::StepError;
use crate::error::WaitPhase;
use crate::synchronizer::Synchronizer;
use crate::worker::WorkerHandle;

/// Orchestrator-owned cursor over the instruction sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionCounter {
    current: Instruction,
    max: Option<u32>,
    ended: bool,
}

impl InstructionCounter {
    /// A counter at the first instruction, optionally bounded by `max` (inclusive).
    pub fn new(max: Option<u32>) -> Self {
        InstructionCounter {
            current: Instruction::FIRST,
            max,
            ended: false,
        }
    }

    /// The instruction to run next.
    pub fn current(&self) -> Instruction {
        self.current
    }

    /// Whether `current` is past the configured maximum.
    pub fn is_unexpected(&self) -> bool {
        self.max.is_some_and(|max| self.current.as_raw() > max)
    }

    /// Move to the next instruction.
    pub fn advance(&mut self) {
        assert!(!self.ended, "advanced an ended instruction counter");
        self.current = self.current.next();
    }

    /// Move to the end sentinel. Final.
    pub fn end(&mut self) {
        self.ended = true;
    }

    /// Whether the end sentinel was reached.
    pub fn is_end(&self) -> bool {
        self.ended
    }
}

/// How one step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// The instruction that drove the step.
    pub instruction: Instruction,
    /// The worker's name.
    pub worker: String,
    /// The worker's terminal state.
    pub state: StepState,
    /// The first error the step hit, if any.
    pub result: Result<(), StepError>,
}

impl StepOutcome {
    /// True if the step finished without error.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.result {
            Ok(()) => write!(f, "[{}] {}: {}", self.instruction, self.worker, self.state),
            Err(e) => write!(
                f,
                "[{}] {}: {} ({})",
                self.instruction, self.worker, self.state, e
            ),
        }
    }
}

type CommunicationPoint = Box<dyn FnMut(&SyncContext, Instruction)>;

/// Sequences worker runs over one `SyncContext`.
pub struct Dispatcher {
    sync: Synchronizer,
    config: Config,
    communication: Option<CommunicationPoint>,
}

impl Dispatcher {
    /// A dispatcher over a fresh context that records nothing.
    pub fn new(config: Config) -> Self {
        Self::with_context(Arc::new(SyncContext::new()), config)
    }

    /// A dispatcher over an existing context.
    pub fn with_context(ctx: Arc<SyncContext>, config: Config) -> Self {
        Dispatcher {
            sync: Synchronizer::new(ctx, config.ready_timeout, config.join_timeout),
            config,
            communication: None,
        }
    }

    /// Call `point` on the orchestrator after every start-and-await-ready, before the join.
    /// With `hold_during_handshake` it runs while the instrumented lock is held, so the worker
    /// is parked at its trigger for as long as `point` takes.
    pub fn with_communication_point<F>(mut self, point: F) -> Self
    where
        F: FnMut(&SyncContext, Instruction) + 'static,
    {
        self.communication = Some(Box::new(point));
        self
    }

    /// The shared context.
    pub fn context(&self) -> &Arc<SyncContext> {
        self.sync.context()
    }

    /// The dispatcher's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lazily run `steps` in order, one outcome per step. The iterator owns the steps, so a
    /// sequence can be consumed only once.
    pub fn steps(&mut self, steps: Vec<WorkerHandle>) -> Steps<'_> {
        let counter = InstructionCounter::new(self.config.max_instructions);
        Steps {
            dispatcher: self,
            pending: steps.into_iter(),
            counter,
        }
    }

    /// Run every step and fold the outcomes into an `ExitStatus`.
    pub fn run_sequence(&mut self, steps: Vec<WorkerHandle>) -> ExitStatus {
        let mut status = ExitStatus::new();
        for outcome in self.steps(steps) {
            info!("step outcome: {}", outcome);
            if let Err(err) = &outcome.result {
                status.record_failure(outcome.instruction, outcome.worker.as_str(), err);
            }
        }
        crate::steplog!("sequence complete: {}", status);
        status
    }

    fn run_step(&mut self, mut worker: WorkerHandle, instruction: Instruction) -> StepOutcome {
        let ctx = Arc::clone(self.sync.context());
        ctx.set_instruction(instruction);

        let held = if self.config.hold_during_handshake {
            match ctx.lock_instrumented_within(self.config.ready_timeout) {
                Some(guard) => Some(guard),
                None => {
                    warn!(
                        "instrumented lock still held, not starting worker {}",
                        worker.name()
                    );
                    worker.fail();
                    return StepOutcome {
                        instruction,
                        worker: worker.name().to_owned(),
                        state: worker.state(),
                        result: Err(StepError::Timeout {
                            phase: WaitPhase::Lock,
                            after: self.config.ready_timeout,
                        }),
                    };
                }
            }
        } else {
            None
        };
        let ready = self.sync.start_and_await_ready(&mut worker, instruction);
        if worker.is_attached() {
            if let Some(point) = self.communication.as_mut() {
                point(&ctx, instruction);
            }
        }
        drop(held);

        let completion = self.sync.await_completion(&mut worker);
        let result = match (ready, completion) {
            // The join knows why the thread ended.
            (Err(StepError::EndedBeforeReady { .. }), Err(err)) => Err(err),
            (ready, completion) => ready.map(|_| ()).and(completion),
        };
        StepOutcome {
            instruction,
            worker: worker.name().to_owned(),
            state: worker.state(),
            result,
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sync", &self.sync)
            .field("config", &self.config)
            .field("communication", &self.communication.is_some())
            .finish()
    }
}

/// The outcomes of a sequence, produced one step at a time.
pub struct Steps<'a> {
    dispatcher: &'a mut Dispatcher,
    pending: vec::IntoIter<WorkerHandle>,
    counter: InstructionCounter,
}

impl Steps<'_> {
    /// The instruction counter's current position.
    pub fn counter(&self) -> &InstructionCounter {
        &self.counter
    }
}

impl Iterator for Steps<'_> {
    type Item = StepOutcome;

    fn next(&mut self) -> Option<StepOutcome> {
        if self.counter.is_end() {
            return None;
        }
        let mut worker = match self.pending.next() {
            Some(worker) => worker,
            None => {
                self.counter.end();
                return None;
            }
        };
        let instruction = self.counter.current();

        if self.counter.is_unexpected() {
            let max = self.counter.max.unwrap_or_default();
            self.counter.end();
            worker.fail();
            return Some(StepOutcome {
                instruction,
                worker: worker.name().to_owned(),
                state: worker.state(),
                result: Err(StepError::UnexpectedInstruction { instruction, max }),
            });
        }

        let outcome = self.dispatcher.run_step(worker, instruction);
        self.counter.advance();
        Some(outcome)
    }
}
