/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Step events: the milestones a worker passes through, as observers see them.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::step::Instruction;

/// One protocol milestone observed during a run. Recorded in the order it happened; for an
/// unfaulted run that order is fully determined by the step list.
#[derive(PartialEq, Debug, Eq, Clone, Hash, Serialize, Deserialize)]
pub struct StepEvent {
    /// The instruction this event belongs to.
    pub instruction: Instruction,
    /// Name of the worker driven by that instruction.
    pub worker: String,
    /// Which milestone.
    pub kind: EventKind,
}

impl StepEvent {
    /// Create an event of the given kind.
    pub fn new(instruction: Instruction, worker: impl Into<String>, kind: EventKind) -> Self {
        StepEvent {
            instruction,
            worker: worker.into(),
            kind,
        }
    }
}

/// Rendered as `kind(worker)`, e.g. `ready(thread1)`.
impl fmt::Display for StepEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.worker)
    }
}

/// The milestones of one step. Each is recorded by exactly one side:
///
/// - `Start`: orchestrator, just before spawning the worker thread.
/// - `Ready`: worker, while holding the rendezvous lock and before notifying.
/// - `Trigger`: worker, while holding the instrumented lock and before the instrumented path.
/// - `Finish`: orchestrator, after joining the worker thread.
#[derive(PartialEq, Debug, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The orchestrator is about to start the worker.
    Start,
    /// The worker signaled readiness.
    Ready,
    /// The worker entered its instrumented region.
    Trigger,
    /// The orchestrator joined the worker.
    Finish,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            EventKind::Start => "start",
            EventKind::Ready => "ready",
            EventKind::Trigger => "trigger",
            EventKind::Finish => "finish",
        };
        f.write_str(s)
    }
}
