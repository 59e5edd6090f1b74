/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::any::Any;
use std::fmt;
use std::time::Duration;

use rendezvous_model::Instruction;
use serde::Deserialize;
use serde::Serialize;

/// Which orchestrator-side wait an error came from.
#[derive(PartialEq, Debug, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
pub enum WaitPhase {
    /// Waiting for the worker's readiness signal.
    Ready,
    /// Waiting for the worker to run to completion.
    Completion,
    /// Waiting to take the instrumented lock before a held handshake.
    Lock,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WaitPhase::Ready => f.write_str("readiness"),
            WaitPhase::Completion => f.write_str("completion"),
            WaitPhase::Lock => f.write_str("instrumented lock"),
        }
    }
}

/// Why a single step failed. Failures are folded into the run's `ExitStatus` at the step
/// boundary; none of them stops the dispatcher except `UnexpectedInstruction`.
#[derive(PartialEq, Debug, Eq, Clone, Serialize, Deserialize)]
pub enum StepError {
    /// The orchestrator was interrupted while waiting.
    InterruptedWait {
        /// The wait that was interrupted.
        phase: WaitPhase,
    },
    /// The awaited signal did not arrive within the configured bound.
    Timeout {
        /// The wait that expired.
        phase: WaitPhase,
        /// The bound that elapsed.
        after: Duration,
    },
    /// The worker thread ended without ever signaling readiness.
    EndedBeforeReady {
        /// The instruction the worker was started for.
        instruction: Instruction,
    },
    /// The instrumented path returned an error or panicked. The instrumented lock had already
    /// been released when this was produced.
    InstrumentedPathFailure {
        /// Worker that ran the path.
        worker: String,
        /// Rendered error or panic payload.
        message: String,
    },
    /// The worker panicked outside its instrumented path.
    WorkerPanicked {
        /// Worker that panicked.
        worker: String,
        /// Rendered panic payload.
        message: String,
    },
    /// The worker thread could not be spawned.
    Spawn {
        /// Worker that was to be started.
        worker: String,
        /// Rendered I/O error.
        message: String,
    },
    /// The instruction counter went past the configured maximum.
    UnexpectedInstruction {
        /// The offending instruction.
        instruction: Instruction,
        /// The configured maximum.
        max: u32,
    },
}

impl StepError {
    /// True for the two wait failures.
    pub fn is_wait_failure(&self) -> bool {
        matches!(
            self,
            StepError::InterruptedWait { .. } | StepError::Timeout { .. }
        )
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepError::InterruptedWait { phase } => {
                write!(f, "interrupted while waiting for {}", phase)
            }
            StepError::Timeout { phase, after } => {
                write!(f, "no {} within {:?}", phase, after)
            }
            StepError::EndedBeforeReady { instruction } => write!(
                f,
                "worker for instruction {} ended before signaling readiness",
                instruction
            ),
            StepError::InstrumentedPathFailure { worker, message } => {
                write!(f, "instrumented path of {} failed: {}", worker, message)
            }
            StepError::WorkerPanicked { worker, message } => {
                write!(f, "worker {} panicked: {}", worker, message)
            }
            StepError::Spawn { worker, message } => {
                write!(f, "could not start worker {}: {}", worker, message)
            }
            StepError::UnexpectedInstruction { instruction, max } => {
                write!(f, "unexpected instruction: {} (max {})", instruction, max)
            }
        }
    }
}

impl std::error::Error for StepError {}

/// Render a panic payload the way the default hook does.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
