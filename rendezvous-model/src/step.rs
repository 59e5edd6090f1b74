/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Instruction indices and the per-step lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

// Instructions:
//--------------------------------------------------------------------------------

/// Index of one coordinated action in a sequence. Orchestrator-owned, strictly increasing.
#[derive(
    PartialEq, // Silly protection from rustfmt disagreements.
    Debug,
    Eq,
    Clone,
    Copy,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Default,
)]
pub struct Instruction(u32);

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Instruction {
    /// The first instruction of every sequence.
    pub const FIRST: Instruction = Instruction(0);

    /// Create an Instruction from a raw index.
    pub const fn from_raw(ix: u32) -> Instruction {
        Instruction(ix)
    }

    /// Convert to a raw integer.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// The instruction after this one.
    pub fn next(self) -> Instruction {
        Instruction(self.0 + 1)
    }
}

impl FromStr for Instruction {
    type Err = <u32 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_raw(s.parse::<u32>()?))
    }
}

// Step lifecycle:
//--------------------------------------------------------------------------------

/// Where one step currently is in the rendezvous protocol.
///
/// ```text
/// NotStarted -> Started -> ReadySignaled -> Triggered -> Finished
///                  |                           |
///                  +--------> Failed <---------+
/// ```
///
/// A readiness failure still lets the worker run to completion, so `ReadySignaled` can also fail
/// if the completion wait times out.
#[derive(PartialEq, Debug, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
pub enum StepState {
    /// The worker exists but its thread has not been spawned.
    NotStarted,
    /// The thread was spawned; readiness not yet observed.
    Started,
    /// The orchestrator observed the readiness signal.
    ReadySignaled,
    /// The worker ran its instrumented path under the instrumented lock.
    Triggered,
    /// The worker was joined after a successful trigger.
    Finished,
    /// The step failed somewhere along the way.
    Failed,
}

impl StepState {
    /// True for the states a step ends in.
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Finished | StepState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal protocol transition.
    pub fn can_transition_to(self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (NotStarted, Started)
                | (NotStarted, Failed)
                | (Started, ReadySignaled)
                | (Started, Failed)
                | (ReadySignaled, Triggered)
                | (ReadySignaled, Failed)
                | (Triggered, Finished)
                | (Triggered, Failed)
        )
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            StepState::NotStarted => "not-started",
            StepState::Started => "started",
            StepState::ReadySignaled => "ready",
            StepState::Triggered => "triggered",
            StepState::Finished => "finished",
            StepState::Failed => "failed",
        };
        f.write_str(s)
    }
}
