/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Accumulated pass/fail outcome of a run, and the exit-code convention that reports it.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::step::Instruction;

/// Offset for a run in which every step succeeded.
pub const PASSED: i32 = 0;

/// Offset for a run in which at least one step failed.
pub const FAILED: i32 = 2;

/// Default base added to `PASSED`/`FAILED` when forming an exit code.
pub const STATUS_BASE: i32 = 95;

/// The first failure observed during a run.
#[derive(PartialEq, Debug, Eq, Clone, Serialize, Deserialize)]
pub struct Failure {
    /// Instruction during which the failure happened.
    pub instruction: Instruction,
    /// Name of the worker driven by that instruction.
    pub worker: String,
    /// Rendered error.
    pub reason: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "instruction {} ({}): {}",
            self.instruction, self.worker, self.reason
        )
    }
}

/// Pass/fail outcome of a whole sequence.
///
/// Any number of writers may fold failures in, one step at a time, but only the first failure
/// is kept in detail. It is read once, when the run is over.
#[derive(PartialEq, Debug, Eq, Clone, Default, Serialize, Deserialize)]
pub struct ExitStatus {
    first_failure: Option<Failure>,
    failures: usize,
}

impl ExitStatus {
    /// A status with nothing recorded, i.e. passing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one failure into the status.
    pub fn record_failure(
        &mut self,
        instruction: Instruction,
        worker: impl Into<String>,
        reason: impl fmt::Display,
    ) {
        self.failures += 1;
        if self.first_failure.is_none() {
            self.first_failure = Some(Failure {
                instruction,
                worker: worker.into(),
                reason: reason.to_string(),
            });
        }
    }

    /// True if no failure was ever recorded.
    pub fn passed(&self) -> bool {
        self.failures == 0
    }

    /// The first failure recorded, if any.
    pub fn first_failure(&self) -> Option<&Failure> {
        self.first_failure.as_ref()
    }

    /// How many failures were recorded in total.
    pub fn failure_count(&self) -> usize {
        self.failures
    }

    /// `PASSED` or `FAILED`.
    pub fn offset(&self) -> i32 {
        if self.passed() { PASSED } else { FAILED }
    }

    /// The process exit code for this status on top of `base`.
    pub fn code(&self, base: i32) -> i32 {
        base + self.offset()
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.first_failure {
            None => write!(f, "PASSED"),
            Some(first) => write!(
                f,
                "FAILED ({} failure(s), first at {})",
                self.failures, first
            ),
        }
    }
}
