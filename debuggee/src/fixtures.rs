/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Worker fixtures whose instrumented paths are the locations a controller sets step filters
//! and breakpoints on.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use rendezvous::PathResult;
use rendezvous::Runnable;
use rendezvous::WorkerHandle;
use tracing::info;

/// An append-only record of what the fixtures did, also echoed to the log.
#[derive(Debug, Default)]
pub struct Journal {
    lines: Mutex<Vec<String>>,
}

impl Journal {
    /// An empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `line` and keep it.
    pub fn note(&self, line: impl Into<String>) {
        let line = line.into();
        info!("{}", line);
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    /// Everything noted so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn m10(journal: &Journal) {
    journal.note("entered: m10");
}

fn m11(journal: &Journal) {
    journal.note("entered: m11");
    m10(journal);
}

fn m20(journal: &Journal) {
    journal.note("entered: m20");
}

fn m21(journal: &Journal) {
    journal.note("entered: m21");
    m20(journal);
}

/// Which call chain a `StepFilterThread` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    /// `m11` then `m10`.
    First,
    /// `m21` then `m20`.
    Second,
}

/// A worker whose instrumented path is a two-level call chain, so a controller can check that
/// class and method step filters hold.
#[derive(Debug)]
pub struct StepFilterThread {
    name: String,
    chain: Chain,
    journal: Arc<Journal>,
}

impl StepFilterThread {
    /// A worker called `name` running `chain`.
    pub fn new(name: impl Into<String>, chain: Chain, journal: Arc<Journal>) -> Self {
        StepFilterThread {
            name: name.into(),
            chain,
            journal,
        }
    }
}

impl Runnable for StepFilterThread {
    fn name(&self) -> &str {
        &self.name
    }

    fn enter(&self) {
        self.journal
            .note(format!("'run': enter :: threadName == {}", self.name));
    }

    fn instrumented(&self) -> PathResult {
        match self.chain {
            Chain::First => m11(&self.journal),
            Chain::Second => m21(&self.journal),
        }
        Ok(())
    }

    fn exit(&self) {
        self.journal
            .note(format!("'run': exit :: threadName == {}", self.name));
    }
}

/// `thread1` and `thread2`, in that order.
pub fn step_filter_workers(journal: &Arc<Journal>) -> Vec<WorkerHandle> {
    vec![
        WorkerHandle::new(StepFilterThread::new(
            "thread1",
            Chain::First,
            journal.clone(),
        )),
        WorkerHandle::new(StepFilterThread::new(
            "thread2",
            Chain::Second,
            journal.clone(),
        )),
    ]
}

/// A named task with a single breakpoint location.
#[derive(Debug)]
pub struct BreakpointTask {
    name: String,
    journal: Arc<Journal>,
}

impl BreakpointTask {
    /// A task called `name`.
    pub fn new(name: impl Into<String>, journal: Arc<Journal>) -> Self {
        BreakpointTask {
            name: name.into(),
            journal,
        }
    }
}

impl Runnable for BreakpointTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn instrumented(&self) -> PathResult {
        self.journal
            .note(format!("{}::Breakpoint is reached", self.name));
        Ok(())
    }
}
