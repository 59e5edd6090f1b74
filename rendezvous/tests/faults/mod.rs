/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Failure handling: interrupts, failing or panicking instrumented paths, and instruction
//! bounds. A failed step never stops the sequence early (except an unexpected instruction) and
//! never leaves the instrumented lock held.

use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use pretty_assertions::assert_eq;
use rendezvous::Config;
use rendezvous::FnWorker;
use rendezvous::Instruction;
use rendezvous::PathResult;
use rendezvous::Runnable;
use rendezvous::StepError;
use rendezvous::StepState;
use rendezvous::WaitPhase;
use rendezvous::WorkerHandle;

use crate::noop;
use crate::patient_config;
use crate::recorded;

#[test]
fn interrupt_fails_only_the_current_step() {
    let (mut dispatcher, log) = recorded(patient_config());
    dispatcher.context().interrupt();

    let outcomes: Vec<_> = dispatcher.steps(vec![noop("W1"), noop("W2")]).collect();

    assert_eq!(
        outcomes[0].result,
        Err(StepError::InterruptedWait {
            phase: WaitPhase::Ready
        })
    );
    assert_eq!(outcomes[0].state, StepState::Failed);
    assert!(outcomes[1].is_ok());
    assert_eq!(outcomes[1].state, StepState::Finished);
    assert!(!dispatcher.context().is_interrupted());
    // The interrupted worker still ran to completion before W2 started.
    let rendered = log.rendered();
    let finish_w1 = rendered.iter().position(|e| e == "finish(W1)").unwrap();
    let start_w2 = rendered.iter().position(|e| e == "start(W2)").unwrap();
    assert!(finish_w1 < start_w2);
}

#[test]
fn interrupt_makes_the_sequence_fail() {
    let (mut dispatcher, _log) = recorded(patient_config());
    dispatcher.context().interrupt();

    let status = dispatcher.run_sequence(vec![noop("W1"), noop("W2")]);

    assert!(!status.passed());
    assert_eq!(status.failure_count(), 1);
    assert_eq!(status.code(95), 97);
    let first = status.first_failure().unwrap();
    assert_eq!(first.instruction, Instruction::FIRST);
    assert_eq!(first.worker, "W1");
}

#[test]
fn failing_path_is_reported_and_sequence_continues() {
    let failing = WorkerHandle::new(FnWorker::new("bad", || {
        Err(io::Error::new(io::ErrorKind::Other, "instrumented path gave up").into())
    }));
    let (mut dispatcher, log) = recorded(patient_config());

    let outcomes: Vec<_> = dispatcher
        .steps(vec![failing, noop("good")])
        .collect();

    assert_eq!(
        outcomes[0].result,
        Err(StepError::InstrumentedPathFailure {
            worker: "bad".into(),
            message: "instrumented path gave up".into(),
        })
    );
    assert_eq!(outcomes[0].state, StepState::Failed);
    assert!(outcomes[1].is_ok());
    assert!(dispatcher.context().try_lock_instrumented().is_some());
    assert_eq!(log.len(), 8);
}

#[test]
fn panicking_path_releases_the_instrumented_lock() {
    let panicking = WorkerHandle::new(FnWorker::new("boom", || panic!("instrumented panic")));
    let (mut dispatcher, _log) = recorded(patient_config());

    let status = dispatcher.run_sequence(vec![panicking, noop("after")]);

    assert_eq!(status.failure_count(), 1);
    assert!(
        status
            .first_failure()
            .unwrap()
            .reason
            .contains("instrumented panic")
    );
    assert!(dispatcher.context().try_lock_instrumented().is_some());
    assert_eq!(dispatcher.context().trigger_gauge().active(), 0);
}

#[test]
fn instruction_past_maximum_is_unexpected() {
    let config = Config {
        max_instructions: Some(1),
        ..patient_config()
    };
    let (mut dispatcher, log) = recorded(config);

    let status = dispatcher.run_sequence(vec![noop("a"), noop("b"), noop("c"), noop("d")]);

    assert_eq!(status.failure_count(), 1);
    let first = status.first_failure().unwrap();
    assert_eq!(first.instruction, Instruction::from_raw(2));
    assert_eq!(first.worker, "c");
    assert_eq!(first.reason, "unexpected instruction: 2 (max 1)");
    // "c" was never started and "d" was never reached.
    assert_eq!(log.len(), 8);
}

#[test]
fn stuck_worker_is_abandoned_after_join_timeout() {
    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock().unwrap();
    let g2 = gate.clone();
    let stuck = WorkerHandle::new(FnWorker::new("stuck", move || {
        let _wait = g2.lock().unwrap();
        Ok(())
    }));
    let config = Config {
        join_timeout: Duration::from_millis(40),
        ..patient_config()
    };
    let (mut dispatcher, _log) = recorded(config);

    let outcomes: Vec<_> = dispatcher.steps(vec![stuck]).collect();

    assert_eq!(
        outcomes[0].result,
        Err(StepError::Timeout {
            phase: WaitPhase::Completion,
            after: Duration::from_millis(40),
        })
    );
    assert_eq!(outcomes[0].state, StepState::Failed);
    drop(held);
}

/// Panics before it can signal readiness.
struct DiesOnEntry;

impl Runnable for DiesOnEntry {
    fn name(&self) -> &str {
        "dies-on-entry"
    }

    fn enter(&self) {
        panic!("no readiness");
    }

    fn instrumented(&self) -> PathResult {
        Ok(())
    }
}

#[test]
fn worker_dying_before_readiness_does_not_wait_out_the_bound() {
    let (mut dispatcher, log) = recorded(patient_config());
    let start = Instant::now();

    let outcomes: Vec<_> = dispatcher
        .steps(vec![WorkerHandle::new(DiesOnEntry), noop("after")])
        .collect();

    assert!(start.elapsed() < crate::PATIENT);
    assert_eq!(
        outcomes[0].result,
        Err(StepError::WorkerPanicked {
            worker: "dies-on-entry".into(),
            message: "no readiness".into(),
        })
    );
    assert_eq!(outcomes[0].state, StepState::Failed);
    assert!(outcomes[1].is_ok());
    assert_eq!(
        log.rendered(),
        vec![
            "start(dies-on-entry)",
            "finish(dies-on-entry)",
            "start(after)",
            "ready(after)",
            "trigger(after)",
            "finish(after)",
        ]
    );
}
