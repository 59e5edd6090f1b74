/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The communication point between readiness and the join, where a controller talks to the
//! host while a worker is parked.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use pretty_assertions::assert_eq;
use rendezvous::Config;
use rendezvous::FnWorker;
use rendezvous::StepError;
use rendezvous::StepState;
use rendezvous::WaitPhase;
use rendezvous::WorkerHandle;

use crate::noop;
use crate::patient_config;
use crate::recorded;

#[test]
fn held_lock_keeps_worker_out_of_instrumented_path() {
    let config = Config {
        hold_during_handshake: true,
        ..patient_config()
    };
    let entered = Arc::new(AtomicBool::new(false));
    let e2 = entered.clone();
    let worker = WorkerHandle::new(FnWorker::new("parked", move || {
        e2.store(true, Ordering::SeqCst);
        Ok(())
    }));
    let seen_inside = Arc::new(Mutex::new(Vec::new()));
    let s2 = seen_inside.clone();
    let e3 = entered.clone();
    let (dispatcher, log) = recorded(config);
    let mut dispatcher = dispatcher.with_communication_point(move |_ctx, _ix| {
        thread::sleep(Duration::from_millis(30));
        s2.lock().unwrap().push(e3.load(Ordering::SeqCst));
    });

    let status = dispatcher.run_sequence(vec![worker]);

    assert!(status.passed());
    assert_eq!(*seen_inside.lock().unwrap(), vec![false]);
    assert!(entered.load(Ordering::SeqCst));
    assert_eq!(
        log.rendered(),
        vec!["start(parked)", "ready(parked)", "trigger(parked)", "finish(parked)"]
    );
}

#[test]
fn hook_sees_each_instruction_between_ready_and_finish() {
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let s2 = snapshots.clone();
    let (dispatcher, log) = recorded(patient_config());
    let l2 = log.clone();
    let mut dispatcher = dispatcher.with_communication_point(move |ctx, ix| {
        assert_eq!(ctx.current_instruction(), ix);
        let rendered = l2.rendered();
        s2.lock().unwrap().push(rendered.len());
    });

    let status = dispatcher.run_sequence(vec![noop("x"), noop("y")]);

    assert!(status.passed());
    // Each hook runs after the worker's start and ready and before its finish.
    let seen = snapshots.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!((2..=3).contains(&seen[0]));
    assert!((6..=7).contains(&seen[1]));
}

#[test]
fn hook_is_skipped_when_the_worker_never_started() {
    let config = Config {
        max_instructions: Some(0),
        ..patient_config()
    };
    let calls = Arc::new(Mutex::new(0));
    let c2 = calls.clone();
    let (dispatcher, _log) = recorded(config);
    let mut dispatcher = dispatcher.with_communication_point(move |_, _| {
        *c2.lock().unwrap() += 1;
    });

    let status = dispatcher.run_sequence(vec![noop("first"), noop("second")]);

    assert!(!status.passed());
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn abandoned_worker_holding_the_lock_bounds_the_next_handshake() {
    let bound = Duration::from_millis(100);
    let config = Config {
        hold_during_handshake: true,
        ..patient_config().with_timeouts(bound)
    };
    let gate = Arc::new(Mutex::new(()));
    let held = gate.lock().unwrap();
    let g2 = gate.clone();
    let inside = Arc::new(AtomicBool::new(false));
    let i2 = inside.clone();
    let stuck = WorkerHandle::new(FnWorker::new("stuck", move || {
        i2.store(true, Ordering::SeqCst);
        let _wait = g2.lock().unwrap();
        Ok(())
    }));
    let (mut dispatcher, log) = recorded(config);
    let mut steps = dispatcher.steps(vec![stuck, noop("next")]);

    let first = steps.next().unwrap();
    assert_eq!(
        first.result,
        Err(StepError::Timeout {
            phase: WaitPhase::Completion,
            after: bound,
        })
    );
    // The abandoned worker is now parked inside the instrumented path, holding the lock.
    while !inside.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }

    let start = Instant::now();
    let second = steps.next().unwrap();
    let waited = start.elapsed();

    assert!(waited < Duration::from_secs(2), "blocked for {:?}", waited);
    assert_eq!(
        second.result,
        Err(StepError::Timeout {
            phase: WaitPhase::Lock,
            after: bound,
        })
    );
    assert_eq!(second.state, StepState::Failed);
    assert!(steps.next().is_none());
    // The second worker was never started.
    assert!(!log.rendered().iter().any(|e| e.ends_with("(next)")));
    drop(held);
}
