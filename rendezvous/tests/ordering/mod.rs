/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Event order and mutual exclusion across whole sequences.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rendezvous::EventKind;
use rendezvous::FnWorker;
use rendezvous::Instruction;
use rendezvous::PathResult;
use rendezvous::Runnable;
use rendezvous::StepState;
use rendezvous::WorkerHandle;

use crate::noop;
use crate::patient_config;
use crate::recorded;

#[test]
fn two_steps_interleave_in_protocol_order() {
    let (mut dispatcher, log) = recorded(patient_config());

    let status = dispatcher.run_sequence(vec![noop("W1"), noop("W2")]);

    assert!(status.passed());
    assert_eq!(status.code(95), 95);
    assert_eq!(
        log.rendered(),
        vec![
            "start(W1)",
            "ready(W1)",
            "trigger(W1)",
            "finish(W1)",
            "start(W2)",
            "ready(W2)",
            "trigger(W2)",
            "finish(W2)",
        ]
    );
}

#[test]
fn every_event_carries_its_instruction() {
    let (mut dispatcher, log) = recorded(patient_config());

    dispatcher.run_sequence(vec![noop("a"), noop("b"), noop("c")]);

    let stamps: Vec<(u32, EventKind)> = log
        .events()
        .into_iter()
        .map(|e| (e.instruction.as_raw(), e.kind))
        .collect();
    let mut expected = Vec::new();
    for ix in 0..3 {
        for kind in [
            EventKind::Start,
            EventKind::Ready,
            EventKind::Trigger,
            EventKind::Finish,
        ] {
            expected.push((ix, kind));
        }
    }
    assert_eq!(stamps, expected);
}

#[test]
fn at_most_one_worker_in_instrumented_path() {
    let inside = Arc::new(AtomicUsize::new(0));
    let workers = (0..4)
        .map(|i| {
            let inside = inside.clone();
            WorkerHandle::new(FnWorker::new(format!("w{}", i), move || {
                let before = inside.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                inside.fetch_sub(1, Ordering::SeqCst);
                if before == 0 {
                    Ok(())
                } else {
                    Err("overlapping instrumented paths".into())
                }
            }))
        })
        .collect();
    let (mut dispatcher, _log) = recorded(patient_config());

    let status = dispatcher.run_sequence(workers);

    assert!(status.passed(), "{}", status);
    let gauge = dispatcher.context().trigger_gauge();
    assert_eq!(gauge.high_water(), 1);
    assert_eq!(gauge.total(), 4);
    assert_eq!(gauge.active(), 0);
}

/// Sleeps in `enter`, before readiness can be signaled.
struct SlowStart {
    delay: Duration,
}

impl Runnable for SlowStart {
    fn name(&self) -> &str {
        "slow-start"
    }

    fn enter(&self) {
        thread::sleep(self.delay);
    }

    fn instrumented(&self) -> PathResult {
        Ok(())
    }
}

#[test]
fn orchestrator_waits_for_readiness() {
    let (dispatcher, log) = recorded(patient_config());
    let sync = rendezvous::Synchronizer::new(
        dispatcher.context().clone(),
        crate::PATIENT,
        crate::PATIENT,
    );
    let delay = Duration::from_millis(50);
    let mut worker = WorkerHandle::new(SlowStart { delay });

    let ready = sync
        .start_and_await_ready(&mut worker, Instruction::FIRST)
        .unwrap();

    assert!(ready.waited >= delay);
    assert_eq!(worker.state(), StepState::ReadySignaled);
    assert_eq!(log.rendered()[..2], ["start(slow-start)", "ready(slow-start)"]);
    sync.await_completion(&mut worker).unwrap();
    assert_eq!(worker.state(), StepState::Finished);
}

#[test]
fn fresh_runs_replay_identically() {
    let run = || {
        let (mut dispatcher, log) = recorded(patient_config());
        let status = dispatcher.run_sequence(vec![noop("thread1"), noop("thread2")]);
        (status.passed(), log.rendered())
    };

    let first = run();
    let second = run();

    assert!(first.0);
    assert_eq!(first, second);
}

#[test]
fn outcomes_report_terminal_states() {
    let (mut dispatcher, _log) = recorded(patient_config());

    let outcomes: Vec<_> = dispatcher.steps(vec![noop("a"), noop("b")]).collect();

    assert_eq!(outcomes.len(), 2);
    for (ix, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.instruction, Instruction::from_raw(ix as u32));
        assert_eq!(outcome.state, StepState::Finished);
        assert!(outcome.is_ok());
    }
}
