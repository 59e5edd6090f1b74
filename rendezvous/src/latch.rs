/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Step latches are the monitor behind every orchestrator-side wait: a mutex used purely as a
//! rendezvous point, a condition variable, and a predicate over the last instruction that
//! signaled.
//!
//! A latch never needs resetting between steps. Each signal carries its instruction and the
//! latch only ever moves forward, so a late signal from an earlier step can never satisfy the
//! wait of a later one.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use rendezvous_model::Instruction;
use tracing::trace;

use crate::error::StepError;
use crate::error::WaitPhase;

/// A pending interrupt of the orchestrator. Like a thread's interrupt status: raising it wakes
/// the current wait, or fails the next one, and the wait that reports it clears it.
#[derive(Debug, Default)]
pub struct Interrupt {
    pending: AtomicBool,
}

impl Interrupt {
    /// Mark an interrupt as pending. Callers must then wake the latches they care about.
    pub(crate) fn raise(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    /// Whether an interrupt is pending, without clearing it.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Consume a pending interrupt.
    fn take(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }
}

/// A single-slot, instruction-stamped notification protected by its own lock.
pub struct StepLatch {
    name: &'static str,
    signaled: Mutex<Option<Instruction>>,
    cond: Condvar,
}

/// The latch's lock, held by the orchestrator between starting a worker and waiting on it.
#[must_use = "dropping the guard releases the rendezvous lock without waiting"]
pub struct LatchGuard<'a> {
    latch: &'a StepLatch,
    guard: MutexGuard<'a, Option<Instruction>>,
}

impl StepLatch {
    /// Allocate a latch nobody has signaled yet.
    pub fn new(name: &'static str) -> Self {
        StepLatch {
            name,
            signaled: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    /// Acquire the latch's lock. A poisoned lock is still usable: the protected value is a
    /// plain watermark that no panic can leave half-written.
    pub fn lock(&self) -> LatchGuard<'_> {
        LatchGuard {
            latch: self,
            guard: self.signaled.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Signal on behalf of `instruction`. `under_lock` runs while the lock is held and before
    /// the notification, so whatever it does happens-before the waiter's return.
    pub fn signal(&self, instruction: Instruction, under_lock: impl FnOnce()) {
        let mut guard = self.lock();
        under_lock();
        if *guard.guard < Some(instruction) {
            *guard.guard = Some(instruction);
        }
        trace!("[{}] signaled by instruction {}", self.name, instruction);
        self.cond.notify_all();
    }

    /// Wake every waiter so it re-checks its predicate. Takes the lock first so a waiter that
    /// is between checking and sleeping cannot miss the wakeup.
    pub fn wake_all(&self) {
        let _guard = self.lock();
        self.cond.notify_all();
    }

    /// Whether `instruction` (or a later one) has signaled.
    pub fn has_signaled(&self, instruction: Instruction) -> bool {
        *self.lock().guard >= Some(instruction)
    }
}

impl fmt::Debug for StepLatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let signaled = *self.lock().guard;
        f.debug_struct("StepLatch")
            .field("name", &self.name)
            .field("signaled", &signaled)
            .finish()
    }
}

impl LatchGuard<'_> {
    /// Block until `instruction` has signaled, releasing the lock while asleep.
    ///
    /// Returns early with `InterruptedWait` if an interrupt is or becomes pending, and with
    /// `Timeout` once `timeout` has elapsed. An interrupt wins over a signal that arrived at the
    /// same time.
    pub fn wait_for(
        self,
        instruction: Instruction,
        phase: WaitPhase,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<(), StepError> {
        self.wait_unless(instruction, phase, timeout, interrupt, || false)
    }

    /// Like `wait_for`, but also gives up with `EndedBeforeReady` once `ended` returns true.
    /// `ended` is checked whenever the waiter wakes, so whoever makes it true must then call
    /// `wake_all` on this latch.
    pub fn wait_unless(
        self,
        instruction: Instruction,
        phase: WaitPhase,
        timeout: Duration,
        interrupt: &Interrupt,
        ended: impl Fn() -> bool,
    ) -> Result<(), StepError> {
        let LatchGuard { latch, guard } = self;
        let (guard, _) = latch
            .cond
            .wait_timeout_while(guard, timeout, |signaled| {
                *signaled < Some(instruction) && !interrupt.is_pending() && !ended()
            })
            .unwrap_or_else(PoisonError::into_inner);

        if interrupt.take() {
            trace!(
                "[{}] wait for instruction {} interrupted",
                latch.name, instruction
            );
            return Err(StepError::InterruptedWait { phase });
        }
        if *guard >= Some(instruction) {
            Ok(())
        } else if ended() {
            Err(StepError::EndedBeforeReady { instruction })
        } else {
            Err(StepError::Timeout {
                phase,
                after: timeout,
            })
        }
    }
}
