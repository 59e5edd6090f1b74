/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The synchronization state shared by the orchestrator and its workers.

use std::fmt;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::TryLockError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use rendezvous_model::Instruction;
use rendezvous_model::StepEvent;

use crate::latch::Interrupt;
use crate::latch::StepLatch;
use crate::observer::NullObserver;
use crate::observer::StepObserver;

/// How often a bounded acquisition of the instrumented lock retries.
const LOCK_POLL: Duration = Duration::from_millis(1);

/// Everything the orchestrator and a worker share. Created once per run, before any worker
/// starts, and handed to each worker by `Arc`.
///
/// The rendezvous latch and the instrumented lock are deliberately separate objects so the
/// two rendezvous events can never be confused with one another.
pub struct SyncContext {
    rendezvous: StepLatch,
    completion: StepLatch,
    instrumented: Mutex<()>,
    instruction: AtomicU32,
    interrupt: Interrupt,
    gauge: TriggerGauge,
    observer: Arc<dyn StepObserver>,
}

impl SyncContext {
    /// A context whose events go nowhere.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NullObserver))
    }

    /// A context that reports every step event to `observer`.
    pub fn with_observer(observer: Arc<dyn StepObserver>) -> Self {
        SyncContext {
            rendezvous: StepLatch::new("rendezvous"),
            completion: StepLatch::new("completion"),
            instrumented: Mutex::new(()),
            instruction: AtomicU32::new(0),
            interrupt: Interrupt::default(),
            gauge: TriggerGauge::default(),
            observer,
        }
    }

    /// The rendezvous lock and readiness signal.
    pub fn rendezvous(&self) -> &StepLatch {
        &self.rendezvous
    }

    /// The latch workers signal once their run is over.
    pub fn completion(&self) -> &StepLatch {
        &self.completion
    }

    /// Acquire the instrumented lock, blocking while another party holds it.
    ///
    /// Nothing is protected by this lock, so poisoning carries no information and is ignored.
    pub fn lock_instrumented(&self) -> MutexGuard<'_, ()> {
        self.instrumented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire the instrumented lock only if nobody holds it.
    pub fn try_lock_instrumented(&self) -> Option<MutexGuard<'_, ()>> {
        match self.instrumented.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(p)) => Some(p.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Acquire the instrumented lock, giving up after `timeout`. A worker abandoned at its join
    /// timeout may hold the lock for arbitrarily long, so the orchestrator never blocks on it
    /// unbounded.
    pub fn lock_instrumented_within(&self, timeout: Duration) -> Option<MutexGuard<'_, ()>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(guard) = self.try_lock_instrumented() {
                return Some(guard);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(LOCK_POLL.min(deadline - now));
        }
    }

    /// The instruction the orchestrator is currently driving.
    pub fn current_instruction(&self) -> Instruction {
        Instruction::from_raw(self.instruction.load(Ordering::SeqCst))
    }

    pub(crate) fn set_instruction(&self, instruction: Instruction) {
        self.instruction
            .store(instruction.as_raw(), Ordering::SeqCst);
    }

    /// Interrupt the orchestrator. Its current wait, or its next one if it is not waiting,
    /// fails with `InterruptedWait`.
    pub fn interrupt(&self) {
        self.interrupt.raise();
        self.rendezvous.wake_all();
        self.completion.wake_all();
    }

    /// Whether an interrupt has been raised that no wait has reported yet.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_pending()
    }

    pub(crate) fn pending_interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Counters for the instrumented region.
    pub fn trigger_gauge(&self) -> &TriggerGauge {
        &self.gauge
    }

    /// Report a step event to the observer and the STEPLOG.
    pub(crate) fn record(&self, event: StepEvent) {
        crate::steplog!("[instruction {}] {}", event.instruction, event);
        self.observer.observe(&event);
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("rendezvous", &self.rendezvous)
            .field("completion", &self.completion)
            .field("instruction", &self.current_instruction())
            .field("interrupt", &self.interrupt)
            .field("gauge", &self.gauge)
            .finish_non_exhaustive()
    }
}

/// Counts workers inside the instrumented region.
#[derive(Debug, Default)]
pub struct TriggerGauge {
    active: AtomicUsize,
    high_water: AtomicUsize,
    total: AtomicUsize,
}

/// Decrements the gauge's active count when dropped.
pub(crate) struct GaugeGuard<'a>(&'a TriggerGauge);

impl TriggerGauge {
    pub(crate) fn enter(&self) -> GaugeGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        GaugeGuard(self)
    }

    /// Workers inside the region right now.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// The most workers ever inside the region at once.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    /// How many times the region was entered.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}
