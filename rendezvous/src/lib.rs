/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Rendezvous drives worker threads through a fixed start, ready, trigger, finish protocol so
//! an external controller can observe each worker at a known point, one worker at a time.
//!
//! The orchestrator hands a list of [`WorkerHandle`]s to a [`Dispatcher`]. For every
//! instruction it starts one worker and waits for it to signal readiness under the rendezvous
//! lock; the worker then runs its instrumented path while holding the instrumented lock, and
//! the orchestrator joins it before moving on.

#![deny(clippy::all)]
#![deny(missing_docs)]
#![allow(clippy::uninlined_format_args)]

pub mod steplog;

mod context;
mod dispatcher;
mod error;
mod latch;
mod observer;
mod synchronizer;
mod trigger;
mod worker;

pub use context::SyncContext;
pub use context::TriggerGauge;
pub use dispatcher::Dispatcher;
pub use dispatcher::InstructionCounter;
pub use dispatcher::StepOutcome;
pub use dispatcher::Steps;
pub use error::StepError;
pub use error::WaitPhase;
pub use latch::Interrupt;
pub use latch::LatchGuard;
pub use latch::StepLatch;
pub use observer::EventLog;
pub use observer::NullObserver;
pub use observer::StepObserver;
pub use rendezvous_model::Config;
pub use rendezvous_model::EventKind;
pub use rendezvous_model::ExitStatus;
pub use rendezvous_model::Instruction;
pub use rendezvous_model::StepEvent;
pub use rendezvous_model::StepState;
pub use synchronizer::Ready;
pub use synchronizer::Synchronizer;
pub use worker::FnWorker;
pub use worker::PathResult;
pub use worker::Runnable;
pub use worker::WorkerHandle;
