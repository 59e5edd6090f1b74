/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

mod faults;
mod handshake;
mod ordering;

use std::sync::Arc;
use std::time::Duration;

use rendezvous::Config;
use rendezvous::Dispatcher;
use rendezvous::EventLog;
use rendezvous::FnWorker;
use rendezvous::SyncContext;
use rendezvous::WorkerHandle;

/// Generous bound for waits that are expected to succeed.
pub const PATIENT: Duration = Duration::from_secs(10);

/// A dispatcher whose context records into the returned log.
pub fn recorded(config: Config) -> (Dispatcher, Arc<EventLog>) {
    let log = Arc::new(EventLog::new());
    let ctx = Arc::new(SyncContext::with_observer(log.clone()));
    (Dispatcher::with_context(ctx, config), log)
}

pub fn patient_config() -> Config {
    Config::default().with_timeouts(PATIENT)
}

pub fn noop(name: &str) -> WorkerHandle {
    WorkerHandle::new(FnWorker::new(name, || Ok(())))
}
