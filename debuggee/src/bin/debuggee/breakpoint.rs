/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use debuggee::fixtures::BreakpointTask;
use debuggee::ControllerChannel;
use debuggee::Journal;
use debuggee::LinePipe;
use rendezvous::Config;
use rendezvous::Dispatcher;
use rendezvous::Runnable;
use rendezvous::WorkerHandle;
use rendezvous_model::status::FAILED;
use rendezvous_model::status::PASSED;
use tracing::debug;

use crate::global_opts::GlobalOpts;

/// Construct a named task with a single breakpoint location, announce `ready`, and wait for
/// the controller. Passes only if the controller answers `quit`.
#[derive(Debug, Parser)]
pub struct BreakpointOpts {
    #[clap(flatten)]
    config: Config,

    /// Name of the task. The breakpoint location logs `<name>::Breakpoint is reached`.
    #[clap(long, value_name = "NAME", default_value = "task")]
    task_name: String,

    /// Run the task as a single step before announcing readiness.
    #[clap(long)]
    run_task: bool,
}

impl BreakpointOpts {
    pub fn status_base(&self) -> i32 {
        self.config.status_base
    }

    pub fn main(&self, _global: &GlobalOpts) -> anyhow::Result<i32> {
        let journal = Arc::new(Journal::new());
        let task = BreakpointTask::new(self.task_name.as_str(), journal);
        debug!("constructed task {}", task.name());

        let mut passed = true;
        if self.run_task {
            let status =
                Dispatcher::new(self.config.clone()).run_sequence(vec![WorkerHandle::new(task)]);
            passed = status.passed();
        }

        passed &= LinePipe::stdio()
            .handshake()
            .context("talking to the controller")?;
        Ok(self.config.status_base + if passed { PASSED } else { FAILED })
    }
}
