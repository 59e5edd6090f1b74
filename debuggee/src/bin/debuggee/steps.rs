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
use debuggee::fixtures::step_filter_workers;
use debuggee::ControllerChannel;
use debuggee::Journal;
use debuggee::LinePipe;
use rendezvous::Config;
use rendezvous::Dispatcher;
use rendezvous_model::status::FAILED;
use rendezvous_model::status::PASSED;
use tracing::info;

use crate::global_opts::GlobalOpts;

/// Run `thread1` then `thread2` through the handshake. Each worker's instrumented path is a
/// two-level call chain (`m11` into `m10`, `m21` into `m20`) that a controller can step
/// through with class and method filters.
#[derive(Debug, Parser)]
pub struct StepsOpts {
    #[clap(flatten)]
    config: Config,

    /// Once both workers are joined, announce `ready` and wait for the controller to send
    /// `quit`.
    #[clap(long)]
    await_quit: bool,

    /// Do not hold the instrumented lock across the handshake. By default the orchestrator
    /// holds it from before each worker starts until after its communication point, so every
    /// worker reaches its trigger on a contended lock.
    #[clap(long)]
    release_during_handshake: bool,
}

impl StepsOpts {
    pub fn status_base(&self) -> i32 {
        self.config.status_base
    }

    fn effective_config(&self) -> Config {
        let mut config = self.config.clone();
        config.hold_during_handshake = !self.release_during_handshake;
        config
    }

    pub fn main(&self, _global: &GlobalOpts) -> anyhow::Result<i32> {
        info!("debuggee started");
        let journal = Arc::new(Journal::new());
        let mut dispatcher =
            Dispatcher::new(self.effective_config()).with_communication_point(|_ctx, ix| {
                info!("communication point ----{}", ix.as_raw() + 1);
            });

        let status = dispatcher.run_sequence(step_filter_workers(&journal));
        info!("sequence status: {}", status);

        let mut passed = status.passed();
        if self.await_quit {
            passed &= LinePipe::stdio()
                .handshake()
                .context("talking to the controller")?;
        }
        info!("debuggee exits");
        Ok(self.config.status_base + if passed { PASSED } else { FAILED })
    }
}
