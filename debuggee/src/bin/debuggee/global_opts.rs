/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::metadata::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;

use super::tracing::init_file_tracing;
use super::tracing::init_stderr_tracing;

/// The debuggee drives worker threads through a start, ready, trigger, finish handshake, one
/// at a time, so that an external controller can observe each worker at a known code location.
///
/// Standard output carries the controller channel: the line `ready` goes out once the host
/// reaches its handshake point, and the host then waits for `quit` on standard input.
///
/// Below are options common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct GlobalOpts {
    /// The verbosity level of log output.
    #[clap(short, long, value_name = "LEVEL", env = "RENDEZVOUS_LOG")]
    pub log: Option<LevelFilter>,

    /// Log to a file instead of the terminal.
    #[clap(long, value_name = "FILE", env = "RENDEZVOUS_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl GlobalOpts {
    /// Initializes tracing. The returned guard, if any, must live until the process exits.
    pub fn init_tracing(&self) -> anyhow::Result<Option<WorkerGuard>> {
        if let Some(path) = &self.log_file {
            let file_writer = File::create(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Ok(Some(init_file_tracing(self.log, file_writer)?))
        } else {
            init_stderr_tracing(self.log)?;
            Ok(None)
        }
    }
}
