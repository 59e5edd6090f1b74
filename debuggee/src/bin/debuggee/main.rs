/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

// Treat all Clippy warnings as errors.
#![deny(clippy::all)]

mod breakpoint;
mod global_opts;
mod steps;
mod tracing;
mod verify;

use clap::Parser;
use colored::*;
use rendezvous_model::status::FAILED;
use rendezvous_model::status::STATUS_BASE;

use self::breakpoint::BreakpointOpts;
use self::global_opts::GlobalOpts;
use self::steps::StepsOpts;
use self::verify::VerifyOpts;

#[derive(Debug, Parser)]
#[clap(name = "debuggee", version)]
struct Args {
    #[clap(flatten)]
    global: GlobalOpts,

    #[clap(subcommand)]
    command: Subcommand,
}

#[derive(Debug, Parser)]
enum Subcommand {
    /// Run two workers whose instrumented paths are call chains for step filters.
    Steps(StepsOpts),

    /// Wait at a breakpoint-bounds handshake with the controller.
    Breakpoint(BreakpointOpts),

    /// Check that repeated runs of the step sequence are identical.
    Verify(VerifyOpts),
}

impl Subcommand {
    fn main(&self, global: &GlobalOpts) -> anyhow::Result<i32> {
        match self {
            Subcommand::Steps(x) => x.main(global),
            Subcommand::Breakpoint(x) => x.main(global),
            Subcommand::Verify(x) => x.main(global),
        }
    }

    fn status_base(&self) -> i32 {
        match self {
            Subcommand::Steps(x) => x.status_base(),
            Subcommand::Breakpoint(x) => x.status_base(),
            Subcommand::Verify(x) => x.status_base(),
        }
    }
}

fn main() {
    let Args { global, command } = Args::parse();

    let guard = match global.init_tracing() {
        Ok(guard) => guard,
        Err(err) => {
            display_error(err);
            std::process::exit(STATUS_BASE + FAILED);
        }
    };

    let code = command.main(&global).unwrap_or_else(|err| {
        display_error(err);
        command.status_base() + FAILED
    });

    // `exit` skips destructors, so flush the log writer first.
    drop(guard);
    std::process::exit(code);
}

fn display_error(error: anyhow::Error) {
    let mut chain = error.chain();

    if let Some(error) = chain.next() {
        eprintln!("{}: {}", "Error".red().bold(), error);
    }

    for cause in chain {
        eprintln!("     {} {}", ">".dimmed().bold(), cause);
    }
}
