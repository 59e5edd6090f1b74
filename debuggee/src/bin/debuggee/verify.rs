/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use debuggee::verify::record_run;
use debuggee::verify::TemporaryEnvironmentBuilder;
use debuggee::verify::Verify;
use rendezvous::Config;
use rendezvous_model::status::FAILED;
use rendezvous_model::status::PASSED;

use crate::global_opts::GlobalOpts;

/// Run the `steps` sequence several times on fresh state and check that every run saw the
/// same step events, the same fixture output and the same exit code.
#[derive(Debug, Parser)]
pub struct VerifyOpts {
    #[clap(flatten)]
    config: Config,

    /// How many runs to compare.
    #[clap(long, value_name = "N", default_value = "2")]
    runs: usize,

    /// Where to put the per-run directories. An explicit location is kept after exit.
    #[clap(long, value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// Keep the per-run directories after exit.
    #[clap(long)]
    keep_temp_dir: bool,
}

impl VerifyOpts {
    pub fn status_base(&self) -> i32 {
        self.config.status_base
    }

    pub fn main(&self, _global: &GlobalOpts) -> anyhow::Result<i32> {
        if self.runs < 2 {
            anyhow::bail!("--runs must be at least 2, got {}", self.runs);
        }
        let env = TemporaryEnvironmentBuilder::new()
            .run_count(self.runs)
            .persist_temp_dir(self.keep_temp_dir)
            .temp_dir_path(self.temp_dir.as_ref())
            .build()
            .context("preparing the run directories")?;

        for (i, run) in env.runs().iter().enumerate() {
            let status = record_run(run, &self.config)
                .with_context(|| format!("recording run #{}", i + 1))?;
            println!("Run #{}: {}", i + 1, status);
        }

        let identical = Verify::verify_runs(&env)?;
        if identical {
            println!("{}", "Success: all runs are identical".green().bold());
        } else {
            println!("{}", "Failure: runs differ".red().bold());
        }
        if self.keep_temp_dir || self.temp_dir.is_some() {
            println!(
                "{}",
                format!("Run artifacts kept in {}", env.path().display()).dimmed()
            );
        }
        Ok(self.config.status_base + if identical { PASSED } else { FAILED })
    }
}
