/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Replay verification: run the step-filter sequence several times on fresh state, keep what
//! each run observed in its own directory, and diff every run against the first.

use std::fs;
use std::fs::create_dir;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use rendezvous::Config;
use rendezvous::Dispatcher;
use rendezvous::EventLog;
use rendezvous::ExitStatus;
use rendezvous::StepEvent;
use rendezvous::SyncContext;
use tempfile::tempdir_in;
use tempfile::TempDir;
use tracing::debug;

use crate::fixtures::step_filter_workers;
use crate::fixtures::Journal;

pub struct TemporaryEnvironmentBuilder {
    // Whether to keep the temp directory once the environment is dropped
    keep_temp_dir: bool,
    // Count of run directories to prepare
    run_count: usize,
    // Where the root temp directory is created
    temp_dir_path: PathBuf,
}

impl TemporaryEnvironmentBuilder {
    pub fn new() -> TemporaryEnvironmentBuilder {
        TemporaryEnvironmentBuilder {
            keep_temp_dir: false,
            run_count: 2,
            temp_dir_path: std::env::temp_dir(),
        }
    }

    /// Create the environment under `path` instead of the system temp dir. An explicit
    /// location is always kept.
    pub fn temp_dir_path(mut self, path: Option<&PathBuf>) -> TemporaryEnvironmentBuilder {
        if let Some(p) = path {
            self.keep_temp_dir = true;
            self.temp_dir_path = p.to_owned();
        }
        self
    }

    pub fn persist_temp_dir(mut self, persist: bool) -> TemporaryEnvironmentBuilder {
        self.keep_temp_dir = persist;
        self
    }

    pub fn run_count(mut self, run_count: usize) -> TemporaryEnvironmentBuilder {
        self.run_count = run_count;
        self
    }

    fn create_file(root_dir_path: &Path, file_name: &str) -> anyhow::Result<PathBuf> {
        let file_path = root_dir_path.join(file_name);
        File::create(&file_path)
            .with_context(|| format!("creating {}", file_path.display()))?;
        Ok(file_path)
    }

    pub fn build(self) -> anyhow::Result<TemporaryEnvironment> {
        if !self.temp_dir_path.exists() {
            fs::create_dir_all(&self.temp_dir_path)?;
        }
        let root = tempdir_in(&self.temp_dir_path)?;
        debug!("verify root dir created: {}", root.path().display());

        let mut run_envs = Vec::with_capacity(self.run_count);
        for i in 1..=self.run_count {
            let dir = root.path().join(i.to_string());
            create_dir(&dir).with_context(|| format!("creating {}", dir.display()))?;
            run_envs.push(RunEnvironment {
                event_log_path: Self::create_file(&dir, "events.jsonl")?,
                journal_path: Self::create_file(&dir, "journal")?,
                exit_status_path: Self::create_file(&dir, "exit_status")?,
                dir,
            });
            debug!("environment for run #{} initialized", i);
        }

        let path = if self.keep_temp_dir {
            #[allow(deprecated)]
            let kept = root.into_path();
            EnvPath::Path(kept)
        } else {
            // Bind the temp dir's lifetime to the environment.
            EnvPath::Temp(root)
        };
        Ok(TemporaryEnvironment { path, run_envs })
    }
}

impl Default for TemporaryEnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TemporaryEnvironment {
    path: EnvPath,
    run_envs: Vec<RunEnvironment>,
}

impl TemporaryEnvironment {
    pub fn runs(&self) -> &[RunEnvironment] {
        &self.run_envs
    }

    pub fn path(&self) -> &Path {
        self.path.path()
    }
}

pub enum EnvPath {
    Temp(TempDir),
    Path(PathBuf),
}

impl EnvPath {
    pub fn path(&self) -> &Path {
        match self {
            EnvPath::Temp(path) => path.path(),
            EnvPath::Path(path) => path.as_path(),
        }
    }
}

/// The files one run writes.
#[derive(Debug, Clone)]
pub struct RunEnvironment {
    pub dir: PathBuf,
    /// Step events, one JSON object per line.
    pub event_log_path: PathBuf,
    /// Lines the fixtures noted.
    pub journal_path: PathBuf,
    /// The exit code the run would have ended with.
    pub exit_status_path: PathBuf,
}

/// Run the step-filter sequence on a fresh context and write what it observed into `env`.
pub fn record_run(env: &RunEnvironment, config: &Config) -> anyhow::Result<ExitStatus> {
    let log = Arc::new(EventLog::new());
    let journal = Arc::new(Journal::new());
    let ctx = Arc::new(SyncContext::with_observer(log.clone()));
    let mut dispatcher = Dispatcher::with_context(ctx, config.clone());

    let status = dispatcher.run_sequence(step_filter_workers(&journal));

    write_events(&env.event_log_path, &log.events())?;
    let mut lines = journal.lines().join("\n");
    lines.push('\n');
    fs::write(&env.journal_path, lines)
        .with_context(|| format!("writing {}", env.journal_path.display()))?;
    fs::write(
        &env.exit_status_path,
        format!("{}\n", status.code(config.status_base)),
    )
    .with_context(|| format!("writing {}", env.exit_status_path.display()))?;
    Ok(status)
}

fn write_events(path: &Path, events: &[StepEvent]) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for event in events {
        serde_json::to_writer(&mut writer, event)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Compares what two runs wrote, printing a colored line diff of anything that differs.
pub struct Verify;

impl Verify {
    fn verify_files(left: &Path, right: &Path) -> anyhow::Result<bool> {
        let left = fs::read_to_string(left)
            .with_context(|| format!("reading {}", left.display()))?;
        let right = fs::read_to_string(right)
            .with_context(|| format!("reading {}", right.display()))?;
        let result = similar::TextDiff::configure()
            .algorithm(similar::Algorithm::Myers)
            .diff_lines(&left, &right);

        if result.ratio() == 1.0 {
            Ok(true)
        } else {
            for c in result.iter_all_changes() {
                match c.tag() {
                    similar::ChangeTag::Equal => print!("{}", c),
                    similar::ChangeTag::Delete => {
                        print!("{}", format!("-{}", c).red().bold())
                    }
                    similar::ChangeTag::Insert => {
                        print!("{}", format!("+{}", c).green().bold())
                    }
                }
            }
            Ok(false)
        }
    }

    pub fn verify_events(left: &RunEnvironment, right: &RunEnvironment) -> anyhow::Result<bool> {
        println!("{}", "::  Comparing step events".bold());
        Self::verify_files(&left.event_log_path, &right.event_log_path)
    }

    pub fn verify_journals(left: &RunEnvironment, right: &RunEnvironment) -> anyhow::Result<bool> {
        println!("{}", "::  Comparing journals".bold());
        Self::verify_files(&left.journal_path, &right.journal_path)
    }

    pub fn verify_exit_statuses(
        left: &RunEnvironment,
        right: &RunEnvironment,
    ) -> anyhow::Result<bool> {
        println!("{}", "::  Comparing exit codes".bold());
        Self::verify_files(&left.exit_status_path, &right.exit_status_path)
    }

    /// Check every run against the first. True if all of them match.
    pub fn verify_runs(env: &TemporaryEnvironment) -> anyhow::Result<bool> {
        let (first, rest) = match env.runs().split_first() {
            Some(split) => split,
            None => return Ok(true),
        };
        let mut all_equal = true;
        for (i, other) in rest.iter().enumerate() {
            println!("{}", format!("Run #1 vs run #{}", i + 2).bold());
            // Keep comparing after a mismatch so every difference is printed.
            let events = Self::verify_events(first, other)?;
            let journals = Self::verify_journals(first, other)?;
            let statuses = Self::verify_exit_statuses(first, other)?;
            all_equal &= events && journals && statuses;
        }
        Ok(all_equal)
    }
}
