/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Harness configuration.

use std::fmt;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use serde::Serialize;

use crate::status::STATUS_BASE;

/// How long the orchestrator waits for readiness or completion unless told otherwise.
pub const DEFAULT_WAIT_MILLIS: u64 = 30_000;

const DEFAULT_WAIT_STR: &str = "30000";

/// Configuration options for the rendezvous protocol.
#[derive(Debug, Serialize, Deserialize, Clone, Parser, PartialEq, Eq)]
pub struct Config {
    /// Upper bound, in milliseconds, on the wait for a freshly started worker to signal
    /// readiness. Expiry fails the step rather than hanging the orchestrator.
    #[clap(
        long = "ready-timeout-ms",
        value_name = "millis",
        default_value = DEFAULT_WAIT_STR,
        parse(try_from_str = parse_millis)
    )]
    pub ready_timeout: Duration,

    /// Upper bound, in milliseconds, on the wait for a worker to finish once it is ready.
    #[clap(
        long = "join-timeout-ms",
        value_name = "millis",
        default_value = DEFAULT_WAIT_STR,
        parse(try_from_str = parse_millis)
    )]
    pub join_timeout: Duration,

    /// Hold the instrumented lock from before the worker starts until the orchestrator has
    /// passed its communication point. The worker then reaches its trigger while the lock is
    /// contended, giving a controller a window to suspend both sides.
    #[clap(long)]
    pub hold_during_handshake: bool,

    /// Largest instruction index the dispatcher accepts. A step beyond it fails as an
    /// unexpected instruction and ends the sequence.
    #[clap(long, value_name = "index")]
    pub max_instructions: Option<u32>,

    /// Base added to the pass/fail offset to form the process exit code.
    #[clap(
        long,
        env = "RENDEZVOUS_STATUS_BASE",
        value_name = "int",
        default_value = "95"
    )]
    pub status_base: i32,
}

impl Config {
    /// Set both wait bounds at once. Mostly useful for tests that want to fail fast.
    pub fn with_timeouts(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self.join_timeout = timeout;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ready_timeout: Duration::from_millis(DEFAULT_WAIT_MILLIS),
            join_timeout: Duration::from_millis(DEFAULT_WAIT_MILLIS),
            hold_during_handshake: false,
            max_instructions: None,
            status_base: STATUS_BASE,
        }
    }
}

#[derive(Debug)]
struct ParseMillisError {
    details: String,
}

impl fmt::Display for ParseMillisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.details)
    }
}

impl std::error::Error for ParseMillisError {}

fn parse_millis(src: &str) -> Result<Duration, ParseMillisError> {
    match src.parse::<u64>() {
        Ok(0) => Err(ParseMillisError {
            details: "a zero timeout would fail every wait, expected a positive integer".into(),
        }),
        Ok(n) => Ok(Duration::from_millis(n)),
        Err(e) => Err(ParseMillisError {
            details: format!("Unable to parse {:?} as milliseconds: {}", src, e),
        }),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_command_line_matches_default() {
        let parsed = Config::parse_from(["rendezvous"]);
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn timeouts_parse_as_millis() {
        let parsed = Config::parse_from([
            "rendezvous",
            "--ready-timeout-ms",
            "250",
            "--join-timeout-ms",
            "1500",
            "--hold-during-handshake",
            "--max-instructions",
            "4",
        ]);
        assert_eq!(parsed.ready_timeout, Duration::from_millis(250));
        assert_eq!(parsed.join_timeout, Duration::from_millis(1500));
        assert!(parsed.hold_during_handshake);
        assert_eq!(parsed.max_instructions, Some(4));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Config::try_parse_from(["rendezvous", "--ready-timeout-ms", "0"]).is_err());
        assert!(parse_millis("soon").is_err());
    }

    #[test]
    fn config_serde_round_trips() {
        let cfg = Config::default().with_timeouts(Duration::from_millis(10));
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
