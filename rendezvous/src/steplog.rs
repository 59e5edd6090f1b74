/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Macros for STEPLOG entries: log lines whose content and order must be identical on every
//! unfaulted run of the same sequence.
//! ['steplog'] writes a deterministic entry at INFO level
//! ['steplog_debug'] writes a deterministic entry at DEBUG level

/// Macro used to encapsulate tracing should-be-deterministic information.
/// This is currently at the INFO log level.
#[macro_export]
macro_rules! steplog {
    ($($arg:tt)+) => {{
        tracing::info!("STEPLOG {}", format!($($arg)+));
    }};
}

/// Macro used to encapsulate tracing should-be-deterministic information.
/// This variant is at a higher log level and requires that logging verbosity is
/// set to DEBUG.
#[macro_export]
macro_rules! steplog_debug {
    ($($arg:tt)+) => {{
        tracing::debug!("STEPLOG {}", format!($($arg)+));
    }};
}
