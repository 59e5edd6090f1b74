/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Widely-shared type definitions for the rendezvous harness.

#![deny(missing_docs)]

pub mod config;
pub mod event;
pub mod status;
pub mod step;

pub use config::Config;
pub use event::EventKind;
pub use event::StepEvent;
pub use status::ExitStatus;
pub use status::Failure;
pub use step::Instruction;
pub use step::StepState;
