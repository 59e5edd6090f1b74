/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Host-side pieces of the debuggee: the line channel an external controller drives it
//! through, the worker fixtures it runs, and the replay check behind `debuggee verify`.

#![deny(clippy::all)]
#![allow(clippy::uninlined_format_args)]

pub mod channel;
pub mod fixtures;
pub mod verify;

pub use channel::Command;
pub use channel::ControllerChannel;
pub use channel::LinePipe;
pub use fixtures::Journal;
