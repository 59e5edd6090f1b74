/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The controller channel: one line out saying the host is ready, one line in saying what to
//! do next.

use std::io;
use std::io::BufRead;
use std::io::StdinLock;
use std::io::Stdout;
use std::io::Write;

use tracing::debug;
use tracing::error;
use tracing::info;

/// The line written once the host has reached its handshake point.
pub const READY: &str = "ready";

/// The only command that lets the host pass.
pub const QUIT: &str = "quit";

/// What the controller told the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Finish successfully.
    Quit,
    /// Any other line.
    Other(String),
    /// The controller went away without saying anything.
    Closed,
}

impl Command {
    /// Interpret one line from the controller. Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Command {
        match line.trim() {
            QUIT => Command::Quit,
            other => Command::Other(other.to_owned()),
        }
    }

    /// Only `quit` lets the host pass.
    pub fn is_quit(&self) -> bool {
        matches!(self, Command::Quit)
    }
}

/// A duplex, line-oriented link to the controller.
pub trait ControllerChannel {
    /// Tell the controller the host is ready.
    fn announce_ready(&mut self) -> io::Result<()>;

    /// Block until the controller sends a line.
    fn await_command(&mut self) -> io::Result<Command>;

    /// Announce readiness, then wait for the verdict. Returns true if the controller said
    /// `quit`.
    fn handshake(&mut self) -> io::Result<bool> {
        self.announce_ready()?;
        let command = self.await_command()?;
        if command.is_quit() {
            info!("debuggee completed successfully");
            Ok(true)
        } else {
            error!("unexpected signal of debugger: {:?}", command);
            Ok(false)
        }
    }
}

/// A `ControllerChannel` over any reader and writer, stdin and stdout by default.
#[derive(Debug)]
pub struct LinePipe<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> LinePipe<R, W> {
    /// A channel reading commands from `reader` and writing announcements to `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        LinePipe { reader, writer }
    }

    /// Give back the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl LinePipe<StdinLock<'static>, Stdout> {
    /// A channel over this process's standard input and output.
    pub fn stdio() -> Self {
        LinePipe::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ControllerChannel for LinePipe<R, W> {
    fn announce_ready(&mut self) -> io::Result<()> {
        writeln!(self.writer, "{}", READY)?;
        self.writer.flush()
    }

    fn await_command(&mut self) -> io::Result<Command> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            debug!("controller closed the channel");
            return Ok(Command::Closed);
        }
        Ok(Command::parse(&line))
    }
}
