// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Subprocess execution seams.
//!
//! The [`Client`](crate::Client) never spawns processes directly; it goes
//! through these traits so tests can substitute a closure for the external
//! tools.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::Error;

/// Runs an external command and returns its combined stdout and stderr.
pub trait Executor: Send + Sync {
    /// Executes `cmd` with `args`, returning the combined output bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exec`] for a non-zero exit, [`Error::Io`] when the
    /// process cannot be spawned.
    fn exec(&self, cmd: &str, args: &[String]) -> Result<Vec<u8>, Error>;
}

/// Runs an external command with bytes streamed to its stdin.
pub trait Piper: Send + Sync {
    /// Executes `cmd` with `args`, writing `stdin` to the child before
    /// collecting its combined output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exec`] for a non-zero exit, [`Error::Io`] when the
    /// process cannot be spawned or its pipe breaks.
    fn exec_with_stdin(&self, stdin: &[u8], cmd: &str, args: &[String]) -> Result<Vec<u8>, Error>;
}

impl<F> Executor for F
where
    F: Fn(&str, &[String]) -> Result<Vec<u8>, Error> + Send + Sync,
{
    fn exec(&self, cmd: &str, args: &[String]) -> Result<Vec<u8>, Error> {
        self(cmd, args)
    }
}

/// The default [`Executor`]: spawn the binary and wait for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn exec(&self, cmd: &str, args: &[String]) -> Result<Vec<u8>, Error> {
        let out = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        finish(out)
    }
}

/// The default [`Piper`]: spawn the binary, write stdin fully, close the
/// pipe, then wait. The stdin pipe must be fully consumed before the wait
/// returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPiper;

impl Piper for SystemPiper {
    fn exec_with_stdin(&self, stdin: &[u8], cmd: &str, args: &[String]) -> Result<Vec<u8>, Error> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        {
            let mut pipe = child.stdin.take().ok_or_else(|| {
                Error::Io(std::io::Error::other("child stdin was not piped"))
            })?;
            pipe.write_all(stdin)?;
            // Dropping the handle closes the pipe so the child sees EOF.
        }

        finish(child.wait_with_output()?)
    }
}

/// Merges stdout and stderr and maps a non-zero exit into [`Error::Exec`].
fn finish(out: std::process::Output) -> Result<Vec<u8>, Error> {
    let mut combined = out.stdout;
    combined.extend_from_slice(&out.stderr);

    if out.status.success() {
        Ok(combined)
    } else {
        Err(Error::Exec {
            code: out.status.code().unwrap_or(-1),
            output: combined,
        })
    }
}
