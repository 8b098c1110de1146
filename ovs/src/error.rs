// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Error surface of the CLI adapter.

use flow::{FlowError, MatchFlowError};

/// Errors produced by the CLI adapter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Non-zero exit from an external control program, with its combined
    /// stdout and stderr captured.
    #[error("exit status {code}: {}", String::from_utf8_lossy(output))]
    Exec {
        /// Process exit code; `-1` when terminated by a signal.
        code: i32,
        /// Combined stdout and stderr bytes.
        output: Vec<u8>,
    },
    /// Failure to spawn or talk to the external process.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A flow failed to render or parse.
    #[error(transparent)]
    Flow(#[from] FlowError),
    /// A match flow failed to render.
    #[error(transparent)]
    MatchFlow(#[from] MatchFlowError),
    /// A JSON-formatted reply failed to decode.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// CLI output ended before the expected shape was complete.
    #[error("unexpected end of CLI output")]
    UnexpectedEof,
    /// Port statistics which do not match the dump-ports format.
    #[error("invalid port statistics")]
    InvalidPortStats,
    /// A table description which does not match the dump-tables format.
    #[error("invalid table description")]
    InvalidTable,
    /// Aggregate statistics which do not match the dump-aggregate format.
    #[error("invalid flow statistics")]
    InvalidFlowStats,
    /// An integer field of CLI output failed to parse.
    #[error("invalid integer in CLI output: {0:?}")]
    InvalidInteger(String),
    /// More than one entry returned where exactly one was requested.
    #[error("multiple values returned for a single port")]
    MultipleValues,
    /// A fail mode string this adapter does not recognize.
    #[error("unknown fail mode: {0:?}")]
    UnknownFailMode(String),
    /// A flow bundle function returned without committing.
    #[error("flow bundle was not committed")]
    NotCommitted,
    /// A flow bundle explicitly discarded by the caller; carries the cause.
    #[error("flow bundle discarded: {0}")]
    Discarded(String),
    /// An `ofproto/trace` output which does not contain `Datapath actions:`.
    #[error("invalid ofproto/trace output")]
    InvalidProtoTrace,
}

/// Reports whether `err` was caused by asking `ovs-vsctl` about a port which
/// does not exist. Callers use this to tell an idempotent delete from a real
/// failure.
#[must_use]
pub fn is_port_not_exist(err: &Error) -> bool {
    match err {
        Error::Exec { code, output } => {
            *code == 1 && output.starts_with(b"ovs-vsctl: no port named ")
        }
        _ => false,
    }
}
