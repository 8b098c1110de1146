// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! OVSDB JSON-RPC client per RFC 7047.
//!
//! A [`Client`] multiplexes many in-flight RPCs over one full-duplex byte
//! stream, answers server-initiated `echo` liveness probes, and optionally
//! runs its own keep-alive loop. Transactions are expressed as typed
//! operations ([`Select`]) and return flattened [`Row`]s.

#![deny(clippy::all)]

pub mod client;
pub mod error;
pub mod transact;

pub(crate) mod jsonrpc;

pub use client::{Client, ClientBuilder, ClientStats};
pub use error::{Error, OvsdbError};
pub use jsonrpc::Transport;
pub use transact::{Cond, Op, Row, Select};
