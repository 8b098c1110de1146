// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Error surface of the OVSDB client.

use serde::Deserialize;

/// Errors produced by the OVSDB client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The client was closed, or closed underneath a waiting RPC.
    #[error("ovsdb client closed")]
    Closed,
    /// The stream ended. Deliberately carries no extra text so callers can
    /// check for a clean end of stream.
    #[error("EOF")]
    Eof,
    /// Transport failure on the underlying stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A request could not be encoded.
    #[error("failed to encode JSON-RPC request: {0}")]
    Encode(serde_json::Error),
    /// A message could not be decoded.
    #[error("failed to decode JSON-RPC response: {0}")]
    Decode(serde_json::Error),
    /// A request with an empty id; the dispatcher could never route its
    /// reply.
    #[error("JSON-RPC request ID must not be empty")]
    EmptyRequestId,
    /// The server returned a JSON-RPC level error; the raw JSON of the
    /// `error` member is preserved.
    #[error("received JSON-RPC error: {0}")]
    Rpc(serde_json::Value),
    /// The server returned an OVSDB application error inside `result`.
    #[error(transparent)]
    Ovsdb(#[from] OvsdbError),
}

/// An application error returned by an OVSDB server inside `result`, per
/// RFC 7047 §4.1.4.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, thiserror::Error)]
#[error("{error}: {details}: {syntax}")]
pub struct OvsdbError {
    /// Error class.
    pub error: String,
    /// Human-readable detail.
    #[serde(default)]
    pub details: String,
    /// The offending request fragment.
    #[serde(default)]
    pub syntax: String,
}
