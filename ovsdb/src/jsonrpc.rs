// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! JSON-RPC framing over a full-duplex byte stream.
//!
//! Messages are bare JSON values back to back, with no length prefix. The
//! encoder and decoder sides are guarded by separate mutexes so concurrent
//! send and receive never interleave within one value.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::Error;

/// The byte stream an OVSDB client runs over, most commonly a unix socket.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// A JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Request {
    pub id: String,
    pub method: String,
    /// Always a concrete value; the server refuses `params: null`, so an
    /// omitted argument list is sent as the empty array.
    pub params: Value,
}

/// A JSON-RPC response, or a server-initiated request notification (null
/// `id` or populated `method`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
}

/// A JSON-RPC connection.
pub(crate) struct Conn<T> {
    writer: Mutex<WriteHalf<T>>,
    reader: Mutex<Reader<T>>,
}

struct Reader<T> {
    inner: ReadHalf<T>,
    buf: Vec<u8>,
    pos: usize,
}

impl<T: Transport> Conn<T> {
    pub(crate) fn new(stream: T) -> Self {
        let (read, write) = tokio::io::split(stream);
        Conn {
            writer: Mutex::new(write),
            reader: Mutex::new(Reader {
                inner: read,
                buf: Vec::new(),
                pos: 0,
            }),
        }
    }

    /// Sends a single request.
    pub(crate) async fn send(&self, req: &Request) -> Result<(), Error> {
        if req.id.is_empty() {
            return Err(Error::EmptyRequestId);
        }

        let bytes = serde_json::to_vec(req).map_err(Error::Encode)?;
        trace!(msg = %String::from_utf8_lossy(&bytes), "send");

        let mut w = self.writer.lock().await;
        w.write_all(&bytes).await?;
        w.flush().await?;
        Ok(())
    }

    /// Receives the next message, reading more bytes as needed to complete
    /// one JSON value.
    pub(crate) async fn recv(&self) -> Result<Response, Error> {
        let mut r = self.reader.lock().await;

        loop {
            if r.pos < r.buf.len() {
                let parsed = {
                    let mut stream = serde_json::Deserializer::from_slice(&r.buf[r.pos..])
                        .into_iter::<Response>();
                    match stream.next() {
                        Some(Ok(res)) => Some(Ok((res, stream.byte_offset()))),
                        Some(Err(e)) if e.is_eof() => None,
                        Some(Err(e)) => Some(Err(e)),
                        None => None,
                    }
                };

                match parsed {
                    Some(Ok((res, consumed))) => {
                        r.pos += consumed;
                        if r.pos == r.buf.len() {
                            r.buf.clear();
                            r.pos = 0;
                        }
                        trace!(id = ?res.id, method = ?res.method, "recv");
                        return Ok(res);
                    }
                    Some(Err(e)) => return Err(Error::Decode(e)),
                    None => {}
                }
            }

            let mut chunk = [0u8; 4096];
            let n = r.inner.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::Eof);
            }
            // Drop the consumed prefix before appending so the buffer does
            // not grow without bound on a long-lived connection.
            if r.pos > 0 {
                let pos = r.pos;
                r.buf.drain(..pos);
                r.pos = 0;
            }
            r.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Shuts down the write side so the peer sees a clean close.
    pub(crate) async fn shutdown(&self) {
        let mut w = self.writer.lock().await;
        let _ = w.shutdown().await;
    }
}
