// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The multiplexed OVSDB client.
//!
//! Three long-running tasks cooperate per client: the receive loop drains
//! the decoder and dispatches messages; the echo-send loop answers liveness
//! probes; the echo-tick loop (only with a configured interval) schedules
//! periodic probes. All three select against one cancellation token, and
//! [`Client::close`] waits for each of them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, OvsdbError};
use crate::jsonrpc::{Conn, Request, Response, Transport};
use crate::transact::{Op, Row};

/// Statistics about a [`Client`]'s internal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Number of RPC callbacks currently registered. Zero once the client
    /// is closed and every caller has returned.
    pub callbacks_current: usize,
    /// Echo RPCs which completed successfully.
    pub echo_success: u64,
    /// Echo RPCs which failed.
    pub echo_failure: u64,
}

/// Builder for [`Client`] options.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    echo_interval: Option<Duration>,
}

impl ClientBuilder {
    /// Sends a keep-alive `echo` RPC at this interval.
    #[must_use]
    pub fn echo_interval(mut self, interval: Duration) -> Self {
        self.echo_interval = Some(interval);
        self
    }

    /// Wraps an established stream and starts the client's tasks.
    pub fn build<T: Transport + 'static>(self, stream: T) -> Client {
        let inner = Arc::new(Shared {
            conn: Conn::new(Box::new(stream) as Box<dyn Transport>),
            callbacks: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(0),
            echo_success: AtomicU64::new(0),
            echo_failure: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        });

        // An unread signal is enough; ticks and notifications coalesce.
        let (echo_tx, echo_rx) = mpsc::channel(1);

        let mut tasks = Vec::with_capacity(3);
        tasks.push(tokio::spawn(receive_loop(Arc::clone(&inner), echo_tx.clone())));
        tasks.push(tokio::spawn(echo_send_loop(Arc::clone(&inner), echo_rx)));
        if let Some(interval) = self.echo_interval {
            tasks.push(tokio::spawn(echo_tick_loop(
                Arc::clone(&inner),
                echo_tx,
                interval,
            )));
        }

        Client {
            inner,
            tasks: Mutex::new(tasks),
        }
    }
}

/// An OVSDB JSON-RPC client over a single full-duplex stream.
pub struct Client {
    inner: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    conn: Conn<Box<dyn Transport>>,
    callbacks: Mutex<HashMap<String, oneshot::Sender<Response>>>,
    next_id: AtomicI64,
    echo_success: AtomicU64,
    echo_failure: AtomicU64,
    cancel: CancellationToken,
}

impl Client {
    /// Starts building a customized client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Wraps an established stream with default options.
    pub fn new<T: Transport + 'static>(stream: T) -> Client {
        Client::builder().build(stream)
    }

    /// Connects to an OVSDB server on a unix socket, most commonly
    /// `/var/run/openvswitch/db.sock`.
    ///
    /// # Errors
    ///
    /// Returns the connect error.
    pub async fn dial(path: impl AsRef<Path>) -> Result<Client, Error> {
        let stream = UnixStream::connect(path).await?;
        Ok(Client::new(stream))
    }

    /// Returns the name of every database known to the server.
    ///
    /// # Errors
    ///
    /// Returns an RPC, OVSDB, or transport error.
    pub async fn list_databases(&self) -> Result<Vec<String>, Error> {
        self.inner.rpc("list_dbs", json!([])).await
    }

    /// Performs one `echo` round trip.
    ///
    /// # Errors
    ///
    /// Returns an RPC, OVSDB, or transport error.
    pub async fn echo(&self) -> Result<(), Error> {
        let _: Value = self.inner.rpc("echo", json!([])).await?;
        Ok(())
    }

    /// Applies `ops` against database `db` in one transaction, returning
    /// the selected rows flattened in operation order.
    ///
    /// # Errors
    ///
    /// Returns an RPC, OVSDB, or transport error.
    pub async fn transact(&self, db: &str, ops: &[Op]) -> Result<Vec<Row>, Error> {
        let mut params = vec![Value::String(db.to_string())];
        for op in ops {
            params.push(op.to_value());
        }

        #[derive(serde::Deserialize)]
        struct OpResult {
            #[serde(default)]
            rows: Vec<Row>,
        }

        let results: Vec<OpResult> = self.inner.rpc("transact", Value::Array(params)).await?;
        Ok(results.into_iter().flat_map(|r| r.rows).collect())
    }

    /// Snapshot of the client's internal counters.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            callbacks_current: self.inner.callbacks.lock().unwrap().len(),
            echo_success: self.inner.echo_success.load(Ordering::Relaxed),
            echo_failure: self.inner.echo_failure.load(Ordering::Relaxed),
        }
    }

    /// Cancels the task group, closes the stream, and waits for every task.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        self.inner.conn.shutdown().await;

        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock().unwrap());
        for task in tasks {
            let _ = task.await;
        }
    }
}

impl Shared {
    /// Performs a single RPC: register a callback, send, wait for dispatch.
    ///
    /// The callback entry is removed on every exit path. Dropping the
    /// returned future (timeout, select) runs the guard, so even an id
    /// which never sees a response cannot leak.
    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Closed);
        }

        let id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        let (tx, rx) = oneshot::channel();
        {
            let mut callbacks = self.callbacks.lock().unwrap();
            // Ids are atomic and unique for the connection's lifetime; a
            // duplicate implies a logic bug, not a recoverable condition.
            assert!(
                callbacks.insert(id.clone(), tx).is_none(),
                "duplicate JSON-RPC callback id {id}"
            );
        }
        let _guard = CallbackGuard { shared: self, id: &id };

        self.conn
            .send(&Request {
                id: id.clone(),
                method: method.to_string(),
                params,
            })
            .await?;

        let res = tokio::select! {
            () = self.cancel.cancelled() => return Err(Error::Closed),
            res = rx => res.map_err(|_| Error::Closed)?,
        };

        if !res.error.is_null() {
            return Err(Error::Rpc(res.error));
        }
        interpret_result(res.result)
    }
}

/// Removes a pending callback when its RPC future exits or is dropped.
struct CallbackGuard<'a> {
    shared: &'a Shared,
    id: &'a str,
}

impl Drop for CallbackGuard<'_> {
    fn drop(&mut self) {
        self.shared.callbacks.lock().unwrap().remove(self.id);
    }
}

/// Decodes an RPC `result`, detecting OVSDB application errors which the
/// server reports in-band as `{"error": …, "details": …, "syntax": …}`.
fn interpret_result<T: DeserializeOwned>(result: Value) -> Result<T, Error> {
    if let Some(err) = result.get("error") {
        if err.is_string() {
            let e: OvsdbError = serde_json::from_value(result).map_err(Error::Decode)?;
            return Err(Error::Ovsdb(e));
        }
    }
    serde_json::from_value(result).map_err(Error::Decode)
}

/// Blocks on the decoder and dispatches each message until cancellation or
/// stream end.
async fn receive_loop(shared: Arc<Shared>, echo_tx: mpsc::Sender<()>) {
    loop {
        let res = tokio::select! {
            () = shared.cancel.cancelled() => break,
            res = shared.conn.recv() => res,
        };

        match res {
            Ok(res) => dispatch(&shared, &echo_tx, res),
            Err(Error::Eof) => {
                debug!("ovsdb stream closed, receive loop exiting");
                break;
            }
            Err(e) => {
                if !shared.cancel.is_cancelled() {
                    warn!(error = %e, "ovsdb receive failed, receive loop exiting");
                }
                break;
            }
        }
    }
}

/// Routes one received message.
fn dispatch(shared: &Shared, echo_tx: &mpsc::Sender<()>, res: Response) {
    // A server-initiated echo must be answered to keep the session alive;
    // signal the echo loop rather than any caller.
    if res.method.as_deref() == Some("echo") {
        let _ = echo_tx.try_send(());
        return;
    }

    let Some(id) = &res.id else {
        debug!(method = ?res.method, "dropping unsolicited notification");
        return;
    };

    let callback = shared.callbacks.lock().unwrap().remove(id);
    match callback {
        // The caller may have given up in the meantime; a dead receiver is
        // not an error.
        Some(tx) => {
            let _ = tx.send(res);
        }
        None => debug!(id = %id, "dropping reply with no registered callback"),
    }
}

/// Sends one `echo` RPC per signal, counting outcomes.
async fn echo_send_loop(shared: Arc<Shared>, mut echo_rx: mpsc::Receiver<()>) {
    loop {
        tokio::select! {
            () = shared.cancel.cancelled() => break,
            sig = echo_rx.recv() => {
                if sig.is_none() {
                    break;
                }
                let res: Result<Value, Error> = shared.rpc("echo", json!([])).await;
                match res {
                    Ok(_) => {
                        shared.echo_success.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        shared.echo_failure.fetch_add(1, Ordering::Relaxed);
                        debug!(error = %e, "echo RPC failed");
                    }
                }
            }
        }
    }
}

/// Periodically enqueues echo signals.
async fn echo_tick_loop(shared: Arc<Shared>, echo_tx: mpsc::Sender<()>, interval: Duration) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = shared.cancel.cancelled() => break,
            _ = tick.tick() => {
                // A full channel already has a pending probe.
                let _ = echo_tx.try_send(());
            }
        }
    }
}
