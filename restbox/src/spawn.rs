//! Asynchronous dispatch.
//!
//! Each variant spawns an independent tokio task per call. There is no
//! bound on how many run at once and no ordering between them.
//!
//! ```no_run
//! # async fn run(client: restbox::RestClient) {
//! // callback
//! client.get("/a").spawn_with(|result| {
//!     let _ = result.map(|response| response.status_code());
//! });
//!
//! // library provided channel
//! let rx = client.get("/b").spawn_channel();
//! let _ = rx.await;
//!
//! // write-once handle
//! let handle = client.get("/c").spawn_future();
//! assert!(handle.try_get().is_none() || handle.is_ready());
//! let _ = handle.wait().await;
//! # }
//! ```

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span};

use crate::client::RequestBuilder;
use crate::error::Error;
use crate::response::Response;

/// Result delivered by every asynchronous variant.
pub type DispatchResult = Result<Response, Error>;

impl RequestBuilder {
    fn spawn_task<F>(self, deliver: F) -> JoinHandle<()>
    where
        F: FnOnce(DispatchResult) + Send + 'static,
    {
        let span = info_span!("restbox.spawn", method = %self.method(), path = %self.path());
        tokio::spawn(
            async move {
                let result = match self.into_dispatch() {
                    Ok(dispatch) => dispatch.run().await,
                    Err(error) => Err(error),
                };
                debug!(ok = result.is_ok(), "spawned dispatch finished");
                deliver(result);
            }
            .instrument(span),
        )
    }

    /// Runs the request in the background and passes the result to
    /// `callback`.
    pub fn spawn_with<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(DispatchResult) + Send + 'static,
    {
        self.spawn_task(callback)
    }

    /// Runs the request in the background and delivers the result on a new
    /// channel.
    pub fn spawn_channel(self) -> oneshot::Receiver<DispatchResult> {
        let (tx, rx) = oneshot::channel();
        self.spawn_task(move |result| {
            // The receiver may have been dropped; nobody is waiting then.
            let _ = tx.send(result);
        });
        rx
    }

    /// Runs the request in the background and sends the result to `tx`.
    pub fn send_to(self, tx: mpsc::Sender<DispatchResult>) -> JoinHandle<()> {
        let span = info_span!("restbox.send_to", method = %self.method(), path = %self.path());
        tokio::spawn(
            async move {
                let result = match self.into_dispatch() {
                    Ok(dispatch) => dispatch.run().await,
                    Err(error) => Err(error),
                };
                if tx.send(result).await.is_err() {
                    debug!("result channel closed");
                }
            }
            .instrument(span),
        )
    }

    /// Runs the request in the background and returns a handle that is
    /// filled exactly once.
    pub fn spawn_future(self) -> FutureResponse {
        let handle = FutureResponse::pending();
        let slot = handle.slot.clone();
        self.spawn_task(move |result| slot.publish(result));
        handle
    }
}

#[derive(Debug, Default)]
struct Slot {
    value: OnceCell<DispatchResult>,
    ready: Notify,
}

impl Slot {
    fn publish(&self, result: DispatchResult) {
        if self.value.set(result).is_ok() {
            self.ready.notify_waiters();
        }
    }
}

/// Write-once handle to a background dispatch.
///
/// Clones observe the same slot. Before the dispatch finishes
/// [`try_get`](Self::try_get) returns `None`; afterwards every observer sees
/// the same result.
#[derive(Debug, Clone)]
pub struct FutureResponse {
    slot: Arc<Slot>,
}

impl FutureResponse {
    fn pending() -> Self {
        FutureResponse {
            slot: Arc::new(Slot::default()),
        }
    }

    /// The result, if the dispatch has finished. Never blocks.
    pub fn try_get(&self) -> Option<&DispatchResult> {
        self.slot.value.get()
    }

    /// Whether the result is available.
    pub fn is_ready(&self) -> bool {
        self.slot.value.get().is_some()
    }

    /// Waits until the result is available.
    pub async fn wait(&self) -> &DispatchResult {
        loop {
            let notified = self.slot.ready.notified();
            tokio::pin!(notified);
            // Register before checking so a publish in between is not missed.
            notified.as_mut().enable();
            if let Some(result) = self.slot.value.get() {
                return result;
            }
            notified.await;
        }
    }
}

/// Fork-join over several requests.
///
/// Requests start when spawned. [`join`](Self::join) waits for all of them
/// and returns results in spawn order.
#[derive(Debug, Default)]
pub struct Concurrent {
    tasks: Vec<JoinHandle<DispatchResult>>,
}

impl Concurrent {
    /// An empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `request` and returns its position in the joined results.
    pub fn spawn(&mut self, request: RequestBuilder) -> usize {
        let span = info_span!("restbox.concurrent", method = %request.method(), path = %request.path());
        self.tasks.push(tokio::spawn(
            async move { request.send().await }.instrument(span),
        ));
        self.tasks.len() - 1
    }

    /// Number of spawned requests.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when nothing was spawned.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every request.
    pub async fn join(self) -> Vec<DispatchResult> {
        futures::future::join_all(self.tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_else(|error| Err(Error::Aborted(error))))
            .collect()
    }
}
