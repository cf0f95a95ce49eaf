//! Request/response correlation over one-shot reply callbacks.
//!
//! [`call`] turns a callback-style remote invocation into a single awaited
//! reply. [`SuspendingResponder`] is the serving half: it runs a
//! [`RequestHandler`] in its own task and always answers, falling back to an
//! empty reply when the handler fails.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pebblekit_codec::action_tag;
use pebblekit_transport::{Bundle, RemoteEndpoint, ReplyCallback, RequestReceiver};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::Result;

const NO_ACTION: &str = "UNKNOWN";

/// Reply slot that resolves at most once.
struct PendingReply {
    tx: Mutex<Option<oneshot::Sender<Bundle>>>,
}

impl ReplyCallback for PendingReply {
    fn on_result(&self, reply: Bundle) -> pebblekit_transport::Result<()> {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => {
                // The caller may have stopped waiting.
                let _ = tx.send(reply);
            }
            None => debug!("duplicate reply ignored"),
        }
        Ok(())
    }
}

/// Issue `payload` and wait for the single reply.
///
/// Resolves to `None` when the remote process is dead, when the reply
/// channel is dropped unanswered, or when `timeout` elapses.
pub async fn call(
    endpoint: &dyn RemoteEndpoint,
    payload: Bundle,
    timeout: Option<Duration>,
) -> Option<Bundle> {
    let action = action_tag(&payload).unwrap_or(NO_ACTION).to_string();
    let (tx, rx) = oneshot::channel();
    let pending = Arc::new(PendingReply {
        tx: Mutex::new(Some(tx)),
    });

    if let Err(err) = endpoint.request(payload, pending) {
        if err.is_dead_object() {
            debug!(action, "remote endpoint is dead");
        } else {
            warn!(action, error = %err, "request failed");
        }
        return None;
    }

    let reply = async {
        let reply = rx.await.ok();
        if reply.is_none() {
            debug!(action, "request dropped without a reply");
        }
        reply
    };
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, reply).await {
            Ok(reply) => reply,
            Err(_) => {
                warn!(action, timeout = ?limit, "request timed out");
                None
            }
        },
        None => reply.await,
    }
}

/// Serving side of a request/response endpoint.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the reply for one request.
    ///
    /// An `Err` is logged and answered with an empty reply.
    async fn handle(&self, request: Bundle, calling_package: Option<String>) -> Result<Bundle>;
}

/// Adapts a [`RequestHandler`] to the transport's [`RequestReceiver`].
///
/// Each request runs on its own task. Handler errors and panics become an
/// empty reply so the caller never hangs; cancelled handlers send nothing.
pub struct SuspendingResponder<H> {
    handler: Arc<H>,
    runtime: Handle,
    cancel: CancellationToken,
}

impl<H: RequestHandler> SuspendingResponder<H> {
    /// Responder running on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(handler: Arc<H>) -> Self {
        Self::with_runtime(handler, Handle::current())
    }

    pub fn with_runtime(handler: Arc<H>, runtime: Handle) -> Self {
        Self {
            handler,
            runtime,
            cancel: CancellationToken::new(),
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Cancel in-flight handlers and refuse new requests.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl<H: RequestHandler> RequestReceiver for SuspendingResponder<H> {
    fn request(
        &self,
        payload: Bundle,
        calling_package: Option<String>,
        reply: Arc<dyn ReplyCallback>,
    ) {
        if self.cancel.is_cancelled() {
            debug!(
                action = action_tag(&payload).unwrap_or(NO_ACTION),
                "responder shut down, request dropped"
            );
            return;
        }

        let handler = Arc::clone(&self.handler);
        let cancel = self.cancel.clone();
        let runtime = self.runtime.clone();

        self.runtime.spawn(async move {
            let action = action_tag(&payload).unwrap_or(NO_ACTION).to_string();
            let caller = calling_package.clone().unwrap_or_default();
            let mut task =
                runtime.spawn(async move { handler.handle(payload, calling_package).await });

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    task.abort();
                    debug!(action, calling_package = %caller, "request cancelled");
                    return;
                }
                outcome = &mut task => outcome,
            };

            let result = match outcome {
                Ok(Ok(reply)) => reply,
                Ok(Err(err)) => {
                    error!(action, calling_package = %caller, error = %err, "failed to process request");
                    Bundle::new()
                }
                Err(err) if err.is_cancelled() => {
                    debug!(action, calling_package = %caller, "request cancelled");
                    return;
                }
                Err(err) => {
                    error!(action, calling_package = %caller, error = %err, "request handler panicked");
                    Bundle::new()
                }
            };

            if let Err(err) = reply.on_result(result) {
                // Nothing to deliver to if the caller is gone.
                debug!(action, calling_package = %caller, error = %err, "reply not delivered");
            }
        });
    }
}
