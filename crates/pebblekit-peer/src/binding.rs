//! Lazily bound, shared connection to a dynamically resolved endpoint.
//!
//! ```text
//! Disconnected --get_or_connect--> Connecting --bound--> Connected(endpoint | none)
//!      ^                               |  ^                     |
//!      +------ no target / bind err ---+  +-- remote died ------+
//!      +------------------ close / binding died ----------------+
//! ```
//!
//! All concurrent callers share one connect attempt. A caller waits at most
//! the bind timeout for `Connected`; a late connection still serves the next
//! caller.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use pebblekit_transport::{
    BindingObserver, BindingToken, RemoteEndpoint, ServiceBinder, ServiceTarget,
};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::DEFAULT_BIND_TIMEOUT;

/// Resolves the endpoint to bind to, at connect time.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// `None` fails the connect attempt without binding.
    async fn resolve(&self) -> Option<ServiceTarget>;
}

#[async_trait]
impl TargetResolver for ServiceTarget {
    async fn resolve(&self) -> Option<ServiceTarget> {
        Some(self.clone())
    }
}

/// Lifecycle state of a [`BindingConnection`].
#[derive(Clone, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Bound. `None` when the far end exposes no interface.
    Connected(Option<Arc<dyn RemoteEndpoint>>),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("Disconnected"),
            ConnectionState::Connecting => f.write_str("Connecting"),
            ConnectionState::Connected(Some(_)) => f.write_str("Connected(endpoint)"),
            ConnectionState::Connected(None) => f.write_str("Connected(null)"),
        }
    }
}

struct Control {
    /// Bumped on every new attempt and on close; stale observer events are dropped.
    generation: u64,
    token: Option<BindingToken>,
}

struct Inner {
    binder: Arc<dyn ServiceBinder>,
    resolver: Arc<dyn TargetResolver>,
    control: Mutex<Control>,
    state: watch::Sender<ConnectionState>,
}

impl Inner {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new attempt if disconnected. Returns its generation.
    fn begin_connect(&self) -> Option<u64> {
        let mut control = self.control();
        if !matches!(*self.state.borrow(), ConnectionState::Disconnected) {
            return None;
        }
        control.generation += 1;
        self.state.send_replace(ConnectionState::Connecting);
        Some(control.generation)
    }

    fn transition(&self, generation: u64, next: ConnectionState) {
        let control = self.control();
        if control.generation != generation {
            debug!(generation, "ignoring event from a retired binding");
            return;
        }
        debug!(state = ?next, "binding state changed");
        self.state.send_replace(next);
    }

    fn attach_token(&self, generation: u64, token: BindingToken) {
        let stale = {
            let mut control = self.control();
            if control.generation == generation {
                control.token = Some(token);
                false
            } else {
                true
            }
        };
        if stale {
            // Closed while the bind was in flight.
            self.binder.unbind(token);
        }
    }

    /// Unbind and reset. With `only` set, acts only on that generation.
    fn close(&self, only: Option<u64>) {
        let token = {
            let mut control = self.control();
            if only.is_some_and(|generation| generation != control.generation) {
                return;
            }
            control.generation += 1;
            self.state.send_replace(ConnectionState::Disconnected);
            control.token.take()
        };
        if let Some(token) = token {
            self.binder.unbind(token);
        }
    }
}

struct Observer {
    inner: Weak<Inner>,
    generation: u64,
}

impl Observer {
    fn with_inner(&self, f: impl FnOnce(&Inner)) {
        if let Some(inner) = self.inner.upgrade() {
            f(&inner);
        }
    }
}

impl BindingObserver for Observer {
    fn on_connected(&self, endpoint: Arc<dyn RemoteEndpoint>) {
        self.with_inner(|inner| {
            inner.transition(self.generation, ConnectionState::Connected(Some(endpoint)))
        });
    }

    fn on_null_binding(&self) {
        self.with_inner(|inner| {
            inner.transition(self.generation, ConnectionState::Connected(None))
        });
    }

    fn on_disconnected(&self) {
        // The binding stays registered; the transport reconnects it if the
        // remote process comes back.
        self.with_inner(|inner| {
            inner.transition(self.generation, ConnectionState::Connecting)
        });
    }

    fn on_binding_died(&self) {
        warn!("binding died, closing connection");
        self.with_inner(|inner| inner.close(Some(self.generation)));
    }
}

/// Shared connection to one logical endpoint.
///
/// Dropping the connection closes it.
pub struct BindingConnection {
    inner: Arc<Inner>,
    bind_timeout: Duration,
}

impl BindingConnection {
    pub fn new(binder: Arc<dyn ServiceBinder>, resolver: Arc<dyn TargetResolver>) -> Self {
        Self::with_timeout(binder, resolver, DEFAULT_BIND_TIMEOUT)
    }

    pub fn with_timeout(
        binder: Arc<dyn ServiceBinder>,
        resolver: Arc<dyn TargetResolver>,
        bind_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                binder,
                resolver,
                control: Mutex::new(Control {
                    generation: 0,
                    token: None,
                }),
                state: watch::Sender::new(ConnectionState::Disconnected),
            }),
            bind_timeout,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// The connected endpoint, connecting first if needed.
    ///
    /// Returns `None` if no target resolves, the bind fails, the far end
    /// exposes no interface, or the bind timeout elapses.
    pub async fn get_or_connect(&self) -> Option<Arc<dyn RemoteEndpoint>> {
        let mut rx = self.inner.state.subscribe();
        if let ConnectionState::Connected(endpoint) = &*rx.borrow_and_update() {
            return endpoint.clone();
        }

        if let Some(generation) = self.inner.begin_connect() {
            debug!(generation, "starting connect attempt");
            tokio::spawn(connect(Arc::clone(&self.inner), generation));
        }

        let wait = async {
            loop {
                match &*rx.borrow_and_update() {
                    ConnectionState::Connected(endpoint) => return endpoint.clone(),
                    ConnectionState::Disconnected => return None,
                    ConnectionState::Connecting => {}
                }
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        };

        match tokio::time::timeout(self.bind_timeout, wait).await {
            Ok(endpoint) => endpoint,
            Err(_) => {
                debug!(timeout = ?self.bind_timeout, "timed out waiting for connection");
                None
            }
        }
    }

    /// Unbind and reset to `Disconnected`. Safe in any state.
    pub fn close(&self) {
        debug!("closing binding connection");
        self.inner.close(None);
    }
}

impl Drop for BindingConnection {
    fn drop(&mut self) {
        self.inner.close(None);
    }
}

async fn connect(inner: Arc<Inner>, generation: u64) {
    let Some(target) = inner.resolver.resolve().await else {
        debug!("no target resolvable");
        inner.close(Some(generation));
        return;
    };

    let observer = Arc::new(Observer {
        inner: Arc::downgrade(&inner),
        generation,
    });
    match inner.binder.bind(&target, observer) {
        Ok(token) => {
            debug!(%target, "bind issued");
            inner.attach_token(generation, token);
        }
        Err(err) => {
            warn!(%target, error = %err, "bind failed");
            inner.close(Some(generation));
        }
    }
}
