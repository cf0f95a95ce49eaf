use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use crate::bundle::{decode_payload, encode_payload, Bundle};
use crate::error::{Result, TransportError};
use crate::traits::{
    BindingObserver, BindingToken, PackageDirectory, RemoteEndpoint, ReplyCallback,
    RequestReceiver, ServiceBinder, ServiceTarget,
};

/// What a registered service hands back when bound.
#[derive(Clone)]
pub enum ServiceExport {
    /// A live request interface.
    Interface(Arc<dyn RequestReceiver>),
    /// The service binds but exposes no interface.
    NullBinding,
}

struct Registration {
    target: ServiceTarget,
    export: ServiceExport,
}

struct BindingRecord {
    client_package: String,
    target: ServiceTarget,
    observer: Arc<dyn BindingObserver>,
}

#[derive(Default)]
struct BusState {
    registrations: Vec<Registration>,
    bindings: HashMap<u64, BindingRecord>,
    stopped: HashSet<String>,
}

struct BusInner {
    state: Mutex<BusState>,
    next_token: AtomicU64,
    bind_attempts: AtomicU64,
}

impl BusInner {
    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self, package: &str) -> bool {
        !self.lock().stopped.contains(package)
    }
}

/// In-process stand-in for the platform's binding and discovery services.
///
/// Every request and reply is serialized to bytes and back, so payloads
/// behave as if they crossed a real process boundary. Packages can be
/// stopped, restarted and uninstalled to exercise the lifecycle paths.
#[derive(Clone)]
pub struct LocalServiceBus {
    inner: Arc<BusInner>,
}

impl Default for LocalServiceBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalServiceBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                state: Mutex::new(BusState::default()),
                next_token: AtomicU64::new(1),
                bind_attempts: AtomicU64::new(0),
            }),
        }
    }

    /// Register `export` as the implementation of `role` in `package`.
    pub fn register(&self, package: &str, role: &str, export: ServiceExport) {
        let target = ServiceTarget::new(role, package);
        let mut state = self.inner.lock();
        state.registrations.retain(|r| r.target != target);
        state.registrations.push(Registration { target, export });
        debug!(package, role, "registered local service");
    }

    /// Binder acting on behalf of `client_package`.
    ///
    /// The package name is what servers see as the calling package.
    pub fn binder(&self, client_package: &str) -> LocalBinder {
        LocalBinder {
            bus: self.inner.clone(),
            client_package: client_package.to_string(),
        }
    }

    /// Simulate the process of `package` dying.
    ///
    /// Bindings to it receive `on_disconnected` and stay registered; its
    /// endpoints and reply callbacks fail with `DeadObject` until [`restart`](Self::restart).
    pub fn kill(&self, package: &str) {
        let observers = {
            let mut state = self.inner.lock();
            state.stopped.insert(package.to_string());
            observers_for(&state, package)
        };
        info!(package, bindings = observers.len(), "local process killed");
        for observer in observers {
            observer.on_disconnected();
        }
    }

    /// Bring a killed package back and reconnect its existing bindings.
    pub fn restart(&self, package: &str) {
        let pending = {
            let mut state = self.inner.lock();
            state.stopped.remove(package);
            state
                .bindings
                .values()
                .filter(|b| b.target.package == package)
                .map(|b| (b.observer.clone(), export_for(&state, &b.target), b.clone_parts()))
                .collect::<Vec<_>>()
        };
        info!(package, bindings = pending.len(), "local process restarted");
        for (observer, export, (client_package, target)) in pending {
            match export {
                Some(export) => deliver(&self.inner, observer, export, client_package, target),
                None => observer.on_binding_died(),
            }
        }
    }

    /// Remove every service of `package`; its bindings die permanently.
    pub fn uninstall(&self, package: &str) {
        let observers = {
            let mut state = self.inner.lock();
            state.registrations.retain(|r| r.target.package != package);
            let observers = observers_for(&state, package);
            state.bindings.retain(|_, b| b.target.package != package);
            observers
        };
        info!(package, bindings = observers.len(), "local package uninstalled");
        for observer in observers {
            observer.on_binding_died();
        }
    }

    /// Number of live bindings.
    pub fn binding_count(&self) -> usize {
        self.inner.lock().bindings.len()
    }

    /// Total number of `bind` calls made through any binder of this bus.
    pub fn bind_attempts(&self) -> u64 {
        self.inner.bind_attempts.load(Ordering::SeqCst)
    }
}

impl PackageDirectory for LocalServiceBus {
    fn query_services(&self, role: &str) -> Vec<String> {
        self.inner
            .lock()
            .registrations
            .iter()
            .filter(|r| r.target.role == role)
            .map(|r| r.target.package.clone())
            .collect()
    }
}

impl BindingRecord {
    fn clone_parts(&self) -> (String, ServiceTarget) {
        (self.client_package.clone(), self.target.clone())
    }
}

fn observers_for(state: &BusState, package: &str) -> Vec<Arc<dyn BindingObserver>> {
    state
        .bindings
        .values()
        .filter(|b| b.target.package == package)
        .map(|b| b.observer.clone())
        .collect()
}

fn export_for(state: &BusState, target: &ServiceTarget) -> Option<ServiceExport> {
    state
        .registrations
        .iter()
        .find(|r| &r.target == target)
        .map(|r| r.export.clone())
}

fn deliver(
    bus: &Arc<BusInner>,
    observer: Arc<dyn BindingObserver>,
    export: ServiceExport,
    client_package: String,
    target: ServiceTarget,
) {
    let bus = Arc::downgrade(bus);
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        match export {
            ServiceExport::Interface(receiver) => {
                let endpoint = LocalEndpoint {
                    bus,
                    client_package,
                    target,
                    receiver,
                };
                observer.on_connected(Arc::new(endpoint));
            }
            ServiceExport::NullBinding => observer.on_null_binding(),
        }
    });
}

/// [`ServiceBinder`] handed out by [`LocalServiceBus::binder`].
pub struct LocalBinder {
    bus: Arc<BusInner>,
    client_package: String,
}

impl ServiceBinder for LocalBinder {
    fn bind(
        &self,
        target: &ServiceTarget,
        observer: Arc<dyn BindingObserver>,
    ) -> Result<BindingToken> {
        self.bus.bind_attempts.fetch_add(1, Ordering::SeqCst);

        let (export, running) = {
            let state = self.bus.lock();
            let export = export_for(&state, target).ok_or_else(|| {
                TransportError::ServiceNotFound {
                    role: target.role.clone(),
                    package: target.package.clone(),
                }
            })?;
            (export, !state.stopped.contains(&target.package))
        };

        let token = self.bus.next_token.fetch_add(1, Ordering::SeqCst);
        self.bus.lock().bindings.insert(
            token,
            BindingRecord {
                client_package: self.client_package.clone(),
                target: target.clone(),
                observer: observer.clone(),
            },
        );
        debug!(%target, token, client = %self.client_package, "bind requested");

        // A stopped package connects once it is restarted.
        if running {
            deliver(
                &self.bus,
                observer,
                export,
                self.client_package.clone(),
                target.clone(),
            );
        }

        Ok(BindingToken(token))
    }

    fn unbind(&self, token: BindingToken) {
        if self.bus.lock().bindings.remove(&token.0).is_some() {
            debug!(token = token.0, "unbound");
        }
    }
}

struct LocalEndpoint {
    bus: Weak<BusInner>,
    client_package: String,
    target: ServiceTarget,
    receiver: Arc<dyn RequestReceiver>,
}

impl RemoteEndpoint for LocalEndpoint {
    fn request(&self, payload: Bundle, reply: Arc<dyn ReplyCallback>) -> Result<()> {
        let bus = self.bus.upgrade().ok_or(TransportError::Shutdown)?;
        if !bus.is_running(&self.target.package) {
            return Err(TransportError::DeadObject);
        }

        let payload = decode_payload(&encode_payload(&payload)?)?;
        let reply = Arc::new(LocalReply {
            bus: self.bus.clone(),
            client_package: self.client_package.clone(),
            inner: reply,
        });
        self.receiver
            .request(payload, Some(self.client_package.clone()), reply);
        Ok(())
    }
}

struct LocalReply {
    bus: Weak<BusInner>,
    client_package: String,
    inner: Arc<dyn ReplyCallback>,
}

impl ReplyCallback for LocalReply {
    fn on_result(&self, reply: Bundle) -> Result<()> {
        let running = self
            .bus
            .upgrade()
            .is_some_and(|bus| bus.is_running(&self.client_package));
        if !running {
            warn!(client = %self.client_package, "reply target is gone");
            return Err(TransportError::DeadObject);
        }
        let reply = decode_payload(&encode_payload(&reply)?)?;
        self.inner.on_result(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::mpsc;

    use super::*;
    use crate::traits::ROLE_SEND_DATA;

    struct Echo;

    impl RequestReceiver for Echo {
        fn request(
            &self,
            mut payload: Bundle,
            calling_package: Option<String>,
            reply: Arc<dyn ReplyCallback>,
        ) {
            payload.put_string("CALLER", calling_package.unwrap_or_default());
            let _ = reply.on_result(payload);
        }
    }

    #[derive(Debug, PartialEq)]
    enum Event {
        Connected,
        Null,
        Disconnected,
        Died,
    }

    struct Recorder {
        tx: mpsc::UnboundedSender<Event>,
        endpoint: Mutex<Option<Arc<dyn RemoteEndpoint>>>,
    }

    impl Recorder {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Event>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    tx,
                    endpoint: Mutex::new(None),
                }),
                rx,
            )
        }
    }

    impl BindingObserver for Recorder {
        fn on_connected(&self, endpoint: Arc<dyn RemoteEndpoint>) {
            *self.endpoint.lock().unwrap() = Some(endpoint);
            let _ = self.tx.send(Event::Connected);
        }
        fn on_null_binding(&self) {
            let _ = self.tx.send(Event::Null);
        }
        fn on_disconnected(&self) {
            let _ = self.tx.send(Event::Disconnected);
        }
        fn on_binding_died(&self) {
            let _ = self.tx.send(Event::Died);
        }
    }

    struct Capture(mpsc::UnboundedSender<Bundle>, AtomicUsize);

    impl ReplyCallback for Capture {
        fn on_result(&self, reply: Bundle) -> Result<()> {
            self.1.fetch_add(1, Ordering::SeqCst);
            let _ = self.0.send(reply);
            Ok(())
        }
    }

    #[tokio::test]
    async fn bind_delivers_endpoint_and_caller_identity() {
        let bus = LocalServiceBus::new();
        bus.register("mediator", ROLE_SEND_DATA, ServiceExport::Interface(Arc::new(Echo)));

        let (observer, mut events) = Recorder::new();
        let binder = bus.binder("client.app");
        binder
            .bind(&ServiceTarget::new(ROLE_SEND_DATA, "mediator"), observer.clone())
            .expect("bind should succeed");
        assert_eq!(events.recv().await, Some(Event::Connected));

        let endpoint = observer.endpoint.lock().unwrap().clone().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        endpoint
            .request(
                Bundle::new().with_string("ACTION", "PING"),
                Arc::new(Capture(tx, AtomicUsize::new(0))),
            )
            .expect("request should be accepted");

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.get_string("ACTION"), Some("PING"));
        assert_eq!(reply.get_string("CALLER"), Some("client.app"));
        assert_eq!(bus.bind_attempts(), 1);
    }

    #[tokio::test]
    async fn bind_to_unknown_service_fails() {
        let bus = LocalServiceBus::new();
        let (observer, _events) = Recorder::new();
        let result = bus
            .binder("client.app")
            .bind(&ServiceTarget::new(ROLE_SEND_DATA, "nobody"), observer);
        assert!(matches!(result, Err(TransportError::ServiceNotFound { .. })));
    }

    #[tokio::test]
    async fn null_binding_is_reported() {
        let bus = LocalServiceBus::new();
        bus.register("mediator", ROLE_SEND_DATA, ServiceExport::NullBinding);
        let (observer, mut events) = Recorder::new();
        bus.binder("client.app")
            .bind(&ServiceTarget::new(ROLE_SEND_DATA, "mediator"), observer)
            .unwrap();
        assert_eq!(events.recv().await, Some(Event::Null));
    }

    #[tokio::test]
    async fn kill_restart_and_uninstall_drive_observer() {
        let bus = LocalServiceBus::new();
        bus.register("mediator", ROLE_SEND_DATA, ServiceExport::Interface(Arc::new(Echo)));
        let (observer, mut events) = Recorder::new();
        bus.binder("client.app")
            .bind(&ServiceTarget::new(ROLE_SEND_DATA, "mediator"), observer.clone())
            .unwrap();
        assert_eq!(events.recv().await, Some(Event::Connected));
        let endpoint = observer.endpoint.lock().unwrap().clone().unwrap();

        bus.kill("mediator");
        assert_eq!(events.recv().await, Some(Event::Disconnected));
        let (tx, _rx) = mpsc::unbounded_channel();
        let dead = endpoint.request(Bundle::new(), Arc::new(Capture(tx, AtomicUsize::new(0))));
        assert!(matches!(dead, Err(TransportError::DeadObject)));

        bus.restart("mediator");
        assert_eq!(events.recv().await, Some(Event::Connected));

        bus.uninstall("mediator");
        assert_eq!(events.recv().await, Some(Event::Died));
        assert_eq!(bus.binding_count(), 0);
        assert!(bus.query_services(ROLE_SEND_DATA).is_empty());
    }

    #[tokio::test]
    async fn reply_to_dead_caller_fails() {
        struct Deferred(Mutex<Option<Arc<dyn ReplyCallback>>>);
        impl RequestReceiver for Deferred {
            fn request(&self, _: Bundle, _: Option<String>, reply: Arc<dyn ReplyCallback>) {
                *self.0.lock().unwrap() = Some(reply);
            }
        }

        let bus = LocalServiceBus::new();
        let server = Arc::new(Deferred(Mutex::new(None)));
        bus.register("mediator", ROLE_SEND_DATA, ServiceExport::Interface(server.clone()));
        let (observer, mut events) = Recorder::new();
        bus.binder("client.app")
            .bind(&ServiceTarget::new(ROLE_SEND_DATA, "mediator"), observer.clone())
            .unwrap();
        events.recv().await;

        let endpoint = observer.endpoint.lock().unwrap().clone().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        endpoint
            .request(Bundle::new(), Arc::new(Capture(tx, AtomicUsize::new(0))))
            .unwrap();

        bus.kill("client.app");
        let reply = server.0.lock().unwrap().take().unwrap();
        assert!(reply.on_result(Bundle::new()).unwrap_err().is_dead_object());
    }

    #[test]
    fn directory_lists_packages_in_registration_order() {
        let bus = LocalServiceBus::new();
        bus.register("b.app", ROLE_SEND_DATA, ServiceExport::NullBinding);
        bus.register("a.app", ROLE_SEND_DATA, ServiceExport::NullBinding);
        bus.register("c.app", "other.role", ServiceExport::NullBinding);

        assert_eq!(bus.query_services(ROLE_SEND_DATA), vec!["b.app", "a.app"]);
    }
}
