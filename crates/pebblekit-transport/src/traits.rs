use std::fmt;
use std::sync::Arc;

use crate::bundle::Bundle;
use crate::error::Result;

/// Well-known role served by the mediator process (client -> server requests).
pub const ROLE_SEND_DATA: &str = "io.rebble.pebblekit2.SEND_DATA";

/// Well-known role served by companion apps (server -> client requests).
pub const ROLE_RECEIVE_DATA: &str = "io.rebble.pebblekit2.RECEIVE_DATA";

/// Logical address of a bindable endpoint: a role offered by a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceTarget {
    pub role: String,
    pub package: String,
}

impl ServiceTarget {
    pub fn new(role: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            package: package.into(),
        }
    }
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.role)
    }
}

/// Opaque handle returned by [`ServiceBinder::bind`], used to unbind later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingToken(pub u64);

/// Single-shot reply channel handed to the remote side of a request.
///
/// A misbehaving peer may invoke it more than once; implementations must
/// treat every call after the first as a no-op.
pub trait ReplyCallback: Send + Sync {
    /// Deliver the reply. Fails with `DeadObject` if the caller is gone.
    fn on_result(&self, reply: Bundle) -> Result<()>;
}

/// Interface exposed by a bound remote endpoint.
pub trait RemoteEndpoint: Send + Sync {
    /// Fire a one-shot request; the reply arrives later through `reply`.
    ///
    /// Returns `Err(DeadObject)` synchronously if the remote process has died.
    fn request(&self, payload: Bundle, reply: Arc<dyn ReplyCallback>) -> Result<()>;
}

/// Server-side stub receiving requests, with the caller identity resolved by
/// the transport.
pub trait RequestReceiver: Send + Sync {
    fn request(
        &self,
        payload: Bundle,
        calling_package: Option<String>,
        reply: Arc<dyn ReplyCallback>,
    );
}

/// Lifecycle notifications for a single binding.
pub trait BindingObserver: Send + Sync {
    /// The remote endpoint is ready.
    fn on_connected(&self, endpoint: Arc<dyn RemoteEndpoint>);
    /// Bound, but the far end exposes no interface.
    fn on_null_binding(&self);
    /// The remote process went away; the binding stays registered.
    fn on_disconnected(&self);
    /// The binding is permanently unusable.
    fn on_binding_died(&self);
}

/// Locate and bind to a remote endpoint.
pub trait ServiceBinder: Send + Sync {
    /// Start binding to `target`. Returns immediately; progress is reported
    /// through `observer`.
    fn bind(&self, target: &ServiceTarget, observer: Arc<dyn BindingObserver>)
        -> Result<BindingToken>;

    /// Release a binding. Unknown or already released tokens are ignored.
    fn unbind(&self, token: BindingToken);
}

/// Enumerates packages that declare a given role.
pub trait PackageDirectory: Send + Sync {
    /// Packages offering `role`, in the platform's enumeration order.
    fn query_services(&self, role: &str) -> Vec<String>;
}
