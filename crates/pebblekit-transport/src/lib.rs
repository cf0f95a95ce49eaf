//! Process-boundary plumbing for PebbleKit IPC.
//!
//! Provides the flat [`Bundle`] payload that crosses the boundary and the
//! collaborator traits the upper layers are written against:
//! - [`ServiceBinder`] / [`BindingObserver`] to bind to a remote endpoint
//! - [`RemoteEndpoint`] / [`ReplyCallback`] for one-shot request/reply calls
//! - [`RequestReceiver`] for the serving side
//! - [`PackageDirectory`] for role-based discovery
//!
//! [`LocalServiceBus`] implements all of them in-process.

pub mod bundle;
pub mod error;
pub mod local;
pub mod traits;

pub use bundle::{decode_payload, encode_payload, Bundle, BundleValue};
pub use error::{Result, TransportError};
pub use local::{LocalBinder, LocalServiceBus, ServiceExport};
pub use traits::{
    BindingObserver, BindingToken, PackageDirectory, RemoteEndpoint, ReplyCallback,
    RequestReceiver, ServiceBinder, ServiceTarget, ROLE_RECEIVE_DATA, ROLE_SEND_DATA,
};
