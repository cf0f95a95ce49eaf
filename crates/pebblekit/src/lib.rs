//! PebbleKit IPC between companion apps and the watch mediator app.
//!
//! # Crate Structure
//!
//! - [`transport`]: bundle payloads, binding traits and the in-process loopback bus
//! - [`codec`]: typed dictionaries, result taxonomies and request envelopes
//! - [`provider`]: queryable watch state with change notifications (behind `provider` feature)
//! - [`peer`]: connections, request correlation and routing for both ends (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use pebblekit_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use pebblekit_codec::*;
}

/// Re-export provider types (requires `provider` feature).
#[cfg(feature = "provider")]
pub mod provider {
    pub use pebblekit_provider::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use pebblekit_peer::*;
}
