//! Both ends of a PebbleKit conversation.
//!
//! Client apps use [`PebbleSender`] to reach watchapps through the mediator
//! app and serve a [`WatchListener`] behind a [`ListenerRouter`]. The
//! mediator serves a [`WatchAppService`] behind a [`ServiceRouter`] and
//! pushes watch events to clients through a [`ListenerConnector`].
//!
//! Underneath, [`BindingConnection`] keeps one lazily bound connection per
//! peer, [`call`] correlates a request with its single reply, and
//! [`SuspendingResponder`] runs handlers so that every request is answered.
//!
//! ```no_run
//! # async fn demo(bus: pebblekit_transport::LocalServiceBus) {
//! use std::sync::Arc;
//! use pebblekit_codec::{Dictionary, DictionaryItem};
//! use pebblekit_peer::{AppPicker, MemorySelectionStore, PebbleSender};
//!
//! let picker = Arc::new(AppPicker::new(
//!     Arc::new(bus.clone()),
//!     Arc::new(MemorySelectionStore::new()),
//! ));
//! let sender = PebbleSender::new(Arc::new(bus.binder("com.example.weather")), picker);
//!
//! let data = Dictionary::from([(1, DictionaryItem::from("sunny"))]);
//! match sender.send_data_to_watch(uuid::Uuid::nil(), data, None).await {
//!     Some(results) => println!("{results:?}"),
//!     None => println!("mediator not reachable"),
//! }
//! sender.close();
//! # }
//! ```

pub mod binding;
pub mod config;
pub mod connector;
pub mod discovery;
pub mod error;
pub mod info;
pub mod listener;
pub mod picker;
pub mod request;
pub mod sender;
pub mod service;

pub use binding::{BindingConnection, ConnectionState, TargetResolver};
pub use config::{
    PeerConfig, PickerConfig, TieBreak, DEFAULT_BIND_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
pub use connector::ListenerConnector;
pub use discovery::{FirstEligibleResolver, SelectedAppResolver};
pub use error::{PeerError, Result};
pub use info::{InfoRetriever, ProviderLocator};
pub use listener::{ListenerRouter, WatchListener};
pub use picker::{AppPicker, MemorySelectionStore, SelectionStore};
pub use request::{call, RequestHandler, SuspendingResponder};
pub use sender::PebbleSender;
pub use service::{ServiceRouter, WatchAppService};
