//! Watch-state provider for PebbleKit.
//!
//! Ingests an observable feed of connected watches and per-watch active
//! apps, keeps the latest snapshot queryable as typed tables, and notifies
//! subscribers when, and only when, a resource actually changes.
//!
//! ```no_run
//! # async fn demo() -> pebblekit_provider::Result<()> {
//! use std::sync::Arc;
//! use pebblekit_provider::{Resource, StateProvider, WatchStateFeed};
//!
//! let provider = StateProvider::new();
//! let feed = Arc::new(WatchStateFeed::new());
//! provider.initialize(feed.clone())?;
//!
//! let mut changes = provider.subscribe(Resource::ConnectedWatches);
//! feed.set_watches(Vec::new());
//! changes.changed().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod resource;
pub mod source;

pub use config::ProviderConfig;
pub use error::{ProviderError, Result};
pub use provider::{ChangeSubscription, ResourceSource, StateProvider};
pub use resource::{
    ActiveAppColumn, Cell, Column, ConnectedWatchColumn, Resource, Table, ACTIVE_APP_PATH,
    CONNECTED_WATCHES_PATH,
};
pub use source::{WatchStateFeed, WatchStateSource};
