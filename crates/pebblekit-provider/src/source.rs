//! Upstream state feeds.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use futures_util::stream::{self, BoxStream, StreamExt};
use pebblekit_codec::{ConnectedWatch, WatchIdentifier, Watchapp};
use tokio::sync::watch;

/// Observable sequences the provider ingests.
///
/// Each call returns a fresh stream; the provider re-subscribes to
/// `active_app` whenever the connected-watch list changes.
pub trait WatchStateSource: Send + Sync {
    fn connected_watches(&self) -> BoxStream<'static, Vec<ConnectedWatch>>;

    /// Active app on one watch; `None` while unknown.
    fn active_app(&self, watch: &WatchIdentifier) -> BoxStream<'static, Option<Watchapp>>;
}

/// Push-driven [`WatchStateSource`].
///
/// Every stream starts with the current value and then follows updates.
/// Rapid updates may be coalesced; the latest value is always delivered.
pub struct WatchStateFeed {
    watches: watch::Sender<Vec<ConnectedWatch>>,
    apps: Mutex<HashMap<WatchIdentifier, watch::Sender<Option<Watchapp>>>>,
}

impl Default for WatchStateFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchStateFeed {
    pub fn new() -> Self {
        Self {
            watches: watch::Sender::new(Vec::new()),
            apps: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_watches(&self, watches: Vec<ConnectedWatch>) {
        self.watches.send_replace(watches);
    }

    pub fn set_active_app(&self, watch: &WatchIdentifier, app: Option<Watchapp>) {
        self.app_channel(watch).send_replace(app);
    }

    fn app_channel(&self, watch: &WatchIdentifier) -> watch::Sender<Option<Watchapp>> {
        let mut apps = self.apps.lock().unwrap_or_else(PoisonError::into_inner);
        apps.entry(watch.clone())
            .or_insert_with(|| watch::Sender::new(None))
            .clone()
    }
}

fn follow<T>(rx: watch::Receiver<T>) -> BoxStream<'static, T>
where
    T: Clone + Send + Sync + 'static,
{
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let value = rx.borrow_and_update().clone();
        Some((value, (rx, false)))
    })
    .boxed()
}

impl WatchStateSource for WatchStateFeed {
    fn connected_watches(&self) -> BoxStream<'static, Vec<ConnectedWatch>> {
        follow(self.watches.subscribe())
    }

    fn active_app(&self, watch: &WatchIdentifier) -> BoxStream<'static, Option<Watchapp>> {
        follow(self.app_channel(watch).subscribe())
    }
}
