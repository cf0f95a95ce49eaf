use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use pebblekit_codec::{ConnectedWatch, WatchIdentifier, Watchapp};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};
use crate::resource::{ActiveAppColumn, Column, ConnectedWatchColumn, Resource, Table};
use crate::source::WatchStateSource;

/// Read side of a provider as seen by remote clients.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Query a table, waiting for the provider to initialize first.
    async fn fetch(&self, resource: &Resource, projection: Option<&[&str]>) -> Table;

    /// Subscribe to changes of one resource.
    fn subscribe(&self, resource: Resource) -> ChangeSubscription;
}

/// Receiver of change notifications.
///
/// Created by [`StateProvider::subscribe`] (one exact resource) or
/// [`StateProvider::subscribe_all`].
pub struct ChangeSubscription {
    filter: Option<Resource>,
    rx: broadcast::Receiver<Resource>,
}

impl ChangeSubscription {
    /// Wait for the next matching change.
    ///
    /// Returns `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<Resource> {
        loop {
            match self.rx.recv().await {
                Ok(resource) => {
                    if self.filter.as_ref().is_none_or(|f| *f == resource) {
                        return Some(resource);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => match &self.filter {
                    Some(resource) => {
                        debug!(%resource, missed, "subscriber lagged, reporting change");
                        return Some(resource.clone());
                    }
                    None => warn!(missed, "subscriber lagged, notifications dropped"),
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`changed`](Self::changed).
    pub fn try_changed(&mut self) -> Option<Resource> {
        loop {
            match self.rx.try_recv() {
                Ok(resource) => {
                    if self.filter.as_ref().is_none_or(|f| *f == resource) {
                        return Some(resource);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    if let Some(resource) = &self.filter {
                        return Some(resource.clone());
                    }
                }
                Err(_) => return None,
            }
        }
    }
}

/// One-time initialization barrier usable from both sync and async callers.
struct InitGate {
    opened: Mutex<bool>,
    cond: Condvar,
    notify: watch::Sender<bool>,
}

impl InitGate {
    fn new() -> Self {
        Self {
            opened: Mutex::new(false),
            cond: Condvar::new(),
            notify: watch::Sender::new(false),
        }
    }

    fn open(&self) {
        let mut opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner);
        *opened = true;
        self.cond.notify_all();
        self.notify.send_replace(true);
    }

    fn is_open(&self) -> bool {
        *self.opened.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner);
        match timeout {
            None => {
                let opened = self
                    .cond
                    .wait_while(opened, |opened| !*opened)
                    .unwrap_or_else(PoisonError::into_inner);
                *opened
            }
            Some(timeout) => {
                let (opened, _) = self
                    .cond
                    .wait_timeout_while(opened, timeout, |opened| !*opened)
                    .unwrap_or_else(PoisonError::into_inner);
                *opened
            }
        }
    }

    async fn wait_async(&self) {
        let mut rx = self.notify.subscribe();
        // The sender lives as long as the gate, so this cannot fail.
        let _ = rx.wait_for(|opened| *opened).await;
    }
}

struct Shared {
    watches: RwLock<Arc<Vec<ConnectedWatch>>>,
    active_apps: RwLock<HashMap<WatchIdentifier, Option<Watchapp>>>,
    /// Generation of the current per-watch subscriptions.
    generation: AtomicU64,
    notifier: broadcast::Sender<Resource>,
    init: InitGate,
}

impl Shared {
    fn notify(&self, resource: Resource) {
        trace!(%resource, "change");
        // No receivers is fine.
        let _ = self.notifier.send(resource);
    }

    fn replace_watches(&self, watches: Vec<ConnectedWatch>) {
        {
            let mut current = self.watches.write().unwrap_or_else(PoisonError::into_inner);
            *current = Arc::new(watches);
        }
        self.notify(Resource::ConnectedWatches);
    }

    /// Drop cached apps of watches that are no longer connected.
    fn remove_stale(&self, connected: &HashSet<WatchIdentifier>) {
        let mut removed = Vec::new();
        {
            let mut apps = self
                .active_apps
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            apps.retain(|id, app| {
                if connected.contains(id) {
                    return true;
                }
                if app.is_some() {
                    removed.push(id.clone());
                }
                false
            });
        }
        for id in removed {
            debug!(watch = %id, "watch disconnected, clearing active app");
            self.notify(Resource::ActiveApp(id));
        }
    }

    fn update_active_app(
        &self,
        generation: u64,
        watch: &WatchIdentifier,
        app: Option<Watchapp>,
    ) {
        let changed = {
            let mut apps = self
                .active_apps
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if self.generation.load(Ordering::Acquire) != generation {
                return;
            }
            let old = apps.insert(watch.clone(), app.clone()).flatten();
            old != app
        };
        if changed {
            self.notify(Resource::ActiveApp(watch.clone()));
        }
    }
}

/// Continuously refreshed, queryable snapshot of connected watches and the
/// active app on each of them.
///
/// Construct, hand out clones, then call [`initialize`](Self::initialize)
/// once the upstream source is ready. Queries issued earlier block until then.
#[derive(Clone)]
pub struct StateProvider {
    shared: Arc<Shared>,
    started: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Default for StateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StateProvider {
    pub fn new() -> Self {
        Self::with_config(ProviderConfig::default())
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        let (notifier, _) = broadcast::channel(config.notification_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                watches: RwLock::new(Arc::new(Vec::new())),
                active_apps: RwLock::new(HashMap::new()),
                generation: AtomicU64::new(0),
                notifier,
                init: InitGate::new(),
            }),
            started: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    /// Start ingesting `source`. Must be called exactly once, from within a
    /// tokio runtime.
    pub fn initialize(&self, source: Arc<dyn WatchStateSource>) -> Result<()> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| ProviderError::NoRuntime)?;
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ProviderError::AlreadyInitialized);
        }

        handle.spawn(ingest(
            Arc::clone(&self.shared),
            source,
            self.cancel.clone(),
        ));
        self.shared.init.open();
        debug!("state provider initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.init.is_open()
    }

    /// Stop ingestion. Cached state stays queryable.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub async fn wait_initialized(&self) {
        self.shared.init.wait_async().await;
    }

    /// Blocking query. Waits for initialization without bound.
    pub fn query(&self, resource: &Resource, projection: Option<&[&str]>) -> Table {
        self.shared.init.wait(None);
        self.snapshot(resource, projection)
    }

    /// Blocking query with a bounded wait for initialization.
    pub fn query_timeout(
        &self,
        resource: &Resource,
        projection: Option<&[&str]>,
        timeout: Duration,
    ) -> Result<Table> {
        if !self.shared.init.wait(Some(timeout)) {
            return Err(ProviderError::InitTimeout(timeout));
        }
        Ok(self.snapshot(resource, projection))
    }

    /// Query by path. Unknown paths yield `None`.
    pub fn query_path(&self, path: &str, projection: Option<&[&str]>) -> Option<Table> {
        match Resource::parse(path) {
            Ok(resource) => Some(self.query(&resource, projection)),
            Err(err) => {
                debug!(error = %err, "query for unknown resource");
                None
            }
        }
    }

    pub fn connected_watches(&self) -> Arc<Vec<ConnectedWatch>> {
        let watches = self
            .shared
            .watches
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&watches)
    }

    pub fn active_app(&self, watch: &WatchIdentifier) -> Option<Watchapp> {
        let apps = self
            .shared
            .active_apps
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        apps.get(watch).cloned().flatten()
    }

    pub fn subscribe(&self, resource: Resource) -> ChangeSubscription {
        ChangeSubscription {
            filter: Some(resource),
            rx: self.shared.notifier.subscribe(),
        }
    }

    pub fn subscribe_all(&self) -> ChangeSubscription {
        ChangeSubscription {
            filter: None,
            rx: self.shared.notifier.subscribe(),
        }
    }

    fn snapshot(&self, resource: &Resource, projection: Option<&[&str]>) -> Table {
        match resource {
            Resource::ConnectedWatches => Table::connected_watches(
                &self.connected_watches(),
                &ConnectedWatchColumn::project(projection),
            ),
            Resource::ActiveApp(watch) => Table::active_app(
                self.active_app(watch).as_ref(),
                &ActiveAppColumn::project(projection),
            ),
        }
    }
}

#[async_trait]
impl ResourceSource for StateProvider {
    async fn fetch(&self, resource: &Resource, projection: Option<&[&str]>) -> Table {
        self.wait_initialized().await;
        self.snapshot(resource, projection)
    }

    fn subscribe(&self, resource: Resource) -> ChangeSubscription {
        StateProvider::subscribe(self, resource)
    }
}

async fn ingest(
    shared: Arc<Shared>,
    source: Arc<dyn WatchStateSource>,
    cancel: CancellationToken,
) {
    let mut watches = source.connected_watches();
    let mut last: Option<Vec<ConnectedWatch>> = None;
    let mut followers = JoinSet::new();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = watches.next() => next,
        };
        let Some(list) = next else {
            debug!("connected watch feed ended");
            break;
        };
        if last.as_ref() == Some(&list) {
            continue;
        }

        // Latest wins: retire the previous generation before touching state.
        let generation = shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        retire_followers(&mut followers);

        let connected: HashSet<WatchIdentifier> = list.iter().map(|w| w.id.clone()).collect();
        debug!(count = list.len(), "connected watches changed");
        shared.replace_watches(list.clone());
        shared.remove_stale(&connected);

        for watch in list.iter().map(|w| w.id.clone()) {
            let apps = source.active_app(&watch);
            followers.spawn(follow_active_app(
                Arc::clone(&shared),
                generation,
                watch,
                apps,
            ));
        }
        last = Some(list);
    }

    // Per-watch subscriptions outlive a finished device feed until cancelled.
    if !cancel.is_cancelled() {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = async { while followers.join_next().await.is_some() {} } => {}
        }
    }
    followers.shutdown().await;
    debug!("state provider ingestion stopped");
}

/// Abort every follower and release its slot in the set.
fn retire_followers(followers: &mut JoinSet<()>) {
    // Dropping the old set aborts its tasks; `abort_all` alone keeps the entries.
    drop(std::mem::take(followers));
}

async fn follow_active_app(
    shared: Arc<Shared>,
    generation: u64,
    watch: WatchIdentifier,
    mut apps: BoxStream<'static, Option<Watchapp>>,
) {
    while let Some(app) = apps.next().await {
        shared.update_active_app(generation, &watch, app);
    }
}
