//! Client-side view of the selected mediator's watch-state provider.

use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use pebblekit_codec::{ConnectedWatch, WatchIdentifier, Watchapp};
use pebblekit_provider::{ChangeSubscription, Resource, ResourceSource, Table};
use tracing::debug;

use crate::picker::AppPicker;

/// Finds the provider published by a mediator package.
pub trait ProviderLocator: Send + Sync {
    fn locate(&self, package: &str) -> Option<Arc<dyn ResourceSource>>;
}

enum Follow {
    Resolve,
    Watching {
        source: Arc<dyn ResourceSource>,
        changes: ChangeSubscription,
    },
    Done,
}

/// Streams of watch state that re-emit whenever the provider reports a
/// change.
///
/// The mediator is resolved once per stream. With no reachable mediator a
/// stream yields a single empty value and ends.
pub struct InfoRetriever {
    picker: Arc<AppPicker>,
    locator: Arc<dyn ProviderLocator>,
}

impl InfoRetriever {
    pub fn new(picker: Arc<AppPicker>, locator: Arc<dyn ProviderLocator>) -> Self {
        Self { picker, locator }
    }

    pub fn connected_watches(&self) -> BoxStream<'static, Vec<ConnectedWatch>> {
        self.follow(Resource::ConnectedWatches)
            .map(|table| table.map(|t| t.to_connected_watches()).unwrap_or_default())
            .boxed()
    }

    pub fn active_app(&self, watch: WatchIdentifier) -> BoxStream<'static, Option<Watchapp>> {
        self.follow(Resource::ActiveApp(watch))
            .map(|table| table.and_then(|t| t.to_active_app()))
            .boxed()
    }

    /// Query `resource` now and again after every change. `None` means
    /// no provider was reachable.
    fn follow(&self, resource: Resource) -> BoxStream<'static, Option<Table>> {
        let picker = Arc::clone(&self.picker);
        let locator = Arc::clone(&self.locator);

        stream::unfold(Follow::Resolve, move |state| {
            let picker = Arc::clone(&picker);
            let locator = Arc::clone(&locator);
            let resource = resource.clone();
            async move {
                match state {
                    Follow::Resolve => {
                        let source = picker
                            .current_app()
                            .await
                            .and_then(|package| locator.locate(&package));
                        let Some(source) = source else {
                            debug!(%resource, "no provider reachable");
                            return Some((None, Follow::Done));
                        };
                        // Subscribe first so a change during the query is not lost.
                        let changes = source.subscribe(resource.clone());
                        let table = source.fetch(&resource, None).await;
                        Some((Some(table), Follow::Watching { source, changes }))
                    }
                    Follow::Watching {
                        source,
                        mut changes,
                    } => {
                        changes.changed().await?;
                        while changes.try_changed().is_some() {}
                        let table = source.fetch(&resource, None).await;
                        Some((Some(table), Follow::Watching { source, changes }))
                    }
                    Follow::Done => None,
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pebblekit_codec::WatchappType;
    use pebblekit_provider::{StateProvider, WatchStateFeed};
    use pebblekit_transport::{LocalServiceBus, ServiceExport, ROLE_SEND_DATA};
    use uuid::Uuid;

    use super::*;
    use crate::picker::MemorySelectionStore;

    const MEDIATOR: &str = "io.rebble.mediator";

    struct Locator(StateProvider);

    impl ProviderLocator for Locator {
        fn locate(&self, package: &str) -> Option<Arc<dyn ResourceSource>> {
            (package == MEDIATOR).then(|| Arc::new(self.0.clone()) as Arc<dyn ResourceSource>)
        }
    }

    fn watch(id: &str) -> ConnectedWatch {
        ConnectedWatch {
            id: id.into(),
            name: format!("Pebble {id}"),
            platform: "basalt".into(),
            revision: "snowy_dvt".into(),
            firmware_major: 4,
            firmware_minor: 4,
            firmware_patch: 0,
            firmware_tag: None,
        }
    }

    async fn next<T>(stream: &mut BoxStream<'static, T>) -> Option<T> {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream should emit")
    }

    /// Mediator installed, provider initialized and settled.
    async fn setup(installed: bool) -> (Arc<WatchStateFeed>, InfoRetriever) {
        let bus = LocalServiceBus::new();
        if installed {
            bus.register(MEDIATOR, ROLE_SEND_DATA, ServiceExport::NullBinding);
        }
        let picker = AppPicker::new(Arc::new(bus), Arc::new(MemorySelectionStore::new()));

        let provider = StateProvider::new();
        let feed = Arc::new(WatchStateFeed::new());
        let mut settled = provider.subscribe(Resource::ConnectedWatches);
        provider
            .initialize(feed.clone())
            .expect("provider should initialize");
        settled.changed().await;

        let info = InfoRetriever::new(Arc::new(picker), Arc::new(Locator(provider)));
        (feed, info)
    }

    #[tokio::test]
    async fn watch_list_follows_changes() {
        let (feed, info) = setup(true).await;
        let mut watches = info.connected_watches();
        assert_eq!(next(&mut watches).await, Some(Vec::new()));

        feed.set_watches(vec![watch("watch-1")]);
        assert_eq!(next(&mut watches).await, Some(vec![watch("watch-1")]));
    }

    #[tokio::test]
    async fn active_app_follows_changes() {
        let (feed, info) = setup(true).await;
        let id = WatchIdentifier::from("watch-1");
        let app = Watchapp {
            id: Uuid::nil(),
            name: Some("Weather".into()),
            app_type: WatchappType::Watchapp,
        };

        let mut apps = info.active_app(id.clone());
        assert_eq!(next(&mut apps).await, Some(None));

        feed.set_watches(vec![watch("watch-1")]);
        feed.set_active_app(&id, Some(app.clone()));
        let mut latest = next(&mut apps).await.expect("stream should stay open");
        while latest.is_none() {
            latest = next(&mut apps).await.expect("stream should stay open");
        }
        assert_eq!(latest, Some(app));
    }

    #[tokio::test]
    async fn without_mediator_yields_single_empty_value() {
        let (feed, info) = setup(false).await;
        feed.set_watches(vec![watch("watch-1")]);

        let watches: Vec<_> = info.connected_watches().collect().await;
        assert_eq!(watches, vec![Vec::new()]);

        let apps: Vec<_> = info.active_app("watch-1".into()).collect().await;
        assert_eq!(apps, vec![None]);
    }
}
