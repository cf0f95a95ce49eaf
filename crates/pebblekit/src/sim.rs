//! In-process loopback of a client app, the mediator app and its watches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pebblekit_codec::{
    ConnectedWatch, Dictionary, ReceiveResult, TransmissionResult, TransmissionResults,
    WatchIdentifier, Watchapp, WatchappType,
};
use pebblekit_peer::{
    AppPicker, InfoRetriever, ListenerConnector, ListenerRouter, MemorySelectionStore,
    PebbleSender, PeerConfig, ProviderLocator, ServiceRouter, WatchAppService, WatchListener,
};
use pebblekit_provider::{Resource, ResourceSource, StateProvider, WatchStateFeed};
use pebblekit_transport::{LocalServiceBus, ServiceExport, ROLE_RECEIVE_DATA, ROLE_SEND_DATA};
use tracing::{debug, info};
use uuid::Uuid;

use crate::exit::{peer_error, provider_error, CliError, CliResult, INTERNAL};

pub const MEDIATOR_PACKAGE: &str = "io.rebble.mediator";
pub const CLIENT_PACKAGE: &str = "io.rebble.pebblekit.cli";

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct SimOptions {
    /// Watches the mediator reports as connected.
    pub watches: Vec<String>,
    pub install_mediator: bool,
    /// App shown as active on every connected watch.
    pub active_app: Option<Watchapp>,
}

fn simulated_watch(id: &str) -> ConnectedWatch {
    ConnectedWatch {
        id: WatchIdentifier::from(id),
        name: format!("Pebble Time {id}"),
        platform: "basalt".to_string(),
        revision: "snowy_dvt".to_string(),
        firmware_major: 4,
        firmware_minor: 4,
        firmware_patch: 0,
        firmware_tag: None,
    }
}

/// Mediator-side handler that "delivers" to the simulated watches.
struct SimulatedWatches {
    provider: StateProvider,
    feed: Arc<WatchStateFeed>,
}

impl SimulatedWatches {
    fn deliver(&self, watches: Option<Vec<WatchIdentifier>>) -> TransmissionResults {
        let connected = self.provider.connected_watches();
        let targets =
            watches.unwrap_or_else(|| connected.iter().map(|watch| watch.id.clone()).collect());
        targets
            .into_iter()
            .map(|target| {
                let result = if connected.iter().any(|watch| watch.id == target) {
                    TransmissionResult::Success
                } else {
                    TransmissionResult::FailedWatchNotConnected
                };
                (target, result)
            })
            .collect()
    }

    fn set_active(&self, results: &TransmissionResults, app: Option<Watchapp>) {
        for (watch, result) in results {
            if result.is_success() {
                self.feed.set_active_app(watch, app.clone());
            }
        }
    }
}

#[async_trait]
impl WatchAppService for SimulatedWatches {
    async fn send_data(
        &self,
        watchapp: Uuid,
        data: Dictionary,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> pebblekit_peer::Result<TransmissionResults> {
        debug!(%watchapp, entries = data.len(), "delivering to simulated watches");
        Ok(self.deliver(watches))
    }

    async fn start_app(
        &self,
        watchapp: Uuid,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> pebblekit_peer::Result<TransmissionResults> {
        let results = self.deliver(watches);
        let app = Watchapp {
            id: watchapp,
            name: None,
            app_type: WatchappType::Watchapp,
        };
        self.set_active(&results, Some(app));
        Ok(results)
    }

    async fn stop_app(
        &self,
        _watchapp: Uuid,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> pebblekit_peer::Result<TransmissionResults> {
        let results = self.deliver(watches);
        self.set_active(&results, None);
        Ok(results)
    }
}

/// Client-side listener that acknowledges every message.
pub struct AckListener;

#[async_trait]
impl WatchListener for AckListener {
    async fn on_message_received(
        &self,
        watchapp: Uuid,
        data: Dictionary,
        watch: WatchIdentifier,
    ) -> pebblekit_peer::Result<ReceiveResult> {
        info!(%watchapp, %watch, entries = data.len(), "message received from watch");
        Ok(ReceiveResult::Ack)
    }
}

struct MediatorProvider(StateProvider);

impl ProviderLocator for MediatorProvider {
    fn locate(&self, package: &str) -> Option<Arc<dyn ResourceSource>> {
        (package == MEDIATOR_PACKAGE).then(|| Arc::new(self.0.clone()) as Arc<dyn ResourceSource>)
    }
}

pub struct Loopback {
    bus: LocalServiceBus,
    provider: StateProvider,
    picker: Arc<AppPicker>,
}

impl Loopback {
    /// Build the loopback and wait until the provider reflects `options`.
    pub async fn start(options: &SimOptions) -> CliResult<Self> {
        let provider = StateProvider::new();
        let feed = Arc::new(WatchStateFeed::new());
        feed.set_watches(options.watches.iter().map(|id| simulated_watch(id)).collect());

        let mut pending = vec![provider.subscribe(Resource::ConnectedWatches)];
        if let Some(app) = &options.active_app {
            for id in &options.watches {
                let watch = WatchIdentifier::from(id.as_str());
                feed.set_active_app(&watch, Some(app.clone()));
                pending.push(provider.subscribe(Resource::ActiveApp(watch)));
            }
        }

        provider
            .initialize(feed.clone())
            .map_err(|err| provider_error("provider start failed", err))?;
        for mut subscription in pending {
            tokio::time::timeout(SETTLE_TIMEOUT, subscription.changed())
                .await
                .map_err(|_| CliError::new(INTERNAL, "simulated provider did not settle"))?;
        }

        let bus = LocalServiceBus::new();
        if options.install_mediator {
            let watches = SimulatedWatches {
                provider: provider.clone(),
                feed,
            };
            let responder = ServiceRouter::new(Arc::new(watches)).into_responder();
            bus.register(
                MEDIATOR_PACKAGE,
                ROLE_SEND_DATA,
                ServiceExport::Interface(Arc::new(responder)),
            );
        }
        let picker = Arc::new(AppPicker::new(
            Arc::new(bus.clone()),
            Arc::new(MemorySelectionStore::new()),
        ));

        Ok(Self {
            bus,
            provider,
            picker,
        })
    }

    pub fn provider(&self) -> &StateProvider {
        &self.provider
    }

    /// Pin the client to `package` instead of auto-selecting.
    pub async fn select(&self, package: &str) -> CliResult<()> {
        self.picker
            .select_app(Some(package))
            .await
            .map_err(|err| peer_error("select failed", err))
    }

    pub fn sender(&self, config: PeerConfig) -> PebbleSender {
        PebbleSender::with_config(
            Arc::new(self.bus.binder(CLIENT_PACKAGE)),
            self.picker.clone(),
            config,
        )
    }

    pub fn info(&self) -> InfoRetriever {
        InfoRetriever::new(
            self.picker.clone(),
            Arc::new(MediatorProvider(self.provider.clone())),
        )
    }

    /// Serve `listener` as the client app's inbound endpoint.
    pub fn listen<L: WatchListener>(&self, listener: Arc<L>) {
        let responder = ListenerRouter::new(listener, self.picker.clone()).into_responder();
        self.bus.register(
            CLIENT_PACKAGE,
            ROLE_RECEIVE_DATA,
            ServiceExport::Interface(Arc::new(responder)),
        );
    }

    /// Mediator's connection back to the client app.
    pub fn connector(&self, config: PeerConfig) -> ListenerConnector {
        ListenerConnector::with_config(
            Arc::new(self.bus.binder(MEDIATOR_PACKAGE)),
            Arc::new(self.bus.clone()),
            vec![CLIENT_PACKAGE.to_string()],
            config,
        )
    }
}
