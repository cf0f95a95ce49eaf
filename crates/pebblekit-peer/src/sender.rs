//! Client API for talking to watchapps through the mediator app.

use std::sync::Arc;

use pebblekit_codec::{
    decode_transmission_results, AppControl, AppControlRequest, Dictionary, SendDataRequest,
    TransmissionResults, WatchIdentifier,
};
use pebblekit_transport::{Bundle, ServiceBinder};
use uuid::Uuid;

use crate::binding::BindingConnection;
use crate::config::PeerConfig;
use crate::discovery::SelectedAppResolver;
use crate::picker::AppPicker;
use crate::request::call;

/// Sends data to watchapps and starts or stops them.
///
/// Every operation returns `None` when the mediator app cannot be reached,
/// otherwise the outcome for each addressed watch. Call [`close`](Self::close)
/// when done; the mediator may stop once no client is bound.
pub struct PebbleSender {
    connection: BindingConnection,
    config: PeerConfig,
}

impl PebbleSender {
    pub fn new(binder: Arc<dyn ServiceBinder>, picker: Arc<AppPicker>) -> Self {
        Self::with_config(binder, picker, PeerConfig::default())
    }

    pub fn with_config(
        binder: Arc<dyn ServiceBinder>,
        picker: Arc<AppPicker>,
        config: PeerConfig,
    ) -> Self {
        let resolver = Arc::new(SelectedAppResolver::new(picker));
        Self {
            connection: BindingConnection::with_timeout(binder, resolver, config.bind_timeout),
            config,
        }
    }

    /// Send `data` to `watchapp` on `watches`, or on every connected watch.
    pub async fn send_data_to_watch(
        &self,
        watchapp: Uuid,
        data: Dictionary,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> Option<TransmissionResults> {
        let request = SendDataRequest {
            watchapp,
            data,
            watches,
        };
        self.transmit(request.to_bundle()).await
    }

    pub async fn start_app(
        &self,
        watchapp: Uuid,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> Option<TransmissionResults> {
        self.control(AppControl::Start, watchapp, watches).await
    }

    pub async fn stop_app(
        &self,
        watchapp: Uuid,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> Option<TransmissionResults> {
        self.control(AppControl::Stop, watchapp, watches).await
    }

    pub fn close(&self) {
        self.connection.close();
    }

    async fn control(
        &self,
        control: AppControl,
        watchapp: Uuid,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> Option<TransmissionResults> {
        let request = AppControlRequest {
            control,
            watchapp,
            watches,
        };
        self.transmit(request.to_bundle()).await
    }

    async fn transmit(&self, request: Bundle) -> Option<TransmissionResults> {
        let endpoint = self.connection.get_or_connect().await?;
        let reply = call(endpoint.as_ref(), request, self.config.request_timeout).await?;
        Some(decode_transmission_results(&reply))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use pebblekit_codec::{DictionaryItem, TransmissionResult};
    use pebblekit_transport::{LocalServiceBus, ServiceExport, ROLE_SEND_DATA};

    use super::*;
    use crate::error::Result;
    use crate::picker::MemorySelectionStore;
    use crate::service::{ServiceRouter, WatchAppService};

    const MEDIATOR: &str = "io.rebble.mediator";

    /// One connected watch that acks everything.
    struct OneWatch;

    impl OneWatch {
        fn results(watches: Option<Vec<WatchIdentifier>>) -> TransmissionResults {
            let connected = WatchIdentifier::from("watch-1");
            watches
                .unwrap_or_else(|| vec![connected.clone()])
                .into_iter()
                .map(|watch| {
                    let result = if watch == connected {
                        TransmissionResult::Success
                    } else {
                        TransmissionResult::FailedWatchNotConnected
                    };
                    (watch, result)
                })
                .collect()
        }
    }

    #[async_trait]
    impl WatchAppService for OneWatch {
        async fn send_data(
            &self,
            _: Uuid,
            _: Dictionary,
            watches: Option<Vec<WatchIdentifier>>,
        ) -> Result<TransmissionResults> {
            Ok(Self::results(watches))
        }

        async fn start_app(
            &self,
            _: Uuid,
            watches: Option<Vec<WatchIdentifier>>,
        ) -> Result<TransmissionResults> {
            Ok(Self::results(watches))
        }

        async fn stop_app(
            &self,
            _: Uuid,
            watches: Option<Vec<WatchIdentifier>>,
        ) -> Result<TransmissionResults> {
            Ok(Self::results(watches))
        }
    }

    fn sender(bus: &LocalServiceBus) -> PebbleSender {
        let picker = AppPicker::new(Arc::new(bus.clone()), Arc::new(MemorySelectionStore::new()));
        PebbleSender::new(Arc::new(bus.binder("client.app")), Arc::new(picker))
    }

    fn with_mediator() -> LocalServiceBus {
        let bus = LocalServiceBus::new();
        let responder = ServiceRouter::new(Arc::new(OneWatch)).into_responder();
        bus.register(MEDIATOR, ROLE_SEND_DATA, ServiceExport::Interface(Arc::new(responder)));
        bus
    }

    fn watchapp() -> Uuid {
        Uuid::parse_str("0054f75d-e60a-4932-8f8d-fe5c7dd365f6").expect("valid uuid")
    }

    #[tokio::test]
    async fn send_reaches_connected_watch() {
        let bus = with_mediator();
        let sender = sender(&bus);

        let results = sender
            .send_data_to_watch(
                watchapp(),
                Dictionary::from([(1, DictionaryItem::from("hi"))]),
                None,
            )
            .await
            .expect("mediator should be reachable");

        assert_eq!(
            results,
            TransmissionResults::from([(
                WatchIdentifier::from("watch-1"),
                TransmissionResult::Success
            )])
        );
    }

    #[tokio::test]
    async fn no_mediator_yields_none() {
        let bus = LocalServiceBus::new();
        let sender = sender(&bus);

        let results = sender
            .send_data_to_watch(watchapp(), Dictionary::new(), None)
            .await;
        assert!(results.is_none());
        assert_eq!(bus.bind_attempts(), 0);
    }

    #[tokio::test]
    async fn start_and_stop_report_per_watch() {
        let bus = with_mediator();
        let sender = sender(&bus);
        let watches = Some(vec!["watch-1".into(), "watch-9".into()]);

        let started = sender
            .start_app(watchapp(), watches.clone())
            .await
            .expect("mediator should be reachable");
        assert_eq!(started[&WatchIdentifier::from("watch-1")], TransmissionResult::Success);
        assert_eq!(
            started[&WatchIdentifier::from("watch-9")],
            TransmissionResult::FailedWatchNotConnected
        );

        let stopped = sender
            .stop_app(watchapp(), watches)
            .await
            .expect("mediator should be reachable");
        assert_eq!(stopped.len(), 2);
        assert_eq!(bus.bind_attempts(), 1);
    }

    #[tokio::test]
    async fn dead_mediator_yields_none_then_recovers() {
        let bus = with_mediator();
        let picker = AppPicker::new(Arc::new(bus.clone()), Arc::new(MemorySelectionStore::new()));
        let config = PeerConfig {
            bind_timeout: Duration::from_millis(50),
            ..PeerConfig::default()
        };
        let sender =
            PebbleSender::with_config(Arc::new(bus.binder("client.app")), Arc::new(picker), config);
        assert!(sender.start_app(watchapp(), None).await.is_some());

        bus.kill(MEDIATOR);
        assert!(sender.start_app(watchapp(), None).await.is_none());

        bus.restart(MEDIATOR);
        let results = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Some(results) = sender.start_app(watchapp(), None).await {
                    return results;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("mediator should come back");
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn close_releases_binding() {
        let bus = with_mediator();
        let sender = sender(&bus);
        assert!(sender.stop_app(watchapp(), None).await.is_some());
        assert_eq!(bus.binding_count(), 1);

        sender.close();
        assert_eq!(bus.binding_count(), 0);
    }
}
