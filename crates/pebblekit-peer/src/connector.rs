//! Mediator API for delivering watch events to a client app.

use std::sync::Arc;

use pebblekit_codec::{
    decode_receive_reply, AppLifecycleEvent, Dictionary, Lifecycle, ReceiveDataRequest,
    ReceiveResult, WatchIdentifier,
};
use pebblekit_transport::{PackageDirectory, ServiceBinder};
use uuid::Uuid;

use crate::binding::BindingConnection;
use crate::config::PeerConfig;
use crate::discovery::FirstEligibleResolver;
use crate::request::call;

/// Binds to a client app's listener and forwards watch events to it.
///
/// The first of the configured packages that has a listener installed is
/// used. Close the connector once the watchapps it serves have closed so
/// the client's listener can stop.
pub struct ListenerConnector {
    connection: BindingConnection,
    config: PeerConfig,
}

impl ListenerConnector {
    pub fn new(
        binder: Arc<dyn ServiceBinder>,
        directory: Arc<dyn PackageDirectory>,
        packages: Vec<String>,
    ) -> Self {
        Self::with_config(binder, directory, packages, PeerConfig::default())
    }

    pub fn with_config(
        binder: Arc<dyn ServiceBinder>,
        directory: Arc<dyn PackageDirectory>,
        packages: Vec<String>,
        config: PeerConfig,
    ) -> Self {
        let resolver = Arc::new(FirstEligibleResolver::new(directory, packages));
        Self {
            connection: BindingConnection::with_timeout(binder, resolver, config.bind_timeout),
            config,
        }
    }

    /// Deliver a watch message. `None` if the client could not be reached.
    pub async fn send_on_message_received(
        &self,
        watchapp: Uuid,
        data: Dictionary,
        watch: WatchIdentifier,
    ) -> Option<ReceiveResult> {
        let endpoint = self.connection.get_or_connect().await?;
        let request = ReceiveDataRequest {
            watchapp,
            data,
            watch,
        };
        let reply = call(
            endpoint.as_ref(),
            request.to_bundle(),
            self.config.request_timeout,
        )
        .await?;
        Some(decode_receive_reply(&reply))
    }

    /// `true` once the event was handed to a connected client.
    pub async fn send_on_app_opened(&self, watchapp: Uuid, watch: WatchIdentifier) -> bool {
        self.lifecycle(Lifecycle::Opened, watchapp, watch).await
    }

    pub async fn send_on_app_closed(&self, watchapp: Uuid, watch: WatchIdentifier) -> bool {
        self.lifecycle(Lifecycle::Closed, watchapp, watch).await
    }

    pub fn close(&self) {
        self.connection.close();
    }

    async fn lifecycle(
        &self,
        lifecycle: Lifecycle,
        watchapp: Uuid,
        watch: WatchIdentifier,
    ) -> bool {
        let Some(endpoint) = self.connection.get_or_connect().await else {
            return false;
        };
        let event = AppLifecycleEvent {
            lifecycle,
            watchapp,
            watch,
        };
        // The reply carries nothing; only reaching the client matters.
        call(endpoint.as_ref(), event.to_bundle(), self.config.request_timeout).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pebblekit_codec::DictionaryItem;
    use pebblekit_transport::{LocalServiceBus, ServiceExport, ROLE_RECEIVE_DATA, ROLE_SEND_DATA};

    use super::*;
    use crate::error::Result;
    use crate::listener::{ListenerRouter, WatchListener};
    use crate::picker::{AppPicker, MemorySelectionStore};
    use crate::request::SuspendingResponder;

    const MEDIATOR: &str = "io.rebble.mediator";
    const CLIENT: &str = "com.example.weather";

    #[derive(Default)]
    struct Weather {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WatchListener for Weather {
        async fn on_message_received(
            &self,
            _: Uuid,
            data: Dictionary,
            watch: WatchIdentifier,
        ) -> Result<ReceiveResult> {
            let text = data.get(&1).map(ToString::to_string).unwrap_or_default();
            self.events
                .lock()
                .unwrap()
                .push(format!("message:{watch}:{text}"));
            Ok(ReceiveResult::Ack)
        }

        async fn on_app_opened(&self, _: Uuid, watch: WatchIdentifier) -> Result<()> {
            self.events.lock().unwrap().push(format!("opened:{watch}"));
            Ok(())
        }

        async fn on_app_closed(&self, _: Uuid, watch: WatchIdentifier) -> Result<()> {
            self.events.lock().unwrap().push(format!("closed:{watch}"));
            Ok(())
        }
    }

    /// Bus with a mediator registered under the send role and a client
    /// listener that trusts it.
    fn setup() -> (LocalServiceBus, Arc<Weather>, ListenerConnector) {
        let bus = LocalServiceBus::new();
        bus.register(MEDIATOR, ROLE_SEND_DATA, ServiceExport::NullBinding);

        let picker = AppPicker::new(Arc::new(bus.clone()), Arc::new(MemorySelectionStore::new()));
        let weather = Arc::new(Weather::default());
        let router = ListenerRouter::new(weather.clone(), Arc::new(picker));
        let responder: SuspendingResponder<_> = router.into_responder();
        bus.register(CLIENT, ROLE_RECEIVE_DATA, ServiceExport::Interface(Arc::new(responder)));

        let connector = ListenerConnector::new(
            Arc::new(bus.binder(MEDIATOR)),
            Arc::new(bus.clone()),
            vec!["com.example.missing".into(), CLIENT.into()],
        );
        (bus, weather, connector)
    }

    fn watchapp() -> Uuid {
        Uuid::parse_str("0054f75d-e60a-4932-8f8d-fe5c7dd365f6").expect("valid uuid")
    }

    #[tokio::test]
    async fn message_is_delivered_and_acked() {
        let (_bus, weather, connector) = setup();
        let result = connector
            .send_on_message_received(
                watchapp(),
                Dictionary::from([(1, DictionaryItem::from("sunny"))]),
                WatchIdentifier::from("watch-1"),
            )
            .await;

        assert_eq!(result, Some(ReceiveResult::Ack));
        assert_eq!(*weather.events.lock().unwrap(), vec!["message:watch-1:sunny"]);
    }

    #[tokio::test]
    async fn lifecycle_events_are_delivered() {
        let (_bus, weather, connector) = setup();
        let watch = WatchIdentifier::from("watch-1");

        assert!(connector.send_on_app_opened(watchapp(), watch.clone()).await);
        assert!(connector.send_on_app_closed(watchapp(), watch).await);
        assert_eq!(
            *weather.events.lock().unwrap(),
            vec!["opened:watch-1", "closed:watch-1"]
        );
    }

    #[tokio::test]
    async fn untrusted_mediator_gets_unknown_result() {
        let (bus, weather, _) = setup();
        let impostor = ListenerConnector::new(
            Arc::new(bus.binder("com.evil.spy")),
            Arc::new(bus.clone()),
            vec![CLIENT.into()],
        );

        let result = impostor
            .send_on_message_received(watchapp(), Dictionary::new(), "watch-1".into())
            .await;
        assert_eq!(result, Some(ReceiveResult::Unknown(None)));
        assert!(weather.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_client_is_unreachable() {
        let bus = LocalServiceBus::new();
        let connector = ListenerConnector::new(
            Arc::new(bus.binder(MEDIATOR)),
            Arc::new(bus.clone()),
            vec![CLIENT.into()],
        );

        let result = connector
            .send_on_message_received(watchapp(), Dictionary::new(), "watch-1".into())
            .await;
        assert!(result.is_none());
        assert!(!connector.send_on_app_opened(watchapp(), "watch-1".into()).await);
        assert_eq!(bus.bind_attempts(), 0);
    }
}
