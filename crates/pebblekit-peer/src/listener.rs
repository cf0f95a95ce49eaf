//! Client-side dispatch of requests coming from the mediator app.

use std::sync::Arc;

use async_trait::async_trait;
use pebblekit_codec::{
    action_tag, encode_receive_reply, Action, AppLifecycleEvent, Dictionary, Lifecycle,
    ReceiveDataRequest, ReceiveResult, WatchIdentifier,
};
use pebblekit_transport::Bundle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::picker::AppPicker;
use crate::request::{RequestHandler, SuspendingResponder};

/// Callbacks a client app implements to hear from its watchapps.
///
/// Every method has a default so apps only override what they use.
#[async_trait]
pub trait WatchListener: Send + Sync + 'static {
    /// A watchapp sent `data`. The default rejects it.
    async fn on_message_received(
        &self,
        watchapp: Uuid,
        data: Dictionary,
        watch: WatchIdentifier,
    ) -> Result<ReceiveResult> {
        let _ = (watchapp, data, watch);
        Ok(ReceiveResult::Nack)
    }

    async fn on_app_opened(&self, watchapp: Uuid, watch: WatchIdentifier) -> Result<()> {
        let _ = (watchapp, watch);
        Ok(())
    }

    async fn on_app_closed(&self, watchapp: Uuid, watch: WatchIdentifier) -> Result<()> {
        let _ = (watchapp, watch);
        Ok(())
    }
}

/// Routes inbound requests to a [`WatchListener`].
///
/// Only the currently selected mediator app may call in. Anyone else gets
/// an empty reply and the listener is never invoked.
pub struct ListenerRouter<L> {
    listener: Arc<L>,
    picker: Arc<AppPicker>,
}

impl<L: WatchListener> ListenerRouter<L> {
    pub fn new(listener: Arc<L>, picker: Arc<AppPicker>) -> Self {
        Self { listener, picker }
    }

    /// Wrap in a responder ready to register with the transport.
    pub fn into_responder(self) -> SuspendingResponder<Self> {
        SuspendingResponder::new(Arc::new(self))
    }

    async fn is_authorized(&self, calling_package: Option<&str>) -> bool {
        let Some(caller) = calling_package else {
            return false;
        };
        self.picker.current_app().await.as_deref() == Some(caller)
    }

    async fn receive_data(&self, request: &Bundle) -> Result<Bundle> {
        let message = match ReceiveDataRequest::from_bundle(request) {
            Ok(message) => message,
            Err(err) => {
                warn!(action = %Action::ReceiveDataFromWatch, error = %err, "malformed request");
                return Ok(Bundle::new());
            }
        };
        let result = self
            .listener
            .on_message_received(message.watchapp, message.data, message.watch)
            .await?;
        Ok(encode_receive_reply(&result))
    }

    async fn lifecycle(&self, action: Action, request: &Bundle) -> Result<Bundle> {
        let event = match AppLifecycleEvent::from_bundle(request) {
            Ok(event) => event,
            Err(err) => {
                warn!(%action, error = %err, "malformed request");
                return Ok(Bundle::new());
            }
        };
        match event.lifecycle {
            Lifecycle::Opened => {
                self.listener
                    .on_app_opened(event.watchapp, event.watch)
                    .await?
            }
            Lifecycle::Closed => {
                self.listener
                    .on_app_closed(event.watchapp, event.watch)
                    .await?
            }
        }
        Ok(Bundle::new())
    }
}

#[async_trait]
impl<L: WatchListener> RequestHandler for ListenerRouter<L> {
    async fn handle(&self, request: Bundle, calling_package: Option<String>) -> Result<Bundle> {
        if !self.is_authorized(calling_package.as_deref()).await {
            warn!(
                calling_package = calling_package.as_deref().unwrap_or("<unknown>"),
                "rejected request from non-selected app"
            );
            return Ok(Bundle::new());
        }

        let tag = action_tag(&request).unwrap_or_default();
        debug!(action = tag, "dispatching");
        match Action::from_tag(tag) {
            Some(Action::ReceiveDataFromWatch) => self.receive_data(&request).await,
            Some(action @ (Action::AppOpened | Action::AppClosed)) => {
                self.lifecycle(action, &request).await
            }
            _ => {
                warn!(action = tag, "unknown action");
                Ok(Bundle::new())
            }
        }
    }
}
