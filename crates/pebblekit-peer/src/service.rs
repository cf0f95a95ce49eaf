//! Mediator-side dispatch of requests coming from client apps.

use std::sync::Arc;

use async_trait::async_trait;
use pebblekit_codec::{
    action_tag, encode_transmission_results, Action, AppControl, AppControlRequest, Dictionary,
    SendDataRequest, TransmissionResults, WatchIdentifier,
};
use pebblekit_transport::Bundle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::request::{RequestHandler, SuspendingResponder};

/// Operations the mediator app performs on behalf of clients.
///
/// `watches` of `None` targets every connected watch. Results are keyed
/// by the watches actually addressed.
#[async_trait]
pub trait WatchAppService: Send + Sync + 'static {
    async fn send_data(
        &self,
        watchapp: Uuid,
        data: Dictionary,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> Result<TransmissionResults>;

    async fn start_app(
        &self,
        watchapp: Uuid,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> Result<TransmissionResults>;

    async fn stop_app(
        &self,
        watchapp: Uuid,
        watches: Option<Vec<WatchIdentifier>>,
    ) -> Result<TransmissionResults>;
}

/// Routes inbound client requests to a [`WatchAppService`].
///
/// Any caller may send or control apps; the watch enforces permissions.
pub struct ServiceRouter<S> {
    service: Arc<S>,
}

impl<S: WatchAppService> ServiceRouter<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    pub fn into_responder(self) -> SuspendingResponder<Self> {
        SuspendingResponder::new(Arc::new(self))
    }

    async fn send_data(&self, request: &Bundle) -> Result<Option<TransmissionResults>> {
        let request = match SendDataRequest::from_bundle(request) {
            Ok(request) => request,
            Err(err) => {
                warn!(action = %Action::SendDataToWatch, error = %err, "malformed request");
                return Ok(None);
            }
        };
        let results = self
            .service
            .send_data(request.watchapp, request.data, request.watches)
            .await?;
        Ok(Some(results))
    }

    async fn control(
        &self,
        action: Action,
        request: &Bundle,
    ) -> Result<Option<TransmissionResults>> {
        let request = match AppControlRequest::from_bundle(request) {
            Ok(request) => request,
            Err(err) => {
                warn!(%action, error = %err, "malformed request");
                return Ok(None);
            }
        };
        let results = match request.control {
            AppControl::Start => {
                self.service
                    .start_app(request.watchapp, request.watches)
                    .await?
            }
            AppControl::Stop => {
                self.service
                    .stop_app(request.watchapp, request.watches)
                    .await?
            }
        };
        Ok(Some(results))
    }
}

#[async_trait]
impl<S: WatchAppService> RequestHandler for ServiceRouter<S> {
    async fn handle(&self, request: Bundle, calling_package: Option<String>) -> Result<Bundle> {
        let tag = action_tag(&request).unwrap_or_default();
        debug!(
            action = tag,
            calling_package = calling_package.as_deref().unwrap_or("<unknown>"),
            "dispatching"
        );

        let action = match Action::from_tag(tag) {
            Some(action) if action.is_server_bound() => action,
            Some(action) => {
                warn!(%action, "client-bound action sent to the mediator");
                return Ok(Bundle::new());
            }
            None => {
                warn!(action = tag, "unknown action");
                return Ok(Bundle::new());
            }
        };

        let results = match action {
            Action::SendDataToWatch => self.send_data(&request).await?,
            _ => self.control(action, &request).await?,
        };
        Ok(results
            .map(|results| encode_transmission_results(&results))
            .unwrap_or_default())
    }
}
