//! Target resolution for the two directions of the protocol.

use std::sync::Arc;

use async_trait::async_trait;
use pebblekit_transport::{PackageDirectory, ServiceTarget, ROLE_RECEIVE_DATA, ROLE_SEND_DATA};
use tracing::debug;

use crate::binding::TargetResolver;
use crate::picker::AppPicker;

/// Client to mediator: the selected app's send-data endpoint.
pub struct SelectedAppResolver {
    picker: Arc<AppPicker>,
}

impl SelectedAppResolver {
    pub fn new(picker: Arc<AppPicker>) -> Self {
        Self { picker }
    }
}

#[async_trait]
impl TargetResolver for SelectedAppResolver {
    async fn resolve(&self) -> Option<ServiceTarget> {
        let package = self.picker.current_app().await;
        if package.is_none() {
            debug!("no mediator app selected");
        }
        package.map(|package| ServiceTarget::new(ROLE_SEND_DATA, package))
    }
}

/// Mediator to client: the first of `packages` that serves the listener role.
pub struct FirstEligibleResolver {
    directory: Arc<dyn PackageDirectory>,
    packages: Vec<String>,
}

impl FirstEligibleResolver {
    pub fn new(directory: Arc<dyn PackageDirectory>, packages: Vec<String>) -> Self {
        Self {
            directory,
            packages,
        }
    }
}

#[async_trait]
impl TargetResolver for FirstEligibleResolver {
    async fn resolve(&self) -> Option<ServiceTarget> {
        let serving = self.directory.query_services(ROLE_RECEIVE_DATA);
        let package = self.packages.iter().find(|p| serving.contains(p));
        if package.is_none() {
            debug!(candidates = self.packages.len(), "no listener installed");
        }
        package.map(|package| ServiceTarget::new(ROLE_RECEIVE_DATA, package.as_str()))
    }
}
