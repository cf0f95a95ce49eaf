//! Selection of the mediator app a client talks to.
//!
//! A client only binds to, and only accepts inbound requests from, the
//! selected mediator. With auto-select on, any installed mediator is used
//! when nothing valid is selected; apps that handle sensitive data can turn
//! it off and select explicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use pebblekit_transport::{PackageDirectory, ROLE_SEND_DATA};
use tracing::debug;

use crate::config::{PickerConfig, TieBreak};
use crate::error::{PeerError, Result};

/// Persistence for the explicit selection.
#[async_trait]
pub trait SelectionStore: Send + Sync {
    async fn load(&self) -> Option<String>;
    async fn save(&self, selection: Option<String>);
}

/// Volatile [`SelectionStore`].
#[derive(Debug, Default)]
pub struct MemorySelectionStore {
    selection: Mutex<Option<String>>,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SelectionStore for MemorySelectionStore {
    async fn load(&self) -> Option<String> {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn save(&self, selection: Option<String>) {
        *self.selection.lock().unwrap_or_else(PoisonError::into_inner) = selection;
    }
}

/// Chooses which installed mediator app is trusted.
pub struct AppPicker {
    directory: Arc<dyn PackageDirectory>,
    store: Arc<dyn SelectionStore>,
    tie_break: TieBreak,
    auto_select: AtomicBool,
}

impl AppPicker {
    pub fn new(directory: Arc<dyn PackageDirectory>, store: Arc<dyn SelectionStore>) -> Self {
        Self::with_config(directory, store, PickerConfig::default())
    }

    pub fn with_config(
        directory: Arc<dyn PackageDirectory>,
        store: Arc<dyn SelectionStore>,
        config: PickerConfig,
    ) -> Self {
        Self {
            directory,
            store,
            tie_break: config.tie_break,
            auto_select: AtomicBool::new(config.auto_select),
        }
    }

    pub fn auto_select(&self) -> bool {
        self.auto_select.load(Ordering::Relaxed)
    }

    pub fn set_auto_select(&self, enabled: bool) {
        self.auto_select.store(enabled, Ordering::Relaxed);
    }

    /// Distinct packages that declare the mediator role, in tie-break order.
    pub fn eligible_apps(&self) -> Vec<String> {
        let mut apps: Vec<String> = Vec::new();
        for package in self.directory.query_services(ROLE_SEND_DATA) {
            if !apps.contains(&package) {
                apps.push(package);
            }
        }
        if self.tie_break == TieBreak::Lexicographic {
            apps.sort();
        }
        apps
    }

    /// The selected app, or with auto-select the first eligible one.
    ///
    /// A stored selection that is no longer eligible is ignored.
    pub async fn current_app(&self) -> Option<String> {
        let eligible = self.eligible_apps();
        if eligible.is_empty() {
            return None;
        }

        let stored = self.store.load().await;
        let selected = stored.filter(|package| eligible.contains(package));
        if selected.is_some() || !self.auto_select() {
            return selected;
        }
        eligible.into_iter().next()
    }

    /// Select `package`, or clear the selection with `None`.
    pub async fn select_app(&self, package: Option<&str>) -> Result<()> {
        if let Some(package) = package {
            if !self.eligible_apps().iter().any(|p| p == package) {
                return Err(PeerError::NotEligible {
                    package: package.to_string(),
                    role: ROLE_SEND_DATA.to_string(),
                });
            }
        }
        debug!(package = package.unwrap_or("<none>"), "mediator app selected");
        self.store.save(package.map(str::to_string)).await;
        Ok(())
    }
}
