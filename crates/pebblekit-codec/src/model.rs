//! Value objects shared by the provider and the client-side surface.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a connected watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchIdentifier(String);

impl WatchIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatchIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WatchIdentifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WatchIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A watch currently connected to the mediator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectedWatch {
    pub id: WatchIdentifier,
    pub name: String,
    /// Hardware platform codename, e.g. `basalt`.
    pub platform: String,
    /// Hardware revision string.
    pub revision: String,
    pub firmware_major: u32,
    pub firmware_minor: u32,
    pub firmware_patch: u32,
    /// Free-form firmware suffix, e.g. `beta3`.
    pub firmware_tag: Option<String>,
}

impl ConnectedWatch {
    pub fn firmware_version(&self) -> String {
        let base = format!(
            "{}.{}.{}",
            self.firmware_major, self.firmware_minor, self.firmware_patch
        );
        match self.firmware_tag.as_deref() {
            Some(tag) if !tag.is_empty() => format!("{base}-{tag}"),
            _ => base,
        }
    }
}

/// Kind of a watchapp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchappType {
    Watchface,
    Watchapp,
    Unknown,
}

impl WatchappType {
    /// Integer code used in provider tables.
    pub const fn code(self) -> i64 {
        match self {
            WatchappType::Watchface => 0,
            WatchappType::Watchapp => 1,
            WatchappType::Unknown => 2,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => WatchappType::Watchface,
            1 => WatchappType::Watchapp,
            _ => WatchappType::Unknown,
        }
    }
}

/// The app currently running on a watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Watchapp {
    pub id: Uuid,
    pub name: Option<String>,
    pub app_type: WatchappType,
}
