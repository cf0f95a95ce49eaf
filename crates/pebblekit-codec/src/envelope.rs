//! Typed request and reply envelopes.
//!
//! Each envelope knows how to flatten itself into a [`Bundle`] and how to
//! rebuild itself from one, naming the offending field when it cannot.

use std::collections::BTreeMap;

use pebblekit_transport::{Bundle, BundleValue};
use uuid::Uuid;

use crate::dictionary::{decode_dictionary, encode_dictionary, Dictionary};
use crate::error::{CodecError, Result};
use crate::keys::{
    Action, KEY_ACTION, KEY_DATA_DICTIONARY, KEY_RECEIVE_RESULT, KEY_TRANSMISSION_RESULTS,
    KEY_WATCHAPP_UUID, KEY_WATCHES_ID, KEY_WATCH_ID,
};
use crate::model::WatchIdentifier;
use crate::result::{ReceiveResult, TransmissionResult};

/// Message used when a reply names a watch without a result record.
pub const MISSING_TRANSMISSION_RESULT: &str =
    "Missing TransmissionResult in PebbleSender result bundle";

/// Per-watch outcomes of a phone-to-watch request.
pub type TransmissionResults = BTreeMap<WatchIdentifier, TransmissionResult>;

fn read_uuid(bundle: &Bundle) -> Result<Uuid> {
    let raw = bundle
        .get_string(KEY_WATCHAPP_UUID)
        .ok_or(CodecError::MissingField(KEY_WATCHAPP_UUID))?;
    Uuid::parse_str(raw).map_err(|err| CodecError::MalformedField {
        field: KEY_WATCHAPP_UUID,
        reason: err.to_string(),
    })
}

fn read_watch(bundle: &Bundle) -> Result<WatchIdentifier> {
    bundle
        .get_string(KEY_WATCH_ID)
        .map(WatchIdentifier::from)
        .ok_or(CodecError::MissingField(KEY_WATCH_ID))
}

fn read_watches(bundle: &Bundle) -> Option<Vec<WatchIdentifier>> {
    bundle
        .get_string_array(KEY_WATCHES_ID)
        .map(|ids| ids.iter().map(|id| WatchIdentifier::from(id.as_str())).collect())
}

fn read_data(bundle: &Bundle) -> Dictionary {
    bundle
        .get_bundle(KEY_DATA_DICTIONARY)
        .map(decode_dictionary)
        .unwrap_or_default()
}

fn expect_action(bundle: &Bundle, allowed: &[Action]) -> Result<Action> {
    let tag = bundle
        .get_string(KEY_ACTION)
        .ok_or(CodecError::MissingField(KEY_ACTION))?;
    Action::from_tag(tag)
        .filter(|action| allowed.contains(action))
        .ok_or_else(|| CodecError::MalformedField {
            field: KEY_ACTION,
            reason: format!("unexpected action '{tag}'"),
        })
}

fn base_bundle(action: Action, watchapp: Uuid) -> Bundle {
    Bundle::new()
        .with_string(KEY_ACTION, action.tag())
        .with_string(KEY_WATCHAPP_UUID, watchapp.to_string())
}

/// `SEND_DATA_TO_WATCH`: deliver a dictionary to a watchapp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendDataRequest {
    pub watchapp: Uuid,
    pub data: Dictionary,
    /// Target watches; `None` means every connected watch.
    pub watches: Option<Vec<WatchIdentifier>>,
}

impl SendDataRequest {
    pub fn to_bundle(&self) -> Bundle {
        let mut bundle = base_bundle(Action::SendDataToWatch, self.watchapp)
            .with_bundle(KEY_DATA_DICTIONARY, encode_dictionary(&self.data));
        if let Some(watches) = &self.watches {
            bundle.put_string_array(
                KEY_WATCHES_ID,
                watches.iter().map(|w| w.as_str().to_string()).collect(),
            );
        }
        bundle
    }

    /// A missing data dictionary reads as empty.
    pub fn from_bundle(bundle: &Bundle) -> Result<Self> {
        Ok(Self {
            watchapp: read_uuid(bundle)?,
            data: read_data(bundle),
            watches: read_watches(bundle),
        })
    }
}

/// Start or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppControl {
    Start,
    Stop,
}

impl AppControl {
    pub fn action(self) -> Action {
        match self {
            AppControl::Start => Action::StartApp,
            AppControl::Stop => Action::StopApp,
        }
    }
}

/// `START_APP` / `STOP_APP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppControlRequest {
    pub control: AppControl,
    pub watchapp: Uuid,
    pub watches: Option<Vec<WatchIdentifier>>,
}

impl AppControlRequest {
    pub fn to_bundle(&self) -> Bundle {
        let mut bundle = base_bundle(self.control.action(), self.watchapp);
        if let Some(watches) = &self.watches {
            bundle.put_string_array(
                KEY_WATCHES_ID,
                watches.iter().map(|w| w.as_str().to_string()).collect(),
            );
        }
        bundle
    }

    pub fn from_bundle(bundle: &Bundle) -> Result<Self> {
        let control = match expect_action(bundle, &[Action::StartApp, Action::StopApp])? {
            Action::StartApp => AppControl::Start,
            _ => AppControl::Stop,
        };
        Ok(Self {
            control,
            watchapp: read_uuid(bundle)?,
            watches: read_watches(bundle),
        })
    }
}

/// `RECEIVE_DATA_FROM_WATCH`: a watchapp sent a dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveDataRequest {
    pub watchapp: Uuid,
    pub data: Dictionary,
    pub watch: WatchIdentifier,
}

impl ReceiveDataRequest {
    pub fn to_bundle(&self) -> Bundle {
        base_bundle(Action::ReceiveDataFromWatch, self.watchapp)
            .with_bundle(KEY_DATA_DICTIONARY, encode_dictionary(&self.data))
            .with_string(KEY_WATCH_ID, self.watch.as_str())
    }

    pub fn from_bundle(bundle: &Bundle) -> Result<Self> {
        Ok(Self {
            watchapp: read_uuid(bundle)?,
            data: read_data(bundle),
            watch: read_watch(bundle)?,
        })
    }
}

/// Opened or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Opened,
    Closed,
}

impl Lifecycle {
    pub fn action(self) -> Action {
        match self {
            Lifecycle::Opened => Action::AppOpened,
            Lifecycle::Closed => Action::AppClosed,
        }
    }
}

/// `APP_OPENED` / `APP_CLOSED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLifecycleEvent {
    pub lifecycle: Lifecycle,
    pub watchapp: Uuid,
    pub watch: WatchIdentifier,
}

impl AppLifecycleEvent {
    pub fn to_bundle(&self) -> Bundle {
        base_bundle(self.lifecycle.action(), self.watchapp)
            .with_string(KEY_WATCH_ID, self.watch.as_str())
    }

    pub fn from_bundle(bundle: &Bundle) -> Result<Self> {
        let lifecycle = match expect_action(bundle, &[Action::AppOpened, Action::AppClosed])? {
            Action::AppOpened => Lifecycle::Opened,
            _ => Lifecycle::Closed,
        };
        Ok(Self {
            lifecycle,
            watchapp: read_uuid(bundle)?,
            watch: read_watch(bundle)?,
        })
    }
}

/// Reply to a send/start/stop request.
pub fn encode_transmission_results(results: &TransmissionResults) -> Bundle {
    let nested = results
        .iter()
        .map(|(watch, result)| {
            (
                watch.as_str().to_string(),
                BundleValue::Bundle(result.to_bundle()),
            )
        })
        .collect();
    Bundle::new().with_bundle(KEY_TRANSMISSION_RESULTS, nested)
}

/// Decode a send/start/stop reply.
///
/// A reply without a results record decodes to an empty map.
pub fn decode_transmission_results(reply: &Bundle) -> TransmissionResults {
    let Some(nested) = reply.get_bundle(KEY_TRANSMISSION_RESULTS) else {
        return TransmissionResults::new();
    };
    nested
        .keys()
        .map(|watch| {
            let result = nested
                .get_bundle(watch)
                .map(TransmissionResult::from_bundle)
                .unwrap_or_else(|| TransmissionResult::unknown(MISSING_TRANSMISSION_RESULT));
            (WatchIdentifier::from(watch), result)
        })
        .collect()
}

/// Reply to a receive-data request.
pub fn encode_receive_reply(result: &ReceiveResult) -> Bundle {
    Bundle::new().with_bundle(KEY_RECEIVE_RESULT, result.to_bundle())
}

/// Decode a receive-data reply. A missing record reads as `Unknown(None)`.
pub fn decode_receive_reply(reply: &Bundle) -> ReceiveResult {
    reply
        .get_bundle(KEY_RECEIVE_RESULT)
        .map(ReceiveResult::from_bundle)
        .unwrap_or(ReceiveResult::Unknown(None))
}
