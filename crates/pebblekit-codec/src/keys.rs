//! Envelope field names and action tags.
//!
//! Every request is a [`Bundle`] carrying an action tag under [`KEY_ACTION`]
//! plus action-specific fields.

use std::fmt;

use pebblekit_transport::Bundle;

pub const KEY_ACTION: &str = "ACTION";
pub const KEY_WATCHAPP_UUID: &str = "WATCHAPP_UUID";
pub const KEY_WATCHES_ID: &str = "WATCHES_ID";
pub const KEY_WATCH_ID: &str = "WATCH_ID";
pub const KEY_DATA_DICTIONARY: &str = "DATA_DICTIONARY";
pub const KEY_TRANSMISSION_RESULTS: &str = "TRANSMISSION_RESULTS";
pub const KEY_RECEIVE_RESULT: &str = "RECEIVE_RESULT";

/// Result record: variant tag.
pub const KEY_RESULT_TYPE: &str = "TYPE";
/// Result record: optional message carried by `Unknown`.
pub const KEY_RESULT_MESSAGE: &str = "MESSAGE";

/// Logical operation carried by a request envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Client -> server: deliver a dictionary to a watchapp.
    SendDataToWatch,
    /// Client -> server: launch a watchapp.
    StartApp,
    /// Client -> server: close a watchapp.
    StopApp,
    /// Server -> client: a watchapp sent a dictionary.
    ReceiveDataFromWatch,
    /// Server -> client: a watchapp was opened.
    AppOpened,
    /// Server -> client: a watchapp was closed.
    AppClosed,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::SendDataToWatch,
        Action::StartApp,
        Action::StopApp,
        Action::ReceiveDataFromWatch,
        Action::AppOpened,
        Action::AppClosed,
    ];

    /// Wire tag of this action.
    pub const fn tag(self) -> &'static str {
        match self {
            Action::SendDataToWatch => "SEND_DATA_TO_WATCH",
            Action::StartApp => "START_APP",
            Action::StopApp => "STOP_APP",
            Action::ReceiveDataFromWatch => "RECEIVE_DATA_FROM_WATCH",
            Action::AppOpened => "APP_OPENED",
            Action::AppClosed => "APP_CLOSED",
        }
    }

    /// Parse a wire tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.tag() == tag)
    }

    /// True for actions served by the mediator.
    pub fn is_server_bound(self) -> bool {
        matches!(
            self,
            Action::SendDataToWatch | Action::StartApp | Action::StopApp
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Raw action tag of an envelope, if any.
pub fn action_tag(bundle: &Bundle) -> Option<&str> {
    bundle.get_string(KEY_ACTION)
}
