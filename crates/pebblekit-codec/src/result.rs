//! Outcome taxonomies.
//!
//! [`TransmissionResult`] is reported per watch for phone-to-watch requests;
//! [`ReceiveResult`] is the app's verdict on an incoming watch message. Both
//! travel as a nested bundle with a `TYPE` tag and, for `Unknown`, an optional
//! `MESSAGE`.

use std::fmt;

use pebblekit_transport::Bundle;
use tracing::warn;

use crate::keys::{KEY_RESULT_MESSAGE, KEY_RESULT_TYPE};

/// Per-watch outcome of a phone-to-watch request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransmissionResult {
    Success,
    FailedWatchNotConnected,
    FailedWatchNacked,
    FailedTimeout,
    FailedDifferentAppOpen,
    FailedNoPermissions,
    /// Anything else, with a diagnostic message when one is known.
    Unknown(Option<String>),
}

impl TransmissionResult {
    pub fn unknown(message: impl Into<String>) -> Self {
        TransmissionResult::Unknown(Some(message.into()))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            TransmissionResult::Success => "SUCCESS",
            TransmissionResult::FailedWatchNotConnected => "FAILED_WATCH_NOT_CONNECTED",
            TransmissionResult::FailedWatchNacked => "FAILED_WATCH_NACKED",
            TransmissionResult::FailedTimeout => "FAILED_TIMEOUT",
            TransmissionResult::FailedDifferentAppOpen => "FAILED_DIFFERENT_APP_OPEN",
            TransmissionResult::FailedNoPermissions => "FAILED_NO_PERMISSIONS",
            TransmissionResult::Unknown(_) => "UNKNOWN",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransmissionResult::Success)
    }

    pub fn to_bundle(&self) -> Bundle {
        let mut bundle = Bundle::new();
        bundle.put_string(KEY_RESULT_TYPE, self.tag());
        if let TransmissionResult::Unknown(Some(message)) = self {
            bundle.put_string(KEY_RESULT_MESSAGE, message.clone());
        }
        bundle
    }

    /// Decode a result record. Unrecognized or missing tags map to `Unknown`.
    pub fn from_bundle(bundle: &Bundle) -> Self {
        match bundle.get_string(KEY_RESULT_TYPE) {
            Some("SUCCESS") => TransmissionResult::Success,
            Some("FAILED_WATCH_NOT_CONNECTED") => TransmissionResult::FailedWatchNotConnected,
            Some("FAILED_WATCH_NACKED") => TransmissionResult::FailedWatchNacked,
            Some("FAILED_TIMEOUT") => TransmissionResult::FailedTimeout,
            Some("FAILED_DIFFERENT_APP_OPEN") => TransmissionResult::FailedDifferentAppOpen,
            Some("FAILED_NO_PERMISSIONS") => TransmissionResult::FailedNoPermissions,
            Some("UNKNOWN") => TransmissionResult::Unknown(
                bundle.get_string(KEY_RESULT_MESSAGE).map(str::to_string),
            ),
            Some(other) => {
                warn!(tag = other, "unrecognized transmission result");
                TransmissionResult::Unknown(Some(other.to_string()))
            }
            None => {
                warn!("transmission result without a type tag");
                TransmissionResult::Unknown(None)
            }
        }
    }
}

impl fmt::Display for TransmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransmissionResult::Unknown(Some(message)) => write!(f, "UNKNOWN ({message})"),
            other => f.write_str(other.tag()),
        }
    }
}

/// App verdict on an incoming watch message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReceiveResult {
    Ack,
    Nack,
    Unknown(Option<String>),
}

impl ReceiveResult {
    pub fn tag(&self) -> &'static str {
        match self {
            ReceiveResult::Ack => "ACK",
            ReceiveResult::Nack => "NACK",
            ReceiveResult::Unknown(_) => "UNKNOWN",
        }
    }

    pub fn to_bundle(&self) -> Bundle {
        let mut bundle = Bundle::new();
        bundle.put_string(KEY_RESULT_TYPE, self.tag());
        if let ReceiveResult::Unknown(Some(message)) = self {
            bundle.put_string(KEY_RESULT_MESSAGE, message.clone());
        }
        bundle
    }

    pub fn from_bundle(bundle: &Bundle) -> Self {
        match bundle.get_string(KEY_RESULT_TYPE) {
            Some("ACK") => ReceiveResult::Ack,
            Some("NACK") => ReceiveResult::Nack,
            Some("UNKNOWN") => {
                ReceiveResult::Unknown(bundle.get_string(KEY_RESULT_MESSAGE).map(str::to_string))
            }
            Some(other) => {
                warn!(tag = other, "unrecognized receive result");
                ReceiveResult::Unknown(Some(other.to_string()))
            }
            None => ReceiveResult::Unknown(None),
        }
    }
}

impl fmt::Display for ReceiveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiveResult::Unknown(Some(message)) => write!(f, "UNKNOWN ({message})"),
            other => f.write_str(other.tag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transmission_results_survive_the_wire() {
        let all = [
            TransmissionResult::Success,
            TransmissionResult::FailedWatchNotConnected,
            TransmissionResult::FailedWatchNacked,
            TransmissionResult::FailedTimeout,
            TransmissionResult::FailedDifferentAppOpen,
            TransmissionResult::FailedNoPermissions,
            TransmissionResult::Unknown(None),
            TransmissionResult::unknown("firmware too old"),
        ];
        for result in all {
            assert_eq!(TransmissionResult::from_bundle(&result.to_bundle()), result);
        }
    }

    #[test]
    fn unrecognized_tag_keeps_tag_as_message() {
        let bundle = Bundle::new().with_string(KEY_RESULT_TYPE, "FAILED_BATTERY_LOW");
        assert_eq!(
            TransmissionResult::from_bundle(&bundle),
            TransmissionResult::unknown("FAILED_BATTERY_LOW")
        );
        assert_eq!(
            TransmissionResult::from_bundle(&Bundle::new()),
            TransmissionResult::Unknown(None)
        );
    }

    #[test]
    fn success_carries_no_message() {
        let bundle = TransmissionResult::Success.to_bundle();
        assert_eq!(bundle.get_string(KEY_RESULT_TYPE), Some("SUCCESS"));
        assert!(!bundle.contains_key(KEY_RESULT_MESSAGE));
    }

    #[test]
    fn receive_results_survive_the_wire() {
        for result in [
            ReceiveResult::Ack,
            ReceiveResult::Nack,
            ReceiveResult::Unknown(None),
            ReceiveResult::Unknown(Some("busy".into())),
        ] {
            assert_eq!(ReceiveResult::from_bundle(&result.to_bundle()), result);
        }
    }

    #[test]
    fn display_includes_unknown_message() {
        assert_eq!(TransmissionResult::Success.to_string(), "SUCCESS");
        assert_eq!(
            TransmissionResult::unknown("x").to_string(),
            "UNKNOWN (x)"
        );
        assert_eq!(ReceiveResult::Nack.to_string(), "NACK");
    }
}
