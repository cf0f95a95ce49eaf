use std::fmt;
use std::io;

use pebblekit_codec::CodecError;
use pebblekit_peer::PeerError;
use pebblekit_provider::ProviderError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unreachable(what: &str) -> Self {
        Self::new(TRANSPORT_ERROR, format!("{what} is not reachable"))
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(INTERNAL, format!("{context}: {err}"))
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    match err {
        CodecError::TooLarge { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        CodecError::InvalidKey(_) | CodecError::MalformedField { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn provider_error(context: &str, err: ProviderError) -> CliError {
    match err {
        ProviderError::UnknownResource(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Codec(err) => codec_error(context, err),
        PeerError::Provider(err) => provider_error(context, err),
        PeerError::Transport(err) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        PeerError::NotEligible { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}
