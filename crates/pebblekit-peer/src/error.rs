use std::fmt;

/// Errors that can occur in peer operations.
///
/// Public protocol calls report an unreachable peer as `None`; these errors
/// cover handler failures and misuse of the API.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] pebblekit_transport::TransportError),

    /// Malformed request or reply.
    #[error("codec error: {0}")]
    Codec(#[from] pebblekit_codec::CodecError),

    /// State provider error.
    #[error("provider error: {0}")]
    Provider(#[from] pebblekit_provider::ProviderError),

    /// The package does not declare the required role.
    #[error("package '{package}' does not serve {role}")]
    NotEligible { package: String, role: String },

    /// A request handler failed.
    #[error("handler failed: {0}")]
    Handler(String),
}

impl PeerError {
    /// Wrap an application error raised inside a handler.
    pub fn handler(err: impl fmt::Display) -> Self {
        PeerError::Handler(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
