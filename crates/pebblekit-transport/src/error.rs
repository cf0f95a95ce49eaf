/// Errors that can occur crossing the process boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The process on the other side of the binding is gone.
    #[error("remote object is dead")]
    DeadObject,

    /// No process exposes the requested role.
    #[error("no service for role {role} in package {package}")]
    ServiceNotFound { role: String, package: String },

    /// The payload could not be serialized or deserialized.
    #[error("payload error: {0}")]
    Payload(#[source] serde_json::Error),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// True when the failure means "the peer process is not running".
    pub fn is_dead_object(&self) -> bool {
        matches!(self, Self::DeadObject)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
