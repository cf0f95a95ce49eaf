use std::time::Duration;

/// Errors that can occur driving the state provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The resource path names no known table.
    #[error("unknown resource path '{0}'")]
    UnknownResource(String),

    /// `initialize` was called a second time.
    #[error("provider already initialized")]
    AlreadyInitialized,

    /// `initialize` was called outside a tokio runtime.
    #[error("provider must be initialized from within a tokio runtime")]
    NoRuntime,

    /// The provider did not initialize within the allotted time.
    #[error("provider not initialized after {0:?}")]
    InitTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, ProviderError>;
