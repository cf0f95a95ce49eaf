use std::time::Duration;

/// Default wait for a binding to connect.
pub const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_secs(10);
/// Default wait for a reply once connected.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Controls connection and request behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerConfig {
    /// Upper bound on waiting for a binding to reach `Connected`.
    pub bind_timeout: Duration,
    /// Upper bound on waiting for a reply. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind_timeout: DEFAULT_BIND_TIMEOUT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// How to choose among several eligible packages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// First package in the directory's enumeration order.
    #[default]
    FirstEnumerated,
    /// Lexicographically smallest package name.
    Lexicographic,
}

/// Controls mediator app selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerConfig {
    pub tie_break: TieBreak,
    /// Pick an eligible app automatically when nothing valid is selected.
    pub auto_select: bool,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::FirstEnumerated,
            auto_select: true,
        }
    }
}
