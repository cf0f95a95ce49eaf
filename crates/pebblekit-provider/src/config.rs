/// Controls provider behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Change notifications buffered per subscriber before it lags.
    pub notification_capacity: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            notification_capacity: 64,
        }
    }
}
