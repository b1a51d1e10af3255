use plotty_core::PlotError;

/// Errors surfaced by [`LiveClient`](crate::LiveClient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiveError {
    /// Could not connect, not connected, or the transport failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A subscription could not be sent.
    #[error("Subscription error: {0}")]
    Subscription(String),
}

impl From<LiveError> for PlotError {
    fn from(err: LiveError) -> Self {
        PlotError::connection(err.to_string())
    }
}
