use thiserror::Error;

/// Fire-and-forget delivery to a port failed.
///
/// Delivery is never confirmed end-to-end; these only report that the
/// payload could not even be queued for the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The channel's far side is gone.
    #[error("channel closed")]
    Closed,
    /// The channel's outbound queue is full.
    #[error("channel full")]
    Full,
}

/// The attempt to establish the native channel failed.
///
/// Never retried automatically; the next client attach while the native
/// slot is empty triggers the next attempt.
#[derive(Debug, Error)]
#[error("failed to open native channel: {reason}")]
pub struct NativeOpenError {
    pub reason: String,
}

impl NativeOpenError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced to callers of a [`RelayHandle`](crate::RelayHandle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The router task has stopped.
    #[error("relay router is gone")]
    RouterGone,
}
