use crate::error::SendError;

/// An opaque message. The relay forwards payloads verbatim and never looks
/// inside.
pub type Payload = Vec<u8>;

/// One end of a duplex message channel.
///
/// Implemented once for the native channel and once for client channels.
/// The inbound halves (message and disconnect notifications) are wired as
/// events into the router by whoever constructs the concrete channel.
pub trait Port: Send + Sync {
    /// Queue a payload for the channel. Must not block or await; delivery
    /// is fire-and-forget and never confirmed.
    fn send(&self, payload: Payload) -> Result<(), SendError>;

    /// Ask the channel to wind down. Idempotent. The channel's own
    /// disconnect notification still fires through the normal event path.
    fn close(&self);
}
