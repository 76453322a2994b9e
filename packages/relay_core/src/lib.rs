//! Relay core - channel registry and message fan-out broker
//!
//! This crate is the broker that sits between a single native-peer channel
//! and a dynamic set of client channels: every message received from the
//! native side is fanned out to all currently attached clients, and the
//! native channel itself is opened lazily on the first client attach and
//! torn down when the peer disconnects (which also disconnects every
//! client).
//!
//! It has no I/O of its own: the native side is opened through an injected
//! [`NativeConnector`] and both channel kinds are reached through the
//! [`Port`] capability, so multiple independent relays can run in tests.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use relay_core::{
//!     NativeConnector, NativeOpenError, Payload, Port, RelayHandle, RelayRouter, SendError,
//! };
//! use uuid::Uuid;
//!
//! struct NullPort;
//!
//! impl Port for NullPort {
//!     fn send(&self, _payload: Payload) -> Result<(), SendError> {
//!         Ok(())
//!     }
//!     fn close(&self) {}
//! }
//!
//! struct NullConnector;
//!
//! impl NativeConnector for NullConnector {
//!     async fn connect(
//!         &mut self,
//!         _events: RelayHandle,
//!         _generation: Uuid,
//!     ) -> Result<Arc<dyn Port>, NativeOpenError> {
//!         Ok(Arc::new(NullPort))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let relay = RelayRouter::spawn(NullConnector);
//!
//!     // The first attach opens the native channel
//!     let id = relay.attach_client(Arc::new(NullPort)).await.unwrap();
//!
//!     // Messages from the native side fan out to every attached client
//!     relay.native_message(b"{\"hello\":1}".to_vec()).await;
//!
//!     relay.detach_client(id).await;
//! }
//! ```

mod error;
mod port;
mod registry;
mod router;

pub use error::{NativeOpenError, RelayError, SendError};
pub use port::{Payload, Port};
pub use registry::{ChannelRegistry, ClientId, NativeChannel};
pub use router::{NativeConnector, RelayHandle, RelayRouter, RelayStatus};
