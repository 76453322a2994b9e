use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::port::Port;

/// Unique identifier for an attached client channel.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// The single connection to the native peer.
///
/// At most one exists at any time. The generation distinguishes reopen
/// cycles so that a late disconnect event from a previous connection cannot
/// tear down its successor.
pub struct NativeChannel {
    pub generation: Uuid,
    pub port: Arc<dyn Port>,
}

/// Bookkeeping over the relay state: the set of attached clients and the
/// (at most one) native channel slot.
///
/// Owned exclusively by the router actor, so no locking — every mutation
/// happens from one task. No operation here has side effects beyond the
/// mutation itself.
pub struct ChannelRegistry {
    clients: HashMap<ClientId, Arc<dyn Port>>,
    native: Option<NativeChannel>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            native: None,
        }
    }

    /// Insert a client. A duplicate insert of the same id is a no-op (the
    /// original registration wins), tolerating double-delivery of an accept
    /// event.
    pub fn add(&mut self, id: ClientId, port: Arc<dyn Port>) -> bool {
        match self.clients.entry(id) {
            Entry::Occupied(_) => {
                debug!("Ignoring duplicate registration of {}", id);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(port);
                true
            }
        }
    }

    /// Remove a client if present. Safe to call for an id that was never
    /// added or was already removed.
    pub fn remove(&mut self, id: ClientId) -> Option<Arc<dyn Port>> {
        self.clients.remove(&id)
    }

    /// Drain every client in one step. Used by the native-disconnect
    /// cascade, which still has to signal each drained client.
    pub fn clear(&mut self) -> Vec<(ClientId, Arc<dyn Port>)> {
        self.clients.drain().collect()
    }

    /// Point-in-time copy of the client set for fan-out iteration.
    /// Membership changes after the snapshot do not affect it.
    pub fn snapshot(&self) -> Vec<(ClientId, Arc<dyn Port>)> {
        self.clients
            .iter()
            .map(|(id, port)| (*id, port.clone()))
            .collect()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn set_native(&mut self, channel: NativeChannel) {
        self.native = Some(channel);
    }

    pub fn take_native(&mut self) -> Option<NativeChannel> {
        self.native.take()
    }

    pub fn native(&self) -> Option<&NativeChannel> {
        self.native.as_ref()
    }
}
