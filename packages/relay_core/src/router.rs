use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{NativeOpenError, RelayError};
use crate::port::{Payload, Port};
use crate::registry::{ChannelRegistry, ClientId, NativeChannel};

/// Opens the connection to the native peer.
///
/// On success the connector has already wired the channel's inbound
/// listeners: every received message arrives at the router as a native
/// message, and the channel's one-shot disconnect arrives tagged with
/// `generation`. The returned port is the upstream (send) half.
pub trait NativeConnector: Send {
    fn connect(
        &mut self,
        events: RelayHandle,
        generation: Uuid,
    ) -> impl Future<Output = Result<Arc<dyn Port>, NativeOpenError>> + Send;
}

/// Commands and channel events handled by the router actor.
enum RelayCommand {
    ClientAttached {
        port: Arc<dyn Port>,
        respond_to: oneshot::Sender<ClientId>,
    },
    ClientDetached {
        id: ClientId,
    },
    ClientMessage {
        payload: Payload,
    },
    NativeMessage {
        payload: Payload,
    },
    NativeDisconnected {
        generation: Uuid,
        cause: Option<String>,
    },
    GetStatus {
        respond_to: oneshot::Sender<RelayStatus>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

/// Snapshot of the relay's externally observable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayStatus {
    pub native_open: bool,
    pub client_count: usize,
}

/// Handle to communicate with a relay router actor.
#[derive(Clone)]
pub struct RelayHandle {
    sender: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Register a newly accepted client channel. Returns the id the caller
    /// must pass back when the client's disconnect signal fires.
    pub async fn attach_client(&self, port: Arc<dyn Port>) -> Result<ClientId, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayCommand::ClientAttached {
                port,
                respond_to: tx,
            })
            .await
            .map_err(|_| RelayError::RouterGone)?;
        rx.await.map_err(|_| RelayError::RouterGone)
    }

    /// A client's disconnect signal fired. Safe to deliver more than once.
    pub async fn detach_client(&self, id: ClientId) {
        let _ = self
            .sender
            .send(RelayCommand::ClientDetached { id })
            .await;
    }

    /// Forward a client's upstream payload toward the native peer.
    pub async fn client_message(&self, payload: Payload) {
        let _ = self
            .sender
            .send(RelayCommand::ClientMessage { payload })
            .await;
    }

    /// A payload arrived from the native peer; fan it out.
    pub async fn native_message(&self, payload: Payload) {
        let _ = self
            .sender
            .send(RelayCommand::NativeMessage { payload })
            .await;
    }

    /// The native channel's one-shot disconnect fired, cleanly (`None`) or
    /// with a cause. Stale generations are ignored by the router.
    pub async fn native_disconnected(&self, generation: Uuid, cause: Option<String>) {
        let _ = self
            .sender
            .send(RelayCommand::NativeDisconnected { generation, cause })
            .await;
    }

    pub async fn status(&self) -> Result<RelayStatus, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RelayCommand::GetStatus { respond_to: tx })
            .await
            .map_err(|_| RelayError::RouterGone)?;
        rx.await.map_err(|_| RelayError::RouterGone)
    }

    /// Close every channel and stop the router. Resolves once the cascade
    /// has run.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(RelayCommand::Shutdown { respond_to: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

/// The relay's control logic: a state machine over the native-channel slot
/// (`absent` / `open`), driven by attach, detach, message, and disconnect
/// events.
///
/// Runs as a single actor task that exclusively owns the registry, so event
/// handling never overlaps and no locks are needed. The native channel is
/// opened lazily by the first attach that finds the slot empty, and the
/// only path back to `absent` is the peer's own disconnect.
pub struct RelayRouter<C: NativeConnector> {
    registry: ChannelRegistry,
    connector: C,
    next_client_id: u64,
    handle: RelayHandle,
    receiver: mpsc::Receiver<RelayCommand>,
}

impl<C: NativeConnector + 'static> RelayRouter<C> {
    /// Spawn the router actor and return a handle to it.
    pub fn spawn(connector: C) -> RelayHandle {
        let (sender, receiver) = mpsc::channel(64);
        let handle = RelayHandle { sender };
        let mut router = Self {
            registry: ChannelRegistry::new(),
            connector,
            next_client_id: 1,
            handle: handle.clone(),
            receiver,
        };

        tokio::spawn(async move {
            router.run().await;
        });

        handle
    }

    async fn run(&mut self) {
        debug!("Relay router started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                RelayCommand::ClientAttached { port, respond_to } => {
                    let id = self.handle_attach(port).await;
                    let _ = respond_to.send(id);
                }
                RelayCommand::ClientDetached { id } => {
                    self.handle_detach(id);
                }
                RelayCommand::ClientMessage { payload } => {
                    self.handle_client_message(payload);
                }
                RelayCommand::NativeMessage { payload } => {
                    self.handle_native_message(payload);
                }
                RelayCommand::NativeDisconnected { generation, cause } => {
                    self.handle_native_disconnected(generation, cause);
                }
                RelayCommand::GetStatus { respond_to } => {
                    let _ = respond_to.send(RelayStatus {
                        native_open: self.registry.native().is_some(),
                        client_count: self.registry.client_count(),
                    });
                }
                RelayCommand::Shutdown { respond_to } => {
                    self.handle_shutdown();
                    let _ = respond_to.send(());
                    break;
                }
            }
        }

        debug!("Relay router stopped");
    }

    async fn handle_attach(&mut self, port: Arc<dyn Port>) -> ClientId {
        let id = ClientId(self.next_client_id);
        self.next_client_id += 1;

        self.registry.add(id, port);
        debug!(
            "Attached {} ({} clients)",
            id,
            self.registry.client_count()
        );

        // Lazy open: exactly one attempt per transition into the
        // attached-with-no-native condition. A failed attempt is not
        // retried until the next attach finds the slot still empty.
        if self.registry.native().is_none() {
            self.open_native().await;
        }

        id
    }

    async fn open_native(&mut self) {
        let generation = Uuid::new_v4();
        info!("Opening native channel {}", generation);

        match self.connector.connect(self.handle.clone(), generation).await {
            Ok(port) => {
                self.registry.set_native(NativeChannel { generation, port });
            }
            Err(e) => {
                warn!("{}", e);
            }
        }
    }

    fn handle_detach(&mut self, id: ClientId) {
        if self.registry.remove(id).is_some() {
            debug!(
                "Detached {} ({} clients)",
                id,
                self.registry.client_count()
            );
        }
    }

    fn handle_client_message(&mut self, payload: Payload) {
        match self.registry.native() {
            Some(native) => {
                if let Err(e) = native.port.send(payload) {
                    debug!("Upstream send to native channel failed: {}", e);
                }
            }
            None => {
                debug!("Dropping upstream message: no native channel");
            }
        }
    }

    /// Fan a native payload out to every client in a snapshot of the set.
    /// One client's failure never blocks the rest; a failed client is
    /// treated as an imminent detach and swept afterwards.
    fn handle_native_message(&mut self, payload: Payload) {
        let snapshot = self.registry.snapshot();
        let mut failed = Vec::new();

        for (id, port) in &snapshot {
            if let Err(e) = port.send(payload.clone()) {
                debug!("Delivery to {} failed: {}", id, e);
                failed.push(*id);
            }
        }

        for id in failed {
            self.registry.remove(id);
        }
    }

    fn handle_native_disconnected(&mut self, generation: Uuid, cause: Option<String>) {
        let current = match self.registry.native() {
            Some(native) => native.generation,
            None => {
                debug!("Ignoring native disconnect with no channel open");
                return;
            }
        };
        if current != generation {
            debug!("Ignoring stale disconnect for generation {}", generation);
            return;
        }

        match &cause {
            Some(cause) => warn!("Native channel disconnected: {}", cause),
            None => info!("Native channel closed"),
        }

        // Cascade: signal every client, then empty the set and the slot.
        for (id, port) in self.registry.clear() {
            debug!("Closing {} after native disconnect", id);
            port.close();
        }
        self.registry.take_native();
    }

    fn handle_shutdown(&mut self) {
        info!("Relay shutting down");
        if let Some(native) = self.registry.take_native() {
            native.port.close();
        }
        for (_, port) in self.registry.clear() {
            port.close();
        }
    }
}
