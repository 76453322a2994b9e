//! The native peer channel: a helper process spoken to over stdio frames.

use std::process::Stdio;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use relay_core::{NativeConnector, NativeOpenError, Payload, Port, RelayHandle, SendError};

use crate::framing::{read_frame, write_frame};

/// Outbound frames queued for the helper's stdin.
const OUTBOUND_CAPACITY: usize = 32;

enum StdioFrame {
    Payload(Payload),
    Shutdown,
}

/// Upstream half of the native channel. Frames queued here are written to
/// the helper's stdin by the writer task; `close` drops stdin so the helper
/// sees a clean EOF.
struct StdioPort {
    tx: mpsc::Sender<StdioFrame>,
}

impl Port for StdioPort {
    fn send(&self, payload: Payload) -> Result<(), SendError> {
        self.tx
            .try_send(StdioFrame::Payload(payload))
            .map_err(|e| match e {
                TrySendError::Full(_) => SendError::Full,
                TrySendError::Closed(_) => SendError::Closed,
            })
    }

    fn close(&self) {
        let _ = self.tx.try_send(StdioFrame::Shutdown);
    }
}

/// Opens the native channel by spawning the configured helper executable
/// with piped stdio.
pub struct ProcessConnector {
    command: String,
    args: Vec<String>,
}

impl ProcessConnector {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl NativeConnector for ProcessConnector {
    async fn connect(
        &mut self,
        events: RelayHandle,
        generation: Uuid,
    ) -> Result<Arc<dyn Port>, NativeOpenError> {
        info!("Spawning native helper: {} {:?}", self.command, self.args);

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| {
                NativeOpenError::new(format!("failed to spawn {}: {}", self.command, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| NativeOpenError::new("helper stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| NativeOpenError::new("helper stdout was not captured"))?;

        // Reader: every stdout frame becomes a native message; EOF or a
        // framing error ends the channel with one disconnect event.
        let reader_events = events.clone();
        tokio::spawn(async move {
            let mut stdout = BufReader::new(stdout);
            let cause = loop {
                match read_frame(&mut stdout).await {
                    Ok(Some(payload)) => reader_events.native_message(payload).await,
                    Ok(None) => break None,
                    Err(e) => break Some(e.to_string()),
                }
            };

            // Reap the helper so it never lingers
            match child.wait().await {
                Ok(status) => info!("Native helper exited with {}", status),
                Err(e) => warn!("Failed to wait on native helper: {}", e),
            }

            reader_events.native_disconnected(generation, cause).await;
        });

        // Writer: drain the upstream queue into the helper's stdin
        let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(frame) = rx.recv().await {
                match frame {
                    StdioFrame::Payload(payload) => {
                        if let Err(e) = write_frame(&mut stdin, &payload).await {
                            warn!("Write to native helper failed: {}", e);
                            break;
                        }
                    }
                    StdioFrame::Shutdown => break,
                }
            }
            debug!("Native writer task exiting");
        });

        Ok(Arc::new(StdioPort { tx }))
    }
}
