//! End-to-end exercise of the relay against a real helper process.
//!
//! `cat` makes a convenient helper: every frame written to its stdin comes
//! straight back on its stdout, so an upstream client message should echo
//! back as a fan-out delivery.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use native_bridge::ProcessConnector;
use relay_core::{Payload, Port, RelayRouter, SendError};

#[derive(Default)]
struct InspectPort {
    deliveries: Mutex<Vec<Payload>>,
    closed: AtomicBool,
}

impl Port for InspectPort {
    fn send(&self, payload: Payload) -> Result<(), SendError> {
        self.deliveries.lock().unwrap().push(payload);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

async fn wait_until<F, Fut>(mut condition: F, what: &str)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn upstream_frames_echo_back_through_the_helper() {
    let relay = RelayRouter::spawn(ProcessConnector::new("cat", vec![]));

    let client = Arc::new(InspectPort::default());
    relay.attach_client(client.clone()).await.unwrap();
    assert!(relay.status().await.unwrap().native_open);

    relay.client_message(br#"{"ping":1}"#.to_vec()).await;

    wait_until(
        || {
            let client = client.clone();
            async move { !client.deliveries.lock().unwrap().is_empty() }
        },
        "echoed frame",
    )
    .await;

    assert_eq!(
        client.deliveries.lock().unwrap()[0],
        br#"{"ping":1}"#.to_vec()
    );

    relay.shutdown().await;
}

#[tokio::test]
async fn helper_exit_cascades_to_every_client() {
    // `true` exits immediately, so the native channel opens and then
    // disconnects on its own; the cascade must empty the client set.
    let relay = RelayRouter::spawn(ProcessConnector::new("true", vec![]));

    let client = Arc::new(InspectPort::default());
    relay.attach_client(client.clone()).await.unwrap();

    wait_until(
        || {
            let relay = relay.clone();
            async move {
                match relay.status().await {
                    Ok(status) => !status.native_open && status.client_count == 0,
                    Err(_) => true,
                }
            }
        },
        "disconnect cascade",
    )
    .await;

    assert!(client.closed.load(Ordering::SeqCst));
}
