use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::info;

use native_bridge::{BridgeState, ProcessConnector, create_routes};
use relay_core::RelayRouter;

#[derive(Parser)]
#[command(name = "bridge")]
#[command(about = "WebSocket bridge in front of a native messaging helper process")]
struct Args {
    /// Native helper executable, spawned lazily on the first client attach
    command: String,

    /// Arguments for the helper
    args: Vec<String>,

    /// Port for the HTTP server (0 for automatic)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(short = 'b', long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let filter = if args.debug {
        "native_bridge=debug,relay_core=debug,tower_http=debug"
    } else {
        "native_bridge=info,relay_core=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting bridge for helper: {} {:?}", args.command, args.args);

    // The helper is not spawned here: the relay opens the native channel
    // lazily when the first client attaches.
    let connector = ProcessConnector::new(args.command, args.args);
    let relay = RelayRouter::spawn(connector);

    let state = BridgeState {
        relay: relay.clone(),
    };
    let app = create_routes(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", args.host, args.port).parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Get the actual bound address (important when port was 0)
    let actual_addr = listener.local_addr()?;

    // Machine-readable line first, for whoever launched us
    println!("BRIDGE_ADDR={}", actual_addr);

    info!("HTTP server listening on http://{}", actual_addr);
    info!("Endpoints:");
    info!("  GET /ws      - WebSocket client attach point");
    info!("  GET /state   - Relay status");
    info!("  GET /health  - Liveness check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received ctrl-c, shutting down");
            relay.shutdown().await;
        }
    }

    Ok(())
}
