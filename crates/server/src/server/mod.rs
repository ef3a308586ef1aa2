//! Synchronization server: registry, hit aggregation, transport and the tick loop.

use crate::config::Config;
use tokio::sync::watch;
use tracing::info;

pub mod combat;
pub mod player;
pub mod registry;
pub mod slots;
pub mod tick;
pub mod transport;

pub use combat::CombatAggregator;
pub use player::PlayerRecord;
pub use registry::ConnectionRegistry;
pub use slots::SlotAllocator;
pub use tick::{PingTimer, TickLoop, TickPhase, TickStats};
pub use transport::{ConnectionId, TcpTransport, Transport, TransportEvent};

/// Bind the listener and run the tick loop until `shutdown` turns true.
pub async fn run(config: Config, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let transport = TcpTransport::bind(&config.server.bind_addr()).await?;
    info!("Listening on tcp://{}", transport.local_addr());

    let mut tick_loop = TickLoop::new(transport, &config.server);
    tick_loop.run(shutdown).await?;
    Ok(())
}
