//! Duelbot - headless bots that join a duel server, wander and swing at each other.

use clap::Parser;
use client::{Connection, LocalPlayer, PortalSlot, RemoteWorld};
use glam::{Quat, Vec3};
use protocol::Transform;
use rand::Rng;
use rand::seq::IteratorRandom;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// Server address
    #[arg(default_value = "127.0.0.1:15466")]
    server: String,
    /// Number of bots to run
    #[arg(short, long, default_value_t = 2)]
    bots: usize,
    /// Milliseconds between updates sent by each bot
    #[arg(long, default_value_t = 50)]
    update_ms: u64,
    /// Chance per update of swinging at another player
    #[arg(long, default_value_t = 0.05)]
    strike_chance: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("Starting {} bots against {}", args.bots, args.server);

    let mut bots = JoinSet::new();
    for index in 0..args.bots {
        let args = args.clone();
        bots.spawn(async move {
            if let Err(e) = run_bot(index, &args).await {
                warn!("Bot {} stopped: {}", index, e);
            }
        });
    }

    tokio::select! {
        _ = async { while bots.join_next().await.is_some() {} } => info!("All bots finished"),
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }
    Ok(())
}

async fn run_bot(index: usize, args: &Args) -> anyhow::Result<()> {
    let mut connection = Connection::connect(args.server.as_str()).await?;
    let mut world = RemoteWorld::new();

    // The server echoes our own record first; that is how we learn our id.
    let first = connection.recv_snapshot().await?;
    world.apply(&first)?;
    let Some(id) = world.my_id() else {
        anyhow::bail!("server sent no record for us");
    };
    info!("Bot {} joined as player {}", index, id);

    let mut player = LocalPlayer::spawn(id);
    player.place_portal(
        PortalSlot::A,
        Transform::new(player.state().body.position + Vec3::X, Quat::IDENTITY),
    );

    let period = Duration::from_millis(args.update_ms.max(1));
    let mut next_update = Instant::now();
    loop {
        // Snapshots are handled as they arrive; the update cadence is kept by the timeout.
        match timeout_at(next_update, connection.recv_snapshot()).await {
            Ok(snapshot) => {
                let events = world.apply(&snapshot?)?;
                for joined in events.joined {
                    info!("Bot {} sees player {} join", index, joined);
                }
                for left in events.left {
                    info!("Bot {} sees player {} leave", index, left);
                }
                if events.got_hit {
                    info!("Bot {} (player {}) was hit", index, id);
                }
                if events.ping {
                    info!("Bot {} ping: {} snapshots so far", index, world.snapshot_count());
                }
            }
            Err(_elapsed) => {
                steer(&mut player, &world, args.strike_chance);
                connection.send_update(&player.tick()).await?;
                next_update += period;
            }
        }
    }
}

fn steer(player: &mut LocalPlayer, world: &RemoteWorld, strike_chance: f64) {
    let mut rng = rand::rng();
    if rng.random_bool(strike_chance.clamp(0.0, 1.0)) {
        if let Some(target) = world.others().map(|record| record.id).choose(&mut rng) {
            player.strike(target);
            return;
        }
    }
    if rng.random_bool(0.5) {
        let step = Vec3::new(rng.random_range(-0.05..0.05), rng.random_range(-0.05..0.05), 0.0);
        player.move_by(step);
    } else {
        player.stand();
    }
}
