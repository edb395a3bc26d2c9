//! Snake Arena
//!
//! `snake-arena relay [ADDR]` runs the WebSocket relay.
//! `snake-arena demo [CONFIG.json]` (the default) plays a local match,
//! verifies replay determinism and syncs a host and a client in-process.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use snake_arena::{
    config::GameConfig,
    core::grid::Direction,
    game::{
        events::GameEventData,
        snake::PlayerId,
        state::World,
        tick::replay_match,
    },
    network::{
        loopback::LoopbackHub,
        protocol::JoinMetadata,
        relay::{RelayConfig, RelayServer},
        session::SessionController,
    },
    DEFAULT_TICK_RATE_HZ, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Snake Arena v{}", VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("relay") => run_relay(args.get(1).map(String::as_str)).await,
        Some("demo") => run_demo(args.get(1).map(String::as_str)).await,
        None => run_demo(None).await,
        Some(other) => anyhow::bail!("unknown command {other:?}; expected `relay` or `demo`"),
    }
}

/// Serve the relay until Ctrl-C.
async fn run_relay(addr: Option<&str>) -> anyhow::Result<()> {
    let mut config = RelayConfig::default();
    if let Some(addr) = addr {
        config.bind_addr = addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid bind address {addr:?}"))?;
    }

    let server = std::sync::Arc::new(RelayServer::new(config));
    let running = server.clone();
    let handle = tokio::spawn(async move { running.run().await });

    tokio::select! {
        result = handle => {
            result.context("relay task panicked")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down relay");
            server.shutdown();
        }
    }
    Ok(())
}

fn load_config(path: Option<&str>) -> anyhow::Result<GameConfig> {
    let config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            GameConfig::from_json_str(&json)?
        }
        None => GameConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Scripted steering: each player turns clockwise on its own period.
fn scripted_inputs(ids: &[PlayerId], ticks: u32) -> BTreeMap<PlayerId, Vec<Option<Direction>>> {
    const TURNS: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let period = 5 + 2 * i as u32;
            let frames = (0..ticks)
                .map(|t| (t % period == 0).then(|| TURNS[((t / period) as usize) % TURNS.len()]))
                .collect();
            (id.clone(), frames)
        })
        .collect()
}

async fn run_demo(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    info!(
        "Board {}x{}, seed {}, {} ms match at {} Hz (default {} Hz)",
        config.cols,
        config.rows,
        config.rng_seed,
        config.match_duration_ms,
        config.tick_rate_hz,
        DEFAULT_TICK_RATE_HZ
    );

    demo_replay(&config);
    demo_session(&config).await
}

/// Play a scripted local match twice and compare final hashes.
fn demo_replay(config: &GameConfig) {
    info!("=== Starting Demo Match ===");

    let mut world = World::new(config);
    for player in &config.local_players {
        world.add_or_update_snake(PlayerId::new(player.id.clone()), &player.name, &player.color);
    }
    let ids: Vec<PlayerId> = world.snakes.keys().cloned().collect();

    let ticks = (config.match_duration_ms / config.tick_ms()) as u32 + 1;
    let inputs = scripted_inputs(&ids, ticks);

    let (first, events) = replay_match(world.clone(), &inputs, ticks, config.tick_ms());
    let deaths = events
        .iter()
        .filter(|e| matches!(e.data, GameEventData::SnakeDied { .. }))
        .count();
    let meals = events
        .iter()
        .filter(|e| matches!(e.data, GameEventData::FoodEaten { .. }))
        .count();
    info!("Match ended at tick {}: {}", first.tick, first.outcome_text());
    info!("{} deaths, {} food eaten, {} events total", deaths, meals, events.len());

    let hash = first.compute_hash();
    info!("Final State Hash: {}", hex::encode(hash));

    info!("=== Verifying Determinism ===");
    let (second, _) = replay_match(world, &inputs, ticks, config.tick_ms());
    let replay_hash = second.compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
    } else {
        warn!("DETERMINISM FAILURE: Hashes differ!");
    }
}

/// Host a session in-process, join it and check the client mirrors the host.
async fn demo_session(config: &GameConfig) -> anyhow::Result<()> {
    info!("=== Host / Client Sync ===");

    let hub = LoopbackHub::new();
    let mut host = SessionController::new(config.clone(), hub.connect());
    let mut client = SessionController::new(config.clone(), hub.connect());

    let hosted = host.host(JoinMetadata::default()).await?;
    client
        .join(&hosted.session_id, JoinMetadata::new("Guest", "#788cff"))
        .await?;

    let step = config.tick_ms();
    for frame in 0..50u32 {
        if frame % 9 == 0 {
            let dir = [Direction::Up, Direction::Left, Direction::Down, Direction::Right][(frame / 9) as usize % 4];
            client.steer(dir).await;
            host.steer(dir.opposite()).await;
        }
        host.pump(step).await;
        client.pump(step).await;
    }

    let in_sync = client.world().snapshot() == host.world().snapshot();
    info!(
        "Host tick {}, {} snakes; client tick {}, {} snakes",
        host.world().tick,
        host.world().snakes.len(),
        client.world().tick,
        client.world().snakes.len()
    );
    if in_sync {
        info!("SYNC VERIFIED: client mirrors host");
    } else {
        warn!("SYNC FAILURE: client differs from host");
    }

    client.leave().await?;
    host.leave().await?;
    Ok(())
}
