//! Ironvale Game Server
//!
//! Authoritative zone server: deterministic simulation at a fixed tick
//! rate, WebSocket clients, delta state sync.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ironvale::core::rng::derive_zone_seed;
use ironvale::core::vec2::Vec2;
use ironvale::game::components::CombatStats;
use ironvale::net::{ServerConfig, ZoneServer};
use ironvale::{TICK_RATE, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Ironvale Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let mut config = ServerConfig::default();
    if let Ok(addr) = std::env::var("IRONVALE_BIND") {
        config.bind_addr = addr.parse().context("invalid IRONVALE_BIND address")?;
    }
    if let Ok(zone) = std::env::var("IRONVALE_ZONE") {
        config.zone.name = zone;
    }

    // Each process run is its own world instance
    let instance_id = *uuid::Uuid::new_v4().as_bytes();
    config.seed = derive_zone_seed(&config.zone.name, &instance_id);
    info!(
        zone = %config.zone.name,
        instance = %hex::encode(instance_id),
        seed = config.seed,
        "zone seed derived"
    );

    let server = ZoneServer::new(config);
    populate_world(&server).await;

    tokio::select! {
        result = server.run() => result.context("server terminated")?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}

/// Seed the zone with a handful of practice targets.
async fn populate_world(server: &ZoneServer) {
    let scheduler = server.scheduler().clone();
    let mut sched = scheduler.write().await;
    let zone = sched.zone_mut();

    let goblin = CombatStats {
        attack: 1,
        strength: 1,
        defence: 1,
        ranged: 1,
        magic: 1,
        prayer: 1,
        hitpoints: 5,
    };
    for (i, pos) in [
        Vec2::new(45.0, 45.0),
        Vec2::new(55.0, 45.0),
        Vec2::new(45.0, 55.0),
        Vec2::new(55.0, 55.0),
    ]
    .into_iter()
    .enumerate()
    {
        let id = zone.spawn_npc(&format!("Goblin {}", i + 1), pos, goblin, 1, false);
        info!(entity = %id, x = pos.x, y = pos.y, "npc spawned");
    }
}
