//! WebSocket Zone Server
//!
//! Accepts WebSocket connections, feeds client commands into the tick
//! loop, and fans simulation output back out. One tick task owns the
//! scheduler; connection tasks only talk to it through the command
//! channel and brief lock windows for join and leave.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::game::components::EntityId;
use crate::game::tick::{CommandReply, SchedulerError, TickScheduler, Zone, ZoneCommand, ZoneConfig};
use crate::net::protocol::{ClientCommand, ErrorCode, ServerEvent};
use crate::net::session::{PlayerSession, SessionRegistry};
use crate::net::sync::{delta_sync, event_to_wire, full_snapshot, player_joined, private_recipient};
use crate::BROADCAST_INTERVAL_TICKS;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Zone configuration.
    pub zone: ZoneConfig,
    /// RNG seed for the zone.
    pub seed: u64,
    /// Ticks between delta broadcasts.
    pub broadcast_interval_ticks: u64,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().expect("static address"),
            max_connections: 1000,
            zone: ZoneConfig::default(),
            seed: 0,
            broadcast_interval_ticks: BROADCAST_INTERVAL_TICKS,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Zone server errors.
#[derive(Debug, thiserror::Error)]
pub enum ZoneServerError {
    /// Failed to bind to the configured address.
    #[error("failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket protocol failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A command waiting for the next tick, tagged with its sender.
struct PendingCommand {
    entity: EntityId,
    command: ZoneCommand,
}

/// Translate a command reply into an outgoing event, if the client
/// should hear about it. Attack results arrive as combat events.
fn reply_to_event(reply: CommandReply) -> Option<ServerEvent> {
    match reply {
        CommandReply::MoveOk(ack) => Some(ServerEvent::MoveAck {
            x: ack.x,
            y: ack.y,
            estimated_duration_ms: ack.estimated_duration_ms,
        }),
        CommandReply::MoveRejected(err) => {
            Some(ServerEvent::error(ErrorCode::from(err), err.to_string()))
        }
        CommandReply::AttackRejected(err) => {
            Some(ServerEvent::error(ErrorCode::from(err), err.to_string()))
        }
        CommandReply::AttackOk | CommandReply::Ack => None,
    }
}

/// The zone server.
pub struct ZoneServer {
    config: ServerConfig,
    scheduler: Arc<RwLock<TickScheduler>>,
    registry: Arc<SessionRegistry>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ZoneServer {
    /// Create a server around a fresh zone.
    pub fn new(config: ServerConfig) -> Self {
        let zone = Zone::new(config.zone.clone(), config.seed);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            scheduler: Arc::new(RwLock::new(TickScheduler::new(zone))),
            registry: Arc::new(SessionRegistry::new()),
            shutdown_tx,
        }
    }

    /// Run the accept loop and the tick task until shutdown.
    pub async fn run(&self) -> Result<(), ZoneServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            zone = %self.config.zone.name,
            version = %self.config.version,
            "zone server listening"
        );

        self.scheduler.write().await.start();

        let (command_tx, command_rx) = mpsc::channel::<PendingCommand>(1024);

        let tick_task = tokio::spawn(Self::run_tick_loop(
            self.scheduler.clone(),
            self.registry.clone(),
            command_rx,
            self.config.zone.tick_rate,
            self.config.broadcast_interval_ticks,
            self.shutdown_tx.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.registry.session_count().await >= self.config.max_connections {
                                warn!(%addr, "connection limit reached, rejecting");
                                continue;
                            }
                            self.spawn_connection(stream, addr, command_tx.clone());
                        }
                        Err(e) => error!(error = %e, "accept failed"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        self.registry
            .broadcast(ServerEvent::Shutdown {
                reason: "server shutting down".to_string(),
            })
            .await;
        tick_task.abort();
        self.scheduler.write().await.stop();
        Ok(())
    }

    /// Signal the server to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Live session count.
    pub async fn session_count(&self) -> usize {
        self.registry.session_count().await
    }

    /// The shared scheduler, for world setup before `run`.
    pub fn scheduler(&self) -> &Arc<RwLock<TickScheduler>> {
        &self.scheduler
    }

    /// The fixed-rate tick loop: drain commands, step, fan out output.
    async fn run_tick_loop(
        scheduler: Arc<RwLock<TickScheduler>>,
        registry: Arc<SessionRegistry>,
        mut command_rx: mpsc::Receiver<PendingCommand>,
        tick_rate: u32,
        broadcast_interval_ticks: u64,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut ticker = interval(Duration::from_micros(1_000_000 / tick_rate as u64));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.recv() => break,
            }

            // Everything queued since the last tick, in arrival order
            let mut commands = Vec::new();
            while let Ok(pending) = command_rx.try_recv() {
                commands.push((pending.entity, pending.command));
            }

            let (outcome, sync) = {
                let mut sched = scheduler.write().await;
                let outcome = match sched.step(commands) {
                    Ok(outcome) => outcome,
                    Err(SchedulerError::NotRunning) => break,
                    Err(err) => {
                        error!(error = %err, "scheduler gave up, stopping tick loop");
                        registry
                            .broadcast(ServerEvent::Shutdown {
                                reason: err.to_string(),
                            })
                            .await;
                        break;
                    }
                };

                let sync = if outcome.tick % broadcast_interval_ticks == 0 {
                    delta_sync(&mut sched.zone_mut().store, outcome.tick)
                } else {
                    None
                };
                (outcome, sync)
            };

            for (entity, reply) in outcome.replies {
                if let Some(event) = reply_to_event(reply) {
                    registry.send_to(entity, event).await;
                }
            }

            for event in &outcome.events {
                let wire = event_to_wire(event);
                match private_recipient(&wire) {
                    Some(entity) => registry.send_to(entity, wire).await,
                    None => registry.broadcast(wire).await,
                }
            }

            if let Some(sync) = sync {
                registry.broadcast(ServerEvent::StateSync(sync)).await;
            }
        }
    }

    /// Spawn the per-connection task.
    fn spawn_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        command_tx: mpsc::Sender<PendingCommand>,
    ) {
        let scheduler = self.scheduler.clone();
        let registry = self.registry.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!(%addr, error = %e, "websocket handshake failed");
                    return;
                }
            };
            debug!(%addr, "connection established");

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (event_tx, mut event_rx) = mpsc::channel::<ServerEvent>(64);

            let session = registry.insert(PlayerSession::new(event_tx.clone())).await;
            let session_id = session.read().await.id;

            // Outgoing events are serialized by a dedicated task so the
            // read loop never blocks on a slow socket
            let sender_task = tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    let text = match event.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!(error = %e, "failed to serialize event");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let command = match ClientCommand::from_json(&text) {
                                    Ok(c) => c,
                                    Err(e) => {
                                        debug!(%addr, error = %e, "invalid message");
                                        let _ = event_tx
                                            .send(ServerEvent::error(
                                                ErrorCode::InvalidInput,
                                                "invalid message format",
                                            ))
                                            .await;
                                        continue;
                                    }
                                };
                                let leave = Self::handle_command(
                                    command,
                                    &session,
                                    &registry,
                                    &scheduler,
                                    &command_tx,
                                    &event_tx,
                                )
                                .await;
                                if leave {
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                // tungstenite answers pings; nothing to do
                                let _ = payload;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(%addr, "client disconnected");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!(%addr, error = %e, "websocket error");
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = event_tx
                            .send(ServerEvent::Shutdown {
                                reason: "server shutting down".to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }

            // Teardown: unbind the session and pull the entity from the
            // zone; in-flight hits involving it die with it
            if let Some(entity) = registry.remove(&session_id).await {
                scheduler.write().await.zone_mut().despawn(entity);
                registry.broadcast(ServerEvent::PlayerLeft { entity }).await;
                info!(%addr, %entity, "player left");
            }
            sender_task.abort();
        });
    }

    /// Apply one parsed client command. Returns true when the client
    /// asked to leave.
    async fn handle_command(
        command: ClientCommand,
        session: &Arc<RwLock<PlayerSession>>,
        registry: &Arc<SessionRegistry>,
        scheduler: &Arc<RwLock<TickScheduler>>,
        command_tx: &mpsc::Sender<PendingCommand>,
        event_tx: &mpsc::Sender<ServerEvent>,
    ) -> bool {
        // Rate limit every command the same way
        {
            let mut s = session.write().await;
            let now_ms = s.elapsed_ms();
            if s.limiter.check(now_ms).is_err() {
                let _ = event_tx
                    .send(ServerEvent::error(
                        ErrorCode::RateLimit,
                        "command rate limit exceeded",
                    ))
                    .await;
                return false;
            }
        }

        match command {
            ClientCommand::Join { name } => {
                if session.read().await.is_joined() {
                    return false;
                }

                let (entity, joined, snapshot, announce) = {
                    let mut sched = scheduler.write().await;
                    let zone = sched.zone_mut();
                    let entity = zone.spawn_player(&name);
                    let joined = ServerEvent::Joined {
                        entity,
                        tick: zone.tick(),
                        tick_rate: zone.config().tick_rate,
                        world_width: zone.config().width,
                        world_height: zone.config().height,
                    };
                    let snapshot = full_snapshot(&zone.store, zone.tick());
                    let announce = player_joined(&zone.store, entity);
                    (entity, joined, snapshot, announce)
                };

                // Announce to the zone before the joiner is bound, so
                // they get the full snapshot instead
                if let Some(announce) = announce {
                    registry.broadcast(announce).await;
                }

                {
                    let mut s = session.write().await;
                    s.name = name;
                }
                let session_id = session.read().await.id;
                registry.bind_entity(session_id, entity).await;

                let _ = event_tx.send(joined).await;
                let _ = event_tx.send(ServerEvent::StateSync(snapshot)).await;
            }
            ClientCommand::Move { x, y, run } => {
                Self::queue_command(
                    session,
                    command_tx,
                    event_tx,
                    ZoneCommand::Move { x, y, run },
                )
                .await;
            }
            ClientCommand::Stop => {
                Self::queue_command(session, command_tx, event_tx, ZoneCommand::Stop).await;
            }
            ClientCommand::Attack { target } => {
                Self::queue_command(
                    session,
                    command_tx,
                    event_tx,
                    ZoneCommand::Attack { target },
                )
                .await;
            }
            ClientCommand::SetStyle { style } => {
                Self::queue_command(session, command_tx, event_tx, ZoneCommand::SetStyle { style })
                    .await;
            }
            ClientCommand::SetPrayers { prayers } => {
                Self::queue_command(
                    session,
                    command_tx,
                    event_tx,
                    ZoneCommand::SetPrayers { prayers },
                )
                .await;
            }
            ClientCommand::Chat { text } => {
                // Chat never touches the simulation
                let s = session.read().await;
                if s.is_joined() {
                    let from = s.name.clone();
                    drop(s);
                    registry.broadcast(ServerEvent::Chat { from, text }).await;
                }
            }
            ClientCommand::Ping { timestamp } => {
                let _ = event_tx
                    .send(ServerEvent::Pong {
                        timestamp,
                        server_time: chrono::Utc::now().timestamp_millis() as u64,
                    })
                    .await;
            }
            ClientCommand::Leave => return true,
        }

        false
    }

    /// Forward a simulation command into the tick loop's queue.
    async fn queue_command(
        session: &Arc<RwLock<PlayerSession>>,
        command_tx: &mpsc::Sender<PendingCommand>,
        event_tx: &mpsc::Sender<ServerEvent>,
        command: ZoneCommand,
    ) {
        let entity = session.read().await.entity;
        match entity {
            Some(entity) => {
                let _ = command_tx.send(PendingCommand { entity, command }).await;
            }
            None => {
                let _ = event_tx
                    .send(ServerEvent::error(
                        ErrorCode::NotJoined,
                        "join the zone first",
                    ))
                    .await;
            }
        }
    }
}
