//! Authoritative Simulation Tick
//!
//! A `Zone` owns one deterministic simulation: the component store, the
//! seeded RNG, the static tables, and the in-flight hit queue. Commands
//! are applied between ticks in submission order; the tick itself runs a
//! fixed system pipeline.
//!
//! The `TickScheduler` wraps a zone in a lifecycle state machine with
//! per-system timing metrics and bounded error recovery. Timing is
//! observability only; nothing in the simulation reads the wall clock.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::data::tables::StaticTables;
use crate::game::combat::{attempt_attack, deliver_due_hits, AttackError, PendingHits, SimClock};
use crate::game::components::{
    ActivePrayers, AttackStyle, AttackTimer, CombatStats, EntityId, Health, Loadout,
    MovementState, Position, Respawn,
};
use crate::game::events::GameEvent;
use crate::game::movement::{self, MoveAck};
use crate::game::store::WorldStore;
use crate::game::validate::{ValidationError, MAX_MOVE_DISTANCE};
use crate::game::{InMemoryInventory, Inventory, NullPersistence, Persistence, PlayerRecord};

/// Zone-level configuration.
#[derive(Debug, Clone)]
pub struct ZoneConfig {
    /// Zone name, also the seed domain.
    pub name: String,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// World width in tiles.
    pub width: f32,
    /// World height in tiles.
    pub height: f32,
    /// Default spawn point.
    pub spawn: Vec2,
    /// Ticks between death and respawn.
    pub respawn_delay_ticks: u64,
    /// Maximum straight-line distance a single move request may cover.
    pub max_move_distance: f32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            name: "ironvale".to_string(),
            tick_rate: crate::TICK_RATE,
            width: 100.0,
            height: 100.0,
            spawn: Vec2::new(50.0, 50.0),
            respawn_delay_ticks: 300, // 5 seconds at 60 tps
            max_move_distance: MAX_MOVE_DISTANCE,
        }
    }
}

/// A command applied to the simulation between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneCommand {
    /// Seek a target position.
    Move {
        /// Target X in tiles.
        x: f32,
        /// Target Y in tiles.
        y: f32,
        /// Run instead of walk.
        run: bool,
    },
    /// Stop in place and drop any attack lock.
    Stop,
    /// Attack another entity and keep attacking it.
    Attack {
        /// The entity to attack.
        target: EntityId,
    },
    /// Switch the attack style on the current weapon.
    SetStyle {
        /// The new style.
        style: AttackStyle,
    },
    /// Activate exactly the given prayers, replacing the current set.
    SetPrayers {
        /// Prayer ids to activate.
        prayers: Vec<u32>,
    },
}

/// Outcome of a single command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandReply {
    /// Move accepted; includes the echo and travel estimate.
    MoveOk(MoveAck),
    /// Move rejected by validation.
    MoveRejected(ValidationError),
    /// Attack resolved or queued.
    AttackOk,
    /// Attack rejected.
    AttackRejected(AttackError),
    /// Stop or style switch acknowledged.
    Ack,
}

/// One deterministic simulation instance.
pub struct Zone {
    /// Component store. Public so the sync layer can read world state.
    pub store: WorldStore,
    rng: DeterministicRng,
    tables: Arc<StaticTables>,
    inventory: Box<dyn Inventory + Send>,
    persistence: Box<dyn Persistence + Send>,
    pending: PendingHits,
    events: Vec<GameEvent>,
    tick: u64,
    config: ZoneConfig,
}

impl Zone {
    /// Create a zone from a configuration and an RNG seed.
    pub fn new(config: ZoneConfig, seed: u64) -> Self {
        Self {
            store: WorldStore::new(config.width, config.height),
            rng: DeterministicRng::new(seed),
            tables: Arc::new(StaticTables::builtin()),
            inventory: Box::new(InMemoryInventory::new()),
            persistence: Box::new(NullPersistence),
            pending: PendingHits::default(),
            events: Vec::new(),
            tick: 0,
            config,
        }
    }

    /// Replace the item tables (shared across zones).
    pub fn with_tables(mut self, tables: Arc<StaticTables>) -> Self {
        self.tables = tables;
        self
    }

    /// Replace the inventory collaborator.
    pub fn with_inventory(mut self, inventory: Box<dyn Inventory + Send>) -> Self {
        self.inventory = inventory;
        self
    }

    /// Replace the persistence collaborator.
    pub fn with_persistence(mut self, persistence: Box<dyn Persistence + Send>) -> Self {
        self.persistence = persistence;
        self
    }

    /// Current tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Zone configuration.
    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Static tables.
    pub fn tables(&self) -> &StaticTables {
        &self.tables
    }

    /// Simulation time in milliseconds, derived from the tick counter.
    pub fn sim_time_ms(&self) -> u64 {
        self.tick * 1000 / self.config.tick_rate as u64
    }

    fn clock(&self) -> SimClock {
        SimClock {
            tick: self.tick,
            now_ms: self.sim_time_ms(),
            tick_rate: self.config.tick_rate,
        }
    }

    /// Spawn a player at the zone spawn point.
    ///
    /// A stored record restores the player's stats and experience;
    /// unknown names start fresh.
    pub fn spawn_player(&mut self, name: &str) -> EntityId {
        let record = self.persistence.load_record(name);
        let stats = record.as_ref().map(|r| r.stats).unwrap_or_default();
        let id = self.spawn_at(name, self.config.spawn, stats, 1, false);
        if let Some(record) = record {
            self.store.xp.insert(id, record.xp);
        }
        self.store.players.insert(id);
        info!(entity = %id, name, "player spawned");
        id
    }

    /// Spawn an NPC with the given stats and weapon.
    pub fn spawn_npc(
        &mut self,
        name: &str,
        position: Vec2,
        stats: CombatStats,
        weapon: u32,
        despawn_on_death: bool,
    ) -> EntityId {
        self.spawn_at(name, position, stats, weapon, despawn_on_death)
    }

    fn spawn_at(
        &mut self,
        name: &str,
        position: Vec2,
        stats: CombatStats,
        weapon: u32,
        despawn_on_death: bool,
    ) -> EntityId {
        let id = self.store.spawn();
        self.store.positions.insert(id, Position(position));
        self.store.health.insert(id, Health::full(stats.hitpoints));
        self.store.stats.insert(id, stats);
        self.store.loadouts.insert(id, Loadout::with_weapon(weapon));
        self.store.attack_timers.insert(id, AttackTimer::default());
        self.store
            .movement
            .insert(id, MovementState::idle_at(position));
        self.store.respawn.insert(
            id,
            Respawn {
                spawn: position,
                delay_ticks: self.config.respawn_delay_ticks,
                despawn: despawn_on_death,
            },
        );
        self.store.names.insert(id, name.to_string());
        self.store.mark_dirty(id);
        id
    }

    /// Remove an entity and every in-flight hit touching it.
    ///
    /// Players have their progress saved before removal.
    pub fn despawn(&mut self, entity: EntityId) {
        self.save_player(entity);
        self.pending.invalidate(entity);
        self.store.despawn(entity);
    }

    /// Persist a player's stats and experience. NPCs are skipped.
    fn save_player(&mut self, entity: EntityId) {
        if !self.store.players.contains(&entity) {
            return;
        }
        let (Some(name), Some(stats)) = (
            self.store.names.get(&entity),
            self.store.stats.get(&entity),
        ) else {
            return;
        };
        let record = PlayerRecord {
            name: name.clone(),
            stats: *stats,
            xp: self.store.xp.get(&entity).cloned().unwrap_or_default(),
        };
        self.persistence.save_record(&record);
    }

    /// Apply one command for an entity. Rejections mutate nothing.
    pub fn handle_command(&mut self, entity: EntityId, command: ZoneCommand) -> CommandReply {
        match command {
            ZoneCommand::Move { x, y, run } => {
                match movement::request_move(
                    &mut self.store,
                    entity,
                    Vec2::new(x, y),
                    run,
                    self.config.max_move_distance,
                ) {
                    Ok(ack) => CommandReply::MoveOk(ack),
                    Err(err) => CommandReply::MoveRejected(err),
                }
            }
            ZoneCommand::Stop => {
                movement::stop(&mut self.store, entity);
                self.store.targets.remove(&entity);
                CommandReply::Ack
            }
            ZoneCommand::Attack { target } => {
                let clock = self.clock();
                match attempt_attack(
                    &mut self.store,
                    &self.tables,
                    &mut *self.inventory,
                    &mut self.rng,
                    &mut self.pending,
                    &mut self.events,
                    clock,
                    entity,
                    target,
                ) {
                    Ok(()) => {
                        // Keep attacking until stopped or invalidated
                        self.store.targets.insert(entity, target);
                        CommandReply::AttackOk
                    }
                    Err(err) => CommandReply::AttackRejected(err),
                }
            }
            ZoneCommand::SetStyle { style } => {
                if let Some(loadout) = self.store.loadouts.get_mut(&entity) {
                    loadout.style = style;
                    self.store.mark_dirty(entity);
                }
                CommandReply::Ack
            }
            ZoneCommand::SetPrayers { prayers } => {
                // Unknown and under-leveled prayers are dropped, not errors;
                // the server clamps rather than trusting the client
                let prayer_level = self
                    .store
                    .stats
                    .get(&entity)
                    .map(|s| s.prayer)
                    .unwrap_or(1);
                let active: BTreeSet<u32> = prayers
                    .into_iter()
                    .filter(|id| {
                        self.tables
                            .prayer(*id)
                            .is_some_and(|p| p.level_req <= prayer_level)
                    })
                    .collect();
                self.store.prayers.insert(entity, ActivePrayers(active));
                CommandReply::Ack
            }
        }
    }

    /// Advance the simulation by one tick.
    ///
    /// System order is fixed: movement, auto-attack, hit delivery,
    /// respawns. Returns the events generated this tick.
    pub fn step(&mut self) -> Vec<GameEvent> {
        self.tick += 1;
        let clock = self.clock();
        let dt = 1.0 / self.config.tick_rate as f32;

        movement::step_movement(&mut self.store, dt);
        self.run_auto_attacks(clock);
        deliver_due_hits(&mut self.store, &mut self.pending, self.tick, &mut self.events);
        self.run_respawns();

        // Deliver in priority order within the tick
        let mut events = std::mem::take(&mut self.events);
        events.sort_by_key(GameEvent::sort_key);
        events
    }

    /// Re-attempt attacks for every entity with a standing target.
    ///
    /// Cooldown and range rejections are expected between swings and are
    /// dropped silently; any other rejection clears the lock.
    fn run_auto_attacks(&mut self, clock: SimClock) {
        let locks: Vec<(EntityId, EntityId)> =
            self.store.targets.iter().map(|(a, t)| (*a, *t)).collect();

        for (attacker, target) in locks {
            match attempt_attack(
                &mut self.store,
                &self.tables,
                &mut *self.inventory,
                &mut self.rng,
                &mut self.pending,
                &mut self.events,
                clock,
                attacker,
                target,
            ) {
                Ok(()) | Err(AttackError::OnCooldown) | Err(AttackError::OutOfRange) => {}
                Err(_) => {
                    self.store.targets.remove(&attacker);
                }
            }
        }
    }

    /// Respawn or despawn entities whose death delay has elapsed.
    fn run_respawns(&mut self) {
        let due: Vec<EntityId> = self
            .store
            .died_at
            .iter()
            .filter(|(id, died)| {
                let delay = self
                    .store
                    .respawn
                    .get(id)
                    .map(|r| r.delay_ticks)
                    .unwrap_or(self.config.respawn_delay_ticks);
                self.tick >= **died + delay
            })
            .map(|(id, _)| *id)
            .collect();

        for entity in due {
            let respawn = self.store.respawn.get(&entity).copied();
            if respawn.is_some_and(|r| r.despawn) {
                self.despawn(entity);
                continue;
            }

            let spawn = respawn.map(|r| r.spawn).unwrap_or(self.config.spawn);
            self.store.died_at.remove(&entity);
            self.store.set_position(entity, spawn);
            self.store.restore_full_health(entity);
            self.store
                .movement
                .insert(entity, MovementState::idle_at(spawn));
            self.store.mark_dirty(entity);
            self.events
                .push(GameEvent::respawned(self.tick, entity, spawn));
        }
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Consecutive-tick window for counting step failures.
const ERROR_WINDOW_TICKS: u64 = 600;

/// Failures tolerated inside the window before the scheduler gives up.
const MAX_ERRORS_IN_WINDOW: usize = 5;

/// Recovery attempts allowed over the scheduler's lifetime.
const MAX_RECOVERIES: u32 = 3;

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not ticking.
    Stopped,
    /// Start requested, first tick not yet run.
    Starting,
    /// Ticking normally.
    Running,
    /// A step failed; the next successful step returns to `Running`.
    Recovering,
}

/// Why the scheduler refused or abandoned a step.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `step` called while not started.
    #[error("scheduler is not running")]
    NotRunning,

    /// Too many failures inside the error window.
    #[error("{failures} tick failures within the error window")]
    TooManyFailures {
        /// Failure count that tripped the limit.
        failures: usize,
    },

    /// Recovery budget exhausted.
    #[error("recovery limit exceeded after {recoveries} attempts")]
    RecoveryLimit {
        /// Recoveries attempted.
        recoveries: u32,
    },
}

/// Wall-clock timing for one named system. Observability only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMetrics {
    /// Times the system has run.
    pub runs: u64,
    /// Cumulative runtime in microseconds.
    pub total_micros: u64,
    /// Runtime of the latest run in microseconds.
    pub last_micros: u64,
}

impl SystemMetrics {
    fn record(&mut self, micros: u64) {
        self.runs += 1;
        self.total_micros += micros;
        self.last_micros = micros;
    }
}

/// Everything one scheduler step produced.
#[derive(Debug)]
pub struct StepOutcome {
    /// Tick the step completed.
    pub tick: u64,
    /// Per-command replies, in submission order.
    pub replies: Vec<(EntityId, CommandReply)>,
    /// Events generated this tick.
    pub events: Vec<GameEvent>,
}

/// Drives a zone through its lifecycle with bounded error recovery.
pub struct TickScheduler {
    zone: Zone,
    state: SchedulerState,
    error_ticks: VecDeque<u64>,
    recoveries: u32,
    metrics: BTreeMap<&'static str, SystemMetrics>,
    #[cfg(test)]
    inject_failures: u32,
}

impl TickScheduler {
    /// Wrap a zone in a stopped scheduler.
    pub fn new(zone: Zone) -> Self {
        Self {
            zone,
            state: SchedulerState::Stopped,
            error_ticks: VecDeque::new(),
            recoveries: 0,
            metrics: BTreeMap::new(),
            #[cfg(test)]
            inject_failures: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// The owned zone.
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// Mutable access to the owned zone.
    pub fn zone_mut(&mut self) -> &mut Zone {
        &mut self.zone
    }

    /// Timing metrics per system.
    pub fn metrics(&self) -> &BTreeMap<&'static str, SystemMetrics> {
        &self.metrics
    }

    /// Begin ticking. Idempotent while already running.
    pub fn start(&mut self) {
        if matches!(self.state, SchedulerState::Stopped) {
            self.state = SchedulerState::Starting;
            info!(zone = %self.zone.config.name, "scheduler starting");
            self.state = SchedulerState::Running;
        }
    }

    /// Stop ticking.
    pub fn stop(&mut self) {
        if self.state != SchedulerState::Stopped {
            info!(
                zone = %self.zone.config.name,
                tick = self.zone.tick,
                "scheduler stopped"
            );
            self.state = SchedulerState::Stopped;
        }
    }

    /// Apply a batch of commands, then advance one tick.
    ///
    /// A failed step moves the scheduler to `Recovering`; the next
    /// successful step returns it to `Running`. Repeated failures within
    /// the error window, or exhausting the recovery budget, stop the
    /// scheduler for good.
    pub fn step(
        &mut self,
        commands: Vec<(EntityId, ZoneCommand)>,
    ) -> Result<StepOutcome, SchedulerError> {
        if matches!(self.state, SchedulerState::Stopped | SchedulerState::Starting) {
            return Err(SchedulerError::NotRunning);
        }

        match self.run_step(commands) {
            Ok(outcome) => {
                if self.state == SchedulerState::Recovering {
                    info!(
                        zone = %self.zone.config.name,
                        tick = outcome.tick,
                        "scheduler recovered"
                    );
                    self.state = SchedulerState::Running;
                }
                Ok(outcome)
            }
            Err(err) => self.handle_failure(err),
        }
    }

    fn run_step(&mut self, commands: Vec<(EntityId, ZoneCommand)>) -> anyhow::Result<StepOutcome> {
        #[cfg(test)]
        if self.inject_failures > 0 {
            self.inject_failures -= 1;
            anyhow::bail!("injected failure");
        }

        let started = Instant::now();
        let mut replies = Vec::with_capacity(commands.len());
        for (entity, command) in commands {
            replies.push((entity, self.zone.handle_command(entity, command)));
        }
        self.record("commands", started);

        let started = Instant::now();
        let events = self.zone.step();
        self.record("tick", started);

        Ok(StepOutcome {
            tick: self.zone.tick,
            replies,
            events,
        })
    }

    fn handle_failure(&mut self, err: anyhow::Error) -> Result<StepOutcome, SchedulerError> {
        let tick = self.zone.tick;
        warn!(zone = %self.zone.config.name, tick, error = %err, "tick failed");

        self.error_ticks.push_back(tick);
        while let Some(oldest) = self.error_ticks.front() {
            if tick.saturating_sub(*oldest) >= ERROR_WINDOW_TICKS {
                self.error_ticks.pop_front();
            } else {
                break;
            }
        }

        if self.error_ticks.len() > MAX_ERRORS_IN_WINDOW {
            let failures = self.error_ticks.len();
            error!(zone = %self.zone.config.name, failures, "error window exceeded, stopping");
            self.state = SchedulerState::Stopped;
            return Err(SchedulerError::TooManyFailures { failures });
        }

        self.recoveries += 1;
        if self.recoveries > MAX_RECOVERIES {
            error!(
                zone = %self.zone.config.name,
                recoveries = self.recoveries,
                "recovery limit exceeded, stopping"
            );
            self.state = SchedulerState::Stopped;
            return Err(SchedulerError::RecoveryLimit {
                recoveries: self.recoveries,
            });
        }

        self.state = SchedulerState::Recovering;
        // The failed tick is skipped; state stays at the last good tick
        Ok(StepOutcome {
            tick,
            replies: Vec::new(),
            events: Vec::new(),
        })
    }

    fn record(&mut self, system: &'static str, started: Instant) {
        let micros = started.elapsed().as_micros() as u64;
        self.metrics.entry(system).or_default().record(micros);
    }

    /// Make the next `n` steps fail, for recovery tests.
    #[cfg(test)]
    pub fn inject_step_failures(&mut self, n: u32) {
        self.inject_failures = n;
    }
}

// =============================================================================
// TESTS
// =============================================================================
