// Match manager: owns the running matches and drives each one on its own worker thread.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use super::catalog::{GameData, Slot};
use super::config::TickClock;
use super::entity::EntityId;
use super::game::{Game, MatchSetup};
use super::geometry::Vector2;
use crate::error::SetupError;
use crate::metrics;
use crate::net::messages::{self, EntityState, InitialState, Message};
use crate::net::session::{ConnId, SessionRegistry};
use crate::worker_pool::WorkerPool;

/// Player input and lifecycle signals, applied by the match thread between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchCommand {
    Move {
        slot: Slot,
        target: Vector2,
    },
    Attack {
        slot: Slot,
        attacker: EntityId,
        target: EntityId,
    },
    StopAttack {
        slot: Slot,
    },
    CastSkill {
        slot: Slot,
        aim: Vector2,
    },
    SpawnTroop {
        slot: Slot,
        troop_id: i16,
    },
    /// A connection was bound to the slot; it gets the current state.
    Join {
        slot: Slot,
        conn: ConnId,
    },
    PlayerLeft {
        slot: Slot,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Winner,
    Abandoned,
    Shutdown,
    Crashed,
}

impl EndReason {
    pub fn label(self) -> &'static str {
        match self {
            EndReason::Winner => "winner",
            EndReason::Abandoned => "abandoned",
            EndReason::Shutdown => "shutdown",
            EndReason::Crashed => "crashed",
        }
    }
}

/// Published on the lifecycle broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    MatchCreated {
        match_id: String,
        map_id: String,
    },
    MatchEnded {
        match_id: String,
        winner: Option<Slot>,
        reason: EndReason,
    },
}

/// Admin view of a running match.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub match_id: String,
    pub map_id: String,
    pub players: Vec<Slot>,
    pub started_at: String,
    pub tick: i64,
    pub game_time_seconds: f64,
}

struct MatchHandle {
    tx: mpsc::UnboundedSender<MatchCommand>,
    seats: Vec<(Option<String>, Slot)>,
    map_id: String,
    started_at: chrono::DateTime<chrono::Utc>,
    tick: Arc<AtomicI64>,
}

struct MatchOutcome {
    winner: Option<Slot>,
    reason: EndReason,
    ticks: i64,
}

/// Concurrent map of running matches plus the pool their loops run on.
pub struct MatchManager {
    data: Arc<GameData>,
    clock: TickClock,
    pool: WorkerPool,
    sessions: Arc<SessionRegistry>,
    matches: Arc<DashMap<String, MatchHandle>>,
    lifecycle_tx: broadcast::Sender<LifecycleEvent>,
    seed: Option<u64>,
    created: AtomicU64,
}

impl MatchManager {
    pub fn new(
        data: Arc<GameData>,
        clock: TickClock,
        pool: WorkerPool,
        sessions: Arc<SessionRegistry>,
        seed: Option<u64>,
    ) -> Self {
        let (lifecycle_tx, _) = broadcast::channel(256);
        Self {
            data,
            clock,
            pool,
            sessions,
            matches: Arc::new(DashMap::new()),
            lifecycle_tx,
            seed,
            created: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> TickClock {
        self.clock
    }

    /// Subscribe to match lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn contains(&self, match_id: &str) -> bool {
        self.matches.contains_key(match_id)
    }

    /// Validates the setup, builds the match and starts its loop.
    /// Nothing is registered when any step fails.
    pub fn create_match(&self, setup: MatchSetup) -> Result<String, SetupError> {
        let match_id = setup
            .match_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if self.matches.contains_key(&match_id) {
            return Err(SetupError::MatchExists(match_id));
        }
        if !self.pool.has_capacity() {
            return Err(SetupError::AtCapacity);
        }

        let n = self.created.fetch_add(1, Ordering::Relaxed);
        let seed = self.seed.map(|s| s.wrapping_add(n));
        let game = Game::new(match_id.clone(), &setup, self.data.clone(), self.clock, seed)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let tick = Arc::new(AtomicI64::new(0));
        let handle = MatchHandle {
            tx,
            seats: setup
                .players
                .iter()
                .map(|p| (p.user_id.clone(), p.slot))
                .collect(),
            map_id: setup.map_id.clone(),
            started_at: chrono::Utc::now(),
            tick: tick.clone(),
        };
        match self.matches.entry(match_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(SetupError::MatchExists(match_id));
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(handle);
            }
        }

        let sessions = self.sessions.clone();
        let job_match_id = match_id.clone();
        let job = move || run_match_guarded(game, rx, sessions, tick);

        let matches = self.matches.clone();
        let sessions = self.sessions.clone();
        let lifecycle_tx = self.lifecycle_tx.clone();
        let done_match_id = match_id.clone();
        let map_label = setup.map_id.clone();
        let on_complete = move |outcome: MatchOutcome| {
            on_match_complete(&done_match_id, outcome, &matches, &sessions, &lifecycle_tx);
        };

        if let Err(e) = self
            .pool
            .spawn(format!("match-{job_match_id}"), job, on_complete)
        {
            self.matches.remove(&match_id);
            return Err(e);
        }

        metrics::ACTIVE_MATCHES.inc();
        metrics::MATCHES_STARTED_TOTAL
            .with_label_values(&[map_label.as_str()])
            .inc();
        let _ = self.lifecycle_tx.send(LifecycleEvent::MatchCreated {
            match_id: match_id.clone(),
            map_id: setup.map_id,
        });
        tracing::info!(match_id = %match_id, map_id = %map_label, "Match started");
        Ok(match_id)
    }

    /// Queues a command for the match. False when the match is not running.
    pub fn send(&self, match_id: &str, cmd: MatchCommand) -> bool {
        match self.matches.get(match_id) {
            Some(handle) => handle.tx.send(cmd).is_ok(),
            None => false,
        }
    }

    /// The slot reserved for `user_id` in a running match.
    pub fn seat_for(&self, match_id: &str, user_id: &str) -> Option<Slot> {
        let handle = self.matches.get(match_id)?;
        handle
            .seats
            .iter()
            .find(|(user, _)| user.as_deref() == Some(user_id))
            .map(|(_, slot)| *slot)
    }

    pub fn list(&self) -> Vec<MatchSummary> {
        let mut out: Vec<MatchSummary> = self
            .matches
            .iter()
            .map(|entry| {
                let tick = entry.tick.load(Ordering::Relaxed);
                MatchSummary {
                    match_id: entry.key().clone(),
                    map_id: entry.map_id.clone(),
                    players: entry.seats.iter().map(|(_, s)| *s).collect(),
                    started_at: entry.started_at.to_rfc3339(),
                    tick,
                    game_time_seconds: self.clock.ticks_to_seconds(tick),
                }
            })
            .collect();
        out.sort_by(|a, b| a.match_id.cmp(&b.match_id));
        out
    }

    /// Asks every running match to stop after its current tick.
    pub fn shutdown(&self) {
        for entry in self.matches.iter() {
            let _ = entry.tx.send(MatchCommand::Shutdown);
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn initial_state(game: &Game) -> Message {
    InitialState {
        tick: game.tick,
        entities: game.snapshot().iter().map(EntityState::from).collect(),
    }
    .into()
}

/// Applies one command. Returns false on shutdown.
fn apply_command(game: &mut Game, sessions: &SessionRegistry, cmd: MatchCommand) -> bool {
    match cmd {
        MatchCommand::Move { slot, target } => {
            if !game.order_move(slot, target) {
                tracing::debug!(match_id = %game.match_id, slot, "Move refused");
            }
        }
        MatchCommand::Attack {
            slot,
            attacker,
            target,
        } => match game.order_attack(slot, &attacker, &target) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(match_id = %game.match_id, slot, entity_id = %attacker, "Attack refused");
            }
            Err(e) => {
                tracing::warn!(match_id = %game.match_id, slot, error = %e, "Dropped attack order");
            }
        },
        MatchCommand::StopAttack { slot } => {
            game.order_stop_attack(slot);
        }
        MatchCommand::CastSkill { slot, aim } => {
            if !game.order_skill(slot, aim) {
                tracing::debug!(match_id = %game.match_id, slot, "Skill refused");
            }
        }
        MatchCommand::SpawnTroop { slot, troop_id } => match game.order_troop(slot, troop_id) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(match_id = %game.match_id, slot, troop_id, "Troop refused");
            }
            Err(e) => {
                tracing::warn!(match_id = %game.match_id, slot, error = %e, "Dropped troop order");
            }
        },
        MatchCommand::Join { slot, conn } => {
            game.set_connected(slot, true);
            sessions.send_unicast(conn, &initial_state(game));
            tracing::info!(match_id = %game.match_id, slot, conn_id = conn, "Player joined");
        }
        MatchCommand::PlayerLeft { slot } => {
            game.set_connected(slot, false);
            tracing::info!(match_id = %game.match_id, slot, "Player left");
        }
        MatchCommand::Shutdown => return false,
    }
    true
}

/// The per-match loop: commands, tick, route events, sleep out the interval.
fn run_match(
    mut game: Game,
    mut rx: mpsc::UnboundedReceiver<MatchCommand>,
    sessions: &SessionRegistry,
    tick: &AtomicI64,
) -> MatchOutcome {
    let interval = game.clock.interval();
    let opening = initial_state(&game);
    for conn in sessions.match_connections(&game.match_id) {
        sessions.send_unicast(conn, &opening);
    }

    loop {
        let tick_start = Instant::now();

        loop {
            match rx.try_recv() {
                Ok(cmd) => {
                    if !apply_command(&mut game, sessions, cmd) {
                        return MatchOutcome {
                            winner: None,
                            reason: EndReason::Shutdown,
                            ticks: game.tick,
                        };
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return MatchOutcome {
                        winner: None,
                        reason: EndReason::Shutdown,
                        ticks: game.tick,
                    };
                }
            }
        }

        if game.all_players_left() {
            return MatchOutcome {
                winner: None,
                reason: EndReason::Abandoned,
                ticks: game.tick,
            };
        }

        game.tick();
        metrics::TICK_DURATION_MS.observe(game.last_tick_timings.total_us as f64 / 1000.0);
        tick.store(game.tick, Ordering::Relaxed);

        for (audience, msg) in messages::from_events(game.drain_events(), now_ms()) {
            sessions.route(&game.match_id, audience, &msg);
        }

        if let Some(winner) = game.winner() {
            return MatchOutcome {
                winner: Some(winner),
                reason: EndReason::Winner,
                ticks: game.tick,
            };
        }

        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}

/// Runs the loop inside `catch_unwind` so a panic ends only this match.
fn run_match_guarded(
    game: Game,
    rx: mpsc::UnboundedReceiver<MatchCommand>,
    sessions: Arc<SessionRegistry>,
    tick: Arc<AtomicI64>,
) -> MatchOutcome {
    let match_id = game.match_id.clone();
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        run_match(game, rx, &sessions, &tick)
    }));
    match result {
        Ok(outcome) => outcome,
        Err(panic_info) => {
            let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            tracing::error!(match_id = %match_id, panic = %msg, "Match panicked");
            metrics::MATCHES_ERRORED_TOTAL.inc();
            MatchOutcome {
                winner: None,
                reason: EndReason::Crashed,
                ticks: tick.load(Ordering::Relaxed),
            }
        }
    }
}

fn on_match_complete(
    match_id: &str,
    outcome: MatchOutcome,
    matches: &DashMap<String, MatchHandle>,
    sessions: &SessionRegistry,
    lifecycle_tx: &broadcast::Sender<LifecycleEvent>,
) {
    if let Some((_, handle)) = matches.remove(match_id) {
        metrics::ACTIVE_MATCHES.dec();
        let secs = (chrono::Utc::now() - handle.started_at).num_milliseconds() as f64 / 1000.0;
        metrics::MATCH_DURATION_SECONDS
            .with_label_values(&[outcome.reason.label()])
            .observe(secs.max(0.0));
    }
    metrics::MATCHES_COMPLETED_TOTAL
        .with_label_values(&[outcome.reason.label()])
        .inc();

    for conn in sessions.match_connections(match_id) {
        sessions.unbind_match(conn);
    }

    tracing::info!(
        match_id,
        winner = ?outcome.winner,
        reason = outcome.reason.label(),
        ticks = outcome.ticks,
        "Match ended"
    );
    let _ = lifecycle_tx.send(LifecycleEvent::MatchEnded {
        match_id: match_id.to_string(),
        winner: outcome.winner,
        reason: outcome.reason,
    });
}

/// Waits up to `timeout` for the `MatchEnded` event of `match_id`.
pub async fn wait_for_end(
    rx: &mut broadcast::Receiver<LifecycleEvent>,
    match_id: &str,
    timeout: Duration,
) -> Option<LifecycleEvent> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let event = tokio::time::timeout_at(deadline, rx.recv()).await.ok()?;
        match event {
            Ok(ev) => {
                if let LifecycleEvent::MatchEnded { match_id: id, .. } = &ev {
                    if id == match_id {
                        return Some(ev);
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::ChampionKind;
    use crate::engine::game::PlayerSeat;

    fn manager(capacity: usize) -> MatchManager {
        MatchManager::new(
            Arc::new(GameData::builtin()),
            TickClock::default(),
            WorkerPool::new(capacity),
            Arc::new(SessionRegistry::new()),
            Some(3),
        )
    }

    fn setup(id: &str) -> MatchSetup {
        MatchSetup {
            match_id: Some(id.to_string()),
            map_id: "arena".into(),
            players: vec![
                PlayerSeat {
                    slot: 0,
                    user_id: Some("alice".into()),
                    champion: ChampionKind::MeleeAxe,
                },
                PlayerSeat {
                    slot: 1,
                    user_id: Some("bob".into()),
                    champion: ChampionKind::MarksmanCrossbow,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_create_list_and_seats() {
        let m = manager(2);
        let id = m.create_match(setup("m-1")).unwrap();
        assert_eq!(id, "m-1");
        assert!(m.contains("m-1"));
        assert_eq!(m.seat_for("m-1", "bob"), Some(1));
        assert_eq!(m.seat_for("m-1", "carol"), None);
        assert_eq!(m.seat_for("other", "bob"), None);

        let list = m.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].map_id, "arena");
        assert_eq!(list[0].players, vec![0, 1]);
        m.shutdown();
    }

    #[tokio::test]
    async fn test_duplicate_and_capacity() {
        let m = manager(1);
        m.create_match(setup("dup")).unwrap();
        assert!(matches!(
            m.create_match(setup("dup")),
            Err(SetupError::MatchExists(_))
        ));
        assert!(matches!(
            m.create_match(setup("other")),
            Err(SetupError::AtCapacity)
        ));
        assert!(!m.contains("other"));
        m.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_setup_leaves_no_trace() {
        let m = manager(2);
        let mut bad = setup("bad");
        bad.map_id = "nowhere".into();
        assert!(matches!(
            m.create_match(bad),
            Err(SetupError::UnknownMap(_))
        ));
        assert!(m.is_empty());
        assert!(!m.send("bad", MatchCommand::Shutdown));
    }

    #[tokio::test]
    async fn test_shutdown_publishes_match_ended() {
        let m = manager(2);
        let mut rx = m.subscribe();
        let id = m.create_match(setup("stop")).unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            LifecycleEvent::MatchCreated { .. }
        ));
        assert!(m.send(&id, MatchCommand::Shutdown));

        let ended = wait_for_end(&mut rx, &id, Duration::from_secs(5)).await;
        assert_eq!(
            ended,
            Some(LifecycleEvent::MatchEnded {
                match_id: id.clone(),
                winner: None,
                reason: EndReason::Shutdown,
            })
        );
        assert!(!m.contains(&id));
    }

    #[tokio::test]
    async fn test_abandoned_when_everyone_leaves() {
        let m = manager(2);
        let mut rx = m.subscribe();
        let id = m.create_match(setup("leave")).unwrap();
        m.send(&id, MatchCommand::Join { slot: 0, conn: 99 });
        m.send(&id, MatchCommand::PlayerLeft { slot: 0 });

        match wait_for_end(&mut rx, &id, Duration::from_secs(5)).await {
            Some(LifecycleEvent::MatchEnded { reason, .. }) => {
                assert_eq!(reason, EndReason::Abandoned)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_apply_command_join_sends_state() {
        let sessions = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = sessions.register(tx);
        let mut game = Game::new(
            "g".into(),
            &setup("g"),
            Arc::new(GameData::builtin()),
            TickClock::default(),
            Some(1),
        )
        .unwrap();

        assert!(apply_command(&mut game, &sessions, MatchCommand::Join { slot: 0, conn }));
        assert!(game.slot(0).unwrap().connected);
        assert!(rx.try_recv().is_ok());
        assert!(!apply_command(&mut game, &sessions, MatchCommand::Shutdown));
    }
}
