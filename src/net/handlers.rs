// Inbound message handlers and their startup registration list.

use std::sync::Arc;

use super::dispatcher::{Dispatcher, Handler, HandlerContext, Requirement};
use super::messages::*;
use super::session::{ConnId, SessionRegistry};
use crate::auth::TokenVerifier;
use crate::engine::catalog::{ChampionKind, Slot};
use crate::engine::config::NO_SLOT;
use crate::engine::entity::EntityId;
use crate::engine::game::{MatchSetup, PlayerSeat};
use crate::engine::geometry::Vector2;
use crate::engine::server::{MatchCommand, MatchManager};
use crate::error::{RegistryError, ValidationError};

/// Map used by the local-mode quick start.
pub const TEST_GAME_MAP: &str = "arena";

/// Shared services handlers act on.
pub struct Services {
    pub sessions: Arc<SessionRegistry>,
    pub matches: Arc<MatchManager>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub local_mode: bool,
}

type Reply = Result<Option<Message>, ValidationError>;

/// Builds the dispatcher with every inbound handler.
pub fn register_all() -> Result<Dispatcher, RegistryError> {
    let mut d = Dispatcher::new();
    d.on::<Authenticate>(AuthenticateHandler)?;
    d.on::<Ping>(PingHandler)?;
    d.on::<MoveRequest>(MoveHandler)?;
    d.on::<SkillCast>(SkillCastHandler)?;
    d.on::<AttackRequest>(AttackHandler)?;
    d.on::<StopAttack>(StopAttackHandler)?;
    d.on::<TroopSpawnRequest>(TroopSpawnHandler)?;
    d.on::<TestGameStart>(TestGameStartHandler)?;
    Ok(d)
}

/// Checks the slot a client claims against the one bound to its session.
fn claimed_slot<'a>(
    ctx: &'a HandlerContext<'_>,
    claimed: Slot,
) -> Result<(&'a str, Slot), ValidationError> {
    let (match_id, actual) = ctx.seat()?;
    if claimed != actual {
        return Err(ValidationError::SlotMismatch { claimed, actual });
    }
    Ok((match_id, actual))
}

fn forward(ctx: &HandlerContext<'_>, match_id: &str, cmd: MatchCommand) -> Reply {
    if !ctx.services.matches.send(match_id, cmd) {
        return Err(ValidationError::MatchUnavailable(match_id.to_string()));
    }
    Ok(None)
}

/// Binds `conn` to a seat and tells the match. A match that ended after the
/// seat lookup leaves the connection unbound.
fn join_match(services: &Services, conn: ConnId, match_id: &str, slot: Slot) -> bool {
    services.sessions.bind_match(conn, match_id, slot);
    if services.matches.send(match_id, MatchCommand::Join { slot, conn }) {
        return true;
    }
    services.sessions.unbind_match(conn);
    tracing::warn!(conn_id = conn, match_id, slot, "Match ended before join");
    false
}

fn auth_result(success: bool, slot: Slot, message: impl Into<String>) -> Option<Message> {
    Some(
        AuthenticationResult {
            success,
            slot,
            message: message.into(),
        }
        .into(),
    )
}

pub struct AuthenticateHandler;

impl Handler for AuthenticateHandler {
    fn requires(&self) -> &'static [Requirement] {
        &[Requirement::Connection]
    }

    fn handle(&self, msg: &Message, ctx: &HandlerContext<'_>) -> Reply {
        let Message::Authenticate(auth) = msg else {
            return Ok(None);
        };
        let conn = ctx.conn()?;
        let services = ctx.services;

        let user_id = match services.verifier.verify(&auth.token) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(conn_id = conn, error = %e, "Authentication failed");
                return Ok(auth_result(false, NO_SLOT, "invalid token"));
            }
        };

        let seat = if auth.game_id.is_empty() {
            None
        } else {
            match services.matches.seat_for(&auth.game_id, &user_id) {
                Some(slot) => Some(slot),
                None => {
                    tracing::warn!(conn_id = conn, user_id = %user_id, game_id = %auth.game_id, "No seat for user");
                    return Ok(auth_result(false, NO_SLOT, "not seated in this match"));
                }
            }
        };

        if let Some(previous) = services.sessions.bind_user(conn, &user_id) {
            tracing::info!(conn_id = conn, previous, user_id = %user_id, "User reconnected");
            services.sessions.unbind_match(previous);
        }

        let Some(slot) = seat else {
            tracing::info!(conn_id = conn, user_id = %user_id, "Connection authenticated");
            return Ok(auth_result(true, NO_SLOT, "authenticated"));
        };
        if !join_match(services, conn, &auth.game_id, slot) {
            return Ok(auth_result(false, NO_SLOT, "match is no longer running"));
        }
        tracing::info!(conn_id = conn, user_id = %user_id, match_id = %auth.game_id, slot, "Player joined match");
        Ok(auth_result(true, slot, "authenticated"))
    }
}

pub struct PingHandler;

impl Handler for PingHandler {
    fn requires(&self) -> &'static [Requirement] {
        &[Requirement::Connection]
    }

    fn handle(&self, msg: &Message, _ctx: &HandlerContext<'_>) -> Reply {
        let Message::Ping(ping) = msg else {
            return Ok(None);
        };
        Ok(Some(
            Pong {
                client_ts: ping.timestamp,
                server_ts: chrono::Utc::now().timestamp_millis(),
            }
            .into(),
        ))
    }
}

const SEATED: &[Requirement] = &[Requirement::User, Requirement::Slot];

pub struct MoveHandler;

impl Handler for MoveHandler {
    fn requires(&self) -> &'static [Requirement] {
        SEATED
    }

    fn handle(&self, msg: &Message, ctx: &HandlerContext<'_>) -> Reply {
        let Message::MoveRequest(m) = msg else {
            return Ok(None);
        };
        let (match_id, slot) = claimed_slot(ctx, m.slot)?;
        let target = Vector2::new(m.x, m.y);
        forward(ctx, match_id, MatchCommand::Move { slot, target })
    }
}

pub struct SkillCastHandler;

impl Handler for SkillCastHandler {
    fn requires(&self) -> &'static [Requirement] {
        SEATED
    }

    fn handle(&self, msg: &Message, ctx: &HandlerContext<'_>) -> Reply {
        let Message::SkillCast(m) = msg else {
            return Ok(None);
        };
        let (match_id, slot) = claimed_slot(ctx, m.slot)?;
        let aim = Vector2::new(m.x, m.y);
        forward(ctx, match_id, MatchCommand::CastSkill { slot, aim })
    }
}

/// Ownership of the attacker is checked by the match thread.
pub struct AttackHandler;

impl Handler for AttackHandler {
    fn requires(&self) -> &'static [Requirement] {
        SEATED
    }

    fn handle(&self, msg: &Message, ctx: &HandlerContext<'_>) -> Reply {
        let Message::AttackRequest(m) = msg else {
            return Ok(None);
        };
        let (match_id, slot) = ctx.seat()?;
        forward(
            ctx,
            match_id,
            MatchCommand::Attack {
                slot,
                attacker: EntityId(m.attacker_id.clone()),
                target: EntityId(m.target_id.clone()),
            },
        )
    }
}

pub struct StopAttackHandler;

impl Handler for StopAttackHandler {
    fn requires(&self) -> &'static [Requirement] {
        SEATED
    }

    fn handle(&self, msg: &Message, ctx: &HandlerContext<'_>) -> Reply {
        let Message::StopAttack(m) = msg else {
            return Ok(None);
        };
        let (match_id, slot) = claimed_slot(ctx, m.slot)?;
        forward(ctx, match_id, MatchCommand::StopAttack { slot })
    }
}

pub struct TroopSpawnHandler;

impl Handler for TroopSpawnHandler {
    fn requires(&self) -> &'static [Requirement] {
        SEATED
    }

    fn handle(&self, msg: &Message, ctx: &HandlerContext<'_>) -> Reply {
        let Message::TroopSpawnRequest(m) = msg else {
            return Ok(None);
        };
        let (match_id, slot) = claimed_slot(ctx, m.slot)?;
        forward(
            ctx,
            match_id,
            MatchCommand::SpawnTroop {
                slot,
                troop_id: m.troop_id,
            },
        )
    }
}

/// Local mode: starts a match on the built-in map with the sender in slot 0.
pub struct TestGameStartHandler;

impl Handler for TestGameStartHandler {
    fn requires(&self) -> &'static [Requirement] {
        &[Requirement::Connection, Requirement::User]
    }

    fn handle(&self, msg: &Message, ctx: &HandlerContext<'_>) -> Reply {
        let Message::TestGameStart(m) = msg else {
            return Ok(None);
        };
        let services = ctx.services;
        if !services.local_mode {
            return Err(ValidationError::LocalModeOnly);
        }
        let conn = ctx.conn()?;
        let user_id = ctx.user()?;
        let champion =
            ChampionKind::from_code(m.champion).ok_or(ValidationError::UnknownChampion(m.champion))?;

        let setup = MatchSetup {
            match_id: (!m.game_id.is_empty()).then(|| m.game_id.clone()),
            map_id: TEST_GAME_MAP.to_string(),
            players: vec![
                PlayerSeat {
                    slot: 0,
                    user_id: Some(user_id.to_string()),
                    champion,
                },
                PlayerSeat {
                    slot: 1,
                    user_id: None,
                    champion: ChampionKind::MeleeAxe,
                },
            ],
        };
        let match_id = services
            .matches
            .create_match(setup)
            .map_err(|e| ValidationError::MatchUnavailable(e.to_string()))?;

        if !join_match(services, conn, &match_id, 0) {
            return Err(ValidationError::MatchUnavailable(match_id));
        }
        tracing::info!(conn_id = conn, user_id = %user_id, match_id, "Test match started");
        Ok(auth_result(true, 0, match_id))
    }
}
