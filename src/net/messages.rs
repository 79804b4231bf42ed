// Every message type on the socket, with its payload layout and routing target.

use bytes::{BufMut, Bytes, BytesMut};

use super::codec;
use super::wire::{put_bool, put_count, put_str, put_str32, WireReader};
use crate::engine::events::{Audience, GameEvent, TickEvent};
use crate::engine::game::EntitySnapshot;
use crate::error::ProtocolError;

/// Where an outbound message is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// The one connection that caused it, or the player it concerns.
    Unicast,
    /// Every connection bound to the match.
    Match,
    /// Every open connection.
    Global,
}

impl Routing {
    pub fn label(self) -> &'static str {
        match self {
            Routing::Unicast => "unicast",
            Routing::Match => "match",
            Routing::Global => "global",
        }
    }
}

/// A message with a fixed type tag and payload layout.
pub trait WireMessage: Sized {
    const TYPE: i16;
    const ROUTING: Routing;

    fn encode_payload(&self, buf: &mut BytesMut);
    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError>;
}

pub type Decoder = fn(&mut WireReader<'_>) -> Result<Message, ProtocolError>;

pub fn decode_as<T>(r: &mut WireReader<'_>) -> Result<Message, ProtocolError>
where
    T: WireMessage + Into<Message>,
{
    T::decode_payload(r).map(Into::into)
}

macro_rules! protocol {
    ($($name:ident),* $(,)?) => {
        /// Any decoded or outbound message.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $($name($name),)*
        }

        impl Message {
            pub fn msg_type(&self) -> i16 {
                match self {
                    $(Message::$name(_) => <$name as WireMessage>::TYPE,)*
                }
            }

            pub fn routing(&self) -> Routing {
                match self {
                    $(Message::$name(_) => <$name as WireMessage>::ROUTING,)*
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(Message::$name(_) => stringify!($name),)*
                }
            }

            pub fn encode_payload(&self, buf: &mut BytesMut) {
                match self {
                    $(Message::$name(m) => m.encode_payload(buf),)*
                }
            }
        }

        $(
            impl From<$name> for Message {
                fn from(m: $name) -> Self {
                    Message::$name(m)
                }
            }
        )*

        /// `(type, name, decoder)` for every message, used to fill the type registry.
        pub fn all_message_types() -> Vec<(i16, &'static str, Decoder)> {
            vec![
                $((<$name as WireMessage>::TYPE, stringify!($name), decode_as::<$name> as Decoder),)*
            ]
        }
    };
}

protocol! {
    Authenticate,
    Ping,
    MoveRequest,
    SkillCast,
    AttackRequest,
    StopAttack,
    TroopSpawnRequest,
    TestGameStart,
    ErrorMessage,
    AuthenticationResult,
    Pong,
    InitialState,
    PositionUpdate,
    CastSkill,
    GoldUpdate,
    InPlayground,
    GoldMineSpawn,
    ChampionRespawnTime,
    ChampionRespawn,
    GameOver,
    SlotEliminated,
    AttackAnimation,
    HealthUpdate,
    EntityDeath,
    EntitiesRemoved,
    TroopSpawned,
    ServerNotice,
}

impl Message {
    /// Full frame: header plus payload.
    pub fn encode(&self) -> Bytes {
        let mut payload = BytesMut::new();
        self.encode_payload(&mut payload);
        codec::encode_frame(self.msg_type(), &payload)
    }
}

/// Error codes carried by [`ErrorMessage`].
pub mod error_code {
    pub const PROTOCOL: i16 = 1;
    pub const UNREGISTERED: i16 = 2;
    pub const NOT_AUTHENTICATED: i16 = 3;
}

// ── Client → server ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Authenticate {
    pub token: String,
    pub game_id: String,
}

impl WireMessage for Authenticate {
    const TYPE: i16 = 1;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str32(buf, &self.token);
        put_str32(buf, &self.game_id);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            token: r.str32()?,
            game_id: r.str32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ping {
    pub timestamp: i64,
}

impl WireMessage for Ping {
    const TYPE: i16 = -3;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveRequest {
    pub slot: i16,
    pub x: f32,
    pub y: f32,
    pub timestamp: i64,
}

impl WireMessage for MoveRequest {
    const TYPE: i16 = 19;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.slot);
        buf.put_f32(self.x);
        buf.put_f32(self.y);
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.i16()?,
            x: r.f32()?,
            y: r.f32()?,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillCast {
    pub slot: i16,
    pub x: f32,
    pub y: f32,
    pub timestamp: i64,
}

impl WireMessage for SkillCast {
    const TYPE: i16 = 24;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.slot);
        buf.put_f32(self.x);
        buf.put_f32(self.y);
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.i16()?,
            x: r.f32()?,
            y: r.f32()?,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttackRequest {
    pub attacker_id: String,
    pub target_id: String,
    pub timestamp: i64,
}

impl WireMessage for AttackRequest {
    const TYPE: i16 = 100;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str(buf, &self.attacker_id);
        put_str(buf, &self.target_id);
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            attacker_id: r.str()?,
            target_id: r.str()?,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopAttack {
    pub slot: i16,
    pub timestamp: i64,
}

impl WireMessage for StopAttack {
    const TYPE: i16 = 101;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.slot);
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.i16()?,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TroopSpawnRequest {
    pub troop_id: i16,
    pub slot: i16,
    pub timestamp: i64,
}

impl WireMessage for TroopSpawnRequest {
    const TYPE: i16 = 200;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.troop_id);
        buf.put_i16(self.slot);
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            troop_id: r.i16()?,
            slot: r.i16()?,
            timestamp: r.i64()?,
        })
    }
}

/// Local-mode shortcut that starts a match against an empty seat.
#[derive(Debug, Clone, PartialEq)]
pub struct TestGameStart {
    pub game_id: String,
    pub champion: u8,
}

impl WireMessage for TestGameStart {
    const TYPE: i16 = 2025;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str(buf, &self.game_id);
        buf.put_u8(self.champion);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            game_id: r.str()?,
            champion: r.u8()?,
        })
    }
}

// ── Server → client ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub code: i16,
    pub message: String,
}

impl WireMessage for ErrorMessage {
    const TYPE: i16 = 0;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.code);
        put_str(buf, &self.message);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            code: r.i16()?,
            message: r.str()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationResult {
    pub success: bool,
    pub slot: i16,
    pub message: String,
}

impl WireMessage for AuthenticationResult {
    const TYPE: i16 = 2;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_bool(buf, self.success);
        buf.put_i16(self.slot);
        put_str(buf, &self.message);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            success: r.bool()?,
            slot: r.i16()?,
            message: r.str()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pong {
    pub client_ts: i64,
    pub server_ts: i64,
}

impl WireMessage for Pong {
    const TYPE: i16 = -4;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i64(self.client_ts);
        buf.put_i64(self.server_ts);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            client_ts: r.i64()?,
            server_ts: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub id: String,
    pub kind: u8,
    pub slot: i16,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub max_hp: i32,
}

impl From<&EntitySnapshot> for EntityState {
    fn from(s: &EntitySnapshot) -> Self {
        Self {
            id: s.id.to_string(),
            kind: s.kind,
            slot: s.slot,
            x: s.position.x,
            y: s.position.y,
            hp: s.hp,
            max_hp: s.max_hp,
        }
    }
}

/// Full entity listing sent when a player joins.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialState {
    pub tick: i64,
    pub entities: Vec<EntityState>,
}

impl WireMessage for InitialState {
    const TYPE: i16 = 11;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i64(self.tick);
        let n = put_count(buf, self.entities.len());
        for e in &self.entities[..n] {
            put_str(buf, &e.id);
            buf.put_u8(e.kind);
            buf.put_i16(e.slot);
            buf.put_f32(e.x);
            buf.put_f32(e.y);
            buf.put_i32(e.hp);
            buf.put_i32(e.max_hp);
        }
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let tick = r.i64()?;
        let n = r.count()?;
        let mut entities = Vec::with_capacity(n);
        for _ in 0..n {
            entities.push(EntityState {
                id: r.str()?,
                kind: r.u8()?,
                slot: r.i16()?,
                x: r.f32()?,
                y: r.f32()?,
                hp: r.i32()?,
                max_hp: r.i32()?,
            });
        }
        Ok(Self { tick, entities })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionEntry {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub speed: f32,
}

/// All position changes of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub positions: Vec<PositionEntry>,
    pub timestamp: i64,
}

impl WireMessage for PositionUpdate {
    const TYPE: i16 = 20;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        let n = put_count(buf, self.positions.len());
        for p in &self.positions[..n] {
            put_str(buf, &p.id);
            buf.put_f32(p.x);
            buf.put_f32(p.y);
            buf.put_f32(p.speed);
        }
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let n = r.count()?;
        let mut positions = Vec::with_capacity(n);
        for _ in 0..n {
            positions.push(PositionEntry {
                id: r.str()?,
                x: r.f32()?,
                y: r.f32()?,
                speed: r.f32()?,
            });
        }
        Ok(Self {
            positions,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastSkill {
    pub caster_id: String,
    pub x: f32,
    pub y: f32,
    pub skill_length: f32,
    pub timestamp: i64,
}

impl WireMessage for CastSkill {
    const TYPE: i16 = 25;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str(buf, &self.caster_id);
        buf.put_f32(self.x);
        buf.put_f32(self.y);
        buf.put_f32(self.skill_length);
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            caster_id: r.str()?,
            x: r.f32()?,
            y: r.f32()?,
            skill_length: r.f32()?,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoldUpdate {
    pub slot: i16,
    pub gold: i32,
}

impl WireMessage for GoldUpdate {
    const TYPE: i16 = 30;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.slot);
        buf.put_i32(self.gold);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.i16()?,
            gold: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InPlayground {
    pub slot: i16,
    pub inside: bool,
}

impl WireMessage for InPlayground {
    const TYPE: i16 = 31;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.slot);
        put_bool(buf, self.inside);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.i16()?,
            inside: r.bool()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoldMineSpawn {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub is_small: bool,
    pub hp: i32,
}

impl WireMessage for GoldMineSpawn {
    const TYPE: i16 = 32;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str(buf, &self.id);
        buf.put_f32(self.x);
        buf.put_f32(self.y);
        put_bool(buf, self.is_small);
        buf.put_i32(self.hp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: r.str()?,
            x: r.f32()?,
            y: r.f32()?,
            is_small: r.bool()?,
            hp: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChampionRespawnTime {
    pub seconds: i16,
}

impl WireMessage for ChampionRespawnTime {
    const TYPE: i16 = 40;
    const ROUTING: Routing = Routing::Unicast;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.seconds);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            seconds: r.i16()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChampionRespawn {
    pub slot: i16,
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
}

impl WireMessage for ChampionRespawn {
    const TYPE: i16 = 41;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.slot);
        put_str(buf, &self.id);
        buf.put_f32(self.x);
        buf.put_f32(self.y);
        buf.put_i32(self.hp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: r.i16()?,
            id: r.str()?,
            x: r.f32()?,
            y: r.f32()?,
            hp: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameOver {
    pub winner_slot: i16,
}

impl WireMessage for GameOver {
    const TYPE: i16 = 50;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.winner_slot);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            winner_slot: r.i16()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotEliminated {
    pub slot: i16,
}

impl WireMessage for SlotEliminated {
    const TYPE: i16 = 51;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_i16(self.slot);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { slot: r.i16()? })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttackAnimation {
    pub attacker_id: String,
    pub target_id: String,
    pub attack_speed: f32,
    pub timestamp: i64,
}

impl WireMessage for AttackAnimation {
    const TYPE: i16 = 104;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str(buf, &self.attacker_id);
        put_str(buf, &self.target_id);
        buf.put_f32(self.attack_speed);
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            attacker_id: r.str()?,
            target_id: r.str()?,
            attack_speed: r.f32()?,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthUpdate {
    pub target_id: String,
    pub current: i32,
    pub max: i32,
    pub damage: i32,
    pub timestamp: i64,
}

impl WireMessage for HealthUpdate {
    const TYPE: i16 = 105;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str(buf, &self.target_id);
        buf.put_i32(self.current);
        buf.put_i32(self.max);
        buf.put_i32(self.damage);
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            target_id: r.str()?,
            current: r.i32()?,
            max: r.i32()?,
            damage: r.i32()?,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDeath {
    pub id: String,
    pub timestamp: i64,
}

impl WireMessage for EntityDeath {
    const TYPE: i16 = 106;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str(buf, &self.id);
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: r.str()?,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitiesRemoved {
    pub ids: Vec<String>,
    pub timestamp: i64,
}

impl WireMessage for EntitiesRemoved {
    const TYPE: i16 = 107;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        let n = put_count(buf, self.ids.len());
        for id in &self.ids[..n] {
            put_str(buf, id);
        }
        buf.put_i64(self.timestamp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let n = r.count()?;
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            ids.push(r.str()?);
        }
        Ok(Self {
            ids,
            timestamp: r.i64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TroopSpawned {
    pub id: String,
    pub troop_id: i16,
    pub slot: i16,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
}

impl WireMessage for TroopSpawned {
    const TYPE: i16 = 201;
    const ROUTING: Routing = Routing::Match;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str(buf, &self.id);
        buf.put_i16(self.troop_id);
        buf.put_i16(self.slot);
        buf.put_f32(self.x);
        buf.put_f32(self.y);
        buf.put_i32(self.hp);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: r.str()?,
            troop_id: r.i16()?,
            slot: r.i16()?,
            x: r.f32()?,
            y: r.f32()?,
            hp: r.i32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerNotice {
    pub message: String,
}

impl WireMessage for ServerNotice {
    const TYPE: i16 = 900;
    const ROUTING: Routing = Routing::Global;

    fn encode_payload(&self, buf: &mut BytesMut) {
        put_str(buf, &self.message);
    }

    fn decode_payload(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            message: r.str()?,
        })
    }
}

// ── Engine events → messages ─────────────────────────────────────────

/// Converts one batch of tick events into outbound messages.
///
/// Position changes of the same tick collapse into a single [`PositionUpdate`],
/// emitted at the position of the first one.
pub fn from_events(events: Vec<TickEvent>, timestamp: i64) -> Vec<(Audience, Message)> {
    let mut out: Vec<(Audience, Message)> = Vec::with_capacity(events.len());
    let mut batch: Option<(i64, usize)> = None;

    for TickEvent { tick, event } in events {
        let audience = event.audience();
        let msg: Message = match event {
            GameEvent::PositionChanged { id, position, speed } => {
                let entry = PositionEntry {
                    id: id.0,
                    x: position.x,
                    y: position.y,
                    speed,
                };
                if let Some((batch_tick, idx)) = batch {
                    if batch_tick == tick {
                        if let Some((_, Message::PositionUpdate(update))) = out.get_mut(idx) {
                            update.positions.push(entry);
                            continue;
                        }
                    }
                }
                batch = Some((tick, out.len()));
                PositionUpdate {
                    positions: vec![entry],
                    timestamp,
                }
                .into()
            }
            GameEvent::AttackAnimation {
                attacker,
                target,
                attack_speed,
            } => AttackAnimation {
                attacker_id: attacker.0,
                target_id: target.0,
                attack_speed,
                timestamp,
            }
            .into(),
            GameEvent::HealthChanged {
                target,
                current,
                max,
                damage,
            } => HealthUpdate {
                target_id: target.0,
                current,
                max,
                damage,
                timestamp,
            }
            .into(),
            GameEvent::EntityDied { id } => EntityDeath { id: id.0, timestamp }.into(),
            GameEvent::EntitiesRemoved { ids } => EntitiesRemoved {
                ids: ids.into_iter().map(|i| i.0).collect(),
                timestamp,
            }
            .into(),
            GameEvent::SkillCast {
                caster,
                aim,
                skill_length,
            } => CastSkill {
                caster_id: caster.0,
                x: aim.x,
                y: aim.y,
                skill_length,
                timestamp,
            }
            .into(),
            GameEvent::GoldChanged { slot, gold } => GoldUpdate { slot, gold }.into(),
            GameEvent::PlaygroundChanged { slot, inside } => InPlayground { slot, inside }.into(),
            GameEvent::GoldMineSpawned {
                id,
                position,
                is_small,
                hp,
            } => GoldMineSpawn {
                id: id.0,
                x: position.x,
                y: position.y,
                is_small,
                hp,
            }
            .into(),
            GameEvent::RespawnScheduled { seconds, .. } => ChampionRespawnTime { seconds }.into(),
            GameEvent::ChampionRespawned {
                slot,
                id,
                position,
                hp,
            } => ChampionRespawn {
                slot,
                id: id.0,
                x: position.x,
                y: position.y,
                hp,
            }
            .into(),
            GameEvent::TroopSpawned {
                id,
                troop_id,
                slot,
                position,
                hp,
            } => TroopSpawned {
                id: id.0,
                troop_id,
                slot,
                x: position.x,
                y: position.y,
                hp,
            }
            .into(),
            GameEvent::SlotEliminated { slot } => SlotEliminated { slot }.into(),
            GameEvent::GameOver { winner } => GameOver {
                winner_slot: winner,
            }
            .into(),
        };
        out.push((audience, msg));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::entity::EntityId;
    use crate::engine::geometry::Vector2;

    fn roundtrip(msg: Message) -> Message {
        let frame = msg.encode();
        let mut buf = BytesMut::from(&frame[..]);
        let frame = codec::try_decode_frame(&mut buf).unwrap().unwrap();
        let (_, _, decode) = all_message_types()
            .into_iter()
            .find(|(t, _, _)| *t == frame.msg_type)
            .unwrap();
        let mut r = WireReader::new(frame.msg_type, &frame.payload);
        let decoded = decode(&mut r).unwrap();
        assert_eq!(r.remaining(), 0);
        decoded
    }

    /// Field values for one instance of every message type.
    struct Fill {
        text: String,
        small: i16,
        int: i32,
        long: i64,
        float: f32,
        flag: bool,
        byte: u8,
        items: usize,
    }

    fn every_message(f: &Fill) -> Vec<Message> {
        let s = || f.text.clone();
        vec![
            Authenticate { token: s(), game_id: s() }.into(),
            Ping { timestamp: f.long }.into(),
            MoveRequest { slot: f.small, x: f.float, y: -f.float, timestamp: f.long }.into(),
            SkillCast { slot: f.small, x: f.float, y: f.float, timestamp: f.long }.into(),
            AttackRequest { attacker_id: s(), target_id: s(), timestamp: f.long }.into(),
            StopAttack { slot: f.small, timestamp: f.long }.into(),
            TroopSpawnRequest { troop_id: f.small, slot: f.small, timestamp: f.long }.into(),
            TestGameStart { game_id: s(), champion: f.byte }.into(),
            ErrorMessage { code: f.small, message: s() }.into(),
            AuthenticationResult { success: f.flag, slot: f.small, message: s() }.into(),
            Pong { client_ts: f.long, server_ts: f.long }.into(),
            InitialState {
                tick: f.long,
                entities: (0..f.items)
                    .map(|_| EntityState {
                        id: s(),
                        kind: f.byte,
                        slot: f.small,
                        x: f.float,
                        y: f.float,
                        hp: f.int,
                        max_hp: f.int,
                    })
                    .collect(),
            }
            .into(),
            PositionUpdate {
                positions: (0..f.items)
                    .map(|_| PositionEntry { id: s(), x: f.float, y: f.float, speed: f.float })
                    .collect(),
                timestamp: f.long,
            }
            .into(),
            CastSkill { caster_id: s(), x: f.float, y: f.float, skill_length: f.float, timestamp: f.long }
                .into(),
            GoldUpdate { slot: f.small, gold: f.int }.into(),
            InPlayground { slot: f.small, inside: f.flag }.into(),
            GoldMineSpawn { id: s(), x: f.float, y: f.float, is_small: f.flag, hp: f.int }.into(),
            ChampionRespawnTime { seconds: f.small }.into(),
            ChampionRespawn { slot: f.small, id: s(), x: f.float, y: f.float, hp: f.int }.into(),
            GameOver { winner_slot: f.small }.into(),
            SlotEliminated { slot: f.small }.into(),
            AttackAnimation { attacker_id: s(), target_id: s(), attack_speed: f.float, timestamp: f.long }
                .into(),
            HealthUpdate { target_id: s(), current: f.int, max: f.int, damage: f.int, timestamp: f.long }
                .into(),
            EntityDeath { id: s(), timestamp: f.long }.into(),
            EntitiesRemoved { ids: (0..f.items).map(|_| s()).collect(), timestamp: f.long }.into(),
            TroopSpawned { id: s(), troop_id: f.small, slot: f.small, x: f.float, y: f.float, hp: f.int }
                .into(),
            ServerNotice { message: s() }.into(),
        ]
    }

    #[test]
    fn test_every_type_roundtrips_at_field_extremes() {
        let minimal = Fill {
            text: String::new(),
            small: i16::MIN,
            int: i32::MIN,
            long: i64::MIN,
            float: f32::MIN,
            flag: false,
            byte: u8::MIN,
            items: 0,
        };
        let maximal = Fill {
            text: "é ✓ 地图".repeat(200),
            small: i16::MAX,
            int: i32::MAX,
            long: i64::MAX,
            float: f32::MAX,
            flag: true,
            byte: u8::MAX,
            items: 50,
        };

        for fill in [&minimal, &maximal] {
            let messages = every_message(fill);
            let mut covered: Vec<i16> = messages.iter().map(Message::msg_type).collect();
            covered.sort();
            let mut registered: Vec<i16> = all_message_types().iter().map(|(t, _, _)| *t).collect();
            registered.sort();
            assert_eq!(covered, registered);

            for msg in messages {
                assert_eq!(roundtrip(msg.clone()), msg, "{} did not round-trip", msg.name());
            }
        }
    }

    #[test]
    fn test_type_tags_are_unique() {
        let mut types: Vec<i16> = all_message_types().iter().map(|(t, _, _)| *t).collect();
        let n = types.len();
        types.sort();
        types.dedup();
        assert_eq!(types.len(), n);
        assert_eq!(n, 27);
    }

    #[test]
    fn test_routing_targets() {
        assert_eq!(Message::from(GoldUpdate { slot: 0, gold: 1 }).routing(), Routing::Unicast);
        assert_eq!(Message::from(GameOver { winner_slot: 1 }).routing(), Routing::Match);
        assert_eq!(
            Message::from(ServerNotice {
                message: "hi".into()
            })
            .routing(),
            Routing::Global
        );
    }

    #[test]
    fn test_collections_roundtrip_empty_and_filled() {
        let empty = Message::from(EntitiesRemoved {
            ids: vec![],
            timestamp: 0,
        });
        assert_eq!(roundtrip(empty.clone()), empty);

        let state = Message::from(InitialState {
            tick: i64::MAX,
            entities: vec![EntityState {
                id: "champion_0".into(),
                kind: 0,
                slot: 0,
                x: -1.5,
                y: 40.0,
                hp: 1200,
                max_hp: 1200,
            }],
        });
        assert_eq!(roundtrip(state.clone()), state);
    }

    #[test]
    fn test_inbound_layouts() {
        let auth = Message::from(Authenticate {
            token: "t".repeat(300),
            game_id: String::new(),
        });
        assert_eq!(roundtrip(auth.clone()), auth);

        let attack = Message::from(AttackRequest {
            attacker_id: "champion_0".into(),
            target_id: "gold_mine_2".into(),
            timestamp: 1_700_000_000_000,
        });
        assert_eq!(roundtrip(attack.clone()), attack);
    }

    #[test]
    fn test_position_changes_batch_per_tick() {
        let pos = |id: &str, tick| TickEvent {
            tick,
            event: GameEvent::PositionChanged {
                id: EntityId::from(id),
                position: Vector2::new(1.0, 2.0),
                speed: 4.0,
            },
        };
        let events = vec![
            pos("a", 3),
            TickEvent {
                tick: 3,
                event: GameEvent::GoldChanged { slot: 1, gold: 9 },
            },
            pos("b", 3),
            pos("c", 4),
        ];
        let out = from_events(events, 77);
        assert_eq!(out.len(), 3);
        match &out[0].1 {
            Message::PositionUpdate(u) => assert_eq!(u.positions.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(out[1].0, Audience::Slot(1));
        match &out[2].1 {
            Message::PositionUpdate(u) => {
                assert_eq!(u.positions.len(), 1);
                assert_eq!(u.timestamp, 77);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
