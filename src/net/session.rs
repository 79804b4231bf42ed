// Connection registry: connection ↔ user ↔ match/slot, safe for concurrent callers.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::messages::{Message, Routing};
use crate::engine::catalog::Slot;
use crate::engine::events::Audience;
use crate::metrics;

pub type ConnId = u64;

/// Identity bound to one connection so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    pub user_id: Option<String>,
    pub match_id: Option<String>,
    pub slot: Option<Slot>,
}

struct Connection {
    tx: mpsc::UnboundedSender<Bytes>,
    info: SessionInfo,
}

pub struct SessionRegistry {
    next_id: AtomicU64,
    connections: DashMap<ConnId, Connection>,
    users: DashMap<String, ConnId>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connections: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Adds a connection whose outbound frames go to `tx`.
    pub fn register(&self, tx: mpsc::UnboundedSender<Bytes>) -> ConnId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(
            id,
            Connection {
                tx,
                info: SessionInfo::default(),
            },
        );
        metrics::CONNECTED_SOCKETS.inc();
        id
    }

    /// Drops a connection and returns what it was bound to.
    pub fn unregister(&self, conn: ConnId) -> Option<SessionInfo> {
        let (_, connection) = self.connections.remove(&conn)?;
        metrics::CONNECTED_SOCKETS.dec();
        if let Some(user) = &connection.info.user_id {
            self.users.remove_if(user, |_, c| *c == conn);
        }
        Some(connection.info)
    }

    /// Binds `user_id` to `conn`. Returns the connection it previously had, if any.
    pub fn bind_user(&self, conn: ConnId, user_id: &str) -> Option<ConnId> {
        if let Some(mut c) = self.connections.get_mut(&conn) {
            c.info.user_id = Some(user_id.to_string());
        } else {
            return None;
        }
        let previous = self.users.insert(user_id.to_string(), conn);
        previous.filter(|p| *p != conn)
    }

    pub fn bind_match(&self, conn: ConnId, match_id: &str, slot: Slot) -> bool {
        match self.connections.get_mut(&conn) {
            Some(mut c) => {
                c.info.match_id = Some(match_id.to_string());
                c.info.slot = Some(slot);
                true
            }
            None => false,
        }
    }

    /// Forgets the match binding of `conn`, keeping the user.
    pub fn unbind_match(&self, conn: ConnId) {
        if let Some(mut c) = self.connections.get_mut(&conn) {
            c.info.match_id = None;
            c.info.slot = None;
        }
    }

    pub fn session(&self, conn: ConnId) -> Option<SessionInfo> {
        self.connections.get(&conn).map(|c| c.info.clone())
    }

    pub fn connection_for_user(&self, user_id: &str) -> Option<ConnId> {
        self.users.get(user_id).map(|c| *c)
    }

    pub fn connection_for_slot(&self, match_id: &str, slot: Slot) -> Option<ConnId> {
        self.connections.iter().find_map(|c| {
            (c.info.match_id.as_deref() == Some(match_id) && c.info.slot == Some(slot))
                .then(|| *c.key())
        })
    }

    pub fn match_connections(&self, match_id: &str) -> Vec<ConnId> {
        self.connections
            .iter()
            .filter(|c| c.info.match_id.as_deref() == Some(match_id))
            .map(|c| *c.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    fn push(&self, conn: ConnId, frame: Bytes, target: Routing) -> bool {
        let sent = self
            .connections
            .get(&conn)
            .is_some_and(|c| c.tx.send(frame).is_ok());
        if sent {
            metrics::MESSAGES_SENT_TOTAL
                .with_label_values(&[target.label()])
                .inc();
        }
        sent
    }

    /// Queues `msg` for one connection. Closed connections are skipped.
    pub fn send_unicast(&self, conn: ConnId, msg: &Message) -> bool {
        self.push(conn, msg.encode(), Routing::Unicast)
    }

    /// Queues `msg` for every connection bound to `match_id`. Returns how many took it.
    pub fn send_match(&self, match_id: &str, msg: &Message) -> usize {
        let frame = msg.encode();
        self.match_connections(match_id)
            .into_iter()
            .filter(|c| self.push(*c, frame.clone(), Routing::Match))
            .count()
    }

    pub fn send_global(&self, msg: &Message) -> usize {
        let frame = msg.encode();
        let conns: Vec<ConnId> = self.connections.iter().map(|c| *c.key()).collect();
        conns
            .into_iter()
            .filter(|c| self.push(*c, frame.clone(), Routing::Global))
            .count()
    }

    /// Delivers an engine-produced message to its audience within `match_id`.
    pub fn route(&self, match_id: &str, audience: Audience, msg: &Message) -> usize {
        match audience {
            Audience::Match => match msg.routing() {
                Routing::Global => self.send_global(msg),
                _ => self.send_match(match_id, msg),
            },
            Audience::Slot(slot) => match self.connection_for_slot(match_id, slot) {
                Some(conn) => usize::from(self.send_unicast(conn, msg)),
                None => 0,
            },
        }
    }
}
