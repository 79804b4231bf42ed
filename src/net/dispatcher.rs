// Routes decoded messages to handlers by their type tag.

use std::collections::HashMap;

use super::handlers::Services;
use super::messages::{Message, WireMessage};
use super::session::ConnId;
use crate::engine::catalog::Slot;
use crate::error::{DispatchError, RegistryError, ValidationError};

/// Context values a handler needs the caller to supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Connection,
    User,
    /// Match id and slot.
    Slot,
}

impl Requirement {
    fn label(self) -> &'static str {
        match self {
            Requirement::Connection => "connection",
            Requirement::User => "authenticated user",
            Requirement::Slot => "match slot",
        }
    }
}

/// Who sent the message, plus the shared services handlers act on.
pub struct HandlerContext<'a> {
    pub conn: Option<ConnId>,
    pub user_id: Option<String>,
    pub match_id: Option<String>,
    pub slot: Option<Slot>,
    pub services: &'a Services,
}

impl HandlerContext<'_> {
    fn satisfies(&self, req: Requirement) -> bool {
        match req {
            Requirement::Connection => self.conn.is_some(),
            Requirement::User => self.user_id.is_some(),
            Requirement::Slot => self.match_id.is_some() && self.slot.is_some(),
        }
    }

    pub fn conn(&self) -> Result<ConnId, ValidationError> {
        self.conn.ok_or(ValidationError::NotAuthenticated)
    }

    pub fn user(&self) -> Result<&str, ValidationError> {
        self.user_id.as_deref().ok_or(ValidationError::NotAuthenticated)
    }

    pub fn seat(&self) -> Result<(&str, Slot), ValidationError> {
        match (self.match_id.as_deref(), self.slot) {
            (Some(m), Some(s)) => Ok((m, s)),
            _ => Err(ValidationError::NotInMatch),
        }
    }
}

/// A pure function of (message, context) → optional reply.
pub trait Handler: Send + Sync {
    fn requires(&self) -> &'static [Requirement] {
        &[]
    }

    fn handle(
        &self,
        msg: &Message,
        ctx: &HandlerContext<'_>,
    ) -> Result<Option<Message>, ValidationError>;
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<i16, Box<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, msg_type: i16, handler: Box<dyn Handler>) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&msg_type) {
            return Err(RegistryError::Duplicate(msg_type));
        }
        self.handlers.insert(msg_type, handler);
        Ok(())
    }

    /// Registers `handler` for message type `M`.
    pub fn on<M: WireMessage>(&mut self, handler: impl Handler + 'static) -> Result<(), RegistryError> {
        self.register(M::TYPE, Box::new(handler))
    }

    pub fn is_registered(&self, msg_type: i16) -> bool {
        self.handlers.contains_key(&msg_type)
    }

    pub fn dispatch(
        &self,
        msg: &Message,
        ctx: &HandlerContext<'_>,
    ) -> Result<Option<Message>, DispatchError> {
        let msg_type = msg.msg_type();
        let handler = self
            .handlers
            .get(&msg_type)
            .ok_or(DispatchError::Unregistered(msg_type))?;
        if let Some(missing) = handler.requires().iter().find(|r| !ctx.satisfies(**r)) {
            return Err(DispatchError::MissingContext {
                msg_type,
                what: missing.label(),
            });
        }
        Ok(handler.handle(msg, ctx)?)
    }
}
