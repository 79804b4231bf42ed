// Error taxonomy shared by the codec, dispatcher, handlers and match setup.
//
// Domain refusals (cooldown, not enough gold, move too soon, out of range) are
// not errors; they are plain `bool` / `Option` results on the engine API.

use thiserror::Error;

/// Failures while framing or decoding bytes from a socket.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("unknown message type {0}")]
    UnknownType(i16),
    #[error("message {msg_type}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        msg_type: i16,
        needed: usize,
        remaining: usize,
    },
    #[error("message {0}: string field is not valid UTF-8")]
    InvalidUtf8(i16),
    #[error("negative frame length {0}")]
    NegativeLength(i32),
    #[error("frame length {0} exceeds limit")]
    FrameTooLarge(usize),
    #[error("message {msg_type}: invalid value for {field}")]
    InvalidValue { msg_type: i16, field: &'static str },
}

impl ProtocolError {
    /// Errors after which the byte stream can no longer be trusted.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::NegativeLength(_) | ProtocolError::FrameTooLarge(_)
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::UnknownType(_) => "unknown_type",
            ProtocolError::Truncated { .. } => "truncated",
            ProtocolError::InvalidUtf8(_) => "invalid_utf8",
            ProtocolError::NegativeLength(_) => "negative_length",
            ProtocolError::FrameTooLarge(_) => "frame_too_large",
            ProtocolError::InvalidValue { .. } => "invalid_value",
        }
    }
}

/// Startup wiring errors for the type registry and dispatcher tables.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("message type {0} registered twice")]
    Duplicate(i16),
}

/// Failures while routing a decoded message to its handler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("no handler registered for message type {0}")]
    Unregistered(i16),
    #[error("message type {msg_type} requires {what}")]
    MissingContext { msg_type: i16, what: &'static str },
    #[error(transparent)]
    Rejected(#[from] ValidationError),
}

/// Client misbehaviour: the request is dropped and logged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("connection is not authenticated")]
    NotAuthenticated,
    #[error("connection is not bound to a match")]
    NotInMatch,
    #[error("claimed slot {claimed} but session slot is {actual}")]
    SlotMismatch { claimed: i16, actual: i16 },
    #[error("unknown entity {0}")]
    UnknownEntity(String),
    #[error("entity {entity_id} is not owned by slot {slot}")]
    NotOwner { entity_id: String, slot: i16 },
    #[error("unknown troop type {0}")]
    UnknownTroop(i16),
    #[error("unknown champion code {0}")]
    UnknownChampion(u8),
    #[error("only available in local mode")]
    LocalModeOnly,
    #[error("match {0} is not running")]
    MatchUnavailable(String),
}

/// Fatal problems while assembling a match; nothing is registered on failure.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("unknown map '{0}'")]
    UnknownMap(String),
    #[error("unknown champion '{0}'")]
    UnknownChampion(String),
    #[error("map '{map}' has no slot {slot}")]
    UnknownSlot { map: String, slot: i16 },
    #[error("invalid map: {0}")]
    InvalidMap(String),
    #[error("slot {0} listed more than once")]
    DuplicateSlot(i16),
    #[error("match '{0}' already exists")]
    MatchExists(String),
    #[error("no worker capacity left for another match")]
    AtCapacity,
    #[error("failed to read game data: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse game data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Token verification failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("failed to create token: {0}")]
    TokenCreation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_protocol_errors() {
        assert!(ProtocolError::NegativeLength(-1).is_unrecoverable());
        assert!(ProtocolError::FrameTooLarge(10).is_unrecoverable());
        assert!(!ProtocolError::UnknownType(7).is_unrecoverable());
        assert!(!ProtocolError::InvalidUtf8(1).is_unrecoverable());
    }

    #[test]
    fn test_validation_converts_into_dispatch_error() {
        let err: DispatchError = ValidationError::NotAuthenticated.into();
        assert_eq!(err, DispatchError::Rejected(ValidationError::NotAuthenticated));
        assert_eq!(err.to_string(), "connection is not authenticated");
    }
}
