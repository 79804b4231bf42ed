// Numeric type tag → payload decoder. Filled once at startup, read-only afterwards.

use std::collections::HashMap;

use super::codec::Frame;
use super::messages::{all_message_types, Decoder, Message};
use super::wire::WireReader;
use crate::error::{ProtocolError, RegistryError};

#[derive(Default)]
pub struct TypeRegistry {
    decoders: HashMap<i16, (&'static str, Decoder)>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every message type of the protocol.
    pub fn with_all_messages() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (msg_type, name, decoder) in all_message_types() {
            registry.register(msg_type, name, decoder)?;
        }
        tracing::debug!(types = registry.len(), "Message types registered");
        Ok(registry)
    }

    pub fn register(
        &mut self,
        msg_type: i16,
        name: &'static str,
        decoder: Decoder,
    ) -> Result<(), RegistryError> {
        if self.decoders.contains_key(&msg_type) {
            return Err(RegistryError::Duplicate(msg_type));
        }
        self.decoders.insert(msg_type, (name, decoder));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    pub fn name_of(&self, msg_type: i16) -> Option<&'static str> {
        self.decoders.get(&msg_type).map(|(name, _)| *name)
    }

    pub fn decode(&self, frame: &Frame) -> Result<Message, ProtocolError> {
        let (_, decoder) = self
            .decoders
            .get(&frame.msg_type)
            .ok_or(ProtocolError::UnknownType(frame.msg_type))?;
        let mut reader = WireReader::new(frame.msg_type, &frame.payload);
        decoder(&mut reader)
    }
}
