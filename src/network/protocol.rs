//! Protocol Definitions
//!
//! GameData sub-message tags, spawn flags, and the messages the relay
//! hands back to the transport layer.

use serde::{Serialize, Deserialize};

use crate::game::player::ClientId;

// =============================================================================
// GAMEDATA TAGS
// =============================================================================

/// Tag of one sub-message inside a GameData frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameDataTag {
    /// Incremental object state.
    Data,
    /// Remote procedure call on an object.
    Rpc,
    /// Object spawn (host only).
    Spawn,
    /// Object despawn.
    Despawn,
    /// Client changed scene.
    SceneChange,
    /// Client finished loading.
    Ready,
    /// Console client declares its platform.
    ConsoleDeclareClientPlatform,
    /// Anything else; relayed byte-for-byte.
    Unknown(u8),
}

impl GameDataTag {
    /// Decode from the wire tag byte.
    pub fn from_u8(tag: u8) -> Self {
        match tag {
            1 => Self::Data,
            2 => Self::Rpc,
            4 => Self::Spawn,
            5 => Self::Despawn,
            6 => Self::SceneChange,
            7 => Self::Ready,
            205 => Self::ConsoleDeclareClientPlatform,
            other => Self::Unknown(other),
        }
    }

    /// Wire tag byte.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Data => 1,
            Self::Rpc => 2,
            Self::Spawn => 4,
            Self::Despawn => 5,
            Self::SceneChange => 6,
            Self::Ready => 7,
            Self::ConsoleDeclareClientPlatform => 205,
            Self::Unknown(other) => other,
        }
    }
}

/// Spawn flags bitmask carried on every spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpawnFlags(pub u8);

impl SpawnFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Object is a client's own character.
    pub const IS_CLIENT_CHARACTER: Self = Self(1);

    /// Check a flag.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Platform declared by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Platform {
    /// Not declared yet.
    #[default]
    Unknown,
    /// Declared platform id.
    Declared(i32),
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Who an outbound message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every client in the session.
    All,
    /// One client.
    Client(ClientId),
}

/// Payload of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundKind {
    /// GameData sub-messages produced by the server itself.
    GameData(Vec<u8>),
    /// Ask the transport to disconnect the recipient.
    Disconnect {
        /// Reason shown to the client.
        reason: String,
    },
}

/// A message the relay wants the transport to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination.
    pub recipient: Recipient,
    /// Content.
    pub kind: OutboundKind,
}

impl OutboundMessage {
    /// Server-generated GameData.
    pub fn game_data(recipient: Recipient, payload: Vec<u8>) -> Self {
        Self { recipient, kind: OutboundKind::GameData(payload) }
    }

    /// Disconnect request.
    pub fn disconnect(client: ClientId, reason: impl Into<String>) -> Self {
        Self {
            recipient: Recipient::Client(client),
            kind: OutboundKind::Disconnect { reason: reason.into() },
        }
    }
}

/// The part of an inbound frame that survived validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayFrame {
    /// Target client for targeted frames.
    pub target: Option<ClientId>,
    /// Kept sub-messages, byte-for-byte as received.
    pub payload: Vec<u8>,
}

/// Result of processing one GameData frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResult {
    /// Relay the kept sub-messages.
    Relay(RelayFrame),
    /// Frame aborted; relay nothing.
    Aborted,
}

impl FrameResult {
    /// True if the frame was aborted.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Relay payload, if any.
    pub fn relay(&self) -> Option<&RelayFrame> {
        match self {
            Self::Relay(frame) => Some(frame),
            Self::Aborted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for byte in [1u8, 2, 4, 5, 6, 7, 205, 3, 99] {
            assert_eq!(GameDataTag::from_u8(byte).as_u8(), byte);
        }
        assert_eq!(GameDataTag::from_u8(3), GameDataTag::Unknown(3));
    }

    #[test]
    fn test_spawn_flags() {
        assert!(SpawnFlags::IS_CLIENT_CHARACTER.contains(SpawnFlags::IS_CLIENT_CHARACTER));
        assert!(!SpawnFlags::NONE.contains(SpawnFlags::IS_CLIENT_CHARACTER));
    }

    #[test]
    fn test_outbound_serializes_to_json() {
        let msg = OutboundMessage::disconnect(7, "kicked");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("kicked"));
    }
}
