//! Core wire primitives.
//!
//! Everything here is session-agnostic: message framing, session codes
//! and the vector type carried in transform updates.

pub mod codec;
pub mod game_code;
pub mod vec2;

// Re-export core types
pub use codec::{CodecError, MessageReader, MessageWriter, RawMessage};
pub use game_code::{GameCode, GameCodeError};
pub use vec2::Vector2;
