//! Network Layer
//!
//! Wire-level tags and outbound messages, and the session manager that
//! routes frames to sessions. Transports sit outside this crate.

pub mod protocol;
pub mod session;

pub use protocol::{
    FrameResult, GameDataTag, OutboundKind, OutboundMessage, Platform, Recipient, RelayFrame,
    SpawnFlags,
};
pub use session::{
    GameCodeFactory, Processed, RandomCodeFactory, Removal, SessionError, SessionManager,
    SharedSession,
};
