//! # GameData Relay
//!
//! Authoritative relay and validator for client-hosted game sessions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      GAMEDATA RELAY                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Wire primitives                           │
//! │  ├── codec.rs    - Length-prefixed message reader/writer     │
//! │  ├── game_code.rs- Session codes                             │
//! │  └── vec2.rs     - 2D vector and position compression        │
//! │                                                              │
//! │  game/           - Per-session validation                    │
//! │  ├── state.rs    - Session, connections, host                │
//! │  ├── data.rs     - GameData frame processing                 │
//! │  ├── spawn.rs    - Spawn protocol and server-owned objects   │
//! │  ├── rpc.rs      - RPC authority checks                      │
//! │  ├── objects.rs  - Replicated object variants                │
//! │  ├── registry.rs - Object registry and id allocation         │
//! │  └── directory.rs- Player slot roster                        │
//! │                                                              │
//! │  network/        - Routing                                   │
//! │  ├── protocol.rs - Tags and outbound messages                │
//! │  └── session.rs  - Session manager                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority Model
//!
//! The host client is the source of truth for world state. The relay:
//! - Only accepts spawns from the host
//! - Only accepts despawns, state and RPCs from an object's owner or the host
//! - Keeps a registry of every replicated object so later traffic can be checked
//! - Spawns player metadata itself unless the session is host-authoritative
//!
//! Violations never disconnect anyone directly; they are reported to a
//! [`game::CheatReporter`] which makes that call.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{ConfigError, RelayConfig};
pub use crate::core::codec::{CodecError, MessageReader, MessageWriter};
pub use crate::core::game_code::GameCode;
pub use game::state::{GameOptions, GameSession, GameState};
pub use network::protocol::{FrameResult, OutboundMessage, RelayFrame};
pub use network::session::{SessionError, SessionManager};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
