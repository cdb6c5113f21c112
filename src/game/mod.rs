//! Game Logic Module
//!
//! Per-session state and the validation applied to every GameData frame.
//!
//! ## Module Structure
//!
//! - `state`: Session state, connections, host tracking
//! - `data`: Frame processing, one sub-message at a time
//! - `spawn`: Spawn/despawn handling and server-owned objects
//! - `rpc`: RPC authority checks
//! - `objects`: Replicated object variants and the spawn catalog
//! - `registry`: Object registry and server id allocation
//! - `directory`: Player slot roster
//! - `events`: Notifications and the RPC pre-dispatch hook
//! - `anticheat`: Violation reporting

pub mod anticheat;
pub mod data;
pub mod directory;
pub mod events;
pub mod map;
pub mod objects;
pub mod player;
pub mod registry;
pub mod rpc;
pub mod spawn;
pub mod state;

// Re-export key types
pub use anticheat::{CheatCategory, CheatContext, CheatReporter, ConfiguredAntiCheat};
pub use directory::{DirectoryEntry, PlayerDirectory};
pub use events::{BroadcastEvents, CreationRequest, EventSink, GameEvent, RpcEvent, RpcVerdict};
pub use map::MapType;
pub use objects::{NetId, NetObject, ObjectKind, ObjectState, SpawnType};
pub use player::{ClientId, ClientPlayer};
pub use registry::{NetObjectRegistry, ObjectIdAllocator};
pub use rpc::RpcCall;
pub use state::{GameNet, GameOptions, GameSession, GameState, JoinError};
