//! Connected Players
//!
//! Connection-level view of a participant. The replicated player metadata
//! lives in the object registry; this struct only holds what the relay
//! itself tracks about a connection.

use serde::{Serialize, Deserialize};

use crate::game::objects::NetId;
use crate::network::protocol::Platform;

/// Connection identifier, stable for the lifetime of a connection.
pub type ClientId = i32;

/// A connection attached to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPlayer {
    /// Connection identifier.
    pub client_id: ClientId,
    /// Display name from the handshake.
    pub name: String,
    /// Last declared scene.
    pub scene: Option<String>,
    /// Declared platform.
    pub platform: Platform,
    /// Net id of the spawned control object, if any.
    pub character: Option<NetId>,
    /// Waiting for the host to spawn this player's control object.
    pub spawn_timeout_active: bool,
    /// Join order within the session, used for host migration.
    pub join_order: u64,
}

impl ClientPlayer {
    /// Create a freshly joined player.
    pub fn new(client_id: ClientId, name: impl Into<String>, join_order: u64) -> Self {
        Self {
            client_id,
            name: name.into(),
            scene: None,
            platform: Platform::Unknown,
            character: None,
            spawn_timeout_active: true,
            join_order,
        }
    }

    /// Stop waiting for a control object.
    pub fn disable_spawn_timeout(&mut self) {
        self.spawn_timeout_active = false;
    }
}
