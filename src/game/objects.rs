//! Replicated Network Objects
//!
//! Every object the host spawns is one of a closed set of variants. The
//! relay keeps just enough per-variant state to validate later traffic
//! and to re-send server-owned objects to late joiners.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::codec::{CodecError, MessageReader, MessageWriter};
use crate::core::vec2::Vector2;
use crate::game::map::MapType;
use crate::game::player::ClientId;
use crate::network::protocol::SpawnFlags;

/// Network object identifier.
pub type NetId = u32;

/// Marks a component whose registration failed.
pub const INVALID_NET_ID: NetId = u32::MAX;

/// First id the server issues; clients never allocate ids this high.
pub const MIN_SERVER_NET_ID: NetId = 100_000;

/// Owner of global objects spawned by the host.
pub const INVALID_CLIENT: ClientId = -2;

/// Owner placeholder resolved to the sender at registration time.
pub const CURRENT_CLIENT: ClientId = -3;

/// Owner of objects managed by the server itself.
pub const SERVER_OWNED: ClientId = -4;

/// Player slot sentinel ("no slot").
pub const NO_SLOT: u8 = u8::MAX;

// =============================================================================
// SPAWN CATALOG
// =============================================================================

/// Spawnable object codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SpawnType {
    /// Skeld ship status
    SkeldShipStatus = 0,
    /// Meeting HUD
    MeetingHud = 1,
    /// Lobby
    LobbyBehaviour = 2,
    /// Player character (control + physics + transform)
    PlayerControl = 4,
    /// Mira ship status
    MiraShipStatus = 5,
    /// Polus ship status
    PolusShipStatus = 6,
    /// Dleks ship status
    DleksShipStatus = 7,
    /// Airship status
    AirshipStatus = 8,
    /// Hide and seek game manager
    HideAndSeekManager = 9,
    /// Normal game manager
    NormalGameManager = 10,
    /// Player metadata
    PlayerInfo = 11,
    /// Vote-ban system
    VoteBanSystem = 12,
    /// Fungle ship status
    FungleShipStatus = 13,
}

impl SpawnType {
    /// Look up a wire code.
    pub fn from_u32(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::SkeldShipStatus,
            1 => Self::MeetingHud,
            2 => Self::LobbyBehaviour,
            4 => Self::PlayerControl,
            5 => Self::MiraShipStatus,
            6 => Self::PolusShipStatus,
            7 => Self::DleksShipStatus,
            8 => Self::AirshipStatus,
            9 => Self::HideAndSeekManager,
            10 => Self::NormalGameManager,
            11 => Self::PlayerInfo,
            12 => Self::VoteBanSystem,
            13 => Self::FungleShipStatus,
            _ => return None,
        })
    }

    /// Wire code.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Fresh component tree for this type, root first.
    pub fn instantiate(self) -> Vec<ObjectState> {
        let ship = |map| vec![ObjectState::ShipStatus { map, systems: Vec::new() }];

        match self {
            Self::SkeldShipStatus => ship(MapType::Skeld),
            Self::MiraShipStatus => ship(MapType::Mira),
            Self::PolusShipStatus => ship(MapType::Polus),
            Self::DleksShipStatus => ship(MapType::Dleks),
            Self::AirshipStatus => ship(MapType::Airship),
            Self::FungleShipStatus => ship(MapType::Fungle),
            Self::MeetingHud => vec![ObjectState::MeetingHud { payload: Vec::new() }],
            Self::LobbyBehaviour => vec![ObjectState::LobbyBehaviour],
            Self::PlayerControl => vec![
                ObjectState::PlayerControl(PlayerControlState::default()),
                ObjectState::PlayerPhysics,
                ObjectState::NetworkTransform(TransformState::default()),
            ],
            Self::HideAndSeekManager => vec![ObjectState::GameManager {
                mode: GameMode::HideAndSeek,
                payload: Vec::new(),
            }],
            Self::NormalGameManager => vec![ObjectState::GameManager {
                mode: GameMode::Normal,
                payload: Vec::new(),
            }],
            Self::PlayerInfo => vec![ObjectState::PlayerInfo(PlayerInfoState::default())],
            Self::VoteBanSystem => vec![ObjectState::VoteBanSystem { payload: Vec::new() }],
        }
    }
}

// =============================================================================
// VARIANT STATE
// =============================================================================

/// Game mode of a game manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// Classic rules
    Normal,
    /// Hide and seek
    HideAndSeek,
}

/// Player control state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerControlState {
    /// First spawn for this player.
    pub is_new: bool,
    /// Slot this control object belongs to.
    pub player_id: u8,
    /// Bound player-info object.
    pub player_info: Option<NetId>,
}

/// Network transform state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    /// Last accepted sequence id.
    pub sequence: u16,
    /// Last known position.
    pub position: Vector2,
}

impl TransformState {
    /// Newer than the current sequence, allowing for wrap-around.
    pub fn is_newer(&self, sequence: u16) -> bool {
        let delta = sequence.wrapping_sub(self.sequence);
        delta != 0 && delta < u16::MAX / 2
    }
}

/// Player metadata state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfoState {
    /// Slot.
    pub player_id: u8,
    /// Owning connection.
    pub client_id: ClientId,
    /// Display name.
    pub name: String,
    /// Player left mid-round.
    pub disconnected: bool,
    /// Bound control object.
    pub controller: Option<NetId>,
}

impl Default for PlayerInfoState {
    fn default() -> Self {
        Self {
            player_id: NO_SLOT,
            client_id: INVALID_CLIENT,
            name: String::new(),
            disconnected: false,
            controller: None,
        }
    }
}

/// Per-variant object state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectState {
    /// Ship status for one map; systems are kept opaque.
    ShipStatus {
        /// Map
        map: MapType,
        /// Last initial state
        systems: Vec<u8>,
    },
    /// Meeting HUD.
    MeetingHud {
        /// Last initial state
        payload: Vec<u8>,
    },
    /// Lobby.
    LobbyBehaviour,
    /// Player control.
    PlayerControl(PlayerControlState),
    /// Player physics.
    PlayerPhysics,
    /// Network transform.
    NetworkTransform(TransformState),
    /// Player metadata.
    PlayerInfo(PlayerInfoState),
    /// Vote-ban system.
    VoteBanSystem {
        /// Last initial state
        payload: Vec<u8>,
    },
    /// Game manager.
    GameManager {
        /// Game mode
        mode: GameMode,
        /// Last initial state
        payload: Vec<u8>,
    },
}

/// Fieldless view of [`ObjectState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Ship status
    ShipStatus,
    /// Meeting HUD
    MeetingHud,
    /// Lobby
    LobbyBehaviour,
    /// Player control
    PlayerControl,
    /// Player physics
    PlayerPhysics,
    /// Network transform
    NetworkTransform,
    /// Player metadata
    PlayerInfo,
    /// Vote-ban system
    VoteBanSystem,
    /// Game manager
    GameManager,
}

impl ObjectKind {
    /// Objects only the host may write state to.
    pub fn is_host_controlled(self) -> bool {
        matches!(
            self,
            Self::ShipStatus
                | Self::MeetingHud
                | Self::LobbyBehaviour
                | Self::PlayerInfo
                | Self::VoteBanSystem
                | Self::GameManager
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// NET OBJECT
// =============================================================================

/// A registered replicated object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetObject {
    /// Identifier, unique within a session.
    pub net_id: NetId,
    /// Owning connection or a sentinel.
    pub owner_id: ClientId,
    /// Flags from the spawn message.
    pub spawn_flags: SpawnFlags,
    /// Spawn type, set on the root of a spawn tree only.
    pub spawn_type: Option<SpawnType>,
    /// Ids of the whole component tree, set on the root only.
    pub components: Vec<NetId>,
    /// Variant state.
    pub state: ObjectState,
}

impl NetObject {
    /// Unregistered object with the given state.
    pub fn new(state: ObjectState) -> Self {
        Self {
            net_id: INVALID_NET_ID,
            owner_id: INVALID_CLIENT,
            spawn_flags: SpawnFlags::NONE,
            spawn_type: None,
            components: Vec::new(),
            state,
        }
    }

    /// Variant tag.
    pub fn kind(&self) -> ObjectKind {
        match self.state {
            ObjectState::ShipStatus { .. } => ObjectKind::ShipStatus,
            ObjectState::MeetingHud { .. } => ObjectKind::MeetingHud,
            ObjectState::LobbyBehaviour => ObjectKind::LobbyBehaviour,
            ObjectState::PlayerControl(_) => ObjectKind::PlayerControl,
            ObjectState::PlayerPhysics => ObjectKind::PlayerPhysics,
            ObjectState::NetworkTransform(_) => ObjectKind::NetworkTransform,
            ObjectState::PlayerInfo(_) => ObjectKind::PlayerInfo,
            ObjectState::VoteBanSystem { .. } => ObjectKind::VoteBanSystem,
            ObjectState::GameManager { .. } => ObjectKind::GameManager,
        }
    }

    /// True if owned by `client_id`.
    pub fn is_owned_by(&self, client_id: ClientId) -> bool {
        self.owner_id == client_id
    }

    /// Player control state, if this is a control object.
    pub fn as_control(&self) -> Option<&PlayerControlState> {
        match &self.state {
            ObjectState::PlayerControl(control) => Some(control),
            _ => None,
        }
    }

    /// Mutable player control state.
    pub fn as_control_mut(&mut self) -> Option<&mut PlayerControlState> {
        match &mut self.state {
            ObjectState::PlayerControl(control) => Some(control),
            _ => None,
        }
    }

    /// Player info state, if this is a player-info object.
    pub fn as_player_info(&self) -> Option<&PlayerInfoState> {
        match &self.state {
            ObjectState::PlayerInfo(info) => Some(info),
            _ => None,
        }
    }

    /// Mutable player info state.
    pub fn as_player_info_mut(&mut self) -> Option<&mut PlayerInfoState> {
        match &mut self.state {
            ObjectState::PlayerInfo(info) => Some(info),
            _ => None,
        }
    }

    /// Mutable transform state.
    pub fn as_transform_mut(&mut self) -> Option<&mut TransformState> {
        match &mut self.state {
            ObjectState::NetworkTransform(transform) => Some(transform),
            _ => None,
        }
    }

    /// Apply state sent by a client.
    ///
    /// `initial` is set for the state block that accompanies a spawn.
    pub fn deserialize(&mut self, reader: &mut MessageReader<'_>, initial: bool) -> Result<(), CodecError> {
        match &mut self.state {
            ObjectState::ShipStatus { systems: payload, .. }
            | ObjectState::MeetingHud { payload }
            | ObjectState::VoteBanSystem { payload }
            | ObjectState::GameManager { payload, .. } => {
                let bytes = reader.read_bytes(reader.remaining())?;
                if initial {
                    *payload = bytes.to_vec();
                }
            }

            ObjectState::LobbyBehaviour | ObjectState::PlayerPhysics => {}

            ObjectState::PlayerControl(control) => {
                if initial {
                    control.is_new = reader.read_bool()?;
                }
                control.player_id = reader.read_u8()?;
            }

            ObjectState::NetworkTransform(transform) => {
                let sequence = reader.read_u16()?;
                let position = reader.read_vector2()?;
                if initial || transform.is_newer(sequence) {
                    transform.sequence = sequence;
                    transform.position = position;
                }
            }

            ObjectState::PlayerInfo(info) => {
                let player_id = reader.read_u8()?;
                let client_id = reader.read_packed_i32()?;
                // Slot and connection are fixed once the roster entry exists
                if initial {
                    info.player_id = player_id;
                    info.client_id = client_id;
                }
                info.name = reader.read_string()?;
                info.disconnected = reader.read_bool()?;
            }
        }

        Ok(())
    }

    /// Write state for a client.
    pub fn serialize(&self, writer: &mut MessageWriter, initial: bool) {
        match &self.state {
            ObjectState::ShipStatus { systems: payload, .. }
            | ObjectState::MeetingHud { payload }
            | ObjectState::VoteBanSystem { payload }
            | ObjectState::GameManager { payload, .. } => {
                if initial {
                    writer.write_bytes(payload);
                }
            }

            ObjectState::LobbyBehaviour | ObjectState::PlayerPhysics => {}

            ObjectState::PlayerControl(control) => {
                if initial {
                    writer.write_bool(control.is_new);
                }
                writer.write_u8(control.player_id);
            }

            ObjectState::NetworkTransform(transform) => {
                writer.write_u16(transform.sequence);
                writer.write_vector2(transform.position);
            }

            ObjectState::PlayerInfo(info) => {
                writer.write_u8(info.player_id);
                writer.write_packed_i32(info.client_id);
                writer.write_string(&info.name);
                writer.write_bool(info.disconnected);
            }
        }
    }
}
