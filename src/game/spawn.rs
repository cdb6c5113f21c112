//! Spawn Protocol
//!
//! Instantiates object trees from the spawn catalog, registers every
//! component, and keeps cross-object links (control ↔ player, control ↔
//! player info, singleton slots) in step with spawns and despawns.
//!
//! Links are stored as net ids and resolved through the registry; nothing
//! here holds a second owner of an object.

use tracing::{debug, error, trace, warn};

use crate::core::codec::{CodecError, MessageReader, MessageWriter};
use crate::core::vec2::Vector2;
use crate::game::anticheat::CheatCategory;
use crate::game::events::GameEvent;
use crate::game::objects::{
    NetId, NetObject, ObjectKind, ObjectState, PlayerInfoState, SpawnType,
    CURRENT_CLIENT, MIN_SERVER_NET_ID, NO_SLOT, SERVER_OWNED,
};
use crate::game::player::ClientId;
use crate::game::state::GameSession;
use crate::network::protocol::{GameDataTag, OutboundMessage, Recipient, SpawnFlags};

/// Call code of the position snap RPC.
pub(crate) const RPC_SNAP_TO: u8 = 21;

/// Sequence step used when the server moves a transform.
const SNAP_SEQUENCE_STEP: u16 = 5;

/// Tag of the state block inside a spawn component.
const STATE_MESSAGE_TAG: u8 = 1;

impl GameSession {
    // =========================================================================
    // INBOUND SPAWN
    // =========================================================================

    /// Process the body of a spawn sub-message sent by the host.
    ///
    /// A component whose id is already registered stops the spawn; the
    /// components registered before it stay registered.
    pub(crate) fn handle_spawn(
        &mut self,
        sender: ClientId,
        reader: &mut MessageReader<'_>,
    ) -> Result<(), CodecError> {
        let code = reader.read_packed_u32()?;
        let Some(spawn_type) = SpawnType::from_u32(code) else {
            warn!(code = %self.code, "Couldn't find spawnable object {}", code);
            return Ok(());
        };

        let mut owner_id = reader.read_packed_i32()?;
        if owner_id == CURRENT_CLIENT {
            owner_id = sender;
        }
        let spawn_flags = SpawnFlags(reader.read_u8()?);

        let tree = spawn_type.instantiate();
        let declared = reader.read_packed_i32()?;
        if declared != tree.len() as i32 {
            error!(
                code = %self.code,
                "Children didn't match for spawnable {} ({:?}): {} != {}",
                code,
                spawn_type,
                declared,
                tree.len()
            );
            return Ok(());
        }

        debug!(code = %self.code, "Spawning {:?}, {} components, flags {:?}", spawn_type, tree.len(), spawn_flags);

        let mut root: Option<NetId> = None;
        for state in tree {
            let mut obj = NetObject::new(state);
            obj.net_id = reader.read_packed_u32()?;
            obj.owner_id = owner_id;
            obj.spawn_flags = spawn_flags;
            if root.is_none() {
                obj.spawn_type = Some(spawn_type);
            }

            let net_id = obj.net_id;
            debug!(code = %self.code, "- {}, NetId {}, OwnerId {}", obj.kind(), net_id, owner_id);

            if net_id >= MIN_SERVER_NET_ID {
                self.report_cheat(
                    sender,
                    "SpawnFlag",
                    CheatCategory::ProtocolExtension,
                    "Client used a server-reserved net id",
                );
                break;
            }

            if !self.objects.register(obj) {
                trace!(code = %self.code, "Failed to register NetId {}, it already exists", net_id);
                break;
            }

            let root_id = *root.get_or_insert(net_id);
            if let Some(root_obj) = self.objects.find_mut(root_id) {
                root_obj.components.push(net_id);
            }

            let state = reader.read_message()?;
            if !state.reader.is_empty() {
                let mut state_reader = state.reader;
                if let Some(obj) = self.objects.find_mut(net_id) {
                    obj.deserialize(&mut state_reader, true)?;
                }
            }

            self.on_spawn(sender, net_id);
        }

        Ok(())
    }

    // =========================================================================
    // HOOKS
    // =========================================================================

    /// Variant-specific wiring after a component is registered.
    pub(crate) fn on_spawn(&mut self, sender: ClientId, net_id: NetId) {
        let Some(kind) = self.objects.find(net_id).map(NetObject::kind) else {
            return;
        };

        match kind {
            ObjectKind::GameManager => self.net.game_manager = Some(net_id),
            ObjectKind::LobbyBehaviour => self.net.lobby_behaviour = Some(net_id),
            ObjectKind::VoteBanSystem => self.net.vote_ban = Some(net_id),
            ObjectKind::ShipStatus => self.net.ship_status = Some(net_id),
            ObjectKind::PlayerInfo => self.bind_player_info(net_id),
            ObjectKind::PlayerControl => self.bind_control(sender, net_id),
            ObjectKind::MeetingHud => self.start_meeting(net_id),
            ObjectKind::PlayerPhysics | ObjectKind::NetworkTransform => {}
        }
    }

    fn bind_player_info(&mut self, net_id: NetId) {
        let Some(info) = self.objects.find(net_id).and_then(NetObject::as_player_info) else {
            return;
        };
        let (slot, client_id) = (info.player_id, info.client_id);

        if !self.directory.add_player(slot, client_id, net_id) {
            warn!(
                code = %self.code,
                "Could not add PlayerInfo for slot {} with NetId {}, already have NetId {:?}",
                slot,
                net_id,
                self.directory.get_by_slot(slot).map(|e| e.info_net_id)
            );
        }
    }

    fn bind_control(&mut self, sender: ClientId, net_id: NetId) {
        let Some(obj) = self.objects.find(net_id) else {
            return;
        };
        let owner_id = obj.owner_id;
        let slot = obj.as_control().map(|c| c.player_id).unwrap_or(NO_SLOT);

        let bound = match self.clients.get_mut(&owner_id) {
            Some(player) => {
                player.character = Some(net_id);
                player.disable_spawn_timeout();
                true
            }
            None => {
                self.report_cheat(
                    sender,
                    "SpawnFlag",
                    CheatCategory::GameFlow,
                    "Failed to find player that spawned the control object",
                );
                false
            }
        };

        if let Some(info_id) = self.directory.get_by_slot(slot).map(|e| e.info_net_id) {
            if let Some(info) = self.objects.find_mut(info_id).and_then(NetObject::as_player_info_mut) {
                info.controller = Some(net_id);
            }
            if let Some(control) = self.objects.find_mut(net_id).and_then(NetObject::as_control_mut) {
                control.player_info = Some(info_id);
            }
        }

        if bound {
            self.dispatch(GameEvent::PlayerSpawned {
                code: self.code,
                client_id: owner_id,
                control: net_id,
            });
        }
    }

    fn start_meeting(&mut self, meeting_hud: NetId) {
        let map = self
            .net
            .ship_status
            .and_then(|id| self.objects.find(id))
            .and_then(|obj| match obj.state {
                ObjectState::ShipStatus { map, .. } => Some(map),
                _ => None,
            });

        if let Some(map) = map {
            let player_count = self.clients.len();
            let characters: Vec<NetId> = self.clients.values().filter_map(|p| p.character).collect();

            for control_id in characters {
                let Some(control) = self.objects.find(control_id) else {
                    continue;
                };
                let slot = control.as_control().map(|c| c.player_id).unwrap_or(NO_SLOT);
                let transform_id = control
                    .components
                    .iter()
                    .copied()
                    .find(|id| {
                        self.objects.find(*id).map(NetObject::kind) == Some(ObjectKind::NetworkTransform)
                    });

                if let Some(transform_id) = transform_id {
                    let position = map.spawn_location(slot, player_count, false);
                    if let Err(e) = self.snap_to(transform_id, position) {
                        error!(code = %self.code, "Failed to reposition {}: {}", transform_id, e);
                    }
                }
            }
        }

        self.dispatch(GameEvent::MeetingStarted { code: self.code, meeting_hud });
    }

    /// Move a transform and tell everyone.
    fn snap_to(&mut self, transform_id: NetId, position: Vector2) -> Result<(), CodecError> {
        let Some(transform) = self.objects.find_mut(transform_id).and_then(NetObject::as_transform_mut) else {
            return Ok(());
        };
        transform.sequence = transform.sequence.wrapping_add(SNAP_SEQUENCE_STEP);
        transform.position = position;
        let sequence = transform.sequence;

        let mut writer = MessageWriter::new();
        writer.start_message(GameDataTag::Rpc.as_u8());
        writer.write_packed_u32(transform_id);
        writer.write_u8(RPC_SNAP_TO);
        writer.write_vector2(position);
        writer.write_u16(sequence);
        writer.end_message()?;

        self.push_outbound(OutboundMessage::game_data(Recipient::All, writer.into_bytes()));
        Ok(())
    }

    /// Teardown wiring for a component that was just unregistered.
    pub(crate) fn on_destroy(&mut self, obj: &NetObject) {
        match &obj.state {
            ObjectState::LobbyBehaviour => self.net.lobby_behaviour = None,
            ObjectState::VoteBanSystem { .. } => self.net.vote_ban = None,
            ObjectState::ShipStatus { .. } => self.net.ship_status = None,

            ObjectState::PlayerInfo(info) => {
                self.unlink_control(info.controller);

                // Keep the roster entry for the rest of the round
                if !self.state.is_in_round() {
                    self.directory.remove_by_info(obj.net_id);
                }
            }

            ObjectState::PlayerControl(control) => {
                if let Some(info) = control
                    .player_info
                    .and_then(|id| self.objects.find_mut(id))
                    .and_then(NetObject::as_player_info_mut)
                {
                    info.controller = None;
                }

                if let Some(player) = self.clients.get_mut(&obj.owner_id) {
                    player.character = None;
                    self.dispatch(GameEvent::PlayerDestroyed {
                        code: self.code,
                        client_id: obj.owner_id,
                        control: obj.net_id,
                    });
                }
            }

            _ => {}
        }
    }

    /// Drop a control's link to a player-info that is going away.
    fn unlink_control(&mut self, control_id: Option<NetId>) {
        if let Some(control) = control_id
            .and_then(|id| self.objects.find_mut(id))
            .and_then(NetObject::as_control_mut)
        {
            control.player_info = None;
        }
    }

    // =========================================================================
    // SERVER-ORIGINATED SPAWNS
    // =========================================================================

    /// Re-send every server-owned object to one client.
    pub(crate) fn sync_server_objects(&mut self, client_id: ClientId) {
        let roots: Vec<NetId> = self
            .objects
            .iter()
            .filter(|obj| obj.owner_id == SERVER_OWNED && obj.spawn_type.is_some())
            .map(|obj| obj.net_id)
            .collect();

        for net_id in roots {
            trace!(code = %self.code, "Syncing {} to {}", net_id, client_id);
            if let Err(e) = self.send_object_spawn(net_id, Recipient::Client(client_id)) {
                error!(code = %self.code, "Failed to sync {}: {}", net_id, e);
            }
        }
    }

    /// Spawn a server-owned player info for `client_id` unless the host
    /// handles identity or one already exists.
    pub(crate) fn spawn_player_info(&mut self, client_id: ClientId) {
        if self.is_host_authoritative() || self.directory.contains_client(client_id) {
            return;
        }

        let slot = self.directory.next_available_slot();
        if slot == NO_SLOT {
            warn!(code = %self.code, "No free player slot for client {}", client_id);
            return;
        }

        let name = self
            .clients
            .get(&client_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();

        let mut info = NetObject::new(ObjectState::PlayerInfo(PlayerInfoState {
            player_id: slot,
            client_id,
            name,
            disconnected: false,
            controller: None,
        }));
        let net_id = self.ids.next_id();
        info.net_id = net_id;
        info.owner_id = SERVER_OWNED;
        info.spawn_type = Some(SpawnType::PlayerInfo);
        info.components = vec![net_id];

        if !self.objects.register(info) {
            error!(code = %self.code, "Couldn't spawn PlayerInfo for client {}", client_id);
            return;
        }

        trace!(code = %self.code, "Spawning PlayerInfo (NetId {})", net_id);
        self.on_spawn(client_id, net_id);

        if let Err(e) = self.send_object_spawn(net_id, Recipient::All) {
            error!(code = %self.code, "Failed to broadcast PlayerInfo {}: {}", net_id, e);
        }
    }

    /// Handle a departing client's roster entry.
    ///
    /// Mid-round the entry is only flagged as disconnected. Otherwise a
    /// server-owned player info is despawned; host-owned ones are left for
    /// the host to despawn.
    pub(crate) fn release_player_info(&mut self, client_id: ClientId) {
        let Some(entry) = self.directory.get_by_client(client_id).copied() else {
            return;
        };

        if self.state.is_in_round() {
            if let Some(info) = self
                .objects
                .find_mut(entry.info_net_id)
                .and_then(NetObject::as_player_info_mut)
            {
                info.disconnected = true;
            }
            return;
        }

        let server_owned = self
            .objects
            .find(entry.info_net_id)
            .map(|obj| obj.owner_id == SERVER_OWNED)
            .unwrap_or(false);
        if !server_owned {
            return;
        }

        debug!(code = %self.code, "Despawning PlayerInfo {}", entry.info_net_id);
        self.directory.remove_player(entry.slot);
        let controller = self
            .objects
            .unregister(entry.info_net_id)
            .as_ref()
            .and_then(NetObject::as_player_info)
            .and_then(|info| info.controller);
        self.unlink_control(controller);

        let mut writer = MessageWriter::new();
        writer.start_message(GameDataTag::Despawn.as_u8());
        writer.write_packed_u32(entry.info_net_id);
        match writer.end_message() {
            Ok(()) => self.push_outbound(OutboundMessage::game_data(Recipient::All, writer.into_bytes())),
            Err(e) => error!(code = %self.code, "Failed to encode despawn: {}", e),
        }
    }

    /// Encode a spawn sub-message for a registered root object.
    fn send_object_spawn(&mut self, root_id: NetId, recipient: Recipient) -> Result<(), CodecError> {
        let Some(root) = self.objects.find(root_id) else {
            return Ok(());
        };
        let Some(spawn_type) = root.spawn_type else {
            return Ok(());
        };

        let mut writer = MessageWriter::new();
        writer.start_message(GameDataTag::Spawn.as_u8());
        writer.write_packed_u32(spawn_type.as_u32());
        writer.write_packed_i32(root.owner_id);
        writer.write_u8(root.spawn_flags.0);
        writer.write_packed_i32(root.components.len() as i32);

        for id in &root.components {
            writer.write_packed_u32(*id);
            writer.start_message(STATE_MESSAGE_TAG);
            if let Some(component) = self.objects.find(*id) {
                component.serialize(&mut writer, true);
            }
            writer.end_message()?;
        }
        writer.end_message()?;

        self.push_outbound(OutboundMessage::game_data(recipient, writer.into_bytes()));
        Ok(())
    }
}
