//! Frame Processor
//!
//! Walks the sub-messages of one inbound GameData frame, applies each one
//! to session state and decides which of them are relayed. A failure in one
//! sub-message drops that sub-message only; the frame as a whole is aborted
//! only when the sender or target is gone, or on a scene/ready violation.

use tracing::{debug, error, trace, warn};

use crate::core::codec::{CodecError, MessageReader};
use crate::game::anticheat::CheatCategory;
use crate::game::events::{RpcEvent, RpcVerdict};
use crate::game::player::ClientId;
use crate::game::state::GameSession;
use crate::network::protocol::{FrameResult, GameDataTag, Platform, RelayFrame};

/// What happens to one sub-message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Relay as received.
    Keep,
    /// Leave out of the relay.
    Drop,
    /// Relay nothing from this frame.
    Abort,
}

impl GameSession {
    /// Process one GameData frame from `sender`.
    ///
    /// With `to_player` set, the frame starts with the packed id of the
    /// single client it is addressed to.
    pub fn handle_game_data(&mut self, sender: ClientId, frame: &[u8], to_player: bool) -> FrameResult {
        if !self.has_player(sender) {
            warn!(code = %self.code, "GameData from unknown client {}", sender);
            return FrameResult::Aborted;
        }

        let mut parent = MessageReader::new(frame);
        let mut target = None;

        if to_player {
            let target_id = match parent.read_packed_i32() {
                Ok(id) => id,
                Err(e) => {
                    warn!(code = %self.code, "Client {} sent a targeted frame without a target: {}", sender, e);
                    return FrameResult::Aborted;
                }
            };

            if !self.has_player(target_id) {
                warn!(code = %self.code, "Client {} sent GameData to unknown client {}", sender, target_id);
                return FrameResult::Aborted;
            }

            trace!(code = %self.code, "{} => {}", sender, target_id);
            target = Some(target_id);
        }

        let mut relay = Vec::with_capacity(frame.len());

        while parent.remaining() > 0 {
            if !self.has_player(sender) {
                return FrameResult::Aborted;
            }
            if let Some(target_id) = target {
                if !self.has_player(target_id) {
                    return FrameResult::Aborted;
                }
            }

            let message = match parent.read_message() {
                Ok(message) => message,
                Err(e) => {
                    warn!(code = %self.code, "Malformed GameData framing from {}: {}", sender, e);
                    break;
                }
            };

            #[cfg(feature = "debug-tracing")]
            trace!(code = %self.code, "Sub-message {} from {}: {}", message.reader.tag(), sender, hex::encode(message.raw));

            match self.handle_sub_message(sender, target, message.reader) {
                Ok(Step::Keep) => relay.extend_from_slice(message.raw),
                Ok(Step::Drop) => {}
                Ok(Step::Abort) => return FrameResult::Aborted,
                Err(e) => {
                    error!(code = %self.code, "Failed to handle GameData sub-message from {}: {}", sender, e);
                }
            }
        }

        if !self.has_player(sender) {
            return FrameResult::Aborted;
        }

        FrameResult::Relay(RelayFrame { target, payload: relay })
    }

    fn handle_sub_message(
        &mut self,
        sender: ClientId,
        target: Option<ClientId>,
        mut reader: MessageReader<'_>,
    ) -> Result<Step, CodecError> {
        match GameDataTag::from_u8(reader.tag()) {
            GameDataTag::Data => self.handle_data(sender, &mut reader),
            GameDataTag::Rpc => self.dispatch_rpc(sender, target, &mut reader),

            GameDataTag::Spawn => {
                if !self.is_host(sender) {
                    if self.report_cheat(sender, "SpawnFlag", CheatCategory::MustBeHost, "Tried to spawn as non-host") {
                        return Ok(Step::Abort);
                    }
                    return Ok(Step::Drop);
                }

                self.handle_spawn(sender, &mut reader)?;
                Ok(Step::Drop)
            }

            GameDataTag::Despawn => {
                let net_id = reader.read_packed_u32()?;
                let Some(owner_id) = self.objects.find(net_id).map(|o| o.owner_id) else {
                    debug!(code = %self.code, "Received DespawnFlag for unregistered NetId {}", net_id);
                    return Ok(Step::Keep);
                };

                if owner_id != sender && !self.is_host(sender) {
                    warn!(
                        code = %self.code,
                        "Client {} tried to despawn {} owned by {}",
                        sender,
                        net_id,
                        owner_id
                    );
                    return Ok(Step::Drop);
                }

                if let Some(obj) = self.objects.unregister(net_id) {
                    debug!(code = %self.code, "Despawned {} {}", obj.kind(), net_id);
                    self.on_destroy(&obj);
                }
                Ok(Step::Keep)
            }

            GameDataTag::SceneChange => {
                let client_id = reader.read_packed_i32()?;
                if client_id != sender {
                    warn!(code = %self.code, "Client {} sent SceneChange for client {}", sender, client_id);
                    return Ok(Step::Abort);
                }

                let scene = reader.read_string()?;
                if scene != self.allowed_scene {
                    warn!(code = %self.code, "Client {} changed to unknown scene {:?}", sender, scene);
                    return Ok(Step::Abort);
                }

                trace!(code = %self.code, "Client {} changed scene to {}", sender, scene);
                if let Some(player) = self.clients.get_mut(&sender) {
                    player.scene = Some(scene);
                }

                self.sync_server_objects(sender);
                self.spawn_player_info(sender);
                Ok(Step::Keep)
            }

            GameDataTag::Ready => {
                let client_id = reader.read_packed_i32()?;
                if client_id != sender {
                    warn!(code = %self.code, "Client {} sent Ready for client {}", sender, client_id);
                    return Ok(Step::Abort);
                }

                trace!(code = %self.code, "Client {} is ready", sender);
                Ok(Step::Keep)
            }

            GameDataTag::ConsoleDeclareClientPlatform => {
                let client_id = reader.read_packed_i32()?;
                let platform = reader.read_packed_i32()?;

                if client_id != sender {
                    if self.report_cheat(
                        sender,
                        "ConsoleDeclareClientPlatform",
                        CheatCategory::Ownership,
                        "Declared platform with another client id",
                    ) {
                        return Ok(Step::Abort);
                    }
                    return Ok(Step::Drop);
                }

                if let Some(player) = self.clients.get_mut(&sender) {
                    player.platform = Platform::Declared(platform);
                }
                Ok(Step::Keep)
            }

            GameDataTag::Unknown(tag) => {
                warn!(code = %self.code, "Bad GameData tag {} from {}", tag, sender);
                Ok(Step::Keep)
            }
        }
    }

    fn handle_data(&mut self, sender: ClientId, reader: &mut MessageReader<'_>) -> Result<Step, CodecError> {
        let net_id = reader.read_packed_u32()?;
        let Some((kind, owner_id)) = self.objects.find(net_id).map(|o| (o.kind(), o.owner_id)) else {
            warn!(code = %self.code, "Received DataFlag for unregistered NetId {}", net_id);
            return Ok(Step::Keep);
        };

        let authorized = if kind.is_host_controlled() {
            self.is_host(sender)
        } else {
            owner_id == sender || self.is_host(sender)
        };

        if !authorized {
            let category = if kind.is_host_controlled() {
                CheatCategory::MustBeHost
            } else {
                CheatCategory::Ownership
            };
            if self.report_cheat(sender, "DataFlag", category, "Wrote state it does not own") {
                return Ok(Step::Abort);
            }
            return Ok(Step::Drop);
        }

        if let Some(obj) = self.objects.find_mut(net_id) {
            obj.deserialize(reader, false)?;
        }
        Ok(Step::Keep)
    }

    fn dispatch_rpc(
        &mut self,
        sender: ClientId,
        target: Option<ClientId>,
        reader: &mut MessageReader<'_>,
    ) -> Result<Step, CodecError> {
        let net_id = reader.read_packed_u32()?;
        let call = reader.read_u8()?;

        let Some(kind) = self.objects.find(net_id).map(|o| o.kind()) else {
            warn!(code = %self.code, "Received RpcFlag for unregistered NetId {}", net_id);
            return Ok(Step::Keep);
        };

        let event = RpcEvent {
            code: self.code,
            sender,
            target,
            net_id,
            kind,
            call,
            payload: &reader.body()[reader.position()..],
        };

        match self.events.on_rpc(&event) {
            RpcVerdict::Continue => {}
            RpcVerdict::Suppress => return Ok(Step::Keep),
            RpcVerdict::Override(true) => return Ok(Step::Keep),
            RpcVerdict::Override(false) => return Ok(Step::Drop),
        }

        if self.handle_rpc(sender, net_id, call, reader)? {
            Ok(Step::Keep)
        } else if self.has_player(sender) {
            Ok(Step::Drop)
        } else {
            Ok(Step::Abort)
        }
    }
}
