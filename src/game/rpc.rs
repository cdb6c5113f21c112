//! RPC Validation
//!
//! Authority checks for remote procedure calls, plus the few calls whose
//! arguments the relay inspects or mirrors into its own state.

use tracing::{debug, trace};

use crate::core::codec::{CodecError, MessageReader};
use crate::game::anticheat::CheatCategory;
use crate::game::objects::{NetId, NetObject, ObjectKind};
use crate::game::player::ClientId;
use crate::game::state::GameSession;

/// Known RPC call codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RpcCall {
    /// Play an animation
    PlayAnimation = 0,
    /// Complete a task
    CompleteTask = 1,
    /// Push lobby settings
    SyncSettings = 2,
    /// Assign impostors
    SetInfected = 3,
    /// Player was voted out
    Exiled = 4,
    /// Request a name
    CheckName = 5,
    /// Confirm a name
    SetName = 6,
    /// Request a color
    CheckColor = 7,
    /// Confirm a color
    SetColor = 8,
    /// Report a body
    ReportDeadBody = 11,
    /// Kill
    MurderPlayer = 12,
    /// Chat line
    SendChat = 13,
    /// Start a meeting
    StartMeeting = 14,
    /// Start countdown
    SetStartCounter = 18,
    /// Enter a vent
    EnterVent = 19,
    /// Leave a vent
    ExitVent = 20,
    /// Teleport a transform
    SnapTo = 21,
    /// Close the meeting
    Close = 22,
    /// Voting finished
    VotingComplete = 23,
    /// Meeting vote
    CastVote = 24,
    /// Clear a meeting vote
    ClearVote = 25,
    /// Kick vote
    AddVote = 26,
    /// Sabotage doors
    CloseDoorsOfType = 27,
    /// Repair or sabotage a system
    RepairSystem = 28,
    /// Assign tasks
    SetTasks = 29,
    /// Ladder
    ClimbLadder = 31,
    /// Kick out of a vent
    BootFromVent = 34,
}

impl RpcCall {
    /// Look up a call code.
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::PlayAnimation,
            1 => Self::CompleteTask,
            2 => Self::SyncSettings,
            3 => Self::SetInfected,
            4 => Self::Exiled,
            5 => Self::CheckName,
            6 => Self::SetName,
            7 => Self::CheckColor,
            8 => Self::SetColor,
            11 => Self::ReportDeadBody,
            12 => Self::MurderPlayer,
            13 => Self::SendChat,
            14 => Self::StartMeeting,
            18 => Self::SetStartCounter,
            19 => Self::EnterVent,
            20 => Self::ExitVent,
            21 => Self::SnapTo,
            22 => Self::Close,
            23 => Self::VotingComplete,
            24 => Self::CastVote,
            25 => Self::ClearVote,
            26 => Self::AddVote,
            27 => Self::CloseDoorsOfType,
            28 => Self::RepairSystem,
            29 => Self::SetTasks,
            31 => Self::ClimbLadder,
            34 => Self::BootFromVent,
            _ => return None,
        })
    }

    /// Calls any player may make on a host-controlled object.
    pub fn is_client_callable(self, kind: ObjectKind) -> bool {
        matches!(
            (kind, self),
            (ObjectKind::ShipStatus, Self::RepairSystem | Self::CloseDoorsOfType)
                | (ObjectKind::MeetingHud, Self::CastVote)
                | (ObjectKind::VoteBanSystem, Self::AddVote)
        )
    }

    /// Calls any player may make on an object owned by someone else.
    pub fn skips_ownership(self, kind: ObjectKind) -> bool {
        matches!((kind, self), (ObjectKind::PlayerPhysics, Self::BootFromVent))
    }
}

impl GameSession {
    /// Validate an RPC and mirror its effect. Returns `false` if the call
    /// must not be relayed.
    pub(crate) fn handle_rpc(
        &mut self,
        sender: ClientId,
        net_id: NetId,
        code: u8,
        reader: &mut MessageReader<'_>,
    ) -> Result<bool, CodecError> {
        let Some((kind, owner_id)) = self.objects.find(net_id).map(|o| (o.kind(), o.owner_id)) else {
            return Ok(true);
        };

        let Some(call) = RpcCall::from_u8(code) else {
            trace!(code = %self.code, "Unknown RPC {} on {} {}", code, kind, net_id);
            return Ok(true);
        };
        let context = format!("{:?}", call);
        let is_host = self.is_host(sender);

        if kind.is_host_controlled() {
            if !is_host && !call.is_client_callable(kind) {
                self.report_cheat(sender, &context, CheatCategory::MustBeHost, "Failed host check");
                return Ok(false);
            }
        } else if owner_id != sender && !is_host && !call.skips_ownership(kind) {
            self.report_cheat(sender, &context, CheatCategory::Ownership, "Failed ownership check");
            return Ok(false);
        }

        match (kind, call) {
            (ObjectKind::NetworkTransform, RpcCall::SnapTo) => {
                let position = reader.read_vector2()?;
                let sequence = reader.read_u16()?;
                if let Some(transform) = self.objects.find_mut(net_id).and_then(NetObject::as_transform_mut) {
                    if transform.is_newer(sequence) {
                        transform.position = position;
                        transform.sequence = sequence;
                    }
                }
            }

            (ObjectKind::MeetingHud, RpcCall::CastVote) => {
                let voter = reader.read_u8()?;
                let _suspect = reader.read_u8()?;
                let own_slot = self.directory.get_by_client(sender).map(|e| e.slot);
                if !is_host && own_slot != Some(voter) {
                    self.report_cheat(sender, &context, CheatCategory::Ownership, "Voted on behalf of another player");
                    return Ok(false);
                }
            }

            (ObjectKind::VoteBanSystem, RpcCall::AddVote) => {
                let voter = reader.read_i32()?;
                let _target = reader.read_i32()?;
                if voter != sender {
                    self.report_cheat(sender, &context, CheatCategory::Ownership, "Kick vote with another client id");
                    return Ok(false);
                }
            }

            (ObjectKind::PlayerControl, RpcCall::SendChat) => {
                let message = reader.read_string()?;
                debug!(code = %self.code, "Chat from {}: {}", sender, message);
            }

            _ => {}
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_codes() {
        assert_eq!(RpcCall::from_u8(21), Some(RpcCall::SnapTo));
        assert_eq!(RpcCall::from_u8(28), Some(RpcCall::RepairSystem));
        assert_eq!(RpcCall::from_u8(200), None);
        assert_eq!(RpcCall::CastVote as u8, 24);
    }

    #[test]
    fn test_client_callable_allowlist() {
        assert!(RpcCall::RepairSystem.is_client_callable(ObjectKind::ShipStatus));
        assert!(RpcCall::CastVote.is_client_callable(ObjectKind::MeetingHud));
        assert!(RpcCall::AddVote.is_client_callable(ObjectKind::VoteBanSystem));
        assert!(!RpcCall::Close.is_client_callable(ObjectKind::MeetingHud));
        assert!(!RpcCall::SyncSettings.is_client_callable(ObjectKind::PlayerInfo));
    }

    #[test]
    fn test_ownership_exemptions() {
        assert!(RpcCall::BootFromVent.skips_ownership(ObjectKind::PlayerPhysics));
        assert!(!RpcCall::EnterVent.skips_ownership(ObjectKind::PlayerPhysics));
        assert!(!RpcCall::BootFromVent.skips_ownership(ObjectKind::PlayerControl));
    }
}
