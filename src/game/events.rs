//! Session Events
//!
//! Notifications raised by the relay, and the pre-dispatch hook that lets
//! an embedding application veto or override built-in RPC handling.

use serde::{Serialize, Deserialize};
use tokio::sync::broadcast;

use crate::core::game_code::GameCode;
use crate::game::objects::{NetId, ObjectKind};
use crate::game::player::ClientId;
use crate::game::state::GameOptions;

/// Event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A session was created.
    SessionCreated {
        /// Session code
        code: GameCode,
        /// Requesting connection
        owner: Option<ClientId>,
    },

    /// A session was destroyed and its code freed.
    SessionDestroyed {
        /// Session code
        code: GameCode,
    },

    /// A connection joined a session.
    PlayerJoined {
        /// Session code
        code: GameCode,
        /// Connection
        client_id: ClientId,
    },

    /// A connection left a session.
    PlayerLeft {
        /// Session code
        code: GameCode,
        /// Connection
        client_id: ClientId,
    },

    /// A player's control object was spawned and bound.
    PlayerSpawned {
        /// Session code
        code: GameCode,
        /// Connection
        client_id: ClientId,
        /// Control object
        control: NetId,
    },

    /// A player's control object was despawned.
    PlayerDestroyed {
        /// Session code
        code: GameCode,
        /// Connection
        client_id: ClientId,
        /// Control object
        control: NetId,
    },

    /// A meeting HUD was spawned.
    MeetingStarted {
        /// Session code
        code: GameCode,
        /// Meeting HUD object
        meeting_hud: NetId,
    },
}

/// A request to create a session, offered to [`EventSink::before_create`].
#[derive(Clone, Debug)]
pub struct CreationRequest {
    /// Requesting connection, if any.
    pub owner: Option<ClientId>,
    /// Requested options.
    pub options: GameOptions,
}

/// An inbound RPC, offered to [`EventSink::on_rpc`] before built-in handling.
#[derive(Clone, Debug)]
pub struct RpcEvent<'a> {
    /// Session code.
    pub code: GameCode,
    /// Sending connection.
    pub sender: ClientId,
    /// Target of a targeted frame.
    pub target: Option<ClientId>,
    /// Object the call is on.
    pub net_id: NetId,
    /// Object variant.
    pub kind: ObjectKind,
    /// Call code.
    pub call: u8,
    /// Call arguments, unread.
    pub payload: &'a [u8],
}

/// Outcome of the RPC pre-dispatch hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcVerdict {
    /// Run the built-in handler.
    Continue,
    /// Skip the built-in handler and relay the call.
    Suppress,
    /// Skip the built-in handler; `true` relays the call, `false` drops it.
    Override(bool),
}

/// Receives session notifications.
pub trait EventSink: Send + Sync {
    /// Called before a session is created. Returning `true` cancels it.
    fn before_create(&self, _request: &CreationRequest) -> bool {
        false
    }

    /// Fire-and-forget notification.
    fn dispatch(&self, event: &GameEvent);

    /// Pre-dispatch hook for RPCs.
    fn on_rpc(&self, _event: &RpcEvent<'_>) -> RpcVerdict {
        RpcVerdict::Continue
    }
}

/// Forwards every event into a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastEvents {
    tx: broadcast::Sender<GameEvent>,
}

impl BroadcastEvents {
    /// Create with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEvents {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastEvents {
    fn dispatch(&self, event: &GameEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_delivers_events() {
        let events = BroadcastEvents::default();
        let mut rx = events.subscribe();
        let code = GameCode(1);

        events.dispatch(&GameEvent::SessionDestroyed { code });
        assert_eq!(rx.try_recv().unwrap(), GameEvent::SessionDestroyed { code });
    }

    #[test]
    fn test_default_hooks() {
        let events = BroadcastEvents::default();
        let request = CreationRequest { owner: Some(1), options: GameOptions::default() };
        assert!(!events.before_create(&request));

        let rpc = RpcEvent {
            code: GameCode(1),
            sender: 1,
            target: None,
            net_id: 5,
            kind: ObjectKind::PlayerControl,
            call: 13,
            payload: &[],
        };
        assert_eq!(events.on_rpc(&rpc), RpcVerdict::Continue);
    }

    #[test]
    fn test_event_serializes() {
        let event = GameEvent::MeetingStarted { code: GameCode(9), meeting_hud: 44 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("MeetingStarted"));
    }
}
