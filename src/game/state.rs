//! Session State
//!
//! One hosted match: its connections, its replicated objects and the
//! player roster. Frame handling lives in `data`, spawning in `spawn`,
//! RPC validation in `rpc`; all of them extend [`GameSession`].

use std::collections::BTreeMap;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::core::game_code::GameCode;
use crate::game::anticheat::{CheatCategory, CheatContext, CheatReporter};
use crate::game::directory::PlayerDirectory;
use crate::game::events::{EventSink, GameEvent};
use crate::game::objects::NetId;
use crate::game::player::{ClientId, ClientPlayer};
use crate::game::registry::{NetObjectRegistry, ObjectIdAllocator};
use crate::network::protocol::OutboundMessage;

// =============================================================================
// TYPES
// =============================================================================

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    /// In the lobby.
    NotStarted,
    /// Host pressed start, round loading.
    Starting,
    /// Round in progress.
    Started,
    /// Torn down; the code may be reused.
    Destroyed,
}

impl GameState {
    /// A round is starting or running.
    pub fn is_in_round(self) -> bool {
        matches!(self, Self::Starting | Self::Started)
    }
}

/// Options a session is created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOptions {
    /// Maximum connections.
    pub max_players: usize,
    /// Host spawns player-info objects itself instead of the server.
    pub host_authoritative: bool,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            max_players: 15,
            host_authoritative: false,
        }
    }
}

/// Well-known singleton objects of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameNet {
    /// Current ship status.
    pub ship_status: Option<NetId>,
    /// Lobby.
    pub lobby_behaviour: Option<NetId>,
    /// Vote-ban system.
    pub vote_ban: Option<NetId>,
    /// Active game manager.
    pub game_manager: Option<NetId>,
}

/// Join errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// Session has been destroyed.
    #[error("game has been destroyed")]
    GameDestroyed,

    /// Round already running.
    #[error("game has already started")]
    GameStarted,

    /// No room left.
    #[error("game is full")]
    GameFull,

    /// Connection is already in this session.
    #[error("client {0} already joined")]
    AlreadyJoined(ClientId),
}

// =============================================================================
// SESSION
// =============================================================================

/// A hosted match.
pub struct GameSession {
    /// Session code.
    pub code: GameCode,
    /// Creation options.
    pub options: GameOptions,
    pub(crate) state: GameState,
    pub(crate) host_id: Option<ClientId>,
    pub(crate) clients: BTreeMap<ClientId, ClientPlayer>,
    pub(crate) objects: NetObjectRegistry,
    pub(crate) directory: PlayerDirectory,
    pub(crate) net: GameNet,
    pub(crate) ids: ObjectIdAllocator,
    pub(crate) allowed_scene: String,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) anticheat: Arc<dyn CheatReporter>,
    outbox: Vec<OutboundMessage>,
    next_join_order: u64,
}

impl GameSession {
    /// Create an empty session.
    pub fn new(
        code: GameCode,
        options: GameOptions,
        config: &RelayConfig,
        events: Arc<dyn EventSink>,
        anticheat: Arc<dyn CheatReporter>,
    ) -> Self {
        Self {
            code,
            options,
            state: GameState::NotStarted,
            host_id: None,
            clients: BTreeMap::new(),
            objects: NetObjectRegistry::new(),
            directory: PlayerDirectory::new(),
            net: GameNet::default(),
            ids: ObjectIdAllocator::new(),
            allowed_scene: config.allowed_scene.clone(),
            events,
            anticheat,
            outbox: Vec::new(),
            next_join_order: 0,
        }
    }

    /// Lifecycle state.
    pub fn state(&self) -> GameState {
        self.state
    }

    /// Move to a new lifecycle state. Destroyed is final.
    pub fn set_state(&mut self, state: GameState) {
        if self.state == GameState::Destroyed {
            return;
        }
        debug!(code = %self.code, "State {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Current host.
    pub fn host_id(&self) -> Option<ClientId> {
        self.host_id
    }

    /// True if `client_id` is the host.
    pub fn is_host(&self, client_id: ClientId) -> bool {
        self.host_id == Some(client_id)
    }

    /// Server spawns player-info objects only when the host does not.
    pub fn is_host_authoritative(&self) -> bool {
        self.options.host_authoritative
    }

    /// Number of connections.
    pub fn player_count(&self) -> usize {
        self.clients.len()
    }

    /// Connection state.
    pub fn player(&self, client_id: ClientId) -> Option<&ClientPlayer> {
        self.clients.get(&client_id)
    }

    /// True if the connection is attached.
    pub fn has_player(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// All connections.
    pub fn players(&self) -> impl Iterator<Item = &ClientPlayer> {
        self.clients.values()
    }

    /// Object registry.
    pub fn objects(&self) -> &NetObjectRegistry {
        &self.objects
    }

    /// Player roster.
    pub fn directory(&self) -> &PlayerDirectory {
        &self.directory
    }

    /// Singleton slots.
    pub fn net(&self) -> &GameNet {
        &self.net
    }

    /// Take everything queued for the transport.
    pub fn drain_outbox(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn push_outbound(&mut self, message: OutboundMessage) {
        self.outbox.push(message);
    }

    pub(crate) fn dispatch(&self, event: GameEvent) {
        self.events.dispatch(&event);
    }

    /// Attach a connection. The first connection becomes host.
    pub fn add_client(&mut self, client_id: ClientId, name: impl Into<String>) -> Result<(), JoinError> {
        match self.state {
            GameState::Destroyed => return Err(JoinError::GameDestroyed),
            GameState::Starting | GameState::Started => return Err(JoinError::GameStarted),
            GameState::NotStarted => {}
        }

        if self.clients.contains_key(&client_id) {
            return Err(JoinError::AlreadyJoined(client_id));
        }

        if self.clients.len() >= self.options.max_players {
            return Err(JoinError::GameFull);
        }

        let order = self.next_join_order;
        self.next_join_order += 1;
        self.clients.insert(client_id, ClientPlayer::new(client_id, name, order));

        if self.host_id.is_none() {
            self.host_id = Some(client_id);
        }

        info!(code = %self.code, "Client {} joined ({} players)", client_id, self.clients.len());
        self.dispatch(GameEvent::PlayerJoined { code: self.code, client_id });
        Ok(())
    }

    /// Detach a connection, migrating host if needed.
    pub fn remove_client(&mut self, client_id: ClientId) -> bool {
        let Some(player) = self.clients.remove(&client_id) else {
            return false;
        };

        if self.host_id == Some(client_id) {
            self.host_id = self
                .clients
                .values()
                .min_by_key(|p| p.join_order)
                .map(|p| p.client_id);
            if let Some(new_host) = self.host_id {
                info!(code = %self.code, "Host migrated from {} to {}", client_id, new_host);
            }
        }

        self.release_player_info(client_id);

        info!(code = %self.code, "Client {} ({}) left", client_id, player.name);
        self.dispatch(GameEvent::PlayerLeft { code: self.code, client_id });
        true
    }

    /// Ask the transport to disconnect a connection. The roster is not
    /// touched until the transport reports the disconnect.
    pub fn kick(&mut self, client_id: ClientId, reason: &str) -> bool {
        if !self.clients.contains_key(&client_id) {
            return false;
        }
        self.push_outbound(OutboundMessage::disconnect(client_id, reason));
        true
    }

    /// Forward a violation to the reporter. A disconnect decision detaches
    /// the sender immediately so the rest of its frame is skipped.
    pub(crate) fn report_cheat(
        &mut self,
        client_id: ClientId,
        context: &str,
        category: CheatCategory,
        reason: &str,
    ) -> bool {
        let context = CheatContext::new(context);
        let disconnect = self.anticheat.report(client_id, &context, category, reason);
        if disconnect {
            self.kick(client_id, reason);
            self.remove_client(client_id);
        }
        disconnect
    }

    /// Drop every object unconditionally.
    pub fn destroy(&mut self) {
        self.state = GameState::Destroyed;
        self.objects.clear();
        self.directory.clear();
        self.net = GameNet::default();
        for player in self.clients.values_mut() {
            player.character = None;
        }
        debug!(code = %self.code, "Session destroyed");
    }
}
