//! Session Management
//!
//! Owns every live session by code, tracks which connection created which
//! session, and routes inbound frames to the right session.
//!
//! Cross-session maps sit behind `RwLock`s. Each session sits behind its own
//! `Mutex`, held for the whole of one frame, so frames for a session are
//! applied one at a time in arrival order while other sessions proceed.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::config::RelayConfig;
use crate::core::game_code::GameCode;
use crate::game::anticheat::CheatReporter;
use crate::game::events::{CreationRequest, EventSink, GameEvent};
use crate::game::player::ClientId;
use crate::game::state::{GameOptions, GameSession, GameState, JoinError};
use crate::network::protocol::{FrameResult, OutboundMessage};

/// A session shared between the manager and its callers.
pub type SharedSession = Arc<Mutex<GameSession>>;

/// Session manager errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connection already created a session.
    #[error("client {0} tried to create a second game")]
    AlreadyCreating(ClientId),

    /// The before-create hook cancelled the request.
    #[error("game creation was cancelled")]
    Cancelled,

    /// Every code drawn from the factory was taken.
    #[error("could not allocate a game code after {attempts} attempts")]
    CodeAllocationExhausted {
        /// Attempts made
        attempts: u32,
    },

    /// No session with that code.
    #[error("game {0} not found")]
    NotFound(GameCode),

    /// Join was refused by the session.
    #[error(transparent)]
    Join(#[from] JoinError),
}

/// Source of candidate session codes. Codes may collide with live ones.
pub trait GameCodeFactory: Send + Sync {
    /// Draw a code.
    fn create(&self) -> GameCode;
}

/// Draws random 6-letter codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeFactory;

impl GameCodeFactory for RandomCodeFactory {
    fn create(&self) -> GameCode {
        GameCode::random_v2(&mut rand::thread_rng())
    }
}

/// Outcome of [`SessionManager::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Players were still connected; they were asked to leave.
    Deferred(Vec<OutboundMessage>),
    /// The session was destroyed and its code freed.
    Destroyed,
    /// No session with that code.
    Missing,
}

/// Result of routing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    /// What to relay from the inbound frame.
    pub frame: FrameResult,
    /// Messages the session generated while processing it.
    pub outbound: Vec<OutboundMessage>,
}

/// Registry of live sessions.
pub struct SessionManager {
    config: RelayConfig,
    /// Active sessions.
    sessions: RwLock<HashMap<GameCode, SharedSession>>,
    /// Creating connection to the session it created, `None` while in flight.
    created_by: RwLock<HashMap<ClientId, Option<GameCode>>>,
    code_factory: Arc<dyn GameCodeFactory>,
    events: Arc<dyn EventSink>,
    anticheat: Arc<dyn CheatReporter>,
}

impl SessionManager {
    /// Create a manager that draws random codes.
    pub fn new(config: RelayConfig, events: Arc<dyn EventSink>, anticheat: Arc<dyn CheatReporter>) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            created_by: RwLock::new(HashMap::new()),
            code_factory: Arc::new(RandomCodeFactory),
            events,
            anticheat,
        }
    }

    /// Replace the code factory.
    pub fn with_code_factory(mut self, factory: Arc<dyn GameCodeFactory>) -> Self {
        self.code_factory = factory;
        self
    }

    /// Relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Create a session. A connection may only create one session for as
    /// long as it stays connected.
    #[instrument(skip(self, options))]
    pub async fn create(&self, owner: Option<ClientId>, options: GameOptions) -> Result<SharedSession, SessionError> {
        if let Some(owner) = owner {
            let mut created_by = self.created_by.write().await;
            if created_by.contains_key(&owner) {
                warn!("Client {} has tried to create a second game, blocked", owner);
                return Err(SessionError::AlreadyCreating(owner));
            }
            created_by.insert(owner, None);
        }

        let result = self.try_create(owner, options).await;

        if let Some(owner) = owner {
            let mut created_by = self.created_by.write().await;
            match &result {
                Ok((code, _)) => {
                    created_by.insert(owner, Some(*code));
                }
                Err(_) => {
                    created_by.remove(&owner);
                }
            }
        }

        result.map(|(_, session)| session)
    }

    async fn try_create(
        &self,
        owner: Option<ClientId>,
        options: GameOptions,
    ) -> Result<(GameCode, SharedSession), SessionError> {
        let request = CreationRequest { owner, options: options.clone() };
        if self.events.before_create(&request) {
            info!("Game creation cancelled");
            return Err(SessionError::Cancelled);
        }

        let attempts = self.config.max_code_attempts.max(1);
        for attempt in 1..=attempts {
            let code = self.code_factory.create();

            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(&code) {
                debug!("Code {} is taken (attempt {}/{})", code, attempt, attempts);
                continue;
            }

            let session = GameSession::new(
                code,
                options.clone(),
                &self.config,
                self.events.clone(),
                self.anticheat.clone(),
            );
            let shared = Arc::new(Mutex::new(session));
            sessions.insert(code, shared.clone());
            drop(sessions);

            info!("Created game with code {} ({})", code, code.value());
            self.events.dispatch(&GameEvent::SessionCreated { code, owner });
            return Ok((code, shared));
        }

        error!("Could not create new game after {} attempts", attempts);
        Err(SessionError::CodeAllocationExhausted { attempts })
    }

    /// Look up a session.
    pub async fn find(&self, code: GameCode) -> Option<SharedSession> {
        let sessions = self.sessions.read().await;
        sessions.get(&code).cloned()
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Remove a session.
    ///
    /// While players are connected every one of them is kicked and the
    /// session stays; it is removed when the last of them leaves.
    #[instrument(skip(self))]
    pub async fn remove(&self, code: GameCode) -> Removal {
        let Some(shared) = self.find(code).await else {
            return Removal::Missing;
        };

        let mut session = shared.lock().await;
        if session.player_count() > 0 {
            let players: Vec<ClientId> = session.players().map(|p| p.client_id).collect();
            for client_id in players {
                session.kick(client_id, "Game is being removed");
            }
            debug!("Deferring removal of {}, kicked {} players", code, session.player_count());
            return Removal::Deferred(session.drain_outbox());
        }

        // Another caller may have removed it while we waited on the session
        let mut sessions = self.sessions.write().await;
        if !sessions.get(&code).is_some_and(|current| Arc::ptr_eq(current, &shared)) {
            return Removal::Missing;
        }
        sessions.remove(&code);
        drop(sessions);

        session.destroy();
        drop(session);

        debug!("Removed game with code {} ({})", code, code.value());
        self.events.dispatch(&GameEvent::SessionDestroyed { code });
        Removal::Destroyed
    }

    /// Attach a connection to a session.
    #[instrument(skip(self, name))]
    pub async fn join(
        &self,
        code: GameCode,
        client_id: ClientId,
        name: &str,
    ) -> Result<SharedSession, SessionError> {
        let shared = self.find(code).await.ok_or(SessionError::NotFound(code))?;
        shared.lock().await.add_client(client_id, name)?;
        Ok(shared)
    }

    /// Detach a connection. The session is removed once empty.
    #[instrument(skip(self))]
    pub async fn leave(&self, code: GameCode, client_id: ClientId) -> Result<Vec<OutboundMessage>, SessionError> {
        let shared = self.find(code).await.ok_or(SessionError::NotFound(code))?;

        let (outbound, empty) = {
            let mut session = shared.lock().await;
            session.remove_client(client_id);
            (session.drain_outbox(), session.player_count() == 0)
        };

        if empty {
            self.remove(code).await;
        }
        Ok(outbound)
    }

    /// Route one GameData frame to its session.
    #[instrument(skip(self, frame), fields(len = frame.len()))]
    pub async fn handle_game_data(
        &self,
        code: GameCode,
        sender: ClientId,
        frame: &[u8],
        to_player: bool,
    ) -> Result<Processed, SessionError> {
        let shared = self.find(code).await.ok_or(SessionError::NotFound(code))?;

        let (result, outbound, empty) = {
            let mut session = shared.lock().await;
            let result = session.handle_game_data(sender, frame, to_player);
            (result, session.drain_outbox(), session.player_count() == 0)
        };

        // A disconnect decision may have emptied the session
        if empty {
            self.remove(code).await;
        }

        Ok(Processed { frame: result, outbound })
    }

    /// Forget a connection that created a session. If that session never
    /// got any players it is removed.
    #[instrument(skip(self))]
    pub async fn on_client_disconnect(&self, client_id: ClientId) {
        let created = self.created_by.write().await.remove(&client_id).flatten();
        let Some(code) = created else {
            return;
        };
        let Some(shared) = self.find(code).await else {
            return;
        };

        let orphaned = {
            let session = shared.lock().await;
            session.player_count() == 0 && session.state() != GameState::Destroyed
        };

        if orphaned {
            warn!("Client {} left empty game {} open when disconnecting", client_id, code);
            self.remove(code).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use crate::game::anticheat::ConfiguredAntiCheat;
    use crate::game::events::BroadcastEvents;
    use crate::network::protocol::{OutboundKind, Recipient};

    /// Hands out queued codes, then counts upwards.
    struct QueuedCodes {
        queue: StdMutex<VecDeque<GameCode>>,
        next: StdMutex<i32>,
    }

    impl QueuedCodes {
        fn new(codes: impl IntoIterator<Item = GameCode>) -> Self {
            Self {
                queue: StdMutex::new(codes.into_iter().collect()),
                next: StdMutex::new(1000),
            }
        }
    }

    impl GameCodeFactory for QueuedCodes {
        fn create(&self) -> GameCode {
            if let Some(code) = self.queue.lock().unwrap().pop_front() {
                return code;
            }
            let mut next = self.next.lock().unwrap();
            *next += 1;
            GameCode(*next)
        }
    }

    struct CancelAll;

    impl EventSink for CancelAll {
        fn before_create(&self, _request: &CreationRequest) -> bool {
            true
        }

        fn dispatch(&self, _event: &GameEvent) {}
    }

    fn manager_with(factory: QueuedCodes) -> (SessionManager, Arc<BroadcastEvents>) {
        let events = Arc::new(BroadcastEvents::default());
        let manager = SessionManager::new(
            RelayConfig::default(),
            events.clone(),
            Arc::new(ConfiguredAntiCheat::new(false)),
        )
        .with_code_factory(Arc::new(factory));
        (manager, events)
    }

    async fn code_of(session: &SharedSession) -> GameCode {
        session.lock().await.code
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (manager, _) = manager_with(QueuedCodes::new([]));
        let session = manager.create(Some(1), GameOptions::default()).await.unwrap();
        let code = code_of(&session).await;

        assert_eq!(manager.session_count().await, 1);
        assert!(manager.find(code).await.is_some());
    }

    #[tokio::test]
    async fn test_ten_collisions_are_fatal() {
        let taken = GameCode(7);
        let (manager, _) = manager_with(QueuedCodes::new(std::iter::once(taken).chain([taken; 10])));
        manager.create(None, GameOptions::default()).await.unwrap();

        let result = manager.create(Some(2), GameOptions::default()).await;
        assert!(matches!(result, Err(SessionError::CodeAllocationExhausted { attempts: 10 })));
        assert_eq!(manager.session_count().await, 1);

        // The failed creator may try again
        assert!(manager.create(Some(2), GameOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_nine_collisions_succeed() {
        let taken = GameCode(7);
        let (manager, _) = manager_with(QueuedCodes::new(std::iter::once(taken).chain([taken; 9])));
        manager.create(None, GameOptions::default()).await.unwrap();

        let session = manager.create(Some(2), GameOptions::default()).await.unwrap();
        assert_ne!(code_of(&session).await, taken);
        assert_eq!(manager.session_count().await, 2);
    }

    #[tokio::test]
    async fn test_second_create_by_same_client_is_rejected() {
        let (manager, _) = manager_with(QueuedCodes::new([]));
        manager.create(Some(1), GameOptions::default()).await.unwrap();

        let result = manager.create(Some(1), GameOptions::default()).await;
        assert!(matches!(result, Err(SessionError::AlreadyCreating(1))));

        manager.on_client_disconnect(1).await;
        assert!(manager.create(Some(1), GameOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_before_create_can_cancel() {
        let manager = SessionManager::new(
            RelayConfig::default(),
            Arc::new(CancelAll),
            Arc::new(ConfiguredAntiCheat::new(false)),
        );

        let result = manager.create(Some(1), GameOptions::default()).await;
        assert!(matches!(result, Err(SessionError::Cancelled)));
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_defers_until_empty() {
        let (manager, events) = manager_with(QueuedCodes::new([]));
        let mut rx = events.subscribe();

        let session = manager.create(Some(1), GameOptions::default()).await.unwrap();
        let code = code_of(&session).await;
        manager.join(code, 1, "host").await.unwrap();
        manager.join(code, 2, "guest").await.unwrap();

        let Removal::Deferred(kicks) = manager.remove(code).await else {
            panic!("removal should be deferred");
        };
        assert_eq!(kicks.len(), 2);
        assert!(kicks.iter().all(|m| matches!(m.kind, OutboundKind::Disconnect { .. })));
        assert!(kicks.iter().any(|m| m.recipient == Recipient::Client(2)));
        assert!(manager.find(code).await.is_some());

        manager.leave(code, 1).await.unwrap();
        assert!(manager.find(code).await.is_some());
        manager.leave(code, 2).await.unwrap();
        assert!(manager.find(code).await.is_none());
        assert_eq!(session.lock().await.state(), GameState::Destroyed);

        assert_eq!(manager.remove(code).await, Removal::Missing);

        let destroyed = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| *e == GameEvent::SessionDestroyed { code })
            .count();
        assert_eq!(destroyed, 1);
    }

    #[tokio::test]
    async fn test_remove_empty_session_destroys_immediately() {
        let (manager, _) = manager_with(QueuedCodes::new([]));
        let session = manager.create(None, GameOptions::default()).await.unwrap();
        let code = code_of(&session).await;

        assert_eq!(manager.remove(code).await, Removal::Destroyed);
        assert_eq!(manager.remove(code).await, Removal::Missing);
        assert!(matches!(
            manager.join(code, 1, "late").await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_remove_destroys_once() {
        let (manager, events) = manager_with(QueuedCodes::new([]));
        let mut rx = events.subscribe();
        let manager = Arc::new(manager);
        let session = manager.create(None, GameOptions::default()).await.unwrap();
        let code = code_of(&session).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.remove(code).await })
            })
            .collect();

        let mut destroyed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Removal::Destroyed => destroyed += 1,
                other => assert_eq!(other, Removal::Missing),
            }
        }
        assert_eq!(destroyed, 1);
        assert_eq!(manager.session_count().await, 0);

        let events = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| *e == GameEvent::SessionDestroyed { code })
            .count();
        assert_eq!(events, 1);
    }

    #[tokio::test]
    async fn test_creator_disconnect_removes_orphaned_session() {
        let (manager, _) = manager_with(QueuedCodes::new([]));
        manager.create(Some(5), GameOptions::default()).await.unwrap();
        assert_eq!(manager.session_count().await, 1);

        manager.on_client_disconnect(5).await;
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_creator_disconnect_keeps_populated_session() {
        let (manager, _) = manager_with(QueuedCodes::new([]));
        let session = manager.create(Some(5), GameOptions::default()).await.unwrap();
        let code = code_of(&session).await;
        manager.join(code, 6, "someone").await.unwrap();

        manager.on_client_disconnect(5).await;
        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_handle_game_data_routes_frames() {
        let (manager, _) = manager_with(QueuedCodes::new([]));
        let session = manager.create(None, GameOptions::default()).await.unwrap();
        let code = code_of(&session).await;
        manager.join(code, 1, "host").await.unwrap();

        let frame = [1u8, 0, 50, 9];
        let processed = manager.handle_game_data(code, 1, &frame, false).await.unwrap();
        assert_eq!(processed.frame.relay().unwrap().payload, frame.to_vec());

        let missing = manager.handle_game_data(GameCode(1), 1, &frame, false).await;
        assert!(matches!(missing, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_codes() {
        let (manager, _) = manager_with(QueuedCodes::new([]));
        let manager = Arc::new(manager);

        let handles: Vec<_> = (0..8)
            .map(|owner| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.create(Some(owner), GameOptions::default()).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(manager.session_count().await, 8);
    }
}
