//! Session lifecycle against the authoritative service.
//!
//! [`SessionSync`] is the only reader and writer of the persisted
//! [`SessionDescriptor`]. It turns service replies into [`SyncEvent`]s for the
//! controller and hides backend restarts: a 404 on any authoritative call
//! creates a fresh game with the last known configuration and reports
//! [`SyncEvent::SessionRecovered`]. The request that hit the 404 is not
//! replayed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::controller::Command;
use crate::error::{ServiceError, StoreError, SyncError};
use crate::legal::LegalMoveSet;
use crate::protocol::{
    AgentsResponse, GameState, GameStatus, HealthResponse, LegalMovesResponse, MoveRequest,
    MoveResponse, NewGameRequest, NewGameResponse, RestartResponse, StateResponse, Winner,
};
use crate::{Move, Team};

/// Bumped whenever the descriptor layout changes; older records are dropped.
pub const DESCRIPTOR_VERSION: u32 = 1;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    /// Human against the service's AI.
    #[default]
    Pve,
    /// Two humans sharing one board.
    Pvp,
}

impl GameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Pve => "pve",
            GameMode::Pvp => "pvp",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub enabled: bool,
    pub seconds: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            seconds: 30,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxTurnSettings {
    pub enabled: bool,
    pub turns: Option<u32>,
}

/// Everything needed to (re)create a game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub level: u8,
    pub difficulty: Difficulty,
    pub player_side: Team,
    pub mode: GameMode,
    #[serde(default)]
    pub timer: TimerSettings,
    #[serde(default)]
    pub max_turns: MaxTurnSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            level: 1,
            difficulty: Difficulty::Medium,
            player_side: Team::Left,
            mode: GameMode::Pve,
            timer: TimerSettings::default(),
            max_turns: MaxTurnSettings::default(),
        }
    }
}

impl SessionConfig {
    /// Turn ownership: may the local human act for `team`?
    ///
    /// Gestures, the turn clock and the controller all ask this one question.
    #[inline]
    pub fn human_to_move(&self, team: Team) -> bool {
        self.mode == GameMode::Pvp || team == self.player_side
    }

    pub fn to_request(&self) -> NewGameRequest {
        NewGameRequest {
            level: self.level,
            difficulty: self.difficulty.as_str().to_string(),
            player_side: self.player_side,
            player_color: self.player_side,
            mode: self.mode.as_str().to_string(),
            timer_enabled: self.timer.enabled,
            timer_seconds: self.timer.seconds,
            timer_minutes: self.timer.seconds.div_ceil(60).max(1),
            max_turns_enabled: self.max_turns.enabled,
            max_turns: if self.max_turns.enabled {
                self.max_turns.turns
            } else {
                None
            },
        }
    }
}

/// Purely visual preferences; never sent to the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cosmetics {
    pub left_color: String,
    pub right_color: String,
    pub ball_color: String,
    pub rotated: bool,
}

impl Default for Cosmetics {
    fn default() -> Self {
        Self {
            left_color: "#1e88e5".to_string(),
            right_color: "#e53935".to_string(),
            ball_color: "#ffffff".to_string(),
            rotated: false,
        }
    }
}

/// What survives a reload: the game id plus how to rebuild it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub version: u32,
    pub game_id: String,
    #[serde(flatten)]
    pub config: SessionConfig,
    #[serde(default)]
    pub cosmetics: Cosmetics,
}

impl SessionDescriptor {
    pub fn new(game_id: String, config: SessionConfig, cosmetics: Cosmetics) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            game_id,
            config,
            cosmetics,
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Durable slot for one descriptor.
pub trait SessionStore {
    fn load(&self) -> Result<Option<SessionDescriptor>, StoreError>;
    fn save(&mut self, descriptor: &SessionDescriptor) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Decode a stored record, discarding layouts from other versions.
pub fn decode_descriptor(raw: &str) -> Result<Option<SessionDescriptor>, StoreError> {
    let descriptor: SessionDescriptor = serde_json::from_str(raw)?;
    if descriptor.version != DESCRIPTOR_VERSION {
        warn!(
            found = descriptor.version,
            expected = DESCRIPTOR_VERSION,
            "discarding session descriptor with unknown version"
        );
        return Ok(None);
    }
    Ok(Some(descriptor))
}

pub fn encode_descriptor(descriptor: &SessionDescriptor) -> Result<String, StoreError> {
    Ok(serde_json::to_string(descriptor)?)
}

/// In-process store, JSON-encoded like the durable ones.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore {
    slot: Option<String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self) -> Option<&str> {
        self.slot.as_deref()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionDescriptor>, StoreError> {
        match &self.slot {
            Some(raw) => decode_descriptor(raw),
            None => Ok(None),
        }
    }

    fn save(&mut self, descriptor: &SessionDescriptor) -> Result<(), StoreError> {
        self.slot = Some(encode_descriptor(descriptor)?);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.slot = None;
        Ok(())
    }
}

// =============================================================================
// Service
// =============================================================================

/// The remote game service, one method per endpoint.
///
/// Implementations map HTTP 404 to [`ServiceError::SessionNotFound`].
#[allow(async_fn_in_trait)]
pub trait GameService {
    async fn create_game(&self, request: &NewGameRequest) -> Result<NewGameResponse, ServiceError>;
    async fn fetch_state(&self, game_id: &str) -> Result<StateResponse, ServiceError>;
    async fn submit_move(
        &self,
        game_id: &str,
        request: &MoveRequest,
    ) -> Result<MoveResponse, ServiceError>;
    async fn restart(&self, game_id: &str) -> Result<RestartResponse, ServiceError>;
    async fn legal_moves(&self, game_id: &str) -> Result<LegalMovesResponse, ServiceError>;
    async fn health(&self) -> Result<HealthResponse, ServiceError>;
    async fn agents(&self) -> Result<AgentsResponse, ServiceError>;
}

// =============================================================================
// Sync
// =============================================================================

/// Outcome of an accepted move.
#[derive(Clone, Debug, PartialEq)]
pub struct MoveResult {
    pub state: GameState,
    pub opponent_moves: Vec<Move>,
    pub game_ended: bool,
    pub winner: Option<Winner>,
    pub extra_turn: bool,
    pub goal_scored: Option<Team>,
}

/// What the controller is told after a round-trip.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    /// `persisted` is false when the descriptor could not be stored, so the
    /// game will not survive a reload.
    Created {
        config: SessionConfig,
        state: GameState,
        persisted: bool,
    },
    /// `just_played` is set when the service ran the computer's turn while
    /// answering (`aiMoves`), as opposed to echoing `lastAiMove`.
    Fetched {
        state: GameState,
        opponent_moves: Vec<Move>,
        just_played: bool,
        status: GameStatus,
    },
    MoveApplied(MoveResult),
    /// `success: false`; the controller refetches and drops its selection.
    MoveRejected {
        reason: Option<String>,
    },
    Restarted {
        state: GameState,
    },
    /// The old game was gone; a new one was created from the stored config.
    SessionRecovered {
        config: SessionConfig,
        state: GameState,
        persisted: bool,
    },
}

pub struct SessionSync<S, T> {
    service: S,
    store: T,
    descriptor: Option<SessionDescriptor>,
}

impl<S: GameService, T: SessionStore> SessionSync<S, T> {
    pub fn new(service: S, store: T) -> Self {
        Self {
            service,
            store,
            descriptor: None,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// Current descriptor, if a game was created or resumed.
    pub fn descriptor(&self) -> Option<&SessionDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn game_id(&self) -> Option<&str> {
        self.descriptor.as_ref().map(|d| d.game_id.as_str())
    }

    /// Load the stored descriptor (page reload). Does not touch the network.
    pub fn resume(&mut self) -> Result<Option<&SessionDescriptor>, SyncError> {
        self.descriptor = self.store.load()?;
        if let Some(d) = &self.descriptor {
            info!(game_id = %d.game_id, "resumed stored session");
        }
        Ok(self.descriptor.as_ref())
    }

    /// Start a new game and persist its descriptor.
    pub async fn create_session(
        &mut self,
        config: SessionConfig,
        cosmetics: Cosmetics,
    ) -> Result<SyncEvent, SyncError> {
        let (state, persisted) = self.create_game(&config, cosmetics).await?;
        Ok(SyncEvent::Created {
            config,
            state,
            persisted,
        })
    }

    pub async fn fetch_state(&mut self) -> Result<SyncEvent, SyncError> {
        let game_id = self.require_game_id()?;
        match self.service.fetch_state(&game_id).await {
            Err(ServiceError::SessionNotFound) => self.recover().await,
            Err(e) => Err(e.into()),
            Ok(resp) if !resp.success => Err(SyncError::Refused(
                resp.error.unwrap_or_else(|| "state refused".to_string()),
            )),
            Ok(resp) => {
                let opponent_moves = resp.opponent_moves();
                let just_played = !resp.ai_moves.is_empty();
                let status = resp.status.unwrap_or_default();
                let state = resp.game_state.ok_or_else(|| missing("gameState"))?;
                debug!(
                    %game_id,
                    team = %state.current_team,
                    opponent_moves = opponent_moves.len(),
                    "fetched state"
                );
                Ok(SyncEvent::Fetched {
                    state,
                    opponent_moves,
                    just_played,
                    status,
                })
            }
        }
    }

    pub async fn submit_move(&mut self, mv: &Move) -> Result<SyncEvent, SyncError> {
        let game_id = self.require_game_id()?;
        let request = MoveRequest::from(mv);
        match self.service.submit_move(&game_id, &request).await {
            Err(ServiceError::SessionNotFound) => self.recover().await,
            Err(ServiceError::Rejected { status, message }) => {
                info!(%game_id, %mv, status, %message, "move rejected");
                Ok(SyncEvent::MoveRejected {
                    reason: Some(message),
                })
            }
            Err(e) => Err(e.into()),
            Ok(resp) if !resp.success => {
                info!(%game_id, %mv, reason = ?resp.error, "move rejected");
                Ok(SyncEvent::MoveRejected { reason: resp.error })
            }
            Ok(resp) => {
                let opponent_moves = resp.opponent_moves();
                let MoveResponse {
                    game_state,
                    game_ended,
                    winner,
                    extra_turn,
                    goal_scored,
                    ..
                } = resp;
                let state = game_state.ok_or_else(|| missing("gameState"))?;
                debug!(%game_id, %mv, opponent_moves = opponent_moves.len(), "move applied");
                Ok(SyncEvent::MoveApplied(MoveResult {
                    state,
                    opponent_moves,
                    game_ended,
                    winner,
                    extra_turn,
                    goal_scored,
                }))
            }
        }
    }

    /// Same game id, fresh board.
    pub async fn restart(&mut self) -> Result<SyncEvent, SyncError> {
        let game_id = self.require_game_id()?;
        match self.service.restart(&game_id).await {
            Err(ServiceError::SessionNotFound) => self.recover().await,
            Err(e) => Err(e.into()),
            Ok(resp) if !resp.success => Err(SyncError::Refused(
                resp.error.unwrap_or_else(|| "restart refused".to_string()),
            )),
            Ok(resp) => {
                info!(%game_id, "game restarted");
                let state = resp.game_state.ok_or_else(|| missing("gameState"))?;
                Ok(SyncEvent::Restarted { state })
            }
        }
    }

    /// Run a controller command.
    pub async fn execute(&mut self, command: Command) -> Result<SyncEvent, SyncError> {
        match command {
            Command::Submit(mv) => self.submit_move(&mv).await,
            Command::Refetch => self.fetch_state().await,
        }
    }

    pub async fn legal_moves(&self) -> Result<LegalMoveSet, SyncError> {
        let game_id = self.require_game_id()?;
        let resp = self.service.legal_moves(&game_id).await?;
        let team = resp.current_team;
        Ok(LegalMoveSet::new(
            resp.legal_moves
                .iter()
                .map(|m| Move::new(m.kind, m.from, m.to, team))
                .collect(),
        ))
    }

    pub async fn health(&self) -> Result<HealthResponse, SyncError> {
        Ok(self.service.health().await?)
    }

    pub async fn agents(&self) -> Result<AgentsResponse, SyncError> {
        Ok(self.service.agents().await?)
    }

    /// Overwrite the stored descriptor wholesale, keeping the game id.
    ///
    /// Gameplay settings take effect on the next created or recovered game;
    /// cosmetics apply at once.
    pub fn update_settings(
        &mut self,
        config: SessionConfig,
        cosmetics: Cosmetics,
    ) -> Result<(), SyncError> {
        let Some(current) = self.descriptor.as_ref() else {
            return Err(SyncError::NoSession);
        };
        let descriptor = SessionDescriptor::new(current.game_id.clone(), config, cosmetics);
        self.store.save(&descriptor)?;
        debug!(game_id = %descriptor.game_id, "session settings updated");
        self.descriptor = Some(descriptor);
        Ok(())
    }

    /// Forget the session (explicit leave).
    pub fn leave(&mut self) -> Result<(), SyncError> {
        if let Some(d) = self.descriptor.take() {
            info!(game_id = %d.game_id, "left session");
        }
        self.store.clear()?;
        Ok(())
    }

    async fn create_game(
        &mut self,
        config: &SessionConfig,
        cosmetics: Cosmetics,
    ) -> Result<(GameState, bool), SyncError> {
        let resp = self.service.create_game(&config.to_request()).await?;
        if !resp.success {
            return Err(SyncError::Refused(
                resp.error.unwrap_or_else(|| "game creation refused".to_string()),
            ));
        }
        let game_id = resp.game_id.ok_or_else(|| missing("gameId"))?;
        let state = resp.game_state.ok_or_else(|| missing("gameState"))?;
        info!(%game_id, level = config.level, mode = config.mode.as_str(), "session created");

        let descriptor = SessionDescriptor::new(game_id, config.clone(), cosmetics);
        let persisted = match self.store.save(&descriptor) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "could not persist session descriptor");
                false
            }
        };
        self.descriptor = Some(descriptor);
        Ok((state, persisted))
    }

    async fn recover(&mut self) -> Result<SyncEvent, SyncError> {
        let Some(previous) = self.descriptor.clone() else {
            return Err(SyncError::NoSession);
        };
        warn!(game_id = %previous.game_id, "server lost the session, recreating");
        let (state, persisted) = self
            .create_game(&previous.config, previous.cosmetics)
            .await?;
        Ok(SyncEvent::SessionRecovered {
            config: previous.config,
            state,
            persisted,
        })
    }

    fn require_game_id(&self) -> Result<String, SyncError> {
        self.game_id()
            .map(str::to_string)
            .ok_or(SyncError::NoSession)
    }
}

fn missing(field: &str) -> SyncError {
    SyncError::Service(ServiceError::Decode(format!("response has no {field}")))
}
