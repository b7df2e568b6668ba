//! Board orchestration.
//!
//! [`BoardController`] is the only owner of the authoritative snapshot and of
//! everything drawn on top of it. It performs no I/O:
//!
//! ```text
//!   pointer(input) ──▶ GestureController ──Commit──▶ Command::Submit ─┐
//!   tick(now)      ──▶ AnimationSequencer / TurnClock ──auto-move──▶ ─┤
//!                                                                     ▼
//!                               host runs SessionSync::execute(command)
//!                                                                     │
//!   apply(result)  ◀──────────────── SyncEvent / SyncError ◀─────────┘
//! ```
//!
//! While a command is outstanding input stays locked; any result or error
//! releases it. A rejected move yields [`Command::Refetch`], which the host
//! runs the same way.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::animation::{AnimationEvent, AnimationSequencer, Entity};
use crate::clock::{ClockGate, TurnClock};
use crate::config::ClientConfig;
use crate::coords::{CoordinateMapper, DisplayCell, Orientation};
use crate::error::{ServiceError, SyncError};
use crate::gesture::{GestureContext, GestureController, GestureOutcome, PointerInput, Selection};
use crate::legal::LegalMoveSet;
use crate::protocol::{GameState, GameStatus, ScoreModel, Winner};
use crate::session::{GameService, SessionConfig, SessionStore, SessionSync, SyncEvent};
use crate::{Move, Team};

/// Work the host must perform on the controller's behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Submit(Move),
    Refetch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    /// Ball clicked with no legal kick.
    NeutralBall,
    /// The server lost the game and a new one was started.
    SessionRecovered,
    NetworkError,
    /// The session descriptor could not be read or written.
    StorageError,
    /// An action needed a game and there is none.
    NoSession,
    ExtraTurn,
    /// The turn clock ran out and a move was played automatically.
    TimeExpired,
}

/// Non-blocking banner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub expires_at: u64,
}

/// Blocking dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Dialog {
    Goal { team: Team, score: ScoreModel },
    GameOver { winner: Option<Winner>, score: ScoreModel },
}

// =============================================================================
// Render model
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceView {
    pub team: Team,
    pub cell: DisplayCell,
    pub goalkeeper: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MoveView {
    pub from: DisplayCell,
    pub to: DisplayCell,
}

/// Everything a renderer needs for one frame, in display space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub rows: u8,
    pub cols: u8,
    pub orientation: Orientation,
    /// Static pieces, minus any piece currently drawn by the overlay.
    pub pieces: Vec<PieceView>,
    /// Ball as the viewer should see it (mid-flight during a kick).
    pub ball: Option<DisplayCell>,
    /// Piece being animated.
    pub moving: Option<PieceView>,
    pub selection: Option<DisplayCell>,
    pub targets: Vec<DisplayCell>,
    pub hover: Option<DisplayCell>,
    pub last_move: Option<MoveView>,
    pub current_team: Option<Team>,
    pub countdown: Option<u32>,
    pub score: ScoreModel,
    pub notices: Vec<Notice>,
    pub dialog: Option<Dialog>,
    pub input_enabled: bool,
}

// =============================================================================
// Controller
// =============================================================================

pub struct BoardController {
    session: Option<SessionConfig>,
    snapshot: Option<GameState>,
    legal: LegalMoveSet,
    status: GameStatus,
    gestures: GestureController,
    sequencer: AnimationSequencer,
    clock: TurnClock,
    mapper: CoordinateMapper,
    input_locked: bool,
    pending_move: Option<Move>,
    modal_open: bool,
    dialog: Option<Dialog>,
    queued_dialog: Option<Dialog>,
    game_over: bool,
    /// The computer is to move but has not played yet; refetch once nothing
    /// is on screen.
    awaiting_opponent: bool,
    notices: Vec<Notice>,
    notice_ttl_ms: u64,
    history: Vec<Move>,
}

impl BoardController {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            session: None,
            snapshot: None,
            legal: LegalMoveSet::default(),
            status: GameStatus::Active,
            gestures: GestureController::new(),
            sequencer: AnimationSequencer::new(config.timing),
            clock: TurnClock::disabled(),
            mapper: CoordinateMapper::default(),
            input_locked: false,
            pending_move: None,
            modal_open: false,
            dialog: None,
            queued_dialog: None,
            game_over: false,
            awaiting_opponent: false,
            notices: Vec::new(),
            notice_ttl_ms: config.notice_ttl_ms,
            history: Vec::new(),
        }
    }

    /// Adopt the settings of the session being displayed (create, resume).
    pub fn configure(&mut self, session: &SessionConfig) {
        self.clock
            .configure(session.timer.enabled, session.timer.seconds);
        if let Some(state) = &self.snapshot {
            self.clock.observe(state.current_team);
        }
        self.session = Some(session.clone());
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> Option<&GameState> {
        self.snapshot.as_ref()
    }

    pub fn legal_moves(&self) -> &LegalMoveSet {
        &self.legal
    }

    pub fn selection(&self) -> Option<Selection> {
        self.gestures.selection()
    }

    #[inline]
    pub fn is_input_locked(&self) -> bool {
        self.input_locked
    }

    #[inline]
    pub fn is_animating(&self) -> bool {
        self.sequencer.is_active()
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn dialog(&self) -> Option<Dialog> {
        self.dialog
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Moves applied since the last new game or restart.
    pub fn history(&self) -> &[Move] {
        &self.history
    }

    pub fn orientation(&self) -> Orientation {
        self.mapper.orientation()
    }

    pub fn remaining_seconds(&self) -> Option<u32> {
        self.clock.remaining()
    }

    /// Side the local human may act for right now.
    pub fn actor(&self) -> Option<Team> {
        let state = self.snapshot.as_ref()?;
        let session = self.session.as_ref()?;
        session
            .human_to_move(state.current_team)
            .then_some(state.current_team)
    }

    /// Anything that forbids input and the turn clock.
    pub fn is_blocked(&self) -> bool {
        self.input_locked
            || self.modal_open
            || self.dialog.is_some()
            || self.game_over
            || self.sequencer.is_active()
    }

    // -------------------------------------------------------------------------
    // Input
    // -------------------------------------------------------------------------

    pub fn pointer(&mut self, input: PointerInput, now_ms: u64) -> Option<Command> {
        let actor = self.actor();
        let blocked = self.is_blocked();
        let state = self.snapshot.as_ref()?;
        let ctx = GestureContext {
            state,
            legal: &self.legal,
            actor,
            blocked,
            mapper: self.mapper,
        };
        match self.gestures.handle(input, &ctx) {
            GestureOutcome::Commit(mv) => Some(self.commit(mv, now_ms)),
            GestureOutcome::NeutralBall(_) => {
                self.notify(
                    NoticeKind::NeutralBall,
                    "The ball has no legal kick right now.",
                    now_ms,
                );
                None
            }
            _ => None,
        }
    }

    fn commit(&mut self, mv: Move, now_ms: u64) -> Command {
        info!(%mv, "submitting move");
        self.input_locked = true;
        self.pending_move = Some(mv);
        self.sequencer.flash(mv, now_ms);
        Command::Submit(mv)
    }

    /// Open or close a host-owned modal (settings, rules). Blocks input.
    pub fn set_modal_open(&mut self, open: bool) {
        self.modal_open = open;
        if open {
            self.gestures.clear();
        }
    }

    /// Close the open dialog. Returns the refetch that lets the computer
    /// play when it was waiting for the dialog.
    pub fn dismiss_dialog(&mut self) -> Option<Command> {
        if let Some(dialog) = self.dialog.take() {
            debug!(?dialog, "dialog dismissed");
        }
        self.poll_opponent()
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.mapper = CoordinateMapper::new(orientation);
        self.gestures.clear();
    }

    // -------------------------------------------------------------------------
    // Time
    // -------------------------------------------------------------------------

    /// Advance animation, notices and the turn clock to `now_ms`.
    ///
    /// Returns the automatic move when the clock runs out.
    pub fn tick<R: Rng + ?Sized>(&mut self, now_ms: u64, rng: &mut R) -> Option<Command> {
        self.notices.retain(|n| n.expires_at > now_ms);

        for event in self.sequencer.advance(now_ms) {
            if let AnimationEvent::SequenceFinished { .. } = event {
                self.open_queued_dialog();
            }
        }
        if let Some(command) = self.poll_opponent() {
            return Some(command);
        }

        self.snapshot.as_ref()?;
        let gate = ClockGate {
            human_turn: self.actor().is_some(),
            blocked: self.is_blocked(),
        };
        if !self.clock.poll(now_ms, gate) {
            return None;
        }
        let mv = TurnClock::pick(&self.legal, rng)?;
        self.gestures.clear();
        self.notify(
            NoticeKind::TimeExpired,
            "Time is up, a move was played for you.",
            now_ms,
        );
        Some(self.commit(mv, now_ms))
    }

    /// Earliest instant at which `tick` has something to do.
    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.sequencer.next_deadline(),
            self.clock.next_deadline(),
            self.notices.iter().map(|n| n.expires_at).min(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // -------------------------------------------------------------------------
    // Sync results
    // -------------------------------------------------------------------------

    /// Feed the outcome of an executed [`Command`] or session call.
    pub fn apply(&mut self, result: Result<SyncEvent, SyncError>, now_ms: u64) -> Option<Command> {
        self.input_locked = false;
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "sync failed");
                self.pending_move = None;
                let (kind, message) = failure_notice(&e);
                self.notify(kind, message, now_ms);
                return None;
            }
        };

        match event {
            SyncEvent::Created {
                config,
                state,
                persisted,
            } => {
                self.reset_game();
                self.configure(&config);
                if !persisted {
                    self.notify_unsaved(now_ms);
                }
                self.install(state, Vec::new(), now_ms);
                self.expect_opponent(true);
            }
            SyncEvent::SessionRecovered {
                config,
                state,
                persisted,
            } => {
                self.reset_game();
                self.configure(&config);
                self.notify(
                    NoticeKind::SessionRecovered,
                    "The server restarted; a new game was started with your settings.",
                    now_ms,
                );
                if !persisted {
                    self.notify_unsaved(now_ms);
                }
                self.install(state, Vec::new(), now_ms);
                self.expect_opponent(true);
            }
            SyncEvent::Restarted { state } => {
                self.reset_game();
                self.install(state, Vec::new(), now_ms);
                self.expect_opponent(true);
            }
            SyncEvent::Fetched {
                state,
                opponent_moves,
                just_played,
                status,
            } => {
                self.pending_move = None;
                self.status = status;
                if status == GameStatus::Completed && !self.game_over {
                    info!("game already finished");
                    self.game_over = true;
                    self.queued_dialog = Some(Dialog::GameOver {
                        winner: None,
                        score: state.score,
                    });
                }
                // an echoed lastAiMove is only news if the position moved since
                // the last snapshot
                let fresh = match &self.snapshot {
                    Some(prev) => prev.players != state.players || prev.ball != state.ball,
                    None => just_played,
                };
                let replay = if fresh { opponent_moves } else { Vec::new() };
                self.history.extend(replay.iter().copied());
                self.install(state, replay, now_ms);
            }
            SyncEvent::MoveApplied(result) => {
                self.history.extend(self.pending_move.take());
                self.history.extend(result.opponent_moves.iter().copied());
                if let Some(team) = result.goal_scored {
                    info!(%team, "goal");
                    self.queued_dialog = Some(Dialog::Goal {
                        team,
                        score: result.state.score,
                    });
                }
                if result.game_ended {
                    info!(winner = ?result.winner, "game over");
                    self.game_over = true;
                    self.status = GameStatus::Completed;
                    self.queued_dialog = Some(Dialog::GameOver {
                        winner: result.winner,
                        score: result.state.score,
                    });
                }
                if result.extra_turn {
                    self.notify(NoticeKind::ExtraTurn, "Extra turn!", now_ms);
                }
                let replied = !result.opponent_moves.is_empty();
                self.install(result.state, result.opponent_moves, now_ms);
                self.expect_opponent(!replied);
            }
            SyncEvent::MoveRejected { reason } => {
                info!(?reason, "move rejected, refetching");
                self.pending_move = None;
                self.gestures.clear();
                if !self.sequencer.is_active() {
                    self.sequencer.teardown();
                }
                self.input_locked = true;
                return Some(Command::Refetch);
            }
        }
        self.poll_opponent()
    }

    /// Note that the computer still owes a move when `idle` (nothing came
    /// back for it) and the snapshot says it is the computer's turn.
    fn expect_opponent(&mut self, idle: bool) {
        let computer_turn = match (&self.session, &self.snapshot) {
            (Some(session), Some(state)) => !session.human_to_move(state.current_team),
            _ => false,
        };
        self.awaiting_opponent = idle && computer_turn && !self.game_over;
    }

    /// The refetch that makes the service play the computer's turn, once no
    /// replay or dialog is in the way.
    fn poll_opponent(&mut self) -> Option<Command> {
        if !self.awaiting_opponent
            || self.sequencer.is_active()
            || self.dialog.is_some()
            || self.queued_dialog.is_some()
        {
            return None;
        }
        debug!("computer to move, refetching");
        self.awaiting_opponent = false;
        self.input_locked = true;
        Some(Command::Refetch)
    }

    /// Swap in a new authoritative snapshot and start replaying `opponent_moves`.
    fn install(&mut self, state: GameState, opponent_moves: Vec<Move>, now_ms: u64) {
        self.sequencer.start(opponent_moves, now_ms);
        self.legal = LegalMoveSet::from_state(&state);
        self.gestures.clear();
        self.clock.observe(state.current_team);
        debug!(
            team = %state.current_team,
            legal = self.legal.len(),
            animating = self.sequencer.is_active(),
            "snapshot applied"
        );
        self.snapshot = Some(state);
        if !self.sequencer.is_active() {
            self.open_queued_dialog();
        }
    }

    fn reset_game(&mut self) {
        self.sequencer.teardown();
        self.history.clear();
        self.dialog = None;
        self.queued_dialog = None;
        self.game_over = false;
        self.awaiting_opponent = false;
        self.status = GameStatus::Active;
        self.pending_move = None;
    }

    fn open_queued_dialog(&mut self) {
        if let Some(dialog) = self.queued_dialog.take() {
            self.dialog = Some(dialog);
        }
    }

    fn notify_unsaved(&mut self, now_ms: u64) {
        self.notify(
            NoticeKind::StorageError,
            "This game could not be saved and will be lost on reload.",
            now_ms,
        );
    }

    fn notify(&mut self, kind: NoticeKind, message: &str, now_ms: u64) {
        self.notices.retain(|n| n.kind != kind);
        self.notices.push(Notice {
            kind,
            message: message.to_string(),
            expires_at: now_ms + self.notice_ttl_ms,
        });
    }

    /// Stop playback and the countdown (board unmounted, session left).
    pub fn teardown(&mut self) {
        self.sequencer.teardown();
        self.clock.stop();
        self.gestures.clear();
        self.notices.clear();
        self.queued_dialog = None;
        self.awaiting_opponent = false;
        self.input_locked = false;
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    pub fn view(&self) -> BoardView {
        let mapper = self.mapper;
        let overlay = self.sequencer.overlay();
        let dims = self
            .snapshot
            .as_ref()
            .map(|s| s.board_dimensions)
            .unwrap_or_default();
        let (rows, cols) = dims.display(mapper.orientation());

        let pieces = self
            .snapshot
            .iter()
            .flat_map(|s| s.players.iter())
            .filter(|p| !self.sequencer.hides_piece_at(p.position))
            .map(|p| PieceView {
                team: p.team,
                cell: mapper.to_display(p.position),
                goalkeeper: p.is_goalkeeper,
            })
            .collect();

        let ball = if self.sequencer.holds_ball() {
            overlay.and_then(|o| o.ball)
        } else {
            self.snapshot.as_ref().map(|s| s.ball)
        }
        .map(|b| mapper.to_display(b));

        let moving = overlay.and_then(|o| match o.entity {
            Entity::Piece { team } => Some(PieceView {
                team,
                cell: mapper.to_display(o.at),
                goalkeeper: self
                    .snapshot
                    .as_ref()
                    .and_then(|s| s.piece_at(o.hidden))
                    .is_some_and(|p| p.is_goalkeeper),
            }),
            Entity::Ball => None,
        });

        BoardView {
            rows,
            cols,
            orientation: mapper.orientation(),
            pieces,
            ball,
            moving,
            selection: self.gestures.selection().map(|s| mapper.to_display(s.origin())),
            targets: self
                .gestures
                .targets()
                .into_iter()
                .map(|t| mapper.to_display(t))
                .collect(),
            hover: self.gestures.hover().map(|h| mapper.to_display(h)),
            last_move: self.sequencer.last_move().map(|m| MoveView {
                from: mapper.to_display(m.from),
                to: mapper.to_display(m.to),
            }),
            current_team: self.snapshot.as_ref().map(|s| s.current_team),
            countdown: self.clock.remaining(),
            score: self.snapshot.as_ref().map(|s| s.score).unwrap_or_default(),
            notices: self.notices.clone(),
            dialog: self.dialog,
            input_enabled: self.actor().is_some() && !self.is_blocked(),
        }
    }
}

fn failure_notice(error: &SyncError) -> (NoticeKind, &'static str) {
    match error {
        SyncError::NoSession => (NoticeKind::NoSession, "No game in progress. Start a new game."),
        SyncError::Store(_) => (
            NoticeKind::StorageError,
            "Could not access the saved game in this browser.",
        ),
        SyncError::Refused(_) | SyncError::Service(ServiceError::Rejected { .. }) => (
            NoticeKind::NetworkError,
            "The game server refused the request.",
        ),
        SyncError::Service(ServiceError::Decode(_)) => (
            NoticeKind::NetworkError,
            "The game server sent an unreadable reply.",
        ),
        SyncError::Service(ServiceError::SessionNotFound) => (
            NoticeKind::NetworkError,
            "The game is no longer known to the server.",
        ),
        SyncError::Service(ServiceError::Transport(_)) => (
            NoticeKind::NetworkError,
            "Could not reach the game server.",
        ),
    }
}

/// Run `command` and any follow-up it triggers (a rejection's refetch, or the
/// fetch that lets the computer play).
///
/// `now` supplies the current time after each round-trip.
pub async fn drive<S, T>(
    controller: &mut BoardController,
    sync: &mut SessionSync<S, T>,
    command: Option<Command>,
    now: impl Fn() -> u64,
) where
    S: GameService,
    T: SessionStore,
{
    let mut next = command;
    while let Some(command) = next {
        let result = sync.execute(command).await;
        next = controller.apply(result, now());
    }
}
