//! End-to-end board flows against an in-memory game service.
//!
//! The fake service keeps one game per id, applies accepted moves, can be told
//! to reject the next move, to play the computer's turn on the next fetch, or
//! to forget every game (a backend restart), and records every request it sees.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use mastergoal_core::controller::{drive, Command, NoticeKind};
use mastergoal_core::error::{ServiceError, StoreError};
use mastergoal_core::protocol::{
    AgentsResponse, AiMoveModel, GameState, GameStatus, HealthResponse, LegalMoveModel,
    LegalMovesResponse, MoveRequest, MoveResponse, NewGameRequest, NewGameResponse,
    RestartResponse, StateResponse,
};
use mastergoal_core::session::{Cosmetics, Difficulty, SyncEvent, TimerSettings};
use mastergoal_core::{
    BoardController, ClientConfig, DisplayCell, GameService, MemorySessionStore, MoveKind,
    PointerInput, Position, SessionConfig, SessionDescriptor, SessionStore, SessionSync, Team,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde_json::json;

// =============================================================================
// Fake service
// =============================================================================

#[derive(Default)]
struct Backend {
    games: RefCell<HashMap<String, GameState>>,
    created: RefCell<Vec<NewGameRequest>>,
    submitted: RefCell<Vec<MoveRequest>>,
    fetches: Cell<usize>,
    next_id: Cell<u32>,
    reject_next: Cell<bool>,
    ai_reply: RefCell<Vec<AiMoveModel>>,
    /// Computer turn played by the next fetch, after which the human moves.
    ai_on_fetch: RefCell<Vec<AiMoveModel>>,
    legal_after_move: RefCell<Vec<LegalMoveModel>>,
}

impl Backend {
    fn forget_all(&self) {
        self.games.borrow_mut().clear();
    }
}

#[derive(Clone, Default)]
struct FakeService(Rc<Backend>);

fn apply_ai(state: &mut GameState, ai_moves: &[AiMoveModel]) {
    for ai in ai_moves {
        if ai.move_type == MoveKind::Kick {
            state.ball = ai.to;
        } else if let Some(piece) = state.players.iter_mut().find(|p| p.position == ai.from) {
            piece.position = ai.to;
        }
    }
}

fn ai_move(team: &str, kind: &str, from: (u8, u8), to: (u8, u8)) -> AiMoveModel {
    serde_json::from_value(json!({
        "player": team, "moveType": kind,
        "from": {"row": from.0, "col": from.1}, "to": {"row": to.0, "col": to.1}
    }))
    .unwrap()
}

fn initial_state() -> GameState {
    serde_json::from_value(json!({
        "players": [
            {"team": "LEFT", "id": 0, "position": {"row": 7, "col": 5}, "isGoalkeeper": false},
            {"team": "LEFT", "id": 1, "position": {"row": 1, "col": 5}, "isGoalkeeper": true},
            {"team": "RIGHT", "id": 2, "position": {"row": 10, "col": 5}, "isGoalkeeper": false},
            {"team": "RIGHT", "id": 3, "position": {"row": 13, "col": 5}, "isGoalkeeper": true}
        ],
        "ball": {"row": 7, "col": 7},
        "currentTeam": "LEFT",
        "score": {"LEFT": 0, "RIGHT": 0},
        "legalMoves": [
            {"type": "move", "from": {"row": 7, "col": 5}, "to": {"row": 8, "col": 5}},
            {"type": "move", "from": {"row": 7, "col": 5}, "to": {"row": 6, "col": 5}},
            {"type": "move", "from": {"row": 1, "col": 5}, "to": {"row": 2, "col": 5}}
        ],
        "turnCount": 0,
        "level": 1,
        "boardDimensions": {"rows": 15, "cols": 11}
    }))
    .unwrap()
}

impl GameService for FakeService {
    async fn create_game(&self, request: &NewGameRequest) -> Result<NewGameResponse, ServiceError> {
        let b = &self.0;
        b.created.borrow_mut().push(request.clone());
        b.next_id.set(b.next_id.get() + 1);
        let id = format!("game-{}", b.next_id.get());
        let state = initial_state();
        b.games.borrow_mut().insert(id.clone(), state.clone());
        Ok(NewGameResponse {
            success: true,
            game_id: Some(id),
            game_state: Some(state),
            error: None,
        })
    }

    async fn fetch_state(&self, game_id: &str) -> Result<StateResponse, ServiceError> {
        let b = &self.0;
        b.fetches.set(b.fetches.get() + 1);
        let mut games = b.games.borrow_mut();
        let state = games.get_mut(game_id).ok_or(ServiceError::SessionNotFound)?;
        let ai_moves = b.ai_on_fetch.take();
        if let Some(first) = ai_moves.first() {
            apply_ai(state, &ai_moves);
            state.current_team = first.player.opponent();
        }
        Ok(StateResponse {
            success: true,
            game_state: Some(state.clone()),
            status: Some(GameStatus::Active),
            ai_moves,
            last_ai_move: None,
            move_history: Vec::new(),
            error: None,
        })
    }

    async fn submit_move(
        &self,
        game_id: &str,
        request: &MoveRequest,
    ) -> Result<MoveResponse, ServiceError> {
        let b = &self.0;
        b.submitted.borrow_mut().push(*request);
        let mut games = b.games.borrow_mut();
        let state = games.get_mut(game_id).ok_or(ServiceError::SessionNotFound)?;
        if b.reject_next.replace(false) {
            return Err(ServiceError::Rejected {
                status: 400,
                message: "Invalid move".to_string(),
            });
        }
        for piece in state.players.iter_mut() {
            if piece.position == request.from_pos {
                piece.position = request.to_pos;
            }
        }
        let ai_moves = b.ai_reply.borrow().clone();
        apply_ai(state, &ai_moves);
        state.turn_count += 1;
        state.legal_moves = b.legal_after_move.borrow().clone();
        Ok(MoveResponse {
            success: true,
            game_state: Some(state.clone()),
            last_ai_move: ai_moves.last().cloned(),
            ai_moves,
            ..MoveResponse::default()
        })
    }

    async fn restart(&self, game_id: &str) -> Result<RestartResponse, ServiceError> {
        let mut games = self.0.games.borrow_mut();
        let state = games.get_mut(game_id).ok_or(ServiceError::SessionNotFound)?;
        *state = initial_state();
        Ok(RestartResponse {
            success: true,
            game_state: Some(state.clone()),
            error: None,
        })
    }

    async fn legal_moves(&self, game_id: &str) -> Result<LegalMovesResponse, ServiceError> {
        let games = self.0.games.borrow();
        let state = games.get(game_id).ok_or(ServiceError::SessionNotFound)?;
        Ok(LegalMovesResponse {
            success: true,
            legal_moves: state.legal_moves.clone(),
            current_team: state.current_team,
        })
    }

    async fn health(&self) -> Result<HealthResponse, ServiceError> {
        Ok(HealthResponse {
            status: "healthy".to_string(),
            timestamp: None,
            active_games: Some(self.0.games.borrow().len() as u64),
        })
    }

    async fn agents(&self) -> Result<AgentsResponse, ServiceError> {
        Ok(AgentsResponse {
            agents: json!({"medium": {"name": "Minimax"}}),
        })
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    backend: Rc<Backend>,
    controller: BoardController,
    sync: SessionSync<FakeService, MemorySessionStore>,
    now: Rc<Cell<u64>>,
}

impl Harness {
    async fn start(config: SessionConfig) -> Harness {
        Harness::start_with(FakeService::default(), config).await
    }

    /// Create a game and run whatever the controller asks for next.
    async fn start_with(service: FakeService, config: SessionConfig) -> Harness {
        let backend = Rc::clone(&service.0);
        let mut sync = SessionSync::new(service, MemorySessionStore::new());
        let mut controller = BoardController::new(&ClientConfig::default());
        let created = sync.create_session(config, Cosmetics::default()).await;
        let follow_up = controller.apply(created, 0);
        let mut h = Harness {
            backend,
            controller,
            sync,
            now: Rc::new(Cell::new(0)),
        };
        h.run(follow_up).await;
        h
    }

    async fn run(&mut self, command: Option<Command>) {
        let now = Rc::clone(&self.now);
        drive(&mut self.controller, &mut self.sync, command, move || now.get()).await;
    }

    fn pointer(&mut self, input: PointerInput) -> Option<Command> {
        self.controller.pointer(input, self.now.get())
    }
}

fn cell(r: u8, c: u8) -> DisplayCell {
    DisplayCell::new(r, c)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_single_human_move_submits_once() {
    let mut h = Harness::start(SessionConfig::default()).await;

    assert!(h.pointer(PointerInput::Down(cell(7, 5))).is_none());
    let command = h.pointer(PointerInput::Up(cell(8, 5)));
    assert!(matches!(command, Some(Command::Submit(_))));
    h.run(command).await;

    let submitted = h.backend.submitted.borrow().clone();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].move_type, MoveKind::Move);
    assert_eq!(submitted[0].from_pos, Position::new(7, 5));
    assert_eq!(submitted[0].to_pos, Position::new(8, 5));

    let snapshot = h.controller.snapshot().unwrap();
    assert!(snapshot.piece_at(Position::new(8, 5)).is_some());
    assert!(!h.controller.is_input_locked());
    assert_eq!(h.controller.history().len(), 1);
}

#[tokio::test]
async fn test_rejected_move_refetches_and_drops_selection() {
    let mut h = Harness::start(SessionConfig::default()).await;
    h.backend.reject_next.set(true);
    let before = h.controller.snapshot().cloned();

    h.pointer(PointerInput::Down(cell(7, 5)));
    let command = h.pointer(PointerInput::Up(cell(6, 5)));
    h.run(command).await;

    assert_eq!(h.backend.submitted.borrow().len(), 1);
    assert_eq!(h.backend.fetches.get(), 1);
    assert_eq!(h.controller.snapshot().cloned(), before);
    assert!(h.controller.selection().is_none());
    assert!(!h.controller.is_input_locked());
    assert!(h.controller.history().is_empty());
}

#[tokio::test]
async fn test_lost_session_is_recreated_with_same_config() {
    let config = SessionConfig {
        level: 2,
        player_side: Team::Left,
        timer: TimerSettings {
            enabled: true,
            seconds: 45,
        },
        ..SessionConfig::default()
    };
    let mut h = Harness::start(config.clone()).await;
    let old_id = h.sync.game_id().unwrap().to_string();
    h.backend.forget_all();

    h.pointer(PointerInput::Down(cell(7, 5)));
    let command = h.pointer(PointerInput::Up(cell(8, 5)));
    h.run(command).await;

    let created = h.backend.created.borrow().clone();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0], created[1]);
    assert_eq!(created[1], config.to_request());

    let new_id = h.sync.game_id().unwrap().to_string();
    assert_ne!(new_id, old_id);
    let stored = h.sync.store().load().unwrap().unwrap();
    assert_eq!(stored.game_id, new_id);
    assert_eq!(stored.config, config);

    // the move that hit the 404 is not replayed
    assert_eq!(h.backend.submitted.borrow().len(), 1);
    assert!(h
        .controller
        .notices()
        .iter()
        .any(|n| n.kind == NoticeKind::SessionRecovered));
    assert_eq!(h.controller.snapshot().cloned(), Some(initial_state()));
}

#[tokio::test]
async fn test_countdown_expiry_plays_exactly_one_legal_move() {
    let config = SessionConfig {
        timer: TimerSettings {
            enabled: true,
            seconds: 3,
        },
        ..SessionConfig::default()
    };
    let mut h = Harness::start(config).await;
    let candidates: Vec<MoveRequest> = h
        .controller
        .legal_moves()
        .as_slice()
        .iter()
        .map(MoveRequest::from)
        .collect();
    assert_eq!(candidates.len(), 3);

    let mut rng = SmallRng::seed_from_u64(2024);
    for now in (0..20_000).step_by(100) {
        h.now.set(now);
        let command = h.controller.tick(now, &mut rng);
        h.run(command).await;
    }

    let submitted = h.backend.submitted.borrow().clone();
    assert_eq!(submitted.len(), 1);
    assert!(candidates.contains(&submitted[0]));
}

#[tokio::test]
async fn test_opponent_chain_is_replayed_before_input_returns() {
    let mut h = Harness::start(SessionConfig::default()).await;
    *h.backend.ai_reply.borrow_mut() = vec![
        ai_move("RIGHT", "move", (10, 5), (9, 5)),
        ai_move("RIGHT", "kick", (7, 7), (4, 7)),
    ];
    *h.backend.legal_after_move.borrow_mut() = vec![LegalMoveModel {
        kind: MoveKind::Move,
        from: Position::new(6, 5),
        to: Position::new(5, 5),
    }];

    h.pointer(PointerInput::Down(cell(7, 5)));
    let command = h.pointer(PointerInput::Up(cell(6, 5)));
    h.run(command).await;

    assert!(h.controller.is_animating());
    let view = h.controller.view();
    assert!(!view.input_enabled);
    assert_eq!(view.ball, Some(cell(7, 7)));
    assert!(!view.pieces.iter().any(|p| p.cell == cell(9, 5)));

    let mut rng = SmallRng::seed_from_u64(1);
    h.controller.tick(60_000, &mut rng);
    assert!(!h.controller.is_animating());
    let view = h.controller.view();
    assert!(view.input_enabled);
    assert_eq!(view.ball, Some(cell(4, 7)));
    assert_eq!(h.controller.history().len(), 3);
}

#[tokio::test]
async fn test_reload_resumes_stored_session() {
    let mut h = Harness::start(SessionConfig::default()).await;
    h.pointer(PointerInput::Down(cell(7, 5)));
    let command = h.pointer(PointerInput::Up(cell(8, 5)));
    h.run(command).await;
    let game_id = h.sync.game_id().unwrap().to_string();

    // a fresh page: new controller and sync over the same storage
    let store = h.sync.store().clone();
    let mut sync = SessionSync::new(FakeService(Rc::clone(&h.backend)), store);
    let descriptor = sync.resume().unwrap().cloned().unwrap();
    assert_eq!(descriptor.game_id, game_id);

    let mut controller = BoardController::new(&ClientConfig::default());
    controller.configure(&descriptor.config);
    drive(&mut controller, &mut sync, Some(Command::Refetch), || 0).await;
    assert!(controller
        .snapshot()
        .unwrap()
        .piece_at(Position::new(8, 5))
        .is_some());
    assert_eq!(controller.actor(), Some(Team::Left));
}

#[tokio::test]
async fn test_restart_keeps_game_id() {
    let mut h = Harness::start(SessionConfig::default()).await;
    let game_id = h.sync.game_id().unwrap().to_string();
    h.pointer(PointerInput::Down(cell(7, 5)));
    let command = h.pointer(PointerInput::Up(cell(8, 5)));
    h.run(command).await;

    let restarted = h.sync.restart().await;
    assert!(matches!(restarted, Ok(SyncEvent::Restarted { .. })));
    h.controller.apply(restarted, 10);
    assert_eq!(h.sync.game_id(), Some(game_id.as_str()));
    assert_eq!(h.controller.snapshot().cloned(), Some(initial_state()));
    assert!(h.controller.history().is_empty());
}

#[tokio::test]
async fn test_leave_clears_storage() {
    let mut h = Harness::start(SessionConfig::default()).await;
    assert!(h.sync.store().load().unwrap().is_some());
    h.controller.teardown();
    h.sync.leave().unwrap();
    assert!(h.sync.store().load().unwrap().is_none());
    assert!(h.sync.game_id().is_none());
    assert!(h.sync.fetch_state().await.is_err());
}

#[tokio::test]
async fn test_auxiliary_endpoints() {
    let h = Harness::start(SessionConfig::default()).await;
    let legal = h.sync.legal_moves().await.unwrap();
    assert_eq!(legal.len(), 3);
    assert!(legal.as_slice().iter().all(|m| m.acting_team == Team::Left));
    assert_eq!(h.sync.health().await.unwrap().active_games, Some(1));
    assert!(h.sync.agents().await.unwrap().agents.is_object());
}

#[tokio::test]
async fn test_lost_session_on_fetch_is_recreated_with_same_config() {
    let config = SessionConfig {
        level: 3,
        difficulty: Difficulty::Hard,
        player_side: Team::Left,
        ..SessionConfig::default()
    };
    let mut h = Harness::start(config.clone()).await;
    let old_id = h.sync.game_id().unwrap().to_string();
    h.backend.forget_all();

    match h.sync.fetch_state().await.unwrap() {
        SyncEvent::SessionRecovered {
            config: recovered,
            persisted,
            ..
        } => {
            assert_eq!(recovered.level, 3);
            assert_eq!(recovered.difficulty, Difficulty::Hard);
            assert_eq!(recovered.player_side, Team::Left);
            assert!(persisted);
        }
        other => panic!("expected recovery, got {other:?}"),
    }
    assert_ne!(h.sync.game_id().unwrap(), old_id);
    let created = h.backend.created.borrow().clone();
    assert_eq!(created.len(), 2);
    assert_eq!(created[1], config.to_request());

    // the same path through the controller on a reload
    h.backend.forget_all();
    h.run(Some(Command::Refetch)).await;
    assert!(h
        .controller
        .notices()
        .iter()
        .any(|n| n.kind == NoticeKind::SessionRecovered));
    assert_eq!(h.backend.created.borrow().len(), 3);
    assert_eq!(h.controller.actor(), Some(Team::Left));
}

#[tokio::test]
async fn test_resume_replays_computer_turn_played_on_fetch() {
    let mut h = Harness::start(SessionConfig::default()).await;
    h.pointer(PointerInput::Down(cell(7, 5)));
    let command = h.pointer(PointerInput::Up(cell(8, 5)));
    h.run(command).await;
    *h.backend.ai_on_fetch.borrow_mut() = vec![
        ai_move("RIGHT", "move", (10, 5), (9, 5)),
        ai_move("RIGHT", "kick", (7, 7), (5, 7)),
    ];

    // a fresh page resumes, and the service plays the computer on that fetch
    let store = h.sync.store().clone();
    let mut sync = SessionSync::new(FakeService(Rc::clone(&h.backend)), store);
    let descriptor = sync.resume().unwrap().cloned().unwrap();
    let mut controller = BoardController::new(&ClientConfig::default());
    controller.configure(&descriptor.config);
    drive(&mut controller, &mut sync, Some(Command::Refetch), || 0).await;

    assert!(controller.is_animating());
    let view = controller.view();
    assert!(!view.input_enabled);
    assert_eq!(view.ball, Some(cell(7, 7)));
    assert_eq!(controller.history().len(), 2);

    let mut rng = SmallRng::seed_from_u64(1);
    controller.tick(60_000, &mut rng);
    let view = controller.view();
    assert!(view.input_enabled);
    assert_eq!(view.ball, Some(cell(5, 7)));
    assert!(view.pieces.iter().any(|p| p.cell == cell(9, 5)));
}

#[tokio::test]
async fn test_computer_opens_when_human_plays_right() {
    let service = FakeService::default();
    *service.0.ai_on_fetch.borrow_mut() = vec![ai_move("LEFT", "move", (7, 5), (6, 5))];
    let config = SessionConfig {
        player_side: Team::Right,
        ..SessionConfig::default()
    };
    let mut h = Harness::start_with(service, config).await;

    assert_eq!(h.backend.fetches.get(), 1);
    assert!(h.controller.is_animating());
    let mut rng = SmallRng::seed_from_u64(1);
    assert_eq!(h.controller.tick(60_000, &mut rng), None);
    assert_eq!(h.controller.actor(), Some(Team::Right));
    assert!(h
        .controller
        .snapshot()
        .unwrap()
        .piece_at(Position::new(6, 5))
        .is_some());
}

/// Storage that refuses every write, like a browser with storage disabled.
#[derive(Clone, Default)]
struct ReadOnlyStore;

impl SessionStore for ReadOnlyStore {
    fn load(&self) -> Result<Option<SessionDescriptor>, StoreError> {
        Ok(None)
    }

    fn save(&mut self, _: &SessionDescriptor) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("quota exceeded".to_string()))
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_unsaved_game_still_plays_and_warns() {
    let mut sync = SessionSync::new(FakeService::default(), ReadOnlyStore);
    let created = sync
        .create_session(SessionConfig::default(), Cosmetics::default())
        .await;
    assert!(matches!(
        created,
        Ok(SyncEvent::Created {
            persisted: false,
            ..
        })
    ));
    assert!(sync.game_id().is_some());

    let mut controller = BoardController::new(&ClientConfig::default());
    assert_eq!(controller.apply(created, 0), None);
    assert!(controller
        .notices()
        .iter()
        .any(|n| n.kind == NoticeKind::StorageError));
    assert_eq!(controller.actor(), Some(Team::Left));
}
