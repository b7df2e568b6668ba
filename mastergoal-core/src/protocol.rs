//! JSON models exchanged with the game service.
//!
//! Field names follow the service contract (camelCase). Optional fields the
//! service omits in some responses default so that older and newer backends
//! both decode.

use serde::{Deserialize, Serialize};

use crate::coords::BoardDimensions;
use crate::{Move, MoveKind, Position, Team};

// =============================================================================
// Game state
// =============================================================================

/// A player token as reported by the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceModel {
    pub team: Team,
    #[serde(default)]
    pub id: Option<u32>,
    pub position: Position,
    #[serde(default)]
    pub is_goalkeeper: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreModel {
    #[serde(rename = "LEFT", default)]
    pub left: u32,
    #[serde(rename = "RIGHT", default)]
    pub right: u32,
}

impl ScoreModel {
    pub fn for_team(&self, team: Team) -> u32 {
        match team {
            Team::Left => self.left,
            Team::Right => self.right,
        }
    }
}

/// Legal move entry: `{type, from, to}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalMoveModel {
    #[serde(rename = "type")]
    pub kind: MoveKind,
    pub from: Position,
    pub to: Position,
}

/// Authoritative snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub players: Vec<PieceModel>,
    pub ball: Position,
    pub current_team: Team,
    #[serde(default)]
    pub score: ScoreModel,
    #[serde(default)]
    pub legal_moves: Vec<LegalMoveModel>,
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub passes_count: u32,
    #[serde(default)]
    pub skip_next_turn: bool,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub board_dimensions: BoardDimensions,
}

fn default_level() -> u8 {
    1
}

impl GameState {
    /// Piece standing on `pos`, if any.
    pub fn piece_at(&self, pos: Position) -> Option<&PieceModel> {
        self.players.iter().find(|p| p.position == pos)
    }

    /// Legal moves as client moves, attributed to the side to move.
    pub fn moves(&self) -> Vec<Move> {
        self.legal_moves
            .iter()
            .map(|m| Move::new(m.kind, m.from, m.to, self.current_team))
            .collect()
    }
}

/// Game lifecycle as reported by `GET /state`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Active,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    #[serde(rename = "LEFT")]
    Left,
    #[serde(rename = "RIGHT")]
    Right,
    #[serde(rename = "DRAW")]
    Draw,
}

/// One opponent action in a chained turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMoveModel {
    pub player: Team,
    pub move_type: MoveKind,
    pub from: Position,
    pub to: Position,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl From<&AiMoveModel> for Move {
    fn from(m: &AiMoveModel) -> Self {
        Move::new(m.move_type, m.from, m.to, m.player)
    }
}

/// Pick the opponent chain from a response: `aiMoves` when non-empty, else the
/// legacy single `lastAiMove`.
pub fn opponent_moves(ai_moves: &[AiMoveModel], last_ai_move: Option<&AiMoveModel>) -> Vec<Move> {
    if !ai_moves.is_empty() {
        ai_moves.iter().map(Move::from).collect()
    } else {
        last_ai_move.map(Move::from).into_iter().collect()
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameRequest {
    pub level: u8,
    pub difficulty: String,
    pub player_side: Team,
    /// Same value as `player_side`; the deployed backend reads this key.
    pub player_color: Team,
    pub mode: String,
    pub timer_enabled: bool,
    pub timer_seconds: u32,
    pub timer_minutes: u32,
    pub max_turns_enabled: bool,
    pub max_turns: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub move_type: MoveKind,
    pub from_pos: Position,
    pub to_pos: Position,
}

impl From<&Move> for MoveRequest {
    fn from(m: &Move) -> Self {
        MoveRequest {
            move_type: m.kind,
            from_pos: m.from,
            to_pos: m.to,
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameResponse {
    pub success: bool,
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub game_state: Option<GameState>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub success: bool,
    #[serde(default)]
    pub game_state: Option<GameState>,
    #[serde(default)]
    pub status: Option<GameStatus>,
    #[serde(default)]
    pub ai_moves: Vec<AiMoveModel>,
    #[serde(default)]
    pub last_ai_move: Option<AiMoveModel>,
    #[serde(default)]
    pub move_history: Vec<AiMoveModel>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StateResponse {
    pub fn opponent_moves(&self) -> Vec<Move> {
        opponent_moves(&self.ai_moves, self.last_ai_move.as_ref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    pub success: bool,
    #[serde(default)]
    pub game_state: Option<GameState>,
    #[serde(default)]
    pub ai_moves: Vec<AiMoveModel>,
    #[serde(default)]
    pub last_ai_move: Option<AiMoveModel>,
    #[serde(default)]
    pub game_ended: bool,
    #[serde(default)]
    pub winner: Option<Winner>,
    #[serde(default)]
    pub extra_turn: bool,
    #[serde(default)]
    pub goal_scored: Option<Team>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MoveResponse {
    pub fn opponent_moves(&self) -> Vec<Move> {
        opponent_moves(&self.ai_moves, self.last_ai_move.as_ref())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartResponse {
    pub success: bool,
    #[serde(default)]
    pub game_state: Option<GameState>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalMovesResponse {
    pub success: bool,
    #[serde(default)]
    pub legal_moves: Vec<LegalMoveModel>,
    pub current_team: Team,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub active_games: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentsResponse {
    pub agents: serde_json::Value,
}

/// Body of a non-2xx reply: `{error}` or `{success:false, error}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorModel {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Small hand-made snapshot: two pieces per side, ball in the middle.
    pub fn state(current_team: Team, legal: &[(MoveKind, (u8, u8), (u8, u8))]) -> GameState {
        GameState {
            players: vec![
                piece(Team::Left, 1, (7, 5)),
                piece(Team::Left, 2, (1, 5)),
                piece(Team::Right, 3, (9, 5)),
                piece(Team::Right, 4, (13, 5)),
            ],
            ball: Position::new(8, 5),
            current_team,
            score: ScoreModel::default(),
            legal_moves: legal
                .iter()
                .map(|&(kind, (fr, fc), (tr, tc))| LegalMoveModel {
                    kind,
                    from: Position::new(fr, fc),
                    to: Position::new(tr, tc),
                })
                .collect(),
            turn_count: 0,
            passes_count: 0,
            skip_next_turn: false,
            level: 1,
            board_dimensions: BoardDimensions::MASTERGOAL,
        }
    }

    pub fn piece(team: Team, id: u32, (row, col): (u8, u8)) -> PieceModel {
        PieceModel {
            team,
            id: Some(id),
            position: Position::new(row, col),
            is_goalkeeper: false,
        }
    }
}
