//! Board interaction, animation and session sync for the Mastergoal client.
//!
//! The remote service owns every rule of the game. This crate only renders
//! what the service says, turns pointer input into move submissions, replays
//! opponent turns with readable animation, and keeps a per-tab session alive
//! across reloads and backend restarts.
//!
//! # Layers
//!
//! ```text
//! coords      CoordinateMapper: logical (row,col) <-> display (row,col)
//! legal       LegalMoveIndex: legal moves from one origin, O(1) lookup
//! gesture     GestureController: pointer events -> Selection / Move
//! animation   AnimationSequencer: timed, cancellable replay of AI turns
//! clock       TurnClock: per-turn countdown with auto-move on expiry
//! session     SessionSync: create / fetch / submit / restart + 404 recovery
//! controller  BoardController: sole owner of snapshot and overlay state
//! host        BoardHost: controller + session shared by event handlers
//! ```
//!
//! The controller is sans-IO. It returns [`controller::Command`]s that the
//! host (browser bindings or the CLI) executes through [`session::SessionSync`],
//! then feeds the result back. All timing is driven by explicit millisecond
//! timestamps passed to `tick`, so playback is deterministic under test.
//!
//! # Coordinates
//!
//! ```text
//! Logical board: 15 rows x 11 cols (row 0 and row 14 hold the goals)
//!
//!   natural:  display (r, c) == logical (r, c)
//!   rotated:  display (r, c) == logical (c, r)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod animation;
pub mod clock;
pub mod config;
pub mod controller;
pub mod coords;
pub mod error;
pub mod gesture;
pub mod host;
pub mod http;
pub mod legal;
pub mod protocol;
pub mod session;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use animation::{AnimationPath, AnimationSequencer, AnimationTiming, Overlay};
pub use clock::TurnClock;
pub use config::ClientConfig;
pub use controller::{BoardController, BoardView, Command, Notice, NoticeKind};
pub use coords::{BoardDimensions, CoordinateMapper, DisplayCell, Orientation};
pub use error::{HostError, ServiceError, StoreError, SyncError};
pub use gesture::{GestureController, GestureOutcome, PointerInput, Selection};
pub use host::BoardHost;
pub use legal::{LegalMoveIndex, LegalMoveSet};
pub use protocol::GameState;
pub use session::{
    GameService, MemorySessionStore, SessionConfig, SessionDescriptor, SessionStore, SessionSync,
};

/// One of the two sides.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum Team {
    #[serde(rename = "LEFT")]
    Left,
    #[serde(rename = "RIGHT")]
    Right,
}

impl Team {
    /// Get the opposing team.
    #[inline]
    pub fn opponent(self) -> Team {
        match self {
            Team::Left => Team::Right,
            Team::Right => Team::Left,
        }
    }

    /// Wire name ("LEFT" or "RIGHT").
    pub fn as_str(self) -> &'static str {
        match self {
            Team::Left => "LEFT",
            Team::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cell in logical board space.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: u8,
    pub col: u8,
}

impl Position {
    #[inline]
    pub const fn new(row: u8, col: u8) -> Position {
        Position { row, col }
    }

    /// Signed (row, col) offset from `self` to `other`.
    #[inline]
    pub fn delta_to(self, other: Position) -> (i16, i16) {
        (
            other.row as i16 - self.row as i16,
            other.col as i16 - self.col as i16,
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Kind of a move: relocate a piece, or kick the ball.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    Move,
    Kick,
}

impl MoveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveKind::Move => "move",
            MoveKind::Kick => "kick",
        }
    }
}

/// A move as the client sees it.
///
/// `acting_team` is only carried for animation attribution; two moves are
/// equal when kind, origin and destination match.
#[derive(Clone, Copy, Debug)]
pub struct Move {
    pub kind: MoveKind,
    pub from: Position,
    pub to: Position,
    pub acting_team: Team,
}

impl Move {
    #[inline]
    pub fn new(kind: MoveKind, from: Position, to: Position, acting_team: Team) -> Move {
        Move {
            kind,
            from,
            to,
            acting_team,
        }
    }

    #[inline]
    pub fn is_kick(&self) -> bool {
        self.kind == MoveKind::Kick
    }
}

impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.from == other.from && self.to == other.to
    }
}

impl Eq for Move {}

impl std::hash::Hash for Move {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.from.hash(state);
        self.to.hash(state);
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}→{}", self.kind.as_str(), self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_opponent() {
        assert_eq!(Team::Left.opponent(), Team::Right);
        assert_eq!(Team::Right.opponent(), Team::Left);
    }

    #[test]
    fn test_move_equality_ignores_team() {
        let a = Move::new(MoveKind::Move, Position::new(7, 5), Position::new(8, 5), Team::Left);
        let b = Move::new(MoveKind::Move, Position::new(7, 5), Position::new(8, 5), Team::Right);
        let c = Move::new(MoveKind::Kick, Position::new(7, 5), Position::new(8, 5), Team::Left);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Team::Left).unwrap(), "\"LEFT\"");
        assert_eq!(serde_json::to_string(&MoveKind::Kick).unwrap(), "\"kick\"");
        let pos: Position = serde_json::from_str(r#"{"row":3,"col":9}"#).unwrap();
        assert_eq!(pos, Position::new(3, 9));
    }

    #[test]
    fn test_delta_to() {
        assert_eq!(Position::new(2, 2).delta_to(Position::new(0, 5)), (-2, 3));
    }
}
