//! Legal move filtering for one selected origin.

use std::collections::HashMap;

use crate::protocol::GameState;
use crate::{Move, MoveKind, Position};

/// Every move the service permits in the current snapshot.
///
/// Immutable; a new snapshot builds a new set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegalMoveSet {
    moves: Vec<Move>,
}

impl LegalMoveSet {
    pub fn new(moves: Vec<Move>) -> LegalMoveSet {
        LegalMoveSet { moves }
    }

    pub fn from_state(state: &GameState) -> LegalMoveSet {
        LegalMoveSet::new(state.moves())
    }

    #[inline]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn contains(&self, mv: &Move) -> bool {
        self.moves.contains(mv)
    }

    /// Moves starting at `origin`; kicks only when `is_kick`.
    pub fn for_origin(&self, origin: Position, is_kick: bool) -> Vec<Move> {
        self.moves
            .iter()
            .filter(|m| m.from == origin && (!is_kick || m.kind == MoveKind::Kick))
            .copied()
            .collect()
    }

    /// Whether the ball at `ball` has at least one legal kick.
    pub fn has_kick_from(&self, ball: Position) -> bool {
        self.moves
            .iter()
            .any(|m| m.from == ball && m.kind == MoveKind::Kick)
    }
}

/// Destinations reachable from one origin, keyed for O(1) lookup.
#[derive(Clone, Debug)]
pub struct LegalMoveIndex {
    origin: Position,
    is_kick: bool,
    targets: HashMap<Position, Move>,
}

impl LegalMoveIndex {
    pub fn build(set: &LegalMoveSet, origin: Position, is_kick: bool) -> LegalMoveIndex {
        let targets = set
            .for_origin(origin, is_kick)
            .into_iter()
            .map(|m| (m.to, m))
            .collect();
        LegalMoveIndex {
            origin,
            is_kick,
            targets,
        }
    }

    #[inline]
    pub fn origin(&self) -> Position {
        self.origin
    }

    #[inline]
    pub fn is_kick(&self) -> bool {
        self.is_kick
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[inline]
    pub fn is_legal_target(&self, destination: Position) -> bool {
        self.targets.contains_key(&destination)
    }

    /// The move that lands on `destination`, if legal.
    #[inline]
    pub fn move_to(&self, destination: Position) -> Option<Move> {
        self.targets.get(&destination).copied()
    }

    /// Destinations in a stable order (row-major), for rendering.
    pub fn targets(&self) -> Vec<Position> {
        let mut targets: Vec<Position> = self.targets.keys().copied().collect();
        targets.sort();
        targets
    }
}
