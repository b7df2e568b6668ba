//! Pointer gesture state machine.
//!
//! ```text
//!            down(own piece | kickable ball)
//!   Idle ─────────────────────────────────────▶ Selected ──move──▶ Dragging
//!    ▲  down(ball, no kicks) → NeutralBall         │                  │
//!    │                                             │ up/down(legal)   │ up(legal)
//!    │◀──────────────── commit / cancel ───────────┴──────────────────┘
//! ```
//!
//! Input arrives in display space and is mapped to logical cells with the
//! [`CoordinateMapper`] carried by the context. The controller never performs
//! I/O; a [`GestureOutcome::Commit`] is the caller's cue to submit.

use tracing::debug;

use crate::coords::{CoordinateMapper, DisplayCell};
use crate::legal::{LegalMoveIndex, LegalMoveSet};
use crate::protocol::GameState;
use crate::{Move, Position, Team};

/// What the user has picked up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    Piece { position: Position, team: Team },
    Ball { position: Position },
}

impl Selection {
    #[inline]
    pub fn origin(&self) -> Position {
        match self {
            Selection::Piece { position, .. } => *position,
            Selection::Ball { position } => *position,
        }
    }

    /// Ball selections only accept kicks.
    #[inline]
    pub fn is_kick(&self) -> bool {
        matches!(self, Selection::Ball { .. })
    }
}

/// Raw pointer input in display space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerInput {
    Down(DisplayCell),
    Move(DisplayCell),
    Up(DisplayCell),
    Cancel,
    /// Pointer left the board area.
    Leave,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    /// `pressed` is true between the down that selected and its release.
    Selected { selection: Selection, pressed: bool },
    Dragging { selection: Selection, hover: Position },
}

/// Result of feeding one pointer event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureOutcome {
    /// Event had no effect (blocked, or nothing to act on).
    Ignored,
    /// Event was accepted but the visible state did not change.
    Unchanged,
    Selected(Selection),
    DragStarted,
    HoverChanged(Position),
    Commit(Move),
    Cancelled,
    Deselected,
    /// Ball clicked with zero legal kicks.
    NeutralBall(Position),
}

/// Everything a transition needs to know about the world.
#[derive(Clone, Copy)]
pub struct GestureContext<'a> {
    pub state: &'a GameState,
    pub legal: &'a LegalMoveSet,
    /// Side the human may act for, `None` when it is not a human turn.
    pub actor: Option<Team>,
    /// Modal open, request in flight, animation running, or game over.
    pub blocked: bool,
    pub mapper: CoordinateMapper,
}

#[derive(Clone, Debug)]
pub struct GestureController {
    state: GestureState,
    index: Option<LegalMoveIndex>,
}

impl Default for GestureController {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureController {
    pub fn new() -> Self {
        Self {
            state: GestureState::Idle,
            index: None,
        }
    }

    #[inline]
    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn selection(&self) -> Option<Selection> {
        match self.state {
            GestureState::Idle => None,
            GestureState::Selected { selection, .. } => Some(selection),
            GestureState::Dragging { selection, .. } => Some(selection),
        }
    }

    #[inline]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging { .. })
    }

    /// Cell under the pointer while dragging.
    pub fn hover(&self) -> Option<Position> {
        match self.state {
            GestureState::Dragging { hover, .. } => Some(hover),
            _ => None,
        }
    }

    /// Legal destinations for the current selection.
    pub fn targets(&self) -> Vec<Position> {
        self.index
            .as_ref()
            .map(LegalMoveIndex::targets)
            .unwrap_or_default()
    }

    /// Drop any selection (new snapshot, rejection, teardown).
    pub fn clear(&mut self) {
        self.state = GestureState::Idle;
        self.index = None;
    }

    pub fn handle(&mut self, input: PointerInput, ctx: &GestureContext<'_>) -> GestureOutcome {
        let outcome = match input {
            PointerInput::Down(cell) => self.on_down(ctx.mapper.to_logical(cell), ctx),
            PointerInput::Move(cell) => self.on_move(ctx.mapper.to_logical(cell)),
            PointerInput::Up(cell) => self.on_up(ctx.mapper.to_logical(cell), ctx),
            PointerInput::Cancel | PointerInput::Leave => self.on_abort(),
        };
        if !matches!(outcome, GestureOutcome::Ignored | GestureOutcome::Unchanged) {
            debug!(?input, ?outcome, "gesture transition");
        }
        outcome
    }

    fn on_down(&mut self, cell: Position, ctx: &GestureContext<'_>) -> GestureOutcome {
        if ctx.blocked {
            return GestureOutcome::Ignored;
        }
        let Some(actor) = ctx.actor else {
            return GestureOutcome::Ignored;
        };

        if let Some(selection) = self.selection() {
            if selection.origin() == cell {
                if let GestureState::Selected { pressed, .. } = &mut self.state {
                    *pressed = true;
                }
                return GestureOutcome::Unchanged;
            }
            if let Some(mv) = self.legal_move(cell) {
                self.clear();
                return GestureOutcome::Commit(mv);
            }
        }

        if cell == ctx.state.ball {
            if !ctx.legal.has_kick_from(cell) {
                self.clear();
                return GestureOutcome::NeutralBall(cell);
            }
            return self.select(Selection::Ball { position: cell }, ctx.legal);
        }

        if let Some(piece) = ctx.state.piece_at(cell) {
            if piece.team == actor {
                let selection = Selection::Piece {
                    position: cell,
                    team: piece.team,
                };
                return self.select(selection, ctx.legal);
            }
        }

        if self.selection().is_some() {
            self.clear();
            return GestureOutcome::Deselected;
        }
        GestureOutcome::Ignored
    }

    fn on_move(&mut self, cell: Position) -> GestureOutcome {
        match self.state {
            GestureState::Selected {
                selection,
                pressed: true,
            } if selection.origin() != cell => {
                self.state = GestureState::Dragging {
                    selection,
                    hover: cell,
                };
                GestureOutcome::DragStarted
            }
            GestureState::Dragging { selection, hover } => {
                if hover == cell {
                    GestureOutcome::Unchanged
                } else {
                    self.state = GestureState::Dragging {
                        selection,
                        hover: cell,
                    };
                    GestureOutcome::HoverChanged(cell)
                }
            }
            _ => GestureOutcome::Ignored,
        }
    }

    fn on_up(&mut self, cell: Position, ctx: &GestureContext<'_>) -> GestureOutcome {
        match self.state {
            GestureState::Dragging { .. } => self.release_over(cell, ctx),
            GestureState::Selected {
                selection,
                pressed: true,
            } => {
                if selection.origin() == cell {
                    self.state = GestureState::Selected {
                        selection,
                        pressed: false,
                    };
                    GestureOutcome::Unchanged
                } else {
                    self.release_over(cell, ctx)
                }
            }
            _ => GestureOutcome::Ignored,
        }
    }

    fn release_over(&mut self, cell: Position, ctx: &GestureContext<'_>) -> GestureOutcome {
        let mv = if ctx.blocked || ctx.actor.is_none() {
            None
        } else {
            self.legal_move(cell)
        };
        self.clear();
        match mv {
            Some(mv) => GestureOutcome::Commit(mv),
            None => GestureOutcome::Cancelled,
        }
    }

    fn on_abort(&mut self) -> GestureOutcome {
        match self.state {
            GestureState::Dragging { .. } => {
                self.clear();
                GestureOutcome::Cancelled
            }
            GestureState::Selected {
                selection,
                pressed: true,
            } => {
                self.state = GestureState::Selected {
                    selection,
                    pressed: false,
                };
                GestureOutcome::Unchanged
            }
            _ => GestureOutcome::Ignored,
        }
    }

    fn select(&mut self, selection: Selection, legal: &LegalMoveSet) -> GestureOutcome {
        self.index = Some(LegalMoveIndex::build(
            legal,
            selection.origin(),
            selection.is_kick(),
        ));
        self.state = GestureState::Selected {
            selection,
            pressed: true,
        };
        GestureOutcome::Selected(selection)
    }

    fn legal_move(&self, cell: Position) -> Option<Move> {
        self.index.as_ref().and_then(|index| index.move_to(cell))
    }
}
