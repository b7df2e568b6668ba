//! Timed replay of opponent turns.
//!
//! An opponent turn is an ordered list of moves (for example two passes and
//! a shot). Each move becomes a straight [`AnimationPath`]; the
//! [`AnimationSequencer`] walks the paths one cell per `step_ms`, strictly one
//! move at a time:
//!
//! ```text
//!  kick:  [lead-in] step0 step1 .. stepN [follow-through] [settle] -> next
//!  move:            step0 step1 .. stepN                  [settle] -> next
//! ```
//!
//! The snapshot that carried the turn already shows the end state, so while a
//! move plays the static token on its destination cell is hidden and drawn
//! only through the [`Overlay`]. If the turn contains a kick, the static ball
//! stays hidden for the whole sequence.
//!
//! Time is an explicit millisecond clock passed to [`AnimationSequencer::advance`].
//! Every playback carries a [`SequenceToken`]; starting a new sequence or
//! calling [`AnimationSequencer::cancel`] invalidates the previous token so a
//! stale timer callback can never touch the new overlay.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Move, MoveKind, Position, Team};

/// Playback timing in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationTiming {
    /// Time each cell of a path stays on screen.
    pub step_ms: u64,
    /// Pause before the first step of a kick.
    pub kick_lead_in_ms: u64,
    /// Pause after the last step of a kick.
    pub kick_follow_through_ms: u64,
    /// Gap after every move before the next one starts.
    pub settle_ms: u64,
    /// How long the last move stays highlighted after the sequence ends.
    pub highlight_clear_ms: u64,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            step_ms: 180,
            kick_lead_in_ms: 300,
            kick_follow_through_ms: 300,
            settle_ms: 150,
            highlight_clear_ms: 900,
        }
    }
}

// =============================================================================
// Paths
// =============================================================================

/// Cells visited by one move, endpoints included.
///
/// `cell(i) = from + i * step` for `i in 0..len`; the step vector never
/// changes along the path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimationPath {
    from: Position,
    step: (i16, i16),
    len: u8,
}

impl AnimationPath {
    /// Straight path along one of the eight compass directions.
    ///
    /// Returns `None` when `to` is not on a rank, file or diagonal of `from`.
    pub fn straight(from: Position, to: Position) -> Option<AnimationPath> {
        let (dr, dc) = from.delta_to(to);
        if dr != 0 && dc != 0 && dr.abs() != dc.abs() {
            return None;
        }
        let distance = dr.abs().max(dc.abs());
        Some(AnimationPath {
            from,
            step: (dr.signum(), dc.signum()),
            len: distance as u8 + 1,
        })
    }

    /// Path for a move; off-line moves degrade to a two-frame jump.
    pub fn for_move(mv: &Move) -> AnimationPath {
        AnimationPath::straight(mv.from, mv.to).unwrap_or_else(|| {
            warn!(%mv, "move is not on a straight line, animating as a jump");
            AnimationPath {
                from: mv.from,
                step: mv.from.delta_to(mv.to),
                len: 2,
            }
        })
    }

    /// Number of cells, endpoints included.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn step(&self) -> (i16, i16) {
        self.step
    }

    #[inline]
    pub fn first(&self) -> Position {
        self.from
    }

    #[inline]
    pub fn last(&self) -> Position {
        self.cell(self.len() - 1)
    }

    /// The `index`-th cell. Caller keeps `index < len()`.
    #[inline]
    pub fn cell(&self, index: usize) -> Position {
        let i = index as i16;
        Position::new(
            (self.from.row as i16 + self.step.0 * i) as u8,
            (self.from.col as i16 + self.step.1 * i) as u8,
        )
    }

    /// Lazy iterator over the cells. Call again to restart.
    pub fn steps(&self) -> PathSteps {
        PathSteps {
            path: *self,
            next: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PathSteps {
    path: AnimationPath,
    next: usize,
}

impl Iterator for PathSteps {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        if self.next >= self.path.len() {
            return None;
        }
        let cell = self.path.cell(self.next);
        self.next += 1;
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.path.len() - self.next.min(self.path.len());
        (left, Some(left))
    }
}

impl ExactSizeIterator for PathSteps {}

// =============================================================================
// Sequencer
// =============================================================================

/// Identifies one playback; stale tokens are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SequenceToken(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    LeadIn,
    Step(usize),
    FollowThrough,
    Settle,
}

/// What is being moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Piece { team: Team },
    Ball,
}

/// Transient drawing state while a sequence plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overlay {
    /// Index of the move within the sequence.
    pub index: usize,
    pub mv: Move,
    pub phase: Phase,
    pub entity: Entity,
    /// Where the moving entity is drawn right now.
    pub at: Position,
    /// Destination cell whose static token must not be drawn.
    pub hidden: Position,
    /// Where the ball is drawn while the static ball is held back.
    pub ball: Option<Position>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationEvent {
    MoveStarted { index: usize },
    Step { index: usize, step: usize, at: Position },
    MoveFinished { index: usize },
    SequenceFinished { token: SequenceToken },
    HighlightCleared,
}

#[derive(Clone, Debug)]
struct Playback {
    token: SequenceToken,
    moves: Vec<Move>,
    paths: Vec<AnimationPath>,
    index: usize,
    phase: Phase,
    phase_started_ms: u64,
    holds_ball: bool,
}

impl Playback {
    fn current(&self) -> (&Move, &AnimationPath) {
        (&self.moves[self.index], &self.paths[self.index])
    }

    /// Ball position as the viewer should currently see it.
    fn visual_ball(&self) -> Option<Position> {
        if !self.holds_ball {
            return None;
        }
        let (mv, path) = self.current();
        if mv.kind == MoveKind::Kick {
            return Some(match self.phase {
                Phase::LeadIn => path.first(),
                Phase::Step(i) => path.cell(i),
                Phase::FollowThrough | Phase::Settle => path.last(),
            });
        }
        let played = self.moves[..self.index]
            .iter()
            .rev()
            .find(|m| m.kind == MoveKind::Kick)
            .map(|m| m.to);
        played.or_else(|| {
            self.moves[self.index..]
                .iter()
                .find(|m| m.kind == MoveKind::Kick)
                .map(|m| m.from)
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct AnimationSequencer {
    timing: AnimationTiming,
    playback: Option<Playback>,
    highlight: Option<(Move, u64)>,
    next_token: u64,
}

impl AnimationSequencer {
    pub fn new(timing: AnimationTiming) -> Self {
        Self {
            timing,
            playback: None,
            highlight: None,
            next_token: 0,
        }
    }

    #[inline]
    pub fn timing(&self) -> AnimationTiming {
        self.timing
    }

    /// True while a sequence is in flight (highlight linger excluded).
    #[inline]
    pub fn is_active(&self) -> bool {
        self.playback.is_some()
    }

    pub fn token(&self) -> Option<SequenceToken> {
        self.playback.as_ref().map(|p| p.token)
    }

    /// Replace any running playback with `moves`, starting at `now_ms`.
    ///
    /// Returns `None` (and leaves nothing running) for an empty turn.
    pub fn start(&mut self, moves: Vec<Move>, now_ms: u64) -> Option<SequenceToken> {
        self.cancel();
        if moves.is_empty() {
            return None;
        }
        self.next_token += 1;
        let token = SequenceToken(self.next_token);
        let paths: Vec<AnimationPath> = moves.iter().map(AnimationPath::for_move).collect();
        let holds_ball = moves.iter().any(Move::is_kick);
        let phase = first_phase(&moves[0]);
        debug!(token = token.0, moves = moves.len(), "animation sequence started");
        self.highlight = None;
        self.playback = Some(Playback {
            token,
            moves,
            paths,
            index: 0,
            phase,
            phase_started_ms: now_ms,
            holds_ball,
        });
        Some(token)
    }

    /// Stop the running playback, if any. Overlay state is dropped at once.
    pub fn cancel(&mut self) {
        if let Some(playback) = self.playback.take() {
            debug!(token = playback.token.0, "animation sequence cancelled");
        }
    }

    /// Stop everything, including a lingering highlight.
    pub fn teardown(&mut self) {
        self.cancel();
        self.highlight = None;
    }

    /// Highlight a move that was not animated (the human's own move).
    pub fn flash(&mut self, mv: Move, now_ms: u64) {
        self.highlight = Some((mv, now_ms + self.timing.highlight_clear_ms));
    }

    /// Advance only if `token` still names the running playback.
    pub fn advance_for(&mut self, token: SequenceToken, now_ms: u64) -> Vec<AnimationEvent> {
        if self.token() != Some(token) {
            return Vec::new();
        }
        self.advance(now_ms)
    }

    /// Process every phase boundary reached by `now_ms`.
    ///
    /// Boundaries are computed on the ideal timeline, so a late tick catches
    /// up without compressing later moves.
    pub fn advance(&mut self, now_ms: u64) -> Vec<AnimationEvent> {
        let mut events = Vec::new();
        let timing = self.timing;

        while let Some(playback) = self.playback.as_mut() {
            let duration = phase_duration(playback.phase, &playback.moves[playback.index], &timing);
            let ends_at = playback.phase_started_ms + duration;
            if now_ms < ends_at {
                break;
            }
            playback.phase_started_ms = ends_at;

            let index = playback.index;
            let (mv, path) = (playback.moves[index], playback.paths[index]);
            match playback.phase {
                Phase::LeadIn => {
                    playback.phase = Phase::Step(0);
                }
                Phase::Step(i) if i + 1 < path.len() => {
                    playback.phase = Phase::Step(i + 1);
                    events.push(AnimationEvent::Step {
                        index,
                        step: i + 1,
                        at: path.cell(i + 1),
                    });
                }
                Phase::Step(_) => {
                    playback.phase = if mv.is_kick() {
                        Phase::FollowThrough
                    } else {
                        Phase::Settle
                    };
                }
                Phase::FollowThrough => {
                    playback.phase = Phase::Settle;
                }
                Phase::Settle => {
                    events.push(AnimationEvent::MoveFinished { index });
                    if index + 1 < playback.moves.len() {
                        playback.index += 1;
                        playback.phase = first_phase(&playback.moves[index + 1]);
                        events.push(AnimationEvent::MoveStarted { index: index + 1 });
                        if playback.phase == Phase::Step(0) {
                            let first = playback.paths[index + 1].first();
                            events.push(AnimationEvent::Step {
                                index: index + 1,
                                step: 0,
                                at: first,
                            });
                        }
                    } else {
                        let token = playback.token;
                        self.highlight = Some((mv, ends_at + timing.highlight_clear_ms));
                        self.playback = None;
                        debug!(token = token.0, "animation sequence finished");
                        events.push(AnimationEvent::SequenceFinished { token });
                    }
                }
            }
            if let Some(playback) = self.playback.as_ref() {
                if playback.index == index && playback.phase == Phase::Step(0) {
                    events.push(AnimationEvent::Step {
                        index,
                        step: 0,
                        at: path.first(),
                    });
                }
            }
        }

        if self.playback.is_none() {
            if let Some((_, clear_at)) = self.highlight {
                if now_ms >= clear_at {
                    self.highlight = None;
                    events.push(AnimationEvent::HighlightCleared);
                }
            }
        }
        events
    }

    /// Next instant at which `advance` has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        match &self.playback {
            Some(p) => Some(p.phase_started_ms + phase_duration(p.phase, &p.moves[p.index], &self.timing)),
            None => self.highlight.map(|(_, clear_at)| clear_at),
        }
    }

    pub fn overlay(&self) -> Option<Overlay> {
        let playback = self.playback.as_ref()?;
        let (mv, path) = playback.current();
        let at = match playback.phase {
            Phase::LeadIn => path.first(),
            Phase::Step(i) => path.cell(i),
            Phase::FollowThrough | Phase::Settle => path.last(),
        };
        let entity = match mv.kind {
            MoveKind::Kick => Entity::Ball,
            MoveKind::Move => Entity::Piece {
                team: mv.acting_team,
            },
        };
        Some(Overlay {
            index: playback.index,
            mv: *mv,
            phase: playback.phase,
            entity,
            at,
            hidden: path.last(),
            ball: playback.visual_ball(),
        })
    }

    /// Whether the static piece on `pos` must be skipped this frame.
    pub fn hides_piece_at(&self, pos: Position) -> bool {
        self.overlay()
            .map(|o| matches!(o.entity, Entity::Piece { .. }) && o.hidden == pos)
            .unwrap_or(false)
    }

    /// Whether the static ball must be skipped this frame.
    pub fn holds_ball(&self) -> bool {
        self.playback
            .as_ref()
            .map(|p| p.holds_ball)
            .unwrap_or(false)
    }

    /// Move to highlight: the one playing, else the lingering last move.
    pub fn last_move(&self) -> Option<Move> {
        match &self.playback {
            Some(p) => Some(p.moves[p.index]),
            None => self.highlight.map(|(mv, _)| mv),
        }
    }
}

fn first_phase(mv: &Move) -> Phase {
    if mv.is_kick() {
        Phase::LeadIn
    } else {
        Phase::Step(0)
    }
}

fn phase_duration(phase: Phase, mv: &Move, timing: &AnimationTiming) -> u64 {
    match phase {
        Phase::LeadIn => timing.kick_lead_in_ms,
        Phase::Step(_) => timing.step_ms,
        Phase::FollowThrough if mv.is_kick() => timing.kick_follow_through_ms,
        Phase::FollowThrough => 0,
        Phase::Settle => timing.settle_ms,
    }
}
