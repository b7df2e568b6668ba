//! Per-turn countdown with automatic move on expiry.

use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::legal::LegalMoveSet;
use crate::{Move, Team};

const TICK_MS: u64 = 1000;

/// Conditions the clock cannot see on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockGate {
    /// The side to move is played by the local human.
    pub human_turn: bool,
    /// Dialog open, animation running, or request in flight.
    pub blocked: bool,
}

#[derive(Clone, Debug)]
pub struct TurnClock {
    enabled: bool,
    duration_secs: u32,
    remaining: u32,
    team: Option<Team>,
    next_tick_ms: Option<u64>,
    fired: bool,
}

impl TurnClock {
    pub fn new(enabled: bool, duration_secs: u32) -> Self {
        Self {
            enabled,
            duration_secs,
            remaining: duration_secs,
            team: None,
            next_tick_ms: None,
            fired: false,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    pub fn configure(&mut self, enabled: bool, duration_secs: u32) {
        self.enabled = enabled && duration_secs > 0;
        self.duration_secs = duration_secs;
        self.reset();
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Seconds left, `None` when the clock is off.
    pub fn remaining(&self) -> Option<u32> {
        self.enabled.then_some(self.remaining)
    }

    /// Feed the side to move of a freshly applied snapshot.
    ///
    /// A change of side restarts the countdown. A clock that already fired is
    /// re-armed with a full countdown, so one snapshot yields at most one
    /// automatic move.
    pub fn observe(&mut self, current_team: Team) {
        if self.team != Some(current_team) || self.fired {
            self.team = Some(current_team);
            self.reset();
        }
    }

    /// Stop counting until the next snapshot (teardown, leave).
    pub fn stop(&mut self) {
        self.team = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.remaining = self.duration_secs;
        self.next_tick_ms = None;
        self.fired = false;
    }

    /// Count down whole seconds elapsed by `now_ms`.
    ///
    /// Returns `true` exactly once when the countdown reaches zero on a human
    /// turn with nothing blocking.
    pub fn poll(&mut self, now_ms: u64, gate: ClockGate) -> bool {
        if !self.enabled || self.team.is_none() || self.fired {
            return false;
        }
        if gate.blocked || !gate.human_turn {
            self.remaining = self.duration_secs;
            self.next_tick_ms = Some(now_ms + TICK_MS);
            return false;
        }
        let Some(mut next_tick) = self.next_tick_ms else {
            self.next_tick_ms = Some(now_ms + TICK_MS);
            return false;
        };
        while now_ms >= next_tick && self.remaining > 0 {
            self.remaining -= 1;
            next_tick += TICK_MS;
        }
        self.next_tick_ms = Some(next_tick);
        if self.remaining == 0 {
            self.fired = true;
            info!(team = ?self.team, "turn clock expired");
            return true;
        }
        false
    }

    /// Next instant at which `poll` may change something.
    pub fn next_deadline(&self) -> Option<u64> {
        if !self.enabled || self.fired {
            return None;
        }
        self.next_tick_ms
    }

    /// Uniform pick among all legal moves.
    pub fn pick<R: Rng + ?Sized>(legal: &LegalMoveSet, rng: &mut R) -> Option<Move> {
        let mv = legal.as_slice().choose(rng).copied();
        debug!(candidates = legal.len(), picked = ?mv, "turn clock auto-move");
        mv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MoveKind, Position};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const OPEN: ClockGate = ClockGate {
        human_turn: true,
        blocked: false,
    };

    #[test]
    fn test_counts_down_and_fires_once() {
        let mut clock = TurnClock::new(true, 3);
        clock.observe(Team::Left);
        assert!(!clock.poll(0, OPEN));
        assert!(!clock.poll(1000, OPEN));
        assert_eq!(clock.remaining(), Some(2));
        assert!(!clock.poll(2000, OPEN));
        assert!(clock.poll(3000, OPEN));
        assert!(!clock.poll(4000, OPEN));
        assert!(!clock.poll(60_000, OPEN));
    }

    #[test]
    fn test_blocked_resets_countdown() {
        let mut clock = TurnClock::new(true, 3);
        clock.observe(Team::Left);
        clock.poll(0, OPEN);
        clock.poll(2000, OPEN);
        assert_eq!(clock.remaining(), Some(1));
        let blocked = ClockGate {
            human_turn: true,
            blocked: true,
        };
        assert!(!clock.poll(2500, blocked));
        assert_eq!(clock.remaining(), Some(3));
    }

    #[test]
    fn test_never_fires_on_opponent_turn() {
        let mut clock = TurnClock::new(true, 1);
        clock.observe(Team::Right);
        let theirs = ClockGate {
            human_turn: false,
            blocked: false,
        };
        for t in (0..10_000).step_by(500) {
            assert!(!clock.poll(t, theirs));
        }
    }

    #[test]
    fn test_team_change_restarts() {
        let mut clock = TurnClock::new(true, 5);
        clock.observe(Team::Left);
        clock.poll(0, OPEN);
        clock.poll(3000, OPEN);
        assert_eq!(clock.remaining(), Some(2));
        clock.observe(Team::Left);
        assert_eq!(clock.remaining(), Some(2));
        clock.observe(Team::Right);
        assert_eq!(clock.remaining(), Some(5));
    }

    #[test]
    fn test_disabled_clock_is_silent() {
        let mut clock = TurnClock::disabled();
        clock.observe(Team::Left);
        assert_eq!(clock.remaining(), None);
        assert!(!clock.poll(100_000, OPEN));
    }

    #[test]
    fn test_pick_is_member() {
        let legal = LegalMoveSet::new(vec![
            Move::new(MoveKind::Move, Position::new(7, 5), Position::new(6, 5), Team::Left),
            Move::new(MoveKind::Move, Position::new(7, 5), Position::new(8, 4), Team::Left),
        ]);
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..20 {
            let mv = TurnClock::pick(&legal, &mut rng).unwrap();
            assert!(legal.contains(&mv));
        }
        assert!(TurnClock::pick(&LegalMoveSet::default(), &mut rng).is_none());
    }
}
