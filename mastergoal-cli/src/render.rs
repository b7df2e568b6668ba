//! Render a [`BoardView`] as text.
//!
//! ```text
//!      0 1 2 3 4 5 6 7 8 9 10
//!   0  . . . . . r . . . . .
//!   ...
//!   7  . . . . . L . o . . .
//! ```
//!
//! Upper case is a field player, lower case a goalkeeper; `o` is the ball,
//! `*` a legal target of the current selection, `@` an animated piece.

use std::fmt::Write;

use mastergoal_core::controller::{Dialog, NoticeKind};
use mastergoal_core::protocol::Winner;
use mastergoal_core::{BoardView, DisplayCell, Team};

// ============================================================================
// Glyphs
// ============================================================================

const EMPTY: char = '.';
const BALL: char = 'o';
const TARGET: char = '*';
const MOVING: char = '@';

fn piece_glyph(team: Team, goalkeeper: bool) -> char {
    match (team, goalkeeper) {
        (Team::Left, false) => 'L',
        (Team::Left, true) => 'l',
        (Team::Right, false) => 'R',
        (Team::Right, true) => 'r',
    }
}

fn grid(view: &BoardView) -> Vec<Vec<char>> {
    let mut cells = vec![vec![EMPTY; view.cols as usize]; view.rows as usize];
    let mut put = |cell: DisplayCell, glyph: char| {
        if let Some(slot) = cells
            .get_mut(cell.row as usize)
            .and_then(|row| row.get_mut(cell.col as usize))
        {
            *slot = glyph;
        }
    };
    for target in &view.targets {
        put(*target, TARGET);
    }
    if let Some(ball) = view.ball {
        put(ball, BALL);
    }
    for piece in &view.pieces {
        put(piece.cell, piece_glyph(piece.team, piece.goalkeeper));
    }
    if let Some(moving) = &view.moving {
        put(moving.cell, MOVING);
    }
    cells
}

/// Full board with header, score and any banners.
pub fn board(view: &BoardView) -> String {
    let mut out = String::new();
    let cells = grid(view);

    let _ = write!(out, "    ");
    for col in 0..view.cols {
        let _ = write!(out, "{:>3}", col);
    }
    out.push('\n');
    for (row, line) in cells.iter().enumerate() {
        let _ = write!(out, "{:>3} ", row);
        for glyph in line {
            let _ = write!(out, "{:>3}", glyph);
        }
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "\nScore  LEFT {}  RIGHT {}",
        view.score.left, view.score.right
    );
    if let Some(team) = view.current_team {
        let _ = write!(out, "To move: {team}");
        if let Some(secs) = view.countdown {
            let _ = write!(out, "  ({secs}s)");
        }
        out.push('\n');
    }
    if let Some(mv) = view.last_move {
        let _ = writeln!(
            out,
            "Last move: ({},{}) -> ({},{})",
            mv.from.row, mv.from.col, mv.to.row, mv.to.col
        );
    }
    for notice in &view.notices {
        let tag = match notice.kind {
            NoticeKind::NetworkError | NoticeKind::StorageError => "error",
            NoticeKind::SessionRecovered => "session",
            _ => "note",
        };
        let _ = writeln!(out, "[{tag}] {}", notice.message);
    }
    if let Some(dialog) = view.dialog {
        let _ = writeln!(out, "{}", dialog_line(dialog));
    }
    out
}

pub fn dialog_line(dialog: Dialog) -> String {
    match dialog {
        Dialog::Goal { team, score } => {
            format!("GOAL for {team}!  {} - {}", score.left, score.right)
        }
        Dialog::GameOver { winner, score } => {
            let result = match winner {
                Some(Winner::Left) => "LEFT wins",
                Some(Winner::Right) => "RIGHT wins",
                Some(Winner::Draw) => "Draw",
                None => "Game over",
            };
            format!("{result}.  Final score {} - {}", score.left, score.right)
        }
    }
}

/// One line describing the animated entity, for step-by-step replay.
pub fn frame(view: &BoardView) -> Option<String> {
    if let Some(moving) = &view.moving {
        return Some(format!(
            "  {} piece at ({},{})",
            moving.team, moving.cell.row, moving.cell.col
        ));
    }
    let ball = view.ball?;
    Some(format!("  ball at ({},{})", ball.row, ball.col))
}
