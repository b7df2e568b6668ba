//! Logical <-> display coordinate mapping.
//!
//! Every consumer (render model, click hit-testing, drag hover) goes through
//! [`CoordinateMapper`]; the orientation flag is never inspected elsewhere.

use serde::{Deserialize, Serialize};

use crate::Position;

/// Board presentation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Display rows are logical rows.
    #[default]
    Natural,
    /// Display rows are logical columns (landscape).
    Rotated,
}

impl Orientation {
    #[inline]
    pub fn from_rotated(rotated: bool) -> Orientation {
        if rotated {
            Orientation::Rotated
        } else {
            Orientation::Natural
        }
    }

    #[inline]
    pub fn is_rotated(self) -> bool {
        self == Orientation::Rotated
    }
}

/// Cell in display space.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct DisplayCell {
    pub row: u8,
    pub col: u8,
}

impl DisplayCell {
    #[inline]
    pub const fn new(row: u8, col: u8) -> DisplayCell {
        DisplayCell { row, col }
    }
}

/// Logical grid size.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BoardDimensions {
    pub rows: u8,
    pub cols: u8,
}

impl BoardDimensions {
    pub const MASTERGOAL: BoardDimensions = BoardDimensions { rows: 15, cols: 11 };

    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// Grid size as seen on screen.
    #[inline]
    pub fn display(&self, orientation: Orientation) -> (u8, u8) {
        match orientation {
            Orientation::Natural => (self.rows, self.cols),
            Orientation::Rotated => (self.cols, self.rows),
        }
    }

    /// Iterate every logical cell, row-major.
    pub fn cells(self) -> impl Iterator<Item = Position> {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Position::new(row, col)))
    }
}

impl Default for BoardDimensions {
    fn default() -> Self {
        BoardDimensions::MASTERGOAL
    }
}

/// Pure transform between the two spaces.
///
/// Out-of-bounds input is a caller contract violation; it is mapped like any
/// other cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CoordinateMapper {
    orientation: Orientation,
}

impl CoordinateMapper {
    #[inline]
    pub fn new(orientation: Orientation) -> CoordinateMapper {
        CoordinateMapper { orientation }
    }

    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    #[inline]
    pub fn to_display(&self, logical: Position) -> DisplayCell {
        to_display(logical, self.orientation)
    }

    #[inline]
    pub fn to_logical(&self, display: DisplayCell) -> Position {
        to_logical(display, self.orientation)
    }
}

/// Map a logical cell onto the screen.
#[inline]
pub fn to_display(logical: Position, orientation: Orientation) -> DisplayCell {
    match orientation {
        Orientation::Natural => DisplayCell::new(logical.row, logical.col),
        Orientation::Rotated => DisplayCell::new(logical.col, logical.row),
    }
}

/// Map a screen cell back into logical space.
#[inline]
pub fn to_logical(display: DisplayCell, orientation: Orientation) -> Position {
    match orientation {
        Orientation::Natural => Position::new(display.row, display.col),
        Orientation::Rotated => Position::new(display.col, display.row),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_natural_is_identity() {
        let pos = Position::new(7, 5);
        assert_eq!(to_display(pos, Orientation::Natural), DisplayCell::new(7, 5));
    }

    #[test]
    fn test_rotated_swaps_axes() {
        let pos = Position::new(14, 3);
        assert_eq!(to_display(pos, Orientation::Rotated), DisplayCell::new(3, 14));
        assert_eq!(to_logical(DisplayCell::new(3, 14), Orientation::Rotated), pos);
    }

    #[test]
    fn test_display_dimensions() {
        let dims = BoardDimensions::MASTERGOAL;
        assert_eq!(dims.display(Orientation::Natural), (15, 11));
        assert_eq!(dims.display(Orientation::Rotated), (11, 15));
        assert_eq!(dims.cells().count(), 165);
    }

    fn orientation() -> impl Strategy<Value = Orientation> {
        prop_oneof![Just(Orientation::Natural), Just(Orientation::Rotated)]
    }

    proptest! {
        #[test]
        fn display_logical_display_is_identity(row in 0u8..15, col in 0u8..15, o in orientation()) {
            let d = DisplayCell::new(row, col);
            prop_assert_eq!(to_display(to_logical(d, o), o), d);
        }

        #[test]
        fn logical_display_logical_is_identity(row in 0u8..15, col in 0u8..11, o in orientation()) {
            let p = Position::new(row, col);
            let mapper = CoordinateMapper::new(o);
            prop_assert_eq!(mapper.to_logical(mapper.to_display(p)), p);
        }
    }
}
