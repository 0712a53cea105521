use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Address, AddressError, CellAddress};

/// A rectangular block of cells. Either corner may carry an infinite axis,
/// in which case the area spans whole rows or columns.
///
/// Construct through [`Area::new`] so that `start` is always the top-left.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Area {
    pub start: Address,
    pub end: Address,
}

fn min_axis(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        _ => None,
    }
}

fn max_axis(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}

impl Area {
    /// Normalizes the corners. An infinite axis on either corner makes the
    /// axis infinite on both.
    pub fn new(start: Address, end: Address) -> Self {
        let (sr, er) = (min_axis(start.row, end.row), max_axis(start.row, end.row));
        let (sc, ec) = (
            min_axis(start.column, end.column),
            max_axis(start.column, end.column),
        );
        let (sr, er) = if start.row.is_none() || end.row.is_none() {
            (None, None)
        } else {
            (sr, er)
        };
        let (sc, ec) = if start.column.is_none() || end.column.is_none() {
            (None, None)
        } else {
            (sc, ec)
        };
        Self {
            start: Address {
                row: sr,
                column: sc,
                ..start
            },
            end: Address {
                row: er,
                column: ec,
                ..end
            },
        }
    }

    pub fn from_cells(a: CellAddress, b: CellAddress) -> Self {
        Self::new(a.into(), b.into())
    }

    pub fn single(cell: CellAddress) -> Self {
        Self::from_cells(cell, cell)
    }

    /// Spans whole rows (`3:5`).
    pub fn entire_row(&self) -> bool {
        self.start.column.is_none()
    }

    /// Spans whole columns (`A:C`).
    pub fn entire_column(&self) -> bool {
        self.start.row.is_none()
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_bounded() && self.end.is_bounded()
    }

    pub fn top_left(&self) -> Option<CellAddress> {
        self.start.to_cell()
    }

    pub fn contains(&self, cell: CellAddress) -> bool {
        let rows = match (self.start.row, self.end.row) {
            (Some(s), Some(e)) => (s..=e).contains(&cell.row),
            _ => true,
        };
        let cols = match (self.start.column, self.end.column) {
            (Some(s), Some(e)) => (s..=e).contains(&cell.column),
            _ => true,
        };
        rows && cols
    }

    pub fn intersects(&self, other: &Area) -> bool {
        fn overlap(a: (Option<u32>, Option<u32>), b: (Option<u32>, Option<u32>)) -> bool {
            match (a, b) {
                ((Some(a0), Some(a1)), (Some(b0), Some(b1))) => a0 <= b1 && b0 <= a1,
                _ => true,
            }
        }
        overlap(
            (self.start.row, self.end.row),
            (other.start.row, other.end.row),
        ) && overlap(
            (self.start.column, self.end.column),
            (other.start.column, other.end.column),
        )
    }

    /// `(rows, columns)`, or `None` for an unbounded area.
    pub fn size(&self) -> Option<(u32, u32)> {
        Some((
            self.end.row? - self.start.row? + 1,
            self.end.column? - self.start.column? + 1,
        ))
    }

    /// Clamps infinite axes to the given sheet extent.
    pub fn resolve(&self, rows: u32, columns: u32) -> Area {
        let last_row = rows.saturating_sub(1);
        let last_col = columns.saturating_sub(1);
        let mut start = self.start.clone();
        let mut end = self.end.clone();
        if self.entire_column() {
            start.row = Some(0);
            end.row = Some(last_row);
        }
        if self.entire_row() {
            start.column = Some(0);
            end.column = Some(last_col);
        }
        Area { start, end }
    }

    /// Every cell of a bounded area, column by column.
    pub fn cells(&self) -> Result<Vec<CellAddress>, AddressError> {
        let (Some(top), Some(bottom), Some(left), Some(right)) = (
            self.start.row,
            self.end.row,
            self.start.column,
            self.end.column,
        ) else {
            return Err(AddressError::Unbounded);
        };
        Ok((left..=right)
            .flat_map(|c| (top..=bottom).map(move |r| CellAddress::new(r, c)))
            .collect())
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.position_eq(&self.end) && self.is_bounded() {
            write!(f, "{}", self.start)
        } else {
            let mut end = self.end.clone();
            end.sheet = None;
            write!(f, "{}:{}", self.start, end)
        }
    }
}
