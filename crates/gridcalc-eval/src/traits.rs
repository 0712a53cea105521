//! Seams between the calculator and its collaborators.

use gridcalc_common::{AddressError, Area, CellAddress, Value};

use crate::cells::Cell;

/* ─────────────────────────── CellStore ─────────────────────────── */

/// Cell storage the calculator reads from and the engine writes into.
pub trait CellStore {
    fn get_cell(&self, address: CellAddress) -> Option<&Cell>;

    /// With `create`, a missing cell is inserted empty.
    fn get_cell_mut(&mut self, address: CellAddress, create: bool) -> Option<&mut Cell>;

    /// Extent of the populated grid.
    fn rows(&self) -> u32;
    fn columns(&self) -> u32;

    /// A single cell yields its value, anything larger a column-major
    /// array. Error cells stay errors; empty cells are `Undefined`.
    fn get_range(&self, start: CellAddress, end: CellAddress) -> Value {
        let value_at = |address: CellAddress| {
            self.get_cell(address)
                .map(Cell::get_value)
                .unwrap_or_default()
        };
        if start == end {
            return value_at(start);
        }
        let (top, bottom) = (start.row.min(end.row), start.row.max(end.row));
        let (left, right) = (start.column.min(end.column), start.column.max(end.column));
        Value::Array(
            (left..=right)
                .map(|c| {
                    (top..=bottom)
                        .map(|r| value_at(CellAddress::new(r, c)))
                        .collect()
                })
                .collect(),
        )
    }

    /// Visits the populated cells of a bounded area, column by column.
    fn iterate_area(
        &self,
        area: &Area,
        f: &mut dyn FnMut(CellAddress, &Cell),
    ) -> Result<(), AddressError> {
        for address in area.cells()? {
            if let Some(cell) = self.get_cell(address) {
                f(address, cell);
            }
        }
        Ok(())
    }
}

/* ─────────────────────────── Collector ─────────────────────────── */

/// Per-cell sample storage fed by collector arguments.
pub trait Collector {
    /// Marks a cell whose value is recorded on every trial.
    fn register(&mut self, address: CellAddress);

    /// Samples gathered for a cell, as a single column. `Undefined` when
    /// nothing was recorded.
    fn collected(&self, address: CellAddress) -> Value;
}
