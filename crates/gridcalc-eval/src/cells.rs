//! Reference [`CellStore`]: sparse row-major storage.

use gridcalc_common::{Area, CalcError, CellAddress, ErrorCode, Value};

use crate::traits::CellStore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a cell holds, or what it last calculated to.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    #[default]
    Undefined,
    Number,
    Text,
    Boolean,
    Complex,
    Array,
    Error,
    Formula,
}

impl ValueType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Undefined => ValueType::Undefined,
            Value::Number(_) => ValueType::Number,
            Value::Text(_) => ValueType::Text,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Complex(_) => ValueType::Complex,
            Value::Array(_) => ValueType::Array,
            Value::Error(_) => ValueType::Error,
            Value::Metadata(meta) => ValueType::of(&meta.value),
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    /// Raw content. For formulas, the formula text.
    pub value: Value,
    pub value_type: ValueType,
    pub calculated: Value,
    pub calculated_type: ValueType,
    /// Set on every member of an array formula.
    pub area: Option<Area>,
    pub merge_area: Option<Area>,
    /// Number format, surfaced to `CELL("format", ...)`.
    pub format: Option<String>,
}

impl Cell {
    pub fn is_formula(&self) -> bool {
        self.value_type == ValueType::Formula
    }

    pub fn is_empty(&self) -> bool {
        self.value_type == ValueType::Undefined && self.area.is_none()
    }

    /// Formula text without the leading `=`.
    pub fn formula(&self) -> Option<&str> {
        match (&self.value, self.is_formula()) {
            (Value::Text(text), true) => Some(text.trim_start().trim_start_matches('=')),
            _ => None,
        }
    }

    /// What references to this cell read: the calculated value for formulas
    /// and array members, the raw value otherwise.
    pub fn get_value(&self) -> Value {
        if self.is_formula() || self.area.is_some() {
            self.calculated.clone()
        } else {
            self.value.clone()
        }
    }

    pub fn set_value(&mut self, value: Value) {
        self.value_type = ValueType::of(&value);
        self.value = value;
        self.flush();
    }

    pub fn set_formula(&mut self, text: impl Into<String>) {
        self.value = Value::Text(text.into());
        self.value_type = ValueType::Formula;
        self.flush();
    }

    pub fn set_calculated_value(&mut self, value: Value) {
        self.calculated_type = ValueType::of(&value);
        self.calculated = value;
    }

    pub fn set_calculation_error(&mut self, error: impl Into<CalcError>) {
        self.set_calculated_value(Value::Error(error.into()));
    }

    /// Drops the calculated result.
    pub fn flush(&mut self) {
        self.calculated = Value::Undefined;
        self.calculated_type = ValueType::Undefined;
    }

    pub fn reset(&mut self) {
        let format = self.format.take();
        *self = Cell {
            format,
            ..Cell::default()
        };
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.calculated.as_error().map(|e| e.code)
    }
}

/// Sparse grid. Rows are allocated on demand; extents only grow, except
/// through the structural operations.
#[derive(Debug, Clone, Default)]
pub struct Cells {
    data: Vec<Vec<Option<Cell>>>,
    rows: u32,
    columns: u32,
}

impl Cells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_cell(&mut self, address: CellAddress) -> &mut Cell {
        let (r, c) = (address.row as usize, address.column as usize);
        if self.data.len() <= r {
            self.data.resize_with(r + 1, Vec::new);
        }
        let row = &mut self.data[r];
        if row.len() <= c {
            row.resize_with(c + 1, || None);
        }
        self.rows = self.rows.max(address.row + 1);
        self.columns = self.columns.max(address.column + 1);
        row[c].get_or_insert_with(Cell::default)
    }

    pub fn set_value(&mut self, address: CellAddress, value: impl Into<Value>) {
        self.ensure_cell(address).set_value(value.into());
    }

    pub fn set_formula(&mut self, address: CellAddress, text: impl Into<String>) {
        self.ensure_cell(address).set_formula(text);
    }

    /// Empties a cell's content. Formatting survives.
    pub fn clear(&mut self, address: CellAddress) {
        if let Some(cell) = self.get_cell_mut(address, false) {
            cell.reset();
        }
    }

    pub fn insert_rows(&mut self, before: u32, count: u32) {
        let at = (before as usize).min(self.data.len());
        if at < self.data.len() {
            self.data
                .splice(at..at, std::iter::repeat_with(Vec::new).take(count as usize));
        }
        self.rows = self.rows.saturating_add(count);
    }

    pub fn delete_rows(&mut self, start: u32, count: u32) {
        let from = (start as usize).min(self.data.len());
        let to = (start as usize + count as usize).min(self.data.len());
        self.data.drain(from..to);
        self.rows = self.rows.saturating_sub(count);
    }

    pub fn insert_columns(&mut self, before: u32, count: u32) {
        let at = before as usize;
        for row in &mut self.data {
            if at < row.len() {
                row.splice(at..at, std::iter::repeat_with(|| None).take(count as usize));
            }
        }
        self.columns = self.columns.saturating_add(count);
    }

    pub fn delete_columns(&mut self, start: u32, count: u32) {
        for row in &mut self.data {
            let from = (start as usize).min(row.len());
            let to = (start as usize + count as usize).min(row.len());
            row.drain(from..to);
        }
        self.columns = self.columns.saturating_sub(count);
    }

    /// Every populated cell, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (CellAddress, &Cell)> {
        self.data.iter().enumerate().flat_map(|(r, row)| {
            row.iter().enumerate().filter_map(move |(c, cell)| {
                cell.as_ref()
                    .map(|cell| (CellAddress::new(r as u32, c as u32), cell))
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (CellAddress, &mut Cell)> {
        self.data.iter_mut().enumerate().flat_map(|(r, row)| {
            row.iter_mut().enumerate().filter_map(move |(c, cell)| {
                cell.as_mut()
                    .map(|cell| (CellAddress::new(r as u32, c as u32), cell))
            })
        })
    }
}

impl CellStore for Cells {
    fn get_cell(&self, address: CellAddress) -> Option<&Cell> {
        self.data
            .get(address.row as usize)?
            .get(address.column as usize)?
            .as_ref()
    }

    fn get_cell_mut(&mut self, address: CellAddress, create: bool) -> Option<&mut Cell> {
        if create {
            return Some(self.ensure_cell(address));
        }
        self.data
            .get_mut(address.row as usize)?
            .get_mut(address.column as usize)?
            .as_mut()
    }

    fn rows(&self) -> u32 {
        self.rows
    }

    fn columns(&self) -> u32 {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(label: &str) -> CellAddress {
        CellAddress::from_label(label).unwrap()
    }

    #[test]
    fn cells_grow_on_demand() {
        let mut cells = Cells::new();
        assert!(cells.get_cell(a("C5")).is_none());
        assert!(cells.get_cell_mut(a("C5"), false).is_none());
        cells.set_value(a("C5"), 3.0);
        assert_eq!(cells.rows(), 5);
        assert_eq!(cells.columns(), 3);
        assert_eq!(cells.get_cell(a("C5")).unwrap().value_type, ValueType::Number);
        assert!(cells.get_cell(a("A1")).is_none());
    }

    #[test]
    fn formula_cells_read_calculated_value() {
        let mut cells = Cells::new();
        cells.set_formula(a("A1"), "=1+1");
        let cell = cells.get_cell_mut(a("A1"), false).unwrap();
        assert_eq!(cell.formula(), Some("1+1"));
        assert_eq!(cell.get_value(), Value::Undefined);
        cell.set_calculated_value(Value::Number(2.0));
        assert_eq!(cell.get_value(), Value::Number(2.0));
        cell.set_calculation_error(ErrorCode::Loop);
        assert_eq!(cell.error_code(), Some(ErrorCode::Loop));
        assert_eq!(cell.calculated_type, ValueType::Error);
    }

    #[test]
    fn get_range_is_column_major_and_keeps_errors() {
        let mut cells = Cells::new();
        cells.set_value(a("A1"), 1.0);
        cells.set_value(a("B1"), 2.0);
        cells.set_formula(a("A2"), "1/0");
        cells
            .get_cell_mut(a("A2"), false)
            .unwrap()
            .set_calculation_error(ErrorCode::Div0);

        let range = cells.get_range(a("A1"), a("B2"));
        assert_eq!(
            range,
            Value::Array(vec![
                vec![Value::Number(1.0), Value::error(ErrorCode::Div0)],
                vec![Value::Number(2.0), Value::Undefined],
            ])
        );
        assert_eq!(cells.get_range(a("B1"), a("B1")), Value::Number(2.0));
    }

    #[test]
    fn iterate_area_rejects_unbounded() {
        let mut cells = Cells::new();
        cells.set_value(a("A1"), 1.0);
        cells.set_value(a("A3"), 3.0);
        let mut seen = Vec::new();
        cells
            .iterate_area(&Area::from_cells(a("A1"), a("B3")), &mut |addr, _| {
                seen.push(addr.to_string())
            })
            .unwrap();
        assert_eq!(seen, ["A1", "A3"]);

        let column = Area::new(
            gridcalc_common::Address::entire_column(0),
            gridcalc_common::Address::entire_column(0),
        );
        assert!(cells.iterate_area(&column, &mut |_, _| {}).is_err());
    }

    #[test]
    fn structural_edits_shift_storage() {
        let mut cells = Cells::new();
        cells.set_value(a("A1"), 1.0);
        cells.set_value(a("A2"), 2.0);
        cells.set_value(a("B2"), 3.0);

        cells.insert_rows(1, 2);
        assert_eq!(cells.get_cell(a("A4")).unwrap().value, Value::Number(2.0));
        assert!(cells.get_cell(a("A2")).is_none());
        assert_eq!(cells.rows(), 4);

        cells.delete_rows(1, 2);
        assert_eq!(cells.get_cell(a("A2")).unwrap().value, Value::Number(2.0));

        cells.insert_columns(0, 1);
        assert_eq!(cells.get_cell(a("C2")).unwrap().value, Value::Number(3.0));
        cells.delete_columns(0, 1);
        assert_eq!(cells.get_cell(a("B2")).unwrap().value, Value::Number(3.0));
        assert_eq!(cells.columns(), 2);
    }

    #[test]
    fn clear_keeps_format() {
        let mut cells = Cells::new();
        cells.set_value(a("A1"), 5.0);
        cells.ensure_cell(a("A1")).format = Some("0.00".into());
        cells.clear(a("A1"));
        let cell = cells.get_cell(a("A1")).unwrap();
        assert_eq!(cell.value, Value::Undefined);
        assert_eq!(cell.format.as_deref(), Some("0.00"));
    }
}
