//! Cell coordinates and reference labels.
//!
//! - **`CellAddress`** : a concrete 0-based `(row, column)` position
//! - **`Address`** : a reference as written in a formula, with `$` flags,
//!   an optional sheet and possibly infinite axes (`A:A`, `3:3`)

use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Column labels are at most `ZZZ`.
pub const MAX_COLUMN_LETTERS: usize = 3;

/// Highest column index addressable with three letters (`ZZZ`).
pub const MAX_COLUMN: u32 = 26 + 26 * 26 + 26 * 26 * 26 - 1;

/// Highest 0-based row whose 1-based label still fits a `u32`.
pub const MAX_ROW: u32 = u32::MAX - 1;

/// Errors raised while reading an address label.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AddressError {
    Empty,
    /// Column part missing, too long, or not alphabetic.
    InvalidColumn(String),
    /// Row part missing or not numeric.
    InvalidRow(String),
    /// Row numbers are 1-based in labels.
    ZeroRow,
    /// The operation needs a bounded area.
    Unbounded,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::Empty => write!(f, "empty address label"),
            AddressError::InvalidColumn(s) => write!(f, "invalid column in address: {s}"),
            AddressError::InvalidRow(s) => write!(f, "invalid row in address: {s}"),
            AddressError::ZeroRow => write!(f, "row numbers start at 1"),
            AddressError::Unbounded => {
                write!(f, "area covers an entire row or column and cannot be iterated")
            }
        }
    }
}

impl Error for AddressError {}

/* ───────────────────────── Column naming ─────────────────────────── */

/// Bijective base-26: `0 → A`, `25 → Z`, `26 → AA`.
pub fn column_label(mut index: u32) -> String {
    let mut out = Vec::with_capacity(MAX_COLUMN_LETTERS);
    loop {
        out.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Inverse of [`column_label`]. Case-insensitive, 1 to 3 letters.
pub fn column_index(label: &str) -> Option<u32> {
    if label.is_empty() || label.len() > MAX_COLUMN_LETTERS {
        return None;
    }
    let mut index: i64 = -1;
    for ch in label.bytes() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() - b'A') as i64;
        index = 26 * (index + 1) + digit;
    }
    u32::try_from(index).ok()
}

/* ───────────────────────────── CellAddress ───────────────────────── */

/// A concrete cell position, 0-based. Orders row-major.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CellAddress {
    pub row: u32,
    pub column: u32,
}

impl CellAddress {
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Parses `A1`, `$B$7`, `c3`. No sheet prefix, no infinite axes.
    pub fn from_label(label: &str) -> Result<Self, AddressError> {
        let s = label.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        let s = s.strip_prefix('$').unwrap_or(s);
        let letters = s.bytes().take_while(u8::is_ascii_alphabetic).count();
        let (col_part, rest) = s.split_at(letters);
        let column =
            column_index(col_part).ok_or_else(|| AddressError::InvalidColumn(label.to_string()))?;
        let rest = rest.strip_prefix('$').unwrap_or(rest);
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressError::InvalidRow(label.to_string()));
        }
        let row: u32 = rest
            .parse()
            .map_err(|_| AddressError::InvalidRow(label.to_string()))?;
        if row == 0 {
            return Err(AddressError::ZeroRow);
        }
        Ok(Self::new(row - 1, column))
    }

    pub fn offset(&self, rows: u32, columns: u32) -> Self {
        Self::new(self.row + rows, self.column + columns)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_label(self.column), self.row + 1)
    }
}

/* ──────────────────────────────── Address ────────────────────────── */

/// A reference as written in a formula.
///
/// `row: None` means the whole column (`C:C`), `column: None` the whole row
/// (`3:3`).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Address {
    pub row: Option<u32>,
    pub column: Option<u32>,
    pub absolute_row: bool,
    pub absolute_column: bool,
    pub sheet: Option<String>,
}

impl Address {
    pub fn cell(row: u32, column: u32) -> Self {
        Self {
            row: Some(row),
            column: Some(column),
            ..Self::default()
        }
    }

    pub fn entire_row(row: u32) -> Self {
        Self {
            row: Some(row),
            ..Self::default()
        }
    }

    pub fn entire_column(column: u32) -> Self {
        Self {
            column: Some(column),
            ..Self::default()
        }
    }

    pub fn absolute(mut self, row: bool, column: bool) -> Self {
        self.absolute_row = row;
        self.absolute_column = column;
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.row.is_some() && self.column.is_some()
    }

    pub fn to_cell(&self) -> Option<CellAddress> {
        Some(CellAddress::new(self.row?, self.column?))
    }

    /// Same position, `$` flags and sheet dropped.
    pub fn position_eq(&self, other: &Address) -> bool {
        self.row == other.row && self.column == other.column
    }

    /// Renders the label after shifting relative axes by the given offset.
    /// Shifts that leave the sheet, and references with no bounded axis,
    /// render `#REF`.
    pub fn label_with_offset(&self, rows: i64, columns: i64) -> String {
        let shift = |value: Option<u32>, absolute: bool, delta: i64, max: u32| {
            match value {
                None => Ok(None),
                Some(v) if absolute => Ok(Some(v as i64)),
                Some(v) => {
                    let shifted = v as i64 + delta;
                    if (0..=max as i64).contains(&shifted) {
                        Ok(Some(shifted))
                    } else {
                        Err(())
                    }
                }
            }
        };
        let (Ok(row), Ok(column)) = (
            shift(self.row, self.absolute_row, rows, MAX_ROW),
            shift(self.column, self.absolute_column, columns, MAX_COLUMN),
        ) else {
            return "#REF".to_string();
        };

        let mut label = String::new();
        if let Some(sheet) = &self.sheet {
            label.push_str(&sheet_prefix(sheet));
        }
        let dollar = |abs: bool| if abs { "$" } else { "" };
        match (row, column) {
            (None, None) => return "#REF".to_string(),
            (None, Some(c)) => {
                label.push_str(dollar(self.absolute_column));
                label.push_str(&column_label(c as u32));
            }
            (Some(r), None) => {
                label.push_str(dollar(self.absolute_row));
                label.push_str(&(r + 1).to_string());
            }
            (Some(r), Some(c)) => {
                label.push_str(dollar(self.absolute_column));
                label.push_str(&column_label(c as u32));
                label.push_str(dollar(self.absolute_row));
                label.push_str(&(r + 1).to_string());
            }
        }
        label
    }
}

impl From<CellAddress> for Address {
    fn from(a: CellAddress) -> Self {
        Address::cell(a.row, a.column)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label_with_offset(0, 0))
    }
}

/// Sheet names containing whitespace or any of `-+=<>!()` need quoting.
pub fn sheet_needs_quotes(name: &str) -> bool {
    name.chars()
        .any(|c| c.is_whitespace() || matches!(c, '-' | '+' | '=' | '<' | '>' | '!' | '(' | ')'))
}

/// `Sheet1!` or `'My Sheet'!`.
pub fn sheet_prefix(name: &str) -> String {
    if sheet_needs_quotes(name) {
        format!("'{name}'!")
    } else {
        format!("{name}!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn offsets_off_the_sheet_render_ref() {
        assert_eq!(Address::cell(0, MAX_COLUMN).label_with_offset(0, 1), "#REF");
        assert_eq!(Address::cell(MAX_ROW, 0).label_with_offset(1, 0), "#REF");
        assert_eq!(Address::entire_column(MAX_COLUMN).label_with_offset(5, 1), "#REF");
        let pinned = Address::cell(0, MAX_COLUMN).absolute(false, true);
        assert_eq!(pinned.label_with_offset(0, 1), "$ZZZ1");
    }

    #[test]
    fn column_bijection_edges() {
        assert_eq!(column_label(0), "A");
        assert_eq!(column_label(25), "Z");
        assert_eq!(column_label(26), "AA");
        assert_eq!(column_label(701), "ZZ");
        assert_eq!(column_label(702), "AAA");
        assert_eq!(column_label(MAX_COLUMN), "ZZZ");
        assert_eq!(column_index("aa"), Some(26));
        assert_eq!(column_index("ZZZ"), Some(MAX_COLUMN));
        assert_eq!(column_index("AAAA"), None);
        assert_eq!(column_index("A1"), None);
        assert_eq!(column_index(""), None);
    }

    #[test]
    fn cell_address_labels() {
        assert_eq!(CellAddress::from_label("A1"), Ok(CellAddress::new(0, 0)));
        assert_eq!(CellAddress::from_label("$c$10"), Ok(CellAddress::new(9, 2)));
        assert_eq!(CellAddress::from_label("A0"), Err(AddressError::ZeroRow));
        assert!(CellAddress::from_label("1A").is_err());
        assert!(CellAddress::from_label("A").is_err());
        assert_eq!(CellAddress::new(4, 27).to_string(), "AB5");
    }

    #[test]
    fn address_labels_and_offsets() {
        let a = Address::cell(0, 0).absolute(false, true);
        assert_eq!(a.to_string(), "$A1");
        assert_eq!(a.label_with_offset(2, 5), "$A3");
        assert_eq!(a.label_with_offset(-1, 0), "#REF");
        assert_eq!(Address::cell(3, 3).label_with_offset(-1, -3), "A3");

        assert_eq!(Address::entire_column(2).to_string(), "C");
        assert_eq!(Address::entire_row(2).absolute(true, false).to_string(), "$3");
        assert_eq!(Address::default().to_string(), "#REF");

        let s = Address::cell(1, 1).with_sheet("Sheet2");
        assert_eq!(s.to_string(), "Sheet2!B2");
        let q = Address::cell(1, 1).with_sheet("My Sheet");
        assert_eq!(q.to_string(), "'My Sheet'!B2");
        assert!(sheet_needs_quotes("a-b"));
        assert!(!sheet_needs_quotes("Data_2024"));
    }

    proptest! {
        #[test]
        fn column_label_round_trips(index in 0u32..=MAX_COLUMN) {
            prop_assert_eq!(column_index(&column_label(index)), Some(index));
        }

        #[test]
        fn cell_label_round_trips(row in 0u32..1_000_000, column in 0u32..=MAX_COLUMN) {
            let addr = CellAddress::new(row, column);
            prop_assert_eq!(CellAddress::from_label(&addr.to_string()), Ok(addr));
        }
    }
}
