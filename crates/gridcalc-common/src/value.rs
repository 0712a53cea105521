use chrono::{Datelike, Duration as ChronoDur, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt::{self, Display};

use crate::{CalcError, CellAddress, Complex, ErrorCode};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ───────────────────── Lotus date-serial utilities ───────────────────
Serial 0 = 1899-12-30, so serial 1 = 1899-12-31 and serial 2 = 1900-01-01.
Counting from the 30th absorbs the phantom 1900-02-29 for every date
after February 1900, which is the only range anyone cares about.
Time is stored as fractional days (no timezone).
------------------------------------------------------------------- */

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

pub fn date_to_serial(date: &NaiveDate) -> f64 {
    (*date - epoch()).num_days() as f64
}

pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let secs_in_day = dt.time().num_seconds_from_midnight() as f64;
    date_to_serial(&dt.date()) + secs_in_day / 86_400.0
}

pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor() as i64;
    let frac_secs = ((serial - serial.floor()) * 86_400.0).round() as i64;
    let date = epoch().checked_add_signed(ChronoDur::try_days(days)?)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(frac_secs.rem_euclid(86_400) as u32, 0)?;
    Some(date.and_time(time))
}

/// `(year, month, day)` for a serial, or `None` when out of chrono's range.
pub fn serial_to_ymd(serial: f64) -> Option<(i32, u32, u32)> {
    serial_to_datetime(serial).map(|dt| (dt.year(), dt.month(), dt.day()))
}

/// Formats a number the way a cell shows it: integers without a fraction,
/// everything else with the shortest round-tripping representation.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        // avoids "-0"
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Cell reference information handed to functions that ask for metadata
/// instead of a plain value.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CellMetadata {
    pub address: CellAddress,
    pub value: Value,
    pub format: Option<String>,
}

/// A runtime value.
///
/// Arrays are column-major: `values[column][row]`. Every column has the
/// same length.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Number(f64),
    Text(String),
    Boolean(bool),
    Complex(Complex),
    Array(Vec<Vec<Value>>),
    Metadata(Box<CellMetadata>),
    Error(CalcError),
}

impl Value {
    pub fn error(code: ErrorCode) -> Self {
        Value::Error(CalcError::new(code))
    }

    pub fn error_with(code: ErrorCode, message: impl Into<String>) -> Self {
        Value::Error(CalcError::new(code).with_message(message))
    }

    /// Builds a single-column array from a row list.
    pub fn column(values: Vec<Value>) -> Self {
        Value::Array(vec![values])
    }

    /// Builds an array from row-major data, transposing into column-major.
    /// Ragged input is padded with `Undefined`.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let height = rows.len();
        let mut columns = vec![Vec::with_capacity(height); width];
        for row in rows {
            let len = row.len();
            for (c, v) in row.into_iter().enumerate() {
                columns[c].push(v);
            }
            for column in columns.iter_mut().skip(len) {
                column.push(Value::Undefined);
            }
        }
        Value::Array(columns)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_error(&self) -> Option<&CalcError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// `(columns, rows)` for arrays, `(1, 1)` for scalars.
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Value::Array(cols) => (cols.len(), cols.first().map_or(0, Vec::len)),
            _ => (1, 1),
        }
    }

    /// Strips metadata wrappers and unwraps 1x1 arrays.
    pub fn scalar(&self) -> &Value {
        match self {
            Value::Metadata(meta) => meta.value.scalar(),
            Value::Array(cols) if cols.len() == 1 && cols[0].len() == 1 => cols[0][0].scalar(),
            other => other,
        }
    }

    /// Visits every scalar, column by column. Nested arrays are flattened.
    pub fn for_each_scalar<'a>(&'a self, f: &mut impl FnMut(&'a Value)) {
        match self {
            Value::Array(cols) => {
                for col in cols {
                    for v in col {
                        v.for_each_scalar(f);
                    }
                }
            }
            Value::Metadata(meta) => meta.value.for_each_scalar(f),
            other => f(other),
        }
    }

    pub fn flatten(&self) -> Vec<&Value> {
        let mut out = Vec::new();
        self.for_each_scalar(&mut |v| out.push(v));
        out
    }

    /* ===== coercion ===== */

    /// Numeric coercion used by arithmetic operators.
    pub fn to_number(&self) -> Result<f64, CalcError> {
        match self.scalar() {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Undefined => Ok(0.0),
            Value::Text(s) => parse_numeric_text(s).ok_or_else(|| {
                CalcError::new(ErrorCode::Value).with_message(format!("not a number: {s:?}"))
            }),
            Value::Complex(c) if c.is_real() => Ok(c.real),
            Value::Error(e) => Err(e.clone()),
            _ => Err(CalcError::new(ErrorCode::Value)),
        }
    }

    /// Like [`Value::to_number`] but lifts reals into the complex plane.
    pub fn to_complex(&self) -> Result<Complex, CalcError> {
        match self.scalar() {
            Value::Complex(c) => Ok(*c),
            other => other.to_number().map(Complex::from),
        }
    }

    pub fn to_bool(&self) -> Result<bool, CalcError> {
        match self.scalar() {
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Undefined => Ok(false),
            Value::Text(s) => {
                let t = s.trim();
                if t.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if t.eq_ignore_ascii_case("false") || t.is_empty() {
                    Ok(false)
                } else {
                    parse_numeric_text(t)
                        .map(|n| n != 0.0)
                        .ok_or_else(|| CalcError::new(ErrorCode::Value))
                }
            }
            Value::Complex(c) => Ok(c.real != 0.0 || c.imaginary != 0.0),
            Value::Error(e) => Err(e.clone()),
            _ => Err(CalcError::new(ErrorCode::Value)),
        }
    }

    /// Text form used by concatenation.
    pub fn to_text(&self) -> String {
        match self.scalar() {
            Value::Undefined => String::new(),
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        self.to_bool().unwrap_or(false)
    }
}

/// Parses cell text as a number. Surrounding whitespace is ignored and empty
/// text reads as zero.
pub fn parse_numeric_text(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    // f64::from_str accepts "inf"/"nan"; cells do not
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    t.parse::<f64>().ok()
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => Ok(()),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Complex(c) => write!(f, "{c}"),
            Value::Error(e) => write!(f, "{}", e.code),
            Value::Metadata(meta) => write!(f, "{}", meta.value),
            Value::Array(cols) => {
                // row-major presentation: {a, b; c, d}
                let rows = cols.first().map_or(0, Vec::len);
                f.write_str("{")?;
                for r in 0..rows {
                    if r > 0 {
                        f.write_str("; ")?;
                    }
                    for (c, col) in cols.iter().enumerate() {
                        if c > 0 {
                            f.write_str(", ")?;
                        }
                        match &col[r] {
                            Value::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\""))?,
                            v => write!(f, "{v}")?,
                        }
                    }
                }
                f.write_str("}")
            }
        }
    }
}

/* ───────────────────────────── From impls ─────────────────────────── */

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Complex> for Value {
    fn from(c: Complex) -> Self {
        Value::Complex(c)
    }
}

impl From<Result<f64, CalcError>> for Value {
    fn from(r: Result<f64, CalcError>) -> Self {
        match r {
            Ok(n) => Value::Number(n),
            Err(e) => Value::Error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lotus_serial_epoch() {
        let d = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        assert_eq!(date_to_serial(&d), 2.0);
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let serial = date_to_serial(&d);
        assert_eq!(serial, 45366.0);
        assert_eq!(serial_to_ymd(serial), Some((2024, 3, 15)));
        assert_eq!(serial_to_ymd(serial + 0.75), Some((2024, 3, 15)));
    }

    #[test]
    fn datetime_fraction() {
        let dt = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let serial = datetime_to_serial(&dt);
        assert_eq!(serial.fract(), 0.5);
        assert_eq!(serial_to_datetime(serial), Some(dt));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.25), "1.25");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[test]
    fn coercions() {
        assert_eq!(Value::from(" 12 ").to_number(), Ok(12.0));
        assert_eq!(Value::from("").to_number(), Ok(0.0));
        assert_eq!(Value::Boolean(true).to_number(), Ok(1.0));
        assert!(Value::from("abc").to_number().is_err());
        assert!(Value::from("inf").to_number().is_err());
        assert_eq!(Value::from("TRUE").to_bool(), Ok(true));
        assert_eq!(Value::Number(0.0).to_bool(), Ok(false));
        let err = Value::error(ErrorCode::Div0).to_number().unwrap_err();
        assert_eq!(err.code, ErrorCode::Div0);
    }

    #[test]
    fn arrays_are_column_major() {
        let v = Value::from_rows(vec![
            vec![1.into(), 2.into()],
            vec![3.into(), 4.into()],
        ]);
        match &v {
            Value::Array(cols) => {
                assert_eq!(cols[0], vec![Value::Number(1.0), Value::Number(3.0)]);
                assert_eq!(cols[1], vec![Value::Number(2.0), Value::Number(4.0)]);
            }
            _ => panic!("expected array"),
        }
        assert_eq!(v.dimensions(), (2, 2));
        assert_eq!(v.to_string(), "{1, 2; 3, 4}");
        let flat: Vec<f64> = v.flatten().iter().map(|x| x.to_number().unwrap()).collect();
        assert_eq!(flat, vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn ragged_rows_are_padded() {
        let v = Value::from_rows(vec![vec![1.into()], vec![2.into(), 3.into()]]);
        assert_eq!(v.dimensions(), (2, 2));
        if let Value::Array(cols) = v {
            assert_eq!(cols[1][0], Value::Undefined);
        }
    }

    #[test]
    fn scalar_unwraps_singletons() {
        let v = Value::column(vec![Value::from(5.0)]);
        assert_eq!(v.scalar(), &Value::Number(5.0));
        assert_eq!(v.to_number(), Ok(5.0));
    }
}
