//! Calculation errors are values, not control flow.
//!
//! - **`ErrorCode`** : the canonical set of error codes a cell can hold
//! - **`CalcError`** : the code plus an optional diagnostic message
//!
//! Errors travel through the expression tree like any other [`Value`];
//! the evaluator never unwinds on them.

use std::{error::Error, fmt};

use crate::Value;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// All recognised calculation error codes.
///
/// `Display` renders the spreadsheet form (`#DIV/0`, `#NAME`, ...);
/// [`ErrorCode::code`] gives the bare code without the leading `#`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unresolvable identifier or function name.
    Name,
    /// An argument evaluated to an error and the function does not accept errors.
    Arg,
    /// Invalid or unresolvable reference.
    Ref,
    /// Type mismatch.
    Value,
    /// Division by zero.
    Div0,
    /// Circular reference.
    Loop,
    /// Malformed or empty range passed to a function that needs data.
    Range,
    /// Lookup found no match.
    Na,
    /// Unrecognized operator or expression unit.
    Expr,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::Name,
        ErrorCode::Arg,
        ErrorCode::Ref,
        ErrorCode::Value,
        ErrorCode::Div0,
        ErrorCode::Loop,
        ErrorCode::Range,
        ErrorCode::Na,
        ErrorCode::Expr,
    ];

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::Arg => "ARG",
            Self::Ref => "REF",
            Self::Value => "VALUE",
            Self::Div0 => "DIV/0",
            Self::Loop => "LOOP",
            Self::Range => "RANGE",
            Self::Na => "NA",
            Self::Expr => "EXPR",
        }
    }

    /// Accepts either the bare code (`VALUE`) or the display form (`#VALUE`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s);
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.code().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.code())
    }
}

/// The error payload carried by [`Value::Error`].
///
/// Equality only looks at the code; the message is diagnostic and two
/// `#VALUE` errors compare equal whatever produced them.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Eq, Hash)]
pub struct CalcError {
    pub code: ErrorCode,
    pub message: Option<String>,
}

/* ───────────────────── Constructors & helpers ─────────────────────── */

impl From<ErrorCode> for CalcError {
    fn from(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
        }
    }
}

impl CalcError {
    pub fn new(code: ErrorCode) -> Self {
        code.into()
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn from_error_string(s: &str) -> Option<Self> {
        ErrorCode::parse(s).map(Self::new)
    }
}

impl PartialEq for CalcError {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl PartialEq<ErrorCode> for CalcError {
    fn eq(&self, other: &ErrorCode) -> bool {
        self.code == *other
    }
}

/* ───────────────────────── Display / Error ────────────────────────── */

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for CalcError {}

impl From<CalcError> for Value {
    fn from(error: CalcError) -> Self {
        Value::Error(error)
    }
}

impl From<ErrorCode> for Value {
    fn from(code: ErrorCode) -> Self {
        Value::Error(code.into())
    }
}
