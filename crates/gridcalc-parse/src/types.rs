use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::expression::{AddressUnit, ExpressionUnit, RangeUnit};

/// Character separating integer and fraction in number literals.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecimalMark {
    #[default]
    Period,
    Comma,
}

impl DecimalMark {
    pub const fn as_char(self) -> char {
        match self {
            DecimalMark::Period => '.',
            DecimalMark::Comma => ',',
        }
    }
}

/// Character separating function arguments.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArgumentSeparator {
    #[default]
    Comma,
    Semicolon,
}

impl ArgumentSeparator {
    pub const fn as_char(self) -> char {
        match self {
            ArgumentSeparator::Comma => ',',
            ArgumentSeparator::Semicolon => ';',
        }
    }
}

/// Locale settings used while parsing.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    pub decimal_mark: DecimalMark,
    pub argument_separator: ArgumentSeparator,
    /// `i` or `j`.
    pub imaginary_char: char,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            decimal_mark: DecimalMark::Period,
            argument_separator: ArgumentSeparator::Comma,
            imaginary_char: 'i',
        }
    }
}

impl ParserConfig {
    /// A comma decimal mark forces the semicolon argument separator.
    pub fn for_decimal_mark(decimal_mark: DecimalMark) -> Self {
        let argument_separator = match decimal_mark {
            DecimalMark::Comma => ArgumentSeparator::Semicolon,
            DecimalMark::Period => ArgumentSeparator::Comma,
        };
        Self {
            decimal_mark,
            argument_separator,
            ..Self::default()
        }
    }

    pub fn with_imaginary_char(mut self, c: char) -> Self {
        self.imaginary_char = c;
        self
    }
}

/// Shift applied to relative references when rendering (copy/paste, moves).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOffset {
    pub rows: i64,
    pub columns: i64,
}

/// Options for [`crate::Parser::render`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderOptions {
    pub offset: RenderOffset,
    /// Text emitted for missing arguments.
    pub missing: String,
    pub convert_decimal: Option<DecimalMark>,
    pub convert_argument_separator: Option<ArgumentSeparator>,
    pub convert_imaginary_char: Option<char>,
}

impl RenderOptions {
    pub fn with_offset(mut self, rows: i64, columns: i64) -> Self {
        self.offset = RenderOffset { rows, columns };
        self
    }

    pub fn with_missing(mut self, missing: impl Into<String>) -> Self {
        self.missing = missing.into();
        self
    }

    /// Converts decimal mark and argument separator together, the same
    /// coupling [`ParserConfig::for_decimal_mark`] applies.
    pub fn with_locale(mut self, decimal_mark: DecimalMark) -> Self {
        let target = ParserConfig::for_decimal_mark(decimal_mark);
        self.convert_decimal = Some(target.decimal_mark);
        self.convert_argument_separator = Some(target.argument_separator);
        self
    }

    pub fn with_imaginary_char(mut self, c: char) -> Self {
        self.convert_imaginary_char = Some(c);
        self
    }
}

/// Why a parse failed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedCharacter(char),
    UnexpectedOperator(String),
    /// Two operands with no operator between them.
    MultipleExpressions,
    /// Expression ends with a binary operator.
    TrailingOperator(String),
    UnbalancedQuote,
    UnterminatedString,
    UnmatchedParenthesis,
    InvalidArrayCharacter(char),
    InvalidArrayValue,
    UnterminatedArray,
    /// A `:` whose operands do not form a range.
    InvalidRange,
    Empty,
}

impl Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character: {c}"),
            Self::UnexpectedOperator(op) => write!(f, "unexpected operator: {op}"),
            Self::MultipleExpressions => write!(f, "multiple expressions"),
            Self::TrailingOperator(op) => write!(f, "missing operand after {op}"),
            Self::UnbalancedQuote => write!(f, "unbalanced single quote"),
            Self::UnterminatedString => write!(f, "unterminated string literal"),
            Self::UnmatchedParenthesis => write!(f, "unmatched parenthesis"),
            Self::InvalidArrayCharacter(c) => write!(f, "invalid character in array literal: {c}"),
            Self::InvalidArrayValue => write!(f, "invalid value in array literal"),
            Self::UnterminatedArray => write!(f, "unterminated array literal"),
            Self::InvalidRange => write!(f, "invalid range operands"),
            Self::Empty => write!(f, "empty expression"),
        }
    }
}

/// A parse failure with its UTF-16 offset into the (trimmed, `=`-stripped)
/// formula text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParseError at position {}: {}", self.position, self.kind)
    }
}

impl Error for ParseError {}

/// References found in a formula, keyed by canonical label.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DependencyList {
    pub addresses: BTreeMap<String, AddressUnit>,
    pub ranges: BTreeMap<String, RangeUnit>,
}

impl DependencyList {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.ranges.is_empty()
    }
}

/// One entry of [`ParseResult::full_reference_list`], in source order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceUnit {
    Address(AddressUnit),
    Range(RangeUnit),
    Identifier { name: String, position: usize },
}

impl ReferenceUnit {
    pub fn position(&self) -> usize {
        match self {
            ReferenceUnit::Address(a) => a.position,
            ReferenceUnit::Range(r) => r.start.position,
            ReferenceUnit::Identifier { position, .. } => *position,
        }
    }
}

/// Everything a parse produces. Malformed input still yields a result:
/// `valid` is false and the expression degrades to a flat group.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub expression: Option<ExpressionUnit>,
    pub valid: bool,
    pub error: Option<ParseErrorKind>,
    pub error_position: Option<usize>,
    pub dependencies: DependencyList,
    pub full_reference_list: Vec<ReferenceUnit>,
    pub separator: ArgumentSeparator,
    pub decimal_mark: DecimalMark,
}

impl ParseResult {
    pub fn error(&self) -> Option<ParseError> {
        self.error.clone().map(|kind| ParseError {
            kind,
            position: self.error_position.unwrap_or(0),
        })
    }

    /// The expression, or the first error.
    pub fn into_result(self) -> Result<ExpressionUnit, ParseError> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        self.expression.ok_or(ParseError {
            kind: ParseErrorKind::Empty,
            position: 0,
        })
    }
}
