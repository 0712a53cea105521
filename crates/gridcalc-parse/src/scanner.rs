//! Character-level consumers. Each reads one atomic unit from the UTF-16
//! buffer and leaves `index` just past it.

use gridcalc_common::{Address, Value, column_index};
use once_cell::sync::Lazy;

use crate::expression::{AddressUnit, ExpressionUnit, UnitKind};
use crate::parser::Parser;
use crate::types::{DecimalMark, ParseErrorKind, ReferenceUnit};

pub(crate) const DOUBLE_QUOTE: u16 = b'"' as u16;
pub(crate) const SINGLE_QUOTE: u16 = b'\'' as u16;
pub(crate) const OPEN_PAREN: u16 = b'(' as u16;
pub(crate) const CLOSE_PAREN: u16 = b')' as u16;
pub(crate) const OPEN_BRACE: u16 = b'{' as u16;
pub(crate) const CLOSE_BRACE: u16 = b'}' as u16;
pub(crate) const COMMA: u16 = b',' as u16;
pub(crate) const SEMICOLON: u16 = b';' as u16;
pub(crate) const PERIOD: u16 = b'.' as u16;
const PLUS: u16 = b'+' as u16;
const MINUS: u16 = b'-' as u16;
const PERCENT: u16 = b'%' as u16;
const DOLLAR_SIGN: u16 = b'$' as u16;
const UNDERSCORE: u16 = b'_' as u16;
const EXCLAMATION_MARK: u16 = b'!' as u16;
const NON_BREAKING_SPACE: u16 = 0xA0;

const ACCENTED_RANGE: std::ops::RangeInclusive<u16> = 192..=312;

/// Binary operators and their precedence. Higher binds tighter.
const OPERATOR_PRECEDENCE: &[(&str, u8)] = &[
    ("=", 6),
    ("==", 6),
    ("!=", 6),
    ("!==", 6),
    ("<>", 6),
    ("<", 7),
    (">", 7),
    ("<=", 7),
    (">=", 7),
    ("+", 9),
    ("-", 9),
    ("&", 9),
    ("*", 10),
    ("/", 10),
    ("%", 10),
    ("^", 11),
    (":", 13),
];

/// Operators sorted longest first so that `<=` wins over `<`.
static OPERATORS_BY_LENGTH: Lazy<Vec<Vec<u16>>> = Lazy::new(|| {
    let mut ops: Vec<Vec<u16>> = OPERATOR_PRECEDENCE
        .iter()
        .map(|(op, _)| op.encode_utf16().collect())
        .collect();
    ops.sort_by(|a, b| b.len().cmp(&a.len()));
    ops
});

pub fn precedence(operator: &str) -> u8 {
    OPERATOR_PRECEDENCE
        .iter()
        .find(|(op, _)| *op == operator)
        .map_or(0, |(_, p)| *p)
}

pub fn is_unary_operator(operator: &str) -> bool {
    matches!(operator, "-" | "+")
}

#[inline]
fn is_digit(c: u16) -> bool {
    (b'0' as u16..=b'9' as u16).contains(&c)
}

#[inline]
fn is_letter(c: u16) -> bool {
    (b'A' as u16..=b'Z' as u16).contains(&c) || (b'a' as u16..=b'z' as u16).contains(&c)
}

#[inline]
fn is_whitespace(c: u16) -> bool {
    matches!(c, 0x20 | 0x09 | 0x0A | 0x0D | NON_BREAKING_SPACE)
}

fn is_token_start(c: u16) -> bool {
    is_letter(c)
        || c == UNDERSCORE
        || c == SINGLE_QUOTE
        || c == DOLLAR_SIGN
        || ACCENTED_RANGE.contains(&c)
}

fn is_token_char(c: u16) -> bool {
    is_letter(c)
        || is_digit(c)
        || ACCENTED_RANGE.contains(&c)
        || matches!(c, UNDERSCORE | DOLLAR_SIGN | PERIOD | EXCLAMATION_MARK)
}

/// What [`Parser::parse_next`] found.
pub(crate) enum Next {
    Unit(ExpressionUnit),
    /// A character that starts no atomic unit (operator, paren, separator).
    Char(u16),
    End,
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum NumberState {
    Integer,
    Fraction,
    Exponent,
}

impl Parser {
    pub(crate) fn peek(&self) -> Option<u16> {
        self.data.get(self.index).copied()
    }

    fn peek_at(&self, index: usize) -> Option<u16> {
        self.data.get(index).copied()
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.data.len());
        String::from_utf16_lossy(&self.data[start.min(end)..end])
    }

    fn decimal_char(&self) -> u16 {
        self.config.decimal_mark.as_char() as u16
    }

    pub(crate) fn separator_char(&self) -> u16 {
        self.config.argument_separator.as_char() as u16
    }

    /// A comma only acts as a decimal mark when a digit follows it.
    fn starts_fraction(&self, index: usize) -> bool {
        match self.config.decimal_mark {
            DecimalMark::Period => true,
            DecimalMark::Comma => self.peek_at(index + 1).is_some_and(is_digit),
        }
    }

    pub(crate) fn consume_whitespace(&mut self) {
        while self.peek().is_some_and(is_whitespace) {
            self.index += 1;
        }
    }

    /// Reads the next atomic unit. `naked` means a `+`/`-` directly in front
    /// of a digit is a sign rather than an operator.
    pub(crate) fn parse_next(&mut self, naked: bool) -> Next {
        self.consume_whitespace();
        let Some(c) = self.peek() else {
            return Next::End;
        };

        if c == DOUBLE_QUOTE {
            let position = self.index;
            let value = self.consume_string();
            return Next::Unit(ExpressionUnit::new(
                UnitKind::Literal {
                    value: Value::Text(value),
                    text: None,
                },
                position,
            ));
        }
        if is_digit(c) || (c == self.decimal_char() && self.peek_at(self.index + 1).is_some_and(is_digit)) {
            return Next::Unit(self.consume_number());
        }
        if c == OPEN_BRACE {
            return Next::Unit(self.consume_array());
        }
        if naked && (c == MINUS || c == PLUS) {
            let check = self.peek_at(self.index + 1);
            if check.is_some_and(is_digit)
                || (check == Some(self.decimal_char())
                    && self.peek_at(self.index + 2).is_some_and(is_digit))
            {
                return Next::Unit(self.consume_number());
            }
            return Next::Char(c);
        }
        if is_token_start(c) {
            return Next::Unit(self.consume_token());
        }
        Next::Char(c)
    }

    /// Matches the longest operator at the cursor.
    pub(crate) fn consume_operator(&mut self) -> Option<ExpressionUnit> {
        let rest = &self.data[self.index..];
        let op = OPERATORS_BY_LENGTH.iter().find(|op| rest.starts_with(op))?;
        let position = self.index;
        self.index += op.len();
        Some(ExpressionUnit::new(
            UnitKind::Operator {
                symbol: String::from_utf16_lossy(op),
            },
            position,
        ))
    }

    /// Letters, digits, `_`, `$`, `.`, `!`, plus one quoted section for
    /// sheet names. Resolves to a boolean, a call, an address or an
    /// identifier.
    fn consume_token(&mut self) -> ExpressionUnit {
        let position = self.index;
        let mut in_quote = self.data[self.index] == SINGLE_QUOTE;
        self.index += 1;

        while let Some(c) = self.peek() {
            if in_quote || is_token_char(c) {
                if c == SINGLE_QUOTE {
                    in_quote = false;
                }
                self.index += 1;
            } else {
                break;
            }
        }

        let token = self.slice(position, self.index);

        if in_quote {
            self.fail(ParseErrorKind::UnbalancedQuote, position);
            return ExpressionUnit::new(UnitKind::Identifier { name: token }, position);
        }

        if token.eq_ignore_ascii_case("true") || token.eq_ignore_ascii_case("false") {
            return ExpressionUnit::new(
                UnitKind::Literal {
                    value: Value::Boolean(token.eq_ignore_ascii_case("true")),
                    text: None,
                },
                position,
            );
        }

        let after_token = self.index;
        self.consume_whitespace();
        if self.peek() == Some(OPEN_PAREN) {
            let args = self.consume_arguments();
            return ExpressionUnit::new(UnitKind::Call { name: token, args }, position);
        }
        self.index = after_token;

        if let Some(address) = self.consume_address(&token, position) {
            return ExpressionUnit::new(UnitKind::Address(address), position);
        }

        self.full_reference_list.push(ReferenceUnit::Identifier {
            name: token.clone(),
            position,
        });
        ExpressionUnit::new(UnitKind::Identifier { name: token }, position)
    }

    /// Called with the cursor on `(`. Consecutive separators produce
    /// missing arguments; a trailing empty argument is dropped.
    fn consume_arguments(&mut self) -> Vec<ExpressionUnit> {
        let open = self.index;
        self.index += 1;
        let separator = self.separator_char();
        let mut args = Vec::new();
        let mut argument_index = 0;

        while self.index < self.data.len() {
            if let Some(unit) = self.parse_generic(&[separator, CLOSE_PAREN]) {
                args.push(unit);
            }
            match self.peek() {
                Some(c) if c == separator => {
                    self.index += 1;
                    argument_index += 1;
                    while args.len() < argument_index {
                        args.push(ExpressionUnit::missing(self.index - 1));
                    }
                }
                Some(CLOSE_PAREN) => {
                    self.index += 1;
                    return args;
                }
                _ => {}
            }
        }

        self.fail(ParseErrorKind::UnmatchedParenthesis, open);
        args
    }

    /// Recognizes `[sheet!][$]COL[$]ROW`. The whole token must match.
    /// Registers the address as a dependency on success.
    fn consume_address(&mut self, token: &str, position: usize) -> Option<AddressUnit> {
        let (sheet, rest) = match token.rfind('!') {
            Some(bang) => (Some(&token[..bang]), &token[bang + 1..]),
            None => (None, token),
        };
        let bytes = rest.as_bytes();
        let mut i = 0;

        let absolute_column = bytes.first() == Some(&b'$');
        if absolute_column {
            i += 1;
        }
        let letters = bytes[i..].iter().take_while(|b| b.is_ascii_alphabetic()).count();
        if letters == 0 || letters > 3 {
            return None;
        }
        let column = column_index(&rest[i..i + letters])?;
        i += letters;

        let absolute_row = bytes.get(i) == Some(&b'$');
        if absolute_row {
            i += 1;
        }
        let digits = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || i + digits != bytes.len() {
            return None;
        }
        let row: u32 = rest[i..].parse().ok()?;
        if row == 0 {
            return None;
        }

        let label = match sheet {
            Some(s) => format!("{s}!{}", rest.to_uppercase()),
            None => rest.to_uppercase(),
        };
        let sheet = sheet.map(|s| unquote_sheet(s).to_string());

        let unit = AddressUnit {
            address: Address {
                row: Some(row - 1),
                column: Some(column),
                absolute_row,
                absolute_column,
                sheet,
            },
            label: label.clone(),
            position,
        };

        self.dependencies.addresses.insert(label.clone(), unit.clone());
        *self.address_refcount.entry(label).or_insert(0) += 1;
        self.full_reference_list.push(ReferenceUnit::Address(unit.clone()));
        Some(unit)
    }

    /// Integer, fraction, exponent, trailing `%` (divides by 100) or
    /// trailing imaginary char. A leading sign is accepted at offset 0.
    pub(crate) fn consume_number(&mut self) -> ExpressionUnit {
        let start = self.index;
        let decimal = self.decimal_char();
        let imaginary_char = self.config.imaginary_char as u16;

        let mut normalized = String::new();
        let mut exponent = String::new();
        let mut has_digits = false;
        let mut state = NumberState::Integer;
        let mut percent = false;
        let mut imaginary = false;

        while let Some(c) = self.peek() {
            let offset = self.index - start;
            if c == decimal {
                if state == NumberState::Integer && self.starts_fraction(self.index) {
                    state = NumberState::Fraction;
                    normalized.push('.');
                } else {
                    break;
                }
            } else if c == PERCENT {
                percent = true;
                self.index += 1;
                break;
            } else if c == PLUS || c == MINUS {
                if offset != 0 {
                    break;
                }
                if c == MINUS {
                    normalized.push('-');
                }
            } else if c == b'e' as u16 || c == b'E' as u16 {
                if state == NumberState::Exponent {
                    break;
                }
                state = NumberState::Exponent;
                match self.peek_at(self.index + 1) {
                    Some(PLUS) => self.index += 1,
                    Some(MINUS) => {
                        self.index += 1;
                        exponent.push('-');
                    }
                    _ => {}
                }
            } else if c == imaginary_char {
                if state != NumberState::Exponent {
                    self.index += 1;
                    imaginary = true;
                }
                break;
            } else if is_digit(c) {
                let digit = char::from(c as u8);
                if state == NumberState::Exponent {
                    exponent.push(digit);
                } else {
                    has_digits = true;
                    normalized.push(digit);
                }
            } else {
                break;
            }
            self.index += 1;
        }

        if !has_digits {
            normalized.push('0');
        }
        if state == NumberState::Exponent {
            normalized.push('e');
            normalized.push_str(&exponent);
            if !exponent.ends_with(|c: char| c.is_ascii_digit()) {
                normalized.push('0');
            }
        }
        let mut value = normalized.parse::<f64>().unwrap_or(0.0);
        if percent {
            value /= 100.0;
        }

        let text = self.slice(start, self.index);
        let kind = if imaginary {
            UnitKind::Imaginary { value, text }
        } else {
            UnitKind::Literal {
                value: Value::Number(value),
                text: Some(text),
            }
        };
        ExpressionUnit::new(kind, start)
    }

    /// Double-quoted; `""` is an escaped quote. No other escapes.
    fn consume_string(&mut self) -> String {
        let start = self.index;
        self.index += 1;
        let mut out: Vec<u16> = Vec::new();

        while let Some(c) = self.peek() {
            self.index += 1;
            if c == DOUBLE_QUOTE {
                if self.peek() == Some(DOUBLE_QUOTE) {
                    self.index += 1;
                } else {
                    return String::from_utf16_lossy(&out);
                }
            }
            out.push(c);
        }

        self.fail(ParseErrorKind::UnterminatedString, start);
        String::from_utf16_lossy(&out)
    }

    /// `{1, 2; 3, 4}`. `,` moves to the next column, `;` to the next row.
    /// Only literals are allowed. Stored column-major and padded to a
    /// rectangle with `Undefined`.
    fn consume_array(&mut self) -> ExpressionUnit {
        let start = self.index;
        self.index += 1;
        let mut values: Vec<Vec<Value>> = Vec::new();
        let (mut column, mut row) = (0usize, 0usize);

        loop {
            let mark = self.full_reference_list.len();
            match self.parse_next(true) {
                Next::End => break,
                Next::Char(c) => {
                    let position = self.index;
                    self.index += 1;
                    match c {
                        SEMICOLON => {
                            column = 0;
                            row += 1;
                        }
                        COMMA => column += 1,
                        CLOSE_BRACE => {
                            return ExpressionUnit::new(
                                UnitKind::Array {
                                    values: rectangular(values),
                                },
                                start,
                            );
                        }
                        other => self.fail(
                            ParseErrorKind::InvalidArrayCharacter(
                                char::from_u32(other as u32).unwrap_or('\u{FFFD}'),
                            ),
                            position,
                        ),
                    }
                }
                Next::Unit(unit) => match unit.kind {
                    UnitKind::Literal { value, .. } => {
                        if values.len() <= column {
                            values.resize_with(column + 1, Vec::new);
                        }
                        let col = &mut values[column];
                        if col.len() <= row {
                            col.resize(row + 1, Value::Undefined);
                        }
                        col[row] = value;
                    }
                    _ => {
                        self.discard_references_since(mark);
                        self.fail(ParseErrorKind::InvalidArrayValue, unit.position);
                    }
                },
            }
        }

        self.fail(ParseErrorKind::UnterminatedArray, start);
        ExpressionUnit::new(
            UnitKind::Array {
                values: rectangular(values),
            },
            start,
        )
    }

    /// Drops references recorded after `mark`, so an invalid array member
    /// leaves no dependencies behind.
    fn discard_references_since(&mut self, mark: usize) {
        let dropped: Vec<ReferenceUnit> = self.full_reference_list.drain(mark..).collect();
        for reference in dropped {
            match reference {
                ReferenceUnit::Address(unit) => {
                    if let Some(n) = self.address_refcount.get_mut(&unit.label) {
                        *n -= 1;
                    }
                }
                ReferenceUnit::Range(range) => {
                    let still_used = self.full_reference_list.iter().any(
                        |r| matches!(r, ReferenceUnit::Range(other) if other.label == range.label),
                    );
                    if !still_used {
                        self.dependencies.ranges.remove(&range.label);
                    }
                }
                ReferenceUnit::Identifier { .. } => {}
            }
        }
    }
}

fn rectangular(mut values: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    let height = values.iter().map(Vec::len).max().unwrap_or(0);
    for column in &mut values {
        column.resize(height, Value::Undefined);
    }
    values
}

/// `'My Sheet'` → `My Sheet`. Unquoted names pass through.
pub(crate) fn unquote_sheet(sheet: &str) -> &str {
    sheet
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(sheet)
}
