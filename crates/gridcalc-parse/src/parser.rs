use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use gridcalc_common::{Address, Value};

use crate::expression::{AddressUnit, ExpressionUnit, RangeUnit, UnitKind};
use crate::scanner::{CLOSE_PAREN, Next, OPEN_PAREN, is_unary_operator, precedence, unquote_sheet};
use crate::types::{
    DependencyList, ParseErrorKind, ParseResult, ParserConfig, ReferenceUnit,
};

/// Formula parser. Holds locale settings plus scratch state for the parse
/// in progress; reuse one instance for many formulas.
#[derive(Debug, Default)]
pub struct Parser {
    pub(crate) config: ParserConfig,
    pub(crate) data: Vec<u16>,
    pub(crate) index: usize,
    pub(crate) error: Option<(ParseErrorKind, usize)>,
    pub(crate) dependencies: DependencyList,
    pub(crate) address_refcount: FxHashMap<String, i32>,
    pub(crate) full_reference_list: Vec<ReferenceUnit>,
}

type Prefix = SmallVec<[(String, usize); 2]>;

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ParserConfig) {
        self.config = config;
    }

    pub(crate) fn reset(&mut self, text: &str) {
        self.data = text.encode_utf16().collect();
        self.index = 0;
        self.error = None;
        self.dependencies = DependencyList::default();
        self.address_refcount.clear();
        self.full_reference_list.clear();
    }

    /// Records an error. The first one wins.
    pub(crate) fn fail(&mut self, kind: ParseErrorKind, position: usize) {
        if self.error.is_none() {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %kind, position, "formula parse error");
            self.error = Some((kind, position));
        }
    }

    /// Parses a formula. A leading `=` and surrounding whitespace are
    /// ignored; positions are relative to what remains.
    pub fn parse(&mut self, text: &str) -> ParseResult {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("parse", len = text.len()).entered();

        let trimmed = text.trim();
        let trimmed = trimmed.strip_prefix('=').map_or(trimmed, str::trim);
        self.reset(trimmed);

        let expression = self.parse_generic(&[]);

        // corners folded into ranges no longer count as standalone references
        let refcount = std::mem::take(&mut self.address_refcount);
        self.dependencies
            .addresses
            .retain(|label, _| refcount.get(label).is_some_and(|n| *n > 0));
        // ranges are appended when folded, after the operands that follow them
        self.full_reference_list.sort_by_key(ReferenceUnit::position);

        let (error, error_position) = match self.error.take() {
            Some((kind, position)) => (Some(kind), Some(position)),
            None => (None, None),
        };
        ParseResult {
            expression,
            valid: error.is_none(),
            error,
            error_position,
            dependencies: std::mem::take(&mut self.dependencies),
            full_reference_list: std::mem::take(&mut self.full_reference_list),
            separator: self.config.argument_separator,
            decimal_mark: self.config.decimal_mark,
        }
    }

    /// Parses a single reference label: `A1`, `$B$2`, `Sheet1!C3`, `'My
    /// Sheet'!$D`, `7`, `$7`. Returns `None` for anything else.
    pub fn parse_address(&mut self, label: &str) -> Option<Address> {
        self.reset(label.trim());
        let unit = match self.parse_next(true) {
            Next::Unit(unit) => unit,
            _ => return None,
        };
        if self.index != self.data.len() || self.error.is_some() {
            return None;
        }
        match unit.kind {
            UnitKind::Address(a) => Some(a.address),
            UnitKind::Literal { .. } | UnitKind::Identifier { .. } => {
                self.unit_to_address(&unit).map(|a| a.address)
            }
            _ => None,
        }
    }

    /// Parses up to (not including) one of the `exit` characters, or the
    /// end of input. Recurses for parenthesised groups and call arguments.
    pub(crate) fn parse_generic(&mut self, exit: &[u16]) -> Option<ExpressionUnit> {
        let mut stream: Vec<ExpressionUnit> = Vec::new();

        while self.index < self.data.len() {
            match self.parse_next(stream.is_empty()) {
                Next::End => break,
                Next::Unit(unit) => stream.push(unit),
                Next::Char(c) if exit.contains(&c) => break,
                Next::Char(OPEN_PAREN) => {
                    let open = self.index;
                    self.index += 1;
                    let group = self.parse_generic(&[CLOSE_PAREN]);
                    if self.peek() == Some(CLOSE_PAREN) {
                        self.index += 1;
                    } else {
                        self.fail(ParseErrorKind::UnmatchedParenthesis, open);
                    }
                    if let Some(inner) = group {
                        stream.push(ExpressionUnit::new(
                            UnitKind::Group {
                                elements: vec![inner],
                                explicit: true,
                            },
                            open,
                        ));
                    }
                }
                Next::Char(c) => match self.consume_operator() {
                    Some(op) => stream.push(op),
                    None => {
                        let ch = char::from_u32(c as u32).unwrap_or('\u{FFFD}');
                        self.fail(ParseErrorKind::UnexpectedCharacter(ch), self.index);
                        self.index += 1;
                    }
                },
            }
        }

        if stream.is_empty() {
            return None;
        }
        let stream = self.fold_ranges(stream);
        let mut stream = self.fold_complex(stream);

        if stream.len() == 1 && !matches!(stream[0].kind, UnitKind::Operator { .. }) {
            return stream.pop();
        }
        Some(self.arrange(stream))
    }

    /* ===== range folding ===== */

    /// Folds `a : c` into a range when both sides are addresses, or both
    /// are rows, or both are columns.
    fn fold_ranges(&mut self, stream: Vec<ExpressionUnit>) -> Vec<ExpressionUnit> {
        let mut result = Vec::with_capacity(stream.len());
        let mut i = 0;

        while i < stream.len() {
            let a = &stream[i];
            let folded = match (stream.get(i + 1), stream.get(i + 2)) {
                (Some(b), Some(c)) if b.is_operator(":") => self.try_range(a, c),
                _ => None,
            };

            match folded {
                Some((negative, range)) => {
                    if let Some(op) = negative {
                        result.push(op);
                    }
                    let position = range.start.position;
                    self.dependencies
                        .ranges
                        .insert(range.label.clone(), range.clone());
                    self.full_reference_list
                        .push(ReferenceUnit::Range(range.clone()));
                    result.push(ExpressionUnit::new(UnitKind::Range(range), position));
                    i += 3;
                }
                None => {
                    result.push(a.clone());
                    i += 1;
                }
            }
        }
        result
    }

    fn try_range(
        &mut self,
        a: &ExpressionUnit,
        c: &ExpressionUnit,
    ) -> Option<(Option<ExpressionUnit>, RangeUnit)> {
        if let (UnitKind::Address(start), UnitKind::Address(end)) = (&a.kind, &c.kind) {
            for corner in [start, end] {
                if let Some(n) = self.address_refcount.get_mut(&corner.label) {
                    *n -= 1;
                }
            }
            self.forget_references(&[a.position, c.position]);
            let label = format!("{}:{}", start.label, end.label);
            return Some((
                None,
                RangeUnit {
                    start: start.clone(),
                    end: end.clone(),
                    label,
                },
            ));
        }

        let plausible = |u: &ExpressionUnit| {
            matches!(
                u.kind,
                UnitKind::Literal { .. } | UnitKind::Identifier { .. }
            )
        };
        if !plausible(a) || !plausible(c) {
            return None;
        }

        let mut negative = None;
        let mut left = self.unit_to_address(a);
        if left.is_none() {
            // `-14:15` scanned as the number -14; reread it as `-` applied to row 14
            if let UnitKind::Literal {
                value: Value::Number(n),
                text,
            } = &a.kind
            {
                let flipped = ExpressionUnit::new(
                    UnitKind::Literal {
                        value: Value::Number(-n),
                        text: text.as_ref().map(|t| t.trim_start_matches('-').to_string()),
                    },
                    a.position + 1,
                );
                left = if *n < 0.0 { self.unit_to_address(&flipped) } else { None };
                if left.is_some() {
                    negative = Some(ExpressionUnit::new(
                        UnitKind::Operator {
                            symbol: "-".to_string(),
                        },
                        a.position,
                    ));
                }
            }
        }

        let (left, right) = (left?, self.unit_to_address(c)?);
        let (l, r) = (&left.address, &right.address);
        let same_axis =
            (l.column.is_none() && r.column.is_none()) || (l.row.is_none() && r.row.is_none());
        if !same_axis {
            return None;
        }

        self.forget_references(&[a.position, c.position]);
        let label = format!("{}:{}", left.label, right.label);
        Some((
            negative,
            RangeUnit {
                start: left,
                end: right,
                label,
            },
        ))
    }

    fn forget_references(&mut self, positions: &[usize]) {
        self.full_reference_list
            .retain(|r| matches!(r, ReferenceUnit::Range(_)) || !positions.contains(&r.position()));
    }

    /// Reads a literal or identifier as a whole-row (`7`, `$7`) or
    /// whole-column (`C`, `$C`) reference.
    pub(crate) fn unit_to_address(&self, unit: &ExpressionUnit) -> Option<AddressUnit> {
        match &unit.kind {
            UnitKind::Literal {
                value: Value::Number(n),
                text,
            } => {
                let integral = n.fract() == 0.0 && !text.as_deref().unwrap_or("").contains('.');
                if *n > 0.0 && *n <= u32::MAX as f64 && integral {
                    let row = *n as u32;
                    return Some(AddressUnit {
                        address: Address::entire_row(row - 1),
                        label: row.to_string(),
                        position: unit.position,
                    });
                }
                None
            }
            UnitKind::Identifier { name } => {
                let (sheet, local) = match name.rfind('!') {
                    Some(bang) => {
                        let raw = &name[..bang];
                        if raw.starts_with('\'') && !(raw.len() > 1 && raw.ends_with('\'')) {
                            return None;
                        }
                        (Some(raw), &name[bang + 1..])
                    }
                    None => (None, name.as_str()),
                };
                let absolute = local.starts_with('$');
                let bare = local.trim_start_matches('$').to_ascii_uppercase();
                if bare.is_empty() || local.len() - bare.len() > 1 {
                    return None;
                }

                let address = if bare.bytes().all(|b| b.is_ascii_digit()) {
                    let row: u32 = bare.parse().ok()?;
                    if row == 0 {
                        return None;
                    }
                    Address::entire_row(row - 1).absolute(absolute, false)
                } else {
                    let column = gridcalc_common::column_index(&bare)?;
                    Address::entire_column(column).absolute(false, absolute)
                };

                let prefix = if absolute { "$" } else { "" };
                let label = match sheet {
                    Some(s) => format!("{s}!{prefix}{bare}"),
                    None => format!("{prefix}{bare}"),
                };
                Some(AddressUnit {
                    address: Address {
                        sheet: sheet.map(|s| unquote_sheet(s).to_string()),
                        ..address
                    },
                    label,
                    position: unit.position,
                })
            }
            _ => None,
        }
    }

    /* ===== complex folding ===== */

    /// `real ± imaginary` → complex; a lone imaginary literal, or a lone
    /// imaginary-char identifier, → complex with zero real part.
    fn fold_complex(&mut self, stream: Vec<ExpressionUnit>) -> Vec<ExpressionUnit> {
        let unit_name = self.config.imaginary_char.to_string();
        let is_unit_i = |u: &ExpressionUnit| matches!(&u.kind, UnitKind::Identifier { name } if *name == unit_name);

        let mut result = Vec::with_capacity(stream.len());
        let mut i = 0;
        while i < stream.len() {
            let a = &stream[i];

            let pair = match (&a.kind, stream.get(i + 1), stream.get(i + 2)) {
                (
                    UnitKind::Literal {
                        value: Value::Number(real),
                        ..
                    },
                    Some(b),
                    Some(c),
                ) if (b.is_operator("+") || b.is_operator("-"))
                    && (matches!(c.kind, UnitKind::Imaginary { .. }) || is_unit_i(c)) =>
                {
                    Some((real, b, c))
                }
                _ => None,
            };
            if let Some((real, b, c)) = pair {
                let (mut imaginary, end) = match &c.kind {
                    UnitKind::Imaginary { value, text } => {
                        (*value, c.position + text.encode_utf16().count())
                    }
                    _ => {
                        self.forget_references(&[c.position]);
                        (1.0, c.position + unit_name.len())
                    }
                };
                if b.is_operator("-") {
                    imaginary = -imaginary;
                }
                result.push(ExpressionUnit::new(
                    UnitKind::Complex {
                        real: *real,
                        imaginary,
                        text: Some(self.slice(a.position, end)),
                    },
                    a.position,
                ));
                i += 3;
                continue;
            }

            match &a.kind {
                UnitKind::Imaginary { value, text } => result.push(ExpressionUnit::new(
                    UnitKind::Complex {
                        real: 0.0,
                        imaginary: *value,
                        text: Some(text.clone()),
                    },
                    a.position,
                )),
                UnitKind::Identifier { .. } if is_unit_i(a) => {
                    self.forget_references(&[a.position]);
                    result.push(ExpressionUnit::new(
                        UnitKind::Complex {
                            real: 0.0,
                            imaginary: 1.0,
                            text: Some(unit_name.clone()),
                        },
                        a.position,
                    ));
                }
                _ => result.push(a.clone()),
            }
            i += 1;
        }
        result
    }

    /* ===== precedence arrangement ===== */

    /// Builds the tree from a flat `operand (op operand)*` stream. Unary
    /// `+`/`-` bind to the next operand only. On malformed input the
    /// stream is returned as a non-explicit group.
    fn arrange(&mut self, stream: Vec<ExpressionUnit>) -> ExpressionUnit {
        if let Some(colon) = stream.iter().find(|u| u.is_operator(":")) {
            self.fail(ParseErrorKind::InvalidRange, colon.position);
            return degrade(stream);
        }

        match self.arrange_units(&stream) {
            Ok(tree) => tree,
            Err((kind, position)) => {
                self.fail(kind, position);
                degrade(stream)
            }
        }
    }

    fn arrange_units(
        &self,
        stream: &[ExpressionUnit],
    ) -> Result<ExpressionUnit, (ParseErrorKind, usize)> {
        let mut units = stream.iter().peekable();
        let mut root = read_operand(&mut units)?;

        while let Some(unit) = units.next() {
            let UnitKind::Operator { symbol } = &unit.kind else {
                return Err((ParseErrorKind::MultipleExpressions, unit.position));
            };
            if units.peek().is_none() {
                return Err((ParseErrorKind::TrailingOperator(symbol.clone()), unit.position));
            }
            let operand = read_operand(&mut units)?;
            root = attach(root, symbol, unit.position, operand);
        }
        Ok(root)
    }
}

/// Reads any unary prefix operators then one operand, and wraps the
/// operand innermost-first.
fn read_operand<'a, I>(
    units: &mut std::iter::Peekable<I>,
) -> Result<ExpressionUnit, (ParseErrorKind, usize)>
where
    I: Iterator<Item = &'a ExpressionUnit>,
{
    let mut prefix = Prefix::new();
    loop {
        let Some(unit) = units.next() else {
            let (op, position) = prefix.pop().unwrap_or_default();
            return Err((ParseErrorKind::TrailingOperator(op), position));
        };
        match &unit.kind {
            UnitKind::Operator { symbol } if is_unary_operator(symbol) => {
                prefix.push((symbol.clone(), unit.position));
            }
            UnitKind::Operator { symbol } => {
                return Err((ParseErrorKind::UnexpectedOperator(symbol.clone()), unit.position));
            }
            _ => {
                let mut operand = unit.clone();
                while let Some((operator, position)) = prefix.pop() {
                    operand = ExpressionUnit::new(
                        UnitKind::Unary {
                            operator,
                            operand: Box::new(operand),
                        },
                        position,
                    );
                }
                return Ok(operand);
            }
        }
    }
}

/// Adds `op operand` to the tree. Walks down the right spine while the new
/// operator binds tighter than the node's, so `1+2*3^4` nests correctly.
fn attach(node: ExpressionUnit, op: &str, position: usize, operand: ExpressionUnit) -> ExpressionUnit {
    match node.kind {
        UnitKind::Binary {
            operator,
            left,
            right,
        } if precedence(op) > precedence(&operator) => ExpressionUnit::new(
            UnitKind::Binary {
                operator,
                left,
                right: Box::new(attach(*right, op, position, operand)),
            },
            node.position,
        ),
        kind => ExpressionUnit::new(
            UnitKind::Binary {
                operator: op.to_string(),
                left: Box::new(ExpressionUnit::new(kind, node.position)),
                right: Box::new(operand),
            },
            position,
        ),
    }
}

fn degrade(stream: Vec<ExpressionUnit>) -> ExpressionUnit {
    let position = stream.first().map_or(0, |u| u.position);
    ExpressionUnit::new(
        UnitKind::Group {
            elements: stream,
            explicit: false,
        },
        position,
    )
}

/// Parses with the default (period decimal, comma separator) locale.
pub fn parse(text: &str) -> ParseResult {
    Parser::default().parse(text)
}
