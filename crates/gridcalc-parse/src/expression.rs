use gridcalc_common::{Address, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A cell reference as it appeared in the formula.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AddressUnit {
    pub address: Address,
    /// Sheet prefix as typed, the rest uppercased (`Sheet1!$A1`).
    pub label: String,
    pub position: usize,
}

/// `start:end`. Corners are owned by the range and never appear in the
/// dependency list on their own account.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RangeUnit {
    pub start: AddressUnit,
    pub end: AddressUnit,
    /// `start.label:end.label`, also the dependency key.
    pub label: String,
}

/// A node of the parsed expression tree.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionUnit {
    pub kind: UnitKind,
    /// UTF-16 offset of the first character.
    pub position: usize,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum UnitKind {
    /// Number, text or boolean. `text` keeps a number's source spelling.
    Literal { value: Value, text: Option<String> },
    /// Only present transiently; folded into [`UnitKind::Complex`].
    Imaginary { value: f64, text: String },
    Complex {
        real: f64,
        imaginary: f64,
        text: Option<String>,
    },
    Address(AddressUnit),
    Range(RangeUnit),
    Identifier { name: String },
    /// Only present transiently, or inside a degraded group.
    Operator { symbol: String },
    Unary {
        operator: String,
        operand: Box<ExpressionUnit>,
    },
    Binary {
        operator: String,
        left: Box<ExpressionUnit>,
        right: Box<ExpressionUnit>,
    },
    Call {
        name: String,
        args: Vec<ExpressionUnit>,
    },
    /// `explicit` groups came from parentheses in the source.
    Group {
        elements: Vec<ExpressionUnit>,
        explicit: bool,
    },
    /// Column-major scalars.
    Array { values: Vec<Vec<Value>> },
    Missing,
}

impl ExpressionUnit {
    pub fn new(kind: UnitKind, position: usize) -> Self {
        Self { kind, position }
    }

    pub fn number(value: f64) -> Self {
        Self::new(
            UnitKind::Literal {
                value: Value::Number(value),
                text: None,
            },
            0,
        )
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(
            UnitKind::Literal {
                value: Value::Text(value.into()),
                text: None,
            },
            0,
        )
    }

    pub fn missing(position: usize) -> Self {
        Self::new(UnitKind::Missing, position)
    }

    pub fn is_operator(&self, symbol: &str) -> bool {
        matches!(&self.kind, UnitKind::Operator { symbol: s } if s == symbol)
    }

    /// Pre-order traversal. Returning `false` from `f` skips the unit's
    /// children.
    pub fn walk<F>(&self, f: &mut F)
    where
        F: FnMut(&ExpressionUnit) -> bool,
    {
        if !f(self) {
            return;
        }
        match &self.kind {
            UnitKind::Unary { operand, .. } => operand.walk(f),
            UnitKind::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            UnitKind::Call { args: items, .. } | UnitKind::Group { elements: items, .. } => {
                for item in items {
                    item.walk(f);
                }
            }
            UnitKind::Range(range) => {
                let mut corner = |a: &AddressUnit| {
                    f(&ExpressionUnit::new(UnitKind::Address(a.clone()), a.position));
                };
                corner(&range.start);
                corner(&range.end);
            }
            _ => {}
        }
    }

    /// Compares trees ignoring positions, labels and source spellings.
    /// Two formulas that render differently but mean the same thing compare
    /// equal.
    pub fn same_structure(&self, other: &ExpressionUnit) -> bool {
        use UnitKind::*;
        let addr_eq = |a: &AddressUnit, b: &AddressUnit| {
            let (x, y) = (&a.address, &b.address);
            x.row == y.row
                && x.column == y.column
                && x.absolute_row == y.absolute_row
                && x.absolute_column == y.absolute_column
                && x.sheet == y.sheet
        };
        let all_same = |a: &[ExpressionUnit], b: &[ExpressionUnit]| {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_structure(y))
        };
        match (&self.kind, &other.kind) {
            (Literal { value: a, .. }, Literal { value: b, .. }) => a == b,
            (Imaginary { value: a, .. }, Imaginary { value: b, .. }) => a == b,
            (
                Complex {
                    real: r1,
                    imaginary: i1,
                    ..
                },
                Complex {
                    real: r2,
                    imaginary: i2,
                    ..
                },
            ) => r1 == r2 && i1 == i2,
            (Address(a), Address(b)) => addr_eq(a, b),
            (Range(a), Range(b)) => addr_eq(&a.start, &b.start) && addr_eq(&a.end, &b.end),
            (Identifier { name: a }, Identifier { name: b }) => a == b,
            (Operator { symbol: a }, Operator { symbol: b }) => a == b,
            (
                Unary {
                    operator: o1,
                    operand: a,
                },
                Unary {
                    operator: o2,
                    operand: b,
                },
            ) => o1 == o2 && a.same_structure(b),
            (
                Binary {
                    operator: o1,
                    left: l1,
                    right: r1,
                },
                Binary {
                    operator: o2,
                    left: l2,
                    right: r2,
                },
            ) => o1 == o2 && l1.same_structure(l2) && r1.same_structure(r2),
            (Call { name: n1, args: a1 }, Call { name: n2, args: a2 }) => {
                n1.eq_ignore_ascii_case(n2) && all_same(a1, a2)
            }
            (
                Group {
                    elements: e1,
                    explicit: x1,
                },
                Group {
                    elements: e2,
                    explicit: x2,
                },
            ) => x1 == x2 && all_same(e1, e2),
            (Array { values: a }, Array { values: b }) => a == b,
            (Missing, Missing) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn walk_visits_pre_order() {
        let expr = parse("SUM(A1, 2) + B1:B3").expression.unwrap();
        let mut seen = Vec::new();
        expr.walk(&mut |unit| {
            seen.push(match &unit.kind {
                UnitKind::Binary { operator, .. } => operator.clone(),
                UnitKind::Call { name, .. } => name.clone(),
                UnitKind::Address(a) => a.label.clone(),
                UnitKind::Range(r) => r.label.clone(),
                UnitKind::Literal { value, .. } => value.to_string(),
                _ => "?".into(),
            });
            true
        });
        assert_eq!(seen, ["+", "SUM", "A1", "2", "B1:B3", "B1", "B3"]);
    }

    #[test]
    fn walk_can_prune() {
        let expr = parse("SUM(A1, 2) + 3").expression.unwrap();
        let mut count = 0;
        expr.walk(&mut |unit| {
            count += 1;
            !matches!(unit.kind, UnitKind::Call { .. })
        });
        // binary, call (children skipped), literal 3
        assert_eq!(count, 3);
    }

    #[test]
    fn same_structure_ignores_spelling() {
        let a = parse("1.50 + a1").expression.unwrap();
        let b = parse("1.5+A1").expression.unwrap();
        assert!(a.same_structure(&b));
        assert_ne!(a, b);
        let c = parse("1.5+A2").expression.unwrap();
        assert!(!a.same_structure(&c));
    }
}
