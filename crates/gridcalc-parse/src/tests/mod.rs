mod literals;

use crate::expression::{ExpressionUnit, UnitKind};
use crate::parser::parse;

/// Parses and unwraps a valid expression.
pub(crate) fn expr(formula: &str) -> ExpressionUnit {
    let result = parse(formula);
    assert!(
        result.valid,
        "{formula:?} failed: {:?} at {:?}",
        result.error, result.error_position
    );
    result.expression.expect("non-empty formula")
}

/// S-expression dump, for compact tree assertions.
pub(crate) fn sexpr(unit: &ExpressionUnit) -> String {
    match &unit.kind {
        UnitKind::Literal { value, .. } => value.to_string(),
        UnitKind::Imaginary { value, .. } => format!("{value}i"),
        UnitKind::Complex {
            real, imaginary, ..
        } => format!("c({real},{imaginary})"),
        UnitKind::Address(a) => a.label.clone(),
        UnitKind::Range(r) => format!("range({})", r.label),
        UnitKind::Identifier { name } => format!("id({name})"),
        UnitKind::Operator { symbol } => format!("[{symbol}]"),
        UnitKind::Unary { operator, operand } => format!("({operator} {})", sexpr(operand)),
        UnitKind::Binary {
            operator,
            left,
            right,
        } => format!("({operator} {} {})", sexpr(left), sexpr(right)),
        UnitKind::Call { name, args } => {
            let args: Vec<_> = args.iter().map(sexpr).collect();
            format!("{name}[{}]", args.join(" "))
        }
        UnitKind::Group { elements, explicit } => {
            let inner: Vec<_> = elements.iter().map(sexpr).collect();
            if *explicit {
                format!("<{}>", inner.join(" "))
            } else {
                format!("bag<{}>", inner.join(" "))
            }
        }
        UnitKind::Array { values } => format!("array{values:?}"),
        UnitKind::Missing => "_".to_string(),
    }
}

pub(crate) fn tree(formula: &str) -> String {
    sexpr(&expr(formula))
}
