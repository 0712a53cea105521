use gridcalc_common::Value;

use super::{expr, tree};
use crate::expression::UnitKind;
use crate::parser::Parser;
use crate::types::{DecimalMark, ParserConfig};

#[test]
fn test_strings_and_escapes() {
    assert_eq!(
        expr("\"a \"\"quoted\"\" word\"").kind,
        UnitKind::Literal {
            value: Value::Text("a \"quoted\" word".into()),
            text: None
        }
    );
    assert_eq!(tree("\"\""), "");
    assert_eq!(tree("\"x\" & \"y\""), "(& x y)");
}

#[test]
fn test_booleans_any_case() {
    assert_eq!(expr("TRUE").kind, UnitKind::Literal {
        value: Value::Boolean(true),
        text: None
    });
    assert_eq!(tree("false"), "FALSE");
    assert_eq!(tree("tRuE"), "TRUE");
}

#[test]
fn test_percent_and_exponent() {
    match expr("50%").kind {
        UnitKind::Literal {
            value: Value::Number(n),
            text,
        } => {
            assert_eq!(n, 0.5);
            assert_eq!(text.as_deref(), Some("50%"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(tree("1.5e3"), "1500");
    assert_eq!(tree(".25"), "0.25");
}

#[test]
fn test_complex_composition() {
    assert_eq!(tree("3+4i"), "c(3,4)");
    assert_eq!(tree("3-4i"), "c(3,-4)");
    assert_eq!(tree("2.5i"), "c(0,2.5)");
    assert_eq!(tree("1+i"), "c(1,1)");
    assert_eq!(tree("1-i"), "c(1,-1)");
    assert_eq!(tree("(1+2i)*i"), "(* <c(1,2)> c(0,1))");
    match expr("3-4i").kind {
        UnitKind::Complex { text, .. } => assert_eq!(text.as_deref(), Some("3-4i")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_imaginary_char_is_configurable() {
    let mut parser = Parser::new(ParserConfig::default().with_imaginary_char('j'));
    let result = parser.parse("2+3j");
    assert!(matches!(
        result.expression.unwrap().kind,
        UnitKind::Complex { real, imaginary, .. } if real == 2.0 && imaginary == 3.0
    ));
    // with `j` configured, a bare `i` is just a name
    let result = parser.parse("i");
    assert!(matches!(result.expression.unwrap().kind, UnitKind::Identifier { .. }));
}

#[test]
fn test_array_literal_is_column_major() {
    match expr("{1,2;3,4}").kind {
        UnitKind::Array { values } => {
            assert_eq!(values.len(), 2);
            assert_eq!(values[0], vec![Value::Number(1.0), Value::Number(3.0)]);
            assert_eq!(values[1], vec![Value::Number(2.0), Value::Number(4.0)]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_array_literal_mixed_and_ragged() {
    match expr("{-1, \"a\", TRUE; 2}").kind {
        UnitKind::Array { values } => {
            assert_eq!(values.len(), 3);
            assert_eq!(values[0], vec![Value::Number(-1.0), Value::Number(2.0)]);
            assert_eq!(values[1], vec![Value::Text("a".into()), Value::Undefined]);
            assert_eq!(values[2], vec![Value::Boolean(true), Value::Undefined]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_call_arguments_and_missing() {
    assert_eq!(tree("F()"), "F[]");
    assert_eq!(tree("F(1,,3)"), "F[1 _ 3]");
    assert_eq!(tree("F(,2)"), "F[_ 2]");
    // a trailing empty argument is dropped
    assert_eq!(tree("F(1,)"), "F[1]");
    assert_eq!(tree("NORM.DIST(1, 0, 1, TRUE)"), "NORM.DIST[1 0 1 TRUE]");
    assert_eq!(tree("F (1)"), "F[1]");
    assert_eq!(tree("IF(A1>0,SUM(B1:B3),-1)"), "IF[(> A1 0) SUM[range(B1:B3)] -1]");
}

#[test]
fn test_comma_locale() {
    let mut parser = Parser::new(ParserConfig::for_decimal_mark(DecimalMark::Comma));
    let result = parser.parse("=SUM(1,5; 2)");
    assert!(result.valid);
    assert_eq!(super::sexpr(&result.expression.unwrap()), "SUM[1.5 2]");
}

#[test]
fn test_whitespace_and_leading_equals() {
    assert_eq!(tree("  = 1 +\t2\n"), "(+ 1 2)");
    assert_eq!(tree("1\u{a0}+\u{a0}2"), "(+ 1 2)");
}

#[test]
fn test_empty_formula() {
    let result = crate::parse("=");
    assert!(result.valid);
    assert!(result.expression.is_none());
    assert!(result.into_result().is_err());
}
