//! Comparison coercions used by the `=`/`<>` and ordering operators.
//!
//! | left / right          | rule                                                  |
//! |-----------------------|-------------------------------------------------------|
//! | number / number       | IEEE equality                                         |
//! | number / text         | text parsed as a number, unparseable is unequal       |
//! | boolean / x           | boolean becomes 0 or 1, then the table applies again  |
//! | text / text           | exact, case-sensitive                                 |
//! | undefined / undefined | equal                                                 |
//! | undefined / x         | 0 against a number, `""` against text, else unequal   |
//! | complex / x           | identical parts, or a real number when imaginary is 0 |

use std::cmp::Ordering;

use gridcalc_common::{CalcError, Complex, ErrorCode, Value, parse_numeric_text};

/// Comparable form of a scalar.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Undefined,
    Number(f64),
    Text(String),
    Complex(Complex),
    Other,
}

fn operand(value: &Value) -> Operand {
    match value.scalar() {
        Value::Undefined => Operand::Undefined,
        Value::Number(n) => Operand::Number(*n),
        Value::Boolean(b) => Operand::Number(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) => Operand::Text(s.clone()),
        Value::Complex(c) => Operand::Complex(*c),
        _ => Operand::Other,
    }
}

/// Loose equality over two scalars.
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    use Operand::*;
    match (operand(left), operand(right)) {
        (Undefined, Undefined) => true,
        (Number(a), Number(b)) => a == b,
        (Number(n), Text(s)) | (Text(s), Number(n)) => parse_numeric_text(&s) == Some(n),
        (Text(a), Text(b)) => a == b,
        (Undefined, Number(n)) | (Number(n), Undefined) => n == 0.0,
        (Undefined, Text(s)) | (Text(s), Undefined) => s.is_empty(),
        (Complex(a), Complex(b)) => a == b,
        (Complex(c), Number(n)) | (Number(n), Complex(c)) => c.is_real() && c.real == n,
        _ => false,
    }
}

/// Ordering for `< > <= >=`. Numeric when either side is a number,
/// lexicographic text otherwise. `None` when the pair is not comparable,
/// which the operators read as `FALSE`.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    use Operand::*;
    let real = |op: &Operand| match op {
        Number(n) => Some(*n),
        Complex(c) if c.is_real() => Some(c.real),
        Text(s) => parse_numeric_text(s),
        Undefined => Some(0.0),
        _ => None,
    };
    let text = |op: &Operand| match op {
        Text(s) => Some(s.clone()),
        Undefined => Some(String::new()),
        _ => None,
    };
    let (l, r) = (operand(left), operand(right));
    let numeric = matches!(l, Number(_) | Complex(_)) || matches!(r, Number(_) | Complex(_));
    if numeric {
        real(&l)?.partial_cmp(&real(&r)?)
    } else {
        Some(text(&l)?.cmp(&text(&r)?))
    }
}

/// NaN and infinities never reach a cell.
pub fn sanitize_numeric(n: f64) -> Result<f64, CalcError> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(CalcError::new(ErrorCode::Value).with_message("result is not a finite number"))
    }
}

/// Numeric result as a value, or `#VALUE` for NaN and infinities.
pub fn number_value(n: f64) -> Value {
    sanitize_numeric(n).into()
}

/// Complex result, collapsed to a number when the imaginary part is zero.
pub fn complex_value(c: Complex) -> Value {
    if !c.real.is_finite() || !c.imaginary.is_finite() {
        return Value::error(ErrorCode::Value);
    }
    if c.is_real() {
        Value::Number(c.real)
    } else {
        Value::Complex(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_table() {
        assert!(loose_eq(&Value::Number(1.0), &Value::Number(1.0)));
        assert!(loose_eq(&Value::Number(12.0), &Value::from(" 12 ")));
        assert!(!loose_eq(&Value::Number(12.0), &Value::from("twelve")));
        assert!(loose_eq(&Value::Boolean(true), &Value::Number(1.0)));
        assert!(loose_eq(&Value::Boolean(true), &Value::Boolean(true)));
        assert!(!loose_eq(&Value::Boolean(true), &Value::from("TRUE")));
        assert!(loose_eq(&Value::from("abc"), &Value::from("abc")));
        assert!(!loose_eq(&Value::from("abc"), &Value::from("ABC")));
        assert!(loose_eq(&Value::Undefined, &Value::Undefined));
        assert!(loose_eq(&Value::Undefined, &Value::Number(0.0)));
        assert!(loose_eq(&Value::Undefined, &Value::from("")));
        assert!(!loose_eq(&Value::Undefined, &Value::from("x")));
        assert!(loose_eq(&Value::Complex(Complex::new(2.0, 0.0)), &Value::Number(2.0)));
        assert!(!loose_eq(&Value::Complex(Complex::new(2.0, 1.0)), &Value::Number(2.0)));
        assert!(loose_eq(
            &Value::Complex(Complex::new(2.0, 1.0)),
            &Value::Complex(Complex::new(2.0, 1.0))
        ));
    }

    #[test]
    fn ordering() {
        assert_eq!(compare(&Value::Number(1.0), &Value::Number(2.0)), Some(Ordering::Less));
        assert_eq!(compare(&Value::from("10"), &Value::Number(9.0)), Some(Ordering::Greater));
        assert_eq!(compare(&Value::from("b"), &Value::from("a")), Some(Ordering::Greater));
        // text against text is not numeric
        assert_eq!(compare(&Value::from("10"), &Value::from("9")), Some(Ordering::Less));
        assert_eq!(compare(&Value::from("x"), &Value::Number(1.0)), None);
        assert_eq!(compare(&Value::Undefined, &Value::Number(-1.0)), Some(Ordering::Greater));
    }

    #[test]
    fn non_finite_results_become_errors() {
        assert!(sanitize_numeric(f64::NAN).is_err());
        assert_eq!(number_value(f64::INFINITY), Value::error(ErrorCode::Value));
        assert_eq!(complex_value(Complex::new(3.0, 0.0)), Value::Number(3.0));
    }
}
