//! Complex-number helpers. Arithmetic itself lives in the operators; these
//! take numbers apart and put them together.

use gridcalc_common::{Complex, Value};

use super::utils::{apply_as_array, arg, binary_numeric, value_error};
use crate::coercion::{complex_value, number_value};
use crate::function::{ArgFlags, ArgSpec, CallContext, Function};
use crate::function_registry::FunctionLibrary;

/// Reads a boxed argument as complex. Numbers, empty cells and empty text
/// are lifted into the plane; anything else is `None`.
fn as_complex(value: &Value) -> Option<Complex> {
    match value.scalar() {
        Value::Complex(c) => Some(*c),
        Value::Number(n) => Some(Complex::new(*n, 0.0)),
        Value::Undefined => Some(Complex::default()),
        Value::Text(s) if s.is_empty() => Some(Complex::default()),
        _ => None,
    }
}

/// Elementwise over the first argument via [`as_complex`].
fn complex_unary<F>(args: &[Value], f: F) -> Value
where
    F: Fn(Complex) -> Value,
{
    apply_as_array(&args[..args.len().min(1)], |a| match as_complex(arg(a, 0)) {
        Some(c) => f(c),
        None => value_error("expected a complex number"),
    })
}

#[derive(Debug)]
pub struct IsComplexFn;

impl Function for IsComplexFn {
    fn name(&self) -> &'static str {
        "ISCOMPLEX"
    }
    fn description(&self) -> &'static str {
        "Returns true if the reference is a complex number"
    }
    crate::fn_arguments!(ArgSpec::new("reference").flags(ArgFlags::METADATA));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let is_complex = match arg(args, 0) {
            Value::Metadata(meta) => matches!(&meta.value, Value::Complex(c) if !c.is_real()),
            _ => false,
        };
        Value::Boolean(is_complex)
    }
}

#[derive(Debug)]
pub struct RealFn;

impl Function for RealFn {
    fn name(&self) -> &'static str {
        "REAL"
    }
    fn description(&self) -> &'static str {
        "Returns the real part of a complex number"
    }
    crate::fn_arguments!(ArgSpec::new("value").flags(ArgFlags::BOXED));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        complex_unary(args, |c| Value::Number(c.real))
    }
}

#[derive(Debug)]
pub struct ImaginaryFn;

impl Function for ImaginaryFn {
    fn name(&self) -> &'static str {
        "IMAGINARY"
    }
    fn description(&self) -> &'static str {
        "Returns the imaginary part of a complex number (as real)"
    }
    crate::fn_arguments!(ArgSpec::new("value").flags(ArgFlags::BOXED));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        complex_unary(args, |c| Value::Number(c.imaginary))
    }
}

#[derive(Debug)]
pub struct ConjugateFn;

impl Function for ConjugateFn {
    fn name(&self) -> &'static str {
        "CONJUGATE"
    }
    fn description(&self) -> &'static str {
        "Returns the conjugate of a complex number"
    }
    crate::fn_arguments!(ArgSpec::new("value").flags(ArgFlags::BOXED));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        complex_unary(args, |c| complex_value(c.conjugate()))
    }
}

#[derive(Debug)]
pub struct ArgFn;

/// Principal argument in `(-π, π]`.
impl Function for ArgFn {
    fn name(&self) -> &'static str {
        "ARG"
    }
    fn description(&self) -> &'static str {
        "Returns the principal argument of a complex number"
    }
    crate::fn_arguments!(ArgSpec::new("value").flags(ArgFlags::BOXED));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        complex_unary(args, |c| number_value(c.arg()))
    }
}

#[derive(Debug)]
pub struct RectangularFn;

impl Function for RectangularFn {
    fn name(&self) -> &'static str {
        "RECTANGULAR"
    }
    fn description(&self) -> &'static str {
        "Converts a complex number in polar form to rectangular form"
    }
    crate::fn_arguments!(
        ArgSpec::new("r").default_value(0.0),
        ArgSpec::new("θ in radians").default_value(0.0),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        binary_numeric(args, |r, theta| complex_value(Complex::from_polar(r, theta)))
    }
}

#[derive(Debug)]
pub struct ComplexFn;

/// Marks a real as complex. The result keeps its complex type even with a
/// zero imaginary part.
impl Function for ComplexFn {
    fn name(&self) -> &'static str {
        "COMPLEX"
    }
    fn description(&self) -> &'static str {
        "Ensures that the given value will be treated as a complex number"
    }
    crate::fn_arguments!(ArgSpec::new("value").flags(ArgFlags::BOXED));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        complex_unary(args, Value::Complex)
    }
}

#[derive(Debug)]
pub struct ComplexLogFn;

/// Principal value `Log z = ln|z| + iθ`. Applied to a real this differs
/// from `LN` for negative inputs. `Log 0` is `#VALUE`.
impl Function for ComplexLogFn {
    fn name(&self) -> &'static str {
        "COMPLEXLOG"
    }
    fn description(&self) -> &'static str {
        "Returns the principal value Log(z) of a complex number z"
    }
    crate::fn_arguments!(ArgSpec::new("value").flags(ArgFlags::BOXED));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        complex_unary(args, |c| {
            if c.real == 0.0 && c.imaginary == 0.0 {
                value_error("logarithm of zero")
            } else {
                complex_value(c.ln())
            }
        })
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library;
        IsComplexFn, RealFn, ImaginaryFn, ConjugateFn, ArgFn,
        RectangularFn, ComplexFn, ComplexLogFn,
    );
}

#[cfg(test)]
mod tests {
    use crate::test_workbook::TestSheet;
    use gridcalc_common::{Complex, ErrorCode, Value};

    #[test]
    fn parts_and_conjugate() {
        let mut sheet = TestSheet::new();
        sheet.set("A1", Complex::new(3.0, -4.0));
        sheet.set("A2", 2.0);
        assert_eq!(sheet.eval("REAL(A1)"), Value::Number(3.0));
        assert_eq!(sheet.eval("IMAGINARY(A1)"), Value::Number(-4.0));
        assert_eq!(sheet.eval("IMAGINARY(A2)"), Value::Number(0.0));
        assert_eq!(sheet.eval("REAL(B9)"), Value::Number(0.0));
        assert_eq!(sheet.eval("REAL(\"x\")"), Value::error(ErrorCode::Value));
        assert_eq!(sheet.eval("CONJUGATE(A1)"), Value::Complex(Complex::new(3.0, 4.0)));
        assert_eq!(sheet.eval("ISCOMPLEX(A1)"), Value::Boolean(true));
        assert_eq!(sheet.eval("ISCOMPLEX(A2)"), Value::Boolean(false));
    }

    #[test]
    fn polar_forms() {
        let sheet = TestSheet::new();
        sheet.assert_close("ARG(1i)", std::f64::consts::FRAC_PI_2);
        sheet.assert_close("ARG(-1)", std::f64::consts::PI);
        sheet.assert_close("REAL(RECTANGULAR(2, PI()))", -2.0);
        assert_eq!(sheet.eval("RECTANGULAR(2)"), Value::Number(2.0));
        assert_eq!(sheet.eval("COMPLEX(2)"), Value::Complex(Complex::new(2.0, 0.0)));
    }

    #[test]
    fn complex_log() {
        let sheet = TestSheet::new();
        assert_eq!(sheet.eval("COMPLEXLOG(1)"), Value::Number(0.0));
        assert_eq!(sheet.eval("COMPLEXLOG(0)"), Value::error(ErrorCode::Value));
        match sheet.eval("COMPLEXLOG(-1)") {
            Value::Complex(c) => {
                assert!(c.real.abs() < 1e-12);
                assert!((c.imaginary - std::f64::consts::PI).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
