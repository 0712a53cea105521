use gridcalc_common::{Complex, ErrorCode, Value};

use super::utils::{apply_as_array, arg, binary_numeric, collect_numbers, scalars, unary_numeric};
use crate::coercion::{complex_value, number_value};
use crate::function::{ArgFlags, ArgSpec, CallContext, Function};
use crate::function_registry::FunctionLibrary;

/* ─────────────────────────── SUM() ──────────────────────────── */

#[derive(Debug)]
pub struct SumFn;

/// Adds numeric values across scalars and ranges.
///
/// # Remarks
/// - Booleans count as 0 or 1; text and empty cells are skipped.
/// - Complex operands make the total complex.
/// - An error inside a range is returned as-is.
impl Function for SumFn {
    fn name(&self) -> &'static str {
        "SUM"
    }
    fn description(&self) -> &'static str {
        "Adds arguments and ranges"
    }
    crate::fn_arguments!(ArgSpec::new("values or ranges").flags(ArgFlags::BOXED));

    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let mut total = Complex::default();
        let mut complex = false;
        for v in scalars(args) {
            match v {
                Value::Number(n) => total.real += n,
                Value::Boolean(b) => total.real += f64::from(u8::from(*b)),
                Value::Complex(c) => {
                    complex = true;
                    total = total.add(c);
                }
                Value::Error(_) => return v.clone(),
                _ => {}
            }
        }
        if complex {
            complex_value(total)
        } else {
            number_value(total.real)
        }
    }
}

/* ─────────────────────────── PRODUCT() ──────────────────────── */

#[derive(Debug)]
pub struct ProductFn;

/// Empty cells are skipped; anything else must coerce to a number.
impl Function for ProductFn {
    fn name(&self) -> &'static str {
        "PRODUCT"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let mut product = 1.0;
        for v in scalars(args) {
            if v.is_undefined() {
                continue;
            }
            match v.to_number() {
                Ok(n) => product *= n,
                Err(e) => return Value::Error(e),
            }
        }
        number_value(product)
    }
}

/* ─────────────────────────── AVERAGE() ──────────────────────── */

#[derive(Debug)]
pub struct AverageFn;

/// Arithmetic mean of the numbers found. `#DIV/0` when there are none.
impl Function for AverageFn {
    fn name(&self) -> &'static str {
        "AVERAGE"
    }
    fn description(&self) -> &'static str {
        "Returns the arithmetic mean of all numeric arguments"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        match collect_numbers(args) {
            Ok(numbers) if numbers.is_empty() => Value::error(ErrorCode::Div0),
            Ok(numbers) => number_value(numbers.iter().sum::<f64>() / numbers.len() as f64),
            Err(e) => Value::Error(e),
        }
    }
}

/* ─────────────────────────── MAX() / MIN() ──────────────────── */

fn extreme(args: &[Value], pick: fn(f64, f64) -> f64) -> Value {
    match collect_numbers(args) {
        Ok(numbers) => number_value(numbers.into_iter().reduce(pick).unwrap_or(0.0)),
        Err(e) => Value::Error(e),
    }
}

#[derive(Debug)]
pub struct MaxFn;

impl Function for MaxFn {
    fn name(&self) -> &'static str {
        "MAX"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        extreme(args, f64::max)
    }
}

#[derive(Debug)]
pub struct MinFn;

impl Function for MinFn {
    fn name(&self) -> &'static str {
        "MIN"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        extreme(args, f64::min)
    }
}

/* ─────────────────────────── COUNT() / COUNTA() ─────────────── */

#[derive(Debug)]
pub struct CountFn;

impl Function for CountFn {
    fn name(&self) -> &'static str {
        "COUNT"
    }
    fn description(&self) -> &'static str {
        "Counts cells that contain numbers"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        Value::Number(scalars(args).filter(|v| matches!(v, Value::Number(_))).count() as f64)
    }
}

#[derive(Debug)]
pub struct CountAFn;

impl Function for CountAFn {
    fn name(&self) -> &'static str {
        "COUNTA"
    }
    fn description(&self) -> &'static str {
        "Counts cells that are not empty"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        Value::Number(scalars(args).filter(|v| !v.is_undefined()).count() as f64)
    }
}

/* ─────────────────────────── POWER() / MOD() ────────────────── */

#[derive(Debug)]
pub struct PowerFn;

impl Function for PowerFn {
    fn name(&self) -> &'static str {
        "POWER"
    }
    crate::fn_arguments!(ArgSpec::new("base"), ArgSpec::new("exponent"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        binary_numeric(args, |base, exponent| number_value(base.powf(exponent)))
    }
}

#[derive(Debug)]
pub struct ModFn;

/// Remainder with the sign of the dividend. A zero divisor is `#DIV/0`.
impl Function for ModFn {
    fn name(&self) -> &'static str {
        "MOD"
    }
    crate::fn_arguments!(ArgSpec::new("number"), ArgSpec::new("divisor"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        binary_numeric(args, |n, divisor| {
            if divisor == 0.0 {
                Value::error(ErrorCode::Div0)
            } else {
                number_value(n % divisor)
            }
        })
    }
}

/* ─────────────────────────── LOG family ─────────────────────── */

#[derive(Debug)]
pub struct LogFn;

impl Function for LogFn {
    fn name(&self) -> &'static str {
        "LOG"
    }
    crate::fn_arguments!(
        ArgSpec::new("number"),
        ArgSpec::new("base").default_value(10.0),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        binary_numeric(args, |n, base| number_value(n.ln() / base.ln()))
    }
}

#[derive(Debug)]
pub struct Log10Fn;

impl Function for Log10Fn {
    fn name(&self) -> &'static str {
        "LOG10"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        unary_numeric(args, |n| number_value(n.log10()))
    }
}

#[derive(Debug)]
pub struct LnFn;

impl Function for LnFn {
    fn name(&self) -> &'static str {
        "LN"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        unary_numeric(args, |n| number_value(n.ln()))
    }
}

/* ─────────────────────────── rounding ───────────────────────── */

#[derive(Debug)]
pub struct RoundFn;

/// Rounds half away from zero at `digits` decimal places. Negative digits
/// round to tens, hundreds, and so on.
impl Function for RoundFn {
    fn name(&self) -> &'static str {
        "ROUND"
    }
    crate::fn_arguments!(
        ArgSpec::new("number"),
        ArgSpec::new("digits").default_value(0.0),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        binary_numeric(args, |n, digits| {
            let m = 10f64.powf(digits.trunc());
            number_value((n * m).round() / m)
        })
    }
}

#[derive(Debug)]
pub struct RoundDownFn;

/// Rounds toward zero.
impl Function for RoundDownFn {
    fn name(&self) -> &'static str {
        "ROUNDDOWN"
    }
    crate::fn_arguments!(
        ArgSpec::new("number"),
        ArgSpec::new("digits").default_value(0.0),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        binary_numeric(args, |n, digits| {
            let m = 10f64.powf(digits.trunc());
            number_value((n * m).trunc() / m)
        })
    }
}

#[derive(Debug)]
pub struct SimplifyFn;

/// Rounds to a number of significant digits, 2 unless given.
impl Function for SimplifyFn {
    fn name(&self) -> &'static str {
        "SIMPLIFY"
    }
    crate::fn_arguments!(
        ArgSpec::new("value"),
        ArgSpec::new("significant digits").default_value(2.0),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        binary_numeric(args, |value, digits| {
            let digits = if digits == 0.0 { 2.0 } else { digits };
            if value == 0.0 {
                return Value::Number(0.0);
            }
            let sign = value.signum();
            let magnitude = value.abs();
            let unit = 10f64.powf(magnitude.log10().floor() + 1.0 - digits);
            number_value((magnitude / unit).round() * unit * sign)
        })
    }
}

#[derive(Debug)]
pub struct AbsFn;

/// Absolute value; the modulus for complex numbers.
impl Function for AbsFn {
    fn name(&self) -> &'static str {
        "ABS"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        apply_as_array(&args[..args.len().min(1)], |a| match arg(a, 0).scalar() {
            Value::Complex(c) => number_value(c.abs()),
            other => match other.to_number() {
                Ok(n) => Value::Number(n.abs()),
                Err(e) => Value::Error(e),
            },
        })
    }
}

/* ─────────────────────────── ERF() / NORM.DIST() ────────────── */

/// Abramowitz-Stegun 7.1.26, max error 1.5e-7.
pub(crate) fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

#[derive(Debug)]
pub struct ErfFn;

impl Function for ErfFn {
    fn name(&self) -> &'static str {
        "ERF"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        unary_numeric(args, |x| number_value(erf(x)))
    }
}

#[derive(Debug)]
pub struct NormDistFn;

/// Cumulative normal distribution.
impl Function for NormDistFn {
    fn name(&self) -> &'static str {
        "NORM.DIST"
    }
    fn description(&self) -> &'static str {
        "Cumulative normal distribution"
    }
    crate::fn_arguments!(
        ArgSpec::new("value"),
        ArgSpec::new("mean").default_value(0.0),
        ArgSpec::new("standard deviation").default_value(1.0),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        apply_as_array(&args[..args.len().min(3)], |a| {
            let numbers = (0..3).map(|i| arg(a, i).to_number()).collect::<Result<Vec<_>, _>>();
            match numbers.as_deref() {
                Ok([x, mean, sd]) if *sd > 0.0 => number_value(
                    0.5 * (1.0 + erf((x - mean) / (sd * std::f64::consts::SQRT_2))),
                ),
                Ok(_) => Value::error(ErrorCode::Value),
                Err(e) => Value::Error(e.clone()),
            }
        })
    }
}

/* ─────────────────────────── RADIANS() / DEGREES() ──────────── */

#[derive(Debug)]
pub struct RadiansFn;

impl Function for RadiansFn {
    fn name(&self) -> &'static str {
        "RADIANS"
    }
    fn description(&self) -> &'static str {
        "Converts degrees to radians"
    }
    crate::fn_arguments!(ArgSpec::new("degrees"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        unary_numeric(args, |d| Value::Number(d.to_radians()))
    }
}

#[derive(Debug)]
pub struct DegreesFn;

impl Function for DegreesFn {
    fn name(&self) -> &'static str {
        "DEGREES"
    }
    fn description(&self) -> &'static str {
        "Converts radians to degrees"
    }
    crate::fn_arguments!(ArgSpec::new("radians"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        unary_numeric(args, |r| Value::Number(r.to_degrees()))
    }
}

/* ─────────────────────────── SUMPRODUCT() ───────────────────── */

#[derive(Debug)]
pub struct SumProductFn;

/// Sum of pairwise products of two or more equally sized ranges.
///
/// # Remarks
/// - Ranges of different sizes, or no arguments at all, give `#RANGE`.
/// - Non-numeric elements count as 0.
impl Function for SumProductFn {
    fn name(&self) -> &'static str {
        "SUMPRODUCT"
    }
    fn description(&self) -> &'static str {
        "Returns the sum of pairwise products of two or more ranges"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let flattened: Vec<Vec<&Value>> = args.iter().map(Value::flatten).collect();
        let Some(len) = flattened.first().map(Vec::len) else {
            return Value::error(ErrorCode::Range);
        };
        if len == 0 || flattened.iter().any(|f| f.len() != len) {
            return Value::error(ErrorCode::Range);
        }
        let mut sum = 0.0;
        for i in 0..len {
            let mut product = 1.0;
            for values in &flattened {
                product *= match values[i] {
                    Value::Number(n) => *n,
                    Value::Boolean(b) => f64::from(u8::from(*b)),
                    Value::Error(_) => return values[i].clone(),
                    _ => 0.0,
                };
            }
            sum += product;
        }
        number_value(sum)
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library;
        SumFn, ProductFn, AverageFn, MaxFn, MinFn, CountFn, CountAFn,
        PowerFn, ModFn, LogFn, Log10Fn, LnFn,
        RoundFn, RoundDownFn, SimplifyFn, AbsFn,
        ErfFn, NormDistFn, RadiansFn, DegreesFn, SumProductFn,
    );
    library.alias("MEAN", "AVERAGE");
}

#[cfg(test)]
mod tests {
    use crate::test_workbook::TestSheet;
    use gridcalc_common::{Complex, ErrorCode, Value};

    fn sheet() -> TestSheet {
        let mut sheet = TestSheet::new();
        sheet.set("A1", 1.0);
        sheet.set("A2", 2.0);
        sheet.set("A3", "text");
        sheet.set("A4", true);
        sheet
    }

    #[test]
    fn sum_and_friends() {
        let sheet = sheet();
        assert_eq!(sheet.eval("SUM(A1:A4)"), Value::Number(4.0));
        assert_eq!(sheet.eval("SUM()"), Value::Number(0.0));
        assert_eq!(sheet.eval("SUM(1, 2i)"), Value::Complex(Complex::new(1.0, 2.0)));
        assert_eq!(sheet.eval("PRODUCT(A1:A2, 4, B9)"), Value::Number(8.0));
        assert_eq!(sheet.eval("AVERAGE(A1:A4)"), Value::Number(1.5));
        assert_eq!(sheet.eval("MEAN(2, 4)"), Value::Number(3.0));
        assert_eq!(sheet.eval("AVERAGE(A3)"), Value::error(ErrorCode::Div0));
        assert_eq!(sheet.eval("MAX(A1:A4, -5)"), Value::Number(2.0));
        assert_eq!(sheet.eval("MIN(A1:A4, -5)"), Value::Number(-5.0));
        assert_eq!(sheet.eval("MAX(A3)"), Value::Number(0.0));
        assert_eq!(sheet.eval("COUNT(A1:A5)"), Value::Number(2.0));
        assert_eq!(sheet.eval("COUNTA(A1:A5)"), Value::Number(4.0));
    }

    #[test]
    fn sum_returns_errors_found_in_ranges() {
        let mut sheet = sheet();
        sheet.set_error("A5", ErrorCode::Na);
        assert_eq!(sheet.eval("SUM(A1:A5)"), Value::error(ErrorCode::Na));
    }

    #[test]
    fn elementwise_functions_broadcast() {
        let sheet = sheet();
        assert_eq!(
            sheet.eval("POWER({1,2,3}, 2)"),
            Value::from_rows(vec![vec![1.into(), 4.into(), 9.into()]])
        );
        assert_eq!(sheet.eval("MOD(7, 0)"), Value::error(ErrorCode::Div0));
        assert_eq!(sheet.eval("MOD(-7, 3)"), Value::Number(-1.0));
        sheet.assert_close("LOG(8, 2)", 3.0);
        sheet.assert_close("LOG10(1000)", 3.0);
        sheet.assert_close("LN(1)", 0.0);
        assert_eq!(sheet.eval("LN(-1)"), Value::error(ErrorCode::Value));
        sheet.assert_close("RADIANS(180)", std::f64::consts::PI);
        sheet.assert_close("DEGREES(PI())", 180.0);
    }

    #[test]
    fn rounding() {
        let sheet = sheet();
        assert_eq!(sheet.eval("ROUND(2.5)"), Value::Number(3.0));
        assert_eq!(sheet.eval("ROUND(1.234, 2)"), Value::Number(1.23));
        sheet.assert_close("ROUND(1250, -2)", 1300.0);
        assert_eq!(sheet.eval("ROUNDDOWN(-1.99)"), Value::Number(-1.0));
        assert_eq!(sheet.eval("ROUNDDOWN(1.99, 1)"), Value::Number(1.9));
        sheet.assert_close("SIMPLIFY(123456)", 120000.0);
        sheet.assert_close("SIMPLIFY(-0.001234, 3)", -0.00123);
        assert_eq!(sheet.eval("ABS(-3)"), Value::Number(3.0));
        assert_eq!(sheet.eval("ABS(3+4i)"), Value::Number(5.0));
    }

    #[test]
    fn distributions() {
        let sheet = sheet();
        sheet.assert_close("ERF(0)", 0.0);
        assert!(matches!(sheet.eval("ERF(1)"), Value::Number(n) if (n - 0.8427).abs() < 1e-4));
        assert!(matches!(sheet.eval("ERF(-1)"), Value::Number(n) if (n + 0.8427).abs() < 1e-4));
        sheet.assert_close("NORM.DIST(0)", 0.5);
        assert!(matches!(sheet.eval("NORM.DIST(1.96)"), Value::Number(n) if (n - 0.975).abs() < 1e-3));
        sheet.assert_close("NORM.DIST(10, 10, 3)", 0.5);
        assert_eq!(sheet.eval("NORM.DIST(1, 0, 0)"), Value::error(ErrorCode::Value));
    }

    #[test]
    fn sumproduct_checks_shapes() {
        let mut sheet = TestSheet::new();
        for (label, n) in [("A1", 1.0), ("A2", 2.0), ("B1", 3.0), ("B2", 4.0)] {
            sheet.set(label, n);
        }
        assert_eq!(sheet.eval("SUMPRODUCT(A1:A2, B1:B2)"), Value::Number(11.0));
        assert_eq!(sheet.eval("SUMPRODUCT(A1:A2, B1:B1)"), Value::error(ErrorCode::Range));
        assert_eq!(sheet.eval("SUMPRODUCT()"), Value::error(ErrorCode::Range));
    }
}
