//! Constants and elementary functions of the host math library, exposed
//! under their conventional upper-case names. Registered after everything
//! else, so a name that is already taken keeps its spreadsheet meaning.

use std::f64::consts;
use std::sync::Arc;

use gridcalc_common::Value;

use super::utils::{binary_numeric, scalars, unary_numeric};
use crate::coercion::number_value;
use crate::function::{CallContext, Function};
use crate::function_registry::FunctionLibrary;

#[derive(Debug)]
struct MathConstant {
    name: &'static str,
    value: f64,
}

impl Function for MathConstant {
    fn name(&self) -> &'static str {
        self.name
    }
    fn eval(&self, _args: &[Value], _ctx: &CallContext) -> Value {
        Value::Number(self.value)
    }
}

#[derive(Debug)]
struct MathUnary {
    name: &'static str,
    f: fn(f64) -> f64,
}

impl Function for MathUnary {
    fn name(&self) -> &'static str {
        self.name
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        unary_numeric(args, |x| number_value((self.f)(x)))
    }
}

#[derive(Debug)]
struct MathBinary {
    name: &'static str,
    f: fn(f64, f64) -> f64,
}

impl Function for MathBinary {
    fn name(&self) -> &'static str {
        self.name
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        binary_numeric(args, |x, y| number_value((self.f)(x, y)))
    }
}

#[derive(Debug)]
pub struct HypotFn;

/// Square root of the sum of squares of every argument.
impl Function for HypotFn {
    fn name(&self) -> &'static str {
        "HYPOT"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let mut total = 0.0_f64;
        for v in scalars(args) {
            match v.to_number() {
                Ok(n) => total = total.hypot(n),
                Err(e) => return Value::Error(e),
            }
        }
        number_value(total)
    }
}

const CONSTANTS: &[(&str, f64)] = &[
    ("PI", consts::PI),
    ("E", consts::E),
    ("LN2", consts::LN_2),
    ("LN10", consts::LN_10),
    ("LOG2E", consts::LOG2_E),
    ("LOG10E", consts::LOG10_E),
    ("SQRT2", consts::SQRT_2),
    ("SQRT1_2", consts::FRAC_1_SQRT_2),
];

fn sign(x: f64) -> f64 {
    if x == 0.0 { 0.0 } else { x.signum() }
}

fn fround(x: f64) -> f64 {
    x as f32 as f64
}

const UNARY: &[(&str, fn(f64) -> f64)] = &[
    ("SIN", f64::sin),
    ("COS", f64::cos),
    ("TAN", f64::tan),
    ("ASIN", f64::asin),
    ("ACOS", f64::acos),
    ("ATAN", f64::atan),
    ("SINH", f64::sinh),
    ("COSH", f64::cosh),
    ("TANH", f64::tanh),
    ("EXP", f64::exp),
    ("SQRT", f64::sqrt),
    ("CBRT", f64::cbrt),
    ("CEIL", f64::ceil),
    ("FLOOR", f64::floor),
    ("TRUNC", f64::trunc),
    ("SIGN", sign),
    ("LOG2", f64::log2),
    ("LOG1P", f64::ln_1p),
    ("EXPM1", f64::exp_m1),
    ("FROUND", fround),
];

const BINARY: &[(&str, fn(f64, f64) -> f64)] = &[("ATAN2", f64::atan2), ("POW", f64::powf)];

pub fn register_builtins(library: &mut FunctionLibrary) {
    for &(name, value) in CONSTANTS {
        library.register(Arc::new(MathConstant { name, value }));
    }
    for &(name, f) in UNARY {
        library.register(Arc::new(MathUnary { name, f }));
    }
    for &(name, f) in BINARY {
        library.register(Arc::new(MathBinary { name, f }));
    }
    library.register(Arc::new(HypotFn));
}
