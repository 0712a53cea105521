use gridcalc_common::Value;

use super::utils::{apply_as_array, arg, scalars, value_error};
use crate::function::{ArgSpec, CallContext, Function};
use crate::function_registry::FunctionLibrary;

#[derive(Debug)]
pub struct ConcatenateFn;

/// Joins the text of every value, ranges included.
impl Function for ConcatenateFn {
    fn name(&self) -> &'static str {
        "CONCATENATE"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        Value::Text(scalars(args).map(Value::to_text).collect())
    }
}

#[derive(Debug)]
pub struct Hex2DecFn;

impl Function for Hex2DecFn {
    fn name(&self) -> &'static str {
        "HEX2DEC"
    }
    crate::fn_arguments!(ArgSpec::new("hexadecimal string"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        apply_as_array(&args[..args.len().min(1)], |a| {
            let text = arg(a, 0).to_text();
            match i64::from_str_radix(text.trim(), 16) {
                Ok(n) => Value::Number(n as f64),
                Err(_) => value_error(format!("not hexadecimal: {text:?}")),
            }
        })
    }
}

#[derive(Debug)]
pub struct Dec2HexFn;

/// Lowercase hexadecimal of the integer part. Negative numbers keep a
/// leading `-`.
impl Function for Dec2HexFn {
    fn name(&self) -> &'static str {
        "DEC2HEX"
    }
    crate::fn_arguments!(ArgSpec::new("number"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        apply_as_array(&args[..args.len().min(1)], |a| match arg(a, 0).to_number() {
            Ok(n) if n.is_finite() && n.abs() < i64::MAX as f64 => {
                let n = n.trunc() as i64;
                let sign = if n < 0 { "-" } else { "" };
                Value::Text(format!("{sign}{:x}", n.unsigned_abs()))
            }
            Ok(n) => value_error(format!("out of range: {n}")),
            Err(e) => Value::Error(e),
        })
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library; ConcatenateFn, Hex2DecFn, Dec2HexFn);
}
