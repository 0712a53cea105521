use gridcalc_common::{CalcError, ErrorCode, Value};

use crate::broadcast;

static UNDEFINED: Value = Value::Undefined;

/// Argument `index`, or `Undefined` when it was not supplied.
pub fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&UNDEFINED)
}

/// Every scalar of every argument, arrays flattened column by column.
pub fn scalars(args: &[Value]) -> impl Iterator<Item = &Value> {
    args.iter().flat_map(Value::flatten)
}

/// First error found in any argument, arrays included.
pub fn first_error(args: &[Value]) -> Option<Value> {
    scalars(args).find(|v| v.is_error()).cloned()
}

/// Broadcasts a scalar function over its arguments. Without array arguments
/// `f` runs once; otherwise all arguments are recycled to a common shape and
/// `f` runs per element.
pub fn apply_as_array<F>(args: &[Value], f: F) -> Value
where
    F: Fn(&[Value]) -> Value,
{
    if !args.iter().any(Value::is_array) {
        return f(args);
    }
    let operands: Vec<&Value> = args.iter().collect();
    let (columns, rows) = broadcast::target_shape(&operands);
    let recycled: Vec<Vec<Vec<Value>>> = args
        .iter()
        .map(|a| broadcast::recycle(broadcast::as_columns(a.clone()), columns, rows))
        .collect();
    let mut scratch = Vec::with_capacity(args.len());
    let out = (0..columns)
        .map(|c| {
            (0..rows)
                .map(|r| {
                    scratch.clear();
                    scratch.extend(recycled.iter().map(|a| a[c][r].clone()));
                    f(&scratch)
                })
                .collect()
        })
        .collect();
    Value::Array(out)
}

/// Elementwise numeric function of the first argument.
pub fn unary_numeric<F>(args: &[Value], f: F) -> Value
where
    F: Fn(f64) -> Value,
{
    apply_as_array(&args[..args.len().min(1)], |a| match arg(a, 0).to_number() {
        Ok(n) => f(n),
        Err(e) => Value::Error(e),
    })
}

/// Elementwise numeric function of the first two arguments.
pub fn binary_numeric<F>(args: &[Value], f: F) -> Value
where
    F: Fn(f64, f64) -> Value,
{
    apply_as_array(&args[..args.len().min(2)], |a| {
        match (arg(a, 0).to_number(), arg(a, 1).to_number()) {
            (Ok(x), Ok(y)) => f(x, y),
            (Err(e), _) | (_, Err(e)) => Value::Error(e),
        }
    })
}

pub fn value_error(message: impl Into<String>) -> Value {
    Value::Error(CalcError::new(ErrorCode::Value).with_message(message))
}

/// Numbers in the arguments, in order. Text and booleans are skipped;
/// the first error stops the scan.
pub fn collect_numbers(args: &[Value]) -> Result<Vec<f64>, CalcError> {
    let mut out = Vec::new();
    for v in scalars(args) {
        match v {
            Value::Number(n) => out.push(*n),
            Value::Error(e) => return Err(e.clone()),
            _ => {}
        }
    }
    Ok(out)
}
