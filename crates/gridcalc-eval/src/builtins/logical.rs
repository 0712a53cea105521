use gridcalc_common::{ErrorCode, Value};

use super::utils::{arg, scalars};
use crate::broadcast;
use crate::function::{ArgFlags, ArgSpec, CallContext, Function};
use crate::function_registry::FunctionLibrary;

/// Truthiness used by the logical functions: zero, empty text and empty
/// cells are false, anything else is true.
pub(crate) fn truthy(value: &Value) -> bool {
    match value.scalar() {
        Value::Undefined => false,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::Text(s) => !s.is_empty(),
        Value::Boolean(b) => *b,
        Value::Complex(c) => c.real != 0.0 || c.imaginary != 0.0,
        Value::Error(_) => false,
        Value::Array(_) | Value::Metadata(_) => true,
    }
}

/// `IF` reads text conditions by spelling: only `false` and `f` are false.
fn condition(value: &Value) -> bool {
    match value.scalar() {
        Value::Text(s) => !(s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("f")),
        other => truthy(other),
    }
}

/* ─────────────────────────── AND() / OR() ───────────────────── */

#[derive(Debug)]
pub struct AndFn;

impl Function for AndFn {
    fn name(&self) -> &'static str {
        "AND"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        Value::Boolean(scalars(args).all(truthy))
    }
}

#[derive(Debug)]
pub struct OrFn;

impl Function for OrFn {
    fn name(&self) -> &'static str {
        "OR"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        Value::Boolean(scalars(args).any(truthy))
    }
}

/* ─────────────────────────── NOT() ──────────────────────────── */

#[derive(Debug)]
pub struct NotFn;

/// Negates a single argument, elementwise over arrays.
///
/// # Remarks
/// - No arguments is `#ARG`.
/// - More than one argument returns `TRUE`.
impl Function for NotFn {
    fn name(&self) -> &'static str {
        "NOT"
    }
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        match args {
            [] => Value::error(ErrorCode::Arg),
            [single] => broadcast::map(single.clone(), |v| Value::Boolean(!truthy(v))),
            _ => Value::Boolean(true),
        }
    }
}

/* ─────────────────────────── IF() ───────────────────────────── */

#[derive(Debug)]
pub struct IfFn;

/// Chooses between two values.
///
/// The condition may be an array, in which case the result is an array of
/// the same shape; array branches are indexed at the same position.
impl Function for IfFn {
    fn name(&self) -> &'static str {
        "IF"
    }
    crate::fn_arguments!(
        ArgSpec::new("test value").flags(ArgFlags::BOXED),
        ArgSpec::new("value if true")
            .flags(ArgFlags::BOXED | ArgFlags::ALLOW_ERROR)
            .default_value(true),
        ArgSpec::new("value if false")
            .flags(ArgFlags::BOXED | ArgFlags::ALLOW_ERROR)
            .default_value(false),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let (test, when_true, when_false) = (arg(args, 0), arg(args, 1), arg(args, 2));
        let Value::Array(columns) = test else {
            let branch = if condition(test) { when_true } else { when_false };
            return branch.clone();
        };
        let pick = |branch: &Value, c: usize, r: usize| match branch {
            Value::Array(b) => b
                .get(c)
                .and_then(|column| column.get(r))
                .cloned()
                .unwrap_or_default(),
            other => other.clone(),
        };
        Value::Array(
            columns
                .iter()
                .enumerate()
                .map(|(c, column)| {
                    column
                        .iter()
                        .enumerate()
                        .map(|(r, v)| {
                            if condition(v) {
                                pick(when_true, c, r)
                            } else {
                                pick(when_false, c, r)
                            }
                        })
                        .collect()
                })
                .collect(),
        )
    }
}

/* ─────────────────────────── IFERROR() / ISERROR() ──────────── */

#[derive(Debug)]
pub struct IfErrorFn;

impl Function for IfErrorFn {
    fn name(&self) -> &'static str {
        "IFERROR"
    }
    fn description(&self) -> &'static str {
        "Returns the original value, or the alternate value if the original value contains an error"
    }
    crate::fn_arguments!(
        ArgSpec::new("original value").flags(ArgFlags::BOXED | ArgFlags::ALLOW_ERROR),
        ArgSpec::new("alternate value").default_value(0.0),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let original = arg(args, 0);
        if original.is_error() {
            arg(args, 1).clone()
        } else {
            original.clone()
        }
    }
}

#[derive(Debug)]
pub struct IsErrorFn;

/// `TRUE` for an error, or for an array holding at least one.
impl Function for IsErrorFn {
    fn name(&self) -> &'static str {
        "ISERROR"
    }
    fn description(&self) -> &'static str {
        "Checks if another cell contains an error"
    }
    crate::fn_arguments!(
        ArgSpec::new("reference").flags(ArgFlags::BOXED | ArgFlags::ALLOW_ERROR)
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        Value::Boolean(arg(args, 0).flatten().iter().any(|v| v.is_error()))
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library; AndFn, OrFn, NotFn, IfFn, IfErrorFn, IsErrorFn);
}
