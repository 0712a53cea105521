use std::cmp::Ordering;

use gridcalc_common::{ErrorCode, Value};

use super::logical::truthy;
use super::utils::{arg, scalars};
use crate::broadcast::as_columns;
use crate::coercion::loose_eq;
use crate::function::{ArgFlags, ArgSpec, CallContext, Function};
use crate::function_registry::FunctionLibrary;

/* ─────────────────────────── VLOOKUP() ──────────────────────── */

#[derive(Debug)]
pub struct VLookupFn;

/// Looks a value up in the first column of a table and returns the value
/// at the same row of column `col` (1-based).
///
/// # Remarks
/// - Inexact mode (the default) picks the row whose numeric key is
///   nearest; ties go to the first such row.
/// - Exact mode uses loose equality and returns `#NA` when nothing matches.
/// - A column outside the table is `#REF`.
impl Function for VLookupFn {
    fn name(&self) -> &'static str {
        "VLOOKUP"
    }
    crate::fn_arguments!(
        ArgSpec::new("value"),
        ArgSpec::new("table"),
        ArgSpec::new("column"),
        ArgSpec::new("inexact").default_value(true),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let value = arg(args, 0);
        let table = as_columns(arg(args, 1).clone());
        let column = match arg(args, 2).to_number() {
            Ok(n) => (n.trunc() as i64 - 1).max(0) as usize,
            Err(e) => return Value::Error(e),
        };
        let (Some(keys), Some(results)) = (table.first(), table.get(column)) else {
            return Value::error(ErrorCode::Ref);
        };

        if truthy(arg(args, 3)) {
            let Ok(target) = value.to_number() else {
                return Value::error(ErrorCode::Na);
            };
            let mut best: Option<(f64, usize)> = None;
            for (i, key) in keys.iter().enumerate() {
                let Value::Number(k) = key.scalar() else {
                    continue;
                };
                let distance = (k - target).abs();
                if best.is_none_or(|(d, _)| distance < d) {
                    best = Some((distance, i));
                }
            }
            match best {
                Some((_, row)) => results.get(row).cloned().unwrap_or_default(),
                None => Value::error(ErrorCode::Na),
            }
        } else {
            keys.iter()
                .position(|key| loose_eq(key, value))
                .and_then(|row| results.get(row).cloned())
                .unwrap_or_else(|| Value::error(ErrorCode::Na))
        }
    }
}

/* ─────────────────────────── SORT() ─────────────────────────── */

#[derive(Debug)]
pub struct SortFn;

/// Sorts every value into a single column: numerically when all values
/// are numbers, by text otherwise.
impl Function for SortFn {
    fn name(&self) -> &'static str {
        "SORT"
    }
    crate::fn_arguments!(ArgSpec::new("values"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let mut values: Vec<Value> = scalars(args).cloned().collect();
        if values.iter().all(|v| matches!(v, Value::Number(_))) {
            values.sort_by(|a, b| match (a, b) {
                (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
                _ => Ordering::Equal,
            });
        } else {
            values.sort_by_cached_key(Value::to_text);
        }
        Value::column(values)
    }
}

/* ─────────────────────────── TRANSPOSE() ────────────────────── */

#[derive(Debug)]
pub struct TransposeFn;

impl Function for TransposeFn {
    fn name(&self) -> &'static str {
        "TRANSPOSE"
    }
    fn description(&self) -> &'static str {
        "Returns transpose of input matrix"
    }
    crate::fn_arguments!(ArgSpec::new("matrix").flags(ArgFlags::BOXED));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        match arg(args, 0) {
            Value::Array(columns) => {
                let rows = columns.first().map_or(0, Vec::len);
                Value::Array(
                    (0..rows)
                        .map(|r| columns.iter().map(|column| column[r].clone()).collect())
                        .collect(),
                )
            }
            other => other.clone(),
        }
    }
}

/* ─────────────────────────── REVERSE() ──────────────────────── */

#[derive(Debug)]
pub struct ReverseFn;

/// Reverses a single column top to bottom, a wider array column order, or
/// the characters of a scalar's text.
impl Function for ReverseFn {
    fn name(&self) -> &'static str {
        "REVERSE"
    }
    crate::fn_arguments!(ArgSpec::new("values").flags(ArgFlags::BOXED));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        match arg(args, 0) {
            Value::Array(columns) if columns.len() == 1 => {
                Value::column(columns[0].iter().rev().cloned().collect())
            }
            Value::Array(columns) => Value::Array(columns.iter().rev().cloned().collect()),
            other => Value::Text(other.to_text().chars().rev().collect()),
        }
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library; VLookupFn, SortFn, TransposeFn, ReverseFn);
}
