//! Date functions over Lotus serials: day 0 is 1899-12-30, time is the
//! fractional part.

use chrono::{Local, Utc};
use gridcalc_common::{Value, date_to_serial, datetime_to_serial, serial_to_ymd};

use super::utils::{unary_numeric, value_error};
use crate::function::{ArgSpec, CallContext, Function};
use crate::function_registry::FunctionLibrary;

#[derive(Debug)]
pub struct NowFn;

impl Function for NowFn {
    fn name(&self) -> &'static str {
        "NOW"
    }
    fn description(&self) -> &'static str {
        "Returns current time"
    }
    fn volatile(&self) -> bool {
        true
    }
    fn eval(&self, _args: &[Value], _ctx: &CallContext) -> Value {
        Value::Number(datetime_to_serial(&Utc::now().naive_utc()))
    }
}

#[derive(Debug)]
pub struct TodayFn;

/// Noon of the current local day.
impl Function for TodayFn {
    fn name(&self) -> &'static str {
        "TODAY"
    }
    fn description(&self) -> &'static str {
        "Returns current day"
    }
    fn volatile(&self) -> bool {
        true
    }
    fn eval(&self, _args: &[Value], _ctx: &CallContext) -> Value {
        Value::Number(date_to_serial(&Local::now().date_naive()) + 0.5)
    }
}

/// Shared body of `YEAR`, `MONTH` and `DAY`.
fn date_part(args: &[Value], part: fn((i32, u32, u32)) -> f64) -> Value {
    unary_numeric(args, |serial| match serial_to_ymd(serial) {
        Some(ymd) => Value::Number(part(ymd)),
        None => value_error(format!("not a date serial: {serial}")),
    })
}

#[derive(Debug)]
pub struct YearFn;

impl Function for YearFn {
    fn name(&self) -> &'static str {
        "YEAR"
    }
    fn description(&self) -> &'static str {
        "Returns year from date"
    }
    crate::fn_arguments!(ArgSpec::new("date"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        date_part(args, |(y, _, _)| f64::from(y))
    }
}

#[derive(Debug)]
pub struct MonthFn;

impl Function for MonthFn {
    fn name(&self) -> &'static str {
        "MONTH"
    }
    fn description(&self) -> &'static str {
        "Returns month from date"
    }
    crate::fn_arguments!(ArgSpec::new("date"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        date_part(args, |(_, m, _)| f64::from(m))
    }
}

#[derive(Debug)]
pub struct DayFn;

impl Function for DayFn {
    fn name(&self) -> &'static str {
        "DAY"
    }
    fn description(&self) -> &'static str {
        "Returns day of month from date"
    }
    crate::fn_arguments!(ArgSpec::new("date"));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        date_part(args, |(_, _, d)| f64::from(d))
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library; NowFn, TodayFn, YearFn, MonthFn, DayFn);
}
