//! Random draws and simulation sampling. Every draw comes from the
//! simulation model's seeded generator, so a fixed seed replays a run.

use gridcalc_common::Value;

use super::utils::{arg, binary_numeric};
use crate::function::{ArgFlags, ArgSpec, CallContext, Function};
use crate::function_registry::FunctionLibrary;

#[derive(Debug)]
pub struct RandFn;

impl Function for RandFn {
    fn name(&self) -> &'static str {
        "RAND"
    }
    fn description(&self) -> &'static str {
        "Returns a random number between 0 and 1"
    }
    fn volatile(&self) -> bool {
        true
    }
    fn eval(&self, _args: &[Value], ctx: &CallContext) -> Value {
        Value::Number(ctx.random())
    }
}

/// Draws uniformly between the bounds, swapping them when reversed.
fn uniform(args: &[Value], ctx: &CallContext) -> Value {
    binary_numeric(args, |min, max| {
        let (min, max) = if min > max { (max, min) } else { (min, max) };
        Value::Number(min + ctx.random() * (max - min))
    })
}

#[derive(Debug)]
pub struct RandBetweenFn;

/// # Remarks
/// - The result is not rounded; wrap in `ROUND` for integers.
impl Function for RandBetweenFn {
    fn name(&self) -> &'static str {
        "RANDBETWEEN"
    }
    fn description(&self) -> &'static str {
        "Returns a random number between the given bounds"
    }
    fn volatile(&self) -> bool {
        true
    }
    crate::fn_arguments!(
        ArgSpec::new("min").default_value(0.0),
        ArgSpec::new("max").default_value(1.0),
    );
    fn eval(&self, args: &[Value], ctx: &CallContext) -> Value {
        uniform(args, ctx)
    }
}

#[derive(Debug)]
pub struct UniformFn;

/// Like `RANDBETWEEN`, but fixed outside a simulation run.
impl Function for UniformFn {
    fn name(&self) -> &'static str {
        "UNIFORM"
    }
    fn description(&self) -> &'static str {
        "Returns a sample from the uniform distribution on each simulation trial"
    }
    fn simulation_volatile(&self) -> bool {
        true
    }
    crate::fn_arguments!(
        ArgSpec::new("min").default_value(0.0),
        ArgSpec::new("max").default_value(1.0),
    );
    fn eval(&self, args: &[Value], ctx: &CallContext) -> Value {
        uniform(args, ctx)
    }
}

#[derive(Debug)]
pub struct SimulationDataFn;

/// During preparation the reference is registered for sampling; once a
/// run has finished the call returns every recorded sample as a column.
impl Function for SimulationDataFn {
    fn name(&self) -> &'static str {
        "SIMULATIONDATA"
    }
    fn description(&self) -> &'static str {
        "Returns the samples recorded for a cell in the last simulation"
    }
    crate::fn_arguments!(ArgSpec::new("reference").flags(ArgFlags::COLLECTOR));
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        arg(args, 0).clone()
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library; RandFn, RandBetweenFn, UniformFn, SimulationDataFn);
}
