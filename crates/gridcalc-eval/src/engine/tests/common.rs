//! Shared helpers for engine scenarios.
use gridcalc_common::{Area, CellAddress, ErrorCode, Value};

use crate::engine::{Engine, EvalConfig};

pub fn at(label: &str) -> CellAddress {
    CellAddress::from_label(label).unwrap()
}

pub fn area(from: &str, to: &str) -> Area {
    Area::from_cells(at(from), at(to))
}

/// Seeded engine so random draws repeat between runs.
pub fn engine() -> Engine {
    Engine::new(EvalConfig::default().with_rng_seed(11))
}

/// Builds an engine from `(label, input)` pairs and runs one pass.
pub fn sheet(inputs: &[(&str, &str)]) -> Engine {
    let mut engine = engine();
    for (label, input) in inputs {
        engine.set_input(at(label), input).unwrap();
    }
    engine.recalculate();
    engine
}

pub fn value(engine: &Engine, label: &str) -> Value {
    engine.get_value(at(label))
}

pub fn error_code(value: &Value) -> Option<ErrorCode> {
    value.as_error().map(|e| e.code)
}

pub fn number(engine: &Engine, label: &str) -> f64 {
    match value(engine, label) {
        Value::Number(n) => n,
        other => panic!("{label} holds {other:?}, expected a number"),
    }
}
