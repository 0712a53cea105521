use gridcalc_common::Value;

use crate::engine::{Engine, EngineError};
use crate::simulation::{SimulationState, unpack_results};

use super::common::{at, engine, number, sheet, value};

fn model_sheet() -> Engine {
    sheet(&[("A1", "=UNIFORM(1, 2)"), ("B1", "=SIMULATIONDATA(A1)")])
}

fn run(engine: &mut Engine, trials: usize) -> Vec<f64> {
    engine.start_simulation(trials).unwrap();
    for _ in 0..trials {
        engine.simulation_trial().unwrap();
    }
    engine.end_simulation().unwrap()
}

#[test]
fn test_trials_record_registered_cells() {
    let mut engine = model_sheet();
    let packed = run(&mut engine, 4);

    let results = unpack_results(&packed).unwrap();
    let samples = &results[&at("A1")];
    assert_eq!(samples.len(), 4);
    assert!(samples.iter().all(|s| (1.0..2.0).contains(s)));
    assert_eq!(engine.model().borrow().state, SimulationState::Null);

    engine.recalculate();
    let collected = value(&engine, "B1");
    let collected: Vec<f64> = collected
        .flatten()
        .into_iter()
        .filter_map(|v| match v {
            Value::Number(n) => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(&collected, samples);
}

#[test]
fn test_uniform_draws_per_trial() {
    let mut engine = model_sheet();
    engine.start_simulation(2).unwrap();
    engine.simulation_trial().unwrap();
    let first = number(&engine, "A1");
    engine.simulation_trial().unwrap();
    assert_ne!(first, number(&engine, "A1"));
}

#[test]
fn test_seeded_runs_repeat() {
    let mut a = model_sheet();
    let mut b = model_sheet();
    assert_eq!(run(&mut a, 5), run(&mut b, 5));
}

#[test]
fn test_loops_refuse_to_simulate() {
    let mut engine = sheet(&[("A1", "=UNIFORM()"), ("C1", "=C1+A1")]);
    assert_eq!(
        engine.start_simulation(10),
        Err(EngineError::CircularReference(1))
    );
    assert!(!engine.model().borrow().is_active());
}

#[test]
fn test_trials_need_a_running_simulation() {
    let mut engine = engine();
    assert_eq!(engine.simulation_trial(), Err(EngineError::SimulationInactive));
    assert_eq!(engine.end_simulation(), Err(EngineError::SimulationInactive));
}

#[test]
fn test_loaded_results_feed_collectors() {
    let mut source = model_sheet();
    let packed = run(&mut source, 3);
    source.recalculate();

    // a second engine prepares the same model and takes the samples
    let mut target = model_sheet();
    target.start_simulation(3).unwrap();
    target.end_simulation().unwrap();
    target.load_simulation_results(&packed).unwrap();
    target.recalculate();
    assert_eq!(value(&target, "B1"), value(&source, "B1"));
}

#[test]
fn test_corrupt_results_are_refused() {
    let mut engine = engine();
    let err = engine.load_simulation_results(&[1.0, 2.0]).unwrap_err();
    assert!(matches!(err, EngineError::Pack(_)));
}
