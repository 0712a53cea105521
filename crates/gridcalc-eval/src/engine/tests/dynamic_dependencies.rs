use gridcalc_common::ErrorCode;

use crate::engine::{Engine, EvalConfig};

use super::common::{at, error_code, number, sheet, value};

#[test]
fn test_indirect_follows_its_target() {
    let mut engine = sheet(&[("B1", "5"), ("B2", "7"), ("C1", "B1"), ("A1", "=INDIRECT(C1)")]);
    assert_eq!(number(&engine, "A1"), 5.0);

    engine.set_input(at("C1"), "B2").unwrap();
    let result = engine.recalculate();
    assert_eq!(result.rebuilds, 1);
    assert_eq!(number(&engine, "A1"), 7.0);

    engine.set_value(at("B2"), 8.0).unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "A1"), 8.0);
}

#[test]
fn test_old_target_is_released() {
    let mut engine = sheet(&[("B1", "5"), ("B2", "7"), ("C1", "B1"), ("A1", "=INDIRECT(C1)")]);
    engine.set_input(at("C1"), "B2").unwrap();
    engine.recalculate();

    engine.set_value(at("B1"), 100.0).unwrap();
    assert!(!engine.graph().vertex_at(at("A1")).unwrap().is_dirty());
    assert_eq!(number(&engine, "A1"), 7.0);
}

#[test]
fn test_indirect_range_feeds_aggregates() {
    let engine = sheet(&[("B1", "1"), ("B2", "2"), ("B3", "3"), ("A1", "=SUM(INDIRECT(\"B1:B3\"))")]);
    assert_eq!(number(&engine, "A1"), 6.0);
    let deps = engine.graph().vertex_at(at("A1")).unwrap().dependencies();
    assert_eq!(deps.areas.len(), 1);
}

#[test]
fn test_dynamic_target_waits_for_formulas() {
    let engine = sheet(&[("A1", "=INDIRECT(\"B1\") * 2"), ("B1", "=C1+1"), ("C1", "4")]);
    assert_eq!(number(&engine, "A1"), 10.0);
}

#[test]
fn test_unparsable_target_is_ref() {
    let engine = sheet(&[("A1", "=INDIRECT(\"not a cell\")")]);
    assert_eq!(error_code(&value(&engine, "A1")), Some(ErrorCode::Ref));
}

#[test]
fn test_rebuild_limit_reports_loop() {
    let mut engine = Engine::new(EvalConfig::default().with_max_short_circuit_retries(0));
    engine.set_value(at("B1"), 1.0).unwrap();
    engine.set_formula(at("A1"), "=INDIRECT(\"B1\")").unwrap();
    engine.recalculate();
    assert_eq!(error_code(&value(&engine, "A1")), Some(ErrorCode::Loop));
}
