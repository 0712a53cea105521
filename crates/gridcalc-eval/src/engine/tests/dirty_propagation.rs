use gridcalc_common::Value;

use crate::engine::EngineError;

use super::common::{at, number, sheet, value};

#[test]
fn test_chain_follows_an_edit() {
    let mut engine = sheet(&[("A1", "1"), ("A2", "=A1*2"), ("A3", "=A2+1")]);
    assert_eq!(number(&engine, "A3"), 3.0);

    engine.set_value(at("A1"), 5.0).unwrap();
    let result = engine.recalculate();
    assert_eq!(result.computed_vertices, 3);
    assert_eq!(number(&engine, "A2"), 10.0);
    assert_eq!(number(&engine, "A3"), 11.0);
}

#[test]
fn test_clean_graph_calculates_nothing() {
    let mut engine = sheet(&[("A1", "1"), ("A2", "=A1*2")]);
    let result = engine.recalculate();
    assert_eq!(result.computed_vertices, 0);
    assert_eq!(engine.graph().dirty_count(), 0);
}

#[test]
fn test_unrelated_cells_stay_clean() {
    let mut engine = sheet(&[("A1", "1"), ("A2", "=A1"), ("B1", "10"), ("B2", "=B1")]);
    engine.set_value(at("A1"), 2.0).unwrap();

    assert!(engine.graph().vertex_at(at("A2")).unwrap().is_dirty());
    assert!(!engine.graph().vertex_at(at("B2")).unwrap().is_dirty());
}

#[test]
fn test_diamond_calculates_each_cell_once() {
    let mut engine = sheet(&[("A1", "1"), ("B1", "=A1+1"), ("C1", "=A1*2"), ("D1", "=B1+C1")]);
    assert_eq!(number(&engine, "D1"), 4.0);

    engine.set_value(at("A1"), 3.0).unwrap();
    let result = engine.recalculate();
    assert_eq!(result.computed_vertices, 4);
    assert_eq!(number(&engine, "D1"), 10.0);
}

#[test]
fn test_formula_replaced_by_value() {
    let mut engine = sheet(&[("A1", "1"), ("A2", "=A1*2")]);
    engine.set_value(at("A2"), 7.0).unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "A2"), 7.0);

    engine.set_value(at("A1"), 100.0).unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "A2"), 7.0);
    assert!(!engine.graph().vertex_at(at("A2")).is_some_and(|v| v.is_formula()));
}

#[test]
fn test_clear_drops_the_formula() {
    let mut engine = sheet(&[("A1", "4"), ("B1", "=A1")]);
    engine.clear(at("B1")).unwrap();
    engine.recalculate();

    assert_eq!(value(&engine, "B1"), Value::Undefined);
    assert!(engine.graph().vertex_at(at("B1")).is_none());
}

#[test]
fn test_clearing_an_input_reads_empty() {
    let mut engine = sheet(&[("A1", "4"), ("B1", "=A1+1")]);
    engine.clear(at("A1")).unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "B1"), 1.0);
}

#[test]
fn test_parse_error_leaves_cell_untouched() {
    let mut engine = sheet(&[("A1", "=2")]);
    let err = engine.set_formula(at("A1"), "=(1+2").unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
    engine.recalculate();
    assert_eq!(number(&engine, "A1"), 2.0);
}

#[test]
fn test_input_is_typed() {
    let engine = sheet(&[("A1", "12.5"), ("A2", "true"), ("A3", "hello"), ("A4", "=A1*2")]);
    assert_eq!(value(&engine, "A1"), Value::Number(12.5));
    assert_eq!(value(&engine, "A2"), Value::Boolean(true));
    assert_eq!(value(&engine, "A3"), Value::Text("hello".into()));
    assert_eq!(value(&engine, "A4"), Value::Number(25.0));
}

#[test]
fn test_step_limit_truncates_the_pass() {
    use crate::engine::{Engine, EvalConfig};

    let mut engine = Engine::new(EvalConfig::default().with_iterate_loop_limit(2));
    engine.set_value(at("A1"), 1.0).unwrap();
    for row in 2..=6 {
        engine
            .set_formula(at(&format!("A{row}")), &format!("=A{}+1", row - 1))
            .unwrap();
    }
    let first = engine.recalculate();
    assert!(first.truncated);
    assert!(engine.graph().dirty_count() > 0);

    // later passes pick up where the last one stopped
    let mut passes = 0;
    while engine.graph().dirty_count() > 0 && passes < 20 {
        engine.recalculate();
        passes += 1;
    }
    assert_eq!(number(&engine, "A6"), 6.0);
}
