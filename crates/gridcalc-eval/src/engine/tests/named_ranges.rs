use gridcalc_common::ErrorCode;

use super::common::{area, at, engine, error_code, number, sheet, value};

#[test]
fn test_name_resolves_and_tracks_edits() {
    let mut engine = engine();
    engine.set_value(at("A1"), 2.0).unwrap();
    engine.set_value(at("A2"), 3.0).unwrap();
    engine.define_name("Inputs", area("A1", "A2"));
    engine.set_formula(at("B1"), "=SUM(inputs)").unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "B1"), 5.0);

    engine.set_value(at("A2"), 10.0).unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "B1"), 12.0);
}

#[test]
fn test_defining_a_name_later_fixes_formulas() {
    let mut engine = sheet(&[("A1", "0.5"), ("B1", "=Rate*100")]);
    assert_eq!(error_code(&value(&engine, "B1")), Some(ErrorCode::Name));

    engine.define_name("RATE", area("A1", "A1"));
    engine.recalculate();
    assert_eq!(number(&engine, "B1"), 50.0);

    engine.set_value(at("A1"), 0.25).unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "B1"), 25.0);
}

#[test]
fn test_removing_a_name() {
    let mut engine = engine();
    engine.set_value(at("A1"), 1.0).unwrap();
    engine.define_name("x", area("A1", "A1"));
    engine.set_formula(at("B1"), "=x+1").unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "B1"), 2.0);

    assert!(engine.remove_name("X"));
    assert!(!engine.remove_name("X"));
    engine.recalculate();
    assert_eq!(error_code(&value(&engine, "B1")), Some(ErrorCode::Name));
}
