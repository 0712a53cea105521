use gridcalc_common::Value;

use crate::engine::EngineError;
use crate::traits::CellStore;

use super::common::{area, at, engine, number, sheet, value};

#[test]
fn test_inserted_rows_move_cells() {
    let mut engine = sheet(&[("A1", "1"), ("A2", "=A1*2"), ("B1", "=SUM(A1:A5)")]);
    engine.insert_rows(0, 1).unwrap();
    engine.recalculate();

    assert_eq!(value(&engine, "A1"), Value::Undefined);
    assert_eq!(number(&engine, "A2"), 1.0);
    // reference text is kept as written
    assert_eq!(
        engine.cells().get_cell(at("A3")).and_then(|c| c.formula()),
        Some("A1*2")
    );
    assert_eq!(number(&engine, "A3"), 0.0);
}

#[test]
fn test_deleted_columns_move_cells() {
    let mut engine = sheet(&[("A1", "1"), ("B1", "2"), ("C1", "=7")]);
    engine.delete_columns(0, 1).unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "A1"), 2.0);
    assert_eq!(number(&engine, "B1"), 7.0);
    assert_eq!(value(&engine, "C1"), Value::Undefined);
}

#[test]
fn test_arrays_move_with_their_rows() {
    let mut engine = engine();
    engine.set_array_formula(&area("A3", "A4"), "={1; 2}").unwrap();
    engine.recalculate();

    engine.delete_rows(0, 1).unwrap();
    engine.recalculate();
    assert_eq!(number(&engine, "A2"), 1.0);
    assert_eq!(number(&engine, "A3"), 2.0);
    assert_eq!(
        engine.set_value(at("A3"), 0.0),
        Err(EngineError::ArrayMember(at("A3")))
    );
}

#[test]
fn test_edits_cannot_split_an_array() {
    let mut engine = engine();
    engine.set_array_formula(&area("A2", "A4"), "=1").unwrap();
    assert_eq!(
        engine.insert_rows(2, 1),
        Err(EngineError::ArrayOverlap(area("A2", "A4")))
    );
    assert_eq!(
        engine.delete_rows(2, 5),
        Err(EngineError::ArrayOverlap(area("A2", "A4")))
    );
    // the edit is refused before anything moves
    engine.recalculate();
    assert_eq!(number(&engine, "A4"), 1.0);
}

#[test]
fn test_inserts_stop_at_the_sheet_edge() {
    let mut engine = sheet(&[("A1", "1"), ("ZZZ1", "2")]);
    assert_eq!(
        engine.insert_columns(0, 1),
        Err(EngineError::OutOfBounds(1))
    );
    assert_eq!(
        engine.insert_rows(0, u32::MAX),
        Err(EngineError::OutOfBounds(u32::MAX))
    );
    engine.recalculate();
    assert_eq!(number(&engine, "ZZZ1"), 2.0);

    // nothing sits below the insertion point, so only the extent grows
    engine.insert_rows(1, u32::MAX).unwrap();
    assert_eq!(engine.cells().rows(), u32::MAX);
    engine.recalculate();
    assert_eq!(number(&engine, "A1"), 1.0);
}
