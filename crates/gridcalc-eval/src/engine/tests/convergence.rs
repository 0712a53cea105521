use proptest::prelude::*;
use proptest::sample::Index;

use super::common::{at, engine, number};

/// Row `i + 1` adds one to the rows picked for it, all above it.
fn formula(row: usize, picks: &[Index]) -> String {
    let mut text = "=1".to_string();
    for pick in picks {
        text.push_str(&format!("+A{}", pick.index(row) + 1));
    }
    text
}

proptest! {
    #[test]
    fn test_acyclic_sheets_settle_in_one_pass(
        rows in prop::collection::vec(prop::collection::vec(any::<Index>(), 0..4), 1..24)
    ) {
        let mut engine = engine();
        engine.set_value(at("A1"), 1.0).unwrap();
        let mut expected = vec![1.0];
        for (i, picks) in rows.iter().enumerate() {
            let row = i + 1;
            engine.set_formula(at(&format!("A{}", row + 1)), &formula(row, picks)).unwrap();
            expected.push(1.0 + picks.iter().map(|p| expected[p.index(row)]).sum::<f64>());
        }

        let result = engine.recalculate();
        prop_assert_eq!(result.computed_vertices, rows.len());
        prop_assert_eq!(result.cycle_errors, 0);
        prop_assert_eq!(engine.graph().dirty_count(), 0);
        for (row, value) in expected.iter().enumerate() {
            prop_assert_eq!(number(&engine, &format!("A{}", row + 1)), *value);
        }
    }
}
