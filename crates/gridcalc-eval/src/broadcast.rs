//! Elementwise application over column-major arrays.
//!
//! Shapes are reconciled by recycling: each operand is repeated down its
//! rows, then across its columns, until both match the larger extent on
//! each axis. `{1,2,3}+{10,20}` therefore reads as `{1,2,3}+{10,20,10}`.

use gridcalc_common::Value;

/// Views a value as columns. Scalars become a 1x1 array.
pub fn as_columns(value: Value) -> Vec<Vec<Value>> {
    match value {
        Value::Array(columns) => columns,
        Value::Metadata(meta) => as_columns(meta.value),
        other => vec![vec![other]],
    }
}

/// Repeats values until the array is `columns` wide and `rows` tall.
pub fn recycle(mut array: Vec<Vec<Value>>, columns: usize, rows: usize) -> Vec<Vec<Value>> {
    let height = array.first().map_or(0, Vec::len);
    if height == 0 {
        return vec![vec![Value::Undefined; rows]; columns];
    }
    if height < rows {
        for column in &mut array {
            for r in height..rows {
                let v = column[r % height].clone();
                column.push(v);
            }
        }
    }
    let width = array.len();
    for c in width..columns {
        let copy = array[c % width].clone();
        array.push(copy);
    }
    array
}

/// Target shape `(columns, rows)` for a set of operands.
pub fn target_shape(values: &[&Value]) -> (usize, usize) {
    values.iter().fold((0, 0), |(c, r), v| {
        let (vc, vr) = v.dimensions();
        (c.max(vc), r.max(vr))
    })
}

/// Applies `f` to every scalar of `value`, keeping the shape.
pub fn map<F>(value: Value, f: F) -> Value
where
    F: Fn(&Value) -> Value,
{
    match value {
        Value::Array(columns) => Value::Array(
            columns
                .into_iter()
                .map(|column| column.iter().map(&f).collect())
                .collect(),
        ),
        other => f(&other),
    }
}

/// Applies `f` pairwise. Scalars pass straight through; when either side
/// is an array both are recycled to the common shape first.
pub fn binary<F>(left: Value, right: Value, f: F) -> Value
where
    F: Fn(&Value, &Value) -> Value,
{
    if !left.is_array() && !right.is_array() {
        return f(&left, &right);
    }
    let (columns, rows) = target_shape(&[&left, &right]);
    let left = recycle(as_columns(left), columns, rows);
    let right = recycle(as_columns(right), columns, rows);
    Value::Array(
        left.iter()
            .zip(&right)
            .map(|(lc, rc)| lc.iter().zip(rc).map(|(l, r)| f(l, r)).collect())
            .collect(),
    )
}
