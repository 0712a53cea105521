use gridcalc_common::{Area, ErrorCode, Value};
use gridcalc_parse::Parser;

use super::utils::{apply_as_array, arg};
use crate::cells::Cell;
use crate::function::{ArgSpec, CallContext, Function};
use crate::function_registry::FunctionLibrary;

/* ─────────────────────────── INDIRECT() ─────────────────────── */

/// Parses `"B3"`, `"$A$1:C4"` or `"Sheet1!A:A"` into an area.
fn parse_area(text: &str) -> Option<Area> {
    let mut parser = Parser::default();
    let (start, end) = match text.split_once(':') {
        Some((a, b)) => (parser.parse_address(a)?, parser.parse_address(b)?),
        None => {
            let a = parser.parse_address(text)?;
            (a.clone(), a)
        }
    };
    Some(Area::new(start, end))
}

fn indirect(text: &str, ctx: &CallContext) -> Value {
    let Some(area) = parse_area(text) else {
        return Value::error_with(ErrorCode::Ref, format!("not a reference: {text:?}"));
    };
    let on_sheet = area
        .start
        .sheet
        .as_deref()
        .is_none_or(|sheet| sheet.eq_ignore_ascii_case(ctx.sheet_name()));
    if !on_sheet {
        return Value::error(ErrorCode::Ref);
    }
    ctx.record_reference(area.clone());

    let cells = ctx.cells();
    if let Some(cell) = area.start.to_cell().filter(|_| area.size() == Some((1, 1))) {
        return cells.get_cell(cell).map(Cell::get_value).unwrap_or_default();
    }
    let resolved = area.resolve(cells.rows(), cells.columns());
    match (resolved.start.to_cell(), resolved.end.to_cell()) {
        (Some(start), Some(end)) => cells.get_range(start, end),
        _ => Value::error(ErrorCode::Ref),
    }
}

#[derive(Debug)]
pub struct IndirectFn;

/// Builds a reference from text and reads it.
///
/// # Remarks
/// - The referenced area is reported to the engine, which adds it to the
///   cell's dependencies on the next pass.
/// - Text that is not a reference, or names another sheet, is `#REF`.
impl Function for IndirectFn {
    fn name(&self) -> &'static str {
        "INDIRECT"
    }
    fn description(&self) -> &'static str {
        "Returns the value of a reference given as text"
    }
    crate::fn_arguments!(ArgSpec::new("reference text"));
    fn eval(&self, args: &[Value], ctx: &CallContext) -> Value {
        apply_as_array(&args[..args.len().min(1)], |a| {
            indirect(&arg(a, 0).to_text(), ctx)
        })
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library; IndirectFn);
}
