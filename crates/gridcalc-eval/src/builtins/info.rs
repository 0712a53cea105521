use gridcalc_common::{ErrorCode, Value};

use super::utils::{arg, value_error};
use crate::function::{ArgFlags, ArgSpec, CallContext, Function};
use crate::function_registry::FunctionLibrary;

/* ─────────────────────────── CELL() ─────────────────────────── */

#[derive(Debug)]
pub struct CellFn;

/// Returns data about a referenced cell.
///
/// # Remarks
/// - `"address"` gives the cell label without `$` markers.
/// - `"format"` gives the number format, or `#REF` when the cell has none.
/// - Any other type is `#VALUE`.
impl Function for CellFn {
    fn name(&self) -> &'static str {
        "CELL"
    }
    fn description(&self) -> &'static str {
        "Returns data about a cell"
    }
    crate::fn_arguments!(
        ArgSpec::new("type"),
        ArgSpec::new("reference").flags(ArgFlags::METADATA),
    );
    fn eval(&self, args: &[Value], _ctx: &CallContext) -> Value {
        let Value::Metadata(meta) = arg(args, 1) else {
            return Value::error(ErrorCode::Ref);
        };
        let kind = arg(args, 0).to_text();
        match kind.to_ascii_lowercase().as_str() {
            "address" => Value::Text(meta.address.to_string()),
            "format" => match &meta.format {
                Some(format) => Value::Text(format.clone()),
                None => Value::error(ErrorCode::Ref),
            },
            _ => value_error(format!("unsupported info type: {kind}")),
        }
    }
}

pub fn register_builtins(library: &mut FunctionLibrary) {
    crate::register_functions!(library; CellFn);
}
