pub mod complex;
pub mod datetime;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod math_host;
pub mod random;
pub mod reference_fns;
pub mod text;
pub mod widgets;
mod utils;

/// Registers every built-in. The math-host functions go last so that a
/// spreadsheet function of the same name keeps its slot.
pub fn register_builtins(library: &mut crate::function_registry::FunctionLibrary) {
    math::register_builtins(library);
    logical::register_builtins(library);
    lookup::register_builtins(library);
    datetime::register_builtins(library);
    info::register_builtins(library);
    text::register_builtins(library);
    widgets::register_builtins(library);
    complex::register_builtins(library);
    random::register_builtins(library);
    reference_fns::register_builtins(library);
    math_host::register_builtins(library);
}
