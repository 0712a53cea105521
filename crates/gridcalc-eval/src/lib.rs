pub mod broadcast;
pub mod cells;
pub mod coercion;
pub mod function;
pub mod function_registry;
pub mod interpreter;
pub mod simulation;
pub mod traits;

pub mod builtins;

mod macros;
#[cfg(test)]
pub mod test_workbook;

pub mod engine;

pub use cells::{Cell, Cells};
pub use engine::{Engine, EngineError, EvalConfig, EvalResult};
pub use function::{Function, HookContext, HookResult};
pub use function_registry::FunctionLibrary;
pub use interpreter::{Evaluation, Interpreter};
pub use simulation::{SimulationModel, SimulationState};
pub use traits::CellStore;
