//! The `Function` trait and its per-argument calling conventions.

use std::cell::{RefCell, RefMut};

use gridcalc_common::{Area, CellAddress, Value};

use crate::simulation::{SimulationModel, SimulationState};
use crate::traits::CellStore;

bitflags::bitflags! {
    /// How the calculator prepares one argument before the call.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ArgFlags: u8 {
        /// Receives the full value, including `Undefined`.
        const BOXED       = 0b0000_0001;
        /// Receives the reference rendered as text, `$` stripped. The
        /// reference itself is not read.
        const ADDRESS     = 0b0000_0010;
        /// Receives `{address, value, format}` for a cell reference.
        const METADATA    = 0b0000_0100;
        /// Resolved through the simulation collector.
        const COLLECTOR   = 0b0000_1000;
        /// An error in this argument is passed through instead of
        /// failing the call with `#ARG`.
        const ALLOW_ERROR = 0b0001_0000;
    }
}

/// Documentation and calling convention for one argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub flags: ArgFlags,
    /// Substituted when the argument is missing or evaluates to `Undefined`.
    pub default: Option<Value>,
}

impl ArgSpec {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            flags: ArgFlags::empty(),
            default: None,
        }
    }

    pub fn flags(mut self, flags: ArgFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// State visible to a function while it runs.
pub struct CallContext<'a> {
    pub(crate) address: CellAddress,
    pub(crate) call_index: usize,
    pub(crate) cells: &'a dyn CellStore,
    pub(crate) model: &'a RefCell<SimulationModel>,
    pub(crate) dynamic: &'a RefCell<Vec<Area>>,
    pub(crate) sheet_name: &'a str,
}

impl<'a> CallContext<'a> {
    /// The cell being calculated.
    pub fn address(&self) -> CellAddress {
        self.address
    }

    /// 1-based position of this call within the cell's formula, in
    /// evaluation order.
    pub fn call_index(&self) -> usize {
        self.call_index
    }

    pub fn cells(&self) -> &'a dyn CellStore {
        self.cells
    }

    pub fn sheet_name(&self) -> &'a str {
        self.sheet_name
    }

    pub fn simulation_state(&self) -> SimulationState {
        self.model.borrow().state
    }

    pub fn model(&self) -> RefMut<'a, SimulationModel> {
        self.model.borrow_mut()
    }

    /// Next uniform sample in `[0, 1)` from the model's generator.
    pub fn random(&self) -> f64 {
        self.model.borrow_mut().random()
    }

    /// Declares a reference resolved at run time. The engine rebuilds the
    /// cell's dependencies when the area is not already covered.
    pub fn record_reference(&self, area: Area) {
        self.dynamic.borrow_mut().push(area);
    }
}

/// What a render or click hook sees.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    pub address: CellAddress,
    /// The cell's calculated value.
    pub value: Value,
    /// The formula's top-level arguments, evaluated.
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HookResult {
    /// The hook took over and default handling should be skipped.
    pub handled: bool,
    /// Replacement value, e.g. the toggled state of a checkbox.
    pub value: Option<Value>,
    /// Navigation target for links.
    pub target: Option<String>,
}

/// A spreadsheet function.
///
/// Implementations are unit structs registered into a
/// [`crate::function_registry::FunctionLibrary`].
pub trait Function: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    fn arguments(&self) -> &[ArgSpec] {
        &[]
    }

    /// Flags for argument `index`. Arguments past the declared list take
    /// the flags of the last declared one, so variadic functions declare a
    /// single trailing spec.
    fn arg_flags(&self, index: usize) -> ArgFlags {
        let args = self.arguments();
        args.get(index)
            .or_else(|| args.last())
            .map(|a| a.flags)
            .unwrap_or_default()
    }

    /// Recomputed on every pass.
    fn volatile(&self) -> bool {
        false
    }

    /// Recomputed on every pass while a simulation is active.
    fn simulation_volatile(&self) -> bool {
        false
    }

    fn eval(&self, args: &[Value], ctx: &CallContext) -> Value;

    fn render(&self, _ctx: &HookContext) -> Option<HookResult> {
        None
    }

    fn click(&self, _ctx: &HookContext) -> Option<HookResult> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;
    impl Function for Probe {
        fn name(&self) -> &'static str {
            "PROBE"
        }
        fn arguments(&self) -> &[ArgSpec] {
            static ARGS: once_cell::sync::Lazy<Vec<ArgSpec>> = once_cell::sync::Lazy::new(|| {
                vec![
                    ArgSpec::new("reference").flags(ArgFlags::ADDRESS),
                    ArgSpec::new("values").flags(ArgFlags::BOXED | ArgFlags::ALLOW_ERROR),
                ]
            });
            &ARGS
        }
        fn eval(&self, _args: &[Value], _ctx: &CallContext) -> Value {
            Value::Undefined
        }
    }

    #[test]
    fn trailing_flags_repeat_for_variadic_args() {
        assert_eq!(Probe.arg_flags(0), ArgFlags::ADDRESS);
        assert!(Probe.arg_flags(1).contains(ArgFlags::ALLOW_ERROR));
        assert!(Probe.arg_flags(7).contains(ArgFlags::BOXED));
        assert!(!Probe.volatile());
        assert!(Probe.render(&HookContext {
            address: CellAddress::default(),
            value: Value::Undefined,
            args: vec![],
        })
        .is_none());
    }
}
