//! Lightweight in-memory sheet for unit tests of the calculator and the
//! builtins. No dependency graph; every `eval` calculates from scratch.

use std::cell::RefCell;
use std::sync::Arc;

use gridcalc_common::{Area, CellAddress, ErrorCode, Value};
use gridcalc_parse::{ExpressionUnit, parse};
use rustc_hash::FxHashMap;

use crate::cells::Cells;
use crate::function::Function;
use crate::function_registry::FunctionLibrary;
use crate::interpreter::{Evaluation, Interpreter};
use crate::simulation::{SimulationModel, SimulationState};

pub struct TestSheet {
    pub cells: Cells,
    pub library: FunctionLibrary,
    pub model: RefCell<SimulationModel>,
    names: FxHashMap<String, Area>,
}

impl Default for TestSheet {
    fn default() -> Self {
        Self::new()
    }
}

fn at(label: &str) -> CellAddress {
    CellAddress::from_label(label).expect("bad A1 label in test")
}

impl TestSheet {
    /* ─────────────── constructors ─────────────── */
    pub fn new() -> Self {
        Self {
            cells: Cells::new(),
            library: FunctionLibrary::with_builtins(),
            model: RefCell::new(SimulationModel::new(Some(7))),
            names: FxHashMap::default(),
        }
    }

    pub fn with_function(mut self, function: Arc<dyn Function>) -> Self {
        self.library.register(function);
        self
    }

    /* ─────────────── cell helpers ─────────────── */
    pub fn set(&mut self, label: &str, value: impl Into<Value>) {
        self.cells.set_value(at(label), value);
    }

    pub fn set_error(&mut self, label: &str, code: ErrorCode) {
        self.cells.set_value(at(label), Value::error(code));
    }

    pub fn set_format(&mut self, label: &str, format: &str) {
        self.cells.ensure_cell(at(label)).format = Some(format.to_string());
    }

    /// `range` is `A1` or `A1:B2`.
    pub fn define_name(&mut self, name: &str, range: &str) {
        let (start, end) = range.split_once(':').unwrap_or((range, range));
        self.names
            .insert(name.to_ascii_uppercase(), Area::from_cells(at(start), at(end)));
    }

    pub fn set_state(&self, state: SimulationState) {
        self.model.borrow_mut().state = state;
    }

    /* ─────────────── calculator shortcuts ─────── */
    pub fn interpreter(&self) -> Interpreter<'_> {
        Interpreter::new(&self.cells, &self.library, &self.model).with_names(&self.names)
    }

    pub fn calculate_at(&self, formula: &str, label: &str) -> Evaluation {
        let expr = parse(formula)
            .into_result()
            .expect("test formula should parse");
        self.interpreter().calculate(&expr, at(label))
    }

    pub fn calculate(&self, formula: &str) -> Evaluation {
        self.calculate_at(formula, "Z99")
    }

    pub fn eval(&self, formula: &str) -> Value {
        self.calculate(formula).value
    }

    pub fn eval_expr(&self, expr: &ExpressionUnit) -> Value {
        self.interpreter()
            .calculate(expr, CellAddress::default())
            .value
    }

    pub fn check_volatile(&self, expr: &ExpressionUnit) -> bool {
        self.interpreter().check_volatile(expr)
    }

    /// Asserts a numeric result within `1e-9`.
    pub fn assert_close(&self, formula: &str, expected: f64) {
        match self.eval(formula) {
            Value::Number(n) => assert!(
                (n - expected).abs() < 1e-9,
                "{formula}: expected {expected}, got {n}"
            ),
            other => panic!("{formula}: expected {expected}, got {other:?}"),
        }
    }
}
