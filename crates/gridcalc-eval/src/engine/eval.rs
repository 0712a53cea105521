use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gridcalc_common::{
    Address, Area, CellAddress, ErrorCode, MAX_COLUMN, MAX_ROW, Value, parse_numeric_text,
};
use gridcalc_parse::{ExpressionUnit, Parser, UnitKind};
use rustc_hash::FxHashMap;

use super::graph::{CalculationResult, Graph, VertexHandler};
use super::vertex::{DependencySet, Vertex};
use super::{EngineError, EvalConfig};
use crate::cells::{Cell, Cells};
use crate::function::{Function, HookContext, HookResult};
use crate::function_registry::FunctionLibrary;
use crate::interpreter::Interpreter;
use crate::simulation::{SimulationModel, SimulationState, pack_results, unpack_results};
use crate::traits::CellStore;

/// Outcome of one recalculation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalResult {
    pub computed_vertices: usize,
    pub cycle_errors: usize,
    /// Vertices whose dependencies were rebuilt mid-pass.
    pub rebuilds: usize,
    /// The step limit stopped the pass early.
    pub truncated: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Rows,
    Columns,
}

/* ─────────────────────────── Dependencies ──────────────────────── */

fn on_sheet(address: &Address, sheet_name: &str) -> bool {
    address
        .sheet
        .as_deref()
        .is_none_or(|sheet| sheet.eq_ignore_ascii_case(sheet_name))
}

fn push_area(deps: &mut DependencySet, area: Area) {
    match (area.top_left(), area.size()) {
        (Some(cell), Some((1, 1))) => {
            if !deps.cells.contains(&cell) {
                deps.cells.push(cell);
            }
        }
        _ => {
            if !deps.areas.contains(&area) {
                deps.areas.push(area);
            }
        }
    }
}

/// References written in the formula. Named ranges count; references to
/// other sheets do not.
pub(crate) fn static_dependencies(
    expr: &ExpressionUnit,
    names: &FxHashMap<String, Area>,
    sheet_name: &str,
) -> DependencySet {
    let mut deps = DependencySet::default();
    expr.walk(&mut |unit| match &unit.kind {
        UnitKind::Address(a) => {
            if let (Some(cell), true) = (a.address.to_cell(), on_sheet(&a.address, sheet_name)) {
                if !deps.cells.contains(&cell) {
                    deps.cells.push(cell);
                }
            }
            false
        }
        UnitKind::Range(range) => {
            if on_sheet(&range.start.address, sheet_name) {
                push_area(
                    &mut deps,
                    Area::new(range.start.address.clone(), range.end.address.clone()),
                );
            }
            false
        }
        UnitKind::Identifier { name } => {
            if let Some(area) = names.get(&name.to_ascii_uppercase()) {
                push_area(&mut deps, area.clone());
            }
            false
        }
        _ => true,
    });
    deps
}

/* ─────────────────────────── Driver ────────────────────────────── */

/// Connects a recalculation pass to the cell store and the calculator.
struct Driver<'e> {
    cells: &'e mut Cells,
    library: &'e FunctionLibrary,
    model: &'e RefCell<SimulationModel>,
    names: &'e FxHashMap<String, Area>,
    config: &'e EvalConfig,
}

impl VertexHandler for Driver<'_> {
    fn calculate(&mut self, vertex: &Vertex) -> CalculationResult {
        let Some(expr) = vertex.expression() else {
            return CalculationResult {
                value: self.reference_value(vertex.address),
                ..CalculationResult::default()
            };
        };
        let evaluation = Interpreter::new(&*self.cells, self.library, self.model)
            .with_names(self.names)
            .with_sheet_name(&self.config.sheet_name)
            .with_parser_config(self.config.parser_config())
            .calculate(expr, vertex.address);

        let covered = evaluation
            .dynamic
            .iter()
            .all(|area| vertex.dependencies().covers(area));
        let rebuild = if covered {
            None
        } else {
            let mut deps = static_dependencies(expr, self.names, &self.config.sheet_name);
            for area in evaluation.dynamic {
                push_area(&mut deps, area);
            }
            Some(deps)
        };
        CalculationResult {
            value: evaluation.value,
            volatile: evaluation.volatile,
            rebuild,
        }
    }

    fn reference_value(&self, address: CellAddress) -> Value {
        self.cells
            .get_cell(address)
            .map(Cell::get_value)
            .unwrap_or_default()
    }

    fn store(&mut self, address: CellAddress, value: &Value) {
        let cell = self.cells.ensure_cell(address);
        match value {
            Value::Error(error) => cell.set_calculation_error(error.clone()),
            other => cell.set_calculated_value(other.clone()),
        }
    }

    /// A scalar fills the area; an array lands element by element and
    /// positions it does not reach read `#NA`.
    fn spread(&mut self, vertex: &Vertex, value: &Value) {
        let Some(area) = &vertex.array_area else {
            return;
        };
        let (Some(top_left), Ok(members)) = (area.top_left(), area.cells()) else {
            return;
        };
        for member in members {
            let element = match value {
                Value::Array(columns) => columns
                    .get((member.column - top_left.column) as usize)
                    .and_then(|column| column.get((member.row - top_left.row) as usize))
                    .cloned()
                    .unwrap_or_else(|| Value::error(ErrorCode::Na)),
                scalar => scalar.clone(),
            };
            self.store(member, &element);
        }
    }
}

/* ─────────────────────────── Engine ────────────────────────────── */

/// A single sheet with incremental recalculation.
///
/// Edits mark cells dirty; [`Engine::recalculate`] brings every dirty cell
/// up to date. The engine holds `Rc`/`RefCell` state and is not shared
/// across threads; parallel simulation runs one engine per worker.
pub struct Engine {
    cells: Cells,
    graph: Graph,
    library: Rc<FunctionLibrary>,
    model: RefCell<SimulationModel>,
    names: FxHashMap<String, Area>,
    config: EvalConfig,
    parser: Parser,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}

impl Engine {
    pub fn new(config: EvalConfig) -> Self {
        Self::with_library(Rc::new(FunctionLibrary::with_builtins()), config)
    }

    pub fn with_library(library: Rc<FunctionLibrary>, config: EvalConfig) -> Self {
        let model = SimulationModel::new(config.rng_seed);
        let mut engine = Self {
            cells: Cells::new(),
            graph: Graph::new(),
            library,
            model: RefCell::new(model),
            names: FxHashMap::default(),
            parser: Parser::new(config.parser_config()),
            config,
        };
        engine.configure_graph();
        engine
    }

    fn configure_graph(&mut self) {
        self.graph.max_short_circuit_retries = self.config.max_short_circuit_retries;
        self.graph.iterate_loop_limit = self.config.iterate_loop_limit;
    }

    /* ===================  accessors  =================== */

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn cells(&self) -> &Cells {
        &self.cells
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn library(&self) -> &Rc<FunctionLibrary> {
        &self.library
    }

    pub fn model(&self) -> &RefCell<SimulationModel> {
        &self.model
    }

    /// What references to the cell read.
    pub fn get_value(&self, address: CellAddress) -> Value {
        self.cells
            .get_cell(address)
            .map(Cell::get_value)
            .unwrap_or_default()
    }

    fn interpreter(&self) -> Interpreter<'_> {
        Interpreter::new(&self.cells, &self.library, &self.model)
            .with_names(&self.names)
            .with_sheet_name(&self.config.sheet_name)
            .with_parser_config(self.config.parser_config())
    }

    /// Calculates a formula against the current sheet without storing it.
    pub fn evaluate(&mut self, formula: &str, address: CellAddress) -> Result<Value, EngineError> {
        let expr = self.parser.parse(formula).into_result()?;
        Ok(self.interpreter().calculate(&expr, address).value)
    }

    /* ===================  edits  =================== */

    pub fn set_value(
        &mut self,
        address: CellAddress,
        value: impl Into<Value>,
    ) -> Result<(), EngineError> {
        self.detach_array(address)?;
        self.cells.set_value(address, value);
        self.demote(address);
        self.graph.set_dirty(address);
        Ok(())
    }

    /// Stores formula text (a leading `=` is optional). Text that does not
    /// parse leaves the cell untouched.
    pub fn set_formula(&mut self, address: CellAddress, text: &str) -> Result<(), EngineError> {
        let expr = self.parser.parse(text).into_result()?;
        self.detach_array(address)?;
        self.cells.set_formula(address, text);
        self.install(address, expr, None)
    }

    /// Reads user input: `=` starts a formula, empty text clears, numbers
    /// and `TRUE`/`FALSE` are typed, anything else is text.
    pub fn set_input(&mut self, address: CellAddress, text: &str) -> Result<(), EngineError> {
        let trimmed = text.trim();
        if trimmed.starts_with('=') {
            return self.set_formula(address, trimmed);
        }
        if trimmed.is_empty() {
            return self.clear(address);
        }
        let value = match parse_numeric_text(trimmed) {
            Some(n) => Value::Number(n),
            None if trimmed.eq_ignore_ascii_case("true") => Value::Boolean(true),
            None if trimmed.eq_ignore_ascii_case("false") => Value::Boolean(false),
            None => Value::Text(text.to_string()),
        };
        self.set_value(address, value)
    }

    /// Enters one formula over a whole area. The top-left cell holds the
    /// formula; the others receive its elements.
    pub fn set_array_formula(&mut self, area: &Area, text: &str) -> Result<(), EngineError> {
        let Some(head) = area.top_left().filter(|_| area.is_bounded()) else {
            return Err(EngineError::UnboundedArea(area.clone()));
        };
        let expr = self.parser.parse(text).into_result()?;
        let members = area.cells()?;
        let mut replaces_same = false;
        for member in &members {
            if let Some(existing) = self.cells.get_cell(*member).and_then(|c| c.area.as_ref()) {
                if existing != area {
                    return Err(EngineError::ArrayOverlap(area.clone()));
                }
                replaces_same = true;
            }
        }
        if replaces_same {
            self.clear_array(area);
        }

        for member in &members {
            self.demote(*member);
            let cell = self.cells.ensure_cell(*member);
            cell.reset();
            cell.area = Some(area.clone());
        }
        self.cells.set_formula(head, text);
        self.install(head, expr, Some(area.clone()))
    }

    /// Empties a cell. Clearing the first cell of an array clears the whole
    /// array.
    pub fn clear(&mut self, address: CellAddress) -> Result<(), EngineError> {
        if let Some(area) = self.array_of(address) {
            if area.top_left() != Some(address) {
                return Err(EngineError::ArrayMember(address));
            }
            self.clear_array(&area);
            return Ok(());
        }
        self.cells.clear(address);
        self.demote(address);
        self.graph.set_dirty(address);
        Ok(())
    }

    /// Named ranges resolve case-insensitively.
    pub fn define_name(&mut self, name: &str, area: Area) {
        self.names.insert(name.to_ascii_uppercase(), area);
        self.rebuild_graph();
    }

    pub fn remove_name(&mut self, name: &str) -> bool {
        let removed = self.names.remove(&name.to_ascii_uppercase()).is_some();
        if removed {
            self.rebuild_graph();
        }
        removed
    }

    fn array_of(&self, address: CellAddress) -> Option<Area> {
        self.cells.get_cell(address).and_then(|c| c.area.clone())
    }

    /// Array members can only change as a whole. Editing the head drops
    /// the array first.
    fn detach_array(&mut self, address: CellAddress) -> Result<(), EngineError> {
        match self.array_of(address) {
            Some(area) if area.top_left() == Some(address) => {
                self.clear_array(&area);
                Ok(())
            }
            Some(_) => Err(EngineError::ArrayMember(address)),
            None => Ok(()),
        }
    }

    fn clear_array(&mut self, area: &Area) {
        for member in area.cells().unwrap_or_default() {
            self.cells.clear(member);
            self.demote(member);
            self.graph.set_dirty(member);
        }
    }

    /// Turns a cell's vertex back into a plain value vertex, or drops it
    /// when nothing depends on it.
    fn demote(&mut self, address: CellAddress) {
        let Some(id) = self.graph.vertex_id(address) else {
            return;
        };
        self.graph.clear_dependencies(id);
        let orphan = match self.graph.vertex_mut(id) {
            Some(vertex) => {
                vertex.expression = None;
                vertex.array_area = None;
                vertex.volatile = false;
                vertex.edges_out.is_empty()
            }
            None => false,
        };
        if orphan {
            self.graph.remove_vertex(address);
        }
    }

    /// Wires a parsed formula into the graph and marks it dirty.
    fn install(
        &mut self,
        address: CellAddress,
        expr: ExpressionUnit,
        array_area: Option<Area>,
    ) -> Result<(), EngineError> {
        let deps = static_dependencies(&expr, &self.names, &self.config.sheet_name);
        let id = self.graph.get_or_create_vertex(address);
        if let Some(vertex) = self.graph.vertex_mut(id) {
            vertex.expression = Some(expr);
            vertex.array_area = array_area.clone();
            vertex.volatile = false;
        }
        let mut members = Vec::new();
        if let Some(area) = &array_area {
            for member in area.cells()? {
                if member != address {
                    let m = self.graph.get_or_create_vertex(member);
                    self.graph.add_edge(id, m);
                    members.push(m);
                }
            }
        }
        self.graph.replace_dependencies(id, deps);
        for m in members {
            self.graph.mark_dirty(m);
        }
        Ok(())
    }

    /* ===================  recalculation  =================== */

    /// Recalculates every dirty cell, volatile cells included.
    pub fn recalculate(&mut self) -> EvalResult {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("engine_recalculate", vertices = self.graph.len()).entered();

        let started = Instant::now();
        self.graph.mark_volatile_dirty();
        let mut driver = Driver {
            cells: &mut self.cells,
            library: &self.library,
            model: &self.model,
            names: &self.names,
            config: &self.config,
        };
        let stats = self.graph.recalculate(&mut driver);
        EvalResult {
            computed_vertices: stats.calculated,
            cycle_errors: stats.loops,
            rebuilds: stats.rebuilds,
            truncated: stats.truncated,
            elapsed: started.elapsed(),
        }
    }

    /// Rebuilds the graph from the stored formulas. Every formula is dirty
    /// afterwards.
    pub fn rebuild_graph(&mut self) {
        self.graph = Graph::new();
        self.configure_graph();
        let formulas: Vec<(CellAddress, String, Option<Area>)> = self
            .cells
            .iter()
            .filter_map(|(address, cell)| {
                cell.formula()
                    .map(|text| (address, text.to_string(), cell.area.clone()))
            })
            .collect();
        for (address, text, area) in formulas {
            match self.parser.parse(&text).into_result() {
                Ok(expr) => {
                    let area = area.filter(|a| a.top_left() == Some(address));
                    if let Err(_error) = self.install(address, expr, area) {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(%address, error = %_error, "formula skipped in rebuild");
                    }
                }
                Err(_error) => {
                    if let Some(cell) = self.cells.get_cell_mut(address, false) {
                        cell.set_calculation_error(ErrorCode::Expr);
                    }
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%address, error = %_error, "stored formula no longer parses");
                }
            }
        }
    }

    fn mark_formulas_dirty(&mut self) {
        let formulas: Vec<_> = self
            .graph
            .ids()
            .filter(|id| self.graph.vertex(*id).is_some_and(Vertex::is_formula))
            .collect();
        for id in formulas {
            self.graph.mark_dirty(id);
        }
    }

    /* ===================  hooks  =================== */

    fn hook_context(&self, address: CellAddress) -> Option<(HookContext, Arc<dyn Function>)> {
        let expr = self.graph.vertex_at(address)?.expression()?;
        let (function, args) = self.interpreter().call_arguments(expr, address)?;
        let ctx = HookContext {
            address,
            value: self.get_value(address),
            args,
        };
        Some((ctx, function))
    }

    /// Runs the render hook of the cell's top-level function, if it has one.
    pub fn render_cell(&self, address: CellAddress) -> Option<HookResult> {
        let (ctx, function) = self.hook_context(address)?;
        function.render(&ctx)
    }

    /// Runs the click hook of the cell's top-level function, if it has one.
    pub fn click_cell(&self, address: CellAddress) -> Option<HookResult> {
        let (ctx, function) = self.hook_context(address)?;
        function.click(&ctx)
    }

    /* ===================  structure  =================== */

    /// Inserts rows before `before`. Cell contents move; formulas keep
    /// their reference text.
    pub fn insert_rows(&mut self, before: u32, count: u32) -> Result<(), EngineError> {
        self.shift(Axis::Rows, before, i64::from(count))
    }

    pub fn delete_rows(&mut self, start: u32, count: u32) -> Result<(), EngineError> {
        self.shift(Axis::Rows, start, -i64::from(count))
    }

    pub fn insert_columns(&mut self, before: u32, count: u32) -> Result<(), EngineError> {
        self.shift(Axis::Columns, before, i64::from(count))
    }

    pub fn delete_columns(&mut self, start: u32, count: u32) -> Result<(), EngineError> {
        self.shift(Axis::Columns, start, -i64::from(count))
    }

    fn shift(&mut self, axis: Axis, at: u32, delta: i64) -> Result<(), EngineError> {
        if delta == 0 {
            return Ok(());
        }
        let span = |area: &Area| match axis {
            Axis::Rows => area.start.row.zip(area.end.row),
            Axis::Columns => area.start.column.zip(area.end.column),
        };
        // the band an edit touches must not cut through an array
        let band_end = if delta < 0 {
            i64::from(at) - delta
        } else {
            i64::from(at) + 1
        };
        for (_, cell) in self.cells.iter() {
            let Some((first, last)) = cell.area.as_ref().and_then(span) else {
                continue;
            };
            let (first, last) = (i64::from(first), i64::from(last));
            let crosses = if delta < 0 {
                first < band_end && last >= i64::from(at) && (first < i64::from(at) || last >= band_end)
            } else {
                first < i64::from(at) && last >= i64::from(at)
            };
            if crosses {
                if let Some(area) = &cell.area {
                    return Err(EngineError::ArrayOverlap(area.clone()));
                }
            }
        }

        let count = delta.unsigned_abs() as u32;
        if delta > 0 {
            let (used, limit) = match axis {
                Axis::Rows => (self.cells.rows(), MAX_ROW),
                Axis::Columns => (self.cells.columns(), MAX_COLUMN),
            };
            if used > at && i64::from(used) - 1 + delta > i64::from(limit) {
                return Err(EngineError::OutOfBounds(count));
            }
        }
        match (axis, delta > 0) {
            (Axis::Rows, true) => self.cells.insert_rows(at, count),
            (Axis::Rows, false) => self.cells.delete_rows(at, count),
            (Axis::Columns, true) => self.cells.insert_columns(at, count),
            (Axis::Columns, false) => self.cells.delete_columns(at, count),
        }
        for (_, cell) in self.cells.iter_mut() {
            let Some(area) = &mut cell.area else {
                continue;
            };
            let moves = span(&*area).is_some_and(|(first, _)| first >= at);
            if moves {
                for corner in [&mut area.start, &mut area.end] {
                    let slot = match axis {
                        Axis::Rows => &mut corner.row,
                        Axis::Columns => &mut corner.column,
                    };
                    if let Some(v) = slot {
                        *v = (i64::from(*v) + delta).max(0) as u32;
                    }
                }
            }
        }
        self.rebuild_graph();
        Ok(())
    }

    /* ===================  simulation  =================== */

    /// Runs the preparation pass that registers sampled cells. Refused
    /// while the sheet has circular references.
    pub fn start_simulation(&mut self, iterations: usize) -> Result<EvalResult, EngineError> {
        {
            let mut model = self.model.borrow_mut();
            model.begin(iterations);
            model.state = SimulationState::Prep;
            if let Some(seed) = self.config.rng_seed {
                model.reseed(seed);
            }
        }
        self.mark_formulas_dirty();
        let result = self.recalculate();

        let loops = self.graph.loop_members().len();
        if loops > 0 {
            self.model.borrow_mut().state = SimulationState::Null;
            return Err(EngineError::CircularReference(loops));
        }
        self.model.borrow_mut().state = SimulationState::Simulation;
        Ok(result)
    }

    /// One trial: volatile and simulation-volatile cells recalculate, then
    /// every registered cell records its value.
    pub fn simulation_trial(&mut self) -> Result<EvalResult, EngineError> {
        if self.model.borrow().state != SimulationState::Simulation {
            return Err(EngineError::SimulationInactive);
        }
        let result = self.recalculate();
        let watched: Vec<CellAddress> = self.model.borrow().watched().collect();
        let mut model = self.model.borrow_mut();
        let iteration = model.iteration;
        for address in watched {
            model.record(address, iteration, &self.get_value(address));
        }
        model.iteration += 1;
        Ok(result)
    }

    /// Leaves simulation mode and returns the packed samples. Formulas are
    /// marked dirty so collector reads pick up the samples on the next
    /// pass.
    pub fn end_simulation(&mut self) -> Result<Vec<f64>, EngineError> {
        if !self.model.borrow().is_active() {
            return Err(EngineError::SimulationInactive);
        }
        let packed = {
            let mut model = self.model.borrow_mut();
            model.state = SimulationState::Null;
            pack_results(model.results())
        };
        self.mark_formulas_dirty();
        Ok(packed)
    }

    /// Installs samples produced elsewhere, e.g. merged from workers.
    pub fn load_simulation_results(&mut self, data: &[f64]) -> Result<(), EngineError> {
        let results = unpack_results(data)?;
        self.model.borrow_mut().set_results(results);
        self.mark_formulas_dirty();
        Ok(())
    }
}
