use std::cell::RefCell;
use std::sync::Arc;

use gridcalc_common::{Address, Area, CellAddress, CellMetadata, Complex, ErrorCode, Value};
use gridcalc_parse::{ExpressionUnit, Parser, ParserConfig, RenderOptions, UnitKind};
use rustc_hash::FxHashMap;

use crate::broadcast;
use crate::cells::Cell;
use crate::coercion::{compare, complex_value, loose_eq, number_value};
use crate::function::{ArgFlags, CallContext, Function};
use crate::function_registry::FunctionLibrary;
use crate::simulation::{SimulationModel, SimulationState};
use crate::traits::{CellStore, Collector};

/// Result of calculating one cell's expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    /// A volatile function was called.
    pub volatile: bool,
    /// References resolved at run time (`INDIRECT`).
    pub dynamic: Vec<Area>,
}

/// Tree-walking expression calculator.
///
/// Holds only per-calculation scratch state; one instance can calculate any
/// number of cells in turn.
pub struct Interpreter<'a> {
    cells: &'a dyn CellStore,
    library: &'a FunctionLibrary,
    model: &'a RefCell<SimulationModel>,
    names: Option<&'a FxHashMap<String, Area>>,
    sheet_name: &'a str,
    parser: Parser,
    address: CellAddress,
    call_index: usize,
    volatile: bool,
    dynamic: RefCell<Vec<Area>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        cells: &'a dyn CellStore,
        library: &'a FunctionLibrary,
        model: &'a RefCell<SimulationModel>,
    ) -> Self {
        Self {
            cells,
            library,
            model,
            names: None,
            sheet_name: "Sheet1",
            parser: Parser::default(),
            address: CellAddress::default(),
            call_index: 0,
            volatile: false,
            dynamic: RefCell::new(Vec::new()),
        }
    }

    /// Named ranges, keyed by uppercase name.
    pub fn with_names(mut self, names: &'a FxHashMap<String, Area>) -> Self {
        self.names = Some(names);
        self
    }

    /// References qualified with any other sheet name resolve to `#REF`.
    pub fn with_sheet_name(mut self, sheet_name: &'a str) -> Self {
        self.sheet_name = sheet_name;
        self
    }

    /// Locale used when rendering address arguments.
    pub fn with_parser_config(mut self, config: ParserConfig) -> Self {
        self.parser = Parser::new(config);
        self
    }

    /* ===================  public  =================== */

    pub fn calculate(&mut self, expr: &ExpressionUnit, address: CellAddress) -> Evaluation {
        self.address = address;
        self.call_index = 0;
        self.volatile = false;
        self.dynamic.borrow_mut().clear();
        let value = self.evaluate(expr);
        Evaluation {
            value,
            volatile: self.volatile,
            dynamic: self.dynamic.take(),
        }
    }

    /// Whether any function called by the expression is volatile. Only the
    /// tree is inspected; nothing is evaluated.
    pub fn check_volatile(&self, expr: &ExpressionUnit) -> bool {
        let mut volatile = false;
        expr.walk(&mut |unit| {
            if let UnitKind::Call { name, .. } = &unit.kind {
                if self.library.get(name).is_some_and(|f| f.volatile()) {
                    volatile = true;
                }
            }
            !volatile
        });
        volatile
    }

    /// For a top-level call, the function and its prepared arguments. Used
    /// by render and click hooks.
    pub fn call_arguments(
        &mut self,
        expr: &ExpressionUnit,
        address: CellAddress,
    ) -> Option<(Arc<dyn Function>, Vec<Value>)> {
        let UnitKind::Call { name, args } = &expr.kind else {
            return None;
        };
        let function = self.library.get(name).cloned()?;
        self.address = address;
        self.call_index = 1;
        let values = self.prepare_arguments(function.as_ref(), args).ok()?;
        Some((function, values))
    }

    /* ===================  evaluation  =================== */

    pub fn evaluate(&mut self, expr: &ExpressionUnit) -> Value {
        match &expr.kind {
            UnitKind::Literal { value, .. } => value.clone(),
            UnitKind::Complex {
                real, imaginary, ..
            } => complex_value(Complex::new(*real, *imaginary)),
            UnitKind::Imaginary { value, .. } => complex_value(Complex::new(0.0, *value)),
            UnitKind::Array { values } => Value::Array(values.clone()),
            UnitKind::Missing => Value::Undefined,
            UnitKind::Identifier { name } => self.identifier(name),
            UnitKind::Address(unit) => self.address_value(&unit.address),
            UnitKind::Range(range) => self.area_value(&Area::new(
                range.start.address.clone(),
                range.end.address.clone(),
            )),
            UnitKind::Unary { operator, operand } => {
                let value = self.evaluate(operand);
                unary(operator, value)
            }
            UnitKind::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left);
                let right = self.evaluate(right);
                broadcast::binary(left, right, |l, r| elemental(operator, l, r))
            }
            UnitKind::Call { name, args } => self.call(name, args),
            UnitKind::Group { elements, .. } => {
                if let [single] = elements.as_slice() {
                    self.evaluate(single)
                } else {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        elements = elements.len(),
                        "group must hold exactly one element"
                    );
                    Value::error(ErrorCode::Expr)
                }
            }
            UnitKind::Operator { symbol } => {
                #[cfg(feature = "tracing")]
                tracing::warn!(symbol = %symbol, "unhandled operator unit");
                let _ = symbol;
                Value::error(ErrorCode::Expr)
            }
        }
    }

    fn on_this_sheet(&self, address: &Address) -> bool {
        address
            .sheet
            .as_deref()
            .is_none_or(|sheet| sheet.eq_ignore_ascii_case(self.sheet_name))
    }

    fn identifier(&self, name: &str) -> Value {
        match name.to_ascii_lowercase().as_str() {
            "true" | "t" => return Value::Boolean(true),
            "false" | "f" => return Value::Boolean(false),
            _ => {}
        }
        match self
            .names
            .and_then(|names| names.get(&name.to_ascii_uppercase()))
        {
            Some(area) => self.area_value(area),
            None => Value::error_with(ErrorCode::Name, format!("unknown name: {name}")),
        }
    }

    fn address_value(&self, address: &Address) -> Value {
        match address.to_cell() {
            Some(cell) if self.on_this_sheet(address) => self
                .cells
                .get_cell(cell)
                .map(Cell::get_value)
                .unwrap_or_default(),
            _ => Value::error(ErrorCode::Ref),
        }
    }

    /// Whole rows and columns are clipped to the store's extent.
    fn area_value(&self, area: &Area) -> Value {
        if !self.on_this_sheet(&area.start) {
            return Value::error(ErrorCode::Ref);
        }
        let resolved = area.resolve(self.cells.rows(), self.cells.columns());
        match (resolved.start.to_cell(), resolved.end.to_cell()) {
            (Some(start), Some(end)) => self.cells.get_range(start, end),
            _ => Value::error(ErrorCode::Ref),
        }
    }

    /* ===================  calls  =================== */

    fn call(&mut self, name: &str, args: &[ExpressionUnit]) -> Value {
        self.call_index += 1;
        let call_index = self.call_index;

        let Some(function) = self.library.get(name).cloned() else {
            return Value::error_with(ErrorCode::Name, format!("unknown function: {name}"));
        };

        let state = self.model.borrow().state;
        self.volatile = self.volatile
            || function.volatile()
            || (function.simulation_volatile() && state != SimulationState::Null);

        let values = match self.prepare_arguments(function.as_ref(), args) {
            Ok(values) => values,
            Err(error) => return error,
        };
        let argument_error = values
            .iter()
            .enumerate()
            .any(|(i, v)| v.is_error() && !function.arg_flags(i).contains(ArgFlags::ALLOW_ERROR));
        if argument_error {
            return Value::error(ErrorCode::Arg);
        }

        let ctx = CallContext {
            address: self.address,
            call_index,
            cells: self.cells,
            model: self.model,
            dynamic: &self.dynamic,
            sheet_name: self.sheet_name,
        };
        function.eval(&values, &ctx)
    }

    /// Applies each argument's calling convention, then fills defaults. A
    /// metadata argument that is not a reference fails the call with `#REF`.
    fn prepare_arguments(
        &mut self,
        function: &dyn Function,
        args: &[ExpressionUnit],
    ) -> Result<Vec<Value>, Value> {
        let state = self.model.borrow().state;
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let flags = function.arg_flags(i);
            let value = if flags.contains(ArgFlags::ADDRESS) {
                let rendered = self.parser.render(arg, &RenderOptions::default());
                Value::Text(rendered.replace('$', ""))
            } else if flags.contains(ArgFlags::METADATA) {
                self.metadata(arg)
                    .ok_or_else(|| Value::error(ErrorCode::Ref))?
            } else if flags.contains(ArgFlags::COLLECTOR) {
                self.collect(arg, state)
            } else {
                self.evaluate(arg)
            };
            values.push(value);
        }

        for (i, spec) in function.arguments().iter().enumerate() {
            let Some(default) = &spec.default else {
                continue;
            };
            if values.len() <= i {
                values.resize(i + 1, Value::Undefined);
            }
            if values[i].is_undefined() {
                values[i] = default.clone();
            }
        }
        Ok(values)
    }

    fn metadata(&mut self, arg: &ExpressionUnit) -> Option<Value> {
        let address = match &arg.kind {
            UnitKind::Address(unit) => &unit.address,
            UnitKind::Range(range) => &range.start.address,
            _ => return None,
        };
        if !self.on_this_sheet(address) {
            return None;
        }
        let cell_address = address.to_cell()?;
        let cell = self.cells.get_cell(cell_address);
        Some(Value::Metadata(Box::new(CellMetadata {
            address: cell_address,
            value: cell.map(Cell::get_value).unwrap_or_default(),
            format: cell.and_then(|c| c.format.clone()),
        })))
    }

    /// Prep registers the referenced cell for sampling; outside a simulation
    /// the argument reads the recorded samples.
    fn collect(&mut self, arg: &ExpressionUnit, state: SimulationState) -> Value {
        let target = match &arg.kind {
            UnitKind::Address(unit) => unit.address.to_cell(),
            _ => None,
        };
        match (state, target) {
            (SimulationState::Prep, Some(cell)) => {
                self.model.borrow_mut().register(cell);
                self.evaluate(arg)
            }
            (SimulationState::Null, Some(cell)) => self.model.borrow().collected(cell),
            _ => self.evaluate(arg),
        }
    }
}

/* ===================  operators  =================== */

fn unary(operator: &str, value: Value) -> Value {
    match operator {
        "+" => value,
        "-" => broadcast::map(value, |v| match v.scalar() {
            Value::Error(e) => Value::Error(e.clone()),
            Value::Complex(c) => complex_value(Complex::new(-c.real, -c.imaginary)),
            other => match other.to_number() {
                Ok(n) => number_value(if n == 0.0 { 0.0 } else { -n }),
                Err(e) => Value::Error(e),
            },
        }),
        _ => {
            #[cfg(feature = "tracing")]
            tracing::warn!(operator, "unexpected unary operator");
            Value::error(ErrorCode::Expr)
        }
    }
}

/// Binary operator over two scalars. The left operand's error wins.
pub(crate) fn elemental(operator: &str, left: &Value, right: &Value) -> Value {
    if let Value::Error(e) = left.scalar() {
        return Value::Error(e.clone());
    }
    if let Value::Error(e) = right.scalar() {
        return Value::Error(e.clone());
    }
    match operator {
        "+" | "-" | "*" | "/" | "^" | "%" => arithmetic(operator, left, right),
        "&" => Value::Text(left.to_text() + &right.to_text()),
        "=" | "==" => Value::Boolean(loose_eq(left, right)),
        "<>" | "!=" | "!==" => Value::Boolean(!loose_eq(left, right)),
        "<" | ">" | "<=" | ">=" => {
            let ordering = compare(left, right);
            Value::Boolean(ordering.is_some_and(|o| match operator {
                "<" => o.is_lt(),
                ">" => o.is_gt(),
                "<=" => o.is_le(),
                _ => o.is_ge(),
            }))
        }
        _ => {
            #[cfg(feature = "tracing")]
            tracing::warn!(operator, "unexpected binary operator");
            Value::error(ErrorCode::Expr)
        }
    }
}

fn arithmetic(operator: &str, left: &Value, right: &Value) -> Value {
    let is_complex = |v: &Value| matches!(v.scalar(), Value::Complex(c) if !c.is_real());
    if operator != "%" && (is_complex(left) || is_complex(right)) {
        let (a, b) = match (left.to_complex(), right.to_complex()) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(e), _) | (_, Err(e)) => return Value::Error(e),
        };
        let out = match operator {
            "+" => a.add(&b),
            "-" => a.sub(&b),
            "*" => a.mul(&b),
            "/" => match a.div(&b) {
                Some(c) => c,
                None => return Value::error(ErrorCode::Div0),
            },
            _ => a.powc(&b),
        };
        return complex_value(out);
    }

    let (a, b) = match (left.to_number(), right.to_number()) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return Value::Error(e),
    };
    match operator {
        "+" => number_value(a + b),
        "-" => number_value(a - b),
        "*" => number_value(a * b),
        "/" | "%" if b == 0.0 => Value::error(ErrorCode::Div0),
        "/" => number_value(a / b),
        "%" => number_value(a % b),
        _ => number_value(a.powf(b)),
    }
}
