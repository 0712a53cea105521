use gridcalc_common::{Area, CellAddress, Value};
use gridcalc_parse::ExpressionUnit;
use smallvec::SmallVec;

/// Index of a vertex in the graph arena.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct VertexId(pub(crate) u32);

impl VertexId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }
}

pub(crate) type Edges = SmallVec<[VertexId; 4]>;

/// What a formula reads: single cells become edges, areas become
/// listeners that also pick up vertices created inside them later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencySet {
    pub cells: Vec<CellAddress>,
    pub areas: Vec<Area>,
}

impl DependencySet {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.areas.is_empty()
    }

    /// Whether reading `area` is already accounted for.
    pub fn covers(&self, area: &Area) -> bool {
        if let (Some(cell), Some((1, 1))) = (area.top_left(), area.size()) {
            if self.cells.contains(&cell) {
                return true;
            }
        }
        self.areas.iter().any(|outer| {
            match (area.start.to_cell(), area.end.to_cell()) {
                (Some(start), Some(end)) => outer.contains(start) && outer.contains(end),
                _ => outer.start.position_eq(&area.start) && outer.end.position_eq(&area.end),
            }
        })
    }
}

/// One calculating cell.
///
/// A vertex exists for every formula cell, every member of an array
/// formula, and every cell some formula reads directly. Slots of removed
/// vertices are recycled, so `live` is checked before use.
#[derive(Debug, Clone, Default)]
pub struct Vertex {
    pub address: CellAddress,
    /// Dependencies.
    pub(crate) edges_in: Edges,
    /// Dependents.
    pub(crate) edges_out: Edges,
    pub(crate) live: bool,
    pub(crate) dirty: bool,
    /// Parsed formula. `None` for value cells and array members, which
    /// take their value from the cell.
    pub(crate) expression: Option<ExpressionUnit>,
    pub(crate) result: Value,
    pub(crate) short_circuit: bool,
    pub(crate) volatile: bool,
    /// Loop membership, valid while `loop_checked` is set.
    pub(crate) loop_checked: bool,
    pub(crate) in_loop: bool,
    /// Set on the head of an array formula.
    pub(crate) array_area: Option<Area>,
    pub(crate) dependencies: DependencySet,
    /// Dependency rebuilds during the current pass.
    pub(crate) retries: u32,
}

impl Vertex {
    pub(crate) fn new(address: CellAddress) -> Self {
        Self {
            address,
            live: true,
            ..Self::default()
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_formula(&self) -> bool {
        self.expression.is_some()
    }

    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    pub fn is_array_head(&self) -> bool {
        self.array_area.is_some()
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn expression(&self) -> Option<&ExpressionUnit> {
        self.expression.as_ref()
    }

    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    pub fn edges_in(&self) -> &[VertexId] {
        &self.edges_in
    }

    pub fn edges_out(&self) -> &[VertexId] {
        &self.edges_out
    }
}
