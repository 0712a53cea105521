//! Dependency graph and forward-propagating recalculation.
//!
//! Marking a cell dirty marks everything downstream of it dirty as well. A
//! pass then pulls dirty vertices off a work queue: a vertex whose inputs
//! are all clean is calculated, marked clean, and queues its dependents; a
//! vertex with a dirty input is skipped and picked up again when that input
//! finishes. No topological sort is needed, and every vertex is calculated
//! once per pass.

use std::collections::VecDeque;

use gridcalc_common::{Area, CellAddress, ErrorCode, Value};
use rustc_hash::{FxHashMap, FxHashSet};

use super::vertex::{DependencySet, Vertex, VertexId};

/// DFS colors used by [`Graph::loop_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Gray,
    Black,
}

/// What the calculator reports for one formula vertex.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalculationResult {
    pub value: Value,
    pub volatile: bool,
    /// Replacement dependencies. When set the result is discarded and the
    /// vertex waits for its new inputs.
    pub rebuild: Option<DependencySet>,
}

/// Callbacks a recalculation pass drives. Implemented by the engine over
/// its cell store.
pub trait VertexHandler {
    fn calculate(&mut self, vertex: &Vertex) -> CalculationResult;

    /// Current value of a vertex without a formula.
    fn reference_value(&self, address: CellAddress) -> Value;

    /// Writes a formula result, or error, into its cell.
    fn store(&mut self, address: CellAddress, value: &Value);

    /// Writes an array head's result over its area.
    fn spread(&mut self, vertex: &Vertex, value: &Value);
}

/// Counters from one recalculation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassStats {
    pub calculated: usize,
    pub loops: usize,
    pub rebuilds: usize,
    /// The step limit was reached and some vertices are still dirty.
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct Graph {
    vertices: Vec<Vertex>,
    free: Vec<VertexId>,
    by_address: FxHashMap<CellAddress, VertexId>,
    area_listeners: Vec<(Area, VertexId)>,
    pub(crate) volatile_list: Vec<VertexId>,
    dirty_list: Vec<VertexId>,
    loops_stale: bool,
    pub(crate) max_short_circuit_retries: u32,
    pub(crate) iterate_loop_limit: usize,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            free: Vec::new(),
            by_address: FxHashMap::default(),
            area_listeners: Vec::new(),
            volatile_list: Vec::new(),
            dirty_list: Vec::new(),
            loops_stale: true,
            max_short_circuit_retries: 8,
            iterate_loop_limit: 1_000_000,
        }
    }

    /* ─────────────────────────── Lookup ─────────────────────────── */

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.as_index()).filter(|v| v.live)
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(id.as_index()).filter(|v| v.live)
    }

    pub fn vertex_id(&self, address: CellAddress) -> Option<VertexId> {
        self.by_address.get(&address).copied()
    }

    pub fn vertex_at(&self, address: CellAddress) -> Option<&Vertex> {
        self.vertex_id(address).and_then(|id| self.vertex(id))
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.by_address.values().copied()
    }

    pub fn dirty_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.live && v.dirty).count()
    }

    /* ───────────────────────── Vertex lifecycle ─────────────────── */

    /// A new vertex starts clean and is wired to every area listener that
    /// covers its address.
    pub fn get_or_create_vertex(&mut self, address: CellAddress) -> VertexId {
        if let Some(id) = self.vertex_id(address) {
            return id;
        }
        let id = match self.free.pop() {
            Some(id) => {
                self.vertices[id.as_index()] = Vertex::new(address);
                id
            }
            None => {
                self.vertices.push(Vertex::new(address));
                VertexId::new(self.vertices.len() - 1)
            }
        };
        self.by_address.insert(address, id);
        let listeners: Vec<VertexId> = self
            .area_listeners
            .iter()
            .filter(|(area, _)| area.contains(address))
            .map(|(_, listener)| *listener)
            .collect();
        for listener in listeners {
            self.add_edge(id, listener);
        }
        id
    }

    /// Unlinks the vertex and frees its slot.
    pub fn remove_vertex(&mut self, address: CellAddress) {
        let Some(id) = self.by_address.remove(&address) else {
            return;
        };
        self.reset(id);
        self.volatile_list.retain(|v| *v != id);
        self.dirty_list.retain(|v| *v != id);
        self.vertices[id.as_index()] = Vertex::default();
        self.free.push(id);
    }

    /* ─────────────────────────── Edges ──────────────────────────── */

    /// `to` depends on `from`. Both sides are updated; duplicates are
    /// ignored.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId) {
        if self.vertex(from).is_none() || self.vertex(to).is_none() {
            return;
        }
        let out = &mut self.vertices[from.as_index()].edges_out;
        if out.contains(&to) {
            return;
        }
        out.push(to);
        self.vertices[to.as_index()].edges_in.push(from);
        self.loops_stale = true;
    }

    pub fn remove_edge(&mut self, from: VertexId, to: VertexId) {
        if let Some(v) = self.vertex_mut(from) {
            v.edges_out.retain(|e| *e != to);
        }
        if let Some(v) = self.vertex_mut(to) {
            v.edges_in.retain(|e| *e != from);
        }
        self.loops_stale = true;
    }

    /// Drops every inbound edge and area listener of `id`.
    pub fn clear_dependencies(&mut self, id: VertexId) {
        let Some(vertex) = self.vertex_mut(id) else {
            return;
        };
        let inbound = std::mem::take(&mut vertex.edges_in);
        vertex.dependencies = DependencySet::default();
        for from in inbound {
            if let Some(v) = self.vertex_mut(from) {
                v.edges_out.retain(|e| *e != id);
            }
        }
        self.area_listeners.retain(|(_, listener)| *listener != id);
        self.loops_stale = true;
    }

    /// Drops every edge of `id` in both directions.
    pub fn reset(&mut self, id: VertexId) {
        self.clear_dependencies(id);
        let Some(vertex) = self.vertex_mut(id) else {
            return;
        };
        let outbound = std::mem::take(&mut vertex.edges_out);
        for to in outbound {
            if let Some(v) = self.vertex_mut(to) {
                v.edges_in.retain(|e| *e != id);
            }
        }
    }

    /// Rewires `id` to read exactly `dependencies`, then marks it dirty.
    pub fn replace_dependencies(&mut self, id: VertexId, dependencies: DependencySet) {
        self.clear_dependencies(id);
        for cell in &dependencies.cells {
            let from = self.get_or_create_vertex(*cell);
            self.add_edge(from, id);
        }
        for area in &dependencies.areas {
            let inside: Vec<VertexId> = self
                .by_address
                .iter()
                .filter(|(address, _)| area.contains(**address))
                .map(|(_, v)| *v)
                .collect();
            for from in inside {
                self.add_edge(from, id);
            }
            self.area_listeners.push((area.clone(), id));
        }
        if let Some(vertex) = self.vertex_mut(id) {
            vertex.dependencies = dependencies;
        }
        self.mark_dirty(id);
    }

    /* ─────────────────────────── Dirty state ────────────────────── */

    /// Marks `id` and everything downstream of it dirty.
    pub(crate) fn mark_dirty(&mut self, id: VertexId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(vertex) = self.vertex_mut(id) else {
                continue;
            };
            if vertex.dirty {
                continue;
            }
            vertex.dirty = true;
            stack.extend(vertex.edges_out.iter().copied());
            self.dirty_list.push(id);
        }
    }

    /// A cell changed: its vertex and every listener of an area holding it
    /// go dirty.
    pub fn set_dirty(&mut self, address: CellAddress) {
        if let Some(id) = self.vertex_id(address) {
            self.mark_dirty(id);
        }
        let listeners: Vec<VertexId> = self
            .area_listeners
            .iter()
            .filter(|(area, _)| area.contains(address))
            .map(|(_, id)| *id)
            .collect();
        for id in listeners {
            self.mark_dirty(id);
        }
    }

    /// Volatile vertices from the last pass are recalculated on the next.
    pub fn mark_volatile_dirty(&mut self) {
        for id in std::mem::take(&mut self.volatile_list) {
            self.mark_dirty(id);
        }
    }

    /* ─────────────────────────── Loops ──────────────────────────── */

    /// Whether `id` lies on a cycle: an iterative three-color DFS over
    /// dependents that succeeds when it reaches `id` again.
    pub fn loop_check(&self, id: VertexId) -> bool {
        let mut colors: FxHashMap<VertexId, Color> = FxHashMap::default();
        let mut stack: Vec<(VertexId, usize)> = vec![(id, 0)];
        colors.insert(id, Color::Gray);
        while let Some((current, next)) = stack.pop() {
            let edges = match self.vertex(current) {
                Some(v) => &v.edges_out,
                None => continue,
            };
            let Some(&to) = edges.get(next) else {
                colors.insert(current, Color::Black);
                continue;
            };
            stack.push((current, next + 1));
            if to == id {
                return true;
            }
            if colors.get(&to).copied().unwrap_or(Color::White) == Color::White {
                colors.insert(to, Color::Gray);
                stack.push((to, 0));
            }
        }
        false
    }

    /// Every vertex currently on a cycle.
    pub fn loop_members(&self) -> FxHashSet<VertexId> {
        self.ids().filter(|id| self.loop_check(*id)).collect()
    }

    fn refresh_loop_state(&mut self) {
        if self.loops_stale {
            for vertex in &mut self.vertices {
                vertex.loop_checked = false;
                vertex.in_loop = false;
            }
            self.loops_stale = false;
        }
    }

    /* ─────────────────────────── Recalculation ──────────────────── */

    /// Calculates every dirty vertex once.
    pub fn recalculate(&mut self, handler: &mut dyn VertexHandler) -> PassStats {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("recalculate", dirty = self.dirty_list.len()).entered();

        let mut stats = PassStats::default();
        let mut queue: VecDeque<VertexId> = std::mem::take(&mut self.dirty_list).into();
        for id in &queue {
            if let Some(v) = self.vertex_mut(*id) {
                v.retries = 0;
            }
        }

        let mut steps = 0usize;
        while let Some(id) = queue.pop_front() {
            steps += 1;
            if steps > self.iterate_loop_limit {
                #[cfg(feature = "tracing")]
                tracing::warn!(limit = self.iterate_loop_limit, "recalculation step limit reached");
                stats.truncated = true;
                // waiting vertices left the queue, so requeue by flag
                self.dirty_list = self
                    .vertices
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.live && v.dirty)
                    .map(|(i, _)| VertexId::new(i))
                    .collect();
                break;
            }
            self.calculate(id, handler, &mut queue, &mut stats);
        }
        stats
    }

    fn calculate(
        &mut self,
        id: VertexId,
        handler: &mut dyn VertexHandler,
        queue: &mut VecDeque<VertexId>,
        stats: &mut PassStats,
    ) {
        self.refresh_loop_state();
        let Some(vertex) = self.vertex(id) else {
            return;
        };
        if !vertex.dirty {
            return;
        }

        if !vertex.loop_checked {
            let in_loop = self.loop_check(id);
            let vertex = &mut self.vertices[id.as_index()];
            vertex.loop_checked = true;
            vertex.in_loop = in_loop;
        }
        if self.vertices[id.as_index()].in_loop {
            #[cfg(feature = "tracing")]
            tracing::debug!(address = %self.vertices[id.as_index()].address, "circular reference");
            stats.loops += 1;
            self.fail(id, ErrorCode::Loop, handler, queue);
            return;
        }

        let vertex = &self.vertices[id.as_index()];
        let waiting = vertex
            .edges_in
            .iter()
            .any(|e| self.vertex(*e).is_some_and(|v| v.dirty));
        if waiting {
            return;
        }

        let value = if vertex.expression.is_some() {
            let result = handler.calculate(vertex);
            if let Some(dependencies) = result.rebuild {
                stats.rebuilds += 1;
                let retries = {
                    let vertex = &mut self.vertices[id.as_index()];
                    vertex.short_circuit = true;
                    vertex.retries += 1;
                    vertex.retries
                };
                if retries > self.max_short_circuit_retries {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(retries, "dependency rebuild limit reached");
                    self.fail(id, ErrorCode::Loop, handler, queue);
                    return;
                }
                #[cfg(feature = "tracing")]
                tracing::debug!(address = %self.vertices[id.as_index()].address, "rebuilding dependencies");
                self.replace_dependencies(id, dependencies);
                // picked up again once the new inputs settle
                self.dirty_list.retain(|v| *v != id);
                queue.push_back(id);
                return;
            }
            let vertex = &mut self.vertices[id.as_index()];
            vertex.short_circuit = false;
            vertex.volatile = result.volatile;
            if result.volatile {
                self.volatile_list.push(id);
            }
            result.value
        } else {
            handler.reference_value(vertex.address)
        };

        stats.calculated += 1;
        let vertex = &self.vertices[id.as_index()];
        if vertex.array_area.is_some() {
            handler.spread(vertex, &value);
        } else if vertex.expression.is_some() {
            handler.store(vertex.address, &value);
        }
        self.settle(id, value, queue);
    }

    /// Stores an error for a formula vertex and moves on as if it had
    /// calculated.
    fn fail(
        &mut self,
        id: VertexId,
        code: ErrorCode,
        handler: &mut dyn VertexHandler,
        queue: &mut VecDeque<VertexId>,
    ) {
        let error = Value::error(code);
        let vertex = &self.vertices[id.as_index()];
        if vertex.array_area.is_some() {
            handler.spread(vertex, &error);
        } else if vertex.expression.is_some() {
            handler.store(vertex.address, &error);
        }
        self.settle(id, error, queue);
    }

    fn settle(&mut self, id: VertexId, value: Value, queue: &mut VecDeque<VertexId>) {
        let vertex = &mut self.vertices[id.as_index()];
        vertex.result = value;
        vertex.dirty = false;
        queue.extend(vertex.edges_out.iter().copied());
    }
}
