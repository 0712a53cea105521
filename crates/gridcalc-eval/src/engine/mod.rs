//! Incremental recalculation: cell edits feed a dependency graph, and each
//! pass recalculates only what changed.

pub mod eval;
pub mod graph;
pub mod vertex;

#[cfg(test)]
mod tests;

pub use eval::{Engine, EvalResult};
pub use graph::{CalculationResult, Color, Graph, PassStats, VertexHandler};
pub use vertex::{DependencySet, Vertex, VertexId};

use gridcalc_common::{AddressError, Area, CellAddress};
use gridcalc_parse::{DecimalMark, ParseError, ParserConfig};
use thiserror::Error;

use crate::simulation::PackError;

/// Engine settings. The defaults suit interactive use.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    /// Decimal mark for parsing and rendering; the argument separator
    /// follows from it.
    pub locale: DecimalMark,
    /// Dependency rebuilds allowed per vertex and pass before the vertex is
    /// reported as a loop.
    pub max_short_circuit_retries: u32,
    /// Seed for `RAND` and friends. `None` seeds from the clock.
    pub rng_seed: Option<u64>,
    /// Work-queue steps per pass.
    pub iterate_loop_limit: usize,
    /// References qualified with another sheet name are `#REF`.
    pub sheet_name: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            locale: DecimalMark::Period,
            max_short_circuit_retries: 8,
            rng_seed: None,
            iterate_loop_limit: 1_000_000,
            sheet_name: "Sheet1".to_string(),
        }
    }
}

impl EvalConfig {
    pub fn with_locale(mut self, locale: DecimalMark) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_max_short_circuit_retries(mut self, retries: u32) -> Self {
        self.max_short_circuit_retries = retries;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_iterate_loop_limit(mut self, limit: usize) -> Self {
        self.iterate_loop_limit = limit;
        self
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig::for_decimal_mark(self.locale)
    }
}

/// Structural failures. Calculation errors are values and never show up
/// here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("area {0} is unbounded")]
    UnboundedArea(Area),
    #[error("cell {0} is part of an array; edit the whole array from its first cell")]
    ArrayMember(CellAddress),
    #[error("array area {0} overlaps an existing array")]
    ArrayOverlap(Area),
    #[error("formula does not parse: {0}")]
    Parse(#[from] ParseError),
    #[error("simulation refused: {0} cells are on circular references")]
    CircularReference(usize),
    #[error("inserting {0} rows or columns pushes cells past the edge of the sheet")]
    OutOfBounds(u32),
    #[error("no simulation is running")]
    SimulationInactive,
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Pack(#[from] PackError),
}
