//! Monte-Carlo simulation state, trial-data packing, and worker message
//! shapes.
//!
//! A simulation runs in three phases:
//! - **Prep**: one recalculation during which collector arguments register
//!   the cells whose values are sampled
//! - **Simulation**: one recalculation per trial; volatile and
//!   simulation-volatile cells recompute, registered cells are recorded
//! - **Null**: normal operation; collector arguments read the recorded
//!   samples
//!
//! Samples travel between workers as flat `f64` buffers, one block per cell:
//! `[column, row, count, ...samples]`.

use std::collections::BTreeMap;

use chrono::Utc;
use gridcalc_common::{CellAddress, Value};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::traits::Collector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ───────────────────────────── State ───────────────────────────── */

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SimulationState {
    #[default]
    Null,
    Prep,
    Simulation,
}

/// Seeded generator plus per-cell sample storage.
#[derive(Debug, Clone)]
pub struct SimulationModel {
    pub state: SimulationState,
    pub iteration: usize,
    pub iterations: usize,
    seed: u64,
    rng: SmallRng,
    results: BTreeMap<CellAddress, Vec<f64>>,
}

impl Default for SimulationModel {
    fn default() -> Self {
        Self::new(None)
    }
}

fn clock_seed() -> u64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64
}

impl SimulationModel {
    /// Without a seed the generator is seeded from the clock.
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(clock_seed);
        Self {
            state: SimulationState::Null,
            iteration: 0,
            iterations: 0,
            seed,
            rng: SmallRng::seed_from_u64(seed),
            results: BTreeMap::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Uniform sample in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.rng.r#gen()
    }

    pub fn is_active(&self) -> bool {
        self.state != SimulationState::Null
    }

    /// Clears recorded samples and sizes storage for a new run.
    pub fn begin(&mut self, iterations: usize) {
        self.iterations = iterations;
        self.iteration = 0;
        self.results.clear();
    }

    /// Stores one trial's value for a registered cell. Numbers are kept,
    /// booleans become 0 or 1, anything else records 0.
    pub fn record(&mut self, address: CellAddress, iteration: usize, value: &Value) {
        let sample = match value.scalar() {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            _ => 0.0,
        };
        if let Some(samples) = self.results.get_mut(&address) {
            if samples.len() <= iteration {
                samples.resize(iteration + 1, 0.0);
            }
            samples[iteration] = sample;
        }
    }

    pub fn watched(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.results.keys().copied()
    }

    pub fn results(&self) -> &BTreeMap<CellAddress, Vec<f64>> {
        &self.results
    }

    pub fn set_results(&mut self, results: BTreeMap<CellAddress, Vec<f64>>) {
        self.iterations = results.values().map(Vec::len).max().unwrap_or(0);
        self.results = results;
    }
}

impl Collector for SimulationModel {
    fn register(&mut self, address: CellAddress) {
        let iterations = self.iterations;
        self.results
            .entry(address)
            .or_insert_with(|| vec![0.0; iterations]);
    }

    fn collected(&self, address: CellAddress) -> Value {
        match self.results.get(&address) {
            Some(samples) => Value::column(samples.iter().map(|n| Value::Number(*n)).collect()),
            None => Value::Undefined,
        }
    }
}

/* ───────────────────────────── Packing ─────────────────────────── */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PackError {
    #[error("trial data block needs a 3-value header, got {0} values")]
    MissingHeader(usize),
    #[error("trial data header is not a valid cell position: column {column}, row {row}")]
    InvalidPosition { column: f64, row: f64 },
    #[error("trial data header has an invalid sample count: {0}")]
    InvalidCount(f64),
    #[error("trial data truncated: expected {expected} samples, found {found}")]
    Truncated { expected: usize, found: usize },
}

const HEADER: usize = 3;

pub fn pack_one(column: u32, row: u32, samples: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(HEADER + samples.len());
    out.push(column as f64);
    out.push(row as f64);
    out.push(samples.len() as f64);
    out.extend_from_slice(samples);
    out
}

fn header_index(v: f64) -> Option<u32> {
    (v.fract() == 0.0 && v >= 0.0 && v <= u32::MAX as f64).then_some(v as u32)
}

/// Reads one block, returning `(column, row, samples)` and the number of
/// values consumed.
fn unpack_block(data: &[f64]) -> Result<((u32, u32, Vec<f64>), usize), PackError> {
    if data.len() < HEADER {
        return Err(PackError::MissingHeader(data.len()));
    }
    let (column, row) = match (header_index(data[0]), header_index(data[1])) {
        (Some(c), Some(r)) => (c, r),
        _ => {
            return Err(PackError::InvalidPosition {
                column: data[0],
                row: data[1],
            });
        }
    };
    let count = header_index(data[2]).ok_or(PackError::InvalidCount(data[2]))? as usize;
    let body = &data[HEADER..];
    if body.len() < count {
        return Err(PackError::Truncated {
            expected: count,
            found: body.len(),
        });
    }
    Ok(((column, row, body[..count].to_vec()), HEADER + count))
}

pub fn unpack_one(data: &[f64]) -> Result<(u32, u32, Vec<f64>), PackError> {
    unpack_block(data).map(|(block, _)| block)
}

/// Concatenates one block per cell, in address order.
pub fn pack_results(results: &BTreeMap<CellAddress, Vec<f64>>) -> Vec<f64> {
    results
        .iter()
        .flat_map(|(address, samples)| pack_one(address.column, address.row, samples))
        .collect()
}

pub fn unpack_results(mut data: &[f64]) -> Result<BTreeMap<CellAddress, Vec<f64>>, PackError> {
    let mut out = BTreeMap::new();
    while !data.is_empty() {
        let ((column, row, samples), used) = unpack_block(data)?;
        out.insert(CellAddress::new(row, column), samples);
        data = &data[used..];
    }
    Ok(out)
}

/* ─────────────────────────── Worker messages ───────────────────── */

/// Messages exchanged with simulation workers. Only the shapes live here;
/// scheduling workers is up to the host.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    Configure {
        seed: Option<u64>,
        locale: String,
        serialized_sheets: Vec<String>,
        named_ranges: BTreeMap<String, String>,
        additional_cells: Vec<CellAddress>,
    },
    Start {
        trials: usize,
        lhs: bool,
        screen_updates: bool,
    },
    Progress {
        percent_complete: f64,
    },
    Update {
        percent_complete: f64,
        trial_data: Vec<f64>,
    },
    Complete {
        trial_data: Vec<f64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_one_layout() {
        let packed = pack_one(2, 7, &[1.5, 2.5]);
        assert_eq!(packed, vec![2.0, 7.0, 2.0, 1.5, 2.5]);
        assert_eq!(unpack_one(&packed), Ok((2, 7, vec![1.5, 2.5])));
    }

    #[test]
    fn truncated_buffers_are_rejected() {
        assert_eq!(unpack_one(&[1.0, 2.0]), Err(PackError::MissingHeader(2)));
        assert_eq!(
            unpack_one(&[0.0, 0.0, 4.0, 1.0]),
            Err(PackError::Truncated {
                expected: 4,
                found: 1
            })
        );
        assert!(matches!(
            unpack_one(&[0.5, 0.0, 0.0]),
            Err(PackError::InvalidPosition { .. })
        ));
        assert_eq!(unpack_one(&[0.0, 0.0, -1.0]), Err(PackError::InvalidCount(-1.0)));
    }

    #[test]
    fn multiple_cells_split_back_apart() {
        let mut results = BTreeMap::new();
        results.insert(CellAddress::new(0, 1), vec![1.0, 2.0, 3.0]);
        results.insert(CellAddress::new(4, 0), vec![]);
        results.insert(CellAddress::new(2, 2), vec![9.0]);
        let packed = pack_results(&results);
        assert_eq!(packed.len(), 3 * 3 + 4);
        assert_eq!(unpack_results(&packed), Ok(results));
        assert!(unpack_results(&packed[..packed.len() - 1]).is_err());
    }

    #[test]
    fn seeded_generator_is_reproducible() {
        let mut a = SimulationModel::new(Some(42));
        let mut b = SimulationModel::new(Some(42));
        let xs: Vec<f64> = (0..5).map(|_| a.random()).collect();
        let ys: Vec<f64> = (0..5).map(|_| b.random()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (0.0..1.0).contains(x)));
        b.reseed(42);
        assert_eq!(b.random(), xs[0]);
    }

    #[test]
    fn collector_records_registered_cells_only() {
        let mut model = SimulationModel::new(Some(1));
        model.begin(3);
        let watched = CellAddress::new(0, 0);
        model.register(watched);
        model.record(watched, 0, &Value::Number(4.0));
        model.record(watched, 1, &Value::Boolean(true));
        model.record(watched, 2, &Value::from("text"));
        model.record(CellAddress::new(9, 9), 0, &Value::Number(1.0));
        assert_eq!(
            model.collected(watched),
            Value::column(vec![4.0.into(), 1.0.into(), 0.0.into()])
        );
        assert_eq!(model.collected(CellAddress::new(9, 9)), Value::Undefined);
        assert_eq!(model.watched().count(), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn worker_messages_use_tagged_camel_case() {
        let msg = WorkerMessage::Update {
            percent_complete: 50.0,
            trial_data: pack_one(0, 0, &[1.0]),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["percentComplete"], 50.0);
        let back: WorkerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);

        let start = serde_json::json!({"type": "start", "trials": 1000, "lhs": false, "screenUpdates": true});
        assert_eq!(
            serde_json::from_value::<WorkerMessage>(start).unwrap(),
            WorkerMessage::Start {
                trials: 1000,
                lhs: false,
                screen_updates: true
            }
        );
    }
}
