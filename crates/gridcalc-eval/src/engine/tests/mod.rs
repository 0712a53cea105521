mod common;

mod convergence;
mod dirty_propagation;
mod dynamic_dependencies;
mod named_ranges;
mod simulation;
mod structure;
mod volatile;
