//! A distributed, coordinate-based graph partitioner.
//!
//! Given a graph whose vertices carry `d`-dimensional spatial coordinates
//! and are already distributed across `P` ranks, [`coordinate_partition`]
//! assigns every vertex to one of `P` parts such that spatially close
//! vertices co-locate and every part receives a near-equal share of
//! vertices.
//!
//! The work happens in two stages, run once per coordinate axis and then
//! once globally:
//!
//! 1. [`bin_boundary`] turns each real-valued coordinate axis into a
//!    globally-consistent integer bin index via iterative histogram
//!    refinement (or, as an alternative strategy, recursive bisection).
//! 2. [`zorder`] interleaves the per-axis bin indices into a single
//!    Z-order integer key, and [`sample_sort`] sorts the resulting
//!    `(key, vertex id)` records across ranks with a distributed sample
//!    sort, deriving a balanced partition label for every vertex.
//!
//! All cross-rank coordination goes through the [`messaging`] substrate,
//! a thin abstraction over bulk-synchronous collectives and
//! point-to-point message passing. [`partition::coordinate_partition`] is
//! the entry point; everything else is a building block it calls.

pub mod arena;
pub mod bin_boundary;
pub mod config;
pub mod error;
pub mod messaging;
pub mod partition;
pub mod sample_sort;
pub mod zorder;

pub use config::PartitionConfig;
pub use error::PartitionError;
pub use messaging::{execute, Communicator, ProcessCommunicator};
pub use partition::{coordinate_partition, Ctrl, Graph};
