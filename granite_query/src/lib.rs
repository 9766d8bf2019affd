//! # Granite Query Support
//! Planner-side statistics (histograms, per-table stats) and the streaming
//! aggregation operators for the Granite database. Storage access goes
//! through the `mantle` engine crate.

/// Streaming grouped aggregation.
pub mod aggregate;
/// Equi-width histograms for selectivity estimation.
pub mod histogram;
/// Predicate comparison operators.
pub mod predicate;
/// Per-table statistics and the process-wide registry.
pub mod stats;

pub use aggregate::{AggregateIterator, AggregateOp, Aggregator, IntegerAggregator, StringAggregator};
pub use histogram::{IntHistogram, StringHistogram};
pub use predicate::Op;
pub use stats::TableStats;
