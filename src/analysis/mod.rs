//! Analysis modules.
//!
//! Aggregation of applicable sub-areas, consistency checks over the
//! resulting rollups, and the display projections built on top of them.

pub mod aggregator;
pub mod consistency;
pub mod projection;

pub use aggregator::*;
pub use consistency::{check_summary, compare_summaries, ConsistencyError};
pub use projection::*;
