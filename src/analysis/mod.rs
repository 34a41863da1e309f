//! Analysis modules.
//!
//! Pure computations over loaded records: accuracy tables and the
//! confidence/refusal statistic.

pub mod aggregator;
pub mod confidence;

pub use aggregator::*;
pub use confidence::{logit_info, RefusalRule};
