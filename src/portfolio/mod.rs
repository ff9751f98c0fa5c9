//! Portfolio construction
//!
//! - `exposure`: leverage tiers to per-player target exposure
//! - `constructor`: greedy archetype selection, tolerance relaxation, repair
//! - `metrics`: summary metrics and slot-ordered export rows

pub mod constructor;
pub mod exposure;
pub mod metrics;

pub use constructor::{similarity_distance, Construction, PortfolioConstructor};
pub use exposure::{ExposureTarget, ExposureTiers};
pub use metrics::{export_rows, ExportRow, ExportSlot, PortfolioMetrics};
