//! FILENAME: core/pivot-engine/src/lib.rs
//! Pivot aggregation subsystem.
//!
//! This crate turns flat records and a pivot configuration into a
//! hierarchical, cross-tabulated result with grand totals. It depends on
//! `engine` for the record model, the field catalog and formula evaluation.
//!
//! Layers:
//! - `definition`: Configuration and filters (what the pivot IS)
//! - `engine`: Recursive grouping and aggregation (HOW we calculate)
//! - `view`: Hierarchical result, drill-down and flattening (WHAT we display)

pub mod definition;
pub mod engine;
pub mod view;

pub use definition::*;
pub use self::engine::{aggregate, drill_down};
pub use view::*;
