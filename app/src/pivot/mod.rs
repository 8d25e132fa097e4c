//! FILENAME: app/src/pivot/mod.rs
pub mod commands;
pub mod types;
pub mod utils;

pub use commands::*;
pub use types::*;
pub use utils::build_pivot_config;
