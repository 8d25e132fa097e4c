//! FILENAME: app/src/lib.rs
// PURPOSE: Host layer over the field catalog and the pivot engine.
// CONTEXT: Holds the application state (catalog, records, current layout)
// and exposes it through the command functions in `pivot`.

use std::sync::Mutex;

use engine::{FieldCatalog, Record};

pub mod error;
pub mod fixtures;
pub mod logging;
pub mod pivot;

pub use error::AppError;
pub use logging::{init, init_log_file, next_seq, write_log};
pub use pivot::*;

/// Shared state behind every command
pub struct AppState {
    pub catalog: Mutex<FieldCatalog>,
    pub records: Mutex<Vec<Record>>,
    /// The current layout, kept string-typed so it is re-resolved against
    /// the catalog on every request
    pub pivot_request: Mutex<PivotRequest>,
}

pub fn create_app_state() -> AppState {
    log_info!("SYS", "Creating AppState");
    AppState {
        catalog: Mutex::new(FieldCatalog::financial()),
        records: Mutex::new(Vec::new()),
        pivot_request: Mutex::new(fixtures::default_pivot_request()),
    }
}
