//! FILENAME: app/src/pivot/commands.rs
//! PURPOSE: Commands for the field catalog and pivot table operations.
//! CONTEXT: Each command locks the state it needs, converts string-typed
//! requests against the current catalog and recomputes the pivot on demand.
//! Errors are returned as user-facing messages.

use std::time::Instant;

use engine::{Field, Record};
use parser::extract_dependencies;
use uuid::Uuid;

use crate::pivot::types::*;
use crate::pivot::utils::*;
use crate::{log_debug, log_info, log_warn, AppState};

// ============================================================================
// DATA
// ============================================================================

/// Replaces the record set the pivot is computed from
pub fn load_records(state: &AppState, records: Vec<Record>) -> Result<usize, String> {
    let count = records.len();
    let mut current = state.records.lock().map_err(|e| e.to_string())?;
    *current = records;
    log_info!("PIVOT", "load_records count={}", count);
    Ok(count)
}

// ============================================================================
// FIELD CATALOG
// ============================================================================

/// Base fields in declaration order, then calculated fields in creation order
pub fn get_available_fields(state: &AppState) -> Result<Vec<Field>, String> {
    let catalog = state.catalog.lock().map_err(|e| e.to_string())?;
    Ok(catalog.list_fields().cloned().collect())
}

/// Parses the formula against the current catalog and registers a new
/// calculated field with a generated id
pub fn add_calculated_field(
    state: &AppState,
    request: CalculatedFieldRequest,
) -> Result<Field, String> {
    log_info!(
        "CATALOG",
        "add_calculated_field name={} formula={}",
        request.name,
        request.formula
    );

    let name = request.name.trim();
    if name.is_empty() {
        return Err("Calculated field name cannot be empty".to_string());
    }

    let id = format!("calc_{}", Uuid::new_v4());
    let mut catalog = state.catalog.lock().map_err(|e| e.to_string())?;
    let field = catalog
        .create_calculated_field(id, name, request.formula.trim())
        .map_err(|e| e.to_string())?;
    Ok(field.clone())
}

/// Removes a calculated field. Pivot configs still naming it fail on the
/// next update or data request.
pub fn remove_calculated_field(state: &AppState, field_id: String) -> Result<Field, String> {
    log_info!("CATALOG", "remove_calculated_field id={}", field_id);
    let mut catalog = state.catalog.lock().map_err(|e| e.to_string())?;
    catalog.remove(&field_id).map_err(|e| e.to_string())
}

/// Checks a formula against the current catalog without registering it
pub fn validate_formula(state: &AppState, formula: String) -> Result<FormulaValidation, String> {
    let catalog = state.catalog.lock().map_err(|e| e.to_string())?;
    let validation = match parser::parse(formula.trim(), &*catalog) {
        Ok(expr) => FormulaValidation {
            valid: true,
            error: None,
            dependencies: extract_dependencies(&expr).into_iter().collect(),
        },
        Err(e) => FormulaValidation {
            valid: false,
            error: Some(e.to_string()),
            dependencies: Vec::new(),
        },
    };
    log_debug!(
        "FORMULA",
        "validate_formula '{}' valid={}",
        formula,
        validation.valid
    );
    Ok(validation)
}

// ============================================================================
// PIVOT
// ============================================================================

/// Validates the layout against the catalog and makes it the current one
pub fn update_pivot_config(state: &AppState, request: PivotRequest) -> Result<(), String> {
    log_info!(
        "PIVOT",
        "update_pivot_config rows={:?} column={:?} measures={} filters={}",
        request.row_fields,
        request.column_field,
        request.measures.len(),
        request.filters.len()
    );

    {
        let catalog = state.catalog.lock().map_err(|e| e.to_string())?;
        build_pivot_config(&catalog, &request).map_err(|e| e.to_string())?;
    }

    let mut current = state.pivot_request.lock().map_err(|e| e.to_string())?;
    *current = request;
    Ok(())
}

pub fn get_pivot_config(state: &AppState) -> Result<PivotRequest, String> {
    let current = state.pivot_request.lock().map_err(|e| e.to_string())?;
    Ok(current.clone())
}

/// Computes the pivot for the current records and layout
pub fn get_pivot_data(state: &AppState) -> Result<PivotResponse, String> {
    let start = Instant::now();

    let catalog = state.catalog.lock().map_err(|e| e.to_string())?;
    let request = state.pivot_request.lock().map_err(|e| e.to_string())?;
    let records = state.records.lock().map_err(|e| e.to_string())?;

    let config = build_pivot_config(&catalog, &request).map_err(|e| e.to_string())?;
    let result = pivot_engine::aggregate(&records, &config).map_err(|e| e.to_string())?;

    if result.has_faults() {
        log_warn!(
            "PIVOT",
            "get_pivot_data: {} measure cell(s) could not be computed",
            result.faults.len()
        );
    }

    let expanded = expanded_paths(&request);
    let response = result_to_response(&result, &config, expanded.as_ref());

    log_info!(
        "PIVOT",
        "get_pivot_data records={} rows={} skipped={} in {:?}",
        response.record_count,
        response.rows.len(),
        response.data_errors.len(),
        start.elapsed()
    );
    Ok(response)
}

/// Source records of the row at `path` (group keys, outermost first)
pub fn drill_down(state: &AppState, path: Vec<String>) -> Result<Vec<Record>, String> {
    let catalog = state.catalog.lock().map_err(|e| e.to_string())?;
    let request = state.pivot_request.lock().map_err(|e| e.to_string())?;
    let records = state.records.lock().map_err(|e| e.to_string())?;

    let config = build_pivot_config(&catalog, &request).map_err(|e| e.to_string())?;
    let matched = pivot_engine::drill_down(&records, &config, &path).map_err(|e| e.to_string())?;
    log_debug!("PIVOT", "drill_down path={:?} records={}", path, matched.len());
    Ok(matched.into_iter().cloned().collect())
}
