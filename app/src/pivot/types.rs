//! FILENAME: app/src/pivot/types.rs
use std::collections::BTreeMap;

use engine::FieldValue;
use serde::{Deserialize, Serialize};

// ============================================================================
// REQUESTS
// ============================================================================

/// Pivot layout as sent by a client. Fields are named by id or display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotRequest {
    /// Row fields, outermost first
    #[serde(default)]
    pub row_fields: Vec<String>,
    /// Optional column field for cross-tabulation
    #[serde(default)]
    pub column_field: Option<String>,
    /// Measures in display order
    #[serde(default)]
    pub measures: Vec<MeasureRequest>,
    /// Record filters, combined with AND
    #[serde(default)]
    pub filters: Vec<FilterRequest>,
    /// Group-key paths whose children are listed in `flatRows`.
    /// When None, the response carries the tree only.
    #[serde(default)]
    pub expanded: Option<Vec<Vec<String>>>,
}

/// A measure placed in the pivot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureRequest {
    pub field: String,
    /// Aggregation type: "sum", "count", "avg", "min", "max", "distinctCount".
    /// Defaults to the field's own aggregation.
    #[serde(default)]
    pub aggregation: Option<String>,
}

impl MeasureRequest {
    pub fn new(field: impl Into<String>) -> Self {
        MeasureRequest {
            field: field.into(),
            aggregation: None,
        }
    }
}

/// A record filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    pub field: String,
    /// "equals", "notEquals", "contains", "greaterThan", "lessThan", "between", "in"
    pub operator: String,
    /// Operand of single-value operators and lower bound of "between"
    #[serde(default)]
    pub value: Option<FieldValue>,
    /// Upper bound of "between"
    #[serde(default)]
    pub value_to: Option<FieldValue>,
    /// Operands of "in"
    #[serde(default)]
    pub values: Option<Vec<FieldValue>>,
}

/// Request to create a calculated field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedFieldRequest {
    /// Display name, also usable in other formulas as [Name]
    pub name: String,
    pub formula: String,
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Outcome of checking a formula without registering it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaValidation {
    pub valid: bool,
    pub error: Option<String>,
    /// Field ids the formula references, sorted
    pub dependencies: Vec<String>,
}

/// One pivot row as sent to a client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotRowData {
    pub group_key: String,
    pub label: String,
    pub depth: usize,
    pub record_count: usize,
    pub measure_values: BTreeMap<String, f64>,
    pub cross_tab_values: BTreeMap<String, f64>,
    pub children: Vec<PivotRowData>,
}

/// A row in display order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRowData {
    pub path: Vec<String>,
    pub label: String,
    pub depth: usize,
    pub has_children: bool,
    pub is_expanded: bool,
    pub measure_values: BTreeMap<String, f64>,
    pub cross_tab_values: BTreeMap<String, f64>,
}

/// A measure that could not be computed for one cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultData {
    /// Group keys of the row; empty for the grand total
    pub row_path: Vec<String>,
    pub column: Option<String>,
    pub measure_id: String,
    pub message: String,
}

/// Response for pivot data requests
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotResponse {
    pub rows: Vec<PivotRowData>,
    pub grand_total: BTreeMap<String, f64>,
    pub column_totals: BTreeMap<String, f64>,
    pub column_values: Vec<String>,
    /// Measure ids in display order
    pub measure_ids: Vec<String>,
    pub record_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flat_rows: Option<Vec<FlatRowData>>,
    pub faults: Vec<FaultData>,
    /// Messages for records skipped because their data could not be read
    pub data_errors: Vec<String>,
}
