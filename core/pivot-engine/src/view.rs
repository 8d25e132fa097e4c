//! FILENAME: core/pivot-engine/src/view.rs
//! Pivot Result - The hierarchical output of one aggregation request.
//!
//! This module contains the structures produced by the engine:
//! - PivotRow: one group at one depth, owning its children by value
//! - PivotResult: top-level rows, grand totals and reported faults
//! - FlatRow: display-order walk honoring expand/collapse state
//!
//! Rows borrow the source records they were folded from; a result is
//! recomputed on every request and never patched.

use std::collections::{BTreeMap, HashSet};

use engine::{DataError, EvalError, FieldId, Record};
use serde::Serialize;
use smallvec::SmallVec;

/// Group keys from the outermost row dimension down to one row.
pub type GroupPath = SmallVec<[String; 4]>;

/// Key of a cross-tabulated value: `"<columnValue>::<measureId>"`.
///
/// Column values are free text and may themselves contain `::`; field ids may
/// not (`FieldCatalog::register` rejects them), so a key splits unambiguously
/// at its last separator.
pub fn cross_tab_key(column_value: &str, measure_id: &str) -> String {
    format!("{}::{}", column_value, measure_id)
}

/// Splits a cross-tab key back into `(column value, measure id)`.
pub fn split_cross_tab_key(key: &str) -> Option<(&str, &str)> {
    key.rsplit_once("::")
}

// ============================================================================
// ROWS
// ============================================================================

/// One group of the row hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotRow<'a> {
    /// Canonical key of this group's value for the row field at `depth`.
    pub group_key: String,
    pub label: String,
    pub depth: usize,
    /// Measure id -> value. A measure whose evaluation failed is absent
    /// and reported in `PivotResult::faults`.
    pub measure_values: BTreeMap<FieldId, f64>,
    /// `"<columnValue>::<measureId>"` -> value.
    pub cross_tab_values: BTreeMap<String, f64>,
    pub children: Vec<PivotRow<'a>>,
    /// The records folded into this row's subtree, in input order.
    #[serde(skip)]
    pub source_records: Vec<&'a Record>,
}

impl<'a> PivotRow<'a> {
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.source_records.len()
    }

    /// Finds a direct child by group key.
    pub fn child(&self, group_key: &str) -> Option<&PivotRow<'a>> {
        self.children.iter().find(|c| c.group_key == group_key)
    }
}

// ============================================================================
// FAULTS
// ============================================================================

/// A measure that could not be computed for one cell of the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureFault {
    /// Group keys of the failing row; empty for the grand total.
    pub row_path: GroupPath,
    /// Column value when the failure is in a cross-tabulated cell.
    pub column: Option<String>,
    pub measure_id: FieldId,
    pub error: EvalError,
}

// ============================================================================
// RESULT
// ============================================================================

/// The complete output of one pivot request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotResult<'a> {
    pub rows: Vec<PivotRow<'a>>,
    /// Measure id -> value over every record that passed the filters.
    pub grand_total: BTreeMap<FieldId, f64>,
    /// `"<columnValue>::<measureId>"` -> value over every record that passed the filters.
    pub column_totals: BTreeMap<String, f64>,
    /// Column dimension values in first-occurrence order.
    pub column_values: Vec<String>,
    /// Number of records that passed validation and filters.
    pub record_count: usize,
    pub faults: Vec<MeasureFault>,
    /// Records skipped because their data could not be interpreted.
    pub data_errors: Vec<DataError>,
}

/// A row in display order, as produced by `PivotResult::flatten`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow<'r, 'a> {
    pub path: GroupPath,
    pub row: &'r PivotRow<'a>,
    pub has_children: bool,
    pub is_expanded: bool,
}

impl<'a> PivotResult<'a> {
    /// Locates a row by its group-key path, outermost key first.
    pub fn find_row<S: AsRef<str>>(&self, path: &[S]) -> Option<&PivotRow<'a>> {
        let (first, rest) = path.split_first()?;
        let mut row = self.rows.iter().find(|r| r.group_key == first.as_ref())?;
        for key in rest {
            row = row.child(key.as_ref())?;
        }
        Some(row)
    }

    /// The source records folded into the row at `path`.
    pub fn drill_down<S: AsRef<str>>(&self, path: &[S]) -> Option<&[&'a Record]> {
        self.find_row(path).map(|row| row.source_records.as_slice())
    }

    /// Rows in display order. A row's children are listed only when its
    /// group-key path is in `expanded`.
    pub fn flatten(&self, expanded: &HashSet<Vec<String>>) -> Vec<FlatRow<'_, 'a>> {
        let mut out = Vec::new();
        let mut path = GroupPath::new();
        flatten_rows(&self.rows, expanded, &mut path, &mut out);
        out
    }

    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }
}

fn flatten_rows<'r, 'a>(
    rows: &'r [PivotRow<'a>],
    expanded: &HashSet<Vec<String>>,
    path: &mut GroupPath,
    out: &mut Vec<FlatRow<'r, 'a>>,
) {
    for row in rows {
        path.push(row.group_key.clone());
        let is_expanded = !row.children.is_empty() && expanded.contains(path.as_slice());
        out.push(FlatRow {
            path: path.clone(),
            row,
            has_children: !row.children.is_empty(),
            is_expanded,
        });
        if is_expanded {
            flatten_rows(&row.children, expanded, path, out);
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row<'a>(key: &str, depth: usize, children: Vec<PivotRow<'a>>) -> PivotRow<'a> {
        PivotRow {
            group_key: key.to_string(),
            label: key.to_string(),
            depth,
            measure_values: BTreeMap::new(),
            cross_tab_values: BTreeMap::new(),
            children,
            source_records: Vec::new(),
        }
    }

    fn result() -> PivotResult<'static> {
        PivotResult {
            rows: vec![
                row("03/2025", 0, vec![row("Pagar", 1, vec![]), row("Receber", 1, vec![])]),
                row("04/2025", 0, vec![row("Pagar", 1, vec![])]),
            ],
            ..PivotResult::default()
        }
    }

    fn keys(flat: &[FlatRow<'_, '_>]) -> Vec<String> {
        flat.iter().map(|r| r.path.join("/")).collect()
    }

    #[test]
    fn test_cross_tab_key_splits_at_last_separator() {
        let key = cross_tab_key("Contas::Pagar", "valorConta");
        assert_eq!(key, "Contas::Pagar::valorConta");
        assert_eq!(split_cross_tab_key(&key), Some(("Contas::Pagar", "valorConta")));
        assert_eq!(
            split_cross_tab_key(&cross_tab_key("", "calc_1")),
            Some(("", "calc_1"))
        );
        assert_eq!(split_cross_tab_key("valorConta"), None);
    }

    #[test]
    fn test_flatten_collapsed_shows_top_level_only() {
        let result = result();
        let flat = result.flatten(&HashSet::new());
        assert_eq!(keys(&flat), vec!["03/2025", "04/2025"]);
        assert!(flat.iter().all(|r| r.has_children && !r.is_expanded));
    }

    #[test]
    fn test_flatten_expands_selected_paths() {
        let result = result();
        let expanded: HashSet<Vec<String>> = [vec!["03/2025".to_string()]].into_iter().collect();
        let flat = result.flatten(&expanded);
        assert_eq!(
            keys(&flat),
            vec!["03/2025", "03/2025/Pagar", "03/2025/Receber", "04/2025"]
        );
        assert_eq!(flat[1].row.depth, 1);
        assert!(!flat[1].has_children);
    }

    #[test]
    fn test_find_row_by_path() {
        let result = result();
        assert_eq!(result.find_row(&["04/2025", "Pagar"]).map(|r| r.depth), Some(1));
        assert!(result.find_row(&["04/2025", "Receber"]).is_none());
        assert!(result.find_row::<&str>(&[]).is_none());
    }

    #[test]
    fn test_cross_tab_key() {
        assert_eq!(cross_tab_key("Contas a Pagar", "valorConta"), "Contas a Pagar::valorConta");
    }
}
