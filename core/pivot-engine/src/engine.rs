//! FILENAME: core/pivot-engine/src/engine.rs
//! Pivot Engine - Turns records and a config into a hierarchical result.
//!
//! The computation is a pure function of (records, config):
//! 1. Validate the config (fail fast, before any aggregation)
//! 2. Skip records whose dates cannot be read, recording a DataError
//! 3. Apply filters once, as a conjunction of per-record predicates
//! 4. Recursively partition by each row field in first-occurrence order
//! 5. Per group: aggregate measures, cross-tabulate by the column field
//! 6. Grand totals and column totals over every record that passed
//!
//! Calculated measures that fail for one cell are reported as faults and
//! the rest of the result is still produced.

use std::collections::BTreeMap;

use engine::{
    aggregate_field, canonical_key, evaluate_calculation, ConfigError, DataError, Field,
    FieldIndex, GroupContext, Record,
};
use rustc_hash::FxHashMap;

use crate::definition::PivotConfig;
use crate::view::{cross_tab_key, GroupPath, MeasureFault, PivotResult, PivotRow};

const LOG_TARGET: &str = "PIVOT";

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Computes the pivot of `records` under `config`.
///
/// Fails only when the config itself is invalid. Data and evaluation faults
/// are reported inside the result.
pub fn aggregate<'a>(
    records: &'a [Record],
    config: &PivotConfig,
) -> Result<PivotResult<'a>, ConfigError> {
    config.validate()?;

    let index = config.field_index();
    let calculator = PivotCalculator {
        config,
        index: &index,
    };
    Ok(calculator.calculate(records))
}

/// Returns the records folded into the row at `path` without building the
/// whole result. Applies the same validation and filters as `aggregate`.
pub fn drill_down<'a, S: AsRef<str>>(
    records: &'a [Record],
    config: &PivotConfig,
    path: &[S],
) -> Result<Vec<&'a Record>, ConfigError> {
    config.validate()?;
    if path.len() > config.row_fields.len() {
        return Ok(Vec::new());
    }

    let (passed, _) = prepare_records(records, config);
    Ok(passed
        .into_iter()
        .filter(|record| {
            config.row_fields.iter().zip(path).all(|(field, key)| {
                canonical_key(record.get(&field.id), field.semantic_type).as_deref()
                    == Some(key.as_ref())
            })
        })
        .collect())
}

// ============================================================================
// RECORD PREPARATION
// ============================================================================

/// Splits records into those that take part in aggregation and the data
/// errors of those that cannot.
fn prepare_records<'a>(
    records: &'a [Record],
    config: &PivotConfig,
) -> (Vec<&'a Record>, Vec<DataError>) {
    let mut passed = Vec::with_capacity(records.len());
    let mut errors = Vec::new();

    'records: for (position, record) in records.iter().enumerate() {
        for field in config.date_fields() {
            let value = record.get(&field.id);
            if canonical_key(value, field.semantic_type).is_none() {
                let error = DataError::InvalidDate {
                    record: position,
                    field: field.id.clone(),
                    value: value.map(|v| v.display_value()).unwrap_or_default(),
                };
                log::warn!(target: LOG_TARGET, "skipping record: {}", error);
                errors.push(error);
                continue 'records;
            }
        }

        if config
            .filters
            .iter()
            .all(|filter| filter.accepts(record.get(&filter.field.id)))
        {
            passed.push(record);
        }
    }

    (passed, errors)
}

/// Partitions records by the canonical key of `field`, keys in first-occurrence order.
fn partition<'a>(records: &[&'a Record], field: &Field) -> Vec<(String, Vec<&'a Record>)> {
    let mut positions: FxHashMap<String, usize> = FxHashMap::default();
    let mut groups: Vec<(String, Vec<&'a Record>)> = Vec::new();

    for record in records {
        // Dates that do not parse were removed by prepare_records
        let key = canonical_key(record.get(&field.id), field.semantic_type).unwrap_or_default();
        match positions.get(&key) {
            Some(&position) => groups[position].1.push(*record),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push((key, vec![*record]));
            }
        }
    }

    groups
}

// ============================================================================
// PIVOT CALCULATOR
// ============================================================================

struct PivotCalculator<'c> {
    config: &'c PivotConfig,
    index: &'c FieldIndex<'c>,
}

/// Measure values of one cell plus the faults raised computing them.
struct MeasureCell {
    values: BTreeMap<String, f64>,
    faults: Vec<MeasureFault>,
}

impl<'c> PivotCalculator<'c> {
    fn calculate<'a>(&self, records: &'a [Record]) -> PivotResult<'a> {
        let (passed, data_errors) = prepare_records(records, self.config);
        log::debug!(
            target: LOG_TARGET,
            "aggregate: {} records, {} passed, {} skipped, {} row fields, {} measures",
            records.len(),
            passed.len(),
            data_errors.len(),
            self.config.row_fields.len(),
            self.config.measures.len()
        );

        let mut faults = Vec::new();
        let mut path = GroupPath::new();
        let rows = self.build_level(&passed, 0, &mut path, &mut faults);

        // Totals ignore row partitioning entirely
        let total = self.compute_measures(&passed, &path, None);
        faults.extend(total.faults);
        let grand_total = total.values;

        let mut column_totals = BTreeMap::new();
        let mut column_values = Vec::new();
        if let Some(column_field) = &self.config.column_field {
            for (column_key, column_records) in partition(&passed, column_field) {
                let cell =
                    self.compute_measures(&column_records, &path, Some(column_key.as_str()));
                faults.extend(cell.faults);
                for (measure_id, value) in cell.values {
                    column_totals.insert(cross_tab_key(&column_key, &measure_id), value);
                }
                column_values.push(column_key);
            }
        }

        if !faults.is_empty() {
            log::warn!(target: LOG_TARGET, "aggregate finished with {} faults", faults.len());
        }

        PivotResult {
            rows,
            grand_total,
            column_totals,
            column_values,
            record_count: passed.len(),
            faults,
            data_errors,
        }
    }

    /// Builds the rows for `rowFields[depth]` over `records`, recursing into children.
    fn build_level<'a>(
        &self,
        records: &[&'a Record],
        depth: usize,
        path: &mut GroupPath,
        faults: &mut Vec<MeasureFault>,
    ) -> Vec<PivotRow<'a>> {
        let Some(field) = self.config.row_fields.get(depth) else {
            return Vec::new();
        };

        partition(records, field)
            .into_iter()
            .map(|(group_key, group_records)| {
                path.push(group_key.clone());

                let cell = self.compute_measures(&group_records, path, None);
                faults.extend(cell.faults);

                let mut cross_tab_values = BTreeMap::new();
                if let Some(column_field) = &self.config.column_field {
                    for (column_key, column_records) in partition(&group_records, column_field) {
                        let cell = self.compute_measures(
                            &column_records,
                            path,
                            Some(column_key.as_str()),
                        );
                        faults.extend(cell.faults);
                        for (measure_id, value) in cell.values {
                            cross_tab_values.insert(cross_tab_key(&column_key, &measure_id), value);
                        }
                    }
                }

                let children = self.build_level(&group_records, depth + 1, path, faults);
                path.pop();

                PivotRow {
                    label: group_key.clone(),
                    group_key,
                    depth,
                    measure_values: cell.values,
                    cross_tab_values,
                    children,
                    source_records: group_records,
                }
            })
            .collect()
    }

    /// Computes every measure over one group of records.
    fn compute_measures(
        &self,
        records: &[&Record],
        path: &GroupPath,
        column: Option<&str>,
    ) -> MeasureCell {
        let mut values = BTreeMap::new();
        let mut faults = Vec::new();

        for measure in &self.config.measures {
            let result = if measure.is_calculated() {
                let ctx = GroupContext::new(records, self.index);
                evaluate_calculation(measure, &ctx, 0)
            } else {
                Ok(aggregate_field(records.iter().copied(), measure, measure.aggregation()))
            };

            match result {
                Ok(value) => {
                    values.insert(measure.id.clone(), value);
                }
                Err(error) => {
                    log::warn!(
                        target: LOG_TARGET,
                        "measure {} failed at {:?} column {:?}: {}",
                        measure.id,
                        path.as_slice(),
                        column,
                        error
                    );
                    faults.push(MeasureFault {
                        row_path: path.clone(),
                        column: column.map(str::to_string),
                        measure_id: measure.id.clone(),
                        error,
                    });
                }
            }
        }

        MeasureCell { values, faults }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{FilterCondition, FilterPredicate};
    use engine::{AggregationType, EvalError, FieldCatalog, SemanticType};
    use pretty_assertions::assert_eq;

    fn tipo() -> Field {
        Field::new("tipo", "Tipo", SemanticType::String)
    }

    fn banco() -> Field {
        Field::new("banco", "Banco", SemanticType::String)
    }

    fn valor() -> Field {
        Field::new("valorConta", "Valor da Conta", SemanticType::Number)
            .with_aggregation(AggregationType::Sum)
    }

    fn create_test_records() -> Vec<Record> {
        vec![
            Record::new().with("tipo", "Pagar").with("banco", "Itaú").with("valorConta", -100.0),
            Record::new().with("tipo", "Receber").with("banco", "Caixa").with("valorConta", 200.0),
            Record::new().with("tipo", "Pagar").with("banco", "Caixa").with("valorConta", -50.0),
            Record::new().with("tipo", "Receber").with("banco", "Itaú").with("valorConta", 25.0),
        ]
    }

    #[test]
    fn test_basic_pivot_calculation() {
        let records = vec![
            Record::new().with("tipo", "Pagar").with("valorConta", -100.0),
            Record::new().with("tipo", "Receber").with("valorConta", 200.0),
        ];
        let config = PivotConfig::new().row(tipo()).measure(valor());

        let result = aggregate(&records, &config).unwrap();

        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].group_key, "Pagar");
        assert_eq!(result.rows[0].measure_values["valorConta"], -100.0);
        assert_eq!(result.rows[1].group_key, "Receber");
        assert_eq!(result.rows[1].measure_values["valorConta"], 200.0);
        assert_eq!(result.grand_total["valorConta"], 100.0);
        assert!(result.faults.is_empty());
    }

    #[test]
    fn test_first_occurrence_order() {
        let records = vec![
            Record::new().with("tipo", "Receber"),
            Record::new().with("tipo", "Pagar"),
            Record::new().with("tipo", "Receber"),
            Record::new().with("tipo", "Adiantamento"),
        ];
        let config = PivotConfig::new().row(tipo()).measure(valor());
        let result = aggregate(&records, &config).unwrap();

        let keys: Vec<&str> = result.rows.iter().map(|r| r.group_key.as_str()).collect();
        assert_eq!(keys, vec!["Receber", "Pagar", "Adiantamento"]);
    }

    #[test]
    fn test_nested_rows_and_depth() {
        let records = create_test_records();
        let config = PivotConfig::new().row(tipo()).row(banco()).measure(valor());
        let result = aggregate(&records, &config).unwrap();

        let pagar = &result.rows[0];
        assert_eq!(pagar.depth, 0);
        assert_eq!(pagar.children.len(), 2);
        assert!(pagar.children.iter().all(|c| c.depth == 1 && c.is_terminal()));
        assert_eq!(pagar.children[0].group_key, "Itaú");
        assert_eq!(pagar.children[1].measure_values["valorConta"], -50.0);
    }

    #[test]
    fn test_cross_tab_and_column_totals() {
        let records = create_test_records();
        let config = PivotConfig::new().row(tipo()).column(banco()).measure(valor());
        let result = aggregate(&records, &config).unwrap();

        assert_eq!(result.column_values, vec!["Itaú", "Caixa"]);
        assert_eq!(result.rows[0].cross_tab_values["Itaú::valorConta"], -100.0);
        assert_eq!(result.rows[0].cross_tab_values["Caixa::valorConta"], -50.0);
        assert_eq!(result.rows[1].cross_tab_values["Itaú::valorConta"], 25.0);
        assert_eq!(result.column_totals["Itaú::valorConta"], -75.0);
        assert_eq!(result.column_totals["Caixa::valorConta"], 150.0);
    }

    #[test]
    fn test_no_row_fields() {
        let records = create_test_records();
        let config = PivotConfig::new().measure(valor());
        let result = aggregate(&records, &config).unwrap();

        assert!(result.rows.is_empty());
        assert_eq!(result.grand_total["valorConta"], 75.0);
    }

    #[test]
    fn test_no_measures() {
        let records = create_test_records();
        let config = PivotConfig::new().row(tipo());
        let result = aggregate(&records, &config).unwrap();

        assert_eq!(result.rows.len(), 2);
        assert!(result.rows[0].measure_values.is_empty());
        assert!(result.grand_total.is_empty());
    }

    #[test]
    fn test_filters_apply_before_grouping() {
        let records = create_test_records();
        let config = PivotConfig::new()
            .row(tipo())
            .measure(valor())
            .filter(FilterPredicate::new(banco(), FilterCondition::Equals("Itaú".into())));
        let result = aggregate(&records, &config).unwrap();

        assert_eq!(result.record_count, 2);
        assert_eq!(result.rows[0].measure_values["valorConta"], -100.0);
        assert_eq!(result.rows[1].measure_values["valorConta"], 25.0);
        assert_eq!(result.grand_total["valorConta"], -75.0);
    }

    #[test]
    fn test_invalid_dates_are_skipped() {
        let data = Field::new("dataPrevisao", "Data", SemanticType::Date);
        let records = vec![
            Record::new().with("dataPrevisao", "2025-03-23").with("valorConta", 1.0),
            Record::new().with("dataPrevisao", "amanhã").with("valorConta", 2.0),
            Record::new().with("dataPrevisao", "23/03/2025").with("valorConta", 4.0),
        ];
        let config = PivotConfig::new().row(data).measure(valor());
        let result = aggregate(&records, &config).unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].group_key, "23/03/2025");
        assert_eq!(result.rows[0].measure_values["valorConta"], 5.0);
        assert_eq!(
            result.data_errors,
            vec![DataError::InvalidDate {
                record: 1,
                field: "dataPrevisao".to_string(),
                value: "amanhã".to_string(),
            }]
        );
    }

    #[test]
    fn test_division_by_zero_is_a_single_fault() {
        let catalog = FieldCatalog::new(vec![
            tipo(),
            Field::new("a", "A", SemanticType::Number),
            Field::new("b", "B", SemanticType::Number),
        ]);
        let ratio = Field::calculated("calc_ratio", "Ratio", "[A]/[B]", &catalog).unwrap();
        let records = vec![
            Record::new().with("tipo", "x").with("a", 6.0).with("b", 0.0),
            Record::new().with("tipo", "y").with("a", 6.0).with("b", 3.0),
        ];
        let config = PivotConfig::new()
            .row(tipo())
            .measure(ratio)
            .with_catalog(&catalog);
        let result = aggregate(&records, &config).unwrap();

        assert!(result.rows[0].measure_values.is_empty());
        assert_eq!(result.rows[1].measure_values["calc_ratio"], 2.0);
        // Grand total evaluates the formula once over all records: 12 / 3
        assert_eq!(result.grand_total["calc_ratio"], 4.0);
        assert_eq!(result.faults.len(), 1);
        assert_eq!(result.faults[0].row_path.as_slice(), ["x".to_string()]);
        assert_eq!(result.faults[0].measure_id, "calc_ratio");
        assert_eq!(result.faults[0].error, EvalError::DivisionByZero);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let records = create_test_records();
        let config = PivotConfig::new().row(tipo()).measure(valor()).measure(valor());
        assert!(matches!(
            aggregate(&records, &config),
            Err(ConfigError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_drill_down_matches_row_records() {
        let records = create_test_records();
        let config = PivotConfig::new().row(tipo()).row(banco()).measure(valor());
        let result = aggregate(&records, &config).unwrap();

        let via_result = result.drill_down(&["Receber", "Caixa"]).unwrap();
        let direct = drill_down(&records, &config, &["Receber", "Caixa"]).unwrap();
        assert_eq!(via_result.len(), 1);
        assert_eq!(via_result, direct.as_slice());
        assert_eq!(direct[0].get("valorConta"), Some(&200.0.into()));
    }
}
