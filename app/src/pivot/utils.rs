//! FILENAME: app/src/pivot/utils.rs
use std::collections::HashSet;

use engine::{AggregationType, ConfigError, Field, FieldCatalog, FieldValue};
use pivot_engine::{FilterCondition, FilterPredicate, PivotConfig, PivotResult, PivotRow};

use crate::pivot::types::*;

// ============================================================================
// REQUEST -> CONFIG
// ============================================================================

/// Looks a field up by id, then by display name.
pub(crate) fn resolve_field(
    catalog: &FieldCatalog,
    name: &str,
    role: &'static str,
) -> Result<Field, ConfigError> {
    catalog
        .get(name)
        .or_else(|| catalog.find(name))
        .cloned()
        .ok_or_else(|| ConfigError::UnknownField {
            field: name.to_string(),
            role,
        })
}

pub(crate) fn parse_aggregation(name: &str) -> Result<AggregationType, ConfigError> {
    AggregationType::from_name(name).ok_or_else(|| ConfigError::InvalidOption {
        option: "aggregation",
        value: name.to_string(),
    })
}

fn missing_operand(request: &FilterRequest, option: &'static str) -> ConfigError {
    ConfigError::InvalidOption {
        option,
        value: format!("{} on {}", request.operator, request.field),
    }
}

/// Converts a filter request into a predicate over its field.
pub(crate) fn build_filter(
    catalog: &FieldCatalog,
    request: &FilterRequest,
) -> Result<FilterPredicate, ConfigError> {
    let field = resolve_field(catalog, &request.field, "filter")?;
    let value = || -> Result<FieldValue, ConfigError> {
        request
            .value
            .clone()
            .ok_or_else(|| missing_operand(request, "filter value"))
    };

    let condition = match request.operator.to_ascii_lowercase().as_str() {
        "equals" => FilterCondition::Equals(value()?),
        "notequals" => FilterCondition::NotEquals(value()?),
        "contains" => FilterCondition::Contains(value()?.display_value()),
        "greaterthan" => FilterCondition::GreaterThan(value()?),
        "lessthan" => FilterCondition::LessThan(value()?),
        "between" => {
            let upper = request
                .value_to
                .clone()
                .ok_or_else(|| missing_operand(request, "filter upper bound"))?;
            FilterCondition::Between(value()?, upper)
        }
        "in" => FilterCondition::In(
            request
                .values
                .clone()
                .ok_or_else(|| missing_operand(request, "filter values"))?,
        ),
        _ => {
            return Err(ConfigError::InvalidOption {
                option: "filter operator",
                value: request.operator.clone(),
            })
        }
    };
    Ok(FilterPredicate::new(field, condition))
}

/// Builds and validates a typed pivot config against the current catalog.
pub fn build_pivot_config(
    catalog: &FieldCatalog,
    request: &PivotRequest,
) -> Result<PivotConfig, ConfigError> {
    let mut config = PivotConfig::new();

    for name in &request.row_fields {
        config = config.row(resolve_field(catalog, name, "row")?);
    }
    if let Some(name) = &request.column_field {
        config = config.column(resolve_field(catalog, name, "column")?);
    }
    for measure in &request.measures {
        let mut field = resolve_field(catalog, &measure.field, "measure")?;
        if let Some(aggregation) = &measure.aggregation {
            field = field.with_aggregation(parse_aggregation(aggregation)?);
        }
        config = config.measure(field);
    }
    for filter in &request.filters {
        config = config.filter(build_filter(catalog, filter)?);
    }

    let config = config.with_catalog(catalog);
    config.validate()?;
    Ok(config)
}

pub(crate) fn expanded_paths(request: &PivotRequest) -> Option<HashSet<Vec<String>>> {
    request
        .expanded
        .as_ref()
        .map(|paths| paths.iter().cloned().collect())
}

// ============================================================================
// RESULT -> RESPONSE
// ============================================================================

fn row_to_data(row: &PivotRow<'_>) -> PivotRowData {
    PivotRowData {
        group_key: row.group_key.clone(),
        label: row.label.clone(),
        depth: row.depth,
        record_count: row.record_count(),
        measure_values: row.measure_values.clone(),
        cross_tab_values: row.cross_tab_values.clone(),
        children: row.children.iter().map(row_to_data).collect(),
    }
}

/// Converts an engine result into the client response
pub(crate) fn result_to_response(
    result: &PivotResult<'_>,
    config: &PivotConfig,
    expanded: Option<&HashSet<Vec<String>>>,
) -> PivotResponse {
    let flat_rows = expanded.map(|expanded| {
        result
            .flatten(expanded)
            .into_iter()
            .map(|flat| FlatRowData {
                path: flat.path.to_vec(),
                label: flat.row.label.clone(),
                depth: flat.row.depth,
                has_children: flat.has_children,
                is_expanded: flat.is_expanded,
                measure_values: flat.row.measure_values.clone(),
                cross_tab_values: flat.row.cross_tab_values.clone(),
            })
            .collect()
    });

    PivotResponse {
        rows: result.rows.iter().map(row_to_data).collect(),
        grand_total: result.grand_total.clone(),
        column_totals: result.column_totals.clone(),
        column_values: result.column_values.clone(),
        measure_ids: config.measures.iter().map(|m| m.id.clone()).collect(),
        record_count: result.record_count,
        flat_rows,
        faults: result
            .faults
            .iter()
            .map(|fault| FaultData {
                row_path: fault.row_path.to_vec(),
                column: fault.column.clone(),
                measure_id: fault.measure_id.clone(),
                message: fault.error.to_string(),
            })
            .collect(),
        data_errors: result.data_errors.iter().map(|e| e.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(field: &str, operator: &str, value: Option<FieldValue>) -> FilterRequest {
        FilterRequest {
            field: field.to_string(),
            operator: operator.to_string(),
            value,
            value_to: None,
            values: None,
        }
    }

    #[test]
    fn test_resolve_field_by_id_or_name() {
        let catalog = FieldCatalog::financial();
        assert_eq!(resolve_field(&catalog, "banco", "row").unwrap().id, "banco");
        assert_eq!(
            resolve_field(&catalog, "Banco para Transferência", "row").unwrap().id,
            "banco"
        );
        assert_eq!(
            resolve_field(&catalog, "saldo", "measure"),
            Err(ConfigError::UnknownField {
                field: "saldo".to_string(),
                role: "measure",
            })
        );
    }

    #[test]
    fn test_build_filter_operators() {
        let catalog = FieldCatalog::financial();
        let predicate = build_filter(&catalog, &filter("tipo", "notEquals", Some("Pagar".into()))).unwrap();
        assert_eq!(predicate.condition, FilterCondition::NotEquals("Pagar".into()));

        let predicate = build_filter(&catalog, &filter("tipo", "CONTAINS", Some("receber".into()))).unwrap();
        assert_eq!(predicate.condition, FilterCondition::Contains("receber".to_string()));

        assert!(matches!(
            build_filter(&catalog, &filter("tipo", "startsWith", Some("C".into()))),
            Err(ConfigError::InvalidOption { option: "filter operator", .. })
        ));
        assert!(matches!(
            build_filter(&catalog, &filter("valorConta", "between", Some(0.0.into()))),
            Err(ConfigError::InvalidOption { option: "filter upper bound", .. })
        ));
    }

    #[test]
    fn test_build_pivot_config_overrides_aggregation() {
        let catalog = FieldCatalog::financial();
        let request = PivotRequest {
            row_fields: vec!["tipo".to_string()],
            measures: vec![MeasureRequest {
                field: "valorConta".to_string(),
                aggregation: Some("average".to_string()),
            }],
            ..PivotRequest::default()
        };
        let config = build_pivot_config(&catalog, &request).unwrap();
        assert_eq!(config.measures[0].aggregation(), AggregationType::Avg);

        let request = PivotRequest {
            measures: vec![MeasureRequest {
                field: "valorConta".to_string(),
                aggregation: Some("median".to_string()),
            }],
            ..PivotRequest::default()
        };
        assert_eq!(
            build_pivot_config(&catalog, &request),
            Err(ConfigError::InvalidOption {
                option: "aggregation",
                value: "median".to_string(),
            })
        );
    }
}
