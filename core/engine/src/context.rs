//! FILENAME: core/engine/src/context.rs
//! PURPOSE: Evaluation contexts for calculated fields.
//! CONTEXT: The same formula is evaluated at three granularities:
//! - ValueContext: a map of already-resolved values (authoring previews, tests)
//! - RecordContext: one record; [Field] is the record's value
//! - GroupContext: the records of one pivot group; [Field] is the field's
//!   default aggregation over the group, and fn("Field") aggregates explicitly

use std::collections::HashMap;

use parser::{AggregateFunction, FieldId};

use crate::aggregate::{aggregate_field, Accumulator};
use crate::catalog::FieldCatalog;
use crate::error::EvalError;
use crate::evaluator::{evaluate_calculation, EvalContext, Scalar};
use crate::field::{AggregationType, Field};
use crate::record::{FieldValue, Record};

// ============================================================================
// FIELD INDEX
// ============================================================================

/// Id-keyed view over the fields a context may resolve.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex<'a> {
    fields: HashMap<&'a str, &'a Field>,
}

impl<'a> FieldIndex<'a> {
    pub fn new() -> Self {
        FieldIndex::default()
    }

    /// Adds fields to the index. Later fields with the same id replace earlier ones.
    pub fn extend<I: IntoIterator<Item = &'a Field>>(&mut self, fields: I) {
        for field in fields {
            self.fields.insert(field.id.as_str(), field);
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a Field> {
        self.fields.get(id).copied()
    }

    fn require(&self, id: &str) -> Result<&'a Field, EvalError> {
        self.get(id).ok_or_else(|| EvalError::UnknownField(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'a> FromIterator<&'a Field> for FieldIndex<'a> {
    fn from_iter<I: IntoIterator<Item = &'a Field>>(iter: I) -> Self {
        let mut index = FieldIndex::new();
        index.extend(iter);
        index
    }
}

impl<'a> From<&'a FieldCatalog> for FieldIndex<'a> {
    fn from(catalog: &'a FieldCatalog) -> Self {
        catalog.list_fields().collect()
    }
}

// ============================================================================
// VALUE CONTEXT
// ============================================================================

/// Resolves field references from a plain map. Aggregation calls return the
/// mapped value as if it were the only record (count is 1 when present).
#[derive(Debug, Clone, Default)]
pub struct ValueContext {
    values: HashMap<FieldId, f64>,
}

impl ValueContext {
    pub fn new() -> Self {
        ValueContext::default()
    }

    pub fn with(mut self, field: impl Into<FieldId>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }
}

impl FromIterator<(FieldId, f64)> for ValueContext {
    fn from_iter<I: IntoIterator<Item = (FieldId, f64)>>(iter: I) -> Self {
        ValueContext {
            values: iter.into_iter().collect(),
        }
    }
}

impl EvalContext for ValueContext {
    fn field_value(&self, field: &FieldId, _depth: usize) -> Result<Option<Scalar>, EvalError> {
        Ok(self.values.get(field).copied().map(Scalar::Number))
    }

    fn aggregate(&self, func: AggregateFunction, field: &FieldId, _depth: usize) -> Result<f64, EvalError> {
        let value = self.values.get(field).copied();
        Ok(match func {
            AggregateFunction::Count => value.map_or(0.0, |_| 1.0),
            _ => value.unwrap_or(0.0),
        })
    }
}

// ============================================================================
// RECORD CONTEXT
// ============================================================================

/// Evaluates formulas against a single record.
pub struct RecordContext<'a> {
    record: &'a Record,
    fields: &'a FieldIndex<'a>,
}

impl<'a> RecordContext<'a> {
    pub fn new(record: &'a Record, fields: &'a FieldIndex<'a>) -> Self {
        RecordContext { record, fields }
    }

    /// The numeric value of `field` for this record. Missing values are None;
    /// values that are not numbers fail with `NotNumeric`.
    fn number(&self, field: &Field, depth: usize) -> Result<Option<f64>, EvalError> {
        if field.is_calculated() {
            return evaluate_calculation(field, self, depth + 1).map(Some);
        }
        match self.record.get(&field.id) {
            None => Ok(None),
            Some(FieldValue::Number(n)) => Ok(Some(*n)),
            Some(value) => value.as_number().map(Some).ok_or_else(|| EvalError::NotNumeric {
                field: field.id.clone(),
                value: value.display_value(),
            }),
        }
    }
}

impl EvalContext for RecordContext<'_> {
    fn field_value(&self, field: &FieldId, depth: usize) -> Result<Option<Scalar>, EvalError> {
        let field = self.fields.require(field)?;
        if let Some(FieldValue::Boolean(b)) = self.record.get(&field.id) {
            if !field.is_calculated() {
                return Ok(Some(Scalar::Boolean(*b)));
            }
        }
        Ok(self.number(field, depth)?.map(Scalar::Number))
    }

    fn aggregate(&self, func: AggregateFunction, field: &FieldId, depth: usize) -> Result<f64, EvalError> {
        let field = self.fields.require(field)?;
        if func == AggregateFunction::Count {
            return Ok(1.0);
        }
        Ok(self.number(field, depth)?.unwrap_or(0.0))
    }
}

// ============================================================================
// GROUP CONTEXT
// ============================================================================

/// Evaluates formulas against the records of one pivot group.
pub struct GroupContext<'a> {
    records: &'a [&'a Record],
    fields: &'a FieldIndex<'a>,
}

impl<'a> GroupContext<'a> {
    pub fn new(records: &'a [&'a Record], fields: &'a FieldIndex<'a>) -> Self {
        GroupContext { records, fields }
    }

    /// Aggregates a field over the group. Calculated fields are evaluated per
    /// record first, then folded like any other numeric value. Base values
    /// that do not read as numbers fail with `NotNumeric`, as they do per record.
    fn aggregate_over(
        &self,
        field: &Field,
        aggregation: AggregationType,
        depth: usize,
    ) -> Result<f64, EvalError> {
        if aggregation == AggregationType::Count {
            return Ok(self.records.len() as f64);
        }
        if !field.is_calculated() {
            if aggregation != AggregationType::DistinctCount {
                self.require_numeric(field)?;
            }
            return Ok(aggregate_field(self.records.iter().copied(), field, aggregation));
        }

        let mut acc = Accumulator::for_aggregation(aggregation);
        for record in self.records {
            let ctx = RecordContext::new(record, self.fields);
            acc.add_number(evaluate_calculation(field, &ctx, depth + 1)?);
        }
        Ok(acc.compute(aggregation))
    }

    fn require_numeric(&self, field: &Field) -> Result<(), EvalError> {
        let text = self
            .records
            .iter()
            .filter_map(|record| record.get(&field.id))
            .find(|value| value.as_number().is_none());
        match text {
            Some(value) => Err(EvalError::NotNumeric {
                field: field.id.clone(),
                value: value.display_value(),
            }),
            None => Ok(()),
        }
    }
}

impl EvalContext for GroupContext<'_> {
    fn field_value(&self, field: &FieldId, depth: usize) -> Result<Option<Scalar>, EvalError> {
        let field = self.fields.require(field)?;
        let value = if field.is_calculated() {
            evaluate_calculation(field, self, depth + 1)?
        } else {
            self.aggregate_over(field, field.aggregation(), depth)?
        };
        Ok(Some(Scalar::Number(value)))
    }

    fn aggregate(&self, func: AggregateFunction, field: &FieldId, depth: usize) -> Result<f64, EvalError> {
        let field = self.fields.require(field)?;
        self.aggregate_over(field, func.into(), depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::field::SemanticType;
    use parser::parse;

    fn catalog() -> FieldCatalog {
        let mut catalog = FieldCatalog::new(vec![
            Field::new("tipo", "Tipo", SemanticType::String),
            Field::new("valor", "Valor", SemanticType::Number).with_aggregation(AggregationType::Sum),
            Field::new("juros", "Juros", SemanticType::Number).with_aggregation(AggregationType::Avg),
        ]);
        catalog
            .create_calculated_field("calc_encargo", "Encargo", "[Valor] * [Juros] / 100")
            .unwrap();
        catalog
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new().with("tipo", "Pagar").with("valor", 100.0).with("juros", 2.0),
            Record::new().with("tipo", "Pagar").with("valor", 300.0).with("juros", 4.0),
        ]
    }

    fn group_eval(formula: &str) -> Result<f64, EvalError> {
        let catalog = catalog();
        let index = FieldIndex::from(&catalog);
        let records = records();
        let group: Vec<&Record> = records.iter().collect();
        let ctx = GroupContext::new(&group, &index);
        evaluate(&parse(formula, &catalog).unwrap(), &ctx)
    }

    #[test]
    fn bare_reference_uses_default_aggregation() {
        assert_eq!(group_eval("[Valor]"), Ok(400.0));
        assert_eq!(group_eval("[Juros]"), Ok(3.0));
    }

    #[test]
    fn explicit_aggregations() {
        assert_eq!(group_eval("sum(\"Valor\") / count(\"Valor\")"), Ok(200.0));
        assert_eq!(group_eval("max(\"Valor\") - min(\"Valor\")"), Ok(200.0));
        assert_eq!(group_eval("avg(\"Juros\")"), Ok(3.0));
        assert_eq!(group_eval("count(\"Tipo\")"), Ok(2.0));
    }

    #[test]
    fn group_context_rejects_text_operands() {
        let not_numeric = Err(EvalError::NotNumeric {
            field: "tipo".to_string(),
            value: "Pagar".to_string(),
        });
        assert_eq!(group_eval("[Tipo] + 1"), not_numeric);
        assert_eq!(group_eval("max(\"Tipo\")"), not_numeric);
        // counting text is fine
        assert_eq!(group_eval("count(\"Tipo\") + 1"), Ok(3.0));
    }

    #[test]
    fn calculated_dependency_at_group_level() {
        // [Encargo] at group level: sum(Valor) * avg(Juros) / 100
        assert_eq!(group_eval("[Encargo]"), Ok(12.0));
        // sum("Encargo"): evaluated per record, then summed: 2 + 12
        assert_eq!(group_eval("sum(\"Encargo\")"), Ok(14.0));
    }

    #[test]
    fn record_context_reads_record_values() {
        let catalog = catalog();
        let index = FieldIndex::from(&catalog);
        let record = Record::new().with("valor", 50.0).with("juros", 10.0);
        let ctx = RecordContext::new(&record, &index);

        let expr = parse("[Encargo] + count(\"Valor\")", &catalog).unwrap();
        assert_eq!(evaluate(&expr, &ctx), Ok(6.0));
    }

    #[test]
    fn record_context_rejects_text_operands() {
        let catalog = catalog();
        let index = FieldIndex::from(&catalog);
        let record = Record::new().with("tipo", "Pagar");
        let ctx = RecordContext::new(&record, &index);

        let expr = parse("[Tipo] + 1", &catalog).unwrap();
        assert_eq!(
            evaluate(&expr, &ctx),
            Err(EvalError::NotNumeric {
                field: "tipo".to_string(),
                value: "Pagar".to_string(),
            })
        );
        // Missing values count as zero
        let expr = parse("[Valor] + 1", &catalog).unwrap();
        assert_eq!(evaluate(&expr, &ctx), Ok(1.0));
    }

    #[test]
    fn unknown_field_in_context() {
        let catalog = catalog();
        let index = FieldIndex::new();
        let record = Record::new();
        let ctx = RecordContext::new(&record, &index);
        let expr = parse("[Valor]", &catalog).unwrap();
        assert_eq!(evaluate(&expr, &ctx), Err(EvalError::UnknownField("valor".to_string())));
    }

    #[test]
    fn self_referencing_calculation_hits_depth_limit() {
        // Built by hand: the catalog never lets a formula reference its own field.
        let base = Field::new("valor", "Valor", SemanticType::Number);
        let looped = Field::calculated("calc_loop", "Loop", "[calc_loop] + 1", &["calc_loop"]).unwrap();
        let index: FieldIndex = [&base, &looped].into_iter().collect();
        let records = records();
        let group: Vec<&Record> = records.iter().collect();
        let ctx = GroupContext::new(&group, &index);

        let result = evaluate_calculation(&looped, &ctx, 0);
        assert_eq!(result, Err(EvalError::RecursionLimit("calc_loop".to_string())));
    }
}
