//! FILENAME: core/engine/src/aggregate.rs
//! PURPOSE: Running accumulator behind every aggregation (sum, avg, min, max,
//! count, distinctCount).
//! CONTEXT: Used by the pivot engine for base-field measures and by the
//! formula evaluator for aggregation calls inside calculated fields.

use std::collections::HashSet;

use crate::field::{AggregationType, Field};
use crate::record::{canonical_key, numeric_or_zero, FieldValue, Record};

/// Accumulates values for a single aggregation.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    pub sum: f64,
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Canonical keys seen so far; only populated when distinct tracking is on.
    distinct: Option<HashSet<String>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Accumulator::default()
    }

    /// An accumulator ready to compute `aggregation`.
    pub fn for_aggregation(aggregation: AggregationType) -> Self {
        Accumulator {
            distinct: (aggregation == AggregationType::DistinctCount).then(HashSet::new),
            ..Accumulator::default()
        }
    }

    /// Adds one numeric value.
    pub fn add_number(&mut self, value: f64) {
        if let Some(distinct) = self.distinct.as_mut() {
            distinct.insert(value.to_string());
        }
        self.push(value);
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    /// Adds the value a record holds for `field`.
    /// Non-numeric and missing values count as 0 for sum, avg, min and max.
    pub fn add_value(&mut self, value: Option<&FieldValue>, field: &Field) {
        if let Some(distinct) = self.distinct.as_mut() {
            let key = canonical_key(value, field.semantic_type)
                .or_else(|| value.map(FieldValue::display_value))
                .unwrap_or_default();
            distinct.insert(key);
        }
        self.push(numeric_or_zero(value));
    }

    pub fn add_record(&mut self, record: &Record, field: &Field) {
        self.add_value(record.get(&field.id), field);
    }

    /// Computes the final aggregate. Empty accumulators yield 0 for every aggregation.
    pub fn compute(&self, aggregation: AggregationType) -> f64 {
        match aggregation {
            AggregationType::Sum => self.sum,
            AggregationType::Count => self.count as f64,
            AggregationType::Avg => {
                if self.count > 0 {
                    self.sum / (self.count as f64)
                } else {
                    0.0
                }
            }
            AggregationType::Min => self.min.unwrap_or(0.0),
            AggregationType::Max => self.max.unwrap_or(0.0),
            AggregationType::DistinctCount => {
                self.distinct.as_ref().map_or(0, |d| d.len()) as f64
            }
        }
    }
}

/// Aggregates a base field over a group of records.
pub fn aggregate_field<'r, I>(records: I, field: &Field, aggregation: AggregationType) -> f64
where
    I: IntoIterator<Item = &'r Record>,
{
    let mut acc = Accumulator::for_aggregation(aggregation);
    for record in records {
        acc.add_record(record, field);
    }
    acc.compute(aggregation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::SemanticType;

    fn valor() -> Field {
        Field::new("valorConta", "Valor da Conta", SemanticType::Number)
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new().with("valorConta", -100.0).with("banco", "Itaú"),
            Record::new().with("valorConta", 200.0).with("banco", "Caixa"),
            Record::new().with("valorConta", "50").with("banco", "Itaú"),
            Record::new().with("valorConta", "n/a"),
        ]
    }

    #[test]
    fn base_aggregations_coerce_to_zero() {
        let records = records();
        let field = valor();
        assert_eq!(aggregate_field(&records, &field, AggregationType::Sum), 150.0);
        assert_eq!(aggregate_field(&records, &field, AggregationType::Avg), 37.5);
        assert_eq!(aggregate_field(&records, &field, AggregationType::Min), -100.0);
        assert_eq!(aggregate_field(&records, &field, AggregationType::Max), 200.0);
        assert_eq!(aggregate_field(&records, &field, AggregationType::Count), 4.0);
    }

    #[test]
    fn distinct_count_includes_missing_as_one_key() {
        let records = records();
        let banco = Field::new("banco", "Banco", SemanticType::String);
        // "Itaú", "Caixa" and the missing value
        assert_eq!(
            aggregate_field(&records, &banco, AggregationType::DistinctCount),
            3.0
        );
    }

    #[test]
    fn empty_group_yields_zero() {
        let field = valor();
        for agg in [
            AggregationType::Sum,
            AggregationType::Avg,
            AggregationType::Min,
            AggregationType::Max,
            AggregationType::Count,
            AggregationType::DistinctCount,
        ] {
            assert_eq!(aggregate_field(std::iter::empty(), &field, agg), 0.0, "{agg}");
        }
    }
}
