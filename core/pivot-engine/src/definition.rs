//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Definition - The configuration of one pivot request.
//!
//! This module contains the types needed to DESCRIBE a pivot:
//! - which fields become row groups (ordered, outermost first)
//! - an optional column dimension for cross-tabulation
//! - the measures to aggregate (base or calculated fields)
//! - record filters, applied as a conjunction before any grouping
//!
//! A config is an immutable snapshot of user intent; the engine never mutates it.

use std::cmp::Ordering;
use std::collections::HashSet;

use engine::{
    canonical_key, AggregationType, ConfigError, Field, FieldCatalog, FieldIndex, FieldValue,
    SemanticType,
};
use serde::Serialize;

// ============================================================================
// FILTERS
// ============================================================================

/// A predicate over the value one record holds for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPredicate {
    pub field: Field,
    pub condition: FilterCondition,
}

/// Filter operators. Values compare numerically for numbers, chronologically
/// for dates and by canonical string for everything else.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operator", content = "value", rename_all = "camelCase")]
pub enum FilterCondition {
    Equals(FieldValue),
    NotEquals(FieldValue),
    /// Case-insensitive substring match on the canonical string.
    Contains(String),
    GreaterThan(FieldValue),
    LessThan(FieldValue),
    /// Inclusive on both ends.
    Between(FieldValue, FieldValue),
    In(Vec<FieldValue>),
}

impl FilterPredicate {
    pub fn new(field: Field, condition: FilterCondition) -> Self {
        FilterPredicate { field, condition }
    }

    /// True when the record value passes this filter.
    pub fn accepts(&self, value: Option<&FieldValue>) -> bool {
        let ty = self.field.semantic_type;
        match &self.condition {
            FilterCondition::Equals(target) => compare(value, target, ty) == Some(Ordering::Equal),
            FilterCondition::NotEquals(target) => compare(value, target, ty) != Some(Ordering::Equal),
            FilterCondition::Contains(needle) => canonical_key(value, ty)
                .is_some_and(|key| key.to_lowercase().contains(&needle.to_lowercase())),
            FilterCondition::GreaterThan(target) => {
                compare(value, target, ty) == Some(Ordering::Greater)
            }
            FilterCondition::LessThan(target) => compare(value, target, ty) == Some(Ordering::Less),
            FilterCondition::Between(low, high) => {
                matches!(
                    compare(value, low, ty),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare(value, high, ty),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            FilterCondition::In(targets) => targets
                .iter()
                .any(|target| compare(value, target, ty) == Some(Ordering::Equal)),
        }
    }
}

/// Orders a record value against a filter operand. Missing values and values
/// that cannot be brought to a common type are unordered.
fn compare(value: Option<&FieldValue>, target: &FieldValue, ty: SemanticType) -> Option<Ordering> {
    let value = value?;
    match ty {
        SemanticType::Date => Some(value.as_date()?.cmp(&target.as_date()?)),
        _ => match (value.as_number(), target.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(canonical_key(Some(value), ty)?.cmp(&target.display_value())),
        },
    }
}

// ============================================================================
// PIVOT CONFIG
// ============================================================================

/// Complete configuration of one pivot request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotConfig {
    /// Row dimensions, outermost first.
    pub row_fields: Vec<Field>,

    /// Optional column dimension.
    pub column_field: Option<Field>,

    /// Measures, in display order. Each is aggregated with its own
    /// default aggregation (sum when unset).
    pub measures: Vec<Field>,

    pub filters: Vec<FilterPredicate>,

    /// Fields formulas may reference besides the ones placed above,
    /// usually a snapshot of the field catalog.
    #[serde(skip)]
    pub reference_fields: Vec<Field>,
}

impl PivotConfig {
    pub fn new() -> Self {
        PivotConfig::default()
    }

    pub fn row(mut self, field: Field) -> Self {
        self.row_fields.push(field);
        self
    }

    pub fn column(mut self, field: Field) -> Self {
        self.column_field = Some(field);
        self
    }

    pub fn measure(mut self, field: Field) -> Self {
        self.measures.push(field);
        self
    }

    pub fn filter(mut self, predicate: FilterPredicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Makes every catalog field resolvable from calculated measures.
    pub fn with_catalog(mut self, catalog: &FieldCatalog) -> Self {
        self.reference_fields.extend(catalog.list_fields().cloned());
        self
    }

    /// All fields the engine may resolve by id while computing this pivot.
    ///
    /// Catalog entries go in last: a measure placed with an aggregation
    /// override must not change what `[Field]` means inside a formula.
    pub fn field_index(&self) -> FieldIndex<'_> {
        let mut index = FieldIndex::new();
        index.extend(self.measures.iter());
        index.extend(self.row_fields.iter());
        index.extend(self.column_field.iter());
        index.extend(self.filters.iter().map(|f| &f.field));
        index.extend(self.reference_fields.iter());
        index
    }

    /// Fields whose date values must parse for a record to take part.
    pub(crate) fn date_fields(&self) -> impl Iterator<Item = &Field> {
        self.row_fields
            .iter()
            .chain(self.column_field.iter())
            .chain(self.filters.iter().map(|f| &f.field))
            .filter(|f| f.semantic_type == SemanticType::Date)
    }

    /// Checks the config before any aggregation runs.
    ///
    /// Rejects duplicate measure ids, calculated measures carrying an
    /// aggregation other than `sum` (they are evaluated once per group, never
    /// folded) and calculated measures whose formulas (directly or through
    /// other calculated fields) reference a field that cannot be resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for measure in &self.measures {
            if !seen.insert(measure.id.as_str()) {
                return Err(ConfigError::DuplicateField(measure.id.clone()));
            }
            if measure.is_calculated() && measure.aggregation() != AggregationType::Sum {
                return Err(ConfigError::InvalidOption {
                    option: "aggregation",
                    value: format!(
                        "{} on calculated field {}",
                        measure.aggregation(),
                        measure.display_name
                    ),
                });
            }
        }

        let index = self.field_index();
        let mut visited = HashSet::new();
        let mut pending: Vec<&Field> = self.measures.iter().filter(|m| m.is_calculated()).collect();
        while let Some(field) = pending.pop() {
            if !visited.insert(field.id.as_str()) {
                continue;
            }
            for dependency in field.dependencies().into_iter().flatten() {
                let resolved = index.get(dependency).ok_or_else(|| ConfigError::UnknownField {
                    field: dependency.clone(),
                    role: "formula",
                })?;
                if resolved.is_calculated() {
                    pending.push(resolved);
                }
            }
        }
        Ok(())
    }
}
