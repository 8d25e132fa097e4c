//! FILENAME: core/engine/src/record.rs
//! PURPOSE: Defines the flat record and the tagged value each field holds.
//! CONTEXT: Records are the raw rows fed to the pivot engine. They are never
//! mutated; grouping, filtering and aggregation read them through the
//! coercion helpers below (canonical key, numeric value, date value).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use parser::FieldId;
use serde::{Deserialize, Serialize};

use crate::field::SemanticType;

/// Format used for canonical date keys and labels.
pub const DATE_KEY_FORMAT: &str = "%d/%m/%Y";

/// The value a record holds for one field.
/// Deserializes from plain JSON scalars; ISO dates ("2025-03-23") become `Date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    /// Numeric view of the value: numbers as-is, numeric text parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Date view of the value: dates as-is, text parsed with `parse_date`.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// Plain string representation, independent of the field's semantic type.
    pub fn display_value(&self) -> String {
        match self {
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Date(d) => d.format(DATE_KEY_FORMAT).to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

/// Parses the date spellings found in source data: `yyyy-MM-dd`,
/// `dd/MM/yyyy` and RFC 3339 timestamps (the date part is kept).
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, DATE_KEY_FORMAT))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// The deterministic grouping key of a value read from a field of the given type.
///
/// Missing values group under the empty string. Returns None only when a
/// date-typed field holds text that is not a date.
pub fn canonical_key(value: Option<&FieldValue>, semantic_type: SemanticType) -> Option<String> {
    match (value, semantic_type) {
        (None, _) => Some(String::new()),
        (Some(FieldValue::Text(s)), SemanticType::Date) if s.trim().is_empty() => {
            Some(String::new())
        }
        (Some(FieldValue::Text(s)), SemanticType::Date) => {
            parse_date(s).map(|d| d.format(DATE_KEY_FORMAT).to_string())
        }
        (Some(v), _) => Some(v.display_value()),
    }
}

/// Numeric value used by base aggregations: non-numeric and missing count as 0.
pub fn numeric_or_zero(value: Option<&FieldValue>) -> f64 {
    value.and_then(FieldValue::as_number).unwrap_or(0.0)
}

/// A flat mapping of field id to value. One row of source data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: BTreeMap<FieldId, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    /// Builder-style insert, handy for fixtures.
    pub fn with(mut self, field: impl Into<FieldId>, value: impl Into<FieldValue>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&FieldId, &FieldValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<FieldId>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
