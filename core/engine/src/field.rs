//! FILENAME: core/engine/src/field.rs
//! PURPOSE: Field definitions: base fields and calculated fields.
//! CONTEXT: A field is immutable once created. Calculated fields carry their
//! formula text, the parsed AST and the set of field ids the AST references.

use std::collections::BTreeSet;
use std::fmt;

use parser::{extract_dependencies, AggregateFunction, Expression, FieldId, FieldLookup};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConfigError;

/// The semantic type of the values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Number,
    Date,
    Boolean,
}

/// Aggregation applied to a measure over the records of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationType {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    DistinctCount,
}

impl AggregationType {
    /// Parses the wire name of an aggregation (`sum`, `avg`, `distinctCount`, ...).
    /// Case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(AggregationType::Sum),
            "avg" | "average" => Some(AggregationType::Avg),
            "min" => Some(AggregationType::Min),
            "max" => Some(AggregationType::Max),
            "count" => Some(AggregationType::Count),
            "distinctcount" => Some(AggregationType::DistinctCount),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregationType::Sum => "sum",
            AggregationType::Avg => "avg",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::Count => "count",
            AggregationType::DistinctCount => "distinctCount",
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<AggregateFunction> for AggregationType {
    fn from(func: AggregateFunction) -> Self {
        match func {
            AggregateFunction::Sum => AggregationType::Sum,
            AggregateFunction::Count => AggregationType::Count,
            AggregateFunction::Avg => AggregationType::Avg,
            AggregateFunction::Min => AggregationType::Min,
            AggregateFunction::Max => AggregationType::Max,
        }
    }
}

/// The formula part of a calculated field.
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    pub formula: String,
    pub ast: Expression,
    /// Exactly the field ids reachable from `ast`.
    pub dependencies: BTreeSet<FieldId>,
}

impl Calculation {
    /// Parses `formula` against `fields` and extracts its dependencies.
    pub fn compile<F: FieldLookup + ?Sized>(
        formula: &str,
        fields: &F,
    ) -> Result<Self, parser::ParseError> {
        let ast = parser::parse(formula, fields)?;
        let dependencies = extract_dependencies(&ast);
        Ok(Calculation {
            formula: formula.to_string(),
            ast,
            dependencies,
        })
    }
}

// The AST stays in-process; only the formula and its dependencies cross the wire.
impl Serialize for Calculation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Calculation", 2)?;
        state.serialize_field("formula", &self.formula)?;
        state.serialize_field("dependencies", &self.dependencies)?;
        state.end()
    }
}

/// A field of the catalog. Base fields have no calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: FieldId,
    pub display_name: String,
    pub semantic_type: SemanticType,
    pub default_aggregation: Option<AggregationType>,
    #[serde(flatten)]
    pub calculation: Option<Calculation>,
}

impl Field {
    /// Creates a base field.
    pub fn new(id: impl Into<FieldId>, display_name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Field {
            id: id.into(),
            display_name: display_name.into(),
            semantic_type,
            default_aggregation: None,
            calculation: None,
        }
    }

    pub fn with_aggregation(mut self, aggregation: AggregationType) -> Self {
        self.default_aggregation = Some(aggregation);
        self
    }

    /// Creates a calculated field: semantic type `number`, default aggregation `sum`.
    /// Fails with `InvalidFormula` if the formula does not parse against `fields`.
    pub fn calculated<F: FieldLookup + ?Sized>(
        id: impl Into<FieldId>,
        display_name: impl Into<String>,
        formula: &str,
        fields: &F,
    ) -> Result<Self, ConfigError> {
        let display_name = display_name.into();
        let calculation =
            Calculation::compile(formula, fields).map_err(|source| ConfigError::InvalidFormula {
                field: display_name.clone(),
                formula: formula.to_string(),
                source,
            })?;

        Ok(Field {
            id: id.into(),
            display_name,
            semantic_type: SemanticType::Number,
            default_aggregation: Some(AggregationType::Sum),
            calculation: Some(calculation),
        })
    }

    /// The aggregation used when the field is a measure without an explicit override.
    pub fn aggregation(&self) -> AggregationType {
        self.default_aggregation.unwrap_or(AggregationType::Sum)
    }

    pub fn is_calculated(&self) -> bool {
        self.calculation.is_some()
    }

    pub fn dependencies(&self) -> Option<&BTreeSet<FieldId>> {
        self.calculation.as_ref().map(|c| &c.dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn aggregation_names_round_trip() {
        for agg in [
            AggregationType::Sum,
            AggregationType::Avg,
            AggregationType::Min,
            AggregationType::Max,
            AggregationType::Count,
            AggregationType::DistinctCount,
        ] {
            assert_eq!(AggregationType::from_name(agg.name()), Some(agg));
        }
        assert_eq!(AggregationType::from_name("median"), None);
    }

    #[test]
    fn calculated_field_defaults() {
        let fields = ["Valor da Conta", "Juros (%)"];
        let field = Field::calculated(
            "calc_1",
            "Juros",
            "[Valor da Conta] * [Juros (%)] / 100",
            &fields,
        )
        .unwrap();

        assert!(field.is_calculated());
        assert_eq!(field.semantic_type, SemanticType::Number);
        assert_eq!(field.aggregation(), AggregationType::Sum);
        let deps: Vec<&str> = field.dependencies().unwrap().iter().map(|s| s.as_str()).collect();
        assert_eq!(deps, vec!["Juros (%)", "Valor da Conta"]);
    }

    #[test]
    fn calculated_field_rejects_bad_formula() {
        let err = Field::calculated("calc_1", "Broken", "[Nope] + 1", &["A"]).unwrap_err();
        match err {
            ConfigError::InvalidFormula { field, formula, source } => {
                assert_eq!(field, "Broken");
                assert_eq!(formula, "[Nope] + 1");
                assert_eq!(source, parser::ParseError::UnknownField("Nope".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn serializes_without_ast() {
        let field = Field::calculated("calc_1", "Double", "[A] * 2", &["A"]).unwrap();
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "calc_1",
                "displayName": "Double",
                "semanticType": "number",
                "defaultAggregation": "sum",
                "formula": "[A] * 2",
                "dependencies": ["A"],
            })
        );
    }
}
