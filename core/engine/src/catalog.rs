//! FILENAME: core/engine/src/catalog.rs
//! PURPOSE: The field catalog: base fields plus registered calculated fields.
//! CONTEXT: Both the formula parser (field name resolution) and the pivot
//! engine (measure and dimension lookup) read fields through the catalog.
//! Listing order is stable: base fields in declaration order, then calculated
//! fields in registration order.

use parser::{FieldId, FieldLookup};

use crate::error::ConfigError;
use crate::field::{AggregationType, Field, SemanticType};

const LOG_TARGET: &str = "CATALOG";

#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    base: Vec<Field>,
    calculated: Vec<Field>,
}

impl FieldCatalog {
    /// Creates a catalog over the given base fields.
    pub fn new(base: Vec<Field>) -> Self {
        FieldCatalog {
            base,
            calculated: Vec::new(),
        }
    }

    /// The ten base fields of a financial payables/receivables dataset.
    pub fn financial() -> Self {
        FieldCatalog::new(vec![
            Field::new("dataPrevisao", "Data de Previsão", SemanticType::Date),
            Field::new("clienteFornecedor", "Cliente ou Fornecedor", SemanticType::String),
            Field::new("telefone", "Telefone 1", SemanticType::String),
            Field::new("tipo", "Tipo", SemanticType::String),
            Field::new("valorConta", "Valor da Conta", SemanticType::Number)
                .with_aggregation(AggregationType::Sum),
            Field::new("aPagarReceber", "A Pagar ou Receber", SemanticType::Number)
                .with_aggregation(AggregationType::Sum),
            Field::new("jurosPercentual", "% de Juros ao Mês do Boleto", SemanticType::Number)
                .with_aggregation(AggregationType::Avg),
            Field::new("multaPercentual", "% de Multa por Atraso do Boleto", SemanticType::Number)
                .with_aggregation(AggregationType::Avg),
            Field::new("banco", "Banco para Transferência", SemanticType::String),
            Field::new("agencia", "Agência para Transferência", SemanticType::String),
        ])
    }

    /// All fields: base fields first, then calculated fields in registration order.
    pub fn list_fields(&self) -> impl Iterator<Item = &Field> {
        self.base.iter().chain(self.calculated.iter())
    }

    pub fn base_fields(&self) -> &[Field] {
        &self.base
    }

    pub fn calculated_fields(&self) -> &[Field] {
        &self.calculated
    }

    pub fn len(&self) -> usize {
        self.base.len() + self.calculated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a field by id.
    pub fn get(&self, id: &str) -> Option<&Field> {
        self.list_fields().find(|f| f.id == id)
    }

    /// Looks up a field by display name, falling back to id.
    pub fn find(&self, name: &str) -> Option<&Field> {
        self.list_fields()
            .find(|f| f.display_name == name)
            .or_else(|| self.get(name))
    }

    /// Registers a calculated field.
    /// Fails if the field is not calculated, its id contains `::` (reserved
    /// as the cross-tab key separator), or its id or display name is taken.
    pub fn register(&mut self, field: Field) -> Result<(), ConfigError> {
        if !field.is_calculated() {
            return Err(ConfigError::NotCalculated(field.id));
        }
        if field.id.contains("::") {
            return Err(ConfigError::InvalidOption {
                option: "field id",
                value: field.id,
            });
        }
        if self.get(&field.id).is_some() {
            log::warn!(target: LOG_TARGET, "register rejected, duplicate id {}", field.id);
            return Err(ConfigError::DuplicateField(field.id));
        }
        if self.list_fields().any(|f| f.display_name == field.display_name) {
            log::warn!(
                target: LOG_TARGET,
                "register rejected, duplicate display name '{}'",
                field.display_name
            );
            return Err(ConfigError::DuplicateField(field.display_name));
        }

        log::debug!(
            target: LOG_TARGET,
            "registered {} '{}' deps={:?}",
            field.id,
            field.display_name,
            field.dependencies()
        );
        self.calculated.push(field);
        Ok(())
    }

    /// Parses `formula` against the current catalog and registers the result.
    pub fn create_calculated_field(
        &mut self,
        id: impl Into<FieldId>,
        display_name: impl Into<String>,
        formula: &str,
    ) -> Result<&Field, ConfigError> {
        let field = Field::calculated(id, display_name, formula, &*self)?;
        let id = field.id.clone();
        self.register(field)?;
        self.get(&id).ok_or(ConfigError::UnknownField {
            field: id,
            role: "calculated",
        })
    }

    /// Removes a calculated field. Calculated fields that reference it are left in place.
    pub fn remove(&mut self, id: &str) -> Result<Field, ConfigError> {
        match self.calculated.iter().position(|f| f.id == id) {
            Some(index) => {
                let removed = self.calculated.remove(index);
                let dependents: Vec<&str> = self
                    .calculated
                    .iter()
                    .filter(|f| f.dependencies().is_some_and(|deps| deps.contains(id)))
                    .map(|f| f.id.as_str())
                    .collect();
                if !dependents.is_empty() {
                    log::warn!(
                        target: LOG_TARGET,
                        "removed {} which is still referenced by {:?}",
                        id,
                        dependents
                    );
                }
                Ok(removed)
            }
            None if self.base.iter().any(|f| f.id == id) => {
                Err(ConfigError::NotCalculated(id.to_string()))
            }
            None => Err(ConfigError::UnknownField {
                field: id.to_string(),
                role: "calculated",
            }),
        }
    }

    /// True when `formula` parses against the current catalog.
    pub fn is_well_formed(&self, formula: &str) -> bool {
        parser::is_well_formed(formula, self)
    }
}

impl FieldLookup for FieldCatalog {
    fn resolve_field(&self, name: &str) -> Option<FieldId> {
        self.find(name).map(|f| f.id.clone())
    }
}
