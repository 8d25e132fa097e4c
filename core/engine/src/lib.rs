//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the field and formula engine.
//! CONTEXT: Re-exports the field catalog, the record model, the formula
//! evaluator and its contexts, and the error taxonomy used by the pivot engine.

pub mod aggregate;
pub mod catalog;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod field;
pub mod record;

// Re-export commonly used types at the crate root
pub use aggregate::{aggregate_field, Accumulator};
pub use catalog::FieldCatalog;
pub use context::{FieldIndex, GroupContext, RecordContext, ValueContext};
pub use error::{ConfigError, DataError, EvalError};
pub use evaluator::{evaluate, evaluate_calculation, EvalContext, Evaluator, Scalar, MAX_FORMULA_DEPTH};
pub use field::{AggregationType, Calculation, Field, SemanticType};
pub use record::{canonical_key, numeric_or_zero, parse_date, FieldValue, Record, DATE_KEY_FORMAT};

pub use parser::{FieldId, ParseError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_authors_and_evaluates_a_calculated_field() {
        let mut catalog = FieldCatalog::financial();
        let field = catalog
            .create_calculated_field("calc_1", "Diferença", "[Valor da Conta] - [A Pagar ou Receber]")
            .unwrap()
            .clone();

        let records = vec![
            Record::new().with("valorConta", 55724.87).with("aPagarReceber", 32185.75),
            Record::new().with("valorConta", 67500.0).with("aPagarReceber", 45000.0),
        ];
        let group: Vec<&Record> = records.iter().collect();
        let index = FieldIndex::from(&catalog);
        let ctx = GroupContext::new(&group, &index);

        let value = evaluate_calculation(&field, &ctx, 0).unwrap();
        assert!((value - 46039.12).abs() < 1e-6);
    }

    #[test]
    fn it_rejects_code_injection() {
        let catalog = FieldCatalog::financial();
        assert!(!catalog.is_well_formed("2+2; DROP ALL"));
        assert!(!catalog.is_well_formed("process.exit(1)"));
        assert!(!catalog.is_well_formed("[Valor da Conta] + alert(\"x\")"));
    }
}
