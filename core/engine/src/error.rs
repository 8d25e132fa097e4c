//! FILENAME: core/engine/src/error.rs
//! PURPOSE: Error taxonomy shared by the catalog, the evaluator and the pivot engine.
//! CONTEXT: Every error here is local to one formula, one record or one config
//! entry. Config errors are raised before aggregation runs; evaluation and data
//! errors are reported next to the result instead of aborting it.

use parser::{FieldId, ParseError};
use serde::Serialize;
use thiserror::Error;

/// Runtime fault while evaluating a formula for one record or group.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("type mismatch for '{operator}': {detail}")]
    TypeMismatch { operator: String, detail: String },

    #[error("field {field} holds '{value}', which is not a number")]
    NotNumeric { field: FieldId, value: String },

    #[error("'{operator}' produced a non-finite result")]
    NonFinite { operator: String },

    #[error("unknown field: {0}")]
    UnknownField(FieldId),

    #[error("formula nesting too deep while evaluating {0}")]
    RecursionLimit(FieldId),
}

/// A field catalog entry or pivot configuration that cannot be applied.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("duplicate field id: {0}")]
    DuplicateField(FieldId),

    #[error("unknown {role} field: {field}")]
    UnknownField { field: FieldId, role: &'static str },

    #[error("field {0} is not a calculated field")]
    NotCalculated(FieldId),

    #[error("invalid formula for {field} ({formula}): {source}")]
    InvalidFormula {
        field: String,
        formula: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid {option}: {value}")]
    InvalidOption { option: &'static str, value: String },
}

/// A record that cannot take part in aggregation. The record is skipped.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum DataError {
    #[error("record {record}: field {field} holds '{value}', which is not a date")]
    InvalidDate {
        record: usize,
        field: FieldId,
        value: String,
    },
}
