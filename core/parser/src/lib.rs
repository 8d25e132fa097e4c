//! FILENAME: core/parser/src/lib.rs
//! PURPOSE: Library root for the calculated-field formula parser.
//! CONTEXT: This module exposes the lexer, parser, and AST components
//! needed to convert formula strings into evaluatable expression trees.
//!
//! PIPELINE: Formula String --> Lexer --> Tokens --> Parser --> AST --> Evaluator
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /, %, ^ (power)
//! - Comparison: ==, !=, <, >, <=, >=
//! - Logical: AND / &&, OR / ||
//! - Field references: [Valor da Conta]
//! - Aggregation calls: sum("Valor da Conta"), count, avg, min, max
//! - Function calls: ABS, MIN, MAX, RD, IF, OR, AND
//! - Parentheses for grouping
//! - Unary negation: -5

pub mod ast;
pub mod dependencies;
pub mod lexer;
pub mod parser;
pub mod token;


// Re-export commonly used types for convenience
pub use ast::{
    AggregateFunction, Arity, BinaryOperator, BuiltinFunction, Expression, FieldId,
    UnaryOperator, Value,
};
pub use dependencies::extract_dependencies;
pub use lexer::Lexer;
pub use parser::{
    is_well_formed, parse, FieldLookup, ParseError, ParseResult, Parser, MAX_NESTING_DEPTH,
};
pub use token::Token;
