//! FILENAME: core/parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for calculated-field formulas.
//! CONTEXT: After the Lexer tokenizes a formula string, the Parser converts
//! those tokens into this tree structure. The Evaluator then traverses
//! this tree to compute a number for one record or one group of records.
//!
//! SUPPORTED EXPRESSIONS:
//! - Literals: Numbers, Booleans (TRUE / FALSE)
//! - Field references: [Valor da Conta] (resolved to a field id at parse time)
//! - Aggregation calls: sum("Valor da Conta"), count(..), avg(..), min(..), max(..)
//! - Binary operations: OR, AND, == != < > <= >=, + -, * / %, ^
//! - Unary operations: - (negation)
//! - Conditionals: IF(condition, then, else)
//! - Function calls: ABS, MIN, MAX, RD, OR, AND

/// Identifier of a field, as registered in the field catalog.
pub type FieldId = String;

/// Represents a parsed formula expression.
/// Immutable once parsed; every field reference already points at a known field id.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A literal value: number or boolean.
    Literal(Value),

    /// A bracketed field reference like [Valor da Conta].
    FieldRef(FieldId),

    /// An aggregation over a field across the records of the current group,
    /// like sum("Valor da Conta").
    AggregateCall {
        func: AggregateFunction,
        field: FieldId,
    },

    /// A binary operation: left op right (e.g., 5 + 3, [A] > 10).
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand (e.g., -5).
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// IF(condition, then, else). Only the selected branch is ever evaluated.
    Conditional {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },

    /// A call to one of the built-in functions, e.g. ABS([A]) or MAX([A], [B], 0).
    FunctionCall {
        func: BuiltinFunction,
        args: Vec<Expression>,
    },
}

/// Literal values that can appear in formulas.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Value {
    Number(f64),
    Boolean(bool),
}

/// Aggregations usable inside a formula: fn("Field Display Name").
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AggregateFunction {
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    /// Looks up an aggregation by name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(AggregateFunction::Sum),
            "count" => Some(AggregateFunction::Count),
            "avg" => Some(AggregateFunction::Avg),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Count => "count",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }
}

/// The closed set of functions a formula may call.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum BuiltinFunction {
    Abs,
    Min,
    Max,
    /// Round to nearest integer, ties away from zero.
    Rd,
    If,
    Or,
    And,
}

/// Accepted argument counts for a builtin function.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

impl BuiltinFunction {
    /// Looks up a function by its (already upper-cased) name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ABS" => Some(BuiltinFunction::Abs),
            "MIN" => Some(BuiltinFunction::Min),
            "MAX" => Some(BuiltinFunction::Max),
            "RD" => Some(BuiltinFunction::Rd),
            "IF" => Some(BuiltinFunction::If),
            "OR" => Some(BuiltinFunction::Or),
            "AND" => Some(BuiltinFunction::And),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFunction::Abs => "ABS",
            BuiltinFunction::Min => "MIN",
            BuiltinFunction::Max => "MAX",
            BuiltinFunction::Rd => "RD",
            BuiltinFunction::If => "IF",
            BuiltinFunction::Or => "OR",
            BuiltinFunction::And => "AND",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            BuiltinFunction::Abs | BuiltinFunction::Rd => Arity::Exactly(1),
            BuiltinFunction::If => Arity::Exactly(3),
            BuiltinFunction::Min
            | BuiltinFunction::Max
            | BuiltinFunction::Or
            | BuiltinFunction::And => Arity::AtLeast(2),
        }
    }
}

/// Binary operators for expressions.
/// Listed in order of precedence groups (logical is lowest).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    // Logical operators (lowest precedence)
    Or,  // OR, ||
    And, // AND, &&

    // Comparison operators
    Equal,        // ==
    NotEqual,     // !=
    LessThan,     // <
    GreaterThan,  // >
    LessEqual,    // <=
    GreaterEqual, // >=

    // Arithmetic operators
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
    Modulo,   // %
    Power,    // ^ (highest precedence among binary ops)
}

/// Unary operators.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Negate, // -
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Or => write!(f, "OR"),
            BinaryOperator::And => write!(f, "AND"),
            BinaryOperator::Equal => write!(f, "=="),
            BinaryOperator::NotEqual => write!(f, "!="),
            BinaryOperator::LessThan => write!(f, "<"),
            BinaryOperator::GreaterThan => write!(f, ">"),
            BinaryOperator::LessEqual => write!(f, "<="),
            BinaryOperator::GreaterEqual => write!(f, ">="),
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
            BinaryOperator::Modulo => write!(f, "%"),
            BinaryOperator::Power => write!(f, "^"),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}
