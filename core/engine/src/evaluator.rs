//! FILENAME: core/engine/src/evaluator.rs
//! PURPOSE: Evaluates calculated-field ASTs to a number.
//! CONTEXT: After a formula is parsed into an AST, this module walks the tree
//! against an evaluation context. The context decides what a field reference
//! and an aggregation call mean: a single record, a group of records, or a
//! plain map of already-resolved values (see context.rs).
//!
//! SEMANTICS:
//! - Arithmetic operands must be numbers; booleans are a type mismatch
//! - A field that resolves to nothing counts as 0
//! - x / 0 and x % 0 are DivisionByZero, never Infinity or NaN
//! - IF, AND, OR short-circuit; the untaken branch is never evaluated
//! - Truthiness: TRUE or any nonzero number
//! - RD rounds to the nearest integer, ties away from zero

use parser::{AggregateFunction, BinaryOperator, BuiltinFunction, Expression, FieldId, UnaryOperator, Value};

use crate::error::EvalError;
use crate::field::Field;

/// Calculated fields may reference other calculated fields; nesting beyond
/// this depth is reported as `EvalError::RecursionLimit`.
pub const MAX_FORMULA_DEPTH: usize = 16;

/// An intermediate evaluation result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Number(f64),
    Boolean(bool),
}

impl Scalar {
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Number(n) => *n != 0.0,
            Scalar::Boolean(b) => *b,
        }
    }

    /// The numeric result of a whole formula: booleans become 1 or 0.
    pub fn to_number(self) -> f64 {
        match self {
            Scalar::Number(n) => n,
            Scalar::Boolean(true) => 1.0,
            Scalar::Boolean(false) => 0.0,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Scalar::Number(_) => "number",
            Scalar::Boolean(_) => "boolean",
        }
    }
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => Scalar::Number(n),
            Value::Boolean(b) => Scalar::Boolean(b),
        }
    }
}

/// What field references and aggregation calls resolve to.
///
/// `depth` is the calculated-field nesting depth of the caller. Contexts that
/// evaluate a nested calculated field pass it on to `evaluate_calculation`.
pub trait EvalContext {
    /// The value of `[field]`. `Ok(None)` means the field holds no value.
    fn field_value(&self, field: &FieldId, depth: usize) -> Result<Option<Scalar>, EvalError>;

    /// The value of `func("field")` over the records in scope.
    fn aggregate(&self, func: AggregateFunction, field: &FieldId, depth: usize) -> Result<f64, EvalError>;
}

/// Walks an AST against a context.
pub struct Evaluator<'a, C: EvalContext + ?Sized> {
    context: &'a C,
    depth: usize,
}

impl<'a, C: EvalContext + ?Sized> Evaluator<'a, C> {
    pub fn new(context: &'a C) -> Self {
        Evaluator { context, depth: 0 }
    }

    /// An evaluator for a formula nested `depth` calculated fields deep.
    pub fn with_depth(context: &'a C, depth: usize) -> Self {
        Evaluator { context, depth }
    }

    /// Evaluates an AST expression and returns the result.
    pub fn evaluate(&self, expr: &Expression) -> Result<Scalar, EvalError> {
        match expr {
            Expression::Literal(value) => Ok(Scalar::from(*value)),
            Expression::FieldRef(field) => Ok(self
                .context
                .field_value(field, self.depth)?
                .unwrap_or(Scalar::Number(0.0))),
            Expression::AggregateCall { func, field } => {
                self.context.aggregate(*func, field, self.depth).map(Scalar::Number)
            }
            Expression::BinaryOp { left, op, right } => self.eval_binary_op(left, *op, right),
            Expression::UnaryOp { op, operand } => self.eval_unary_op(*op, operand),
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => self.eval_conditional(condition, then_branch, else_branch),
            Expression::FunctionCall { func, args } => self.eval_function(*func, args),
        }
    }

    /// Evaluates an expression that must produce a number.
    fn eval_number(&self, expr: &Expression, operator: &str) -> Result<f64, EvalError> {
        match self.evaluate(expr)? {
            Scalar::Number(n) => Ok(n),
            other => Err(EvalError::TypeMismatch {
                operator: operator.to_string(),
                detail: format!("expected a number, found a {}", other.type_name()),
            }),
        }
    }

    // ==================== Operators ====================

    fn eval_binary_op(
        &self,
        left: &Expression,
        op: BinaryOperator,
        right: &Expression,
    ) -> Result<Scalar, EvalError> {
        match op {
            // Logical operators short-circuit on the left operand
            BinaryOperator::And => {
                if !self.evaluate(left)?.is_truthy() {
                    return Ok(Scalar::Boolean(false));
                }
                Ok(Scalar::Boolean(self.evaluate(right)?.is_truthy()))
            }
            BinaryOperator::Or => {
                if self.evaluate(left)?.is_truthy() {
                    return Ok(Scalar::Boolean(true));
                }
                Ok(Scalar::Boolean(self.evaluate(right)?.is_truthy()))
            }

            BinaryOperator::Equal | BinaryOperator::NotEqual => {
                let l = self.evaluate(left)?;
                let r = self.evaluate(right)?;
                let equal = match (l, r) {
                    (Scalar::Number(a), Scalar::Number(b)) => a == b,
                    (Scalar::Boolean(a), Scalar::Boolean(b)) => a == b,
                    _ => {
                        return Err(EvalError::TypeMismatch {
                            operator: op.to_string(),
                            detail: format!("cannot compare {} with {}", l.type_name(), r.type_name()),
                        })
                    }
                };
                Ok(Scalar::Boolean(if op == BinaryOperator::Equal { equal } else { !equal }))
            }

            BinaryOperator::LessThan
            | BinaryOperator::GreaterThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterEqual => {
                let name = op.to_string();
                let l = self.eval_number(left, &name)?;
                let r = self.eval_number(right, &name)?;
                let result = match op {
                    BinaryOperator::LessThan => l < r,
                    BinaryOperator::GreaterThan => l > r,
                    BinaryOperator::LessEqual => l <= r,
                    _ => l >= r,
                };
                Ok(Scalar::Boolean(result))
            }

            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo
            | BinaryOperator::Power => {
                let name = op.to_string();
                let l = self.eval_number(left, &name)?;
                let r = self.eval_number(right, &name)?;
                self.eval_arithmetic(op, l, r).map(Scalar::Number)
            }
        }
    }

    fn eval_arithmetic(&self, op: BinaryOperator, l: f64, r: f64) -> Result<f64, EvalError> {
        let result = match op {
            BinaryOperator::Add => l + r,
            BinaryOperator::Subtract => l - r,
            BinaryOperator::Multiply => l * r,
            BinaryOperator::Divide | BinaryOperator::Modulo if r == 0.0 => {
                return Err(EvalError::DivisionByZero)
            }
            BinaryOperator::Divide => l / r,
            BinaryOperator::Modulo => l % r,
            _ => l.powf(r),
        };

        if result.is_finite() {
            Ok(result)
        } else {
            Err(EvalError::NonFinite {
                operator: op.to_string(),
            })
        }
    }

    fn eval_unary_op(&self, op: UnaryOperator, operand: &Expression) -> Result<Scalar, EvalError> {
        match op {
            UnaryOperator::Negate => {
                let value = self.eval_number(operand, &op.to_string())?;
                Ok(Scalar::Number(-value))
            }
        }
    }

    fn eval_conditional(
        &self,
        condition: &Expression,
        then_branch: &Expression,
        else_branch: &Expression,
    ) -> Result<Scalar, EvalError> {
        if self.evaluate(condition)?.is_truthy() {
            self.evaluate(then_branch)
        } else {
            self.evaluate(else_branch)
        }
    }

    // ==================== Functions ====================

    fn eval_function(&self, func: BuiltinFunction, args: &[Expression]) -> Result<Scalar, EvalError> {
        match func {
            BuiltinFunction::Abs => self.fn_abs(args),
            BuiltinFunction::Rd => self.fn_rd(args),
            BuiltinFunction::Min => self.fn_reduce(func, args, f64::min),
            BuiltinFunction::Max => self.fn_reduce(func, args, f64::max),
            BuiltinFunction::And => self.fn_and(args),
            BuiltinFunction::Or => self.fn_or(args),
            BuiltinFunction::If => match args {
                [condition, then_branch, else_branch] => {
                    self.eval_conditional(condition, then_branch, else_branch)
                }
                _ => Err(arity_error(func, args)),
            },
        }
    }

    fn fn_abs(&self, args: &[Expression]) -> Result<Scalar, EvalError> {
        match args {
            [arg] => Ok(Scalar::Number(self.eval_number(arg, "ABS")?.abs())),
            _ => Err(arity_error(BuiltinFunction::Abs, args)),
        }
    }

    fn fn_rd(&self, args: &[Expression]) -> Result<Scalar, EvalError> {
        match args {
            // f64::round rounds half away from zero
            [arg] => Ok(Scalar::Number(self.eval_number(arg, "RD")?.round())),
            _ => Err(arity_error(BuiltinFunction::Rd, args)),
        }
    }

    fn fn_reduce(
        &self,
        func: BuiltinFunction,
        args: &[Expression],
        reduce: fn(f64, f64) -> f64,
    ) -> Result<Scalar, EvalError> {
        let (first, rest) = args.split_first().ok_or_else(|| arity_error(func, args))?;
        let mut acc = self.eval_number(first, func.name())?;
        for arg in rest {
            acc = reduce(acc, self.eval_number(arg, func.name())?);
        }
        Ok(Scalar::Number(acc))
    }

    fn fn_and(&self, args: &[Expression]) -> Result<Scalar, EvalError> {
        for arg in args {
            if !self.evaluate(arg)?.is_truthy() {
                return Ok(Scalar::Boolean(false));
            }
        }
        Ok(Scalar::Boolean(true))
    }

    fn fn_or(&self, args: &[Expression]) -> Result<Scalar, EvalError> {
        for arg in args {
            if self.evaluate(arg)?.is_truthy() {
                return Ok(Scalar::Boolean(true));
            }
        }
        Ok(Scalar::Boolean(false))
    }
}

fn arity_error(func: BuiltinFunction, args: &[Expression]) -> EvalError {
    EvalError::TypeMismatch {
        operator: func.name().to_string(),
        detail: format!("expects {} argument(s), found {}", func.arity(), args.len()),
    }
}

/// Evaluates a formula against a context and returns its numeric result.
pub fn evaluate<C: EvalContext + ?Sized>(expr: &Expression, context: &C) -> Result<f64, EvalError> {
    Evaluator::new(context).evaluate(expr).map(Scalar::to_number)
}

/// Evaluates a calculated field's formula at the given nesting depth.
/// Base fields have no formula and are reported as unknown.
pub fn evaluate_calculation<C: EvalContext + ?Sized>(
    field: &Field,
    context: &C,
    depth: usize,
) -> Result<f64, EvalError> {
    let calculation = field
        .calculation
        .as_ref()
        .ok_or_else(|| EvalError::UnknownField(field.id.clone()))?;

    if depth > MAX_FORMULA_DEPTH {
        log::warn!(target: "FORMULA", "nesting limit reached at {}", field.id);
        return Err(EvalError::RecursionLimit(field.id.clone()));
    }

    Evaluator::with_depth(context, depth)
        .evaluate(&calculation.ast)
        .map(Scalar::to_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ValueContext;
    use parser::parse;
    use std::cell::Cell;

    const FIELDS: [&str; 3] = ["A", "B", "C"];

    fn eval(formula: &str, context: &ValueContext) -> Result<f64, EvalError> {
        let expr = parse(formula, &FIELDS).unwrap();
        evaluate(&expr, context)
    }

    fn values(pairs: &[(&str, f64)]) -> ValueContext {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    /// Counts aggregation calls so tests can observe short-circuiting.
    struct CountingContext {
        calls: Cell<usize>,
    }

    impl EvalContext for CountingContext {
        fn field_value(&self, _field: &FieldId, _depth: usize) -> Result<Option<Scalar>, EvalError> {
            Ok(Some(Scalar::Number(-5.0)))
        }

        fn aggregate(&self, _func: AggregateFunction, _field: &FieldId, _depth: usize) -> Result<f64, EvalError> {
            self.calls.set(self.calls.get() + 1);
            Ok(100.0)
        }
    }

    #[test]
    fn test_field_arithmetic() {
        let ctx = values(&[("A", 3.0), ("B", 4.0)]);
        assert_eq!(eval("[A]+[B]", &ctx), Ok(7.0));
        assert_eq!(eval("[A] * [B] - 2", &ctx), Ok(10.0));
        assert_eq!(eval("-[A] ^ 2", &ctx), Ok(-9.0));
        assert_eq!(eval("[B] % 3", &ctx), Ok(1.0));
    }

    #[test]
    fn test_missing_field_is_zero() {
        let ctx = values(&[("A", 3.0)]);
        assert_eq!(eval("[A] + [C]", &ctx), Ok(3.0));
    }

    #[test]
    fn test_division_by_zero() {
        let ctx = values(&[("A", 3.0), ("B", 0.0)]);
        assert_eq!(eval("[A]/[B]", &ctx), Err(EvalError::DivisionByZero));
        assert_eq!(eval("[A] % [B]", &ctx), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_non_finite_power() {
        let ctx = values(&[("A", -8.0)]);
        assert!(matches!(eval("[A] ^ 0.5", &ctx), Err(EvalError::NonFinite { .. })));
    }

    #[test]
    fn test_boolean_arithmetic_is_type_mismatch() {
        let ctx = values(&[]);
        assert!(matches!(eval("TRUE + 1", &ctx), Err(EvalError::TypeMismatch { .. })));
        assert!(matches!(eval("(1 > 0) == 1", &ctx), Err(EvalError::TypeMismatch { .. })));
    }

    #[test]
    fn test_if_takes_else_branch() {
        let ctx = values(&[("A", -5.0)]);
        assert_eq!(eval("IF([A]>0,[A],0)", &ctx), Ok(0.0));
        assert_eq!(eval("IF([A],1,2)", &ctx), Ok(1.0));
    }

    #[test]
    fn test_if_never_evaluates_untaken_branch() {
        let expr = parse("IF([A]>0, sum(\"A\"), 0)", &FIELDS).unwrap();
        let ctx = CountingContext { calls: Cell::new(0) };

        assert_eq!(evaluate(&expr, &ctx), Ok(0.0));
        assert_eq!(ctx.calls.get(), 0);
    }

    #[test]
    fn test_logical_short_circuit() {
        let ctx = CountingContext { calls: Cell::new(0) };
        let expr = parse("[A] > 0 AND sum(\"A\") > 0", &FIELDS).unwrap();
        assert_eq!(evaluate(&expr, &ctx), Ok(0.0));

        let expr = parse("OR([A] < 0, sum(\"A\"), max(\"B\"))", &FIELDS).unwrap();
        assert_eq!(evaluate(&expr, &ctx), Ok(1.0));
        assert_eq!(ctx.calls.get(), 0);
    }

    #[test]
    fn test_functions() {
        let ctx = values(&[("A", -2.5), ("B", 2.5)]);
        assert_eq!(eval("ABS([A])", &ctx), Ok(2.5));
        assert_eq!(eval("RD([A])", &ctx), Ok(-3.0));
        assert_eq!(eval("RD([B])", &ctx), Ok(3.0));
        assert_eq!(eval("MIN([A], [B], 0)", &ctx), Ok(-2.5));
        assert_eq!(eval("MAX([A], [B], 0)", &ctx), Ok(2.5));
        assert_eq!(eval("AND([A], [B])", &ctx), Ok(1.0));
        assert_eq!(eval("AND([A], [C])", &ctx), Ok(0.0));
    }

    #[test]
    fn test_comparison_result_is_one_or_zero() {
        let ctx = values(&[("A", 1.0), ("B", 2.0)]);
        assert_eq!(eval("[A] < [B]", &ctx), Ok(1.0));
        assert_eq!(eval("[A] >= [B]", &ctx), Ok(0.0));
        assert_eq!(eval("[A] != [B]", &ctx), Ok(1.0));
    }

    #[test]
    fn test_recursion_limit() {
        let field = Field::calculated("calc_x", "X", "1 + 1", &FIELDS).unwrap();
        let ctx = values(&[]);
        assert_eq!(evaluate_calculation(&field, &ctx, 0), Ok(2.0));
        assert_eq!(
            evaluate_calculation(&field, &ctx, MAX_FORMULA_DEPTH + 1),
            Err(EvalError::RecursionLimit("calc_x".to_string()))
        );
    }
}
