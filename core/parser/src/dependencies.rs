//! FILENAME: core/parser/src/dependencies.rs
//! PURPOSE: Extracts field references from parsed AST expressions.
//! CONTEXT: After a formula is parsed, this module walks the tree to find
//! every field it reads, through brackets or aggregation calls. The result
//! is stored with the calculated field and used to build evaluation contexts.

use std::collections::BTreeSet;

use crate::ast::{Expression, FieldId};

/// Collects the ids of all fields referenced by `expr`.
/// The walk is pure: running it twice on the same tree yields the same set.
pub fn extract_dependencies(expr: &Expression) -> BTreeSet<FieldId> {
    let mut deps = BTreeSet::new();
    collect(expr, &mut deps);
    deps
}

fn collect(expr: &Expression, deps: &mut BTreeSet<FieldId>) {
    match expr {
        Expression::Literal(_) => {}
        Expression::FieldRef(field) => {
            deps.insert(field.clone());
        }
        Expression::AggregateCall { field, .. } => {
            deps.insert(field.clone());
        }
        Expression::BinaryOp { left, right, .. } => {
            collect(left, deps);
            collect(right, deps);
        }
        Expression::UnaryOp { operand, .. } => collect(operand, deps),
        Expression::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            collect(condition, deps);
            collect(then_branch, deps);
            collect(else_branch, deps);
        }
        Expression::FunctionCall { args, .. } => {
            for arg in args {
                collect(arg, deps);
            }
        }
    }
}
