//! FILENAME: core/parser/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into an AST.
//! CONTEXT: This is the second stage of the parsing pipeline. It takes tokens
//! from the Lexer and builds an Expression tree that can be evaluated.
//! Nothing here evaluates anything: a formula either fits the closed grammar
//! below or is rejected with a ParseError.
//!
//! GRAMMAR:
//!   expression     --> or
//!   or             --> and ( ("OR" | "||") and )*
//!   and            --> comparison ( ("AND" | "&&") comparison )*
//!   comparison     --> additive ( ("==" | "!=" | "<" | ">" | "<=" | ">=") additive )*
//!   additive       --> multiplicative ( ("+" | "-") multiplicative )*
//!   multiplicative --> unary ( ("*" | "/" | "%") unary )*
//!   unary          --> "-" unary | power
//!   power          --> primary ( "^" unary )?
//!   primary        --> NUMBER | BOOLEAN | FIELD_REF | aggregate_call | function_call | "(" expression ")"
//!   aggregate_call --> ("sum" | "count" | "avg" | "min" | "max") "(" STRING ")"
//!   function_call  --> ("ABS" | "MIN" | "MAX" | "RD" | "IF" | "OR" | "AND") "(" arguments ")"
//!   arguments      --> expression ("," expression)*
//!
//! Nesting is bounded by MAX_NESTING_DEPTH: deeper formulas are rejected with
//! ParseError::NestingTooDeep instead of exhausting the stack.

use thiserror::Error;

use crate::ast::{
    AggregateFunction, Arity, BinaryOperator, BuiltinFunction, Expression, FieldId,
    UnaryOperator, Value,
};
use crate::lexer::Lexer;
use crate::token::Token;

/// Reasons a formula is rejected. Positions are character offsets into the formula.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParseError {
    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), found {found}")]
    ArityMismatch {
        function: String,
        expected: Arity,
        found: usize,
    },

    #[error("unbalanced parentheses at position {position}")]
    UnbalancedParens { position: usize },

    #[error("formula nests deeper than {limit} levels at position {position}")]
    NestingTooDeep { limit: usize, position: usize },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Deepest nesting a formula may reach, counted both as parser recursion
/// (parentheses, call arguments, unary chains) and as depth of the resulting tree.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Resolves the field names written in a formula to field ids.
pub trait FieldLookup {
    /// Returns the id of the field called `name`, or None if no such field exists.
    fn resolve_field(&self, name: &str) -> Option<FieldId>;
}

impl FieldLookup for [&str] {
    fn resolve_field(&self, name: &str) -> Option<FieldId> {
        self.iter().find(|f| **f == name).map(|f| f.to_string())
    }
}

impl<const N: usize> FieldLookup for [&str; N] {
    fn resolve_field(&self, name: &str) -> Option<FieldId> {
        self.as_slice().resolve_field(name)
    }
}

impl FieldLookup for Vec<String> {
    fn resolve_field(&self, name: &str) -> Option<FieldId> {
        self.iter().find(|f| f.as_str() == name).cloned()
    }
}

/// The Parser struct holds the lexer, the field lookup and current token state.
pub struct Parser<'a, F: FieldLookup + ?Sized> {
    lexer: Lexer<'a>,
    fields: &'a F,
    current_token: Token,
    current_position: usize,
    /// Current recursion depth through `parse_unary`.
    nesting: usize,
    /// Tree depth of the expression most recently returned by a parse method.
    last_depth: usize,
}

impl<'a, F: FieldLookup + ?Sized> Parser<'a, F> {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &'a str, fields: &'a F) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        let current_position = lexer.token_start();
        Parser {
            lexer,
            fields,
            current_token,
            current_position,
            nesting: 0,
            last_depth: 0,
        }
    }

    /// Parses the entire input and returns the AST.
    pub fn parse(&mut self) -> ParseResult<Expression> {
        let expr = self.parse_expression()?;

        // Ensure we consumed all tokens
        match self.current_token {
            Token::EOF => Ok(expr),
            Token::RParen => Err(ParseError::UnbalancedParens {
                position: self.current_position,
            }),
            _ => Err(self.unexpected()),
        }
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
        self.current_position = self.lexer.token_start();
    }

    fn unexpected(&self) -> ParseError {
        ParseError::UnexpectedToken {
            found: self.current_token.to_string(),
            position: self.current_position,
        }
    }

    fn too_deep(&self) -> ParseError {
        ParseError::NestingTooDeep {
            limit: MAX_NESTING_DEPTH,
            position: self.current_position,
        }
    }

    /// Tree depth of a node whose deepest child has depth `child_depth`.
    fn node_depth(&self, child_depth: usize) -> ParseResult<usize> {
        if child_depth >= MAX_NESTING_DEPTH {
            return Err(self.too_deep());
        }
        Ok(child_depth + 1)
    }

    /// Folds `left op right` into a node, tracking the depth of the left spine.
    fn fold(
        &mut self,
        left: Expression,
        left_depth: &mut usize,
        op: BinaryOperator,
        right: Expression,
    ) -> ParseResult<Expression> {
        *left_depth = self.node_depth((*left_depth).max(self.last_depth))?;
        Ok(binary(left, op, right))
    }

    /// Consumes a closing parenthesis; running out of input means the
    /// parentheses do not balance.
    fn expect_rparen(&mut self) -> ParseResult<()> {
        match self.current_token {
            Token::RParen => {
                self.advance();
                Ok(())
            }
            Token::EOF => Err(ParseError::UnbalancedParens {
                position: self.current_position,
            }),
            _ => Err(self.unexpected()),
        }
    }

    /// Entry point for expression parsing.
    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_and()?;
        let mut left_depth = self.last_depth;

        while self.current_token == Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = self.fold(left, &mut left_depth, BinaryOperator::Or, right)?;
        }

        self.last_depth = left_depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_comparison()?;
        let mut left_depth = self.last_depth;

        while self.current_token == Token::And {
            self.advance();
            let right = self.parse_comparison()?;
            left = self.fold(left, &mut left_depth, BinaryOperator::And, right)?;
        }

        self.last_depth = left_depth;
        Ok(left)
    }

    /// Parses comparison expressions (==, !=, <, >, <=, >=).
    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_additive()?;
        let mut left_depth = self.last_depth;

        loop {
            let op = match &self.current_token {
                Token::EqualEqual => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.advance();
            let right = self.parse_additive()?;
            left = self.fold(left, &mut left_depth, op, right)?;
        }

        self.last_depth = left_depth;
        Ok(left)
    }

    /// Parses additive expressions (+ and -).
    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative()?;
        let mut left_depth = self.last_depth;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.fold(left, &mut left_depth, op, right)?;
        }

        self.last_depth = left_depth;
        Ok(left)
    }

    /// Parses multiplicative expressions (*, / and %).
    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;
        let mut left_depth = self.last_depth;

        loop {
            let op = match &self.current_token {
                Token::Asterisk => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;
            left = self.fold(left, &mut left_depth, op, right)?;
        }

        self.last_depth = left_depth;
        Ok(left)
    }

    /// Parses unary expressions (negation). Every nested sub-expression is
    /// reached through here, so this is where recursion depth is bounded.
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if self.nesting >= MAX_NESTING_DEPTH {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let result = self.parse_negation();
        self.nesting -= 1;
        result
    }

    fn parse_negation(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::Minus {
            self.advance();
            let operand = self.parse_unary()?;
            self.last_depth = self.node_depth(self.last_depth)?;
            return Ok(Expression::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        self.parse_power()
    }

    /// Parses power/exponentiation expressions (^). Right-associative.
    fn parse_power(&mut self) -> ParseResult<Expression> {
        let left = self.parse_primary()?;

        if self.current_token == Token::Caret {
            let mut left_depth = self.last_depth;
            self.advance();
            let right = self.parse_unary()?;
            let power = self.fold(left, &mut left_depth, BinaryOperator::Power, right)?;
            self.last_depth = left_depth;
            return Ok(power);
        }

        Ok(left)
    }

    /// Parses primary expressions (literals, field refs, calls, parentheses).
    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current_token.clone() {
            Token::Number(n) => {
                self.advance();
                self.last_depth = 1;
                Ok(Expression::Literal(Value::Number(n)))
            }

            Token::Boolean(b) => {
                self.advance();
                self.last_depth = 1;
                Ok(Expression::Literal(Value::Boolean(b)))
            }

            Token::FieldRef(name) => {
                let field = self.resolve(&name)?;
                self.advance();
                self.last_depth = 1;
                Ok(Expression::FieldRef(field))
            }

            // AND / OR double as function names when followed by '('
            Token::And => self.parse_keyword_call("AND"),
            Token::Or => self.parse_keyword_call("OR"),

            Token::Identifier(name) => {
                self.advance();
                if self.current_token != Token::LParen {
                    return Err(ParseError::UnexpectedToken {
                        found: name,
                        position: self.current_position,
                    });
                }
                self.advance();

                if let Token::String(field_name) = self.current_token.clone() {
                    // ABS("x"): a quoted name is only valid for aggregations
                    if AggregateFunction::from_name(&name).is_none()
                        && BuiltinFunction::from_name(&name).is_some()
                    {
                        return Err(self.unexpected());
                    }
                    return self.parse_aggregate_call(name, field_name);
                }
                self.parse_function_call(name)
            }

            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_rparen()?;
                Ok(expr)
            }

            Token::RParen => Err(ParseError::UnbalancedParens {
                position: self.current_position,
            }),

            _ => Err(self.unexpected()),
        }
    }

    fn parse_keyword_call(&mut self, name: &str) -> ParseResult<Expression> {
        let keyword_position = self.current_position;
        self.advance();
        if self.current_token != Token::LParen {
            return Err(ParseError::UnexpectedToken {
                found: name.to_string(),
                position: keyword_position,
            });
        }
        self.advance();
        self.parse_function_call(name.to_string())
    }

    /// Parses the rest of `fn("Field Name")` after the string token has been seen.
    fn parse_aggregate_call(&mut self, name: String, field_name: String) -> ParseResult<Expression> {
        let func =
            AggregateFunction::from_name(&name).ok_or(ParseError::UnknownFunction(name))?;
        let field = self.resolve(&field_name)?;

        self.advance();
        self.expect_rparen()?;

        self.last_depth = 1;
        Ok(Expression::AggregateCall { func, field })
    }

    /// Parses a builtin function call like MAX([A], [B], 0). The '(' is already consumed.
    fn parse_function_call(&mut self, name: String) -> ParseResult<Expression> {
        let func = match BuiltinFunction::from_name(&name) {
            Some(func) => func,
            // sum / count / avg only take a quoted field name
            None if AggregateFunction::from_name(&name).is_some() => {
                return Err(self.unexpected());
            }
            None => return Err(ParseError::UnknownFunction(name)),
        };

        let mut args = Vec::new();
        let mut deepest_arg = 0;

        if self.current_token != Token::RParen {
            args.push(self.parse_expression()?);
            deepest_arg = self.last_depth;

            while self.current_token == Token::Comma {
                self.advance();
                args.push(self.parse_expression()?);
                deepest_arg = deepest_arg.max(self.last_depth);
            }
        }

        self.expect_rparen()?;

        let arity = func.arity();
        if !arity.accepts(args.len()) {
            return Err(ParseError::ArityMismatch {
                function: func.name().to_string(),
                expected: arity,
                found: args.len(),
            });
        }

        self.last_depth = self.node_depth(deepest_arg)?;

        if func != BuiltinFunction::If {
            return Ok(Expression::FunctionCall { func, args });
        }
        match <[Expression; 3]>::try_from(args) {
            Ok([condition, then_branch, else_branch]) => Ok(Expression::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            }),
            Err(args) => Ok(Expression::FunctionCall { func, args }),
        }
    }

    fn resolve(&self, name: &str) -> ParseResult<FieldId> {
        self.fields
            .resolve_field(name)
            .ok_or_else(|| ParseError::UnknownField(name.to_string()))
    }
}

fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
    Expression::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Convenience function to parse a formula against the given fields.
pub fn parse<F: FieldLookup + ?Sized>(input: &str, fields: &F) -> ParseResult<Expression> {
    let mut parser = Parser::new(input, fields);
    parser.parse()
}

/// A formula is well formed exactly when it parses.
pub fn is_well_formed<F: FieldLookup + ?Sized>(input: &str, fields: &F) -> bool {
    parse(input, fields).is_ok()
}
