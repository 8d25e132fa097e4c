//! FILENAME: core/parser/src/lexer.rs
//! PURPOSE: Scans a raw formula string and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the parsing pipeline. It handles
//! whitespace skipping, number parsing, string literals, bracketed field
//! references and multi-character operators like <= and ==.
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / % ^ ( ) , < >
//! - Multi char: == != <= >= && ||
//! - Keywords: AND, OR, TRUE, FALSE (case-insensitive)
//! - Field references: [Field Display Name]

use crate::token::Token;
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    /// Character offset of the next unread character.
    offset: usize,
    /// Character offset where the most recently returned token starts.
    token_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
            offset: 0,
            token_start: 0,
        }
    }

    /// Offset (in characters) of the token most recently returned by `next_token`.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.token_start = self.offset;

        match self.bump() {
            Some('+') => Token::Plus,
            Some('-') => Token::Minus,
            Some('*') => Token::Asterisk,
            Some('/') => Token::Slash,
            Some('%') => Token::Percent,
            Some('^') => Token::Caret,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some(',') => Token::Comma,

            // Two-character operators. A lone '=', '!', '&' or '|' is not part of the grammar.
            Some('=') => self.read_pair('=', Token::EqualEqual, '='),
            Some('!') => self.read_pair('=', Token::NotEqual, '!'),
            Some('&') => self.read_pair('&', Token::And, '&'),
            Some('|') => self.read_pair('|', Token::Or, '|'),

            Some('<') => self.read_comparison(Token::LessEqual, Token::LessThan),
            Some('>') => self.read_comparison(Token::GreaterEqual, Token::GreaterThan),

            Some('"') => self.read_string(),
            Some('[') => self.read_field_ref(),

            // Handle Numbers (starts with digit or dot)
            Some(ch) if ch.is_ascii_digit() || ch == '.' => self.read_number(ch),

            Some(ch) if is_letter(ch) => self.read_identifier(ch),

            None => Token::EOF,

            Some(ch) => Token::Illegal(ch),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.input.next();
        if ch.is_some() {
            self.offset += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.bump();
        }
    }

    /// Returns `matched` if the next char is `second`, otherwise an illegal `first`.
    fn read_pair(&mut self, second: char, matched: Token, first: char) -> Token {
        if self.input.peek() == Some(&second) {
            self.bump();
            matched
        } else {
            Token::Illegal(first)
        }
    }

    /// Handles '<' / '>' optionally followed by '='.
    fn read_comparison(&mut self, with_equal: Token, bare: Token) -> Token {
        if self.input.peek() == Some(&'=') {
            self.bump();
            with_equal
        } else {
            bare
        }
    }

    fn read_string(&mut self) -> Token {
        let mut result = String::new();
        while let Some(ch) = self.bump() {
            if ch == '"' {
                return Token::String(result);
            }
            result.push(ch);
        }
        // If we hit EOF without closing quote, return what we have.
        Token::String(result)
    }

    /// Reads a bracketed field reference: [Field Display Name]
    fn read_field_ref(&mut self) -> Token {
        let mut result = String::new();
        while let Some(ch) = self.bump() {
            if ch == ']' {
                return Token::FieldRef(result.trim().to_string());
            }
            result.push(ch);
        }
        Token::UnterminatedFieldRef(result)
    }

    fn read_number(&mut self, first_char: char) -> Token {
        let mut number_str = String::from(first_char);
        let mut has_dot = first_char == '.';

        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                number_str.push(ch);
                self.bump();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                number_str.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        if let Ok(n) = number_str.parse::<f64>() {
            Token::Number(n)
        } else {
            // Fallback if parsing fails (e.g. just ".")
            Token::Illegal(first_char)
        }
    }

    fn read_identifier(&mut self, first_char: char) -> Token {
        let mut ident = String::from(first_char);

        while let Some(&ch) = self.input.peek() {
            if is_letter(ch) || ch.is_ascii_digit() {
                ident.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        match ident.to_uppercase().as_str() {
            "TRUE" => Token::Boolean(true),
            "FALSE" => Token::Boolean(false),
            "AND" => Token::And,
            "OR" => Token::Or,
            _ => Token::Identifier(ident.to_uppercase()), // Normalize to UPPERCASE
        }
    }
}

/// Returns true if `ch` can start an identifier.
fn is_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}
