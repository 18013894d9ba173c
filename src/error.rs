//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter‑operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! The module **does not** print diagnostics itself; the session decides
//! where they go.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::Token;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        line: usize,
        /// ` at 'lexeme'` or ` at end`.
        location: String,
    },

    /// Static‑analysis failure reported by the resolver.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        line: usize,
        location: String,
    },

    /// Runtime evaluation error.  Aborts the remaining top‑level statements.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

/// Where in the source a parse/resolve error points.
fn location(token: &Token) -> String {
    if token.is_eof() {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            line: token.line,
            location: location(token),
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            line: token.line,
            location: location(token),
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", token.line, message);

        LoxError::Runtime {
            message,
            line: token.line,
        }
    }

    /// Errors found before execution starts (exit code 65).
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. }
        )
    }

    /// Errors raised while executing (exit code 70).
    pub fn is_runtime(&self) -> bool {
        matches!(self, LoxError::Runtime { .. })
    }

    /// The bare message, without line decoration.
    pub fn message(&self) -> String {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. }
            | LoxError::Runtime { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Source line, when the error has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. }
            | LoxError::Runtime { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn token(token_type: TokenType, lexeme: &str, line: usize) -> Token {
        Token {
            token_type,
            lexeme: lexeme.to_string(),
            line,
        }
    }

    #[test]
    fn runtime_error_names_message_and_line_only() {
        let err = LoxError::runtime(&token(TokenType::MINUS, "-", 7), "Operand must be a number.");

        assert_eq!(err.to_string(), "Operand must be a number.\n[line 7]");
        assert_eq!(err.message(), "Operand must be a number.");
        assert_eq!(err.line(), Some(7));
        assert!(err.is_runtime());
        assert!(!err.is_static());
    }

    #[test]
    fn static_errors_point_at_the_token() {
        let at_name = LoxError::parse(&token(TokenType::IDENTIFIER, "x", 2), "Oops.");
        let at_end = LoxError::resolve(&token(TokenType::EOF, "", 3), "Oops.");

        assert_eq!(at_name.to_string(), "[line 2] Error at 'x': Oops.");
        assert_eq!(at_end.to_string(), "[line 3] Error at end: Oops.");
        assert!(at_name.is_static() && at_end.is_static());
    }
}
