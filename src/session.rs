//! One interpretation session: scan → parse → resolve → interpret, with the
//! error flags owned here instead of in process‑global state.
//!
//! A session keeps its interpreter (and so its global frame) between calls to
//! [`Lox::run`], which is what the REPL needs.  Independent sessions share
//! nothing.

use std::io::{self, Write};

use log::{debug, info};

use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;
use crate::stmt::Stmt;
use crate::value::Value;

/// Exit code for lexical, syntax and static errors.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Exit code for runtime errors.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Exit code for command‑line misuse.
pub const EXIT_USAGE: i32 = 64;

pub struct Lox {
    interpreter: Interpreter,
    diagnostics: Box<dyn Write>,
    next_id: ExprId,
    had_error: bool,
    had_runtime_error: bool,
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox {
    /// Session printing to stdout, diagnostics to stderr.
    pub fn new() -> Self {
        Self::with_sinks(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_sinks(out: Box<dyn Write>, diagnostics: Box<dyn Write>) -> Self {
        info!("Starting new Lox session");

        Self {
            interpreter: Interpreter::with_output(out),
            diagnostics,
            next_id: ExprId(0),
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Run a program.  Static errors anywhere in `source` suppress execution
    /// of all of it; a runtime error stops at the failing statement.
    ///
    /// Only I/O failures on the sinks are returned as `Err`; language errors
    /// are reported and recorded in the flags.
    pub fn run(&mut self, source: &str) -> Result<()> {
        let Some(statements) = self.front_end(source)? else {
            return Ok(());
        };

        if let Err(e) = self.interpreter.interpret(&statements) {
            if !e.is_runtime() {
                return Err(e);
            }

            self.had_runtime_error = true;
            self.report(&e)?;
        }

        Ok(())
    }

    /// Parse and resolve `source` as a single expression and evaluate it.
    /// Returns `None` after reporting if anything went wrong.
    pub fn evaluate_expression(&mut self, source: &str) -> Result<Option<Value>> {
        let (tokens, lex_errors) = scan_tokens(source);
        self.report_all(lex_errors)?;

        let mut parser = Parser::with_first_id(&tokens, self.next_id);
        let parsed: std::result::Result<Expr, LoxError> = parser.parse_expression();
        self.next_id = parser.next_id();

        let expr: Expr = match parsed {
            Ok(expr) => expr,
            Err(e) => {
                self.report(&e)?;
                return Ok(None);
            }
        };

        if self.had_error {
            return Ok(None);
        }

        let mut resolver = Resolver::new();
        resolver.resolve_expression(&expr);
        let static_errors: Vec<LoxError> = resolver.take_errors();

        if !static_errors.is_empty() {
            self.report_all(static_errors)?;
            return Ok(None);
        }

        self.interpreter.add_locals(resolver.into_locals());

        match self.interpreter.evaluate(&expr) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_runtime() => {
                self.had_runtime_error = true;
                self.report(&e)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Scan, parse and resolve; `None` if any static error was reported.
    fn front_end(&mut self, source: &str) -> Result<Option<Vec<Stmt>>> {
        let (tokens, lex_errors) = scan_tokens(source);
        self.report_all(lex_errors)?;

        let mut parser = Parser::with_first_id(&tokens, self.next_id);
        let statements: Vec<Stmt> = parser.parse();
        self.next_id = parser.next_id();
        self.report_all(parser.take_errors())?;

        if self.had_error {
            debug!("Syntax errors, skipping resolution");
            return Ok(None);
        }

        let mut resolver = Resolver::new();
        resolver.resolve(&statements);
        let static_errors: Vec<LoxError> = resolver.take_errors();

        if !static_errors.is_empty() {
            self.report_all(static_errors)?;
            return Ok(None);
        }

        self.interpreter.add_locals(resolver.into_locals());

        Ok(Some(statements))
    }

    fn report_all(&mut self, errors: Vec<LoxError>) -> Result<()> {
        for e in &errors {
            self.report(e)?;
        }

        Ok(())
    }

    fn report(&mut self, error: &LoxError) -> Result<()> {
        debug!(
            "Reporting error (line {:?}): {}",
            error.line(),
            error.message()
        );

        if error.is_static() {
            self.had_error = true;
        }

        writeln!(self.diagnostics, "{}", error)?;
        self.diagnostics.flush()?;

        Ok(())
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Forget earlier static errors (REPL, between lines).
    pub fn reset_error(&mut self) {
        self.had_error = false;
    }

    /// Process exit code for the outcome so far, `None` on success.
    pub fn exit_code(&self) -> Option<i32> {
        if self.had_error {
            Some(EXIT_STATIC_ERROR)
        } else if self.had_runtime_error {
            Some(EXIT_RUNTIME_ERROR)
        } else {
            None
        }
    }
}
