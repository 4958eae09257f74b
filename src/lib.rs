//! sexpeval - a small S-expression interpreter
//!
//! This crate reads fully parenthesized prefix expressions and evaluates them
//! with a tree-walking evaluator over chained environments. It supports
//! user-defined functions, conditionals and a builtin table of arithmetic,
//! comparison and math functions:
//!
//! ```scheme
//! (+ 21 21)                                         ; 42
//! (sin (/ pi 2))                                    ; 1.0
//! (defun fact (n) (if (<= n 1) 1 (* n (fact (- n 1)))))
//! (fact 10)                                         ; 3628800
//! (format t "fact of 5 is ~D~%" (fact 5))           ; "fact of 5 is 120\n"
//! ```
//!
//! ## Usage
//!
//! ```
//! use sexpeval::{create_global_env, evaluate, parse};
//! use sexpeval::ast::Value;
//!
//! let env = create_global_env();
//! evaluate(&parse("(defun add (a b) (+ a b))").unwrap(), &env).unwrap();
//! let result = evaluate(&parse("(add (add 21 21) 42)").unwrap(), &env).unwrap();
//! assert_eq!(result, Value::Int(84));
//! ```
//!
//! ## Modules
//!
//! - `reader`: tokenizer and S-expression reader
//! - `environment`: chained scopes for name resolution
//! - `evaluator`: the evaluator, special forms and evaluation settings
//! - `builtinops`: the builtin operator and math function registry
//! - `template`: placeholder substitution behind the `format` form

/// Default maximum nesting depth accepted by the reader
pub const DEFAULT_MAX_PARSE_DEPTH: usize = 512;

/// Default maximum evaluation depth before a `RecursionLimit` error.
/// The evaluator grows the host stack on demand, so this is the only bound
/// on runaway recursion in user programs.
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 10_000;

/// Categorizes the different kinds of syntax errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// The input contained no tokens at all
    Empty,
    /// Tokens ran out before an expression was complete
    UnexpectedEof,
    /// A close paren without a matching open, or an unbalanced program
    MismatchedParens,
    /// Expression nesting exceeded the configured parse depth
    TooDeeplyNested,
    /// Extra tokens found after a complete expression
    TrailingContent,
}

/// A structured error describing a syntax failure.
#[derive(Debug, PartialEq, Clone, thiserror::Error)]
#[error("{message}{}", found_suffix(.found))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// The offending token, if there was one
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, found: Option<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            found,
        }
    }

    /// Create a ParseError with a kind and message but no offending token
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None)
    }
}

fn found_suffix(found: &Option<String>) -> String {
    found
        .as_ref()
        .map(|token| format!("\nFound: {token}"))
        .unwrap_or_default()
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("SyntaxError: {0}")]
    SyntaxError(#[from] ParseError),
    #[error("Unbound name: {0}")]
    UnboundName(String),
    #[error("ArityError: {name} expected {expected} arguments, got {got}")]
    ArityError {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("Type error: {0}")]
    TypeMismatch(String),
    #[error("Recursion limit exceeded (max depth: {limit})")]
    RecursionLimit { limit: usize },
    #[error("EvaluationError: {0}")]
    EvalError(String),
}

impl Error {
    pub fn arity_error(name: impl Into<String>, expected: usize, got: usize) -> Self {
        Error::ArityError {
            name: name.into(),
            expected,
            got,
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod reader;
mod stack;
pub mod template;

pub use environment::Environment;
pub use evaluator::{
    EvalConfig, ScopingMode, create_global_env, evaluate, evaluate_with_config,
};
pub use reader::{parse, parse_program};
