//! minischeme - a minimal S-expression interpreter
//!
//! The crate turns source text into a nested expression tree and reduces that tree to a
//! value under a small fixed set of builtin operators and special forms:
//!
//! ```scheme
//! (+ 1 2 3)                           ; => f:6.0 (arithmetic is always float)
//! (let ((a 10) (b 20)) (+ a b))       ; => f:30.0
//! (define sq (lambda (x) (* x x)))    ; user functions
//! (quote (+ 1 2))                     ; => (s:+ i:1 i:2)
//! (if t 1 2)                          ; => i:1
//! ```
//!
//! The pipeline is strictly one way: text is tokenized, the parenthesis balance is
//! checked, tokens are parsed into an [`ast::Expression`] tree, and the tree is
//! evaluated by an [`evaluator::Interpreter`] that owns the symbol, function,
//! special-form and constant tables.
//!
//! ## Baseline and strict semantics
//!
//! By default the interpreter reproduces the classic behavior of this language: `let`
//! writes its bindings into the session-wide symbol table, and `if` returns the chosen
//! branch without reducing it. [`evaluator::EvalConfig::strict`] switches to lexical
//! `let` frames, eager `if`, eager `define` and dispatched comparison predicates.
//!
//! ## Modules
//!
//! - `ast`: tokens, expressions and their display convention
//! - `scheme`: tokenizer and stack-based parser
//! - `builtinops`: builtin functions, comparisons, special forms and constants
//! - `evaluator`: environments, interpreter state and evaluation

use std::fmt;

use crate::ast::Expression;
use crate::builtinops::Arity;

/// Maximum nesting depth accepted by the parser
///
/// Trees are dropped, cloned and printed recursively, so their depth is bounded
/// when they are built. Kept above `MAX_EVAL_DEPTH` so every readable tree can
/// reach the evaluator's own limit.
pub const MAX_PARSE_DEPTH: usize = 512;

/// Maximum evaluation depth to prevent stack overflow in recursive evaluation
pub const MAX_EVAL_DEPTH: usize = 256;

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Unequal paren counts, a stray `)` or an unclosed `(`
    UnbalancedStructure(String),
    /// Parentheses nested deeper than `MAX_PARSE_DEPTH`
    TooDeeplyNested,
    /// Head of a form that is not a function, special form or quote
    UnboundOperator(String),
    ArityMismatch {
        form: String,
        expected: Arity,
        got: usize,
    },
    /// Malformed `define` name, `let` binding list or `lambda` parameter list
    InvalidDefinition(String),
    TypeMismatch {
        operator: String,
        found: String,
    },
    DivisionByZero,
    EmptyInput,
    DepthLimitExceeded,
}

impl Error {
    /// Create an ArityMismatch for the named form
    pub fn arity_mismatch(form: &str, expected: Arity, got: usize) -> Self {
        Error::ArityMismatch {
            form: form.to_owned(),
            expected,
            got,
        }
    }

    /// Create a TypeMismatch naming the kind and value of the offending operand
    pub(crate) fn type_mismatch(operator: &str, found: &Expression) -> Self {
        let found = match found {
            Expression::Atom(token) => format!("{} {token}", token.kind()),
            Expression::Form(_) => format!("form {found}"),
        };
        Error::TypeMismatch {
            operator: operator.to_owned(),
            found,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnbalancedStructure(msg) => write!(f, "UnbalancedStructure: {msg}"),
            Error::TooDeeplyNested => write!(
                f,
                "TooDeeplyNested: expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"
            ),
            Error::UnboundOperator(op) => write!(f, "UnboundOperator: {op} is not a function"),
            Error::ArityMismatch {
                form,
                expected,
                got,
            } => write!(
                f,
                "ArityMismatch: {form} expects {expected} arguments, got {got}"
            ),
            Error::InvalidDefinition(msg) => write!(f, "InvalidDefinition: {msg}"),
            Error::TypeMismatch { operator, found } => {
                write!(f, "TypeMismatch: {operator} cannot operate on {found}")
            }
            Error::DivisionByZero => write!(f, "DivisionByZero: division by zero"),
            Error::EmptyInput => write!(f, "EmptyInput: nothing to evaluate"),
            Error::DepthLimitExceeded => write!(
                f,
                "DepthLimitExceeded: evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
            ),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod scheme;

/// Evaluate `source` in a fresh baseline interpreter.
///
/// Use [`evaluator::Interpreter::eval_expr`] to keep definitions across calls.
pub fn eval_expr(source: &str) -> Result<Expression, Error> {
    evaluator::Interpreter::new().eval_expr(source)
}
