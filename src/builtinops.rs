//! Built-in operations registry.
//!
//! Every operator the interpreter knows at startup is defined once here and copied
//! into the interpreter tables when an [`Interpreter`](crate::evaluator::Interpreter)
//! is created:
//!
//! ```scheme
//! (+ 1 2 3)          ; arithmetic builtin, arguments evaluated first
//! (>= 3 2)           ; comparison predicate, returns t or nil
//! (define x 5)       ; special form, arguments passed unevaluated
//! pi                 ; constant
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions** receive evaluated arguments (`+`, `-`, `*`, `/`, and the
//!   comparisons `>=`, `<=`, `>`, `<`).
//! - **Special forms** receive their arguments unevaluated together with the
//!   interpreter and the current local environment (`define`, `let`, `if`, `lambda`).
//!
//! ## Arithmetic
//!
//! The four arithmetic builtins fold their arguments left to right and always
//! produce a float, whatever the operand kinds: `(+ 1 2)` is `f:3.0`. A single
//! argument is returned unchanged (as a float), so `(- 5)` is `f:5.0`, not a negation.
//!
//! ## Comparisons
//!
//! Comparisons are binary and answer with the sentinels `t` and `nil`. They are
//! always reachable through [`compare`], but they only enter the function table
//! when [`EvalConfig::dispatch_comparisons`](crate::evaluator::EvalConfig) is set.

use std::f64::consts::{E, PI};
use std::fmt;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::{Expression, FloatType, Token};
use crate::evaluator::{Environment, Interpreter, eval_define, eval_if, eval_lambda, eval_let};

/// Expected argument count of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// At least n arguments
    AtLeast(usize),
}

impl Arity {
    /// Check `got` arguments against this arity for the operation `form`
    pub fn validate(&self, form: &str, got: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exact(n) => got == *n,
            Arity::AtLeast(n) => got >= *n,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_mismatch(form, *self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Signature shared by all special forms: unevaluated arguments, the local
/// environment and the current evaluation depth
pub type SpecialFormFn =
    fn(&mut Interpreter, &[Expression], &Environment, usize) -> Result<Expression, Error>;

/// Represents the implementation of a built-in operation
#[derive(Clone, Copy)]
pub enum OpKind {
    /// Arithmetic builtin, always dispatched
    Function(fn(&[Expression]) -> Result<Expression, Error>),
    /// Comparison predicate, dispatched only on request
    Comparison(Comparison),
    /// Special form that controls the evaluation of its own arguments
    SpecialForm(SpecialFormFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::Comparison(c) => write!(f, "Comparison({c:?})"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The symbol this operation is bound to
    pub id: &'static str,
    pub op_kind: OpKind,
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    /// Check if the given number of arguments is valid for this operation
    pub fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(self.id, arg_count)
    }
}

//
// Arithmetic
//

/// Numeric value of an evaluated operand
fn numeric_operand(operator: &str, operand: &Expression) -> Result<FloatType, Error> {
    operand
        .as_atom()
        .and_then(Token::as_number)
        .ok_or_else(|| Error::type_mismatch(operator, operand))
}

/// Left fold over the numeric operands, result is always a float
fn fold_numeric<F>(operator: &str, args: &[Expression], step: F) -> Result<Expression, Error>
where
    F: Fn(FloatType, FloatType) -> Result<FloatType, Error>,
{
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| Error::arity_mismatch(operator, Arity::AtLeast(1), 0))?;

    let mut acc = numeric_operand(operator, first)?;
    for operand in rest {
        acc = step(acc, numeric_operand(operator, operand)?)?;
    }
    Ok(Expression::Atom(Token::float(acc)))
}

macro_rules! arithmetic_fold {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Expression]) -> Result<Expression, Error> {
            fold_numeric($op_str, args, |a, b| Ok(a $op b))
        }
    };
}

arithmetic_fold!(builtin_add, +, "+");
arithmetic_fold!(builtin_sub, -, "-");
arithmetic_fold!(builtin_mul, *, "*");

fn builtin_div(args: &[Expression]) -> Result<Expression, Error> {
    fold_numeric("/", args, |a, b| {
        if b == 0.0 {
            Err(Error::DivisionByZero)
        } else {
            Ok(a / b)
        }
    })
}

//
// Comparisons
//

/// The four comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterEqual,
    LessEqual,
    Greater,
    Less,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::GreaterEqual => ">=",
            Comparison::LessEqual => "<=",
            Comparison::Greater => ">",
            Comparison::Less => "<",
        }
    }

    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Comparison::GreaterEqual => matches!(ordering, Greater | Equal),
            Comparison::LessEqual => matches!(ordering, Less | Equal),
            Comparison::Greater => ordering == Greater,
            Comparison::Less => ordering == Less,
        }
    }
}

fn sentinel(truth: bool) -> Token {
    if truth { Token::t() } else { Token::nil() }
}

/// Compare two tokens, answering `t` or `nil`.
///
/// Integers and floats compare numerically with each other (`-0.0` equals `0.0`,
/// NaN satisfies no predicate); two symbols compare by their names. Any other
/// pairing is a [`Error::TypeMismatch`].
pub fn compare(comparison: Comparison, lhs: &Token, rhs: &Token) -> Result<Token, Error> {
    let ordering = match (lhs, rhs) {
        (Token::Symbol(a), Token::Symbol(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            (None, _) => {
                return Err(Error::type_mismatch(
                    comparison.symbol(),
                    &Expression::Atom(lhs.clone()),
                ));
            }
            (Some(_), None) => {
                return Err(Error::type_mismatch(
                    comparison.symbol(),
                    &Expression::Atom(rhs.clone()),
                ));
            }
        },
    };
    Ok(sentinel(ordering.is_some_and(|o| comparison.holds(o))))
}

/// Apply a comparison to evaluated arguments, as dispatched from the function table
pub(crate) fn apply_comparison(
    comparison: Comparison,
    args: &[Expression],
) -> Result<Expression, Error> {
    match args {
        [Expression::Atom(lhs), Expression::Atom(rhs)] => {
            compare(comparison, lhs, rhs).map(Expression::Atom)
        }
        [lhs, rhs] => {
            let offender = if lhs.is_atom() { rhs } else { lhs };
            Err(Error::type_mismatch(comparison.symbol(), offender))
        }
        _ => Err(Error::arity_mismatch(
            comparison.symbol(),
            Arity::Exact(2),
            args.len(),
        )),
    }
}

//
// Registry
//

static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    vec![
        // Arithmetic
        BuiltinOp {
            id: "+",
            op_kind: OpKind::Function(builtin_add),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "-",
            op_kind: OpKind::Function(builtin_sub),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "*",
            op_kind: OpKind::Function(builtin_mul),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "/",
            op_kind: OpKind::Function(builtin_div),
            arity: Arity::AtLeast(1),
        },
        // Comparisons
        BuiltinOp {
            id: ">=",
            op_kind: OpKind::Comparison(Comparison::GreaterEqual),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "<=",
            op_kind: OpKind::Comparison(Comparison::LessEqual),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: ">",
            op_kind: OpKind::Comparison(Comparison::Greater),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "<",
            op_kind: OpKind::Comparison(Comparison::Less),
            arity: Arity::Exact(2),
        },
        // Special forms
        BuiltinOp {
            id: "define",
            op_kind: OpKind::SpecialForm(eval_define),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "let",
            op_kind: OpKind::SpecialForm(eval_let),
            // Binding list plus at least one body form
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            id: "if",
            op_kind: OpKind::SpecialForm(eval_if),
            arity: Arity::Exact(3),
        },
        BuiltinOp {
            id: "lambda",
            op_kind: OpKind::SpecialForm(eval_lambda),
            // Fixed parameter list and a single body expression
            arity: Arity::Exact(2),
        },
    ]
});

/// Named numeric constants
pub const CONSTANTS: [(&str, FloatType); 2] = [("e", E), ("pi", PI)];

/// Symbols that quote their argument instead of evaluating it
pub const QUOTE_SYMBOLS: [&str; 2] = ["quote", "q"];

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}
