//! This module defines the core value types of the interpreter. [`Token`] is the
//! atomic value: an integer, a float, a symbol or a function. [`Expression`] is the
//! parse tree node, either a single token ([`Expression::Atom`]) or a parenthesized
//! sequence ([`Expression::Form`]). Evaluation results are expressions as well, because
//! `quote` and the baseline `if` hand back unevaluated structure.
//!
//! Ergonomic helpers such as [`int`], [`float`], [`sym`] and [`form`] build trees
//! in code and tests. Display follows the classic tagged convention (`i:1`, `f:1.5`,
//! `s:name`, `λ:+`) which the REPL prints verbatim.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ordered_float::OrderedFloat;

use crate::Error;
use crate::evaluator::Environment;

/// Type alias for integer tokens
pub type IntegerType = i64;

/// Type alias for float tokens
pub type FloatType = f64;

/// Canonical signature of a builtin function: evaluated arguments in, value out.
pub type BuiltinFn = dyn Fn(&[Expression]) -> Result<Expression, Error> + Send + Sync;

/// Name of the false sentinel
pub const NIL: &str = "nil";

/// Name of the true sentinel
pub const TRUE: &str = "t";

/// The kind of a token, named in type mismatch errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Integer,
    Float,
    Symbol,
    Function,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::Symbol => "symbol",
            TokenKind::Function => "function",
        };
        write!(f, "{name}")
    }
}

/// Atomic value of the language
///
/// Two tokens are equal iff their kind and value are equal, so `Integer(1)` and
/// `Float(1.0)` are different keys. Floats are wrapped in [`OrderedFloat`] to get a
/// total order and a stable hash.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Integer(IntegerType),
    Float(OrderedFloat<FloatType>),
    Symbol(String),
    Function(Function),
}

impl Token {
    /// Create a symbol token
    pub fn symbol<S: Into<String>>(name: S) -> Self {
        Token::Symbol(name.into())
    }

    /// Create a float token
    pub fn float(value: FloatType) -> Self {
        Token::Float(OrderedFloat(value))
    }

    /// The `nil` sentinel
    pub fn nil() -> Self {
        Token::symbol(NIL)
    }

    /// The `t` sentinel
    pub fn t() -> Self {
        Token::symbol(TRUE)
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Integer(_) => TokenKind::Integer,
            Token::Float(_) => TokenKind::Float,
            Token::Symbol(_) => TokenKind::Symbol,
            Token::Function(_) => TokenKind::Function,
        }
    }

    /// Check whether this is the symbol `name`
    pub fn is_symbol(&self, name: &str) -> bool {
        matches!(self, Token::Symbol(s) if s == name)
    }

    /// Numeric value of integer and float tokens
    pub fn as_number(&self) -> Option<FloatType> {
        match self {
            Token::Integer(n) => Some(*n as FloatType),
            Token::Float(x) => Some(x.into_inner()),
            Token::Symbol(_) | Token::Function(_) => None,
        }
    }

    /// Integers and floats evaluate to themselves
    pub fn is_self_evaluating(&self) -> bool {
        matches!(self, Token::Integer(_) | Token::Float(_))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "Integer({n})"),
            Token::Float(x) => write!(f, "Float({:?})", x.into_inner()),
            Token::Symbol(s) => write!(f, "Symbol({s})"),
            Token::Function(func) => write!(f, "Function({func})"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "i:{n}"),
            // Debug keeps the trailing ".0" on integral floats
            Token::Float(x) => write!(f, "f:{:?}", x.into_inner()),
            Token::Symbol(s) => write!(f, "s:{s}"),
            Token::Function(func) => write!(f, "λ:{func}"),
        }
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::symbol(s)
    }
}

impl From<FloatType> for Token {
    fn from(x: FloatType) -> Self {
        Token::float(x)
    }
}

impl From<Function> for Token {
    fn from(func: Function) -> Self {
        Token::Function(func)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Token {
            fn from(n: $int_type) -> Self {
                Token::Integer(IntegerType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(IntegerType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

/// A callable value
#[derive(Clone)]
pub enum Function {
    /// Host function; compared and hashed by id
    Builtin { id: String, func: Arc<BuiltinFn> },
    /// User function created by `lambda`
    Closure(Arc<Closure>),
}

/// Parameters, body and the local environment captured at creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub params: Vec<Token>,
    pub body: Expression,
    pub env: Environment,
}

impl Function {
    /// Wrap a host function
    pub fn builtin<F>(id: &str, func: F) -> Self
    where
        F: Fn(&[Expression]) -> Result<Expression, Error> + Send + Sync + 'static,
    {
        Function::Builtin {
            id: id.to_owned(),
            func: Arc::new(func),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Function::Builtin { id, .. } => id,
            Function::Closure(_) => "lambda",
        }
    }

    pub fn is_closure(&self) -> bool {
        matches!(self, Function::Closure(_))
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Function::Builtin { id: id1, .. }, Function::Builtin { id: id2, .. }) => id1 == id2,
            (Function::Closure(c1), Function::Closure(c2)) => Arc::ptr_eq(c1, c2) || c1 == c2,
            _ => false,
        }
    }
}

impl Eq for Function {}

impl Hash for Function {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Equal functions always share an id
        self.id().hash(state);
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Builtin { id, .. } => write!(f, "{id}"),
            Function::Closure(closure) => {
                write!(f, "lambda(")?;
                for (i, param) in closure.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match param {
                        Token::Symbol(name) => write!(f, "{name}")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse tree node and evaluation result
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Atom(Token),
    Form(Vec<Expression>),
}

impl Expression {
    /// The token of an atom
    pub fn as_atom(&self) -> Option<&Token> {
        match self {
            Expression::Atom(token) => Some(token),
            Expression::Form(_) => None,
        }
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Expression::Atom(_))
    }

    /// Leaf tokens, left to right
    pub fn leaves(&self) -> Vec<&Token> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Token>) {
        match self {
            Expression::Atom(token) => out.push(token),
            Expression::Form(elements) => {
                for element in elements {
                    element.collect_leaves(out);
                }
            }
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Atom(token) => write!(f, "{token:?}"),
            Expression::Form(elements) => {
                write!(f, "Form(")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e:?}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Atom(token) => write!(f, "{token}"),
            Expression::Form(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<Token> for Expression {
    fn from(token: Token) -> Self {
        Expression::Atom(token)
    }
}

impl From<Vec<Expression>> for Expression {
    fn from(elements: Vec<Expression>) -> Self {
        Expression::Form(elements)
    }
}

/// Integer atom
pub fn int(n: IntegerType) -> Expression {
    Expression::Atom(Token::Integer(n))
}

/// Float atom
pub fn float(x: FloatType) -> Expression {
    Expression::Atom(Token::float(x))
}

/// Symbol atom
pub fn sym<S: AsRef<str>>(name: S) -> Expression {
    Expression::Atom(Token::symbol(name.as_ref()))
}

/// Form from any sequence of expressions
pub fn form<I: IntoIterator<Item = Expression>>(elements: I) -> Expression {
    Expression::Form(elements.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_display_convention() {
        let cases = vec![
            (int(42), "i:42"),
            (int(-7), "i:-7"),
            (float(6.0), "f:6.0"),
            (float(-3.0), "f:-3.0"),
            (float(0.5), "f:0.5"),
            (float(1.0 / 6.0), "f:0.16666666666666666"),
            // Large and small magnitudes switch to exponent form
            (float(1e15), "f:1000000000000000.0"),
            (float(1e16), "f:1e16"),
            (float(1e-5), "f:1e-5"),
            (float(std::f64::consts::PI), "f:3.141592653589793"),
            (sym("foo"), "s:foo"),
            (sym("+"), "s:+"),
            (form([sym("+"), int(1), int(2)]), "(s:+ i:1 i:2)"),
            (form([]), "()"),
            (
                form([sym("a"), form([int(1), float(2.5)])]),
                "(s:a (i:1 f:2.5))",
            ),
        ];

        for (i, (expr, expected)) in cases.iter().enumerate() {
            assert_eq!(expr.to_string(), *expected, "display case #{}", i + 1);
        }
    }

    #[test]
    fn test_function_display() {
        let add = Function::builtin("+", |_| Ok(int(0)));
        assert_eq!(Token::Function(add).to_string(), "λ:+");

        let closure = Function::Closure(Arc::new(Closure {
            params: vec![Token::symbol("x"), Token::symbol("y")],
            body: form([sym("+"), sym("x"), sym("y")]),
            env: Environment::new(),
        }));
        assert_eq!(Token::Function(closure).to_string(), "λ:lambda(x y)");
    }

    #[test]
    fn test_equality_is_by_kind_and_value() {
        assert_eq!(Token::Integer(1), Token::from(1));
        assert_ne!(Token::Integer(1), Token::float(1.0));
        assert_ne!(Token::symbol("1"), Token::Integer(1));
        assert_eq!(Token::float(0.5), Token::from(0.5));
        assert_eq!(Token::nil(), Token::symbol("nil"));
        assert_ne!(Token::nil(), Token::t());

        // Builtins compare by id only
        let a = Function::builtin("f", |_| Ok(int(1)));
        let b = Function::builtin("f", |_| Ok(int(2)));
        let c = Function::builtin("g", |_| Ok(int(1)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_tokens_as_table_keys() {
        let mut table = HashMap::new();
        table.insert(Token::symbol("x"), int(1));
        table.insert(Token::Integer(1), int(2));
        table.insert(Token::float(1.0), int(3));

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&Token::symbol("x")), Some(&int(1)));
        assert_eq!(table.get(&Token::Integer(1)), Some(&int(2)));
        assert_eq!(table.get(&Token::float(1.0)), Some(&int(3)));
        assert_eq!(table.get(&Token::symbol("y")), None);
    }

    #[test]
    fn test_token_accessors() {
        assert_eq!(Token::Integer(3).as_number(), Some(3.0));
        assert_eq!(Token::float(2.5).as_number(), Some(2.5));
        assert_eq!(Token::symbol("x").as_number(), None);
        assert_eq!(Token::Integer(3).kind(), TokenKind::Integer);
        assert_eq!(Token::symbol("x").kind().to_string(), "symbol");
        assert!(Token::symbol("quote").is_symbol("quote"));
        assert!(!Token::Integer(0).is_symbol("0"));
        assert!(Token::float(1.0).is_self_evaluating());
        assert!(!Token::symbol("pi").is_self_evaluating());
    }

    #[test]
    fn test_leaves_read_left_to_right() {
        let tree = form([
            sym("*"),
            form([sym("+"), int(1), int(2)]),
            form([]),
            float(0.5),
        ]);
        let leaves: Vec<Token> = tree.leaves().into_iter().cloned().collect();
        assert_eq!(
            leaves,
            vec![
                Token::symbol("*"),
                Token::symbol("+"),
                Token::Integer(1),
                Token::Integer(2),
                Token::float(0.5),
            ]
        );
        assert!(int(1).is_atom());
        assert_eq!(form([int(1)]).as_atom(), None);
    }
}
