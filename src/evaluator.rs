use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::Error;
use crate::MAX_EVAL_DEPTH;
use crate::ast::{Closure, Expression, Function, Token};
use crate::builtinops::{
    Arity, BuiltinOp, CONSTANTS, OpKind, QUOTE_SYMBOLS, apply_comparison, get_builtin_ops,
};
use crate::scheme;

/// Local environment: a chain of binding frames
///
/// Closure parameters and lexical `let` bindings live here. The session-wide
/// tables are owned by the [`Interpreter`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Environment {
    bindings: HashMap<Token, Expression>,
    parent: Option<Box<Environment>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            bindings: HashMap::new(),
            parent: None,
        }
    }

    pub fn with_parent(parent: Environment) -> Self {
        Environment {
            bindings: HashMap::new(),
            parent: Some(Box::new(parent)),
        }
    }

    pub fn define(&mut self, name: Token, value: Expression) {
        self.bindings.insert(name, value);
    }

    pub fn get(&self, name: &Token) -> Option<&Expression> {
        self.bindings
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.get(name)))
    }

    /// True when no frame of the chain holds a binding
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.parent.as_ref().is_none_or(|p| p.is_empty())
    }
}

/// Where `let` writes its bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetScoping {
    /// Into the session symbol table; bindings outlive the form
    Global,
    /// Into a child frame discarded when the form returns
    Lexical,
}

/// Evaluation switches
///
/// The baseline reproduces the classic behavior of the language, quirks
/// included. Strict mode turns every correction on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    pub let_scoping: LetScoping,
    /// `if` evaluates its predicate and the chosen branch
    pub eager_branches: bool,
    /// `define` evaluates atomic bodies too (form bodies are always evaluated)
    pub eager_definitions: bool,
    /// `>= <= > <` are installed in the function table
    pub dispatch_comparisons: bool,
}

impl EvalConfig {
    pub const fn baseline() -> Self {
        EvalConfig {
            let_scoping: LetScoping::Global,
            eager_branches: false,
            eager_definitions: false,
            dispatch_comparisons: false,
        }
    }

    pub const fn strict() -> Self {
        EvalConfig {
            let_scoping: LetScoping::Lexical,
            eager_branches: true,
            eager_definitions: true,
            dispatch_comparisons: true,
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self::baseline()
    }
}

/// A source of atom values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    Local,
    Symbols,
    Functions,
    Constants,
}

/// Atom lookup precedence, first hit wins
pub const RESOLUTION_ORDER: [Resolver; 4] = [
    Resolver::Local,
    Resolver::Symbols,
    Resolver::Functions,
    Resolver::Constants,
];

/// Interpreter state: the session tables and the configuration
#[derive(Debug)]
pub struct Interpreter {
    config: EvalConfig,
    symbols: HashMap<Token, Expression>,
    functions: HashMap<Token, Function>,
    special_forms: HashMap<Token, &'static BuiltinOp>,
    constants: HashMap<Token, Token>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a registry entry as a callable value, with its arity enforced
fn builtin_function(op: &'static BuiltinOp) -> Option<Function> {
    let arity = op.arity;
    let id = op.id;
    match op.op_kind {
        OpKind::Function(f) => Some(Function::builtin(id, move |args: &[Expression]| {
            arity.validate(id, args.len())?;
            f(args)
        })),
        OpKind::Comparison(comparison) => Some(Function::builtin(id, move |args: &[Expression]| {
            apply_comparison(comparison, args)
        })),
        OpKind::SpecialForm(_) => None,
    }
}

impl Interpreter {
    /// Interpreter with the baseline configuration
    pub fn new() -> Self {
        Self::with_config(EvalConfig::baseline())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        let mut functions = HashMap::new();
        let mut special_forms = HashMap::new();

        for op in get_builtin_ops() {
            let key = Token::symbol(op.id);
            match op.op_kind {
                OpKind::SpecialForm(_) => {
                    special_forms.insert(key, op);
                }
                OpKind::Comparison(_) if !config.dispatch_comparisons => {}
                OpKind::Function(_) | OpKind::Comparison(_) => {
                    if let Some(function) = builtin_function(op) {
                        functions.insert(key, function);
                    }
                }
            }
        }

        let constants = CONSTANTS
            .iter()
            .map(|(name, value)| (Token::symbol(*name), Token::float(*value)))
            .collect();

        Interpreter {
            config,
            symbols: HashMap::new(),
            functions,
            special_forms,
            constants,
        }
    }

    pub fn config(&self) -> EvalConfig {
        self.config
    }

    /// Register a host function under `name`.
    ///
    /// Arguments reach `func` already evaluated; `arity` is checked first.
    ///
    /// ```
    /// use minischeme::ast::{Expression, Token};
    /// use minischeme::builtinops::Arity;
    /// use minischeme::evaluator::Interpreter;
    ///
    /// let mut interp = Interpreter::new();
    /// interp.register_builtin("pair", Arity::Exact(2), |args| {
    ///     Ok(Expression::Form(args.to_vec()))
    /// });
    /// let value = interp.eval_expr("(pair 1 (+ 1 1))").unwrap();
    /// assert_eq!(value.to_string(), "(i:1 f:2.0)");
    /// assert!(interp.eval_expr("(pair 1)").is_err());
    /// ```
    pub fn register_builtin<F>(&mut self, name: &str, arity: Arity, func: F)
    where
        F: Fn(&[Expression]) -> Result<Expression, Error> + Send + Sync + 'static,
    {
        let id = name.to_owned();
        let function = Function::builtin(name, move |args: &[Expression]| {
            arity.validate(&id, args.len())?;
            func(args)
        });
        debug!(name, "registered builtin");
        self.functions.insert(Token::symbol(name), function);
    }

    /// Value bound to `name` in the symbol table
    pub fn symbol(&self, name: &str) -> Option<&Expression> {
        self.symbols.get(&Token::symbol(name))
    }

    /// Symbol table contents sorted by name
    pub fn symbol_bindings(&self) -> Vec<(String, Expression)> {
        let mut bindings: Vec<_> = self
            .symbols
            .iter()
            .map(|(name, value)| (symbol_text(name), value.clone()))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }

    /// Function table contents sorted by name
    pub fn function_bindings(&self) -> Vec<(String, Function)> {
        let mut bindings: Vec<_> = self
            .functions
            .iter()
            .map(|(name, function)| (symbol_text(name), function.clone()))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }

    /// Read and evaluate `source`.
    ///
    /// Every top-level form is evaluated in order and the last value is returned.
    /// Unbalanced parentheses are rejected before anything is evaluated.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn eval_expr(&mut self, source: &str) -> Result<Expression, Error> {
        let forms = match scheme::read(source)? {
            Expression::Form(forms) => forms,
            atom @ Expression::Atom(_) => vec![atom],
        };

        let global = Environment::new();
        let mut last = None;
        for form in &forms {
            last = Some(self.eval(form, &global)?);
        }
        last.ok_or(Error::EmptyInput)
    }

    /// Evaluate an expression against a local environment
    pub fn eval(&mut self, expr: &Expression, env: &Environment) -> Result<Expression, Error> {
        self.eval_with_depth_tracking(expr, env, 0)
    }

    /// Evaluate an expression with depth tracking to prevent stack overflow
    pub(crate) fn eval_with_depth_tracking(
        &mut self,
        expr: &Expression,
        env: &Environment,
        depth: usize,
    ) -> Result<Expression, Error> {
        if depth >= MAX_EVAL_DEPTH {
            return Err(Error::DepthLimitExceeded);
        }
        match expr {
            Expression::Atom(token) => Ok(self.eval_atom(token, env)),
            Expression::Form(elements) => match elements.as_slice() {
                [] => Err(Error::UnboundOperator("()".to_owned())),
                // A parenthesized single element evaluates as that element
                [single] => self.eval_with_depth_tracking(single, env, depth + 1),
                [head, args @ ..] => {
                    trace!(depth, form = %expr, "evaluating form");
                    self.eval_form(head, args, env, depth)
                }
            },
        }
    }

    fn eval_atom(&self, token: &Token, env: &Environment) -> Expression {
        if token.is_self_evaluating() {
            return Expression::Atom(token.clone());
        }
        // An unbound symbol evaluates to itself
        self.resolve(token, env)
            .unwrap_or_else(|| Expression::Atom(token.clone()))
    }

    /// Look an atom up through every resolver in precedence order
    pub fn resolve(&self, token: &Token, env: &Environment) -> Option<Expression> {
        RESOLUTION_ORDER
            .iter()
            .find_map(|resolver| self.lookup(*resolver, token, env))
    }

    fn lookup(&self, resolver: Resolver, token: &Token, env: &Environment) -> Option<Expression> {
        match resolver {
            Resolver::Local => env.get(token).cloned(),
            Resolver::Symbols => self.symbols.get(token).cloned(),
            Resolver::Functions => self
                .functions
                .get(token)
                .map(|f| Expression::Atom(Token::Function(f.clone()))),
            Resolver::Constants => self.constants.get(token).cloned().map(Expression::Atom),
        }
    }

    fn eval_form(
        &mut self,
        head: &Expression,
        args: &[Expression],
        env: &Environment,
        depth: usize,
    ) -> Result<Expression, Error> {
        let op = match head {
            Expression::Atom(op) => op,
            Expression::Form(_) => {
                // A computed operator, e.g. ((lambda (x) x) 1)
                let callee = self.eval_with_depth_tracking(head, env, depth + 1)?;
                return match callee {
                    Expression::Atom(Token::Function(function)) => {
                        self.call(&function, args, env, depth)
                    }
                    other => Err(Error::UnboundOperator(other.to_string())),
                };
            }
        };

        if let Some(function) = self.functions.get(op).cloned() {
            return self.call(&function, args, env, depth);
        }

        if let Some(special_form) = self.special_forms.get(op).copied() {
            special_form.validate_arity(args.len())?;
            if let OpKind::SpecialForm(form_fn) = special_form.op_kind {
                return form_fn(self, args, env, depth);
            }
        }

        if let Token::Function(function) = op {
            return self.call(function, args, env, depth);
        }

        // Functions bound as values, e.g. by let
        let bound = env.get(op).or_else(|| self.symbols.get(op)).cloned();
        if let Some(Expression::Atom(Token::Function(function))) = bound {
            return self.call(&function, args, env, depth);
        }

        if QUOTE_SYMBOLS.iter().any(|q| op.is_symbol(q)) {
            return eval_quote(op, args);
        }

        Err(Error::UnboundOperator(op.to_string()))
    }

    /// Evaluate the argument expressions, then apply `function`
    fn call(
        &mut self,
        function: &Function,
        arg_exprs: &[Expression],
        env: &Environment,
        depth: usize,
    ) -> Result<Expression, Error> {
        let args = arg_exprs
            .iter()
            .map(|arg| self.eval_with_depth_tracking(arg, env, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        self.apply(function, &args, depth)
    }

    fn apply(
        &mut self,
        function: &Function,
        args: &[Expression],
        depth: usize,
    ) -> Result<Expression, Error> {
        match function {
            Function::Builtin { func, .. } => func(args),
            Function::Closure(closure) => {
                if closure.params.len() != args.len() {
                    return Err(Error::arity_mismatch(
                        function.id(),
                        Arity::Exact(closure.params.len()),
                        args.len(),
                    ));
                }

                let mut frame = Environment::with_parent(closure.env.clone());
                for (param, arg) in closure.params.iter().zip(args) {
                    frame.define(param.clone(), arg.clone());
                }
                self.eval_with_depth_tracking(&closure.body, &frame, depth + 1)
            }
        }
    }

    /// Bind `name` in the session tables; functions go to the function table
    fn bind_global(&mut self, name: Token, value: Expression) {
        debug!(name = %name, value = %value, "binding");
        if let Expression::Atom(Token::Function(function)) = &value {
            self.symbols.remove(&name);
            self.functions.insert(name, function.clone());
        } else {
            if self.functions.get(&name).is_some_and(Function::is_closure) {
                self.functions.remove(&name);
            }
            self.symbols.insert(name, value);
        }
    }

    /// Global let bindings always land in the symbol table
    fn bind_let_global(&mut self, name: Token, value: Expression) {
        debug!(name = %name, value = %value, "let binding");
        self.symbols.insert(name, value);
    }
}

fn symbol_text(token: &Token) -> String {
    match token {
        Token::Symbol(name) => name.clone(),
        other => other.to_string(),
    }
}

/// `(quote x)` and `(q x)` return `x` unevaluated
fn eval_quote(op: &Token, args: &[Expression]) -> Result<Expression, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_mismatch(
            &symbol_text(op),
            Arity::Exact(1),
            args.len(),
        )),
    }
}

/// Evaluate define special form
pub(crate) fn eval_define(
    interp: &mut Interpreter,
    args: &[Expression],
    env: &Environment,
    depth: usize,
) -> Result<Expression, Error> {
    match args {
        [Expression::Atom(name @ Token::Symbol(_)), body] => {
            let value = match body {
                Expression::Atom(_) if !interp.config.eager_definitions => body.clone(),
                _ => interp.eval_with_depth_tracking(body, env, depth + 1)?,
            };
            interp.bind_global(name.clone(), value.clone());
            Ok(value)
        }
        [name, _] => Err(Error::InvalidDefinition(format!(
            "define requires a symbol name, found {name}"
        ))),
        _ => Err(Error::arity_mismatch("define", Arity::Exact(2), args.len())),
    }
}

/// Evaluate let special form
pub(crate) fn eval_let(
    interp: &mut Interpreter,
    args: &[Expression],
    env: &Environment,
    depth: usize,
) -> Result<Expression, Error> {
    let [Expression::Form(declarations), body @ ..] = args else {
        return match args.first() {
            Some(other) => Err(Error::InvalidDefinition(format!(
                "let requires a list of (name value) pairs, found {other}"
            ))),
            None => Err(Error::arity_mismatch("let", Arity::AtLeast(2), 0)),
        };
    };
    if body.is_empty() {
        return Err(Error::arity_mismatch("let", Arity::AtLeast(2), args.len()));
    }

    // Every value sees the outer environment only; nothing is bound until all succeed
    let mut bindings = Vec::with_capacity(declarations.len());
    for declaration in declarations {
        match declaration {
            Expression::Form(pair) => match pair.as_slice() {
                [Expression::Atom(name @ Token::Symbol(_)), value_expr] => {
                    let value = interp.eval_with_depth_tracking(value_expr, env, depth + 1)?;
                    bindings.push((name.clone(), value));
                }
                _ => {
                    return Err(Error::InvalidDefinition(format!(
                        "let binding must be (name value), found {declaration}"
                    )));
                }
            },
            Expression::Atom(_) => {
                return Err(Error::InvalidDefinition(format!(
                    "let binding must be (name value), found {declaration}"
                )));
            }
        }
    }

    match interp.config.let_scoping {
        LetScoping::Global => {
            for (name, value) in bindings {
                interp.bind_let_global(name, value);
            }
            eval_body(interp, body, env, depth)
        }
        LetScoping::Lexical => {
            let mut frame = Environment::with_parent(env.clone());
            for (name, value) in bindings {
                frame.define(name, value);
            }
            eval_body(interp, body, &frame, depth)
        }
    }
}

/// Evaluate body forms in order, returning the last value
fn eval_body(
    interp: &mut Interpreter,
    body: &[Expression],
    env: &Environment,
    depth: usize,
) -> Result<Expression, Error> {
    let mut last = None;
    for expr in body {
        last = Some(interp.eval_with_depth_tracking(expr, env, depth + 1)?);
    }
    last.ok_or_else(|| Error::arity_mismatch("let", Arity::AtLeast(2), 1))
}

/// Evaluate if special form
pub(crate) fn eval_if(
    interp: &mut Interpreter,
    args: &[Expression],
    env: &Environment,
    depth: usize,
) -> Result<Expression, Error> {
    let [predicate, then_expr, else_expr] = args else {
        return Err(Error::arity_mismatch("if", Arity::Exact(3), args.len()));
    };
    let nil = Expression::Atom(Token::nil());

    if interp.config.eager_branches {
        let condition = interp.eval_with_depth_tracking(predicate, env, depth + 1)?;
        let chosen = if condition == nil { else_expr } else { then_expr };
        interp.eval_with_depth_tracking(chosen, env, depth + 1)
    } else {
        // The predicate is compared as written and the branch is returned as is
        let chosen = if *predicate == nil { else_expr } else { then_expr };
        Ok(chosen.clone())
    }
}

/// Evaluate lambda special form
pub(crate) fn eval_lambda(
    _interp: &mut Interpreter,
    args: &[Expression],
    env: &Environment,
    _depth: usize,
) -> Result<Expression, Error> {
    match args {
        [Expression::Form(param_list), body] => {
            let mut params: Vec<Token> = Vec::with_capacity(param_list.len());
            for param in param_list {
                match param {
                    Expression::Atom(name @ Token::Symbol(_)) => {
                        if params.contains(name) {
                            return Err(Error::InvalidDefinition(format!(
                                "duplicate parameter name {name}"
                            )));
                        }
                        params.push(name.clone());
                    }
                    other => {
                        return Err(Error::InvalidDefinition(format!(
                            "lambda parameters must be symbols, found {other}"
                        )));
                    }
                }
            }

            Ok(Expression::Atom(Token::Function(Function::Closure(
                Arc::new(Closure {
                    params,
                    body: body.clone(),
                    env: env.clone(),
                }),
            ))))
        }
        [other, _] => Err(Error::InvalidDefinition(format!(
            "lambda parameters must be a list, found {other}"
        ))),
        _ => Err(Error::arity_mismatch("lambda", Arity::Exact(2), args.len())),
    }
}
