use crate::ast::{Lambda, Value};
use crate::builtinops::{BUILTIN_CONSTANTS, OpKind, find_special_form, get_builtin_ops};
use crate::environment::Environment;
use crate::stack::ensure_sufficient_stack;
use crate::{DEFAULT_MAX_EVAL_DEPTH, Error, template};
use std::rc::Rc;
use std::sync::Arc;

pub mod intooperation;

/// Signature shared by the special forms. Arguments arrive unevaluated and
/// without the leading keyword.
pub type SpecialFormFn =
    fn(&[Value], &Environment, &EvalConfig, usize) -> Result<Value, Error>;

/// How a call to a user function binds its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopingMode {
    /// Parameters are defined directly on the calling scope and the body runs
    /// in a child of it. Bindings stay visible to the caller after the call.
    #[default]
    Caller,
    /// Parameters live in a fresh scope whose outer scope is the caller's.
    Dynamic,
    /// `defun` captures the scope it runs in; calls bind parameters in a fresh
    /// scope whose outer scope is that captured one.
    Lexical,
}

/// Evaluation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Deepest nesting of evaluations before `RecursionLimit`
    pub max_depth: usize,
    pub scoping: ScopingMode,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: DEFAULT_MAX_EVAL_DEPTH,
            scoping: ScopingMode::default(),
        }
    }
}

/// Evaluate an expression with the default settings (public API)
pub fn evaluate(expr: &Value, env: &Environment) -> Result<Value, Error> {
    evaluate_with_config(expr, env, &EvalConfig::default())
}

/// Evaluate an expression with explicit settings
pub fn evaluate_with_config(
    expr: &Value,
    env: &Environment,
    config: &EvalConfig,
) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, config, 0)
}

/// Evaluate an expression, failing once `depth` reaches the configured limit
fn eval_with_depth_tracking(
    expr: &Value,
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    if depth >= config.max_depth {
        tracing::debug!(limit = config.max_depth, "recursion limit reached");
        return Err(Error::RecursionLimit {
            limit: config.max_depth,
        });
    }

    match expr {
        // Variable lookup
        Value::Symbol(name) => env.find(name),

        // Special forms and function application
        Value::List(elements) => ensure_sufficient_stack(|| eval_list(elements, env, config, depth))
            .map_err(|err| add_context(err, expr)),

        // Everything else evaluates to itself
        _ => Ok(expr.clone()),
    }
}

const CONTEXT_PREFIX: &str = "\n  Context: while evaluating: ";

/// Attach the innermost failing list to evaluation and type errors
fn add_context(error: Error, expr: &Value) -> Error {
    match error {
        Error::EvalError(msg) if !msg.contains(CONTEXT_PREFIX) => {
            Error::EvalError(format!("{msg}{CONTEXT_PREFIX}{expr}"))
        }
        Error::TypeMismatch(msg) if !msg.contains(CONTEXT_PREFIX) => {
            Error::TypeMismatch(format!("{msg}{CONTEXT_PREFIX}{expr}"))
        }
        // Unbound names, arity and recursion errors carry their own context
        other => other,
    }
}

fn eval_list(
    elements: &[Value],
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    let [head, arg_exprs @ ..] = elements else {
        return Err(Error::EvalError("Cannot evaluate empty list".to_owned()));
    };

    // Special forms are recognized by keyword before any lookup
    if let Value::Symbol(name) = head
        && let Some(op) = find_special_form(name)
        && let OpKind::SpecialForm(form) = &op.op_kind
    {
        op.validate_arity(arg_exprs.len())?;
        return form(arg_exprs, env, config, depth);
    }

    // The head and each argument get a scope of their own, left to right
    let func = eval_with_depth_tracking(head, &env.child(), config, depth + 1)?;
    let args = arg_exprs
        .iter()
        .map(|arg| eval_with_depth_tracking(arg, &env.child(), config, depth + 1))
        .collect::<Result<Vec<_>, _>>()?;

    apply(func, args, env, config, depth)
}

fn apply(
    func: Value,
    args: Vec<Value>,
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    match func {
        Value::Function(lambda) => apply_lambda(&lambda, args, env, config, depth),
        Value::Builtin { func, .. } => func(args),
        // A literal in head position is its own result
        Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Bool(_) => Ok(func),
        other => Err(Error::TypeMismatch(format!(
            "Cannot apply non-function {}: {other}",
            other.type_name()
        ))),
    }
}

#[tracing::instrument(level = "trace", skip_all, fields(name = %lambda.name))]
fn apply_lambda(
    lambda: &Lambda,
    args: Vec<Value>,
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    if args.len() != lambda.params.len() {
        return Err(Error::arity_error(
            lambda.name.as_str(),
            lambda.params.len(),
            args.len(),
        ));
    }

    let scope = match (config.scoping, &lambda.env) {
        (ScopingMode::Caller, _) => {
            for (param, arg) in lambda.params.iter().zip(args) {
                env.define(param.as_str(), arg);
            }
            env.child()
        }
        (ScopingMode::Lexical, Some(captured)) => {
            let Some(defining) = captured.upgrade() else {
                return Err(Error::EvalError(format!(
                    "the scope that defined {} no longer exists",
                    lambda.name
                )));
            };
            Environment::new(&lambda.params, args, Some(defining))
        }
        // Functions defined under another mode have nothing captured
        (ScopingMode::Dynamic | ScopingMode::Lexical, _) => {
            Environment::new(&lambda.params, args, Some(env.clone()))
        }
    };

    eval_with_depth_tracking(&lambda.body, &scope, config, depth + 1)
}

/// `(if condition then else)`: anything but `false` selects `then`
pub(crate) fn eval_if(
    args: &[Value],
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    let [condition, then_expr, else_expr] = args else {
        return Err(Error::arity_error("if", 3, args.len()));
    };

    let condition = eval_with_depth_tracking(condition, &env.child(), config, depth + 1)?;
    let branch = if condition.is_truthy() {
        then_expr
    } else {
        else_expr
    };
    eval_with_depth_tracking(branch, &env.child(), config, depth + 1)
}

/// `(defun name (params...) body)`: binds `name` in the current scope
pub(crate) fn eval_defun(
    args: &[Value],
    env: &Environment,
    config: &EvalConfig,
    _depth: usize,
) -> Result<Value, Error> {
    let [name, param_list, body] = args else {
        return Err(Error::arity_error("defun", 3, args.len()));
    };

    let Value::Symbol(name) = name else {
        return Err(Error::TypeMismatch(format!(
            "defun requires a symbol for the function name, got {}",
            name.type_name()
        )));
    };

    let Value::List(param_list) = param_list else {
        return Err(Error::TypeMismatch(format!(
            "defun parameters must be a list, got {}",
            param_list.type_name()
        )));
    };

    let params = param_list
        .iter()
        .map(|param| match param {
            Value::Symbol(param) => Ok(param.clone()),
            other => Err(Error::TypeMismatch(format!(
                "defun parameters must be symbols, got {}",
                other.type_name()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(name = %name, arity = params.len(), scoping = ?config.scoping, "defun");

    // Weak, since the function is stored in the scope it captures
    let captured = (config.scoping == ScopingMode::Lexical).then(|| env.downgrade());
    let lambda = Lambda {
        name: name.clone(),
        params,
        body: body.clone(),
        env: captured,
    };
    env.define(name.as_str(), Value::Function(Rc::new(lambda)));

    Ok(Value::Str(format!("Defined function: {}", name.to_uppercase())))
}

/// `(format dest token... [fill])`: builds text from the tokens. `dest` is
/// accepted for familiarity and ignored; a trailing list is evaluated and
/// substituted for the `~D` placeholders.
pub(crate) fn eval_format(
    args: &[Value],
    env: &Environment,
    config: &EvalConfig,
    depth: usize,
) -> Result<Value, Error> {
    let Some((_dest, rest)) = args.split_first() else {
        return Err(Error::arity_error("format", 1, 0));
    };

    let (tokens, fill) = match rest.split_last() {
        Some((fill_expr @ Value::List(_), tokens)) => {
            let fill = eval_with_depth_tracking(fill_expr, &env.child(), config, depth + 1)?;
            (tokens, Some(fill))
        }
        _ => (rest, None),
    };

    Ok(Value::Str(template::render(tokens, fill.as_ref())))
}

/// Create a root environment holding every builtin function and constant
pub fn create_global_env() -> Environment {
    let env = Environment::root();

    let mut functions = 0;
    for builtin_op in get_builtin_ops() {
        if let OpKind::Function(func) = &builtin_op.op_kind {
            env.define(
                builtin_op.id,
                Value::Builtin {
                    id: builtin_op.id.to_owned(),
                    func: Arc::clone(func),
                },
            );
            functions += 1;
        }
    }

    for &(name, value) in BUILTIN_CONSTANTS {
        env.define(name, Value::Float(value));
    }

    tracing::debug!(
        functions,
        constants = BUILTIN_CONSTANTS.len(),
        "global environment created"
    );
    env
}
