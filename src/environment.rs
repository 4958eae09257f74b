//! Chained scopes for name resolution.
//!
//! An [`Environment`] is a cheap, clonable handle to one scope. Each scope owns
//! a map of bindings and a reference to exactly one outer scope (none for the
//! global scope), fixed when the scope is created. Lookups search the innermost
//! scope first and move outward, so inner bindings shadow outer ones.
//!
//! Handles share their scope: a binding defined through one clone is visible
//! through every other clone and through every child scope.

use crate::Error;
use crate::ast::Value;
use crate::builtinops::Arity;
use crate::evaluator::intooperation::{IntoOperation, OperationFn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

struct Scope {
    bindings: RefCell<HashMap<String, Value>>,
    outer: Option<Environment>,
}

impl Drop for Scope {
    // Unlink long outer chains one scope at a time instead of recursively
    fn drop(&mut self) {
        let mut outer = self.outer.take();
        while let Some(Environment(rc)) = outer {
            match Rc::try_unwrap(rc) {
                Ok(mut scope) => outer = scope.outer.take(),
                Err(_) => break,
            }
        }
    }
}

/// Handle to a scope in the environment chain
#[derive(Clone)]
pub struct Environment(Rc<Scope>);

/// Non-owning handle to a scope. It does not keep the scope alive, so a
/// function stored in the scope it refers to does not leak that scope.
#[derive(Clone)]
pub struct WeakEnvironment(Weak<Scope>);

impl WeakEnvironment {
    /// The scope, if some [`Environment`] still holds it
    pub fn upgrade(&self) -> Option<Environment> {
        self.0.upgrade().map(Environment)
    }
}

impl std::fmt::Debug for WeakEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(env) => f.debug_tuple("WeakEnvironment").field(&env).finish(),
            None => f.write_str("WeakEnvironment(<dropped>)"),
        }
    }
}

impl Environment {
    /// Create a scope binding `params` to `args` positionally.
    ///
    /// Callers check that the lengths agree; any surplus on either side is
    /// ignored here.
    pub fn new(params: &[String], args: Vec<Value>, outer: Option<Environment>) -> Self {
        let bindings = params.iter().cloned().zip(args).collect();
        Environment(Rc::new(Scope {
            bindings: RefCell::new(bindings),
            outer,
        }))
    }

    /// Create an empty root scope
    pub fn root() -> Self {
        Self::new(&[], Vec::new(), None)
    }

    /// Create an empty scope whose outer scope is `self`
    pub fn child(&self) -> Self {
        Self::new(&[], Vec::new(), Some(self.clone()))
    }

    /// Bind `name` in this scope only, replacing any previous binding here
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Resolve `name`, searching this scope and then each outer scope in turn
    pub fn find(&self, name: &str) -> Result<Value, Error> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(value) = env.0.bindings.borrow().get(name) {
                return Ok(value.clone());
            }
            scope = env.0.outer.as_ref();
        }
        Err(Error::UnboundName(name.to_owned()))
    }

    pub fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment(Rc::downgrade(&self.0))
    }

    /// Number of scopes between this one and the root, inclusive of both
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut scope = self.0.outer.as_ref();
        while let Some(env) = scope {
            depth += 1;
            scope = env.0.outer.as_ref();
        }
        depth
    }

    /// Register a builtin that works on raw argument slices.
    ///
    /// `arity` is checked before `func` runs, so `func` may index into its
    /// arguments within the declared bounds.
    ///
    /// # Example
    /// ```
    /// use sexpeval::{create_global_env, evaluate, parse};
    /// use sexpeval::ast::Value;
    /// use sexpeval::builtinops::Arity;
    /// use sexpeval::Error;
    ///
    /// fn count(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::Int(args.len() as i64))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("count", Arity::Any, count);
    /// let result = evaluate(&parse("(count 1 2 3)").unwrap(), &env).unwrap();
    /// assert_eq!(result, Value::Int(3));
    /// ```
    pub fn register_builtin_function(
        &self,
        name: &str,
        arity: Arity,
        func: fn(&[Value]) -> Result<Value, Error>,
    ) {
        let id = name.to_owned();
        let wrapped: Arc<OperationFn> = Arc::new(move |args: Vec<Value>| {
            arity.validate(&id, args.len())?;
            func(&args)
        });
        self.define(
            name,
            Value::Builtin {
                id: name.to_owned(),
                func: wrapped,
            },
        );
    }

    /// Register a strongly-typed Rust function as a builtin, with argument
    /// extraction and arity checking derived from its signature.
    ///
    /// ```rust,ignore
    /// fn clamp(x: f64, lo: f64, hi: f64) -> f64 { x.max(lo).min(hi) }
    /// env.register_builtin_operation::<_, (f64, f64, f64)>("clamp", clamp);
    /// ```
    ///
    /// Supported parameter types are `i64`, `f64`, [`crate::ast::Number`] and
    /// [`Value`]. Return types may be anything `Into<Value>` or a
    /// `Result<T, Error>` of one.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args> + 'static,
    {
        self.define(
            name,
            Value::Builtin {
                id: name.to_owned(),
                func: func.into_operation(name),
            },
        );
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Environment {
    // Bindings may hold functions that capture this very scope, so only the
    // shape is printed.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.0.bindings.borrow().len())
            .field("depth", &self.depth())
            .finish()
    }
}
