//! This module defines the core value type shared by the reader and the
//! evaluator. The main enum, [`Value`], covers both program structure (symbols
//! and lists produced by the reader) and runtime results (numbers, booleans,
//! strings, user functions and host builtins). [`Number`] is the narrowed view
//! arithmetic builtins work with. Ergonomic helpers such as [`val`], [`sym`]
//! and [`nil`] keep AST construction in tests short.

use crate::Error;
use crate::environment::WeakEnvironment;
use crate::evaluator::intooperation::OperationFn;
use std::rc::Rc;
use std::sync::Arc;

/// A user-defined function: `(defun name (params...) body)`.
pub struct Lambda {
    pub name: String,
    pub params: Vec<String>,
    pub body: Value,
    /// Defining environment, captured only under lexical scoping. Held weakly:
    /// the function is usually stored in that same environment.
    pub env: Option<WeakEnvironment>,
}

/// Core value type of the interpreter
#[derive(Clone)]
pub enum Value {
    /// Exact whole numbers
    Int(i64),
    /// Decimal or exponential numbers
    Float(f64),
    /// Results of comparisons
    Bool(bool),
    /// Text produced by `defun` and `format`
    Str(String),
    /// Identifiers and operator names
    Symbol(String),
    /// Nested expressions
    List(Vec<Value>),
    /// User-defined functions
    Function(Rc<Lambda>),
    /// Host builtins; compared by id rather than by function pointer
    Builtin { id: String, func: Arc<OperationFn> },
}

/// Numeric view of a [`Value`] used by arithmetic and comparison builtins
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }
}

impl Value {
    /// Anything but `false` counts as true in a condition
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Function(_) => "function",
            Value::Builtin { .. } => "builtin-function",
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(x) => Some(Number::Float(*x)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Function(lambda) => write!(
                f,
                "Function({}, params={:?}, body={:?})",
                lambda.name, lambda.params, lambda.body
            ),
            Value::Builtin { id, .. } => write!(f, "Builtin({id})"),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            // Debug keeps the decimal point on whole floats (3.0, not 3)
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) | Value::Symbol(s) => write!(f, "{s}"),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::Function(lambda) => write!(f, "#<function:{}>", lambda.name),
            Value::Builtin { id, .. } => write!(f, "#<builtin-function:{id}>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            // The same definition, not merely the same text
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin { id: id1, .. }, Value::Builtin { id: id2, .. }) => id1 == id2,
            _ => false,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(n) => Value::Int(n),
            Number::Float(x) => Value::Float(x),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Int(n as i64)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(|x| x.into()).collect())
    }
}

// Fallible conversions from `Value` back into the Rust types builtins take.

impl std::convert::TryInto<i64> for Value {
    type Error = Error;

    fn try_into(self) -> Result<i64, Error> {
        match self {
            Value::Int(n) => Ok(n),
            other => Err(Error::TypeMismatch(format!(
                "expected integer, got {}",
                other.type_name()
            ))),
        }
    }
}

impl std::convert::TryInto<f64> for Value {
    type Error = Error;

    fn try_into(self) -> Result<f64, Error> {
        match self.as_number() {
            Some(n) => Ok(n.as_f64()),
            None => Err(Error::TypeMismatch(format!(
                "expected number, got {}",
                self.type_name()
            ))),
        }
    }
}

impl std::convert::TryInto<Number> for Value {
    type Error = Error;

    fn try_into(self) -> Result<Number, Error> {
        self.as_number().ok_or_else(|| {
            Error::TypeMismatch(format!("expected number, got {}", self.type_name()))
        })
    }
}

/// Helper function for creating symbols
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values from anything convertible
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating the empty list
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::List(vec![])
}

#[cfg(test)]
mod helper_function_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (val(42), Value::Int(42)),
            (val(-17), Value::Int(-17)),
            (val(255u8), Value::Int(255)),
            (val(i64::MAX), Value::Int(i64::MAX)),
            (val(2.5), Value::Float(2.5)),
            (val(true), Value::Bool(true)),
            (val("hello"), Value::Str("hello".to_owned())),
            (sym("fact"), Value::Symbol("fact".to_owned())),
            (sym("<="), Value::Symbol("<=".to_owned())),
            (nil(), Value::List(vec![])),
            (
                val([1, 2, 3]),
                Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            ),
            (
                val(vec![sym("+"), val(1), val(2.0)]),
                Value::List(vec![
                    Value::Symbol("+".to_owned()),
                    Value::Int(1),
                    Value::Float(2.0),
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "test case #{}", i + 1);
        }
    }

    #[test]
    fn test_display() {
        let cases = vec![
            (val(42), "42"),
            (val(-7), "-7"),
            (val(3.0), "3.0"),
            (val(0.5), "0.5"),
            (val(300.0), "300.0"),
            (val(1e20), "1e20"),
            (val(f64::INFINITY), "inf"),
            (val(true), "true"),
            (val(false), "false"),
            (val("Defined function: FACT"), "Defined function: FACT"),
            (sym("pi"), "pi"),
            (val(vec![sym("+"), val(1), val(vec![sym("*"), val(2), val(3)])]), "(+ 1 (* 2 3))"),
            (nil(), "()"),
        ];

        for (value, expected) in cases {
            assert_eq!(format!("{value}"), expected, "display of {value:?}");
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!val(false).is_truthy());
        assert!(val(true).is_truthy());
        // Numbers never decide truthiness, zero included
        assert!(val(0).is_truthy());
        assert!(val(0.0).is_truthy());
        assert!(nil().is_truthy());
        assert!(val("").is_truthy());
    }

    #[test]
    fn test_numeric_equality_is_structural() {
        assert_ne!(val(1), val(1.0));
        assert_ne!(val(f64::NAN), val(f64::NAN));
        assert_eq!(val(1.5), val(1.5));
        assert_ne!(sym("x"), val("x"));
    }

    #[test]
    fn test_try_into_conversions() {
        let n: Result<i64, Error> = val(5).try_into();
        assert_eq!(n, Ok(5));
        let x: Result<f64, Error> = val(5).try_into();
        assert_eq!(x, Ok(5.0));
        let bad: Result<i64, Error> = val(5.5).try_into();
        assert!(matches!(bad, Err(Error::TypeMismatch(_))));
        let num: Result<Number, Error> = val(true).try_into();
        assert!(matches!(num, Err(Error::TypeMismatch(_))));
    }
}
