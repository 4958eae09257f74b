use crate::Error;
use crate::ast::{Number, Value};
use std::sync::Arc;

// NOTE: This module is internal plumbing for the evaluator.
// It defines the adapter layer that turns strongly-typed Rust
// functions into the erased `OperationFn` used at runtime.
//
// External users should interact with `Environment` and its
// registration APIs; the traits here only show up in their bounds.

/// Canonical erased builtin function type used by the evaluator.
///
/// Builtins receive ownership of their argument vector, enabling
/// implementations that consume arguments without cloning.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

// =====================================================================
// Argument conversion
// =====================================================================

/// Core trait used by the fixed-arity adapters to turn `Value` nodes
/// into strongly-typed parameters.
#[doc(hidden)]
pub trait FromParam: Sized {
    fn from_arg(value: Value) -> Result<Self, Error>;
}

impl FromParam for Value {
    fn from_arg(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

macro_rules! impl_from_param_via_try_into {
    ($($ty:ty),+) => {
        $(
            impl FromParam for $ty {
                fn from_arg(value: Value) -> Result<Self, Error> {
                    <Value as std::convert::TryInto<$ty>>::try_into(value)
                }
            }
        )+
    };
}

impl_from_param_via_try_into!(i64, f64, Number);

// =====================================================================
// Return-type adaptation for builtin functions
// =====================================================================

/// Normalizes builtin return types to the canonical
/// `Result<Value, Error>` expected by the evaluator.
#[doc(hidden)]
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

macro_rules! impl_into_value_result {
    ($($ty:ty),+) => {
        $(
            impl IntoValueResult for $ty {
                fn into_value_result(self) -> Result<Value, Error> {
                    Ok(self.into())
                }
            }
        )+
    };
}

impl_into_value_result!(Value, Number, i64, f64, bool, String, &'static str);

/// Converts a strongly-typed Rust function or closure into the erased
/// [`OperationFn`], parameterized by its argument tuple type.
///
/// The `id` names the builtin in arity errors.
pub trait IntoOperation<Args> {
    fn into_operation(self, id: &str) -> Arc<OperationFn>;
}

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Implements `IntoOperation` for functions of a given arity.
///
/// Arity is checked up front, then the owned argument vector is
/// destructured so each `FromParam` conversion can consume its value.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: Fn( $( $A ),+ ) -> R + Send + Sync + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            fn into_operation(self, id: &str) -> Arc<OperationFn> {
                let id = id.to_owned();
                Arc::new(move |args: Vec<Value>| {
                    let len = args.len();
                    let Ok([ $( $p ),+ ]) = <[Value; $arity]>::try_from(args) else {
                        return Err(Error::arity_error(id.as_str(), $arity, len));
                    };
                    $(
                        let $p = <$A as FromParam>::from_arg($p)?;
                    )+
                    (self)( $( $p ),+ ).into_value_result()
                })
            }
        }
    };
}

// 0-arg functions / closures
impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_operation(self, id: &str) -> Arc<OperationFn> {
        let id = id.to_owned();
        Arc::new(move |args: Vec<Value>| {
            if !args.is_empty() {
                return Err(Error::arity_error(id.as_str(), 0, args.len()));
            }
            (self)().into_value_result()
        })
    }
}

impl_into_operation_for_arity!(1, p0: A1);
impl_into_operation_for_arity!(2, p0: A1, p1: A2);
impl_into_operation_for_arity!(3, p0: A1, p1: A2, p2: A3);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;
    use pretty_assertions::assert_eq;

    fn erase<Args, F: IntoOperation<Args>>(id: &str, f: F) -> Arc<OperationFn> {
        f.into_operation(id)
    }

    #[test]
    fn test_zero_arg_operation() {
        let op = erase::<(), _>("answer", || 42i64);
        assert_eq!(op(vec![]).unwrap(), val(42));
        assert_eq!(
            op(vec![val(1)]).unwrap_err(),
            Error::arity_error("answer", 0, 1)
        );
    }

    #[test]
    fn test_typed_parameters_convert() {
        fn hyp(a: f64, b: f64) -> f64 {
            (a * a + b * b).sqrt()
        }
        let op = erase::<(f64, f64), _>("hyp", hyp);
        // Integers widen to f64 parameters
        assert_eq!(op(vec![val(3), val(4)]).unwrap(), val(5.0));
        assert!(matches!(
            op(vec![val(3), val(true)]).unwrap_err(),
            Error::TypeMismatch(_)
        ));
        assert_eq!(
            op(vec![val(3)]).unwrap_err(),
            Error::arity_error("hyp", 2, 1)
        );
    }

    #[test]
    fn test_result_return_type() {
        fn checked_neg(n: i64) -> Result<i64, Error> {
            n.checked_neg()
                .ok_or_else(|| Error::EvalError("overflow".into()))
        }
        let op = erase::<(i64,), _>("neg", checked_neg);
        assert_eq!(op(vec![val(5)]).unwrap(), val(-5));
        assert!(op(vec![val(i64::MIN)]).is_err());
        // i64 parameters do not accept floats
        assert!(op(vec![val(5.0)]).is_err());
    }

    #[test]
    fn test_value_and_number_parameters() {
        let op = erase::<(Value, Number), _>("pair", |v: Value, n: Number| {
            Value::List(vec![v, n.into()])
        });
        assert_eq!(
            op(vec![val("x"), val(2.5)]).unwrap(),
            val(vec![val("x"), val(2.5)])
        );
    }
}
