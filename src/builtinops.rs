//! Built-in operations registry.
//!
//! This module holds every operation the global environment starts with,
//! plus the table of special forms the evaluator recognizes by name.
//!
//! ```scheme
//! (+ 1 2)          ; binary arithmetic, ints stay ints
//! (/ 1 2)          ; true division, always a float
//! (<= 1 1.0)       ; numeric comparison across int and float
//! (sin (/ pi 2))   ; math functions and constants
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: Evaluate all arguments before application (e.g., `+`, `sin`)
//! - **Special Forms**: Control evaluation of their arguments (`if`, `defun`, `format`)
//!
//! Special forms are listed here so all builtin names live in one place, but
//! only functions and constants are bound in the global environment.
//!
//! ## Error Handling
//!
//! - **Type Safety**: Operations reject non-numbers (e.g., `(+ 1 true)` errors)
//! - **Overflow Detection**: Integer arithmetic reports overflow instead of wrapping
//! - **Math Errors**: A NaN result from non-NaN inputs is a domain error, an
//!   infinite result from finite inputs is a range error
//! - **Arity Checking**: Every builtin validates its argument count
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with typed parameters (`f64`, `i64`, `Number`, `Value`)
//! 2. **Add it to BUILTIN_OPS** with its identifier and arity
//! 3. **Add tests** covering edge cases and error conditions

use crate::Error;
use crate::ast::{Number, Value};
use crate::evaluator::intooperation::{IntoOperation, OperationFn};
use crate::evaluator::{SpecialFormFn, eval_defun, eval_format, eval_if};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Accepted argument counts for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive bounds
    Range(usize, usize),
    Any,
}

impl Arity {
    /// Check `got` arguments against this arity, naming `name` on failure
    pub fn validate(&self, name: &str, got: usize) -> Result<(), Error> {
        let expected = match *self {
            Arity::Exact(n) if got != n => n,
            Arity::AtLeast(n) if got < n => n,
            Arity::Range(lo, _) if got < lo => lo,
            Arity::Range(_, hi) if got > hi => hi,
            _ => return Ok(()),
        };
        Err(Error::arity_error(name, expected, got))
    }
}

/// Represents the implementation of a built-in expression (function or special form)
#[derive(Clone)]
pub enum OpKind {
    /// Regular function that takes evaluated arguments
    Function(Arc<OperationFn>),
    /// Special form that receives its arguments unevaluated, along with the
    /// environment, evaluation settings and current depth
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The name this operation is called by
    pub id: &'static str,
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub(crate) fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(self.id, arg_count)
    }
}

/// Named constants bound in the global environment
pub const BUILTIN_CONSTANTS: &[(&str, f64)] = &[
    ("pi", std::f64::consts::PI),
    ("e", std::f64::consts::E),
    ("tau", std::f64::consts::TAU),
    ("inf", f64::INFINITY),
    ("nan", f64::NAN),
];

//
// Builtin Function Implementations
//

// Macro to generate binary arithmetic: int op int stays exact, anything
// involving a float is computed in floating point.
macro_rules! arithmetic_op {
    ($name:ident, $checked:ident, $op:tt, $what:literal) => {
        fn $name(a: Number, b: Number) -> Result<Number, Error> {
            match (a, b) {
                (Number::Int(x), Number::Int(y)) => x
                    .$checked(y)
                    .map(Number::Int)
                    .ok_or_else(|| Error::EvalError(concat!("Integer overflow in ", $what).into())),
                (a, b) => Ok(Number::Float(a.as_f64() $op b.as_f64())),
            }
        }
    };
}

arithmetic_op!(builtin_add, checked_add, +, "addition");
arithmetic_op!(builtin_sub, checked_sub, -, "subtraction");
arithmetic_op!(builtin_mul, checked_mul, *, "multiplication");

fn builtin_div(a: Number, b: Number) -> Result<f64, Error> {
    let divisor = b.as_f64();
    if divisor == 0.0 {
        return Err(Error::EvalError("division by zero".into()));
    }
    Ok(a.as_f64() / divisor)
}

/// Numeric ordering; exact for two ints, IEEE otherwise (NaN is unordered)
fn compare(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
        (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

macro_rules! numeric_comparison {
    ($name:ident, $ordering:pat) => {
        fn $name(a: Number, b: Number) -> bool {
            matches!(compare(a, b), Some($ordering))
        }
    };
}

numeric_comparison!(builtin_lt, Ordering::Less);
numeric_comparison!(builtin_le, Ordering::Less | Ordering::Equal);
numeric_comparison!(builtin_gt, Ordering::Greater);
numeric_comparison!(builtin_ge, Ordering::Greater | Ordering::Equal);

/// Numbers compare by value across int and float; everything else structurally
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => compare(x, y) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn builtin_eq(a: Value, b: Value) -> bool {
    values_equal(&a, &b)
}

fn builtin_ne(a: Value, b: Value) -> bool {
    !values_equal(&a, &b)
}

/// Reject results that the inputs cannot justify
fn checked_math(inputs: &[f64], result: f64) -> Result<f64, Error> {
    if result.is_nan() && !inputs.iter().any(|x| x.is_nan()) {
        Err(Error::EvalError("math domain error".into()))
    } else if result.is_infinite() && inputs.iter().all(|x| x.is_finite()) {
        Err(Error::EvalError("math range error".into()))
    } else {
        Ok(result)
    }
}

fn require_positive(x: f64) -> Result<(), Error> {
    if x <= 0.0 {
        return Err(Error::EvalError("math domain error".into()));
    }
    Ok(())
}

fn builtin_log(args: &[Value]) -> Result<Value, Error> {
    let x: f64 = args[0].clone().try_into()?;
    require_positive(x)?;
    let result = match args.get(1) {
        None => checked_math(&[x], x.ln())?,
        Some(base) => {
            let base: f64 = base.clone().try_into()?;
            require_positive(base)?;
            if base == 1.0 {
                return Err(Error::EvalError("division by zero".into()));
            }
            checked_math(&[x, base], x.ln() / base.ln())?
        }
    };
    Ok(Value::Float(result))
}

fn builtin_log2(x: f64) -> Result<f64, Error> {
    require_positive(x)?;
    checked_math(&[x], x.log2())
}

fn builtin_log10(x: f64) -> Result<f64, Error> {
    require_positive(x)?;
    checked_math(&[x], x.log10())
}

fn builtin_log1p(x: f64) -> Result<f64, Error> {
    require_positive(x + 1.0)?;
    checked_math(&[x], x.ln_1p())
}

macro_rules! rounding_op {
    ($name:ident, $method:ident) => {
        fn $name(n: Number) -> Result<i64, Error> {
            match n {
                Number::Int(n) => Ok(n),
                Number::Float(x) => float_to_int(x.$method()),
            }
        }
    };
}

rounding_op!(builtin_floor, floor);
rounding_op!(builtin_ceil, ceil);
rounding_op!(builtin_trunc, trunc);

fn float_to_int(x: f64) -> Result<i64, Error> {
    if x.is_nan() {
        return Err(Error::EvalError("cannot convert NaN to integer".into()));
    }
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    if x.is_infinite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
        return Err(Error::EvalError("cannot convert float to integer: out of range".into()));
    }
    Ok(x as i64)
}

fn builtin_factorial(n: i64) -> Result<i64, Error> {
    if n < 0 {
        return Err(Error::EvalError(
            "factorial() not defined for negative values".into(),
        ));
    }
    (1..=n).try_fold(1i64, |acc, k| {
        acc.checked_mul(k)
            .ok_or_else(|| Error::EvalError("Integer overflow in factorial".into()))
    })
}

fn gcd_u64(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn builtin_gcd(a: i64, b: i64) -> Result<i64, Error> {
    i64::try_from(gcd_u64(a.unsigned_abs(), b.unsigned_abs()))
        .map_err(|_| Error::EvalError("Integer overflow in gcd".into()))
}

fn builtin_lcm(a: i64, b: i64) -> Result<i64, Error> {
    let (a, b) = (a.unsigned_abs(), b.unsigned_abs());
    if a == 0 || b == 0 {
        return Ok(0);
    }
    (a / gcd_u64(a, b))
        .checked_mul(b)
        .and_then(|lcm| i64::try_from(lcm).ok())
        .ok_or_else(|| Error::EvalError("Integer overflow in lcm".into()))
}

fn builtin_isqrt(n: i64) -> Result<i64, Error> {
    if n < 0 {
        return Err(Error::EvalError("isqrt() argument must be nonnegative".into()));
    }
    Ok(n.isqrt())
}

fn require_nonnegative(id: &str, n: i64, k: i64) -> Result<(), Error> {
    if n < 0 || k < 0 {
        return Err(Error::EvalError(format!("{id}() arguments must be non-negative")));
    }
    Ok(())
}

fn overflow_check(id: &str, acc: i128) -> Result<i128, Error> {
    if acc > i128::from(i64::MAX) {
        return Err(Error::EvalError(format!("Integer overflow in {id}")));
    }
    Ok(acc)
}

/// Number of ways to choose `k` items from `n` without order
fn builtin_comb(n: i64, k: i64) -> Result<i64, Error> {
    require_nonnegative("comb", n, k)?;
    if k > n {
        return Ok(0);
    }
    let (n, k) = (i128::from(n), i128::from(k.min(n - k)));
    // Each partial product is itself a binomial coefficient, so the division is exact
    let result = (0..k).try_fold(1i128, |acc, i| {
        overflow_check("comb", acc * (n - i) / (i + 1))
    })?;
    Ok(result as i64)
}

/// Number of ways to choose `k` items from `n` in order; `k` defaults to `n`
fn builtin_perm(args: &[Value]) -> Result<Value, Error> {
    let n: i64 = args[0].clone().try_into()?;
    let k: i64 = match args.get(1) {
        Some(k) => k.clone().try_into()?,
        None => n,
    };
    require_nonnegative("perm", n, k)?;
    if k > n {
        return Ok(Value::Int(0));
    }
    let n = i128::from(n);
    let result =
        (0..i128::from(k)).try_fold(1i128, |acc, i| overflow_check("perm", acc * (n - i)))?;
    Ok(Value::Int(result as i64))
}

fn builtin_ldexp(x: f64, i: i64) -> Result<f64, Error> {
    let exp = i.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
    checked_math(&[x], libm::ldexp(x, exp))
}

/// Closeness with a relative tolerance of 1e-9 and no absolute tolerance
fn builtin_isclose(a: f64, b: f64) -> bool {
    const REL_TOL: f64 = 1e-9;
    if a == b {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= REL_TOL * a.abs().max(b.abs())
}

fn builtin_fixed<Args, F>(id: &str, f: F) -> Arc<OperationFn>
where
    F: IntoOperation<Args>,
{
    f.into_operation(id)
}

fn builtin_raw(
    id: &'static str,
    arity: Arity,
    f: fn(&[Value]) -> Result<Value, Error>,
) -> Arc<OperationFn> {
    Arc::new(move |args: Vec<Value>| {
        arity.validate(id, args.len())?;
        f(&args)
    })
}

fn function(id: &'static str, func: Arc<OperationFn>, arity: Arity) -> BuiltinOp {
    BuiltinOp {
        id,
        op_kind: OpKind::Function(func),
        arity,
    }
}

fn special_form(id: &'static str, form: SpecialFormFn, arity: Arity) -> BuiltinOp {
    BuiltinOp {
        id,
        op_kind: OpKind::SpecialForm(form),
        arity,
    }
}

// Unary f64 -> f64 functions whose results go through `checked_math`
macro_rules! math_unary {
    ($($id:literal => $f:expr),+ $(,)?) => {
        vec![$(
            function(
                $id,
                builtin_fixed::<(f64,), _>($id, |x: f64| checked_math(&[x], $f(x))),
                Arity::Exact(1),
            )
        ),+]
    };
}

macro_rules! math_binary {
    ($($id:literal => $f:expr),+ $(,)?) => {
        vec![$(
            function(
                $id,
                builtin_fixed::<(f64, f64), _>($id, |x: f64, y: f64| checked_math(&[x, y], $f(x, y))),
                Arity::Exact(2),
            )
        ),+]
    };
}

/// Global registry of all built-in operations, built once on first use.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    let mut ops = vec![
        // Special forms
        special_form("if", eval_if, Arity::Exact(3)),
        special_form("defun", eval_defun, Arity::Exact(3)),
        special_form("format", eval_format, Arity::AtLeast(1)),
        // Arithmetic operations
        function("+", builtin_fixed::<(Number, Number), _>("+", builtin_add), Arity::Exact(2)),
        function("-", builtin_fixed::<(Number, Number), _>("-", builtin_sub), Arity::Exact(2)),
        function("*", builtin_fixed::<(Number, Number), _>("*", builtin_mul), Arity::Exact(2)),
        function("/", builtin_fixed::<(Number, Number), _>("/", builtin_div), Arity::Exact(2)),
        // Comparison operations
        function("<", builtin_fixed::<(Number, Number), _>("<", builtin_lt), Arity::Exact(2)),
        function("<=", builtin_fixed::<(Number, Number), _>("<=", builtin_le), Arity::Exact(2)),
        function(">", builtin_fixed::<(Number, Number), _>(">", builtin_gt), Arity::Exact(2)),
        function(">=", builtin_fixed::<(Number, Number), _>(">=", builtin_ge), Arity::Exact(2)),
        function("=", builtin_fixed::<(Value, Value), _>("=", builtin_eq), Arity::Exact(2)),
        function("!=", builtin_fixed::<(Value, Value), _>("!=", builtin_ne), Arity::Exact(2)),
        // Logarithms
        function("log", builtin_raw("log", Arity::Range(1, 2), builtin_log), Arity::Range(1, 2)),
        function("log2", builtin_fixed::<(f64,), _>("log2", builtin_log2), Arity::Exact(1)),
        function("log10", builtin_fixed::<(f64,), _>("log10", builtin_log10), Arity::Exact(1)),
        function("log1p", builtin_fixed::<(f64,), _>("log1p", builtin_log1p), Arity::Exact(1)),
        // Rounding to integers
        function("floor", builtin_fixed::<(Number,), _>("floor", builtin_floor), Arity::Exact(1)),
        function("ceil", builtin_fixed::<(Number,), _>("ceil", builtin_ceil), Arity::Exact(1)),
        function("trunc", builtin_fixed::<(Number,), _>("trunc", builtin_trunc), Arity::Exact(1)),
        // Integer functions
        function(
            "factorial",
            builtin_fixed::<(i64,), _>("factorial", builtin_factorial),
            Arity::Exact(1),
        ),
        function("gcd", builtin_fixed::<(i64, i64), _>("gcd", builtin_gcd), Arity::Exact(2)),
        function("lcm", builtin_fixed::<(i64, i64), _>("lcm", builtin_lcm), Arity::Exact(2)),
        function("isqrt", builtin_fixed::<(i64,), _>("isqrt", builtin_isqrt), Arity::Exact(1)),
        function("comb", builtin_fixed::<(i64, i64), _>("comb", builtin_comb), Arity::Exact(2)),
        function("perm", builtin_raw("perm", Arity::Range(1, 2), builtin_perm), Arity::Range(1, 2)),
        // Float decomposition and comparison
        function("ldexp", builtin_fixed::<(f64, i64), _>("ldexp", builtin_ldexp), Arity::Exact(2)),
        function(
            "isclose",
            builtin_fixed::<(f64, f64), _>("isclose", builtin_isclose),
            Arity::Exact(2),
        ),
        // Classification
        function("isnan", builtin_fixed::<(f64,), _>("isnan", f64::is_nan), Arity::Exact(1)),
        function("isinf", builtin_fixed::<(f64,), _>("isinf", f64::is_infinite), Arity::Exact(1)),
        function(
            "isfinite",
            builtin_fixed::<(f64,), _>("isfinite", f64::is_finite),
            Arity::Exact(1),
        ),
    ];

    ops.extend(math_unary! {
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
        "asin" => f64::asin,
        "acos" => f64::acos,
        "atan" => f64::atan,
        "sinh" => f64::sinh,
        "cosh" => f64::cosh,
        "tanh" => f64::tanh,
        "asinh" => f64::asinh,
        "acosh" => f64::acosh,
        "atanh" => f64::atanh,
        "exp" => f64::exp,
        "expm1" => f64::exp_m1,
        "sqrt" => f64::sqrt,
        "cbrt" => f64::cbrt,
        "exp2" => f64::exp2,
        "erf" => libm::erf,
        "erfc" => libm::erfc,
        "gamma" => libm::tgamma,
        "lgamma" => libm::lgamma,
        "fabs" => f64::abs,
        "degrees" => f64::to_degrees,
        "radians" => f64::to_radians,
    });

    ops.extend(math_binary! {
        "atan2" => f64::atan2,
        "pow" => f64::powf,
        "hypot" => f64::hypot,
        "copysign" => f64::copysign,
        "fmod" => |x: f64, y: f64| x % y,
        "remainder" => libm::remainder,
        "nextafter" => libm::nextafter,
    });

    ops
});

/// Lazy map from id to BuiltinOp
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

pub(crate) fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Look up any builtin (function or special form) by name
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

/// Look up a special form by its keyword
pub(crate) fn find_special_form(id: &str) -> Option<&'static BuiltinOp> {
    find_builtin_op(id).filter(|op| op.is_special_form())
}
