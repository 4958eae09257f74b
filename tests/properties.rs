//! Property-based tests for the reader and evaluator.

use proptest::prelude::*;
use sexpeval::ast::Value;
use sexpeval::reader::{are_parens_matched, paren_depth, parse_atom, tokenize};
use sexpeval::{create_global_env, evaluate, parse};

// ============================================================================
// Strategies
// ============================================================================

/// Atom text: numbers, names and operator characters. NaN is left out since it
/// never equals itself.
fn arb_atom() -> impl Strategy<Value = String> {
    "[a-z0-9+*/<>=.-]{1,6}".prop_filter("NaN", |s| {
        !matches!(parse_atom(s), Value::Float(x) if x.is_nan())
    })
}

/// Balanced, space-separated S-expression source text
fn arb_sexpr() -> impl Strategy<Value = String> {
    arb_atom().prop_recursive(4, 48, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(|elems| format!("({})", elems.join(" ")))
    })
}

/// Arithmetic source paired with its value, or `None` on integer overflow
fn arb_arith() -> impl Strategy<Value = (String, Option<i64>)> {
    let leaf = (-1000i64..1000).prop_map(|n| (n.to_string(), Some(n)));
    leaf.prop_recursive(4, 32, 2, |inner| {
        (prop_oneof![Just('+'), Just('-'), Just('*')], inner.clone(), inner).prop_map(
            |(op, (lhs, a), (rhs, b))| {
                let value = match (a, b) {
                    (Some(a), Some(b)) => match op {
                        '+' => a.checked_add(b),
                        '-' => a.checked_sub(b),
                        _ => a.checked_mul(b),
                    },
                    _ => None,
                };
                (format!("({op} {lhs} {rhs})"), value)
            },
        )
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A token is either a lone paren or contains no paren at all
    #[test]
    fn tokens_never_mix_parens(source in arb_sexpr()) {
        for token in tokenize(&source) {
            let has_paren = token.contains(['(', ')']);
            prop_assert!(
                !has_paren || token == "(" || token == ")",
                "token {:?} from {:?}", token, source
            );
        }
    }

    /// The tokenizer and reader never panic, whatever the input
    #[test]
    fn reader_no_panic(input in ".{0,100}") {
        let _tokens = tokenize(&input);
        let _result = parse(&input);
    }

    /// Generated lists are balanced and read back to what they print as
    #[test]
    fn balanced_lists_parse(source in arb_sexpr()) {
        let tokens = tokenize(&source);
        prop_assert_eq!(paren_depth(&tokens), 0);

        let expr = parse(&source);
        prop_assert!(expr.is_ok(), "{:?} failed: {:?}", source, expr);
        if let Ok(expr) = expr {
            if matches!(expr, Value::List(_)) {
                prop_assert_eq!(are_parens_matched(&source), Ok(true));
            }
            let reprinted = expr.to_string();
            prop_assert_eq!(parse(&reprinted).ok(), Some(expr));
        }
    }

    /// Integer arithmetic agrees with checked Rust arithmetic
    #[test]
    fn arithmetic_matches_host((source, expected) in arb_arith()) {
        let env = create_global_env();
        let expr = parse(&source);
        prop_assert!(expr.is_ok(), "{:?} failed to parse", source);
        if let Ok(expr) = expr {
            let result = evaluate(&expr, &env);
            match expected {
                Some(n) => prop_assert_eq!(result, Ok(Value::Int(n))),
                None => prop_assert!(result.is_err(), "{:?} should overflow", source),
            }
        }
    }

    /// Factorial through a user function matches the host's
    #[test]
    fn user_factorial_matches_host(n in 0i64..=20) {
        let env = create_global_env();
        let defun = parse("(defun fact (n) (if (<= n 1) 1 (* n (fact (- n 1)))))");
        prop_assert!(defun.is_ok());
        if let Ok(defun) = defun {
            prop_assert!(evaluate(&defun, &env).is_ok());
        }
        let expected: i64 = (1..=n).product();
        let call = parse(&format!("(fact {n})"));
        prop_assert!(call.is_ok());
        if let Ok(call) = call {
            prop_assert_eq!(evaluate(&call, &env), Ok(Value::Int(expected)));
        }
    }
}
