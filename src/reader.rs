//! Tokenizer and S-expression reader.
//!
//! Reading is split in two stages. [`tokenize`] turns source text into a flat
//! sequence of lexemes in which parentheses are always separate tokens. [`read`]
//! then consumes tokens from the front of that sequence to build one nested
//! [`Value`], classifying each leaf with [`parse_atom`].

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_till1, take_while},
    character::complete::one_of,
    combinator::{all_consuming, opt, value},
    sequence::preceded,
};
use std::collections::VecDeque;

use crate::ast::Value;
use crate::stack::ensure_sufficient_stack;
use crate::{DEFAULT_MAX_PARSE_DEPTH, Error, ParseError, ParseErrorKind};

/// Reader settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Deepest list nesting accepted before `TooDeeplyNested`
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: DEFAULT_MAX_PARSE_DEPTH,
        }
    }
}

fn is_paren(c: char) -> bool {
    c == '(' || c == ')'
}

/// One lexeme after optional leading whitespace
fn lexeme(input: &str) -> IResult<&str, &str> {
    preceded(
        take_while(char::is_whitespace),
        alt((
            tag("("),
            tag(")"),
            take_till1(|c: char| c.is_whitespace() || is_paren(c)),
        )),
    )
    .parse(input)
}

/// Split source text into tokens.
///
/// Parentheses are always their own tokens, everything else is separated by
/// whitespace. Empty input gives an empty sequence.
pub fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = source;
    // `lexeme` only fails once nothing but whitespace is left
    while let Ok((remaining, token)) = lexeme(rest) {
        tokens.push(token.to_owned());
        rest = remaining;
    }
    tokens
}

/// `inf`, `infinity` or `nan` with an optional sign, in any case
fn special_float(input: &str) -> IResult<&str, f64> {
    let (rest, sign) = opt(one_of("+-")).parse(input)?;
    let (rest, magnitude) = alt((
        value(f64::INFINITY, tag_no_case("infinity")),
        value(f64::INFINITY, tag_no_case("inf")),
        value(f64::NAN, tag_no_case("nan")),
    ))
    .parse(rest)?;
    let x = if sign == Some('-') { -magnitude } else { magnitude };
    Ok((rest, x))
}

/// Classify a single token: integer first, then float, otherwise a symbol.
pub fn parse_atom(token: &str) -> Value {
    let integer = all_consuming(nom::character::complete::i64::<&str, nom::error::Error<&str>>)
        .parse(token);
    if let Ok((_, n)) = integer {
        return Value::Int(n);
    }

    let float =
        all_consuming(nom::number::complete::double::<&str, nom::error::Error<&str>>).parse(token);
    if let Ok((_, x)) = float {
        return Value::Float(x);
    }

    if let Ok((_, x)) = all_consuming(special_float).parse(token) {
        return Value::Float(x);
    }

    Value::Symbol(token.to_owned())
}

/// Read one expression from the front of `tokens`, consuming what it uses.
pub fn read(tokens: &mut VecDeque<String>) -> Result<Value, ParseError> {
    read_with_config(tokens, &ParseConfig::default())
}

/// [`read`] with an explicit nesting limit
pub fn read_with_config(
    tokens: &mut VecDeque<String>,
    config: &ParseConfig,
) -> Result<Value, ParseError> {
    read_expr(tokens, config, 0)
}

fn read_expr(
    tokens: &mut VecDeque<String>,
    config: &ParseConfig,
    depth: usize,
) -> Result<Value, ParseError> {
    let Some(token) = tokens.pop_front() else {
        return Err(ParseError::from_message(
            ParseErrorKind::UnexpectedEof,
            "Unexpected end of input",
        ));
    };

    match token.as_str() {
        "(" => {
            if depth >= config.max_depth {
                return Err(ParseError::from_message(
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {})", config.max_depth),
                ));
            }
            let mut elements = Vec::new();
            loop {
                match tokens.front().map(String::as_str) {
                    None => {
                        return Err(ParseError::from_message(
                            ParseErrorKind::UnexpectedEof,
                            "Unexpected end of input: missing ')'",
                        ));
                    }
                    Some(")") => {
                        tokens.pop_front();
                        return Ok(Value::List(elements));
                    }
                    Some(_) => {
                        let element =
                            ensure_sufficient_stack(|| read_expr(tokens, config, depth + 1))?;
                        elements.push(element);
                    }
                }
            }
        }
        ")" => Err(ParseError::new(
            ParseErrorKind::MismatchedParens,
            "Unexpected ')' without a matching '('",
            Some(token),
        )),
        _ => Ok(parse_atom(&token)),
    }
}

/// Parse exactly one expression from source text.
pub fn parse(source: &str) -> Result<Value, Error> {
    parse_with_config(source, &ParseConfig::default())
}

/// [`parse`] with explicit reader settings
pub fn parse_with_config(source: &str, config: &ParseConfig) -> Result<Value, Error> {
    let mut tokens = VecDeque::from(tokenize(source));
    if tokens.is_empty() {
        return Err(empty_input().into());
    }

    let expr = read_with_config(&mut tokens, config)?;
    if let Some(extra) = tokens.pop_front() {
        return Err(ParseError::new(
            ParseErrorKind::TrailingContent,
            format!("Unexpected input after a complete expression ({} more tokens)", tokens.len() + 1),
            Some(extra),
        )
        .into());
    }
    Ok(expr)
}

/// Parse every top-level expression in `source`, in order.
pub fn parse_program(source: &str) -> Result<Vec<Value>, Error> {
    let config = ParseConfig::default();
    let mut tokens = VecDeque::from(tokenize(source));
    if tokens.is_empty() {
        return Err(empty_input().into());
    }

    let mut forms = Vec::new();
    while !tokens.is_empty() {
        forms.push(read_with_config(&mut tokens, &config)?);
    }
    Ok(forms)
}

fn empty_input() -> ParseError {
    ParseError::from_message(ParseErrorKind::Empty, "Empty input")
}

/// Net paren balance of a token sequence: +1 per `(`, -1 per `)`.
pub fn paren_depth<S: AsRef<str>>(tokens: &[S]) -> isize {
    tokens
        .iter()
        .map(|token| match token.as_ref() {
            "(" => 1,
            ")" => -1,
            _ => 0,
        })
        .sum()
}

/// Check that `source` is a single parenthesized form with balanced parens.
///
/// The check is a count, not a parse: it requires the text to start with `(`,
/// end with `)` and contain as many of one as the other.
pub fn are_parens_matched(source: &str) -> Result<bool, ParseError> {
    let tokens = tokenize(source);
    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        return Err(empty_input());
    };

    if first != "(" || last != ")" {
        return Err(ParseError::from_message(
            ParseErrorKind::MismatchedParens,
            "Input must be enclosed in '(' ... ')'",
        ));
    }

    match paren_depth(&tokens) {
        0 => Ok(true),
        depth => Err(ParseError::from_message(
            ParseErrorKind::MismatchedParens,
            format!("Mismatched parentheses (unbalanced by {depth})"),
        )),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym, val};
    use pretty_assertions::assert_eq;

    fn tokens_of(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_tokenize() {
        let cases: Vec<(&str, Vec<String>)> = vec![
            ("(+ 1 2)", tokens_of(&["(", "+", "1", "2", ")"])),
            ("(+(* 2 3)4)", tokens_of(&["(", "+", "(", "*", "2", "3", ")", "4", ")"])),
            ("  42  ", tokens_of(&["42"])),
            ("((", tokens_of(&["(", "("])),
            ("a\tb\nc\r\nd", tokens_of(&["a", "b", "c", "d"])),
            // Non-ASCII whitespace separates tokens too
            ("a\u{a0}b", tokens_of(&["a", "b"])),
            ("\"hello world\"", tokens_of(&["\"hello", "world\""])),
            ("", vec![]),
            ("   \n\t", vec![]),
        ];

        for (input, expected) in cases {
            assert_eq!(tokenize(input), expected, "tokenize({input:?})");
        }
    }

    #[test]
    fn test_parse_atom_precedence() {
        let cases = vec![
            ("42", val(42)),
            ("-7", val(-7)),
            ("+5", val(5)),
            ("0", val(0)),
            ("3.25", val(3.25)),
            ("3.14", val(314.0 / 100.0)),
            ("3.0e2", val(300.0)),
            ("1e3", val(1000.0)),
            (".5", val(0.5)),
            ("-2.5", val(-2.5)),
            // Too large for an integer, still a number
            ("99999999999999999999", val(1e20)),
            ("inf", val(f64::INFINITY)),
            ("-inf", val(f64::NEG_INFINITY)),
            ("+inf", val(f64::INFINITY)),
            ("-Infinity", val(f64::NEG_INFINITY)),
            ("info", sym("info")),
            ("-in", sym("-in")),
            ("n", sym("n")),
            ("+", sym("+")),
            ("-", sym("-")),
            ("<=", sym("<=")),
            ("fact", sym("fact")),
            ("1+", sym("1+")),
            ("e", sym("e")),
            ("3.0.1", sym("3.0.1")),
        ];

        for (token, expected) in cases {
            assert_eq!(parse_atom(token), expected, "parse_atom({token:?})");
        }
    }

    #[test]
    fn test_read_structure() {
        let mut tokens = VecDeque::from(tokenize("(+ 1 2)"));
        assert_eq!(read(&mut tokens).unwrap(), val(vec![sym("+"), val(1), val(2)]));
        assert!(tokens.is_empty());

        let mut tokens = VecDeque::from(tokenize("(defun add (a b) (+ a b))"));
        assert_eq!(
            read(&mut tokens).unwrap(),
            val(vec![
                sym("defun"),
                sym("add"),
                val(vec![sym("a"), sym("b")]),
                val(vec![sym("+"), sym("a"), sym("b")]),
            ])
        );

        let mut tokens = VecDeque::from(tokenize("()"));
        assert_eq!(read(&mut tokens).unwrap(), nil());
    }

    #[test]
    fn test_read_consumes_one_form() {
        let mut tokens = VecDeque::from(tokenize("(a) b"));
        assert_eq!(read(&mut tokens).unwrap(), val(vec![sym("a")]));
        assert_eq!(tokens, VecDeque::from(tokens_of(&["b"])));
    }

    #[test]
    fn test_read_errors() {
        let cases = vec![
            ("", ParseErrorKind::UnexpectedEof),
            ("(", ParseErrorKind::UnexpectedEof),
            ("(+ 1 (* 2 3)", ParseErrorKind::UnexpectedEof),
            (")", ParseErrorKind::MismatchedParens),
        ];

        for (input, kind) in cases {
            let mut tokens = VecDeque::from(tokenize(input));
            let err = read(&mut tokens).unwrap_err();
            assert_eq!(err.kind, kind, "read({input:?})");
        }
    }

    #[test]
    fn test_parse_errors() {
        let cases = vec![
            ("", ParseErrorKind::Empty),
            ("   ", ParseErrorKind::Empty),
            ("(+ 1 2", ParseErrorKind::UnexpectedEof),
            (")", ParseErrorKind::MismatchedParens),
            ("(+ 1 2))", ParseErrorKind::TrailingContent),
            ("(+ 1 2) (+ 3 4)", ParseErrorKind::TrailingContent),
            ("1 2", ParseErrorKind::TrailingContent),
        ];

        for (input, kind) in cases {
            match parse(input) {
                Err(Error::SyntaxError(err)) => assert_eq!(err.kind, kind, "parse({input:?})"),
                other => panic!("parse({input:?}): expected syntax error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_depth_limit() {
        let config = ParseConfig { max_depth: 3 };
        assert!(parse_with_config("(((x)))", &config).is_ok());
        match parse_with_config("((((x))))", &config) {
            Err(Error::SyntaxError(err)) => assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested),
            other => panic!("expected TooDeeplyNested, got {other:?}"),
        }

        // The default limit accepts realistic nesting
        let deep = format!("{}x{}", "(".repeat(200), ")".repeat(200));
        assert!(parse(&deep).is_ok());
    }

    #[test]
    fn test_parse_program() {
        let forms = parse_program("(defun sq (x) (* x x))\n(sq 4)\n7").unwrap();
        assert_eq!(forms.len(), 3);
        assert_eq!(forms[1], val(vec![sym("sq"), val(4)]));
        assert_eq!(forms[2], val(7));

        assert!(matches!(
            parse_program("(sq 4) (sq"),
            Err(Error::SyntaxError(ParseError {
                kind: ParseErrorKind::UnexpectedEof,
                ..
            }))
        ));
        assert!(parse_program("").is_err());
    }

    #[test]
    fn test_are_parens_matched() {
        assert_eq!(are_parens_matched("(+ 1 2)"), Ok(true));
        assert_eq!(are_parens_matched("(fact (- n 1))"), Ok(true));

        let failures = vec![
            ("(+ 1 2", ParseErrorKind::MismatchedParens),
            ("(+ 1 2))", ParseErrorKind::MismatchedParens),
            ("+ 1 2", ParseErrorKind::MismatchedParens),
            ("(+ 1 2) 3", ParseErrorKind::MismatchedParens),
            ("", ParseErrorKind::Empty),
            ("  ", ParseErrorKind::Empty),
        ];
        for (input, kind) in failures {
            let err = are_parens_matched(input).unwrap_err();
            assert_eq!(err.kind, kind, "are_parens_matched({input:?})");
        }
    }

    #[test]
    fn test_paren_depth() {
        assert_eq!(paren_depth(&tokenize("(defun f (x)")), 1);
        assert_eq!(paren_depth(&tokenize("(a (b))")), 0);
        assert_eq!(paren_depth(&tokenize("a))")), -2);
        assert_eq!(paren_depth::<String>(&[]), 0);
    }
}
