//! Text assembly for the `format` form.
//!
//! Tokens are rendered, stripped of `"` and joined with single spaces. A fill
//! value then replaces the placeholders: [`NEWLINE_PLACEHOLDER`] first, so its
//! trailing `~%` becomes a line break, then any bare [`INLINE_PLACEHOLDER`].

use std::fmt::Display;

use crate::ast::Value;

/// Replaced by the fill value followed by a newline
pub const NEWLINE_PLACEHOLDER: &str = "~D~%";

/// Replaced by the fill value
pub const INLINE_PLACEHOLDER: &str = "~D";

/// Join `tokens` into the template text and substitute `fill` if given.
pub fn render<T: Display>(tokens: &[T], fill: Option<&Value>) -> String {
    let text = tokens
        .iter()
        .map(|token| token.to_string().replace('"', ""))
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    match fill {
        Some(value) => {
            let fill = value.to_string();
            text.replace(NEWLINE_PLACEHOLDER, &format!("{fill}\n"))
                .replace(INLINE_PLACEHOLDER, &fill)
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{sym, val};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render() {
        let cases: Vec<(Vec<Value>, Option<Value>, &str)> = vec![
            (
                vec![sym("\"fact"), sym("of"), sym("5"), sym("is"), sym("~D~%\"")],
                Some(val(120)),
                "fact of 5 is 120\n",
            ),
            (vec![sym("\"x=~D\"")], Some(val(2.5)), "x=2.5"),
            (vec![sym("\"~D"), sym("and"), sym("~D\"")], Some(val(1)), "1 and 1"),
            (vec![sym("\"hello"), sym("world\"")], None, "hello world"),
            // Placeholders stay put without a fill value
            (vec![sym("\"~D~%\"")], None, "~D~%"),
            // Tokens that were only quotes disappear
            (vec![sym("\""), sym("a"), sym("\"\"")], None, "a"),
            (vec![val(42), sym("~D")], Some(val(true)), "42 true"),
            (vec![], Some(val(1)), ""),
        ];

        for (tokens, fill, expected) in cases {
            assert_eq!(render(&tokens, fill.as_ref()), expected, "render({tokens:?})");
        }
    }

    #[test]
    fn test_render_plain_strings() {
        let tokens = ["\"done:", "~D\""];
        assert_eq!(render(&tokens, Some(&val("ok"))), "done: ok");
    }
}
