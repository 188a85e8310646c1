//! The S-expression language used inside placeholder bodies and by
//! `formula` rules.
//!
//! ```text
//! expr := atom | '(' operator expr* ')'
//! atom := bare-word | "double quoted" | 'single quoted'
//! ```
//!
//! Evaluation is relative to a *subject key* (usually the variable or field
//! being resolved) and produces text, `true`, or nothing ("undefined").

mod error;
mod eval;
mod grammar;
mod sexpr;

use tracing::warn;

pub use error::ParseError;
pub use eval::{truthy, Evaluated, Evaluator};
pub use sexpr::{Operator, SExpr};

use crate::RuleStore;

/// Deepest parenthesis nesting accepted by [`parse`].
pub const MAX_NESTING: usize = 256;

/// Parse an expression.
///
/// A missing closing parenthesis at the end of the input is repaired with a
/// logged warning; any other syntax problem is an error.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a single well-formed
/// expression or nests deeper than [`MAX_NESTING`].
pub fn parse(input: &str) -> Result<SExpr, ParseError> {
    use winnow::Parser;

    let Nesting { missing, deepest } = nesting(input);
    if deepest > MAX_NESTING {
        return Err(ParseError::new(
            input,
            format!("nesting depth {deepest} exceeds {MAX_NESTING}"),
        ));
    }
    let repaired;
    let source = if missing > 0 {
        warn!(expression = input, missing, "unclosed parenthesis in expression; closing at end");
        repaired = format!("{input}{}", ")".repeat(missing));
        repaired.as_str()
    } else {
        input
    };
    grammar::parse_expression
        .parse(source)
        .map_err(|e| ParseError::new(input, e.to_string()))
}

/// Parse and evaluate `expression` against `subject`.
///
/// `store` backs the `findrule` operator; without one, `findrule` is
/// undefined. Parse failures are logged and yield `None`.
#[must_use]
pub fn evaluate(subject: &str, expression: &str, store: Option<&RuleStore>) -> Option<Evaluated> {
    match parse(expression) {
        Ok(expr) => Evaluator::new(subject, store).eval(&expr),
        Err(err) => {
            warn!(%err, "expression not evaluated");
            None
        }
    }
}

struct Nesting {
    /// Parentheses still open at the end of the input.
    missing: usize,
    deepest: usize,
}

fn nesting(input: &str) -> Nesting {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            (None, ')') => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Nesting {
        missing: depth,
        deepest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_close_paren_is_repaired() {
        let expr = parse("(or (equal a b)").unwrap();
        assert!(matches!(expr, SExpr::List(items) if items.len() == 2));
    }

    #[test]
    fn parens_in_quotes_do_not_count() {
        assert_eq!(nesting(r#"(equal "(" x)"#).missing, 0);
        assert_eq!(nesting("((a").missing, 2);
        assert_eq!(nesting("(a (b) (c (d)))").deepest, 3);
    }

    #[test]
    fn nesting_limit_is_an_error() {
        let deep = format!("{}x{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        let err = parse(&deep).unwrap_err();
        assert!(err.to_string().contains("nesting depth"));
        assert_eq!(evaluate("k", &"(".repeat(20_000), None), None);

        let at_limit = format!("{}(equal k){}", "(or ".repeat(MAX_NESTING - 1), ")".repeat(MAX_NESTING - 1));
        assert!(parse(&at_limit).is_ok());
    }

    #[test]
    fn extra_close_paren_is_an_error() {
        let err = parse("(equal a b))").unwrap_err();
        assert_eq!(err.expression(), "(equal a b))");
    }

    #[test]
    fn evaluate_or_of_equals() {
        let result = evaluate("field", "(or (equal field value1)(equal other value2))", None);
        assert_eq!(result, Some(Evaluated::Text("value1".into())));
    }

    #[test]
    fn evaluate_malformed_is_undefined() {
        assert_eq!(evaluate("x", "(equal a b))", None), None);
    }
}
