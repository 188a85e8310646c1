use std::fmt;

/// Errors produced when an S-expression cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    expression: String,
    message: String,
}

impl ParseError {
    pub(crate) fn new(expression: &str, message: impl Into<String>) -> Self {
        Self {
            expression: expression.to_owned(),
            message: message.into(),
        }
    }

    /// The expression text that failed to parse.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error in `{}`: {}", self.expression, self.message)
    }
}

impl std::error::Error for ParseError {}
