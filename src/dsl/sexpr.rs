use std::fmt;

/// Parsed S-expression. Quoted atoms are stored without their quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

impl SExpr {
    #[must_use]
    pub fn atom(text: impl Into<String>) -> Self {
        SExpr::Atom(text.into())
    }

    #[must_use]
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(text) => Some(text),
            SExpr::List(_) => None,
        }
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Atom(text) if text.is_empty() || text.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') => {
                write!(f, "\"{text}\"")
            }
            SExpr::Atom(text) => f.write_str(text),
            SExpr::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Operators understood by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    Substring,
    Superstring,
    Similar,
    Regex,
    Or,
    And,
    Not,
    ReformatDate,
    Transform,
    FindRule,
}

impl Operator {
    /// Resolve an operator name. English and German spellings are accepted,
    /// case-insensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Operator> {
        let op = match name.to_lowercase().as_str() {
            "equal" | "gleich" => Operator::Equal,
            "substring" | "teilstring" => Operator::Substring,
            "superstring" | "oberstring" => Operator::Superstring,
            "similar" | "ähnlich" | "aehnlich" => Operator::Similar,
            "regex" | "regulär" | "regulaer" => Operator::Regex,
            "or" | "oder" => Operator::Or,
            "and" | "und" => Operator::And,
            "not" | "nicht" => Operator::Not,
            "re-format-date" | "datum-umformatieren" => Operator::ReformatDate,
            "transform" | "umwandeln" => Operator::Transform,
            "findrule" | "finde-regel" => Operator::FindRule,
            _ => return None,
        };
        Some(op)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Operator::Equal => "equal",
            Operator::Substring => "substring",
            Operator::Superstring => "superstring",
            Operator::Similar => "similar",
            Operator::Regex => "regex",
            Operator::Or => "or",
            Operator::And => "and",
            Operator::Not => "not",
            Operator::ReformatDate => "re-format-date",
            Operator::Transform => "transform",
            Operator::FindRule => "findrule",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
