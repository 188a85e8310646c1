use std::fmt;

use regex::Regex;
use tracing::{debug, warn};

use super::sexpr::{Operator, SExpr};
use crate::date;
use crate::{RuleKind, RuleStore};

/// A defined evaluation result. "Undefined" is represented by `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluated {
    Text(String),
    True,
}

impl Evaluated {
    /// Text form; `True` becomes `"true"`.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Evaluated::Text(text) => text,
            Evaluated::True => "true".to_owned(),
        }
    }

    /// Anything but empty text.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Evaluated::Text(text) if text.is_empty())
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Evaluated::Text(text) => Some(text),
            Evaluated::True => None,
        }
    }
}

impl fmt::Display for Evaluated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluated::Text(text) => f.write_str(text),
            Evaluated::True => f.write_str("true"),
        }
    }
}

/// Whether an evaluation result counts as success. Undefined and empty
/// text both fail.
#[must_use]
pub fn truthy(value: Option<&Evaluated>) -> bool {
    value.is_some_and(Evaluated::is_truthy)
}

/// Evaluates parsed expressions against one subject key.
///
/// Predicate operators test the subject: `(equal P R)` yields `R` when the
/// subject equals `P`, `true` when `R` is omitted, and undefined otherwise.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    subject: &'a str,
    store: Option<&'a RuleStore>,
}

impl<'a> Evaluator<'a> {
    #[must_use]
    pub fn new(subject: &'a str, store: Option<&'a RuleStore>) -> Self {
        Self { subject, store }
    }

    #[must_use]
    pub fn eval(&self, expr: &SExpr) -> Option<Evaluated> {
        match expr {
            SExpr::Atom(text) => Some(Evaluated::Text(text.clone())),
            SExpr::List(items) => {
                let (head, args) = items.split_first()?;
                let Some(name) = head.as_atom() else {
                    warn!(expression = %expr, "operator position holds a list");
                    return None;
                };
                let Some(op) = Operator::from_name(name) else {
                    warn!(operator = name, "unknown operator");
                    return None;
                };
                self.apply(op, args)
            }
        }
    }

    fn text(&self, expr: &SExpr) -> Option<String> {
        self.eval(expr).map(Evaluated::into_text)
    }

    fn arg(&self, op: Operator, args: &[SExpr], index: usize) -> Option<String> {
        match args.get(index) {
            Some(expr) => self.text(expr),
            None => {
                warn!(operator = %op, expected = index + 1, given = args.len(), "missing operand");
                None
            }
        }
    }

    /// The value of a successful predicate: its result operand, or `true`.
    fn outcome(&self, result: Option<&SExpr>) -> Option<Evaluated> {
        match result {
            Some(expr) => self.eval(expr),
            None => Some(Evaluated::True),
        }
    }

    fn apply(&self, op: Operator, args: &[SExpr]) -> Option<Evaluated> {
        match op {
            Operator::Equal | Operator::Substring | Operator::Superstring => {
                let pattern = self.arg(op, args, 0)?;
                let hit = match op {
                    Operator::Equal => self.subject == pattern,
                    Operator::Substring => self.subject.contains(pattern.as_str()),
                    _ => pattern.contains(self.subject),
                };
                if hit {
                    self.outcome(args.get(1))
                } else {
                    None
                }
            }
            Operator::Similar => {
                let pattern = self.arg(op, args, 0)?;
                let raw = self.arg(op, args, 1)?;
                let Ok(threshold) = raw.trim().parse::<usize>() else {
                    warn!(threshold = %raw, "similar threshold is not a number");
                    return None;
                };
                if strsim::levenshtein(&pattern, self.subject) < threshold {
                    self.outcome(args.get(2))
                } else {
                    None
                }
            }
            Operator::Regex => {
                let pattern = self.arg(op, args, 0)?;
                let re = compile(&pattern)?;
                if re.is_match(self.subject) {
                    self.outcome(args.get(1))
                } else {
                    None
                }
            }
            Operator::Or => args
                .iter()
                .map(|arg| self.eval(arg))
                .find(|value| truthy(value.as_ref()))
                .flatten(),
            Operator::And => {
                let mut last = Evaluated::True;
                for arg in args {
                    last = self.eval(arg).filter(Evaluated::is_truthy)?;
                }
                Some(last)
            }
            Operator::Not => {
                if args.len() != 1 {
                    warn!(given = args.len(), "not takes exactly one operand");
                    return None;
                }
                if truthy(self.eval(&args[0]).as_ref()) {
                    None
                } else {
                    Some(Evaluated::True)
                }
            }
            Operator::ReformatDate => {
                let input = self.arg(op, args, 0)?;
                match date::reformat_date(&input) {
                    Some(text) => Some(Evaluated::Text(text)),
                    None => {
                        warn!(date = %input, "unrecognised date format; left unchanged");
                        Some(Evaluated::Text(input))
                    }
                }
            }
            Operator::Transform => {
                let pattern = self.arg(op, args, 0)?;
                let replacement = self.arg(op, args, 1)?;
                let subject = self.arg(op, args, 2)?;
                let re = compile(&pattern)?;
                let replaced = re.replace_all(&subject, expand_backrefs(&replacement).as_str());
                Some(Evaluated::Text(replaced.into_owned()))
            }
            Operator::FindRule => {
                let kind_name = self.arg(op, args, 0)?;
                let pattern = self.arg(op, args, 1)?;
                let Some(kind) = RuleKind::from_name(&kind_name) else {
                    warn!(kind = %kind_name, "findrule: unknown rule kind");
                    return None;
                };
                let Some(store) = self.store else {
                    debug!("findrule evaluated without a rule store");
                    return None;
                };
                let rule = store.find_rule(kind, &pattern)?;
                rule.value()
                    .as_literal()
                    .map(|text| Evaluated::Text(text.to_owned()))
            }
        }
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(pattern, %err, "invalid regex; treated as non-match");
            None
        }
    }
}

/// Rewrite `$1`-style back-references as `${1}` so that a digit run is never
/// read as part of a longer group name. `$&` means the whole match.
fn expand_backrefs(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len() + 4);
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                out.push_str("${");
                out.push_str(&digits);
                out.push('}');
            }
            _ => out.push_str("$$"),
        }
    }
    out
}
