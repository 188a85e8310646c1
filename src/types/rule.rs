use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::context::SubjectId;
use super::spec::RuleSpec;
use crate::template;

/// Default maximum edit distance for [`RuleKind::Similar`] rules.
pub const DEFAULT_SIMILAR_THRESHOLD: usize = 5;

/// Stable rule identifier.
///
/// Ordinary rules and template rules draw from two independent counters.
/// Identifiers are never reused within one [`RuleStore`](crate::RuleStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleId {
    Ordinary(u64),
    Template(u64),
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleId::Ordinary(n) => write!(f, "r{n}"),
            RuleId::Template(n) => write!(f, "t{n}"),
        }
    }
}

/// How a rule's pattern alternatives are matched against a variable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Equal,
    Substring,
    Superstring,
    Similar,
    Regex,
    Formula,
    Date,
    Switch,
}

impl RuleKind {
    pub const ALL: [RuleKind; 8] = [
        RuleKind::Equal,
        RuleKind::Substring,
        RuleKind::Superstring,
        RuleKind::Similar,
        RuleKind::Regex,
        RuleKind::Formula,
        RuleKind::Date,
        RuleKind::Switch,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::Equal => "equal",
            RuleKind::Substring => "substring",
            RuleKind::Superstring => "superstring",
            RuleKind::Similar => "similar",
            RuleKind::Regex => "regex",
            RuleKind::Formula => "formula",
            RuleKind::Date => "date",
            RuleKind::Switch => "switch",
        }
    }

    /// Look up a kind by its name, case-insensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<RuleKind> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner tag partitioning rules into priority groups.
///
/// Serialized as a plain string; any unrecognised tag is a profile name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Owner {
    /// Transient per-document data. Sorts before every other rule.
    Case,
    /// Scoped to one subject.
    Person,
    /// Per-subject boilerplate. Draws ids from the template counter.
    Template,
    /// Pre-empts every other rule for the subject it belongs to.
    Header,
    /// A general rule belonging to a named profile.
    Profile(String),
}

impl Owner {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Owner::Case => "case",
            Owner::Person => "person",
            Owner::Template => "template",
            Owner::Header => "header",
            Owner::Profile(name) => name,
        }
    }
}

impl Default for Owner {
    fn default() -> Self {
        Owner::Profile("default".to_owned())
    }
}

impl From<String> for Owner {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "case" => Owner::Case,
            "person" => Owner::Person,
            "template" => Owner::Template,
            "header" => Owner::Header,
            _ => Owner::Profile(tag),
        }
    }
}

impl From<&str> for Owner {
    fn from(tag: &str) -> Self {
        Owner::from(tag.to_owned())
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        match owner {
            Owner::Profile(name) => name,
            other => other.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The right-hand side of a rule.
///
/// A literal is a template string that may itself contain placeholders.
/// A computed value names a provider registered in the
/// [`Environment`](crate::Environment) and is serialized as
/// `{"computed": "<name>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Literal(String),
    Computed { computed: String },
}

impl RuleValue {
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        RuleValue::Literal(text.into())
    }

    #[must_use]
    pub fn computed(provider: impl Into<String>) -> Self {
        RuleValue::Computed {
            computed: provider.into(),
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            RuleValue::Literal(text) => Some(text),
            RuleValue::Computed { .. } => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, RuleValue::Literal(text) if text.is_empty())
    }
}

impl Default for RuleValue {
    fn default() -> Self {
        RuleValue::Literal(String::new())
    }
}

impl From<&str> for RuleValue {
    fn from(text: &str) -> Self {
        RuleValue::Literal(text.to_owned())
    }
}

impl From<String> for RuleValue {
    fn from(text: String) -> Self {
        RuleValue::Literal(text)
    }
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::Literal(text) => f.write_str(text),
            RuleValue::Computed { computed } => write!(f, "<{computed}>"),
        }
    }
}

/// Ordered set of alternative left-hand strings.
///
/// Parsed from comma-separated source form. Commas inside parentheses or
/// quotes do not split, so formula alternatives may contain them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Pattern {
    alternatives: Vec<String>,
}

impl Pattern {
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut alternatives: Vec<String> = Vec::new();
        for alt in template::split_entries(source) {
            if !alternatives.iter().any(|a| a == alt) {
                alternatives.push(alt.to_owned());
            }
        }
        Self { alternatives }
    }

    #[must_use]
    pub fn alternatives(&self) -> &[String] {
        &self.alternatives
    }

    #[must_use]
    pub fn contains(&self, alternative: &str) -> bool {
        self.alternatives.iter().any(|a| a == alternative)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alternatives.join(", "))
    }
}

/// A pattern -> value substitution rule registered in a
/// [`RuleStore`](crate::RuleStore).
///
/// The id is immutable; the pattern and value may be changed through the
/// store, which keeps its indices consistent.
#[derive(Debug, Clone)]
pub struct Rule {
    id: RuleId,
    kind: RuleKind,
    pattern: Pattern,
    value: RuleValue,
    scope: Option<Vec<String>>,
    threshold: Option<usize>,
    owner: Owner,
    subject: Option<SubjectId>,
    /// One compiled regex per alternative, `None` where compilation failed.
    regexes: Vec<Option<Regex>>,
}

impl Rule {
    pub(crate) fn from_spec(id: RuleId, spec: RuleSpec) -> Self {
        let threshold = match (spec.kind, spec.threshold) {
            (RuleKind::Similar, t) => t,
            (kind, Some(t)) => {
                warn!(%kind, threshold = t, "threshold only applies to similar rules; ignored");
                None
            }
            (_, None) => None,
        };
        let mut rule = Self {
            id,
            kind: spec.kind,
            pattern: Pattern::parse(&spec.pattern),
            value: RuleValue::default(),
            scope: spec.scope.filter(|s| !s.is_empty()),
            threshold,
            owner: spec.owner,
            subject: spec.subject,
            regexes: Vec::new(),
        };
        rule.replace_value(spec.value);
        rule.compile_regexes();
        rule
    }

    #[must_use]
    pub fn id(&self) -> RuleId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    #[must_use]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    #[must_use]
    pub fn value(&self) -> &RuleValue {
        &self.value
    }

    #[must_use]
    pub fn scope(&self) -> Option<&[String]> {
        self.scope.as_deref()
    }

    /// Effective edit-distance threshold; only meaningful for similar rules.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold.unwrap_or(DEFAULT_SIMILAR_THRESHOLD)
    }

    #[must_use]
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    #[must_use]
    pub fn subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    #[must_use]
    pub fn is_case(&self) -> bool {
        self.owner == Owner::Case
    }

    pub(crate) fn regex_at(&self, alternative: usize) -> Option<&Regex> {
        self.regexes.get(alternative).and_then(Option::as_ref)
    }

    pub(crate) fn replace_pattern(&mut self, source: &str) {
        self.pattern = Pattern::parse(source);
        self.compile_regexes();
    }

    pub(crate) fn replace_value(&mut self, value: RuleValue) {
        if let RuleValue::Literal(text) = &value {
            if !text.is_empty() && !template::is_balanced(text) {
                warn!(rule = %self.id, value = %text, "unbalanced placeholder delimiters in rule value");
            }
        }
        self.value = value;
    }

    fn compile_regexes(&mut self) {
        self.regexes = if self.kind == RuleKind::Regex {
            self.pattern
                .alternatives()
                .iter()
                .map(|alt| match Regex::new(alt) {
                    Ok(re) => Some(re),
                    Err(err) => {
                        warn!(rule = %self.id, pattern = %alt, %err, "invalid regex pattern; alternative never matches");
                        None
                    }
                })
                .collect()
        } else {
            Vec::new()
        };
    }

    /// Two rules are structurally equal when everything but their id matches.
    #[must_use]
    pub fn structurally_eq(&self, other: &Rule) -> bool {
        self.kind == other.kind
            && self.pattern == other.pattern
            && self.value == other.value
            && self.scope == other.scope
            && self.threshold == other.threshold
            && self.owner == other.owner
            && self.subject == other.subject
    }

    /// The persisted record for this rule.
    #[must_use]
    pub fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            kind: self.kind,
            pattern: self.pattern.to_string(),
            value: self.value.clone(),
            scope: self.scope.clone(),
            threshold: self.threshold,
            owner: self.owner.clone(),
            subject: self.subject.clone(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] -> {} ({})",
            self.id, self.kind, self.pattern, self.value, self.owner
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(spec: RuleSpec) -> Rule {
        Rule::from_spec(RuleId::Ordinary(1), spec)
    }

    #[test]
    fn pattern_splits_and_dedups() {
        let p = Pattern::parse("a, b ,a,, c");
        assert_eq!(p.alternatives(), &["a", "b", "c"]);
        assert_eq!(p.to_string(), "a, b, c");
    }

    #[test]
    fn pattern_keeps_commas_inside_parens() {
        let p = Pattern::parse("(or (equal x 1) (equal y 2)), plain");
        assert_eq!(p.alternatives().len(), 2);
        assert_eq!(p.alternatives()[1], "plain");
    }

    #[test]
    fn owner_round_trips_through_string() {
        for tag in ["case", "person", "template", "header", "work"] {
            let owner = Owner::from(tag);
            assert_eq!(String::from(owner), tag);
        }
        assert_eq!(Owner::from("work"), Owner::Profile("work".into()));
    }

    #[test]
    fn kind_from_name_is_case_insensitive() {
        assert_eq!(RuleKind::from_name("Regex"), Some(RuleKind::Regex));
        assert_eq!(RuleKind::from_name("bogus"), None);
    }

    #[test]
    fn rule_id_display() {
        assert_eq!(RuleId::Ordinary(3).to_string(), "r3");
        assert_eq!(RuleId::Template(7).to_string(), "t7");
    }

    #[test]
    fn threshold_defaults_for_similar() {
        let r = rule(RuleSpec::new(RuleKind::Similar, "name", "x"));
        assert_eq!(r.threshold(), DEFAULT_SIMILAR_THRESHOLD);
        let r = rule(RuleSpec::new(RuleKind::Similar, "name", "x").threshold(2));
        assert_eq!(r.threshold(), 2);
    }

    #[test]
    fn threshold_ignored_for_other_kinds() {
        let r = rule(RuleSpec::new(RuleKind::Equal, "name", "x").threshold(2));
        assert_eq!(r.to_spec().threshold, None);
    }

    #[test]
    fn invalid_regex_alternative_compiles_to_none() {
        let r = rule(RuleSpec::new(RuleKind::Regex, "^ok$, [broken", "x"));
        assert!(r.regex_at(0).is_some());
        assert!(r.regex_at(1).is_none());
    }

    #[test]
    fn unbalanced_value_still_constructs() {
        let r = rule(RuleSpec::equal("a", "${b"));
        assert_eq!(r.value().as_literal(), Some("${b"));
    }

    #[test]
    fn structural_equality_ignores_id() {
        let a = Rule::from_spec(RuleId::Ordinary(1), RuleSpec::equal("a, b", "1"));
        let b = Rule::from_spec(RuleId::Ordinary(2), RuleSpec::equal("a,b", "1"));
        assert!(a.structurally_eq(&b));
        let c = Rule::from_spec(RuleId::Ordinary(3), RuleSpec::equal("a,b", "2"));
        assert!(!a.structurally_eq(&c));
    }

    #[test]
    fn computed_value_serializes_as_object() {
        let json = serde_json::to_string(&RuleValue::computed("today")).unwrap();
        assert_eq!(json, r#"{"computed":"today"}"#);
        let back: RuleValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RuleValue::computed("today"));
        let lit: RuleValue = serde_json::from_str(r#""${a}$""#).unwrap();
        assert_eq!(lit, RuleValue::literal("${a}$"));
    }
}
