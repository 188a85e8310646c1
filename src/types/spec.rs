use serde::{Deserialize, Serialize};

use super::context::SubjectId;
use super::rule::{Owner, RuleKind, RuleValue};

/// The plain persisted shape of a rule.
///
/// This is what [`RuleStore::add()`](crate::RuleStore::add) accepts and what
/// [`RuleStore::to_json()`](crate::RuleStore::to_json) writes out. The pattern
/// is kept in its comma-separated source form.
///
/// # Example
///
/// ```
/// use formfill::{Owner, RuleKind, RuleSpec};
///
/// let spec = RuleSpec::new(RuleKind::Substring, "phone, telefon", "${contact.phone}$")
///     .owner(Owner::Case)
///     .scope(["intake"]);
/// assert_eq!(spec.kind, RuleKind::Substring);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub kind: RuleKind,
    pub pattern: String,
    #[serde(default)]
    pub value: RuleValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<usize>,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectId>,
}

impl RuleSpec {
    #[must_use]
    pub fn new(kind: RuleKind, pattern: impl Into<String>, value: impl Into<RuleValue>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
            value: value.into(),
            scope: None,
            threshold: None,
            owner: Owner::default(),
            subject: None,
        }
    }

    /// Shorthand for an [`RuleKind::Equal`] rule.
    #[must_use]
    pub fn equal(pattern: impl Into<String>, value: impl Into<RuleValue>) -> Self {
        Self::new(RuleKind::Equal, pattern, value)
    }

    #[must_use]
    pub fn owner(mut self, owner: impl Into<Owner>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Restrict the rule to documents whose name contains any of `scope`.
    #[must_use]
    pub fn scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = Some(scope.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<SubjectId>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_uses_defaults() {
        let spec: RuleSpec =
            serde_json::from_str(r#"{"kind": "equal", "pattern": "a", "value": "1"}"#).unwrap();
        assert_eq!(spec, RuleSpec::equal("a", "1"));
        assert_eq!(spec.owner, Owner::default());
    }

    #[test]
    fn full_record_parses() {
        let spec: RuleSpec = serde_json::from_str(
            r#"{
                "kind": "similar",
                "pattern": "surname, last name",
                "value": {"computed": "today"},
                "scope": ["123"],
                "threshold": 2,
                "owner": "person",
                "subject": "alice"
            }"#,
        )
        .unwrap();
        assert_eq!(spec.kind, RuleKind::Similar);
        assert_eq!(spec.value, RuleValue::computed("today"));
        assert_eq!(spec.scope.as_deref(), Some(&["123".to_owned()][..]));
        assert_eq!(spec.threshold, Some(2));
        assert_eq!(spec.owner, Owner::Person);
        assert_eq!(spec.subject, Some(SubjectId::from("alice")));
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let json = serde_json::to_string(&RuleSpec::equal("a", "1")).unwrap();
        assert!(!json.contains("scope"));
        assert!(!json.contains("threshold"));
        assert!(!json.contains("subject"));
    }
}
