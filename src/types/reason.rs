use std::fmt;

use super::rule::RuleId;

/// Explanation of a resolution, returned by
/// [`Engine::explain()`](crate::Engine::explain).
///
/// Holds the resolved string and the ordered chain of rules applied on the
/// way from the source to the result. Steps taken by DSL expressions or
/// environment defaults contribute no rule to the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Reason {
    result: String,
    rule_chain: Vec<RuleId>,
}

impl Reason {
    pub(crate) fn new(result: String, rule_chain: Vec<RuleId>) -> Self {
        Self { result, rule_chain }
    }

    #[must_use]
    pub fn result(&self) -> &str {
        &self.result
    }

    #[must_use]
    pub fn rule_chain(&self) -> &[RuleId] {
        &self.rule_chain
    }

    #[must_use]
    pub fn into_result(self) -> String {
        self.result
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain: Vec<String> = self.rule_chain.iter().map(ToString::to_string).collect();
        write!(f, "result: {:?}, rules: [{}]", self.result, chain.join(" -> "))
    }
}
