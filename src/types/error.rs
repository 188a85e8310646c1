use thiserror::Error;

use super::rule::RuleId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("rule duplicates existing rule {existing}")]
    DuplicateRule { existing: RuleId },

    #[error("unknown rule {id}")]
    UnknownRule { id: RuleId },

    #[error("rule pattern has no alternatives")]
    EmptyPattern,
}
