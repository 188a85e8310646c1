mod context;
mod environment;
mod error;
mod reason;
mod rule;
mod spec;

pub use context::{Context, SubjectId, DEFAULT_MAX_DEPTH};
pub use environment::{DefaultValue, Environment, Provider};
pub use error::StoreError;
pub use reason::Reason;
pub use rule::{Owner, Pattern, Rule, RuleId, RuleKind, RuleValue, DEFAULT_SIMILAR_THRESHOLD};
pub use spec::RuleSpec;
