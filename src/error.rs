use thiserror::Error;

use crate::dsl::ParseError;
use crate::StoreError;

/// Unified error type covering rule loading, expression parsing, and I/O.
///
/// Returned by convenience methods like
/// [`RuleStore::from_json()`](crate::RuleStore::from_json) and
/// [`RuleStore::from_file()`](crate::RuleStore::from_file). Resolution
/// itself never fails; it degrades to an unresolved result.
#[derive(Debug, Error)]
pub enum FormfillError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid rule file: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Serialize(#[from] crate::serial::SerializeError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Deserialize(#[from] crate::serial::DeserializeError),
}
