use std::fmt;

use serde::{Deserialize, Serialize};

/// Default bound on nested expansion levels per resolution call.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Identity of the entity (a person, a case) that subject-scoped rules are
/// private to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        SubjectId(id.to_owned())
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        SubjectId(id)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-call resolution context.
///
/// Carries the active subject (at most one), the name of the document being
/// filled, the key of the field being filled, and the depth bound. Passed by
/// reference into every [`Engine`](crate::Engine) call; nothing about it is
/// global.
///
/// ```
/// use formfill::Context;
///
/// let ctx = Context::new()
///     .subject("alice")
///     .document("tax-form-2024")
///     .field("f.name")
///     .max_depth(20);
/// assert_eq!(ctx.document_name(), Some("tax-form-2024"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    subject: Option<SubjectId>,
    document: Option<String>,
    field: Option<String>,
    max_depth: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            subject: None,
            document: None,
            field: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for filling field `key` of `document`.
    #[must_use]
    pub fn for_field(key: impl Into<String>, document: impl Into<String>) -> Self {
        Self::new().field(key).document(document)
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<SubjectId>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    /// Key of the field being filled. Expression entries inside
    /// containers are evaluated against it, or against `""` when unset.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>) -> Self {
        self.field = Some(key.into());
        self
    }

    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn active_subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    #[must_use]
    pub fn document_name(&self) -> Option<&str> {
        self.document.as_deref()
    }

    #[must_use]
    pub fn field_key(&self) -> Option<&str> {
        self.field.as_deref()
    }

    #[must_use]
    pub fn depth_limit(&self) -> usize {
        self.max_depth
    }
}
