//! Rule-driven placeholder resolution for form filling.
//!
//! A [`RuleStore`] holds substitution rules; an [`Engine`] expands strings
//! containing `${name}$` placeholders against it, trying alternative rules
//! in priority order and backtracking past dead ends.
//!
//! ```
//! use formfill::{Context, Engine, Owner, RuleSpec, RuleStore};
//!
//! let mut store = RuleStore::new();
//! store.add(RuleSpec::equal("greeting", "Dear ${name}$")).unwrap();
//! store.add(RuleSpec::equal("name", "Ms. Smith")).unwrap();
//! store.add(RuleSpec::equal("name", "Dr. Smith").owner(Owner::Case)).unwrap();
//!
//! let engine = Engine::new(&store);
//! let ctx = Context::new().document("letter-2024");
//! assert_eq!(
//!     engine.resolve_first(&ctx, "${greeting}$").as_deref(),
//!     Some("Dear Dr. Smith")
//! );
//! ```

#[macro_use]
mod macros;

pub mod date;
pub mod dsl;
mod error;
mod matcher;
mod resolve;
#[cfg(feature = "binary-cache")]
pub mod serial;
mod store;
pub mod template;
mod types;

pub use error::FormfillError;
pub use resolve::{Engine, EngineBuilder};
#[cfg(feature = "binary-cache")]
pub use serial::{DeserializeError, SerializeError};
pub use store::RuleStore;
pub use types::{
    Context, DefaultValue, Environment, Owner, Pattern, Provider, Reason, Rule, RuleId, RuleKind,
    RuleSpec, RuleValue, StoreError, SubjectId, DEFAULT_MAX_DEPTH, DEFAULT_SIMILAR_THRESHOLD,
};
