use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Local;
use tracing::warn;

use super::context::Context;

/// A named source of dynamic values, e.g. today's date.
pub type Provider = Arc<dyn Fn(&Context) -> String + Send + Sync>;

/// Last-resort value for a variable, offered after every rule tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    Static(String),
    /// Name of a registered provider.
    Computed(String),
}

/// Registry of computed-value providers and environment-level defaults.
///
/// [`RuleValue::Computed`](crate::RuleValue::Computed) values and
/// [`DefaultValue::Computed`] defaults refer to providers by name, so rule
/// sets stay plain data.
#[derive(Clone)]
pub struct Environment {
    providers: HashMap<String, Provider>,
    defaults: HashMap<String, DefaultValue>,
}

impl Environment {
    /// An environment with the built-in providers `today`, `year` and `now`.
    #[must_use]
    pub fn new() -> Self {
        let mut env = Self::empty();
        env.register("today", |_: &Context| Local::now().format("%d.%m.%Y").to_string());
        env.register("year", |_: &Context| Local::now().format("%Y").to_string());
        env.register("now", |_: &Context| Local::now().format("%H:%M").to_string());
        env
    }

    /// An environment with no providers and no defaults.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            defaults: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: &str, provider: F)
    where
        F: Fn(&Context) -> String + Send + Sync + 'static,
    {
        self.providers.insert(name.to_owned(), Arc::new(provider));
    }

    pub fn set_default(&mut self, key: &str, value: DefaultValue) {
        self.defaults.insert(key.to_owned(), value);
    }

    #[must_use]
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Run the provider called `name`. Unknown providers are logged and
    /// yield `None`.
    #[must_use]
    pub fn compute(&self, name: &str, ctx: &Context) -> Option<String> {
        match self.providers.get(name) {
            Some(provider) => Some(provider(ctx)),
            None => {
                warn!(provider = name, "no computed-value provider registered");
                None
            }
        }
    }

    /// The environment default for `key`, if one is registered.
    #[must_use]
    pub fn default_for(&self, key: &str, ctx: &Context) -> Option<String> {
        match self.defaults.get(key)? {
            DefaultValue::Static(text) => Some(text.clone()),
            DefaultValue::Computed(name) => self.compute(name, ctx),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        providers.sort_unstable();
        f.debug_struct("Environment")
            .field("providers", &providers)
            .field("defaults", &self.defaults)
            .finish()
    }
}
