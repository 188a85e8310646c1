use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use crate::date;
use crate::dsl::{self, Evaluated};
use crate::matcher;
use crate::template::{self, Container, Entry, CLOSE, OPEN};
use crate::{Context, DefaultValue, Environment, Owner, Reason, Rule, RuleId, RuleKind, RuleStore, RuleValue};

/// Resolves placeholder strings against a [`RuleStore`].
///
/// An engine borrows its store immutably and carries an [`Environment`] of
/// computed-value providers and defaults. All per-call state (visited set,
/// depth) lives inside each call, so one engine can serve many threads.
///
/// # Example
///
/// ```
/// use formfill::{Context, Engine, RuleSpec, RuleStore};
///
/// let mut store = RuleStore::new();
/// store.add(RuleSpec::equal("a", "${b}$")).unwrap();
/// store.add(RuleSpec::equal("b", "3")).unwrap();
///
/// let engine = Engine::new(&store);
/// assert_eq!(engine.resolve_first(&Context::new(), "${a}$").as_deref(), Some("3"));
/// ```
#[derive(Debug, Clone)]
pub struct Engine<'s> {
    store: &'s RuleStore,
    env: Environment,
}

impl<'s> Engine<'s> {
    /// An engine with the built-in providers and no defaults.
    #[must_use]
    pub fn new(store: &'s RuleStore) -> Self {
        Self {
            store,
            env: Environment::new(),
        }
    }

    #[must_use]
    pub fn builder(store: &'s RuleStore) -> EngineBuilder<'s> {
        EngineBuilder {
            store,
            env: Environment::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &'s RuleStore {
        self.store
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Single-level substitution: for every container in `source`, one
    /// string per candidate of each of its entries, in priority order.
    /// Nothing produced here is expanded further.
    pub fn one_step(&self, ctx: &Context, source: &str) -> impl Iterator<Item = String> {
        let mut search = Search::new(self, ctx, source);
        search.step(source, 0).into_iter().map(Step::into_text)
    }

    /// The first placeholder-free string reachable from `source`, or `None`
    /// if none is reachable within the context's depth limit.
    #[must_use]
    pub fn resolve_first(&self, ctx: &Context, source: &str) -> Option<String> {
        let mut search = Search::new(self, ctx, source);
        search.first(source, 0, &mut Origins::new())
    }

    /// The reachable string with the highest fill score, falling back to
    /// `source` itself. Ties keep the earlier string.
    #[must_use]
    pub fn resolve_best(&self, ctx: &Context, source: &str) -> String {
        let mut search = Search::new(self, ctx, source);
        search.best(source)
    }

    /// Like [`resolve_first`](Self::resolve_first), together with the chain
    /// of rules applied on the way to the result.
    pub fn explain(&self, ctx: &Context, source: &str) -> Option<Reason> {
        let mut search = Search::new(self, ctx, source);
        let mut origins = Origins::new();
        let result = search.first(source, 0, &mut origins)?;

        let mut chain = Vec::new();
        let mut current = result.as_str();
        while let Some((parent, rule)) = origins.get(current) {
            chain.extend(*rule);
            current = parent.as_str();
        }
        chain.reverse();
        Some(Reason::new(result, chain))
    }

    /// Raw candidate values for the variable `key`, after tier selection
    /// and with the environment default last.
    #[must_use]
    pub fn candidates_for(&self, ctx: &Context, key: &str) -> Vec<String> {
        let top = format!("{OPEN}{key}{CLOSE}");
        let mut search = Search::new(self, ctx, &top);
        search
            .variable_values(key, 0)
            .into_iter()
            .map(|(value, _)| value)
            .collect()
    }
}

/// Builder for an [`Engine`] with custom providers and defaults.
///
/// ```
/// use formfill::{Context, Engine, RuleStore};
///
/// let store = RuleStore::new();
/// let engine = Engine::builder(&store)
///     .provider("clerk", |_| "J. Doe".to_owned())
///     .default_computed("signature", "clerk")
///     .default_value("country", "DE")
///     .build();
///
/// let ctx = Context::new();
/// assert_eq!(engine.resolve_first(&ctx, "${signature}$").as_deref(), Some("J. Doe"));
/// assert_eq!(engine.resolve_first(&ctx, "${country}$").as_deref(), Some("DE"));
/// ```
#[derive(Debug)]
#[must_use]
pub struct EngineBuilder<'s> {
    store: &'s RuleStore,
    env: Environment,
}

impl<'s> EngineBuilder<'s> {
    /// Replace the environment wholesale, dropping the built-in providers
    /// unless `env` carries them.
    pub fn environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn provider<F>(mut self, name: &str, provider: F) -> Self
    where
        F: Fn(&Context) -> String + Send + Sync + 'static,
    {
        self.env.register(name, provider);
        self
    }

    pub fn default_value(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.set_default(key, DefaultValue::Static(value.into()));
        self
    }

    pub fn default_computed(mut self, key: &str, provider: &str) -> Self {
        if !self.env.has_provider(provider) {
            warn!(key, provider, "default refers to an unregistered provider");
        }
        self.env
            .set_default(key, DefaultValue::Computed(provider.to_owned()));
        self
    }

    #[must_use]
    pub fn build(self) -> Engine<'s> {
        Engine {
            store: self.store,
            env: self.env,
        }
    }
}

/// A rule selected for a key, with the index of the pattern alternative
/// that matched.
#[derive(Debug, Clone, Copy)]
struct Match<'s> {
    rule: &'s Rule,
    alternative: usize,
}

/// A string produced by one substitution and the rule that produced it.
#[derive(Debug)]
struct Step {
    text: String,
    rule: Option<RuleId>,
}

impl Step {
    fn into_text(self) -> String {
        self.text
    }
}

/// child -> (parent, rule applied)
type Origins = HashMap<String, (String, Option<RuleId>)>;

/// Unresolved remainder -> (fill score of the text before it, depth) at
/// which it was last expanded.
type Settled = HashMap<String, (usize, usize)>;

/// Text left of the expanded container never changes again within a
/// branch, so a remainder already expanded with at least as good a prefix
/// and at no greater depth has nothing new to offer.
fn settle(settled: &mut Settled, rest: &str, score: usize, depth: usize) -> bool {
    let covered = settled
        .get(rest)
        .is_some_and(|&(seen_score, seen_depth)| seen_score >= score && seen_depth <= depth);
    if covered {
        return false;
    }
    settled.insert(rest.to_owned(), (score, depth));
    true
}

/// Depth of a child string. Filling a container with plain text leaves the
/// nesting level alone; a value that keeps the container count up opens a
/// new level.
fn child_depth(depth: usize, parent_containers: usize, child: &str) -> usize {
    if template::containers(child).len() < parent_containers {
        depth
    } else {
        depth + 1
    }
}

/// State of one top-level call.
struct Search<'e, 's> {
    store: &'s RuleStore,
    env: &'e Environment,
    ctx: &'e Context,
    top: String,
    /// Resolved values of date/switch rule values. `None` while in progress.
    nested: HashMap<String, Option<String>>,
}

impl<'e, 's> Search<'e, 's> {
    fn new(engine: &'e Engine<'s>, ctx: &'e Context, top: &str) -> Self {
        Self {
            store: engine.store,
            env: &engine.env,
            ctx,
            top: top.to_owned(),
            nested: HashMap::new(),
        }
    }

    /// Breadth across one level, then depth: every child of a string is
    /// checked for finality before the first of them is expanded. Only the
    /// leftmost container of a string is expanded; the others are filled
    /// further down the same branch.
    fn first(&mut self, source: &str, start: usize, origins: &mut Origins) -> Option<String> {
        if template::is_final(source) {
            return Some(source.to_owned());
        }
        let limit = self.ctx.depth_limit();
        let mut visited = HashSet::from([source.to_owned()]);
        let mut settled = Settled::new();
        let mut stack = vec![(source.to_owned(), start)];

        while let Some((current, depth)) = stack.pop() {
            if depth >= limit {
                warn!(depth, source = %current, "resolution depth limit reached; branch abandoned");
                continue;
            }
            let containers = template::containers(&current);
            let Some(leftmost) = containers.first() else {
                continue;
            };
            if !settle(&mut settled, &current[leftmost.start..], 0, depth) {
                continue;
            }
            let mut fresh = Vec::new();
            for step in self.container_steps(&current, leftmost, depth) {
                if !visited.insert(step.text.clone()) {
                    continue;
                }
                origins.insert(step.text.clone(), (current.clone(), step.rule));
                if template::is_final(&step.text) {
                    return Some(step.text);
                }
                let next = child_depth(depth, containers.len(), &step.text);
                fresh.push((step.text, next));
            }
            stack.extend(fresh.into_iter().rev());
        }
        None
    }

    /// Containers with no candidate are left in place and the next one to
    /// the right is expanded instead.
    fn best(&mut self, source: &str) -> String {
        let limit = self.ctx.depth_limit();
        let mut best = source.to_owned();
        let mut best_score = template::fill_score(source);
        let mut visited = HashSet::from([source.to_owned()]);
        let mut settled = Settled::new();
        let mut stack = vec![(source.to_owned(), 0usize)];

        while let Some((current, depth)) = stack.pop() {
            let containers = template::containers(&current);
            if containers.is_empty() {
                continue;
            }
            if depth >= limit {
                warn!(depth, source = %current, "resolution depth limit reached; branch abandoned");
                continue;
            }
            let mut expanded = None;
            for container in &containers {
                let steps = self.container_steps(&current, container, depth);
                if !steps.is_empty() {
                    expanded = Some((container.start, steps));
                    break;
                }
            }
            let Some((at, steps)) = expanded else {
                continue;
            };
            let frozen = template::fill_score(&current[..at]);
            if !settle(&mut settled, &current[at..], frozen, depth) {
                continue;
            }
            let mut fresh = Vec::new();
            for step in steps {
                if !visited.insert(step.text.clone()) {
                    continue;
                }
                let score = template::fill_score(&step.text);
                if score > best_score {
                    best_score = score;
                    best.clone_from(&step.text);
                }
                let next = child_depth(depth, containers.len(), &step.text);
                fresh.push((step.text, next));
            }
            stack.extend(fresh.into_iter().rev());
        }
        best
    }

    fn step(&mut self, source: &str, depth: usize) -> Vec<Step> {
        let mut out = Vec::new();
        for container in template::containers(source) {
            out.extend(self.container_steps(source, &container, depth));
        }
        out
    }

    fn container_steps(&mut self, source: &str, container: &Container<'_>, depth: usize) -> Vec<Step> {
        let mut out = Vec::new();
        for entry in container.entries() {
            for (value, rule) in self.entry_values(entry, depth) {
                let text = container.substitute(source, &value);
                if text != source {
                    out.push(Step { text, rule });
                }
            }
        }
        out
    }

    fn entry_values(&mut self, entry: Entry<'_>, depth: usize) -> Vec<(String, Option<RuleId>)> {
        match entry {
            Entry::Variable(key) => self.variable_values(key, depth),
            Entry::Expression(expr) => {
                let subject = self.ctx.field_key().unwrap_or_default();
                match dsl::evaluate(subject, expr, Some(self.store)) {
                    Some(Evaluated::Text(text)) if !text.is_empty() && text != self.top => {
                        trace!(expression = expr, candidate = %text, "expression candidate");
                        vec![(text, None)]
                    }
                    _ => Vec::new(),
                }
            }
        }
    }

    fn variable_values(&mut self, key: &str, depth: usize) -> Vec<(String, Option<RuleId>)> {
        let mut out = Vec::new();
        for m in self.select(key) {
            if let Some(value) = self.rule_value(m, depth) {
                out.push((value, Some(m.rule.id())));
            }
        }
        if let Some(value) = self.env.default_for(key, self.ctx) {
            out.push((value, None));
        }
        out.retain(|(value, rule)| {
            let keep = value != key && *value != self.top;
            if keep {
                trace!(key, candidate = %value, rule = ?rule, "candidate");
            }
            keep
        });
        out
    }

    /// Rules offering a value for `key`, by priority tier.
    fn select(&self, key: &str) -> Vec<Match<'s>> {
        let store = self.store;
        let ctx = self.ctx;
        let hits: Vec<Match<'s>> = store
            .by_pattern(key)
            .into_iter()
            .filter(|rule| matcher::applies(rule, ctx))
            .filter_map(|rule| {
                matcher::matching_alternative(rule, key, store).map(|alternative| Match { rule, alternative })
            })
            .collect();

        let header: Vec<Match<'s>> = hits
            .iter()
            .copied()
            .filter(|m| *m.rule.owner() == Owner::Header && m.rule.subject().is_some())
            .collect();
        if !header.is_empty() {
            debug!(key, count = header.len(), "header tier");
            return header;
        }

        if hits.iter().any(|m| m.rule.scope().is_some()) {
            let (case, rest): (Vec<Match<'s>>, Vec<Match<'s>>) = hits
                .into_iter()
                .filter(|m| m.rule.scope().is_some())
                .partition(|m| m.rule.is_case());
            debug!(key, case = case.len(), other = rest.len(), "scope tier");
            return case.into_iter().chain(rest).collect();
        }

        if !hits.is_empty() {
            let (personal, rest): (Vec<Match<'s>>, Vec<Match<'s>>) =
                hits.into_iter().partition(|m| m.rule.subject().is_some());
            let (case, specific): (Vec<Match<'s>>, Vec<Match<'s>>) =
                rest.into_iter().partition(|m| m.rule.is_case());
            debug!(
                key,
                personal = personal.len(),
                case = case.len(),
                specific = specific.len(),
                "indexed tier"
            );
            return personal.into_iter().chain(case).chain(specific).collect();
        }

        let scanned: Vec<Match<'s>> = store
            .all_in_priority_order()
            .into_iter()
            .filter(|rule| rule.kind() != RuleKind::Equal && matcher::applies(rule, ctx))
            .filter_map(|rule| {
                matcher::matching_alternative(rule, key, store).map(|alternative| Match { rule, alternative })
            })
            .collect();
        debug!(key, count = scanned.len(), "scan tier");
        scanned
    }

    fn rule_value(&mut self, m: Match<'s>, depth: usize) -> Option<String> {
        match m.rule.kind() {
            RuleKind::Date => {
                let raw = self.plain_value(m.rule)?;
                let resolved = self.resolve_nested(&raw, depth)?;
                Some(date::reformat_compact_dates(&resolved))
            }
            RuleKind::Switch => self.switch_value(m, depth),
            _ => self.plain_value(m.rule),
        }
    }

    fn plain_value(&self, rule: &Rule) -> Option<String> {
        match rule.value() {
            RuleValue::Literal(text) => Some(text.clone()),
            RuleValue::Computed { computed } => self.env.compute(computed, self.ctx),
        }
    }

    /// `variable = alt0, alt1, ...`: `"1"` when the variable resolves to the
    /// alternative at the matched pattern position, `"0"` otherwise.
    fn switch_value(&mut self, m: Match<'s>, depth: usize) -> Option<String> {
        let Some(text) = m.rule.value().as_literal() else {
            warn!(rule = %m.rule.id(), "switch rule with a computed value");
            return None;
        };
        let Some((variable, alternatives)) = text.split_once('=') else {
            warn!(rule = %m.rule.id(), value = text, "switch value lacks `variable = alternatives`");
            return None;
        };
        let variable = variable.trim();
        let query = if template::is_final(variable) {
            format!("{OPEN}{variable}{CLOSE}")
        } else {
            variable.to_owned()
        };
        let resolved = self.resolve_nested(&query, depth)?;
        let expected = template::split_entries(alternatives);
        let hit = expected
            .get(m.alternative)
            .is_some_and(|alt| *alt == resolved);
        Some(if hit { "1" } else { "0" }.to_owned())
    }

    fn resolve_nested(&mut self, source: &str, depth: usize) -> Option<String> {
        if let Some(cached) = self.nested.get(source) {
            return cached.clone();
        }
        self.nested.insert(source.to_owned(), None);
        let result = self.first(source, depth + 1, &mut Origins::new());
        if result.is_none() {
            debug!(source, "nested value did not resolve");
        }
        self.nested.insert(source.to_owned(), result.clone());
        result
    }
}
