use std::collections::{BTreeMap, HashMap};
use std::fmt;

use once_cell::sync::OnceCell;
use tracing::warn;

use crate::template;
use crate::{FormfillError, Owner, Rule, RuleId, RuleKind, RuleSpec, RuleValue, StoreError};

/// Owns every [`Rule`] and the indices derived from them.
///
/// Three views are kept:
///
/// - identity: id -> rule, in id order;
/// - pattern: exact alternative string -> rules declaring it;
/// - priority: case-owned rules first, then all others, each by id.
///
/// The pattern and priority views are built lazily and dropped on every
/// mutation. A store is `Send + Sync`; resolutions only take `&self`.
///
/// # Example
///
/// ```
/// use formfill::{Owner, RuleSpec, RuleStore};
///
/// let mut store = RuleStore::new();
/// store.add(RuleSpec::equal("a", "2")).unwrap();
/// let case = store.add(RuleSpec::equal("a", "1").owner(Owner::Case)).unwrap();
///
/// let order: Vec<_> = store.all_in_priority_order().iter().map(|r| r.id()).collect();
/// assert_eq!(order[0], case);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: BTreeMap<RuleId, Rule>,
    next_ordinary: u64,
    next_template: u64,
    pattern_index: OnceCell<HashMap<String, Vec<RuleId>>>,
    priority: OnceCell<Vec<RuleId>>,
}

impl RuleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted records. Rejected records are logged and
    /// returned alongside the store; the accepted ones remain usable.
    pub fn from_specs(specs: impl IntoIterator<Item = RuleSpec>) -> (Self, Vec<StoreError>) {
        let mut store = Self::new();
        let rejected = specs
            .into_iter()
            .filter_map(|spec| store.add(spec).err())
            .collect();
        (store, rejected)
    }

    /// Load a JSON array of rule records.
    ///
    /// # Errors
    ///
    /// Returns [`FormfillError::Json`] if the input is not a valid record
    /// array. Individual duplicate or empty records are skipped with a warning.
    pub fn from_json(input: &str) -> Result<Self, FormfillError> {
        let specs: Vec<RuleSpec> = serde_json::from_str(input)?;
        let (store, _rejected) = Self::from_specs(specs);
        Ok(store)
    }

    /// Read a JSON rule file.
    ///
    /// # Errors
    ///
    /// Returns [`FormfillError`] on I/O or JSON failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, FormfillError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json(&input)
    }

    /// Serialize every rule as a JSON array of records, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`FormfillError::Json`] if encoding fails.
    pub fn to_json(&self) -> Result<String, FormfillError> {
        Ok(serde_json::to_string_pretty(&self.specs())?)
    }

    /// The persisted records of every rule, in id order.
    #[must_use]
    pub fn specs(&self) -> Vec<RuleSpec> {
        self.rules.values().map(Rule::to_spec).collect()
    }

    /// Register a rule and return its new id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateRule`] if a structurally equal rule is
    /// already registered, or [`StoreError::EmptyPattern`] if the pattern has
    /// no alternatives. Both are also logged; the store is left unchanged.
    pub fn add(&mut self, spec: RuleSpec) -> Result<RuleId, StoreError> {
        let template = spec.owner == Owner::Template;
        let provisional = if template {
            RuleId::Template(self.next_template + 1)
        } else {
            RuleId::Ordinary(self.next_ordinary + 1)
        };
        let rule = Rule::from_spec(provisional, spec);
        self.check_insertable(&rule, None)?;

        if template {
            self.next_template += 1;
        } else {
            self.next_ordinary += 1;
        }
        self.rules.insert(provisional, rule);
        self.invalidate();
        Ok(provisional)
    }

    /// Remove a rule from every index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownRule`] if no rule has this id.
    pub fn remove(&mut self, id: RuleId) -> Result<Rule, StoreError> {
        let rule = self.rules.remove(&id).ok_or(StoreError::UnknownRule { id })?;
        self.invalidate();
        Ok(rule)
    }

    /// Replace a rule's pattern (comma-separated source form).
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError`] if the id is unknown, the new pattern is
    /// empty, or the change would duplicate another rule.
    pub fn set_pattern(&mut self, id: RuleId, pattern: &str) -> Result<(), StoreError> {
        let mut updated = self.get(id).ok_or(StoreError::UnknownRule { id })?.clone();
        updated.replace_pattern(pattern);
        self.replace(updated)
    }

    /// Replace a rule's value.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError`] if the id is unknown or the change would
    /// duplicate another rule.
    pub fn set_value(&mut self, id: RuleId, value: impl Into<RuleValue>) -> Result<(), StoreError> {
        let mut updated = self.get(id).ok_or(StoreError::UnknownRule { id })?.clone();
        updated.replace_value(value.into());
        self.replace(updated)
    }

    fn replace(&mut self, rule: Rule) -> Result<(), StoreError> {
        self.check_insertable(&rule, Some(rule.id()))?;
        self.rules.insert(rule.id(), rule);
        self.invalidate();
        Ok(())
    }

    fn check_insertable(&self, rule: &Rule, replacing: Option<RuleId>) -> Result<(), StoreError> {
        if rule.pattern().is_empty() {
            warn!(rule = %rule, "rejected rule with empty pattern");
            return Err(StoreError::EmptyPattern);
        }
        let duplicate = self
            .rules
            .values()
            .find(|other| Some(other.id()) != replacing && other.structurally_eq(rule));
        if let Some(existing) = duplicate {
            warn!(rule = %rule, existing = %existing.id(), "rejected duplicate rule");
            return Err(StoreError::DuplicateRule {
                existing: existing.id(),
            });
        }
        Ok(())
    }

    /// Drop every rule. Id counters keep counting so ids are never reused.
    pub fn clear(&mut self) {
        self.rules.clear();
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.pattern_index = OnceCell::new();
        self.priority = OnceCell::new();
    }

    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Rules declaring `key` verbatim as one of their pattern alternatives,
    /// in id order.
    #[must_use]
    pub fn by_pattern(&self, key: &str) -> Vec<&Rule> {
        let index = self.pattern_index.get_or_init(|| {
            let mut index: HashMap<String, Vec<RuleId>> = HashMap::new();
            for rule in self.rules.values() {
                for alt in rule.pattern().alternatives() {
                    index.entry(alt.clone()).or_default().push(rule.id());
                }
            }
            index
        });
        index
            .get(key)
            .map(|ids| ids.iter().filter_map(|id| self.rules.get(id)).collect())
            .unwrap_or_default()
    }

    /// Every rule, case-owned ones first, each partition in id order.
    #[must_use]
    pub fn all_in_priority_order(&self) -> Vec<&Rule> {
        let order = self.priority.get_or_init(|| {
            let (case, rest): (Vec<&Rule>, Vec<&Rule>) =
                self.rules.values().partition(|r| r.is_case());
            case.into_iter().chain(rest).map(Rule::id).collect()
        });
        order.iter().filter_map(|id| self.rules.get(id)).collect()
    }

    /// Rules whose value refers to `variable` in one of its placeholders.
    /// Only direct references are reported.
    #[must_use]
    pub fn rules_depending_on(&self, variable: &str) -> Vec<&Rule> {
        self.rules
            .values()
            .filter(|r| {
                r.value()
                    .as_literal()
                    .is_some_and(|text| template::references(text, variable))
            })
            .collect()
    }

    /// The highest-priority rule of `kind` that declares `pattern` as an
    /// alternative.
    #[must_use]
    pub fn find_rule(&self, kind: RuleKind, pattern: &str) -> Option<&Rule> {
        self.all_in_priority_order()
            .into_iter()
            .find(|r| r.kind() == kind && r.pattern().contains(pattern))
    }

    #[cfg(feature = "binary-cache")]
    pub(crate) fn counters(&self) -> (u64, u64) {
        (self.next_ordinary, self.next_template)
    }

    #[cfg(feature = "binary-cache")]
    pub(crate) fn restore(rules: Vec<Rule>, next_ordinary: u64, next_template: u64) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.id(), r)).collect(),
            next_ordinary,
            next_template,
            pattern_index: OnceCell::new(),
            priority: OnceCell::new(),
        }
    }
}

#[cfg(feature = "binary-cache")]
impl RuleStore {
    /// Serialize this store to a byte vector.
    ///
    /// The optional `source_text` (for example the JSON the store was loaded
    /// from) is hashed with BLAKE3 and embedded in the payload metadata, so
    /// callers can tell when a cache is stale.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`](crate::serial::SerializeError) if encoding fails.
    pub fn to_bytes(
        &self,
        source_text: Option<&str>,
    ) -> Result<Vec<u8>, crate::serial::SerializeError> {
        crate::serial::encode(self, source_text)
    }

    /// Deserialize a store previously produced by [`to_bytes`](Self::to_bytes).
    /// Rule ids and id counters are restored exactly.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::serial::DeserializeError) on
    /// format, integrity, or validation failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::serial::DeserializeError> {
        crate::serial::decode(bytes)
    }

    /// Serialize this store and write it to a file.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`](crate::serial::SerializeError) on
    /// encoding or I/O failure.
    pub fn to_binary_file(
        &self,
        path: impl AsRef<std::path::Path>,
        source_text: Option<&str>,
    ) -> Result<(), crate::serial::SerializeError> {
        let bytes = self.to_bytes(source_text)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a file and deserialize the store it contains.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::serial::DeserializeError) on
    /// I/O, format, integrity, or validation failure.
    pub fn from_binary_file(
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, crate::serial::DeserializeError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for RuleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let case = self.rules.values().filter(|r| r.is_case()).count();
        write!(f, "RuleStore({} rules, {} case-owned)", self.rules.len(), case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(rules: &[&Rule]) -> Vec<RuleId> {
        rules.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn ids_are_monotonic_per_counter() {
        let mut store = RuleStore::new();
        let a = store.add(RuleSpec::equal("a", "1")).unwrap();
        let t = store.add(RuleSpec::equal("a", "2").owner(Owner::Template)).unwrap();
        let b = store.add(RuleSpec::equal("b", "1")).unwrap();
        assert_eq!(a, RuleId::Ordinary(1));
        assert_eq!(t, RuleId::Template(1));
        assert_eq!(b, RuleId::Ordinary(2));
    }

    #[test]
    fn ids_never_reused_after_remove() {
        let mut store = RuleStore::new();
        let a = store.add(RuleSpec::equal("a", "1")).unwrap();
        store.remove(a).unwrap();
        let b = store.add(RuleSpec::equal("a", "1")).unwrap();
        assert_ne!(a, b);
        store.clear();
        let c = store.add(RuleSpec::equal("a", "1")).unwrap();
        assert_eq!(c, RuleId::Ordinary(3));
    }

    #[test]
    fn duplicate_rejected_without_consuming_id() {
        let mut store = RuleStore::new();
        let a = store.add(RuleSpec::equal("a, b", "1")).unwrap();
        let err = store.add(RuleSpec::equal("a,b", "1")).unwrap_err();
        assert_eq!(err, StoreError::DuplicateRule { existing: a });
        assert_eq!(store.len(), 1);
        assert_eq!(store.add(RuleSpec::equal("c", "1")).unwrap(), RuleId::Ordinary(2));
    }

    #[test]
    fn same_pattern_different_owner_is_not_duplicate() {
        let mut store = RuleStore::new();
        store.add(RuleSpec::equal("a", "1")).unwrap();
        assert!(store.add(RuleSpec::equal("a", "1").owner(Owner::Case)).is_ok());
    }

    #[test]
    fn empty_pattern_rejected() {
        let mut store = RuleStore::new();
        assert_eq!(store.add(RuleSpec::equal(" , ", "1")), Err(StoreError::EmptyPattern));
    }

    #[test]
    fn by_pattern_is_exact() {
        let mut store = RuleStore::new();
        let a = store.add(RuleSpec::equal("name, surname", "1")).unwrap();
        let b = store.add(RuleSpec::new(RuleKind::Substring, "name", "2")).unwrap();
        assert_eq!(ids(&store.by_pattern("name")), vec![a, b]);
        assert_eq!(ids(&store.by_pattern("surname")), vec![a]);
        assert!(store.by_pattern("nam").is_empty());
    }

    #[test]
    fn set_pattern_reindexes() {
        let mut store = RuleStore::new();
        let a = store.add(RuleSpec::equal("old", "1")).unwrap();
        assert_eq!(store.by_pattern("old").len(), 1);
        store.set_pattern(a, "new").unwrap();
        assert!(store.by_pattern("old").is_empty());
        assert_eq!(ids(&store.by_pattern("new")), vec![a]);
    }

    #[test]
    fn set_pattern_rejects_duplicate() {
        let mut store = RuleStore::new();
        store.add(RuleSpec::equal("a", "1")).unwrap();
        let b = store.add(RuleSpec::equal("b", "1")).unwrap();
        assert!(matches!(
            store.set_pattern(b, "a"),
            Err(StoreError::DuplicateRule { .. })
        ));
        assert_eq!(store.get(b).unwrap().pattern().to_string(), "b");
    }

    #[test]
    fn set_value_and_unknown_id() {
        let mut store = RuleStore::new();
        let a = store.add(RuleSpec::equal("a", "1")).unwrap();
        store.set_value(a, "2").unwrap();
        assert_eq!(store.get(a).unwrap().value().as_literal(), Some("2"));
        let missing = RuleId::Ordinary(99);
        assert_eq!(store.set_value(missing, "x"), Err(StoreError::UnknownRule { id: missing }));
        assert!(store.remove(missing).is_err());
    }

    #[test]
    fn priority_order_puts_case_first() {
        let mut store = RuleStore::new();
        let g1 = store.add(RuleSpec::equal("a", "1")).unwrap();
        let c1 = store.add(RuleSpec::equal("b", "1").owner(Owner::Case)).unwrap();
        let g2 = store.add(RuleSpec::equal("c", "1").owner(Owner::Person)).unwrap();
        let c2 = store.add(RuleSpec::equal("d", "1").owner(Owner::Case)).unwrap();
        assert_eq!(ids(&store.all_in_priority_order()), vec![c1, c2, g1, g2]);

        store.remove(c1).unwrap();
        assert_eq!(ids(&store.all_in_priority_order()), vec![c2, g1, g2]);
    }

    #[test]
    fn rules_depending_on_is_one_hop() {
        let mut store = RuleStore::new();
        let a = store.add(RuleSpec::equal("a", "${b}$")).unwrap();
        store.add(RuleSpec::equal("b", "${c}$")).unwrap();
        let d = store.add(RuleSpec::equal("d", "x ${b, e}$")).unwrap();
        assert_eq!(ids(&store.rules_depending_on("b")), vec![a, d]);
        assert!(store.rules_depending_on("z").is_empty());
    }

    #[test]
    fn find_rule_by_kind_and_pattern() {
        let mut store = RuleStore::new();
        store.add(RuleSpec::equal("k", "general")).unwrap();
        let case = store.add(RuleSpec::equal("k", "case").owner(Owner::Case)).unwrap();
        assert_eq!(store.find_rule(RuleKind::Equal, "k").map(Rule::id), Some(case));
        assert!(store.find_rule(RuleKind::Regex, "k").is_none());
    }

    #[test]
    fn json_round_trip() {
        let mut store = RuleStore::new();
        store
            .add(RuleSpec::new(RuleKind::Similar, "surname", "${p.last}$").threshold(2).scope(["123"]))
            .unwrap();
        store
            .add(RuleSpec::equal("today", RuleValue::computed("today")).subject("alice"))
            .unwrap();
        let json = store.to_json().unwrap();
        let restored = RuleStore::from_json(&json).unwrap();
        assert_eq!(restored.specs(), store.specs());
    }

    #[test]
    fn from_specs_reports_rejections() {
        let (store, rejected) = RuleStore::from_specs(vec![
            RuleSpec::equal("a", "1"),
            RuleSpec::equal("a", "1"),
            RuleSpec::equal("", "1"),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(rejected.len(), 2);
    }

    #[test]
    fn display() {
        let mut store = RuleStore::new();
        store.add(RuleSpec::equal("a", "1").owner(Owner::Case)).unwrap();
        store.add(RuleSpec::equal("b", "1")).unwrap();
        assert_eq!(store.to_string(), "RuleStore(2 rules, 1 case-owned)");
    }
}
