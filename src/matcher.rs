use crate::{dsl, Context, Rule, RuleKind, RuleStore};

/// Whether `rule` may be used under `ctx` at all: its scope (if any) must
/// name a substring of the current document and its subject (if any) must
/// be the active subject.
pub(crate) fn applies(rule: &Rule, ctx: &Context) -> bool {
    scope_matches(rule, ctx) && subject_matches(rule, ctx)
}

pub(crate) fn scope_matches(rule: &Rule, ctx: &Context) -> bool {
    match rule.scope() {
        None => true,
        Some(scope) => ctx
            .document_name()
            .is_some_and(|doc| scope.iter().any(|s| doc.contains(s.as_str()))),
    }
}

fn subject_matches(rule: &Rule, ctx: &Context) -> bool {
    match rule.subject() {
        None => true,
        Some(subject) => ctx.active_subject() == Some(subject),
    }
}

/// Index of the first pattern alternative of `rule` that matches `key`.
pub(crate) fn matching_alternative(rule: &Rule, key: &str, store: &RuleStore) -> Option<usize> {
    rule.pattern()
        .alternatives()
        .iter()
        .enumerate()
        .find_map(|(i, alt)| alternative_matches(rule, i, alt, key, store).then_some(i))
}

fn alternative_matches(rule: &Rule, index: usize, alt: &str, key: &str, store: &RuleStore) -> bool {
    match rule.kind() {
        RuleKind::Equal | RuleKind::Date | RuleKind::Switch => alt == key,
        RuleKind::Substring => key.contains(alt),
        RuleKind::Superstring => alt.contains(key),
        RuleKind::Similar => strsim::levenshtein(alt, key) < rule.threshold(),
        RuleKind::Regex => rule.regex_at(index).is_some_and(|re| re.is_match(key)),
        RuleKind::Formula => dsl::truthy(dsl::evaluate(key, alt, Some(store)).as_ref()),
    }
}
