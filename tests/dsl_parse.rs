use formfill::dsl::{self, Evaluated, Operator, SExpr};
use formfill::{RuleKind, RuleSpec, RuleStore};

fn text(s: &str) -> Option<Evaluated> {
    Some(Evaluated::Text(s.to_owned()))
}

#[test]
fn dsl_or_of_equals_picks_matching_branch() {
    let expr = "(or (equal field value1)(equal other value2))";
    assert_eq!(dsl::evaluate("field", expr, None), text("value1"));
    assert_eq!(dsl::evaluate("other", expr, None), text("value2"));
    assert_eq!(dsl::evaluate("third", expr, None), None);
}

#[test]
fn dsl_parse_structure() {
    let expr = dsl::parse("(and (substring a) (not (equal b)))").unwrap();
    let SExpr::List(items) = expr else {
        panic!("expected list");
    };
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_atom(), Some("and"));
    assert!(matches!(&items[2], SExpr::List(inner) if inner.len() == 2));
}

#[test]
fn dsl_display_round_trips_through_parse() {
    let source = "(transform \"a b\" x (equal y))";
    let expr = dsl::parse(source).unwrap();
    assert_eq!(dsl::parse(&expr.to_string()).unwrap(), expr);
}

#[test]
fn dsl_quoted_atoms_keep_whitespace() {
    assert_eq!(
        dsl::evaluate("two words", "(equal \"two words\" 'matched it')", None),
        text("matched it")
    );
}

#[test]
fn dsl_missing_paren_is_recovered() {
    assert_eq!(dsl::evaluate("a", "(or (equal a yes)", None), text("yes"));
    assert_eq!(dsl::evaluate("a", "(or (equal b no) (equal a yes", None), text("yes"));
}

#[test]
fn dsl_unknown_operator_is_undefined() {
    assert_eq!(dsl::evaluate("a", "(shout a)", None), None);
}

#[test]
fn dsl_invalid_regex_is_non_match() {
    assert_eq!(dsl::evaluate("a(b", "(regex 'a(b' hit)", None), None);
    assert_eq!(dsl::evaluate("a(b", r"(regex 'a\(b' hit)", None), text("hit"));
}

#[test]
fn dsl_similar_ternary() {
    assert_eq!(dsl::evaluate("Meier", "(similar Meyer 2 same)", None), text("same"));
    assert_eq!(dsl::evaluate("Schmidt", "(similar Meyer 2 same)", None), None);
}

#[test]
fn dsl_date_reformat_and_transform_compose() {
    assert_eq!(
        dsl::evaluate("x", "(re-format-date 2013/10/30)", None),
        text("30.10.2013")
    );
    assert_eq!(
        dsl::evaluate("x", r#"(transform "(\w+)@(\w+)" "$2 at $1" "ada@home")"#, None),
        text("home at ada")
    );
}

#[test]
fn dsl_findrule_reads_store_unexpanded() {
    let mut store = RuleStore::new();
    store
        .add(RuleSpec::new(RuleKind::Regex, "^tel", "${phone.office}$"))
        .unwrap();
    assert_eq!(
        dsl::evaluate("x", "(findrule regex ^tel)", Some(&store)),
        text("${phone.office}$")
    );
    assert_eq!(dsl::evaluate("x", "(findrule equal ^tel)", Some(&store)), None);
}

#[test]
fn dsl_bilingual_aliases() {
    for (english, german) in [
        ("equal", "gleich"),
        ("substring", "teilstring"),
        ("or", "oder"),
        ("and", "und"),
        ("not", "nicht"),
        ("findrule", "finde-regel"),
    ] {
        assert_eq!(Operator::from_name(english), Operator::from_name(german));
        assert!(Operator::from_name(english).is_some(), "{english}");
    }
}

#[test]
fn dsl_parse_error_reports_expression() {
    let err = dsl::parse("(equal a))").unwrap_err();
    assert_eq!(err.expression(), "(equal a))");
    assert!(err.to_string().contains("(equal a))"));
}

#[test]
fn dsl_deep_nesting_is_rejected_not_fatal() {
    let runaway = "(".repeat(20_000);
    assert!(dsl::parse(&runaway).is_err());
    assert_eq!(dsl::evaluate("k", &runaway, None), None);

    let store = RuleStore::from_specs(vec![RuleSpec::new(RuleKind::Formula, runaway.clone(), "x")]).0;
    let ctx = formfill::Context::new();
    assert_eq!(formfill::Engine::new(&store).resolve_first(&ctx, "${k}$"), None);
}

#[test]
fn dsl_empty_text_falls_through_or() {
    assert_eq!(dsl::evaluate("k", r#"(or "" fallback)"#, None), text("fallback"));
}
