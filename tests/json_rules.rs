use formfill::{Context, Engine, FormfillError, Owner, RuleKind, RuleStore, RuleValue};

const RULES: &str = r#"[
    {"kind": "equal", "pattern": "greeting", "value": "Dear ${name}$"},
    {"kind": "equal", "pattern": "name, full name", "value": "Ada Lovelace", "owner": "case"},
    {"kind": "similar", "pattern": "surname", "value": "Lovelace", "threshold": 2},
    {"kind": "regex", "pattern": "^f\\.date$", "value": {"computed": "today"}},
    {"kind": "equal", "pattern": "office", "value": "Room 1", "scope": ["123"]},
    {"kind": "equal", "pattern": "title", "value": "Countess", "owner": "header", "subject": "ada"}
]"#;

#[test]
fn load_rule_records() {
    let store = RuleStore::from_json(RULES).unwrap();
    assert_eq!(store.len(), 6);

    let name = store.by_pattern("full name");
    assert_eq!(name.len(), 1);
    assert_eq!(*name[0].owner(), Owner::Case);

    let similar = store.find_rule(RuleKind::Similar, "surname").unwrap();
    assert_eq!(similar.threshold(), 2);

    let computed = store.find_rule(RuleKind::Regex, r"^f\.date$").unwrap();
    assert_eq!(*computed.value(), RuleValue::computed("today"));

    let header = store.find_rule(RuleKind::Equal, "title").unwrap();
    assert_eq!(header.subject().map(|s| s.as_str()), Some("ada"));
}

#[test]
fn loaded_rules_resolve() {
    let store = RuleStore::from_json(RULES).unwrap();
    let engine = Engine::new(&store);
    let ctx = Context::new().document("form-123");
    assert_eq!(
        engine.resolve_first(&ctx, "${greeting}$").as_deref(),
        Some("Dear Ada Lovelace")
    );
    assert_eq!(engine.resolve_first(&ctx, "${office}$").as_deref(), Some("Room 1"));
    assert_eq!(engine.resolve_first(&ctx, "${title}$"), None);
    assert_eq!(
        engine
            .resolve_first(&ctx.clone().subject("ada"), "${title}$")
            .as_deref(),
        Some("Countess")
    );
}

#[test]
fn export_then_import_is_lossless() {
    let store = RuleStore::from_json(RULES).unwrap();
    let json = store.to_json().unwrap();
    let again = RuleStore::from_json(&json).unwrap();
    assert_eq!(again.specs(), store.specs());
    assert_eq!(again.to_json().unwrap(), json);
}

#[test]
fn export_omits_absent_optionals() {
    let store = RuleStore::from_json(r#"[{"kind": "equal", "pattern": "a", "value": "1"}]"#).unwrap();
    let json = store.to_json().unwrap();
    assert!(!json.contains("scope"));
    assert!(!json.contains("threshold"));
    assert!(!json.contains("subject"));
}

#[test]
fn duplicate_records_are_skipped() {
    let json = r#"[
        {"kind": "equal", "pattern": "a", "value": "1"},
        {"kind": "equal", "pattern": "a", "value": "1"},
        {"kind": "equal", "pattern": "a", "value": "2"}
    ]"#;
    let store = RuleStore::from_json(json).unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn malformed_json_is_an_error() {
    let err = RuleStore::from_json(r#"[{"kind": "fuzzy", "pattern": "a"}]"#).unwrap_err();
    assert!(matches!(err, FormfillError::Json(_)));
    let err = RuleStore::from_json("not json").unwrap_err();
    assert!(matches!(err, FormfillError::Json(_)));
}

#[test]
fn missing_file_is_io_error() {
    let err = RuleStore::from_file("/nonexistent/rules.json").unwrap_err();
    assert!(matches!(err, FormfillError::Io(_)));
}

#[test]
fn file_round_trip() {
    let path = std::env::temp_dir().join(format!("formfill-rules-{}.json", std::process::id()));
    let store = RuleStore::from_json(RULES).unwrap();
    std::fs::write(&path, store.to_json().unwrap()).unwrap();
    let loaded = RuleStore::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded.specs(), store.specs());
}
