use formfill::{Context, Engine, RuleKind, RuleSpec, RuleStore};

fn main() {
    // Define rules
    let (store, rejected) = RuleStore::from_specs(vec![
        RuleSpec::equal("greeting", "Dear ${title}$ ${surname}$,"),
        RuleSpec::equal("title", "Ms."),
        RuleSpec::equal("surname", "${person.last}$"),
        RuleSpec::equal("person.last", "Lovelace"),
        RuleSpec::new(RuleKind::Date, "f.dob", "${person.dob}$"),
        RuleSpec::equal("person.dob", "18151210"),
    ]);
    assert!(rejected.is_empty(), "rejected rules: {rejected:?}");

    println!("{store}");

    let engine = Engine::new(&store);
    let ctx = Context::new().document("letter");

    for source in ["${greeting}$", "${f.dob}$", "${unknown}$"] {
        match engine.resolve_first(&ctx, source) {
            Some(value) => println!("{source} => {value}"),
            None => println!("{source} => unresolved"),
        }
    }
}
