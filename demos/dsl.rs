use formfill::{dsl, Context, Engine, RuleStore};

fn main() {
    let store = RuleStore::from_file("demos/rules.json").expect("failed to load rules");

    println!("{store}");

    // Bare expressions
    for (subject, expr) in [
        ("field", "(or (equal field value1)(equal other value2))"),
        ("x", "(re-format-date 2013/10/30)"),
        ("x", r#"(transform "(\d+)-(\d+)" "$2/$1" "10-30")"#),
        ("x", "(findrule regex ^contact\\.)"),
    ] {
        println!("{expr} @ {subject} => {:?}", dsl::evaluate(subject, expr, Some(&store)));
    }

    // Formula rules and expression placeholders inside templates
    let engine = Engine::new(&store);
    for (field, source) in [
        ("contact.tel", "${contact.tel}$"),
        ("contact.fax", "${contact.fax}$"),
        ("salutation", "${(or (equal salutation Dear) (equal closing Regards)), fallback}$"),
    ] {
        let ctx = Context::new().field(field);
        println!("{source} => {:?}", engine.resolve_first(&ctx, source));
    }
}
