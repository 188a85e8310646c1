use formfill::{Context, Engine, Owner, RuleKind, RuleSpec, RuleStore};
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG=formfill=debug shows tier selection and candidates.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut store = RuleStore::new();
    let greeting = store
        .add(RuleSpec::equal("greeting", "Dear ${name}$"))
        .expect("valid rule");
    store
        .add(RuleSpec::new(RuleKind::Substring, "name", "${nickname}$"))
        .expect("valid rule");
    store
        .add(RuleSpec::equal("name", "${case.name}$").owner(Owner::Case))
        .expect("valid rule");
    store
        .add(RuleSpec::equal("case.name", "Ada").owner(Owner::Case))
        .expect("valid rule");

    // Rejected: structurally equal to the greeting rule.
    if let Err(err) = store.add(RuleSpec::equal("greeting", "Dear ${name}$")) {
        println!("rejected: {err}");
    }

    let engine = Engine::new(&store);
    let ctx = Context::new();

    match engine.explain(&ctx, "${greeting}$") {
        Some(reason) => {
            println!("{reason}");
            for id in reason.rule_chain() {
                if let Some(rule) = store.get(*id) {
                    println!("  {rule}");
                }
            }
        }
        None => println!("unresolved"),
    }

    println!("depends on `name`:");
    for rule in store.rules_depending_on("name") {
        println!("  {rule}");
    }
    println!("greeting rule is {greeting}");

    let partial = engine.resolve_best(&ctx, "${greeting}$, re: ${subject}$");
    println!("best effort: {partial}");
}
