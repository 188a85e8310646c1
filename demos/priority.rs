use formfill::{Context, Engine, Owner, RuleSpec, RuleStore};

fn main() {
    // Tiers for one key: header rules of the active subject, then rules
    // scoped to the current document, then personal, case and general rules.
    let (store, _) = RuleStore::from_specs(vec![
        RuleSpec::equal("address", "general street 1"),
        RuleSpec::equal("address", "case street 2").owner(Owner::Case),
        RuleSpec::equal("address", "personal street 3")
            .owner(Owner::Person)
            .subject("ada"),
        RuleSpec::equal("address", "header street 4")
            .owner(Owner::Header)
            .subject("grace"),
        RuleSpec::equal("address", "scoped street 5").scope(["tax"]),
    ]);
    let engine = Engine::new(&store);

    let contexts = [
        ("No subject", Context::new()),
        ("Ada", Context::new().subject("ada")),
        ("Grace", Context::new().subject("grace")),
        ("Ada on tax form", Context::new().subject("ada").document("tax-2024")),
    ];

    for (label, ctx) in &contexts {
        let candidates = engine.candidates_for(ctx, "address");
        let chosen = engine.resolve_first(ctx, "${address}$");
        println!("{label}: {chosen:?} from {candidates:?}");
    }
}
