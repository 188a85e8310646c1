use std::sync::Arc;
use std::thread;

use formfill::{Context, Engine, Owner, RuleSpec, RuleStore};

fn main() {
    let store = Arc::new(
        RuleStore::from_specs(vec![
            RuleSpec::equal("signature", "${first}$ ${last}$"),
            RuleSpec::equal("first", "Ada").owner(Owner::Person).subject("p0"),
            RuleSpec::equal("first", "Grace").owner(Owner::Person).subject("p1"),
            RuleSpec::equal("last", "Lovelace").owner(Owner::Person).subject("p0"),
            RuleSpec::equal("last", "Hopper").owner(Owner::Person).subject("p1"),
        ])
        .0,
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let st = Arc::clone(&store);
            thread::spawn(move || {
                // Each thread resolves under its own subject
                let ctx = Context::new().subject(format!("p{}", i % 3));
                let result = Engine::new(&st).resolve_first(&ctx, "${signature}$");
                println!("Thread {i}: {result:?}");
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}
