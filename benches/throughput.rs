use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion};
use formfill::{Context, Engine, Owner, RuleKind, RuleSpec, RuleStore};

fn build_shared_store() -> Arc<RuleStore> {
    let mut specs = vec![
        RuleSpec::equal("letter", "Dear ${title}$ ${last}$, re: ${case.ref}$"),
        RuleSpec::equal("title", "Ms."),
        RuleSpec::equal("title", "Dr.").owner(Owner::Person).subject("p1"),
        RuleSpec::new(RuleKind::Similar, "surname", "${last}$").threshold(2),
        RuleSpec::equal("last", "Lovelace"),
        RuleSpec::equal("case.ref", "CR-${case.no}$").owner(Owner::Case),
        RuleSpec::equal("case.no", "2024-17").owner(Owner::Case),
    ];
    for i in 0..20 {
        specs.push(RuleSpec::new(RuleKind::Substring, format!("filler{i}"), "x"));
    }
    Arc::new(RuleStore::from_specs(specs).0)
}

fn bench_throughput(c: &mut Criterion) {
    let thread_counts = [1, 2, 4, 8];

    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(5));

    for &threads in &thread_counts {
        let store = build_shared_store();
        let ctx = Context::new().subject("p1").document("letter-1");

        group.bench_function(&format!("{threads}_threads"), |b| {
            b.iter_custom(|iters| {
                let per_thread = iters / threads as u64;
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let st = Arc::clone(&store);
                        let c = ctx.clone();
                        thread::spawn(move || {
                            let engine = Engine::new(&st);
                            let start = Instant::now();
                            for _ in 0..per_thread {
                                let _ = engine.resolve_first(&c, "${letter}$");
                            }
                            start.elapsed()
                        })
                    })
                    .collect();

                let mut max_elapsed = Duration::ZERO;
                for h in handles {
                    let elapsed = h.join().unwrap();
                    if elapsed > max_elapsed {
                        max_elapsed = elapsed;
                    }
                }
                max_elapsed
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
