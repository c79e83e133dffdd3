use criterion::{black_box, criterion_group, criterion_main, Criterion};
use netcheck_smt::constraints::Constraints;
use netcheck_smt::sorts::SmtSort;
use netcheck_smt::terms::SmtTerm;

fn chain(n: usize) -> Constraints {
    let mut c = Constraints::new();
    for i in 0..n {
        let permitted = c.declare(format!("p_{i}"), SmtSort::Bool);
        let metric = c.declare(format!("m_{i}"), SmtSort::Int);
        c.assert(permitted.implies(metric.clone().ge(SmtTerm::int(0))));
        if i > 0 {
            let prev = SmtTerm::var(format!("m_{}", i - 1));
            c.assert(metric.eq(prev.add(SmtTerm::int(1))));
        }
    }
    c
}

fn bench_accumulate_chain_256(c: &mut Criterion) {
    c.bench_function("accumulate_chain_256", |b| b.iter(|| chain(black_box(256))));
}

fn bench_extend_duplicate_chain(c: &mut Criterion) {
    let base = chain(256);
    c.bench_function("extend_duplicate_chain_256", |b| {
        b.iter(|| {
            let mut merged = base.clone();
            merged.extend(black_box(&base));
            merged
        })
    });
}

criterion_group!(benches, bench_accumulate_chain_256, bench_extend_duplicate_chain);
criterion_main!(benches);
