use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gridcalc_common::CellAddress;
use gridcalc_eval::engine::{Engine, EvalConfig};

/// `A1` is an input; every `A(n)` adds one to the cell above.
fn chain(length: u32) -> Engine {
    let mut engine = Engine::new(EvalConfig::default().with_rng_seed(1));
    let _ = engine.set_value(CellAddress::new(0, 0), 1.0);
    for row in 1..length {
        let _ = engine.set_formula(CellAddress::new(row, 0), &format!("=A{row}+1"));
    }
    engine.recalculate();
    engine
}

/// `B(n) = SUM(A1:A(n))` over a column of inputs.
fn prefix_sums(length: u32) -> Engine {
    let mut engine = Engine::new(EvalConfig::default().with_rng_seed(1));
    for row in 0..length {
        let _ = engine.set_value(CellAddress::new(row, 0), f64::from(row));
        let _ = engine.set_formula(CellAddress::new(row, 1), &format!("=SUM(A1:A{})", row + 1));
    }
    engine.recalculate();
    engine
}

fn bench_recalc(c: &mut Criterion) {
    let mut group = c.benchmark_group("Recalc");

    for n in [100u32, 1000, 5000] {
        // one edit at the root dirties the whole chain
        group.bench_with_input(BenchmarkId::new("Chain/EditRoot", n), &n, |b, &n| {
            b.iter_batched(
                || chain(n),
                |mut engine| {
                    let _ = engine.set_value(CellAddress::new(0, 0), black_box(2.0));
                    engine.recalculate()
                },
                BatchSize::LargeInput,
            )
        });

        // an edit at the tail touches one vertex
        group.bench_with_input(BenchmarkId::new("Chain/EditTail", n), &n, |b, &n| {
            b.iter_batched(
                || chain(n),
                |mut engine| {
                    let _ = engine.set_formula(CellAddress::new(n - 1, 0), black_box("=7"));
                    engine.recalculate()
                },
                BatchSize::LargeInput,
            )
        });
    }

    for n in [100u32, 500] {
        group.bench_with_input(BenchmarkId::new("PrefixSums/EditFirst", n), &n, |b, &n| {
            b.iter_batched(
                || prefix_sums(n),
                |mut engine| {
                    let _ = engine.set_value(CellAddress::new(0, 0), black_box(10.0));
                    engine.recalculate()
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.bench_function("Build/Chain1000", |b| b.iter(|| chain(black_box(1000))));

    group.finish();
}

criterion_group!(benches, bench_recalc);
criterion_main!(benches);
