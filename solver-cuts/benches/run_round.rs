//! Round throughput on synthetic knapsack and flow instances.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use solver_cuts::{
    Constraint, CutManager, CutSettings, LinearConstraint, NoTimeLimit, RelaxationSnapshot,
    SnapshotBuilder, VarId,
};
use std::hint::black_box;

/// Deterministic pseudo-random stream so every run sees the same instance.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> i64 {
        (self.next() % n) as i64
    }

    fn unit(&mut self) -> f64 {
        self.next() as f64 / (1u64 << 31) as f64
    }
}

/// `rows` knapsack rows and `rows` flow rows over `vars` binaries each.
fn instance(rows: usize, vars: usize) -> (RelaxationSnapshot, Vec<Constraint>) {
    let mut rng = Lcg(0x5eed);
    let mut builder = SnapshotBuilder::new(0);
    let mut constraints = Vec::with_capacity(2 * rows);

    let binaries: Vec<VarId> = (0..vars).map(|_| builder.add_binary(rng.unit())).collect();
    for _ in 0..rows {
        let terms: Vec<(i64, VarId)> = binaries
            .iter()
            .map(|&x| (1 + rng.below(40), x))
            .collect();
        let total: i64 = terms.iter().map(|&(a, _)| a).sum();
        if let Ok(row) = LinearConstraint::less_or_equal(terms, total / 2) {
            constraints.push(row.into());
        }
    }

    for _ in 0..rows {
        let mut terms = Vec::with_capacity(vars);
        for &x in binaries.iter().take(vars / 2) {
            let cap = 1 + rng.below(20);
            let y = builder.add_continuous(rng.unit() * cap as f64, Some(0), Some(cap));
            builder.add_implied_bound(y, x, cap);
            terms.push((1, y));
        }
        if let Ok(row) = LinearConstraint::less_or_equal(terms, 10 + rng.below(30)) {
            constraints.push(row.into());
        }
    }

    (builder.build(), constraints)
}

fn bench_run_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_round");

    for &(rows, vars) in &[(10, 20), (50, 50), (200, 100)] {
        let (snapshot, constraints) = instance(rows, vars);
        group.throughput(Throughput::Elements(constraints.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{rows}x{vars}")),
            &(snapshot, constraints),
            |b, (snapshot, constraints)| {
                b.iter(|| {
                    let mut manager = CutManager::new(CutSettings::default()).unwrap();
                    let cuts = manager
                        .run_round(black_box(snapshot), black_box(constraints), &NoTimeLimit)
                        .unwrap();
                    black_box(cuts)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_run_round);
criterion_main!(benches);
