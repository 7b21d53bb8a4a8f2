use criterion::{criterion_group, criterion_main, Criterion};
macro_rules! create_test {
    ($Arc:ident) => {
        use rayon::prelude::*;

        const HANDLES: usize = 1 << 14;

        fn hammer(shared: &$Arc<u64>) -> u64 {
            (0..HANDLES)
                .into_par_iter()
                .map(|_| {
                    let handle = $Arc::clone(shared);
                    *handle
                })
                .sum()
        }
    };
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("allocrc_arc_contention", |b| {
        use allocrc::Arc;
        create_test!(Arc);
        let shared = Arc::new(1u64);
        b.iter(|| hammer(&shared))
    });
    c.bench_function("std_arc_contention", |b| {
        use std::sync::Arc;
        create_test!(Arc);
        let shared = Arc::new(1u64);
        b.iter(|| hammer(&shared))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
