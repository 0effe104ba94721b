//! Unfused vs fused convolution chains over the Pixel-CNN table.
//!
//! Groups are keyed by filter label and batch; one function per variant inside each group.

use std::collections::BTreeMap;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use convfuse::{CpuBackendContext, ExecutionContext};
use convfuse_verify::bench::{bench_table, BenchCase};

fn bench_conv_chains(c: &mut Criterion) {
    let threads = ExecutionContext::new().resolved_num_threads();
    let backend = match CpuBackendContext::new(threads) {
        Ok(backend) => backend,
        Err(err) => panic!("failed to build backend with {threads} threads: {err}"),
    };

    let mut groups: BTreeMap<(usize, usize), Vec<BenchCase>> = BTreeMap::new();
    for case in bench_table() {
        groups.entry((case.fh, case.n)).or_default().push(case);
    }

    for cases in groups.values() {
        let label = &cases[0].label;
        let mut group = c.benchmark_group(format!("conv/{label}"));
        group.sample_size(10);
        group.warm_up_time(Duration::from_millis(500));
        group.measurement_time(Duration::from_secs(5));
        for case in cases {
            let prepared = match case.prepare() {
                Ok(prepared) => prepared,
                Err(err) => panic!("failed to prepare {}: {err:#}", case.name()),
            };
            group.throughput(Throughput::Elements(case.items_processed()));
            group.bench_with_input(
                BenchmarkId::new(case.variant.name(), case.name()),
                &prepared,
                |b, prepared| {
                    b.iter(|| black_box(prepared.run(&backend)));
                },
            );
        }
        group.finish();
    }
}

criterion_group!(benches, bench_conv_chains);
criterion_main!(benches);
