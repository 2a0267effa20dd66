use benchmarks::toy_jets;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use qg_tagger::flatten::{FlattenLayout, Flattener};
use qg_tagger::jet::SampleKind;
use qg_tagger::preprocessing::shapes::shape_table;

fn bench_flatten(c: &mut Criterion) {
    let flattener = Flattener::new(FlattenLayout::default());
    let mut group = c.benchmark_group("flatten");
    for n in [1_000, 10_000].iter() {
        let jets =
            toy_jets(SampleKind::GLUONS_STANDARD, *n, 0).expect("Failed to generate jets");
        group.throughput(Throughput::Elements(*n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &jets, |b, jets| {
            b.iter(|| {
                let table = flattener.flatten(black_box(jets)).expect("Failed to flatten");
                black_box(table)
            });
        });
    }
    group.finish();
}

fn bench_shapes(c: &mut Criterion) {
    let jets = toy_jets(SampleKind::QUARKS_STANDARD, 10_000, 1).expect("Failed to generate jets");
    c.bench_function("jet_shapes_10000", |b| {
        b.iter(|| black_box(shape_table(black_box(&jets)).expect("Failed to compute shapes")));
    });
}

criterion_group!(benches, bench_flatten, bench_shapes);
criterion_main!(benches);
