use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ctgbridge::overlap::{Area, InMemoryOverlaps, Overlap};
use ctgbridge::seq::Strand;
use ctgbridge::stats::{StatFilter, StatsEngine};
use rand::Rng;

/// Generate random dovetail overlaps between `num_seqs` sequences
fn generate_overlaps(num_records: usize, num_seqs: u32) -> Vec<Overlap> {
    let mut rng = rand::thread_rng();
    let lens: Vec<u32> = (0..num_seqs).map(|_| rng.gen_range(8000..20000)).collect();

    (0..num_records)
        .map(|_| {
            let a = rng.gen_range(0..num_seqs);
            let b = (a + rng.gen_range(1..num_seqs)) % num_seqs;
            let (la, lb) = (lens[a as usize], lens[b as usize]);
            let span = rng.gen_range(2000..6000);
            let oh = rng.gen_range(0..400);
            Overlap::new(
                Area::new(a, la - span - oh, la - oh, la),
                Area::new(b, oh, oh + span, lb),
                Strand::Forward,
                rng.gen_range(80.0..100.0),
            )
        })
        .collect()
}

fn bench_stats_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats_scan");
    let records = generate_overlaps(200_000, 20_000);
    let filter = StatFilter { identity_floor: 75.0, overhang_floor: 500 };
    group.throughput(Throughput::Elements(records.len() as u64));

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("threads", threads), &records, |b, records| {
            let engine = StatsEngine::new(filter).threads(threads);
            b.iter(|| {
                let stats = engine.compute(&mut InMemoryOverlaps::new(records)).unwrap();
                black_box(stats.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_stats_scan);
criterion_main!(benches);
