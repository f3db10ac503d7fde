use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rfewer::file_handler::{LineIndex, LineNumber};
use rfewer::filter::{Filter, PatternMatchSet};
use rfewer::intersect::{intersect_sequences, LineSequence};
use rfewer::progress::NoProgress;
use std::time::Duration;

fn create_log_index(lines: usize) -> LineIndex {
    let log_levels = ["DEBUG", "INFO", "WARN", "ERROR", "FATAL"];
    let services = ["auth", "database", "cache", "payment", "notification"];
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let mut data = String::with_capacity(lines * 64);
    for line_num in 0..lines {
        let level = log_levels[rng.gen_range(0..log_levels.len())];
        let service = services[rng.gen_range(0..services.len())];
        data.push_str(&format!(
            "2024-09-02 {} [{}] request {} took {}ms\n",
            level,
            service,
            line_num,
            rng.gen_range(1..2000)
        ));
    }
    LineIndex::from_bytes(data)
}

/// Ascending sequence keeping each of `1..=universe` with probability `density`
fn random_sequence(rng: &mut ChaCha8Rng, universe: LineNumber, density: f64) -> LineSequence {
    let lines: Vec<LineNumber> = (1..=universe).filter(|_| rng.gen_bool(density)).collect();
    LineSequence::from(lines)
}

fn bench_match_set_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_set_build");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    let index = create_log_index(500_000);
    index.parse_all(&mut NoProgress);

    for expression in ["ERROR", "/error|fatal/i", "/\\d{4}ms/", "!payment"] {
        let filter = Filter::compile(expression).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(expression), &filter, |b, f| {
            b.iter(|| black_box(PatternMatchSet::build(&index, f.clone(), &mut NoProgress).size()));
        });
    }

    group.finish();
}

fn bench_intersection(c: &mut Criterion) {
    let mut group = c.benchmark_group("intersection");
    group.measurement_time(Duration::from_secs(3));

    let universe = 1_000_000;
    for k in [2usize, 3, 5] {
        let mut rng = ChaCha8Rng::seed_from_u64(42 + k as u64);
        let inputs: Vec<LineSequence> = (0..k)
            .map(|_| random_sequence(&mut rng, universe, 0.3))
            .collect();

        group.bench_with_input(BenchmarkId::new("k_way", k), &inputs, |b, inputs| {
            b.iter(|| black_box(intersect_sequences(inputs).len()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_match_set_build, bench_intersection);
criterion_main!(benches);
