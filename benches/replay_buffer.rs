use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use signal_rl::replay_buffer::{ReplayBuffer, Transition};

fn transition(i: usize) -> Transition {
    Transition::new(
        Array1::from_elem(8, i as f32),
        i % 4,
        -(i as f32),
        Array1::from_elem(8, i as f32 + 1.0),
        false,
    )
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_append");
    for &capacity in &[1_000usize, 50_000] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let mut buffer = ReplayBuffer::new(capacity).unwrap();
            let mut i = 0;
            b.iter(|| {
                buffer.append(black_box(transition(i)));
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_sample");
    let mut buffer = ReplayBuffer::new(50_000).unwrap();
    for i in 0..50_000 {
        buffer.append(transition(i));
    }
    let mut rng = StdRng::seed_from_u64(0);
    for &batch_size in &[32usize, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &size| {
            b.iter(|| black_box(buffer.sample(size, &mut rng).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append, bench_sample);
criterion_main!(benches);
