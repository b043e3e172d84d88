use criterion::{black_box, criterion_group, Criterion};
use saio::CircularQueue;

criterion_group!(queue, push_pop_churn, sustained_push);

fn push_pop_churn(c: &mut Criterion) {
    c.bench_function("circular queue push/pop churn", |b| {
        b.iter(|| {
            let mut q = CircularQueue::new();
            for i in 0..1000u64 {
                q.push(i);
                if i % 3 == 0 {
                    black_box(q.pop());
                }
            }
            while q.pop().is_some() {}
        });
    });
}

fn sustained_push(c: &mut Criterion) {
    c.bench_function("circular queue sustained push (forces growth)", |b| {
        b.iter(|| {
            let mut q = CircularQueue::with_capacity(4);
            for i in 0..10_000u64 {
                q.push(black_box(i));
            }
            black_box(q.len());
        });
    });
}
