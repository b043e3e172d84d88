mod benchmarks;

use criterion::criterion_main;

criterion_main!(benchmarks::queue::queue, benchmarks::heap::heap);
