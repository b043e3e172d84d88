use criterion::{black_box, criterion_group, Criterion};
use saio::heap::{EMRadixHeap, RadixHeap};
use saio::{BufferConfig, Digits, HeapConfig};

criterion_group!(heap, internal_sorted_drain, external_sorted_drain);

fn internal_sorted_drain(c: &mut Criterion) {
    let mut keys: Vec<u64> = (0..20_000).map(|i| (i * 2654435761) & 0xffff_ffff).collect();
    keys.sort_unstable();

    c.bench_function("internal radix heap push+drain, 20k keys", |b| {
        b.iter(|| {
            let mut heap = RadixHeap::new();
            for &k in &keys {
                heap.push(k, ()).unwrap();
            }
            while let Some(item) = heap.pop() {
                black_box(item);
            }
        });
    });
}

fn external_sorted_drain(c: &mut Criterion) {
    let mut keys: Vec<u64> = (0..20_000).map(|i| (i * 48271) % 5_000_003).collect();
    keys.sort_unstable();
    let tmp = std::env::temp_dir().join("saio-bench-heap");

    c.bench_function("external radix heap push+drain, 20k keys", |b| {
        b.iter(|| {
            let digits = Digits::uniform(8, 64).unwrap();
            let heap_config = HeapConfig::new(1 << 16, &tmp);
            let mut heap =
                EMRadixHeap::<u32>::new(digits, heap_config, BufferConfig::default()).unwrap();
            for &k in &keys {
                heap.push(k, k as u32).unwrap();
            }
            while let Some(item) = heap.pop().unwrap() {
                black_box(item);
            }
        });
    });

    let _ = std::fs::remove_dir_all(&tmp);
}
