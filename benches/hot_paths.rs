//! Hot path benchmarks for the mirror controller.
//!
//! Run with: `cargo bench --bench hot_paths`
//! Compare baselines: `cargo bench --bench hot_paths -- --baseline main`
//!
//! Every chunk arrival goes through the operation queue, and every drift
//! tick rebuilds the buffered extent, so these dominate controller cost.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use delay_mirror::mirror::{
    buffer_event_channel, BufferResource, BufferedExtent, DriftConfig, DriftController,
    MemoryBufferResource, MirrorDSTConfig, MirrorDSTHarness, Operation, OperationQueue, Segment,
    TimeRange,
};

/// Append + completion through the serialized queue
fn bench_queue_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("operation_queue");
    group.throughput(Throughput::Elements(1));

    for payload_len in [1024, 16 * 1024] {
        group.bench_function(format!("append_complete_{}", payload_len), |b| {
            let (tx, mut rx) = buffer_event_channel();
            let mut queue = OperationQueue::new();
            queue.attach(MemoryBufferResource::new(usize::MAX, tx));
            let payload = Bytes::from(vec![0u8; payload_len]);
            let mut seq = 0u64;

            b.iter(|| {
                let start = seq as f64 * 0.1;
                let segment = Segment::new(seq, start, 0.1, payload.clone());
                black_box(queue.enqueue(Operation::Append(segment)));
                black_box(queue.on_complete());
                seq += 1;

                // Keep the buffer at a realistic size
                if seq % 1000 == 0 {
                    queue.enqueue(Operation::Remove {
                        start: 0.0,
                        end: start - 30.0,
                    });
                    queue.on_complete();
                    while rx.try_recv().is_ok() {}
                }
            })
        });
    }

    group.finish();
}

/// Extent reconstruction over a full 30s trailing window
fn bench_buffered_extent(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffered_extent");

    for segments in [50u64, 350] {
        let (tx, _rx) = buffer_event_channel();
        let mut resource = MemoryBufferResource::new(usize::MAX, tx);
        for seq in 0..segments {
            let segment = Segment::new(seq, seq as f64 * 0.1, 0.1, vec![0u8; 64]);
            // Immediate mode settles synchronously
            let _ = resource.submit(&Operation::Append(segment));
        }

        group.bench_function(format!("segments_{}", segments), |b| {
            b.iter(|| black_box(resource.buffered_extent()))
        });
    }

    group.finish();
}

/// One drift tick against a contiguous and a gappy extent
fn bench_drift_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("drift_tick");
    group.throughput(Throughput::Elements(1));

    let contiguous = BufferedExtent::from_ranges(vec![TimeRange::new(10.0, 45.0)]);
    let gappy = BufferedExtent::from_ranges(
        (0..50)
            .map(|i| TimeRange::new(i as f64, i as f64 + 0.8))
            .collect(),
    );

    for (name, extent) in [("contiguous", contiguous), ("gappy_50", gappy)] {
        group.bench_function(name, |b| {
            let mut controller = DriftController::new(DriftConfig::default());
            let mut cursor = 40.0;
            b.iter(|| {
                cursor += 0.5;
                if cursor > 44.0 {
                    cursor = 40.0;
                }
                black_box(controller.tick(black_box(cursor), &extent, 5.0))
            })
        });
    }

    group.finish();
}

/// Ten virtual seconds of a fault-free session
fn bench_dst_calm_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("dst");
    group.sample_size(10);

    group.bench_function("calm_10s", |b| {
        b.iter(|| {
            let config = MirrorDSTConfig {
                duration_secs: 10,
                ..MirrorDSTConfig::calm(1)
            };
            let mut harness = MirrorDSTHarness::new(config);
            harness.run();
            black_box(harness.into_result())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_queue_cycle,
    bench_buffered_extent,
    bench_drift_tick,
    bench_dst_calm_run,
);

criterion_main!(benches);
