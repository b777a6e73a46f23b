use concurrent_queue_rs::ConcurrentQueue;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

// Number of operations per benchmark
const OPS_PER_BENCH: usize = 100_000;

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(OPS_PER_BENCH as u64));

    // Uncontended baseline: one thread pushing then draining.
    group.bench_function(BenchmarkId::new("push_try_pop", "single-thread"), |b| {
        b.iter(|| {
            let queue = ConcurrentQueue::with_capacity(OPS_PER_BENCH);
            for i in 0..OPS_PER_BENCH {
                queue.push(black_box(i as u32));
            }
            while let Some(value) = queue.try_pop() {
                black_box(value);
            }
        })
    });

    // Producer/consumer pairs at different thread counts.
    for &threads in [1, 2, 4].iter() {
        // Skip configurations that would require more than available CPUs
        if threads * 2 > num_cpus::get() {
            continue;
        }

        group.bench_with_input(
            BenchmarkId::new("push_try_pop_for", threads),
            &threads,
            |b, &threads| {
                b.iter(|| {
                    let queue = Arc::new(ConcurrentQueue::new());
                    let barrier = Arc::new(Barrier::new(threads * 2));

                    let mut handles = Vec::with_capacity(threads * 2);

                    // Producers
                    for _ in 0..threads {
                        let q = queue.clone();
                        let b = barrier.clone();
                        handles.push(thread::spawn(move || {
                            b.wait();
                            for i in 0..(OPS_PER_BENCH / threads) {
                                q.push(black_box(i as u32));
                            }
                        }));
                    }

                    // Consumers
                    for _ in 0..threads {
                        let q = queue.clone();
                        let b = barrier.clone();
                        handles.push(thread::spawn(move || {
                            b.wait();
                            for _ in 0..(OPS_PER_BENCH / threads) {
                                black_box(q.try_pop_for(Duration::from_secs(5)));
                            }
                        }));
                    }

                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            },
        );
    }

    // Reader-side scaling: concurrent read guards traversing a fixed queue.
    for &readers in [1, 2, 4].iter() {
        if readers > num_cpus::get() {
            continue;
        }

        group.bench_with_input(
            BenchmarkId::new("read_guard_iteration", readers),
            &readers,
            |b, &readers| {
                let queue = Arc::new((0..1_000u32).collect::<ConcurrentQueue<_>>());
                b.iter(|| {
                    let barrier = Arc::new(Barrier::new(readers));
                    let mut handles = Vec::with_capacity(readers);

                    for _ in 0..readers {
                        let q = queue.clone();
                        let b = barrier.clone();
                        handles.push(thread::spawn(move || {
                            b.wait();
                            let guard = q.read();
                            black_box(guard.iter().sum::<u32>())
                        }));
                    }

                    for handle in handles {
                        black_box(handle.join().unwrap());
                    }
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
