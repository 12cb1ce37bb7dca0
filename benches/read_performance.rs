//! Performance benchmarks for settings-monitor.
//!
//! Covers the hot paths:
//! - Lock-free reads of a slot
//! - Reads scaling with concurrent readers
//! - Reads while another thread publishes changes
//! - Cost of absorbing an identical reload versus publishing a change

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde::{Deserialize, Serialize};
use settings_monitor::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct BenchSettings {
    connection_string: String,
    tenant_id: String,
    retry_count: u32,
    scopes: Vec<String>,
}

impl BenchSettings {
    fn sample(n: u32) -> Self {
        Self {
            connection_string: format!("Endpoint=sb://bench-{n}.example"),
            tenant_id: "tenant".to_string(),
            retry_count: n,
            scopes: vec!["read".to_string(), "write".to_string()],
        }
    }
}

fn seeded_monitor() -> SettingsMonitor<BenchSettings> {
    SettingsMonitor::builder()
        .with_slot(SlotName::default(), BenchSettings::sample(0))
        .with_slot("TenantName", BenchSettings::sample(0))
        .build()
        .unwrap()
}

/// Benchmark single-threaded read latency
fn benchmark_read_latency(c: &mut Criterion) {
    let monitor = seeded_monitor();

    let mut group = c.benchmark_group("read_latency");
    group.bench_function("current", |b| {
        b.iter(|| {
            let settings = monitor.current("TenantName").unwrap();
            black_box(&settings.retry_count);
        });
    });
    group.bench_function("fingerprint", |b| {
        b.iter(|| {
            black_box(monitor.fingerprint("TenantName"));
        });
    });
    group.finish();
}

/// Benchmark concurrent reads with varying thread counts
fn benchmark_concurrent_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_reads");

    for num_threads in [1, 2, 4, 8, 16] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let monitor = seeded_monitor();
                let barrier = Arc::new(Barrier::new(num_threads + 1));

                b.iter_custom(|iters| {
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let monitor = monitor.clone();
                            let barrier = Arc::clone(&barrier);
                            thread::spawn(move || {
                                barrier.wait();
                                let start = std::time::Instant::now();
                                for _ in 0..iters {
                                    let settings = monitor.current("").unwrap();
                                    black_box(&settings.retry_count);
                                }
                                start.elapsed()
                            })
                        })
                        .collect();

                    barrier.wait();

                    let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    total / num_threads as u32
                });
            },
        );
    }

    group.finish();
}

/// Benchmark reads while a writer keeps publishing changes
fn benchmark_reads_during_reloads(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads_during_reloads");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("reload_with_8_readers", |b| {
        b.iter_custom(|iters| {
            let monitor = seeded_monitor();
            let running = Arc::new(AtomicBool::new(true));
            let reads = Arc::new(AtomicUsize::new(0));

            let readers: Vec<_> = (0..8)
                .map(|_| {
                    let monitor = monitor.clone();
                    let running = Arc::clone(&running);
                    let reads = Arc::clone(&reads);
                    thread::spawn(move || {
                        while running.load(Ordering::Relaxed) {
                            let settings = monitor.current("").unwrap();
                            black_box(&settings.retry_count);
                            reads.fetch_add(1, Ordering::Relaxed);
                        }
                    })
                })
                .collect();

            let start = std::time::Instant::now();
            for i in 0..iters {
                monitor
                    .on_reload(SlotName::default(), BenchSettings::sample(i as u32 + 1))
                    .unwrap();
            }
            let duration = start.elapsed();

            running.store(false, Ordering::Relaxed);
            for reader in readers {
                reader.join().unwrap();
            }

            black_box(reads.load(Ordering::Relaxed));
            duration
        });
    });

    group.finish();
}

/// Benchmark the reload path itself
fn benchmark_reload(c: &mut Criterion) {
    let mut group = c.benchmark_group("reload");

    group.bench_function("identical_absorbed", |b| {
        let monitor = seeded_monitor();
        b.iter(|| {
            let outcome = monitor
                .on_reload("TenantName", BenchSettings::sample(0))
                .unwrap();
            black_box(outcome);
        });
    });

    group.bench_function("change_published", |b| {
        let monitor = seeded_monitor();
        let _subscription = monitor.subscribe(SlotFilter::Any).unwrap();
        let mut counter = 0;
        b.iter(|| {
            counter += 1;
            let outcome = monitor
                .on_reload("TenantName", BenchSettings::sample(counter))
                .unwrap();
            black_box(outcome);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_read_latency,
    benchmark_concurrent_reads,
    benchmark_reads_during_reloads,
    benchmark_reload,
);

criterion_main!(benches);
