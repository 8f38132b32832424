use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::fs::File;
use std::hint::black_box;
use std::os::fd::AsRawFd;
use std::path::PathBuf;

use dentsort::{Arena, list_dir, list_dir_via_stream};

fn populated_dir(entry_count: usize) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dentsort_bench_{entry_count}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    for i in 0..entry_count {
        // mixed-case so the insensitive comparator earns its keep
        let name = if i % 3 == 0 {
            format!("File_{i:05}.dat")
        } else {
            format!("file_{i:05}.dat")
        };
        std::fs::write(dir.join(name), "").unwrap();
    }
    dir
}

fn bench_list_dir(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_dir");
    for entry_count in [64usize, 1024, 8192] {
        let dir = populated_dir(entry_count);
        group.throughput(Throughput::Elements(entry_count as u64));

        for (mode, case_sensitive) in [("case_sensitive", true), ("case_insensitive", false)] {
            group.bench_with_input(
                BenchmarkId::new(mode, entry_count),
                &entry_count,
                |b, _| {
                    b.iter(|| {
                        // reopen each round: the raw reader consumes the
                        // directory cursor
                        let handle = File::open(&dir).unwrap();
                        let arena = Arena::new();
                        let mut entries = Vec::with_capacity(entry_count);
                        list_dir(handle.as_raw_fd(), &arena, &mut entries, case_sensitive)
                            .unwrap();
                        black_box(entries.len())
                    });
                },
            );
        }

        group.bench_with_input(
            BenchmarkId::new("stream_fallback", entry_count),
            &entry_count,
            |b, _| {
                b.iter(|| {
                    let handle = File::open(&dir).unwrap();
                    let arena = Arena::new();
                    let mut entries = Vec::with_capacity(entry_count);
                    list_dir_via_stream(handle.as_raw_fd(), &arena, &mut entries, true).unwrap();
                    black_box(entries.len())
                });
            },
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
    group.finish();
}

fn bench_arena_reuse(c: &mut Criterion) {
    let dir = populated_dir(1024);
    let mut group = c.benchmark_group("arena_reuse");
    group.throughput(Throughput::Elements(1024));

    // one warm arena reset between calls vs a cold arena per call
    group.bench_function("reset_between_calls", |b| {
        let mut arena = Arena::new();
        b.iter(|| {
            let handle = File::open(&dir).unwrap();
            let mut entries = Vec::with_capacity(1024);
            list_dir(handle.as_raw_fd(), &arena, &mut entries, true).unwrap();
            let n = entries.len();
            drop(entries);
            arena.reset();
            black_box(n)
        });
    });
    group.bench_function("fresh_arena_per_call", |b| {
        b.iter(|| {
            let handle = File::open(&dir).unwrap();
            let arena = Arena::new();
            let mut entries = Vec::with_capacity(1024);
            list_dir(handle.as_raw_fd(), &arena, &mut entries, true).unwrap();
            black_box(entries.len())
        });
    });

    group.finish();
    let _ = std::fs::remove_dir_all(&dir);
}

criterion_group!(benches, bench_list_dir, bench_arena_reuse);
criterion_main!(benches);
