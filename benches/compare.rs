//! Comparator and CSV exporter benchmark suite
//!
//! Both sit on the reporting path of every CI regression check, so they are
//! kept honest here:
//! - Evaluation of two results (deltas + report rendering)
//! - CSV series rendering

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pack_bench::compare::{evaluate, Comparison};
use pack_bench::export::Series;
use pack_bench::inventory::FileEntry;
use pack_bench::schema::PackResult;
use std::time::Duration;

fn result(scale: u64, files: usize) -> PackResult {
    let files: Vec<FileEntry> = (0..files)
        .map(|i| FileEntry {
            name: format!("{i:040x}.siva"),
            size: 1_000_000 + i as u64 * scale,
            is_dir: false,
            modified: None,
        })
        .collect();
    let file_size = files.iter().map(|f| f.size).sum();

    PackResult {
        memory: 512 * 1024 * 1024 + scale,
        wtime: Duration::from_secs(120) + Duration::from_millis(scale),
        stime: Duration::from_secs(4),
        utime: Duration::from_secs(95),
        files,
        file_size,
    }
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    let reference = result(0, 100);
    let candidate = result(1_000, 100);

    group.bench_function("comparison", |b| {
        b.iter(|| Comparison::between(black_box(&reference), black_box(&candidate)))
    });

    for allowance in [0.0, 5.0, 50.0] {
        group.bench_with_input(
            BenchmarkId::new("report", allowance),
            &allowance,
            |b, &allowance| {
                b.iter(|| evaluate(black_box(&reference), black_box(&candidate), allowance))
            },
        );
    }

    group.finish();
}

fn bench_series(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_csv");
    let r = result(1_000, 10);

    for series in Series::ALL {
        group.bench_with_input(
            BenchmarkId::from_parameter(series.as_str()),
            &series,
            |b, &series| b.iter(|| black_box(&r).series_csv(series)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_series);
criterion_main!(benches);
