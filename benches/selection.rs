//! Benchmarks for snapshot selection and name parsing.

use std::fs;
use std::path::Path;

use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tempfile::tempdir;

use animdxcc::{
    curate::{Direction, ScanMode, TimeWindow, select},
    schema::SnapshotCodec,
};

/// Every-ten-minutes snapshots, alternating between the two name formats.
fn populate(dir: &Path, count: usize) {
    let codec = SnapshotCodec::default();
    let first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    for i in 0..count {
        let ts = first + Duration::minutes(10 * i as i64);
        let name = if i % 2 == 0 {
            codec.render("EU", ts, None)
        } else {
            format!("dxcc-EU-{}.png", ts.format("%Y%m%d%H%M"))
        };
        fs::write(dir.join(name), b"").unwrap();
    }
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");
    let now = Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap();
    let codec = SnapshotCodec::default();

    for count in [1_000, 10_000] {
        let dir = tempdir().unwrap();
        populate(dir.path(), count);
        let window = TimeWindow::new(now, 120);

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                select(
                    black_box(dir.path()),
                    &window,
                    Direction::KeepIfAfter,
                    ScanMode::Flat,
                    &codec,
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let codec = SnapshotCodec::default();
    let names = [
        "dxcc-EU-202501011230.png",
        "dxcc-EU-20250101T123000-dark.png",
        "dxcc-14-corrupt.png",
    ];

    c.bench_function("parse_names", |b| {
        b.iter(|| {
            for name in names {
                black_box(codec.parse(black_box(name)));
            }
        });
    });
}

criterion_group!(benches, bench_select, bench_parse);
criterion_main!(benches);
