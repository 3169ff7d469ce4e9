//! Performance benchmarks for ferro-gwas
//!
//! Run with: cargo bench
//! Run specific benchmark: cargo bench -- region

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ferro_gwas::index::{IdentifierIndex, ThresholdIndex};
use ferro_gwas::query::{GwasSource, QueryPlan, QueryPlanner};
use ferro_gwas::region::GenomicRange;
use ferro_gwas::vcf::{GwasHeader, VariantRecord};
use tempfile::TempDir;

/// Synthetic summary statistics: `n` SNVs on chromosome 1, 100 bp apart
fn synthetic_records(n: usize) -> Vec<VariantRecord> {
    (0..n)
        .map(|i| {
            let id = format!("rs{}", i + 1);
            // a few strong hits, mostly noise
            let lp = if i % 997 == 0 { 9.0 } else { (i % 13) as f64 * 0.2 };
            VariantRecord::new("1", 10_000 + i as u64 * 100, Some(&id), "A", "G")
                .with_study("bench")
                .with_stats(0.01, 0.005, lp)
                .with_af(0.25)
        })
        .collect()
}

fn synthetic_source(n: usize) -> GwasSource {
    GwasSource::from_records(GwasHeader::default(), synthetic_records(n))
}

// =============================================================================
// Region benchmarks
// =============================================================================

fn bench_region(c: &mut Criterion) {
    let mut group = c.benchmark_group("region");
    let planner = QueryPlanner::in_memory();

    for &n in &[10_000usize, 100_000] {
        let source = synthetic_source(n);
        let plan = QueryPlan::new().region(vec![GenomicRange::new("1", 500_000, 600_000).unwrap()]);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("window", n), &plan, |b, plan| {
            b.iter(|| planner.query(black_box(&source), black_box(plan)).unwrap())
        });
    }
    group.finish();
}

// =============================================================================
// Threshold benchmarks
// =============================================================================

fn bench_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold");
    let dir = TempDir::new().unwrap();
    let records = synthetic_records(100_000);
    let source = GwasSource::from_records(GwasHeader::default(), records.clone());
    let plan = QueryPlan::new().threshold(5e-8);

    let scan = QueryPlanner::in_memory();
    group.bench_function("full_scan", |b| {
        b.iter(|| scan.query(black_box(&source), black_box(&plan)).unwrap())
    });

    let index = ThresholdIndex::build(&records, 1e-5, dir.path().join("bench.pvalidx")).unwrap();
    let indexed = QueryPlanner::in_memory().with_threshold_index(index);
    group.bench_function("index", |b| {
        b.iter(|| indexed.query(black_box(&source), black_box(&plan)).unwrap())
    });
    group.finish();
}

// =============================================================================
// Identifier benchmarks
// =============================================================================

fn bench_identifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("identifier");
    let dir = TempDir::new().unwrap();
    let records = synthetic_records(100_000);
    let source = GwasSource::from_records(GwasHeader::default(), records.clone());
    let ids: Vec<String> = (0..1000).map(|i| format!("rs{}", i * 97 + 1)).collect();
    let plan = QueryPlan::new().ids(&ids);

    let scan = QueryPlanner::in_memory();
    group.throughput(Throughput::Elements(ids.len() as u64));
    group.bench_function("full_scan", |b| {
        b.iter(|| scan.query(black_box(&source), black_box(&plan)).unwrap())
    });

    let index = IdentifierIndex::build(&records, dir.path().join("bench.rsidx")).unwrap();
    let indexed = QueryPlanner::in_memory().with_identifier_index(index);
    group.bench_function("index", |b| {
        b.iter(|| indexed.query(black_box(&source), black_box(&plan)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_region, bench_threshold, bench_identifier);
criterion_main!(benches);
