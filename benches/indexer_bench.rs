//! Benchmarks for the Querylens indexer
//!
//! Run with: cargo bench

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use querylens::indexer::*;
use std::sync::Arc;

fn query_texts(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("query number {}", i)).collect()
}

fn bench_interner(c: &mut Criterion) {
    let mut group = c.benchmark_group("interner");
    let texts = query_texts(1000);

    group.throughput(Throughput::Elements(texts.len() as u64));

    group.bench_function("intern_hit_1000", |b| {
        let interner = StringInterner::new();
        for text in &texts {
            interner.intern(text);
        }

        b.iter(|| {
            for text in &texts {
                black_box(interner.intern(black_box(text)));
            }
        })
    });

    group.bench_function("intern_miss_1000", |b| {
        b.iter(|| {
            let interner = StringInterner::with_capacity(texts.len());
            for text in &texts {
                black_box(interner.intern(black_box(text)));
            }
        })
    });

    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking");
    let interner = StringInterner::new();

    // Skewed stream: low query numbers repeat most
    let handles: Vec<InternedHandle> = (0..10_000)
        .map(|i| {
            let rank = (i * 7919) % 100;
            interner.intern(&format!("q{}", rank * rank / 100))
        })
        .collect();

    group.throughput(Throughput::Elements(handles.len() as u64));

    for strategy in [RankingStrategy::Incremental, RankingStrategy::DeferredSort] {
        group.bench_function(format!("record_10000_{:?}", strategy), |b| {
            b.iter(|| {
                let mut ranking = strategy.build();
                for &handle in &handles {
                    ranking.record(handle);
                }
                ranking.settle();
                black_box(ranking.top(10))
            })
        });
    }

    group.finish();
}

fn bench_ranked_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranked_index");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for strategy in [RankingStrategy::Incremental, RankingStrategy::DeferredSort] {
        group.bench_function(format!("add_{:?}", strategy), |b| {
            b.iter_custom(|iters| {
                rt.block_on(async {
                    let interner = Arc::new(StringInterner::new());
                    let config = IndexConfig {
                        strategy,
                        ..IndexConfig::default()
                    };
                    let index = RankedIndex::spawn(Arc::clone(&interner), &config);
                    let handles: Vec<InternedHandle> = (0..100)
                        .map(|i| interner.intern(&format!("q{}", i)))
                        .collect();

                    let start = std::time::Instant::now();

                    for i in 0..iters {
                        index.add(handles[i as usize % handles.len()]).await.unwrap();
                    }

                    start.elapsed()
                })
            })
        });
    }

    group.finish();
}

fn bench_aggregator(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregator");
    let rt = tokio::runtime::Runtime::new().unwrap();

    group.bench_function("add_record", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let aggregator =
                    Aggregator::new(Arc::new(StringInterner::new()), IndexConfig::default());
                let base = Utc.with_ymd_and_hms(2015, 8, 1, 0, 0, 0).unwrap();

                let records: Vec<Record> = (0..1000)
                    .map(|i| {
                        Record::new(base + Duration::seconds(i * 37), format!("q{}", i % 50))
                    })
                    .collect();

                let start = std::time::Instant::now();

                for i in 0..iters {
                    aggregator
                        .add(&records[i as usize % records.len()])
                        .await
                        .unwrap();
                }

                start.elapsed()
            })
        })
    });

    group.bench_function("parse_time_range", |b| {
        let inputs = ["2015", "2015-08", "2015-08-01", "2015-08-01 00", "2015-08-01 00:04"];
        b.iter(|| {
            for input in inputs {
                black_box(TimeRange::parse(black_box(input)).unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_interner,
    bench_ranking,
    bench_ranked_index,
    bench_aggregator
);
criterion_main!(benches);
