//! # Chunk Index Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Bloom | insert / test one address | < 5μs |
//! | Chunk | build tables for 50k addresses | < 100ms |
//! | Query | bloom miss on one chunk | < 1ms |
//! | Query | table hit on one chunk | < 1ms |

use chunk_bloom::ChunkBloom;
use chunk_index::{CancellationFlag, ChunkData, ChunkIndexApi, FileRange, VersionTag};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use index_tests::fixtures::{address, addresses_of, working_set, ScratchIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

// ============================================================================
// BLOOM
// ============================================================================

fn bench_bloom(c: &mut Criterion) {
    let mut group = c.benchmark_group("bloom");
    let tag = VersionTag::from_manifest_version("bench");
    let mut rng = StdRng::seed_from_u64(1);
    let addresses: Vec<_> = (0..10_000).map(|_| address(&mut rng)).collect();

    group.throughput(Throughput::Elements(addresses.len() as u64));
    group.bench_function("insert_10k", |b| {
        b.iter(|| black_box(ChunkBloom::from_addresses(tag, addresses.iter())))
    });

    let bloom = ChunkBloom::from_addresses(tag, addresses.iter());
    let lookups: Vec<_> = (0..10_000).map(|_| address(&mut rng)).collect();
    group.bench_function("test_10k_absent", |b| {
        b.iter(|| black_box(lookups.iter().filter(|a| bloom.test(a)).count()))
    });

    group.finish();
}

// ============================================================================
// CHUNK BUILD
// ============================================================================

fn bench_chunk_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_build");
    group.measurement_time(Duration::from_secs(10));
    let tag = VersionTag::from_manifest_version("bench");

    for size in [1_000usize, 10_000, 50_000] {
        let (map, total) = working_set(size as u64, FileRange::new(0, 99_999), size, 4);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("build", size), &(map, total), |b, (map, total)| {
            b.iter(|| black_box(ChunkData::build(tag, map, *total).map(|c| c.file_size())))
        });
    }

    group.finish();
}

// ============================================================================
// QUERY
// ============================================================================

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let scratch = ScratchIndex::new("bench");
    let index = scratch.open().expect("open index");
    let range = FileRange::new(0, 99_999);
    let (map, total) = working_set(42, range, 20_000, 4);
    index
        .write_chunk(range, &map, total, &CancellationFlag::new())
        .expect("write chunk");

    let present = addresses_of(&map)[7];
    let mut rng = StdRng::seed_from_u64(99);
    let absent = address(&mut rng);

    group.bench_function("bloom_miss", |b| {
        b.iter(|| black_box(index.query_address(range, &absent).ok()))
    });
    group.bench_function("table_hit", |b| {
        b.iter(|| black_box(index.query_address(range, &present).ok()))
    });

    group.finish();
}

criterion_group!(benches, bench_bloom, bench_chunk_build, bench_query);
criterion_main!(benches);
