//! # Index Flows
//!
//! The life of a chain's index as a scraper drives it:
//!
//! 1. **Write**: consolidate working sets into chunks and blooms
//! 2. **Query**: single-chunk lookups and whole-chain scans
//! 3. **Tag**: move every chunk to a new manifest version in place
//! 4. **Decache**: drop what a reorg invalidates

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;
    use std::sync::Arc;

    use chunk_index::adapters::fs::list_ranges;
    use chunk_index::{CancellationFlag, ChunkIndexApi, ChunkReader, FileRange, VersionTag};
    use shared_types::Appearance;

    use crate::fixtures::{addresses_of, working_set, ScratchIndex};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const RANGES: [(u64, u64); 4] = [(0, 1_000), (1_001, 2_000), (2_001, 2_999), (3_000, 3_500)];

    fn ranges() -> Vec<FileRange> {
        RANGES.iter().map(|&(f, l)| FileRange::new(f, l)).collect()
    }

    // =============================================================================
    // WRITE → QUERY
    // =============================================================================

    #[test]
    fn test_written_chunks_answer_queries() {
        let scratch = ScratchIndex::new("flows");
        let index = scratch.open().unwrap();

        for (seed, range) in ranges().into_iter().enumerate() {
            let (map, total) = working_set(seed as u64, range, 200, 6);
            let report = index
                .write_chunk(range, &map, total, &CancellationFlag::new())
                .unwrap();
            assert_eq!(report.address_count, 200);
            assert_eq!(report.appearance_count as usize, total);
            assert_eq!(report.snapped, range.last % 1_000 == 0);

            for address in addresses_of(&map).iter().take(25) {
                let mut expected = map[address].clone();
                expected.sort();
                assert_eq!(index.query_address(range, address).unwrap(), Some(expected));
            }

            let audit = index.audit(range, &index.version_tag()).unwrap();
            assert!(audit.is_healthy(), "{:?}", audit.problems);
        }
    }

    #[test]
    fn test_scan_merges_every_chunk() {
        let scratch = ScratchIndex::new("flows");
        let index = scratch.open().unwrap();

        // The same address shows up in two chunks.
        let (first, first_total) = working_set(10, FileRange::new(0, 999), 50, 3);
        let (mut second, mut second_total) = working_set(11, FileRange::new(1_000, 1_999), 50, 3);
        let shared = addresses_of(&first)[0];
        let extra = vec![Appearance::new(1_500, 2), Appearance::new(1_200, 9)];
        second_total += extra.len();
        second.insert(shared, extra.clone());

        index
            .write_chunk(FileRange::new(0, 999), &first, first_total, &CancellationFlag::new())
            .unwrap();
        index
            .write_chunk(
                FileRange::new(1_000, 1_999),
                &second,
                second_total,
                &CancellationFlag::new(),
            )
            .unwrap();

        let expected: BTreeSet<Appearance> =
            first[&shared].iter().chain(extra.iter()).copied().collect();
        let found = index.find_appearances(&shared).unwrap();
        assert_eq!(found, expected.into_iter().collect::<Vec<_>>());
    }

    // =============================================================================
    // TAG
    // =============================================================================

    #[test]
    fn test_tag_all_moves_chain_to_new_version() {
        let scratch = ScratchIndex::new("flows");
        let index = scratch.open().unwrap();
        let mut tables = Vec::new();

        for (seed, range) in ranges().into_iter().enumerate() {
            let (map, total) = working_set(100 + seed as u64, range, 120, 4);
            index
                .write_chunk(range, &map, total, &CancellationFlag::new())
                .unwrap();
            let bytes = fs::read(index.chunk_path(&range)).unwrap();
            tables.push((range, bytes[36..].to_vec(), map));
        }

        let next = VersionTag::from_manifest_version("trueblocks-core@v3.0.0-release");
        assert_eq!(index.tag_all(&next).unwrap(), RANGES.len());
        assert_eq!(index.tag_all(&next).unwrap(), 0);

        for (range, table_bytes, map) in tables {
            assert!(index.validate(range, &next).unwrap());
            assert!(!index.validate(range, &index.version_tag()).unwrap());

            let bytes = fs::read(index.chunk_path(&range)).unwrap();
            assert_eq!(bytes[36..], table_bytes[..]);

            let address = addresses_of(&map)[0];
            assert!(index.query_address(range, &address).unwrap().is_some());
            assert!(index.audit(range, &next).unwrap().is_healthy());
        }
    }

    // =============================================================================
    // DECACHE
    // =============================================================================

    #[test]
    fn test_reorg_decache_then_rewrite() {
        let scratch = ScratchIndex::new("flows");
        let index = scratch.open().unwrap();
        let mut maps = Vec::new();
        for (seed, range) in ranges().into_iter().enumerate() {
            let (map, total) = working_set(200 + seed as u64, range, 40, 2);
            index
                .write_chunk(range, &map, total, &CancellationFlag::new())
                .unwrap();
            maps.push(map);
        }

        let reorg = FileRange::reorg_from(2_500);
        let plan = index.decache(&[reorg]).unwrap();
        assert_eq!(plan.chunks.len(), 2);
        assert_eq!(plan.blooms.len(), 2);

        let (_, outcome) = index.decache_and_remove(&[reorg]).unwrap();
        assert_eq!(outcome.removed.len(), 4);
        assert!(outcome.missing.is_empty());

        let survivors: Vec<FileRange> = list_ranges(&index.index_dir(), "bin")
            .unwrap()
            .into_iter()
            .map(|(r, _)| r)
            .collect();
        assert_eq!(survivors, vec![FileRange::new(0, 1_000), FileRange::new(1_001, 2_000)]);

        // Rewriting after the reorg leaves a consistent chain.
        let range = FileRange::new(2_001, 2_999);
        let (map, total) = working_set(999, range, 40, 2);
        index
            .write_chunk(range, &map, total, &CancellationFlag::new())
            .unwrap();
        let mut reader = ChunkReader::open(index.chunk_path(&range)).unwrap();
        assert_eq!(reader.header().address_count, 40);
        assert_eq!(reader.address_table().unwrap().len(), 40);
        let dropped = addresses_of(&maps[3])[0];
        assert!(index.find_appearances(&dropped).unwrap().is_empty());
    }

    // =============================================================================
    // CONCURRENCY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_background_writes_in_parallel() {
        let scratch = ScratchIndex::new("flows");
        let index = Arc::new(scratch.open().unwrap());

        let tasks: Vec<_> = ranges()
            .into_iter()
            .enumerate()
            .map(|(seed, range)| {
                let (map, total) = working_set(300 + seed as u64, range, 80, 3);
                Arc::clone(&index).spawn_write(range, map, total)
            })
            .collect();

        for task in tasks {
            let range = task.range();
            let report = task.join().await.unwrap();
            assert_eq!(report.range, range);
            assert!(index.chunk_path(&range).exists());
        }

        let snapshot = index.metrics().snapshot();
        assert_eq!(snapshot.chunks_written, RANGES.len() as u64);
        assert!(fs::read_dir(index.tmp_dir()).unwrap().next().is_none());
    }
}
