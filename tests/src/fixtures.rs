//! # Test Fixtures
//!
//! Seeded working sets so every run writes the same chunks, and scratch
//! index directories that clean up after themselves.

use chunk_index::{
    AddressAppearanceMap, ChunkIndexService, FileRange, IndexConfig, IndexError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared_types::{Address, Appearance};
use std::time::Duration;
use tempfile::TempDir;

/// A chain index living in a temporary directory.
pub struct ScratchIndex {
    pub dir: TempDir,
    pub config: IndexConfig,
}

impl ScratchIndex {
    pub fn new(chain: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = IndexConfig::new()
            .with_index_root(dir.path().join("unchained"))
            .with_cache_root(dir.path().join("cache"))
            .with_chain(chain)
            .with_manifest_version("index-tests")
            .with_snap(1_000, 0)
            .with_lock_timeout(Duration::from_millis(100));
        Self { dir, config }
    }

    pub fn open(&self) -> Result<ChunkIndexService, IndexError> {
        ChunkIndexService::open(self.config.clone())
    }
}

/// Deterministic pseudo-random address.
pub fn address(rng: &mut StdRng) -> Address {
    let mut bytes = [0u8; 20];
    rng.fill(&mut bytes);
    Address(bytes)
}

/// Working set of `addresses` addresses, each appearing 1..=`max_per_address`
/// times inside `range`. Returns the map and its total appearance count.
pub fn working_set(
    seed: u64,
    range: FileRange,
    addresses: usize,
    max_per_address: usize,
) -> (AddressAppearanceMap, usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut map = AddressAppearanceMap::new();
    let mut total = 0;

    while map.len() < addresses {
        let count = rng.gen_range(1..=max_per_address);
        let apps: Vec<Appearance> = (0..count)
            .map(|_| {
                Appearance::new(
                    rng.gen_range(range.first..=range.last) as u32,
                    rng.gen_range(0..300),
                )
            })
            .collect();
        let addr = address(&mut rng);
        total += apps.len();
        if let Some(old) = map.insert(addr, apps) {
            total -= old.len();
        }
    }
    (map, total)
}

/// Every address of the map, for lookups.
pub fn addresses_of(map: &AddressAppearanceMap) -> Vec<Address> {
    map.keys().copied().collect()
}
