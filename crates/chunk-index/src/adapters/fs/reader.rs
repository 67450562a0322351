//! # Chunk Reader
//!
//! Reads chunk files from disk. Every open checks the magic; the version
//! hash is only compared when a caller asks for it.
//!
//! Address lookups binary-search the address table with positioned reads,
//! so a query touches `O(log A)` records plus one appearance slice rather
//! than the whole file.

use chunk_bloom::{BloomHeader, ChunkBloom};
use shared_types::{Address, Appearance, VersionTag};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::adapters::paths::to_bloom_path;
use crate::domain::chunk::{check_tables, chunk_file_size};
use crate::domain::errors::{IndexError, IoResultExt};
use crate::domain::header::{HeaderRecord, HEADER_SIZE};
use crate::domain::range::FileRange;
use crate::domain::records::{
    decode_table, AddressRecord, FixedRecord, ADDRESS_RECORD_SIZE, APPEARANCE_RECORD_SIZE,
};
use crate::domain::report::AuditReport;

/// Read and decode the 44-byte header, checking only the magic.
pub fn read_header(path: &Path) -> Result<HeaderRecord, IndexError> {
    let mut file = File::open(path).at(path)?;
    read_header_from(&mut file, path)
}

fn read_header_from<R: Read>(reader: &mut R, path: &Path) -> Result<HeaderRecord, IndexError> {
    let mut buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut buf).at(path)?;
    let header = HeaderRecord::decode(&buf);
    header.check_magic(path)?;
    Ok(header)
}

/// Read the header and insist that it carries `expected`.
///
/// ## Errors
///
/// `StaleVersion` when the tag differs, plus everything `read_header` returns.
pub fn read_chunk_header(path: &Path, expected: &VersionTag) -> Result<HeaderRecord, IndexError> {
    let header = read_header(path)?;
    header.check_hash(path, expected)?;
    Ok(header)
}

/// `Ok(false)` when the chunk's tag is not `expected`.
pub fn validate(path: &Path, expected: &VersionTag) -> Result<bool, IndexError> {
    match read_chunk_header(path, expected) {
        Ok(_) => Ok(true),
        Err(IndexError::StaleVersion { found, .. }) => {
            tracing::warn!(
                path = %path.display(),
                expected = %expected,
                found = %found,
                "[chunk-index] chunk carries a stale version tag"
            );
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Load a whole bloom file.
pub fn read_bloom(path: &Path) -> Result<ChunkBloom, IndexError> {
    let file = File::open(path).at(path)?;
    ChunkBloom::read_from(&mut BufReader::new(file)).map_err(|e| IndexError::bloom(path, e))
}

/// Read just the bloom header, checking its magic.
pub fn read_bloom_header(path: &Path) -> Result<BloomHeader, IndexError> {
    let mut file = File::open(path).at(path)?;
    BloomHeader::read_from(&mut file).map_err(|e| IndexError::bloom(path, e))
}

/// An open chunk file.
#[derive(Debug)]
pub struct ChunkReader {
    path: PathBuf,
    file: File,
    header: HeaderRecord,
}

impl ChunkReader {
    /// Open a chunk and read its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).at(&path)?;
        let header = read_header_from(&mut file, &path)?;
        Ok(Self { path, file, header })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &HeaderRecord {
        &self.header
    }

    /// Size the file should have according to its header.
    pub fn expected_size(&self) -> u64 {
        chunk_file_size(
            self.header.address_count as u64,
            self.header.appearance_count as u64,
        )
    }

    pub fn file_size(&self) -> Result<u64, IndexError> {
        Ok(self.file.metadata().at(&self.path)?.len())
    }

    /// Refuse to size buffers from header counts the file cannot back.
    fn ensure_backed(&self) -> Result<(), IndexError> {
        let expected = self.expected_size();
        let actual = self.file_size()?;
        if actual < expected {
            return Err(IndexError::corrupt(
                &self.path,
                format!(
                    "header implies {} bytes ({} addresses, {} appearances), file has {}",
                    expected, self.header.address_count, self.header.appearance_count, actual
                ),
            ));
        }
        Ok(())
    }

    fn appearances_start(&self) -> u64 {
        HEADER_SIZE as u64 + self.header.address_count as u64 * ADDRESS_RECORD_SIZE as u64
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), IndexError> {
        self.file.seek(SeekFrom::Start(offset)).at(&self.path)?;
        self.file.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                IndexError::corrupt(
                    &self.path,
                    format!("truncated: {} bytes at offset {} not present", buf.len(), offset),
                )
            } else {
                IndexError::io(&self.path, e)
            }
        })
    }

    fn address_record(&mut self, index: u32) -> Result<AddressRecord, IndexError> {
        let mut buf = [0u8; ADDRESS_RECORD_SIZE];
        let offset = HEADER_SIZE as u64 + index as u64 * ADDRESS_RECORD_SIZE as u64;
        self.read_exact_at(offset, &mut buf)?;
        Ok(AddressRecord::decode_from(&buf))
    }

    /// The whole address table.
    pub fn address_table(&mut self) -> Result<Vec<AddressRecord>, IndexError> {
        self.ensure_backed()?;
        let mut buf = vec![0u8; self.header.address_count as usize * ADDRESS_RECORD_SIZE];
        self.read_exact_at(HEADER_SIZE as u64, &mut buf)?;
        Ok(decode_table(&buf))
    }

    /// The whole appearance table.
    pub fn appearance_table(&mut self) -> Result<Vec<Appearance>, IndexError> {
        self.ensure_backed()?;
        let mut buf = vec![0u8; self.header.appearance_count as usize * APPEARANCE_RECORD_SIZE];
        let start = self.appearances_start();
        self.read_exact_at(start, &mut buf)?;
        Ok(decode_table(&buf))
    }

    /// Binary search of the address table.
    pub fn find_address(&mut self, address: &Address) -> Result<Option<AddressRecord>, IndexError> {
        let (mut low, mut high) = (0u32, self.header.address_count);
        while low < high {
            let mid = low + (high - low) / 2;
            let record = self.address_record(mid)?;
            match record.address.cmp(address) {
                std::cmp::Ordering::Equal => return Ok(Some(record)),
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
            }
        }
        Ok(None)
    }

    /// The appearance slice an address record points at.
    pub fn appearances_for(&mut self, record: &AddressRecord) -> Result<Vec<Appearance>, IndexError> {
        if record.end() > self.header.appearance_count as u64 {
            return Err(IndexError::corrupt(
                &self.path,
                format!(
                    "address {} points at appearances {}..{} of {}",
                    record.address,
                    record.offset,
                    record.end(),
                    self.header.appearance_count
                ),
            ));
        }
        self.ensure_backed()?;
        let mut buf = vec![0u8; record.count as usize * APPEARANCE_RECORD_SIZE];
        let offset = self.appearances_start() + record.offset as u64 * APPEARANCE_RECORD_SIZE as u64;
        self.read_exact_at(offset, &mut buf)?;
        Ok(decode_table(&buf))
    }

    /// Appearances of `address`, or `None` when it is not in the table.
    pub fn lookup(&mut self, address: &Address) -> Result<Option<Vec<Appearance>>, IndexError> {
        self.ensure_backed()?;
        match self.find_address(address)? {
            Some(record) => Ok(Some(self.appearances_for(&record)?)),
            None => Ok(None),
        }
    }
}

/// Answer to a single-chunk address query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The bloom ruled the address out; the chunk was not opened.
    BloomMiss,
    /// The bloom passed but the address table does not hold the address.
    FalsePositive,
    Found(Vec<Appearance>),
}

impl QueryOutcome {
    pub fn bloom_hit(&self) -> bool {
        !matches!(self, QueryOutcome::BloomMiss)
    }

    pub fn into_appearances(self) -> Option<Vec<Appearance>> {
        match self {
            QueryOutcome::Found(apps) => Some(apps),
            _ => None,
        }
    }
}

/// Query one chunk, consulting `bloom` first when there is one.
pub fn query_address(
    chunk_path: &Path,
    bloom: Option<&ChunkBloom>,
    address: &Address,
) -> Result<QueryOutcome, IndexError> {
    if let Some(bloom) = bloom {
        if !bloom.test(address) {
            tracing::debug!(path = %chunk_path.display(), %address, "[chunk-index] bloom miss");
            return Ok(QueryOutcome::BloomMiss);
        }
    }

    let mut reader = ChunkReader::open(chunk_path)?;
    match reader.lookup(address)? {
        Some(apps) => {
            tracing::debug!(
                path = %chunk_path.display(),
                %address,
                appearances = apps.len(),
                "[chunk-index] bloom hit"
            );
            Ok(QueryOutcome::Found(apps))
        }
        None => {
            tracing::debug!(path = %chunk_path.display(), %address, "[chunk-index] bloom false positive");
            Ok(QueryOutcome::FalsePositive)
        }
    }
}

/// Full structural check of a chunk and the bloom beside it.
///
/// Problems in the tables are collected into the report; only failures to
/// open the chunk at all are returned as errors.
pub fn audit_chunk(
    chunk_path: &Path,
    bloom_path: &Path,
    expected: &VersionTag,
) -> Result<AuditReport, IndexError> {
    let range = FileRange::from_filename(chunk_path)?;
    let mut report = AuditReport::new(chunk_path, range);
    let mut reader = ChunkReader::open(chunk_path)?;
    let header = *reader.header();

    report.tag_current = header.hash == *expected;
    report.address_count = header.address_count;
    report.appearance_count = header.appearance_count;
    report.file_size = reader.file_size()?;
    report.expected_size = reader.expected_size();
    if !report.tag_current {
        report.add_problem(format!("tag {} is not {}", header.hash, expected));
    }
    if report.file_size != report.expected_size {
        report.add_problem(format!(
            "file is {} bytes, header implies {}",
            report.file_size, report.expected_size
        ));
        return Ok(report);
    }

    let addresses = reader.address_table()?;
    let appearances = reader.appearance_table()?;
    for problem in check_tables(&header, &addresses, &appearances, &range) {
        report.add_problem(problem);
    }

    match read_bloom(bloom_path) {
        Ok(bloom) => {
            let missing = addresses.iter().filter(|r| !bloom.test(&r.address)).count();
            if missing > 0 {
                report.add_problem(format!("bloom misses {} addresses", missing));
            }
            if bloom.version_tag() != header.hash {
                report.add_problem(format!(
                    "bloom tag {} differs from chunk tag {}",
                    bloom.version_tag(),
                    header.hash
                ));
            }
            report.bloom_consistent = missing == 0 && bloom.version_tag() == header.hash;
        }
        Err(err) => report.add_problem(format!("bloom unreadable: {}", err)),
    }

    Ok(report)
}

/// `audit_chunk` with the bloom found beside the chunk.
pub fn audit_chunk_at(chunk_path: &Path, expected: &VersionTag) -> Result<AuditReport, IndexError> {
    audit_chunk(chunk_path, &to_bloom_path(chunk_path), expected)
}
