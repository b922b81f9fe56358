// Copyright (c) 2018 Aleksandr Bezobchuk
// Copyright (c) 2022 Alexis Sellier
//
// Licensed under the MIT license.

//! A counting Bloom filter with `k` independently seeded hash functions.

use std::borrow::Cow;
use std::f64::consts::LN_2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::counters::CounterVec;
use crate::error::{Error, Result};
use crate::hash::HashKind;

/// The default false positive probability value, 1%.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;

/// `ln` squared.
const LN_SQR: f64 = LN_2 * LN_2;

/// Leading bytes of a persisted filter.
const MAGIC: [u8; 4] = *b"MBLM";

/// Current persisted format version.
const VERSION: u8 = 1;

/// A counting Bloom filter.
///
/// Every slot is an 8-bit saturating counter. Adding an item increments the
/// `k` slots it hashes to; checking an item returns the smallest of those
/// counters. A result of `0` means the item was never added.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountingBloomFilter {
    counters: CounterVec,
    nhashes: u32,
    hasher: HashKind,
}

impl CountingBloomFilter {
    /// Return an empty filter with `size` slots and `hash_count` hash functions,
    /// using the default hash family.
    pub fn new(size: usize, hash_count: usize) -> Result<Self> {
        Self::with_hasher(size, hash_count, HashKind::default())
    }

    /// Return an empty filter using the given hash family.
    pub fn with_hasher(size: usize, hash_count: usize, hasher: HashKind) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidArgument(
                "filter size must be positive".to_owned(),
            ));
        }
        if hash_count == 0 {
            return Err(Error::InvalidArgument(
                "hash count must be positive".to_owned(),
            ));
        }
        let nhashes = u32::try_from(hash_count).map_err(|_| {
            Error::InvalidArgument(format!("hash count {hash_count} is too large"))
        })?;

        Ok(Self {
            counters: CounterVec::new(size),
            nhashes,
            hasher,
        })
    }

    /// Return an empty filter sized for `capacity` items at the given false
    /// positive rate.
    pub fn with_rate(capacity: usize, fp_rate: f64) -> Result<Self> {
        let (size, hash_count) = calculate_size_and_hash_count(capacity, fp_rate)?;

        Self::new(size, hash_count)
    }

    /// Add an item, incrementing each of its `k` counters. Counters saturate at 255.
    pub fn add<T: AsRef<[u8]> + ?Sized>(&mut self, item: &T) {
        let bytes = item.as_ref();

        for seed in 0..self.nhashes {
            let index = self.hasher.index(bytes, seed, self.counters.len());
            self.counters.increment(index);
        }
    }

    /// Return the smallest counter across the item's `k` slots.
    ///
    /// `0` means the item was definitely never added. Any other value means the
    /// item is possibly present, with a false positive probability bounded by
    /// the rate the filter was sized for.
    pub fn check<T: AsRef<[u8]> + ?Sized>(&self, item: &T) -> u8 {
        let bytes = item.as_ref();
        let mut min = u8::MAX;

        for seed in 0..self.nhashes {
            let index = self.hasher.index(bytes, seed, self.counters.len());
            let count = self.counters.get(index);
            if count == 0 {
                return 0;
            }
            min = min.min(count);
        }
        min
    }

    /// Return whether or not a given item is likely in the filter.
    pub fn contains<T: AsRef<[u8]> + ?Sized>(&self, item: &T) -> bool {
        self.check(item) > 0
    }

    /// Return the number of counter slots in this filter.
    pub fn size(&self) -> usize {
        self.counters.len()
    }

    /// Number of hashes used (`k` parameter).
    pub fn hashes(&self) -> usize {
        self.nhashes as usize
    }

    /// The hash family placing items in this filter.
    pub fn hasher(&self) -> HashKind {
        self.hasher
    }

    /// Estimate the number of distinct items added to the filter.
    pub fn estimated_len(&self) -> usize {
        let size = self.counters.len() as f64;
        let occupied = self.counters.count_nonzero() as f64;
        let nhashes = f64::from(self.nhashes);
        let count = -(size / nhashes) * (1. - (occupied / size)).ln();

        count.round() as usize
    }

    /// Fraction of slots holding a non-zero counter.
    pub fn fill_ratio(&self) -> f64 {
        self.counters.count_nonzero() as f64 / self.counters.len() as f64
    }

    /// Return the underlying counters, one byte per slot.
    pub fn as_bytes(&self) -> &[u8] {
        self.counters.as_bytes()
    }

    /// Serialize the filter into `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let snapshot = Snapshot {
            magic: MAGIC,
            version: VERSION,
            hash: self.hasher.tag(),
            size: self.counters.len() as u64,
            hash_count: self.nhashes,
            counters: Cow::Borrowed(self.counters.as_bytes()),
        };
        bincode::serialize_into(writer, &snapshot)
            .map_err(|e| Error::Persistence(format!("unable to encode filter: {e}")))
    }

    /// Deserialize a filter previously written with [`CountingBloomFilter::write_to`].
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let snapshot: Snapshot<'static> = bincode::deserialize_from(reader)
            .map_err(|e| Error::Persistence(format!("unable to decode filter: {e}")))?;

        if snapshot.magic != MAGIC {
            return Err(Error::Persistence("not a persisted filter".to_owned()));
        }
        if snapshot.version != VERSION {
            return Err(Error::Persistence(format!(
                "unsupported format version {}",
                snapshot.version
            )));
        }
        let hasher = HashKind::from_tag(snapshot.hash).ok_or_else(|| {
            Error::Persistence(format!("unknown hash function tag {}", snapshot.hash))
        })?;
        if snapshot.size == 0 || snapshot.hash_count == 0 {
            return Err(Error::Persistence(
                "filter size and hash count must be positive".to_owned(),
            ));
        }
        if snapshot.counters.len() as u64 != snapshot.size {
            return Err(Error::Persistence(format!(
                "expected {} counters, found {}",
                snapshot.size,
                snapshot.counters.len()
            )));
        }

        Ok(Self {
            counters: CounterVec::from(snapshot.counters.into_owned()),
            nhashes: snapshot.hash_count,
            hasher,
        })
    }

    /// Persist the filter to a file at `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            Error::Persistence(format!("unable to create {}: {e}", path.display()))
        })?;
        let mut writer = BufWriter::new(file);

        self.write_to(&mut writer)?;
        writer.flush().map_err(|e| {
            Error::Persistence(format!("unable to write {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), size = self.size(), "saved filter");

        Ok(())
    }

    /// Load a filter persisted with [`CountingBloomFilter::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Persistence(format!("unable to open {}: {e}", path.display()))
        })?;
        let filter = Self::read_from(BufReader::new(file)).map_err(|e| match e {
            Error::Persistence(reason) => {
                Error::Persistence(format!("{}: {reason}", path.display()))
            }
            other => other,
        })?;
        debug!(path = %path.display(), size = filter.size(), "loaded filter");

        Ok(filter)
    }
}

/// On-disk layout of a filter.
#[derive(Serialize, Deserialize)]
struct Snapshot<'a> {
    magic: [u8; 4],
    version: u8,
    hash: u8,
    size: u64,
    hash_count: u32,
    counters: Cow<'a, [u8]>,
}

/// Return the slot count and hash count for a filter expected to hold
/// `capacity` items at false positive rate `fp_rate`.
pub fn calculate_size_and_hash_count(capacity: usize, fp_rate: f64) -> Result<(usize, usize)> {
    if capacity == 0 {
        return Err(Error::InvalidArgument(
            "cannot size a filter for zero items".to_owned(),
        ));
    }
    if !(fp_rate > 0. && fp_rate < 1.) {
        return Err(Error::InvalidArgument(format!(
            "false positive rate must be within (0, 1), got {fp_rate}"
        )));
    }
    let size = optimal_size(capacity, fp_rate).max(1);
    let hash_count = optimal_hashes(size, capacity).max(1);

    Ok((size, hash_count))
}

/// Return the optimal number of slots for a filter given an approximate
/// item count and a desired false positive rate.
///
/// Also called `m`.
pub fn optimal_size(capacity: usize, fp_rate: f64) -> usize {
    (-((fp_rate.ln() * (capacity as f64)) / LN_SQR)).ceil() as usize
}

/// Return the optimal number of hash functions for a filter given a
/// slot count and an approximate item count.
///
/// Also called `k`.
pub fn optimal_hashes(size: usize, capacity: usize) -> usize {
    ((size as f64 / capacity as f64) * LN_2).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::iter;

    fn key() -> String {
        let rng = fastrand::Rng::new();
        iter::repeat_with(|| rng.alphanumeric()).take(32).collect()
    }

    fn items(size: usize) -> Vec<String> {
        let mut items = HashSet::<String>::new();
        while items.len() < size {
            items.insert(key());
        }
        items.into_iter().collect()
    }

    #[test]
    fn test_counting_bloom_filter() {
        let n = 1024;
        let items = items(n);
        let mut bf = CountingBloomFilter::with_rate(items.len(), 0.01).unwrap();

        // Test inclusion.
        for item in items.iter() {
            bf.add(item);

            assert!(
                bf.check(item) >= 1,
                "item {} should result in a positive inclusion",
                item,
            );
        }

        // Test false negatives, after all other items went in.
        for item in items.iter() {
            assert!(bf.contains(item), "item {} resulted in a false negative", item);
        }
    }

    #[test]
    fn test_false_positive_rate() {
        let members = items(1000);
        let mut bf = CountingBloomFilter::with_rate(members.len(), 0.01).unwrap();
        for item in &members {
            bf.add(item);
        }
        let members: HashSet<String> = members.into_iter().collect();

        let probes = 10_000;
        let mut tested = 0;
        let mut positives = 0;
        while tested < probes {
            let item = key();
            if members.contains(&item) {
                continue;
            }
            tested += 1;
            if bf.contains(&item) {
                positives += 1;
            }
        }
        let rate = positives as f64 / probes as f64;

        assert!(rate < 0.03, "false positive rate {} is too high", rate);
    }

    #[test]
    fn test_empty_filter_contains_nothing() {
        let bf = CountingBloomFilter::new(64, 3).unwrap();

        assert_eq!(bf.check("CCO"), 0);
        assert!(!bf.contains(""));
    }

    #[test]
    fn test_check_counts_repeats() {
        let mut bf = CountingBloomFilter::with_rate(100, 0.001).unwrap();

        bf.add("c1ccccc1");
        bf.add("c1ccccc1");
        bf.add("c1ccccc1");

        assert!(bf.check("c1ccccc1") >= 3);
    }

    #[test]
    fn test_saturation() {
        let mut bf = CountingBloomFilter::new(128, 4).unwrap();

        for _ in 0..300 {
            bf.add("CCO");
        }
        assert_eq!(bf.check("CCO"), 255);
        assert!(bf.as_bytes().iter().all(|c| *c == 0 || *c == 255));
    }

    #[test]
    fn test_deterministic() {
        for hasher in [HashKind::Murmur3, HashKind::SipHash13] {
            let items = items(256);
            let mut a = CountingBloomFilter::with_hasher(2048, 5, hasher).unwrap();
            let mut b = CountingBloomFilter::with_hasher(2048, 5, hasher).unwrap();

            for item in &items {
                a.add(item);
            }
            for item in items.iter().rev() {
                b.add(item);
            }
            assert_eq!(a, b);

            for _ in 0..256 {
                let probe = key();
                assert_eq!(a.check(&probe), a.check(&probe));
                assert_eq!(a.check(&probe), b.check(&probe));
            }
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            CountingBloomFilter::new(0, 3),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            CountingBloomFilter::new(10, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            calculate_size_and_hash_count(0, 0.01),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            calculate_size_and_hash_count(10, 0.),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            calculate_size_and_hash_count(10, 1.),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            calculate_size_and_hash_count(10, f64::NAN),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_calculate_size_and_hash_count() {
        assert_eq!(calculate_size_and_hash_count(3, 0.01).unwrap(), (29, 7));
        assert_eq!(calculate_size_and_hash_count(10, 0.04).unwrap(), (67, 5));
        assert_eq!(calculate_size_and_hash_count(5000, 0.01).unwrap(), (47926, 7));

        let (size, hashes) = calculate_size_and_hash_count(1, 0.99).unwrap();
        assert!(size >= 1);
        assert!(hashes >= 1);
    }

    #[test]
    fn test_optimal_size() {
        assert_eq!(optimal_size(10, 0.04), 67);
        assert_eq!(optimal_size(5000, 0.01), 47926);
        assert_eq!(optimal_size(100000, 0.01), 958506);
    }

    #[test]
    fn test_optimal_hashes() {
        assert_eq!(optimal_hashes(67, 10), 5);
        assert_eq!(optimal_hashes(47926, 5000), 7);
        assert_eq!(optimal_hashes(958506, 100000), 7);
    }

    #[test]
    fn test_estimated_len() {
        let mut bf = CountingBloomFilter::with_rate(4096, 0.01).unwrap();
        assert_eq!(bf.estimated_len(), 0);
        assert_eq!(bf.fill_ratio(), 0.);

        for i in 0..2048 {
            bf.add(&i.to_string());
        }
        let estimate = bf.estimated_len() as f64;
        assert!((estimate - 2048.).abs() < 2048. * 0.05, "estimate {}", estimate);
        assert!(bf.fill_ratio() > 0. && bf.fill_ratio() < 1.);
    }

    #[test]
    fn test_persisted_layout() {
        let mut bf = CountingBloomFilter::new(8, 2).unwrap();
        bf.add("CCO");

        let mut bytes = Vec::new();
        bf.write_to(&mut bytes).unwrap();

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            b'M', b'B', b'L', b'M', // magic
            1,                      // version
            0,                      // murmur3
            8, 0, 0, 0, 0, 0, 0, 0, // size
            2, 0, 0, 0,             // hash count
            8, 0, 0, 0, 0, 0, 0, 0, // counters length
            0, 1, 0, 0, 0, 0, 0, 1, // counters
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_save_and_load() {
        for hasher in [HashKind::Murmur3, HashKind::SipHash13] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("sample.bloom");
            let items = items(512);

            let mut a = CountingBloomFilter::with_hasher(4096, 6, hasher).unwrap();
            for item in &items {
                a.add(item);
            }
            a.add(&items[0]);
            a.save(&path).unwrap();

            let b = CountingBloomFilter::load(&path).unwrap();
            assert_eq!(a, b);
            assert_eq!(b.size(), 4096);
            assert_eq!(b.hashes(), 6);
            assert_eq!(b.hasher(), hasher);

            for item in &items {
                assert_eq!(a.check(item), b.check(item));
            }
            for _ in 0..512 {
                let probe = key();
                assert_eq!(a.check(&probe), b.check(&probe));
            }
        }
    }

    #[test]
    fn test_raw() {
        let mut a = CountingBloomFilter::new(1 << 14, 4).unwrap();

        for item in items(1 << 10).iter() {
            a.add(item);
        }

        let mut bytes = Vec::new();
        a.write_to(&mut bytes).unwrap();
        let b = CountingBloomFilter::read_from(bytes.as_slice()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.size(), b.size());
        assert_eq!(a.hashes(), b.hashes());
    }

    #[test]
    fn test_load_rejects_corrupt_data() {
        let mut a = CountingBloomFilter::new(100, 3).unwrap();
        a.add("CCO");
        let mut bytes = Vec::new();
        a.write_to(&mut bytes).unwrap();

        // Truncated.
        let truncated = &bytes[..bytes.len() - 10];
        assert!(matches!(
            CountingBloomFilter::read_from(truncated),
            Err(Error::Persistence(_))
        ));

        // Wrong magic.
        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(matches!(
            CountingBloomFilter::read_from(bad.as_slice()),
            Err(Error::Persistence(_))
        ));

        // Unknown hash tag, stored right after magic and version.
        let mut bad = bytes.clone();
        bad[5] = 42;
        assert!(matches!(
            CountingBloomFilter::read_from(bad.as_slice()),
            Err(Error::Persistence(_))
        ));

        // Size disagreeing with the counters.
        let mut bad = bytes.clone();
        bad[6] = 99;
        assert!(matches!(
            CountingBloomFilter::read_from(bad.as_slice()),
            Err(Error::Persistence(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bloom");
        std::fs::write(&path, b"definitely not a filter").unwrap();
        assert!(matches!(
            CountingBloomFilter::load(&path),
            Err(Error::Persistence(_))
        ));
        assert!(matches!(
            CountingBloomFilter::load(dir.path().join("missing.bloom")),
            Err(Error::Persistence(_))
        ));
    }
}
