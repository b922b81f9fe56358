//! Scoring molecules by membership in a reference library.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, info_span, Span};

use crate::bloom::{calculate_size_and_hash_count, CountingBloomFilter};
use crate::canonical::{Canonicalize, Verbatim};
use crate::config::{BloomFilterConfig, Membership};
use crate::error::{Error, Result};
use crate::pool::WorkerPool;

/// Suffix of the field reported by [`BloomFilter`].
pub const IN_BLOOM_FILTER: &str = "in_bloom_filter";

/// The scores computed for a single input molecule.
///
/// Serializes as a flat map: `{"smiles": ..., "<prefix>_<metric>": value, ...}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreRecord {
    /// The molecule as it was given.
    pub smiles: String,
    /// Namespaced metric values.
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl ScoreRecord {
    /// Return a record with no values.
    pub fn new(smiles: impl Into<String>) -> Self {
        Self {
            smiles: smiles.into(),
            values: BTreeMap::new(),
        }
    }

    /// Return the value of a field, if set.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    /// Set a field.
    pub fn insert(&mut self, field: impl Into<String>, value: f64) {
        self.values.insert(field.into(), value);
    }
}

/// A component producing per-molecule scores.
///
/// `score` returns exactly one record per input, in input order, and never
/// fails because of a single bad molecule: such molecules get neutral values.
pub trait ScoringFunction {
    /// Label namespacing this function's fields.
    fn prefix(&self) -> &str;

    /// Metric names, without the prefix, set on every record.
    fn return_metrics(&self) -> &'static [&'static str];

    /// Score a batch of molecules.
    fn score(&self, smiles: &[String]) -> Vec<ScoreRecord>;
}

/// Flags molecules already present in a reference dataset.
///
/// Wraps a [`CountingBloomFilter`] that is either loaded from disk or built
/// once from a dataset at construction, then only read.
#[derive(Debug)]
pub struct BloomFilter<C = Verbatim> {
    prefix: String,
    field: String,
    canonize: bool,
    membership: Membership,
    filter: CountingBloomFilter,
    canonicalizer: C,
    pool: WorkerPool,
    span: Span,
}

impl<C: Canonicalize> BloomFilter<C> {
    /// Load or build the filter described by `config`.
    ///
    /// A persisted filter is loaded if `filter_path` exists. Otherwise the
    /// filter is built from `dataset_path` and, if `filter_path` is set,
    /// persisted there. A persisted filter that cannot be read is an error;
    /// there is no fallback to rebuilding it.
    pub fn new(config: BloomFilterConfig, canonicalizer: C) -> Result<Self> {
        config.validate()?;

        let prefix = config.prefix.replace(' ', "_");
        let span = info_span!("bloom_filter", prefix = %prefix);
        let pool = WorkerPool::new(config.worker_count)?;
        let filter = span.in_scope(|| open(&config, &canonicalizer, &pool))?;

        Ok(Self {
            field: format!("{prefix}_{IN_BLOOM_FILTER}"),
            prefix,
            canonize: config.canonize,
            membership: config.membership,
            filter,
            canonicalizer,
            pool,
            span,
        })
    }

    /// Name of the field set on each record.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The underlying filter.
    pub fn filter(&self) -> &CountingBloomFilter {
        &self.filter
    }

    /// Return the filter count for a single molecule, `0` if it is invalid.
    pub fn check(&self, smiles: &str) -> u8 {
        match self.canonicalizer.canonicalize(smiles) {
            Some(canonical) => self.lookup(smiles, &canonical),
            None => 0,
        }
    }

    /// Return whether a single molecule is likely in the reference dataset.
    pub fn contains(&self, smiles: &str) -> bool {
        self.check(smiles) > 0
    }

    fn lookup(&self, smiles: &str, canonical: &str) -> u8 {
        if self.canonize {
            self.filter.check(canonical)
        } else {
            // Dataset entries are stored without trailing whitespace.
            self.filter.check(smiles.trim_end())
        }
    }
}

impl<C: Canonicalize> ScoringFunction for BloomFilter<C> {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn return_metrics(&self) -> &'static [&'static str] {
        &[IN_BLOOM_FILTER]
    }

    fn score(&self, smiles: &[String]) -> Vec<ScoreRecord> {
        let _guard = self.span.enter();
        let canonicalizer = &self.canonicalizer;
        let canonical = self.pool.map(smiles, |s| canonicalizer.canonicalize(s));

        let mut invalid = 0;
        let records = smiles
            .iter()
            .zip(canonical)
            .map(|(smi, canonical)| {
                let value = match canonical {
                    Some(canonical) => self.membership.value(self.lookup(smi, &canonical)),
                    None => {
                        invalid += 1;
                        0.
                    }
                };
                let mut record = ScoreRecord::new(smi.as_str());
                record.insert(self.field.as_str(), value);
                record
            })
            .collect();
        debug!(batch = smiles.len(), invalid, "scored batch");

        records
    }
}

fn open<C: Canonicalize>(
    config: &BloomFilterConfig,
    canonicalizer: &C,
    pool: &WorkerPool,
) -> Result<CountingBloomFilter> {
    if let Some(path) = config.filter_path.as_deref().filter(|p| p.exists()) {
        info!(path = %path.display(), "loading persisted filter");
        return CountingBloomFilter::load(path);
    }
    if let Some(path) = config.dataset_path.as_deref().filter(|p| p.exists()) {
        let filter = build(path, config, canonicalizer, pool)?;

        if let Some(target) = &config.filter_path {
            filter.save(target)?;
            info!(path = %target.display(), "persisted filter");
        }
        return Ok(filter);
    }
    Err(Error::Configuration(
        "neither a usable persisted filter nor a usable dataset was provided".to_owned(),
    ))
}

fn build<C: Canonicalize>(
    path: &Path,
    config: &BloomFilterConfig,
    canonicalizer: &C,
    pool: &WorkerPool,
) -> Result<CountingBloomFilter> {
    let dataset = read_dataset(path)?;
    if dataset.is_empty() {
        return Err(Error::Configuration(format!(
            "dataset {} has no entries",
            path.display()
        )));
    }
    let (size, hash_count) = calculate_size_and_hash_count(dataset.len(), config.false_positive_rate)?;
    let mut filter = CountingBloomFilter::with_hasher(size, hash_count, config.hash)?;
    info!(
        path = %path.display(),
        entries = dataset.len(),
        size,
        hash_count,
        hash = %config.hash,
        "building filter"
    );

    let mut skipped = 0;
    if config.canonize {
        let canonical = pool.map(&dataset, |s| canonicalizer.canonicalize(s));

        for (line, entry) in dataset.iter().zip(canonical) {
            match entry {
                Some(entry) => filter.add(&entry),
                None => {
                    debug!(entry = %line, "skipping invalid dataset entry");
                    skipped += 1;
                }
            }
        }
    } else {
        for entry in &dataset {
            filter.add(entry);
        }
    }
    info!(added = dataset.len() - skipped, skipped, "filter built");

    Ok(filter)
}

/// Read one entry per line, with trailing whitespace stripped. Blank lines and
/// lines that are not valid UTF-8 are dropped.
fn read_dataset(path: &Path) -> Result<Vec<String>> {
    let unreadable =
        |e: std::io::Error| Error::Configuration(format!("unable to read {}: {e}", path.display()));
    let reader = BufReader::new(File::open(path).map_err(unreadable)?);
    let mut entries = Vec::new();

    for (number, line) in reader.split(b'\n').enumerate() {
        let line = match String::from_utf8(line.map_err(unreadable)?) {
            Ok(line) => line,
            Err(e) => {
                debug!(line = number + 1, error = %e, "skipping undecodable dataset line");
                continue;
            }
        };
        let line = line.trim_end();

        if !line.is_empty() {
            entries.push(line.to_owned());
        }
    }
    Ok(entries)
}
