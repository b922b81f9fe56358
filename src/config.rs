//! Construction parameters for the scoring filter.
use std::path::PathBuf;

use serde::Deserialize;

use crate::bloom::DEFAULT_FALSE_POSITIVE_RATE;
use crate::error::{Error, Result};
use crate::hash::HashKind;

/// How a membership count is reported in a score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    /// `1.0` if the filter reports the molecule as present, `0.0` otherwise.
    #[default]
    Indicator,
    /// The raw minimum counter across the molecule's slots.
    Count,
}

impl Membership {
    /// Turn a filter count into a score value.
    pub fn value(self, count: u8) -> f64 {
        match self {
            Self::Indicator if count > 0 => 1.,
            Self::Indicator => 0.,
            Self::Count => f64::from(count),
        }
    }
}

/// Configuration of a [`crate::BloomFilter`].
///
/// Deserializes from the JSON parameters of a scoring function. The parameter
/// names used by existing scoring configs (`smiles_path`, `bloom_path`, `fpr`,
/// `n_jobs`) are accepted as aliases.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BloomFilterConfig {
    /// Label namespacing the output fields.
    pub prefix: String,
    /// Text file with one molecule per line to build the filter from.
    #[serde(default, alias = "smiles_path")]
    pub dataset_path: Option<PathBuf>,
    /// Persisted filter to load, or to write after building.
    #[serde(default, alias = "bloom_path")]
    pub filter_path: Option<PathBuf>,
    /// Canonicalize molecules before hashing them.
    #[serde(default = "default_canonize")]
    pub canonize: bool,
    /// Target false positive rate used to size a new filter.
    #[serde(default = "default_false_positive_rate", alias = "fpr")]
    pub false_positive_rate: f64,
    /// Number of worker threads for canonicalization.
    #[serde(default = "default_worker_count", alias = "n_jobs")]
    pub worker_count: usize,
    /// Hash family used when building a new filter.
    #[serde(default)]
    pub hash: HashKind,
    /// How counts are reported.
    #[serde(default)]
    pub membership: Membership,
}

fn default_canonize() -> bool {
    true
}

fn default_false_positive_rate() -> f64 {
    DEFAULT_FALSE_POSITIVE_RATE
}

fn default_worker_count() -> usize {
    1
}

impl BloomFilterConfig {
    /// Return a configuration with default settings and no data source.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            dataset_path: None,
            filter_path: None,
            canonize: default_canonize(),
            false_positive_rate: default_false_positive_rate(),
            worker_count: default_worker_count(),
            hash: HashKind::default(),
            membership: Membership::default(),
        }
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;

        Ok(config)
    }

    /// Check that every parameter is within range.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(Error::Configuration("prefix must not be empty".to_owned()));
        }
        if !(self.false_positive_rate > 0. && self.false_positive_rate < 1.) {
            return Err(Error::Configuration(format!(
                "false positive rate must be within (0, 1), got {}",
                self.false_positive_rate
            )));
        }
        if self.worker_count == 0 {
            return Err(Error::Configuration(
                "worker count must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Set the dataset to build from.
    pub fn dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = Some(path.into());
        self
    }

    /// Set the persisted filter location.
    pub fn filter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.filter_path = Some(path.into());
        self
    }

    /// Enable or disable canonicalization.
    pub fn canonize(mut self, canonize: bool) -> Self {
        self.canonize = canonize;
        self
    }

    /// Set the target false positive rate.
    pub fn false_positive_rate(mut self, rate: f64) -> Self {
        self.false_positive_rate = rate;
        self
    }

    /// Set the number of worker threads.
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Set the hash family.
    pub fn hash(mut self, hash: HashKind) -> Self {
        self.hash = hash;
        self
    }

    /// Set the membership reporting policy.
    pub fn membership(mut self, membership: Membership) -> Self {
        self.membership = membership;
        self
    }
}
