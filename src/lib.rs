//! A counting Bloom filter for flagging molecules that already exist in a
//! reference library, such as the training set of a generative model.
//!
//! # Counting Bloom Filters
//!
//! A Bloom filter is a space-efficient probabilistic data structure that is
//! used to test whether an element is a member of a set. It allows for queries
//! to return: "possibly in set" or "definitely not in set". A counting Bloom
//! filter replaces each bit with a small counter: adding an item increments the
//! `k` counters it hashes to, and checking an item returns the smallest of those
//! counters. A result of zero guarantees the item was never added, while any
//! other value is a lower bound on how many times it was added, subject to the
//! filter's false positive rate.
//!
//! Counters here are eight bits wide and saturate at 255 instead of wrapping,
//! so repeated insertions can never turn a present item into an absent one.
//!
//! # Hashing
//!
//! Each of the `k` slots of an item comes from a separate evaluation of the same
//! hash family seeded with `0..k`:
//!
//! g<sub>i</sub>(x) = H(x, seed = i) mod m
//!
//! The families in [`HashKind`] are deterministic across processes, so a filter
//! persisted by one run answers identically when loaded by the next.
//!
//! # Scoring
//!
//! [`BloomFilter`] wraps a filter built from a dataset with one molecule per
//! line, or loaded from disk, and scores batches of molecules through the
//! [`ScoringFunction`] contract: one record per input, in input order, with
//! invalid molecules scored as absent.
//!
//! # Example
//!
//! ```
//! use molbloom::CountingBloomFilter;
//!
//! let mut filter = CountingBloomFilter::with_rate(32, 0.01).unwrap();
//!
//! filter.add("CCO");
//! filter.add("CCO");
//! filter.add("c1ccccc1");
//!
//! assert!(filter.check("CCO") >= 2);
//! assert!(filter.contains("c1ccccc1"));
//! filter.contains("CCN"); // false, most likely
//! ```
#![warn(missing_docs)]
#![allow(clippy::bool_assert_comparison)]

pub mod bloom;
pub mod canonical;
pub mod config;
pub mod counters;
pub mod error;
pub mod hash;
pub mod pool;
pub mod scoring;

pub use bloom::CountingBloomFilter;
pub use canonical::{Canonicalize, Verbatim};
pub use config::{BloomFilterConfig, Membership};
pub use error::{Error, Result};
pub use hash::HashKind;
pub use scoring::{BloomFilter, ScoreRecord, ScoringFunction};
