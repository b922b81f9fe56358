//! Seeded hash families used to place items in a filter.
//!
//! Every family here is deterministic across processes and platforms, so a
//! filter built in one run answers identically after it is persisted and loaded
//! in another.
use std::fmt;
use std::hash::Hasher;
use std::io::Cursor;
use std::str::FromStr;

use serde::Deserialize;
use siphasher::sip::SipHasher13;

use crate::error::Error;

/// Second SipHash key; the first key is the per-function seed.
const SIP_KEY: u64 = 0x26ef_8d5f_fb1c_a888;

/// The supported hash families.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum HashKind {
    /// MurmurHash3 (x64, 128-bit), keeping the low 64 bits.
    #[default]
    Murmur3,
    /// SipHash-1-3 keyed with the seed.
    SipHash13,
}

impl HashKind {
    /// Every supported family.
    pub const ALL: [HashKind; 2] = [HashKind::Murmur3, HashKind::SipHash13];

    /// Name accepted by [`HashKind::from_str`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Murmur3 => "murmur3",
            Self::SipHash13 => "siphash13",
        }
    }

    /// Tag written into persisted filters.
    pub fn tag(self) -> u8 {
        match self {
            Self::Murmur3 => 0,
            Self::SipHash13 => 1,
        }
    }

    /// Look up a hash family from its persisted tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Hash `bytes` with the function identified by `seed`.
    pub fn hash(self, bytes: &[u8], seed: u32) -> u64 {
        match self {
            Self::Murmur3 => {
                let mut cursor = Cursor::new(bytes);
                // Reading from an in-memory slice cannot fail.
                murmur3::murmur3_x64_128(&mut cursor, seed).map_or(0, |h| h as u64)
            }
            Self::SipHash13 => {
                let mut sip = SipHasher13::new_with_keys(u64::from(seed), SIP_KEY);
                sip.write(bytes);
                sip.finish()
            }
        }
    }

    /// Slot index of `bytes` for hash function `seed` in a filter of `size` slots.
    pub fn index(self, bytes: &[u8], seed: u32, size: usize) -> usize {
        (self.hash(bytes, seed) % size as u64) as usize
    }
}

impl FromStr for HashKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| Error::UnsupportedKind {
                kind: "hash function",
                name: s.to_owned(),
            })
    }
}

impl TryFrom<String> for HashKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
