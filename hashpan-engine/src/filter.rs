//! Two stage membership test for candidate digests.
//!
//! Stage one is the quick-check bitmap: for each of the 19 adjacent byte
//! pairs of a digest it records whether any target digest has that 16 bit
//! value at that position. Almost every candidate fails one of the 19 probes,
//! which costs a handful of loads from a 152 KiB table. Only digests that pass
//! all probes reach the exact lookup in the target set.

use dashmap::DashSet;

use crate::digest::{DIGEST_LEN, Sha1Digest};
use crate::error::Error;

/// Number of adjacent byte pairs in a digest.
pub const PAIR_POSITIONS: usize = DIGEST_LEN - 1;

const WORDS_PER_POSITION: usize = (u16::MAX as usize + 1) / 64;

/// Whether a confirmed match removes its target from the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Remove matched targets so the leftovers can be reported as
    /// undeciphered; a target is reported at most once.
    #[default]
    Consume,
    /// Leave targets in place; every candidate hashing to a target is
    /// reported.
    Retain,
}

/// Bit-packed `[position][u16 value] -> bool` table.
#[derive(Clone, PartialEq, Eq)]
pub struct QuickCheckBitmap {
    words: Box<[u64]>,
}

impl QuickCheckBitmap {
    /// A bitmap with no bits set, which rejects every digest.
    pub fn new() -> Self {
        Self { words: vec![0u64; PAIR_POSITIONS * WORDS_PER_POSITION].into_boxed_slice() }
    }

    pub fn from_digests<'a>(digests: impl IntoIterator<Item = &'a Sha1Digest>) -> Self {
        let mut bitmap = Self::new();
        for digest in digests {
            bitmap.insert(digest);
        }
        bitmap
    }

    pub fn insert(&mut self, digest: &Sha1Digest) {
        for position in 0..PAIR_POSITIONS {
            let (word, bit) = Self::index(position, digest.pair(position));
            self.words[word] |= bit;
        }
    }

    /// True if `value` was seen at byte pair `position` in any inserted digest.
    #[inline(always)]
    pub fn get(&self, position: usize, value: u16) -> bool {
        let (word, bit) = Self::index(position, value);
        self.words[word] & bit != 0
    }

    /// False means the digest is definitely not one of the inserted digests.
    #[inline(always)]
    pub fn may_contain(&self, digest: &Sha1Digest) -> bool {
        (0..PAIR_POSITIONS).all(|position| self.get(position, digest.pair(position)))
    }

    /// Number of set entries, across all positions.
    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline(always)]
    fn index(position: usize, value: u16) -> (usize, u64) {
        let value = value as usize;
        (position * WORDS_PER_POSITION + value / 64, 1u64 << (value % 64))
    }
}

impl Default for QuickCheckBitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// The leaked digests being searched for.
///
/// Backed by a sharded concurrent set so workers can remove matched entries
/// without a global lock.
#[derive(Default)]
pub struct TargetSet {
    hashes: DashSet<Sha1Digest>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses base64 or hex encoded digests. Fails on the first malformed
    /// entry.
    pub fn from_encoded<I, S>(encoded: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = Self::new();
        for value in encoded {
            set.insert(Sha1Digest::parse(value.as_ref())?);
        }
        Ok(set)
    }

    /// Returns false if the digest was already present.
    ///
    /// Crate-private: a digest added after a [`MatchFilter`] is built would
    /// have no bitmap bits and never match.
    pub(crate) fn insert(&self, digest: Sha1Digest) -> bool {
        self.hashes.insert(digest)
    }

    pub fn contains(&self, digest: &Sha1Digest) -> bool {
        self.hashes.contains(digest)
    }

    /// Returns true only for the call that actually removed the digest.
    pub fn remove(&self, digest: &Sha1Digest) -> bool {
        self.hashes.remove(digest).is_some()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Snapshot of the digests still present, sorted for stable reporting.
    pub fn remaining(&self) -> Vec<Sha1Digest> {
        let mut out: Vec<Sha1Digest> = self.hashes.iter().map(|entry| *entry.key()).collect();
        out.sort_unstable();
        out
    }
}

impl FromIterator<Sha1Digest> for TargetSet {
    fn from_iter<T: IntoIterator<Item = Sha1Digest>>(iter: T) -> Self {
        let set = Self::new();
        for digest in iter {
            set.insert(digest);
        }
        set
    }
}

/// Target set plus the bitmap derived from it.
///
/// The bitmap is built once from the initial membership and never cleared
/// when targets are consumed; stale bits only let a few more digests through
/// to the exact lookup.
pub struct MatchFilter {
    targets: TargetSet,
    bitmap: QuickCheckBitmap,
}

impl MatchFilter {
    pub fn new(targets: TargetSet) -> Self {
        let mut filter = Self { targets, bitmap: QuickCheckBitmap::new() };
        filter.rebuild_bitmap();
        filter
    }

    /// Recomputes the bitmap from the current target set. Idempotent.
    pub fn rebuild_bitmap(&mut self) {
        let mut bitmap = QuickCheckBitmap::new();
        for entry in self.targets.hashes.iter() {
            bitmap.insert(entry.key());
        }
        self.bitmap = bitmap;
    }

    /// Exact membership, with the bitmap as an early reject.
    #[inline(always)]
    pub fn matches(&self, digest: &Sha1Digest) -> bool {
        self.bitmap.may_contain(digest) && self.targets.contains(digest)
    }

    /// Like [`matches`](Self::matches) but removes the target on success.
    /// A second call for the same digest returns false.
    #[inline(always)]
    pub fn matches_and_consume(&self, digest: &Sha1Digest) -> bool {
        self.bitmap.may_contain(digest) && self.targets.remove(digest)
    }

    /// Puts back a target taken by
    /// [`matches_and_consume`](Self::matches_and_consume). Its bitmap bits
    /// were never cleared, so it matches again.
    pub(crate) fn restore(&self, digest: &Sha1Digest) {
        self.targets.insert(*digest);
    }

    #[inline(always)]
    pub fn check(&self, digest: &Sha1Digest, mode: MatchMode) -> bool {
        match mode {
            MatchMode::Consume => self.matches_and_consume(digest),
            MatchMode::Retain => self.matches(digest),
        }
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn bitmap(&self) -> &QuickCheckBitmap {
        &self.bitmap
    }
}
