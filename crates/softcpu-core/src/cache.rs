//! Bounded least-recently-used decode cache.
//!
//! ROM is immutable and decoding is pure, so an instruction's bytes fully
//! determine its decoded form. Entries are keyed by the exact byte slice.

use std::collections::{BTreeMap, HashMap};

use crate::codec::{decode, Instruction};
use crate::fault::CpuError;

/// Default number of cached instructions.
pub const DEFAULT_DECODE_CACHE_CAPACITY: usize = 500;

/// LRU map from instruction bytes to decoded instructions.
#[derive(Debug, Clone)]
pub struct DecodeCache {
    capacity: usize,
    entries: HashMap<Box<[u8]>, (Instruction, u64)>,
    recency: BTreeMap<u64, Box<[u8]>>,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl DecodeCache {
    /// Creates an empty cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            recency: BTreeMap::new(),
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Decodes `bytes`, reusing a cached result when present.
    ///
    /// Decoding failures are returned and not cached.
    ///
    /// # Errors
    ///
    /// Propagates [`decode`] errors.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Instruction, CpuError> {
        self.clock += 1;
        let now = self.clock;
        if let Some((instruction, stamp)) = self.entries.get_mut(bytes) {
            if let Some(key) = self.recency.remove(stamp) {
                self.recency.insert(now, key);
            }
            *stamp = now;
            self.hits += 1;
            return Ok(*instruction);
        }

        self.misses += 1;
        let instruction = decode(bytes)?;
        if self.capacity == 0 {
            return Ok(instruction);
        }
        if self.entries.len() >= self.capacity {
            if let Some((_, oldest)) = self.recency.pop_first() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(bytes.into(), (instruction, now));
        self.recency.insert(now, bytes.into());
        Ok(instruction)
    }

    /// Returns `true` when `bytes` is cached. Does not touch recency.
    #[must_use]
    pub fn contains(&self, bytes: &[u8]) -> bool {
        self.entries.contains_key(bytes)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// `(hits, misses)` since construction or the last clear.
    #[must_use]
    pub const fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Drops every entry and resets statistics.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.hits = 0;
        self.misses = 0;
    }
}
