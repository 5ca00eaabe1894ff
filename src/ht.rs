//! Case-insensitive open-addressed string map used to store header fields.
//!
//! Open addressing with **triangular probing** (the `i`-th probe offset is
//! the `i`-th triangular number, `i*(i+1)/2`, not `i*(i+1)` and not `i²`):
//! over a power-of-two capacity this visits every slot exactly once, so a
//! probe walk bounded by `capacity` iterations is guaranteed to either find
//! the key or prove it absent. `i*(i+1)` is always even, so adding it to a
//! hash never flips the hash's low bit and a walk built on it would only
//! ever reach half the table; halving it back to the true triangular number
//! restores full coverage. Deletions leave tombstones behind so that a
//! later probe walk doesn't stop early at a hole punched by an earlier
//! delete; `lookup` opportunistically relocates a found entry past any
//! tombstones it had to skip over, which keeps long-lived tables from
//! accumulating dead slots on their hot lookup paths.
//!
//! Every live key is stored lower-cased; callers never need to normalize
//! case themselves, matching header-name case-insensitivity per RFC 9110.

use crate::errors::HtError;

/// 64-bit FNV-1a over raw bytes. The default hash for [`HashTable`].
#[inline]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

const LOAD_FACTOR_NUM: usize = 7;
const LOAD_FACTOR_DEN: usize = 10;

#[derive(Clone)]
enum Slot {
    Empty,
    Tombstone,
    Live { key: String, value: String },
}

/// Case-insensitive, open-addressed string map.
///
/// Not `Sync`/shared: each instance belongs to exactly one [`crate::http::request::Request`],
/// itself owned by exactly one worker thread — see the concurrency model this
/// crate follows, which forbids sharing parser-owned state across threads.
pub struct HashTable {
    slots: Vec<Slot>,
    size: usize,
    hash_fn: fn(&[u8]) -> u64,
}

impl HashTable {
    /// Builds a table with `capacity` slots (must be a power of two) and
    /// the default FNV-1a hash.
    pub fn new(capacity: usize) -> Result<Self, HtError> {
        Self::with_hasher(capacity, fnv1a_64)
    }

    /// Builds a table with `capacity` slots and a caller-supplied hash
    /// function, matching §6's "HT hash function (optional override)"
    /// configuration point.
    pub fn with_hasher(capacity: usize, hash_fn: fn(&[u8]) -> u64) -> Result<Self, HtError> {
        debug_assert!(capacity.is_power_of_two() && capacity > 0);
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| HtError::Alloc)?;
        slots.resize_with(capacity, || Slot::Empty);

        Ok(Self {
            slots,
            size: 0,
            hash_fn,
        })
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drops every entry, resetting `len()` to zero without shrinking the
    /// backing array. Used to recycle a `Request`'s header table between
    /// connections without reallocating.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
        self.size = 0;
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Lower-cases `key` into a fresh owned `String`. Header names and the
    /// lookup keys derived from them are restricted to token characters
    /// (ASCII), so a byte-wise `to_ascii_lowercase` is exact, not an
    /// approximation of a fuller Unicode case fold.
    fn lower(key: &[u8]) -> String {
        let mut s = String::with_capacity(key.len());
        for &b in key {
            s.push(b.to_ascii_lowercase() as char);
        }
        s
    }

    /// Inserts `value` under `key`. If a live entry with the same
    /// lower-cased key exists, the two values are joined with `", "` and
    /// the entry count does not change; otherwise a new entry is stored.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), HtError> {
        if (self.size + 1) * LOAD_FACTOR_DEN >= self.slots.len() * LOAD_FACTOR_NUM {
            self.grow()?;
        }

        let lowered = Self::lower(key);
        let value = std::str::from_utf8(value).unwrap_or_default();
        let hash = (self.hash_fn)(lowered.as_bytes());
        let mask = self.mask();

        for i in 0..self.slots.len() {
            let idx = (hash as usize).wrapping_add(i * (i + 1) / 2) & mask;
            match &mut self.slots[idx] {
                Slot::Live { key: k, value: v } if *k == lowered => {
                    v.push_str(", ");
                    v.push_str(value);
                    return Ok(());
                }
                Slot::Live { .. } => continue,
                slot @ (Slot::Empty | Slot::Tombstone) => {
                    *slot = Slot::Live {
                        key: lowered,
                        value: value.to_owned(),
                    };
                    self.size += 1;
                    return Ok(());
                }
            }
        }

        // Unreachable when capacity is a power of two and the load factor
        // check above keeps at least one non-live slot available.
        Err(HtError::Alloc)
    }

    /// Looks up `key` (case-insensitive). On a hit reached past one or more
    /// tombstones, the entry is relocated to the first tombstone seen
    /// (lazy compaction), shortening future probe walks for the same key.
    pub fn lookup(&mut self, key: &[u8]) -> Option<&str> {
        let lowered = Self::lower(key);
        let hash = (self.hash_fn)(lowered.as_bytes());
        let mask = self.mask();

        let mut first_tombstone: Option<usize> = None;
        let mut found: Option<usize> = None;

        for i in 0..self.slots.len() {
            let idx = (hash as usize).wrapping_add(i * (i + 1) / 2) & mask;
            match &self.slots[idx] {
                Slot::Empty => break,
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(idx);
                    }
                }
                Slot::Live { key: k, .. } if *k == lowered => {
                    found = Some(idx);
                    break;
                }
                Slot::Live { .. } => {}
            }
        }

        let found = found?;
        if let Some(tomb) = first_tombstone {
            let entry = std::mem::replace(&mut self.slots[found], Slot::Empty);
            self.slots[tomb] = entry;
            match &self.slots[tomb] {
                Slot::Live { value, .. } => Some(value.as_str()),
                _ => unreachable!(),
            }
        } else {
            match &self.slots[found] {
                Slot::Live { value, .. } => Some(value.as_str()),
                _ => unreachable!(),
            }
        }
    }

    /// Removes `key` if present, returning whether it was found.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let lowered = Self::lower(key);
        let hash = (self.hash_fn)(lowered.as_bytes());
        let mask = self.mask();

        for i in 0..self.slots.len() {
            let idx = (hash as usize).wrapping_add(i * (i + 1) / 2) & mask;
            match &self.slots[idx] {
                Slot::Empty => return false,
                Slot::Live { key: k, .. } if *k == lowered => {
                    self.slots[idx] = Slot::Tombstone;
                    self.size -= 1;
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    /// Doubles capacity and re-inserts every live entry; tombstones are
    /// discarded in the process, which is what keeps long-running tables
    /// from degrading after many delete/insert cycles.
    fn grow(&mut self) -> Result<(), HtError> {
        let new_capacity = self.slots.len() * 2;
        let mut new_slots = Vec::new();
        new_slots
            .try_reserve_exact(new_capacity)
            .map_err(|_| HtError::Alloc)?;
        new_slots.resize_with(new_capacity, || Slot::Empty);

        let old = std::mem::replace(&mut self.slots, new_slots);
        self.size = 0;
        for slot in old {
            if let Slot::Live { key, value } = slot {
                self.reinsert(key, value);
            }
        }
        Ok(())
    }

    /// Inserts an already-lower-cased, already-owned pair during `grow`,
    /// bypassing the load-factor check and the case-folding allocation that
    /// `insert` would otherwise redo.
    fn reinsert(&mut self, key: String, value: String) {
        let hash = (self.hash_fn)(key.as_bytes());
        let mask = self.mask();
        for i in 0..self.slots.len() {
            let idx = (hash as usize).wrapping_add(i * (i + 1) / 2) & mask;
            if matches!(self.slots[idx], Slot::Empty | Slot::Tombstone) {
                self.slots[idx] = Slot::Live { key, value };
                self.size += 1;
                return;
            }
        }
    }
}
