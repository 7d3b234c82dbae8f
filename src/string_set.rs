//! StringSet: append-only interning set with lock-free reads.
//!
//! Layout
//! - A `BucketsAndSlots` snapshot holds a flat array of slots, written once
//!   each, and an array of bucket heads. A head of `0` means "empty", a head
//!   of `k > 0` means "the chain starts at slot `k - 1`". Each slot links to
//!   the previous head of its bucket, forming an intrusive collision chain.
//! - The set itself is one atomically replaceable reference to the current
//!   snapshot.
//!
//! Writers
//! - All insertions serialize on one set-wide lock, taken only after a
//!   lock-free scan found no match. The scan is repeated under the lock.
//! - A slot is fully written before a fence and the bucket store that make it
//!   reachable, so a reader following a bucket head always sees a complete
//!   slot.
//! - When the slots are full, a new snapshot of twice the capacity is built
//!   privately (same slot indices, chains rebuilt against the new bucket
//!   count) and then published with a single swap.
//!
//! Readers
//! - Lookups and cursors never lock nor spin. A reader sees the snapshot it
//!   loaded; it may miss an insertion published after that load, but never
//!   observes a partially written slot.
//! - Old snapshots live as long as a reader or cursor still holds them.
//!
//! Nothing is ever removed: do not feed unbounded, attacker-controlled input
//! to the inserting operations.

use core::fmt;
use std::sync::atomic::{fence, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::compare;
use crate::error::{Error, Result};
use crate::hash::StringHash;

/// A concurrent set of interned strings.
///
/// Equal strings added through any of the inserting operations resolve to the
/// very same `Arc<str>` allocation.
pub struct StringSet {
    current: ArcSwap<BucketsAndSlots>,
    write_lock: Mutex<()>,
}

impl StringSet {
    /// The largest capacity a set can reach.
    pub const MAX_CAPACITY: usize = (u32::MAX - 1) as usize;

    /// Creates a set with room for `initial_capacity` strings before its first growth.
    ///
    /// #   Panics
    ///
    /// If `initial_capacity` is 0 or exceeds `MAX_CAPACITY`.
    pub fn new(initial_capacity: usize) -> Self {
        assert!(initial_capacity > 0, "initial capacity must be positive");
        assert!(initial_capacity <= Self::MAX_CAPACITY, "initial capacity too large");

        Self {
            current: ArcSwap::from_pointee(BucketsAndSlots::with_capacity(initial_capacity)),
            write_lock: Mutex::new(()),
        }
    }

    /// Number of strings in the set.
    pub fn len(&self) -> usize {
        self.current.load().count.load(Ordering::Acquire)
    }

    /// Returns true if no string was ever added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of strings the current table holds before it must grow.
    pub fn max_size(&self) -> usize {
        self.current.load().capacity()
    }

    /// Adds a string, returning true if it was not already present.
    ///
    /// If `hash` is provided it is used as-is in place of the FNV-1a hash of `string`; it must be consistent across
    /// all calls for the same text.
    pub fn add<S>(&self, string: S, hash: Option<StringHash>) -> Result<bool>
    where
        S: AsRef<str> + Into<Arc<str>>,
    {
        self.intern(string, hash).map(|(added, _)| added)
    }

    /// Adds a string, returning whether it was inserted and the canonical instance.
    ///
    /// When `string` is already an `Arc<str>` and is inserted, that very allocation becomes the canonical instance.
    pub fn intern<S>(&self, string: S, hash: Option<StringHash>) -> Result<(bool, Arc<str>)>
    where
        S: AsRef<str> + Into<Arc<str>>,
    {
        let hash = hash.unwrap_or_else(|| StringHash::of_str(string.as_ref()));

        self.insert_with(hash, StrCandidate(string))
    }

    /// Adds the text held in `buffer[start..start + length]`.
    ///
    /// Allocates a new string only when no match exists. Returns whether it was inserted and the canonical
    /// instance.
    pub fn add_units(
        &self,
        buffer: &[u16],
        start: usize,
        length: usize,
        hash: Option<StringHash>,
    ) -> Result<(bool, Arc<str>)> {
        let units = sub_range(buffer, start, length)?;
        let hash = hash.unwrap_or_else(|| StringHash::of_units(units));

        self.insert_with(hash, UnitsCandidate(units))
    }

    /// Looks up the text held in `buffer[start..start + length]`, without locking nor allocating.
    pub fn get_existing(
        &self,
        buffer: &[u16],
        start: usize,
        length: usize,
        hash: Option<StringHash>,
    ) -> Result<Option<Arc<str>>> {
        let units = sub_range(buffer, start, length)?;
        let hash = hash.unwrap_or_else(|| StringHash::of_units(units));

        let snapshot = self.current.load();

        Ok(snapshot
            .find(hash, |candidate| compare::str_equals_units(candidate, units))
            .cloned())
    }

    /// Looks up `string`, without locking nor allocating.
    pub fn get_existing_str(&self, string: &str, hash: Option<StringHash>) -> Option<Arc<str>> {
        let hash = hash.unwrap_or_else(|| StringHash::of_str(string));

        let snapshot = self.current.load();

        snapshot.find(hash, |candidate| candidate == string).cloned()
    }

    /// Returns a cursor over the strings with this `hash`, as of now.
    ///
    /// The cursor never observes strings added after this call, whether or not the set grows meanwhile.
    pub fn get_search_cursor(&self, hash: StringHash) -> SearchCursor {
        let snapshot = self.current.load_full();
        let next = snapshot.head(hash);

        SearchCursor {
            snapshot,
            hash,
            next,
        }
    }

    /// Iterates over the strings in insertion order, as of now.
    pub fn iter(&self) -> Iter {
        let snapshot = self.current.load_full();
        let count = snapshot.count.load(Ordering::Acquire);

        Iter {
            snapshot,
            index: 0,
            count,
        }
    }
}

impl fmt::Debug for StringSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.current.load_full();

        f.debug_struct("StringSet")
            .field("count", &snapshot.count.load(Ordering::Acquire))
            .field("max_size", &snapshot.capacity())
            .field("strings", &DebugStrings(&snapshot))
            .finish()
    }
}

/// A single-use cursor over the strings sharing one hash.
///
/// Holds on to the snapshot it was created from; obtain a fresh cursor from
/// the set to observe later insertions.
pub struct SearchCursor {
    snapshot: Arc<BucketsAndSlots>,
    hash: StringHash,
    next: Option<u32>,
}

impl SearchCursor {
    /// The hash this cursor searches for.
    pub fn hash(&self) -> StringHash {
        self.hash
    }

    /// Advances to the next string with a matching hash, without cloning it.
    pub fn next_entry(&mut self) -> Option<&Arc<str>> {
        self.snapshot
            .advance(self.hash, &mut self.next)
            .map(|slot| &slot.value)
    }
}

impl Iterator for SearchCursor {
    type Item = Arc<str>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().cloned()
    }
}

impl fmt::Debug for SearchCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchCursor")
            .field("hash", &self.hash)
            .field("next", &self.next)
            .finish()
    }
}

/// Iterator over a snapshot of the set, in insertion order.
pub struct Iter {
    snapshot: Arc<BucketsAndSlots>,
    index: usize,
    count: usize,
}

impl Iterator for Iter {
    type Item = Arc<str>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.count {
            let slot = self.snapshot.slot(self.index);
            self.index += 1;

            if let Some(slot) = slot {
                return Some(slot.value.clone());
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count - self.index))
    }
}

//
//  Implementation
//

struct Slot {
    value: Arc<str>,
    hash: StringHash,
    next: Option<u32>,
}

struct BucketsAndSlots {
    buckets: Box<[AtomicU32]>,
    slots: Box<[OnceLock<Slot>]>,
    count: AtomicUsize,
}

impl BucketsAndSlots {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            slots: (0..capacity).map(|_| OnceLock::new()).collect(),
            count: AtomicUsize::new(0),
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn bucket(&self, hash: StringHash) -> &AtomicU32 {
        &self.buckets[hash.get() as usize % self.buckets.len()]
    }

    fn head(&self, hash: StringHash) -> Option<u32> {
        self.bucket(hash).load(Ordering::Acquire).checked_sub(1)
    }

    fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index).and_then(OnceLock::get)
    }

    //  Returns the next slot of the chain with a matching hash, updating `next`.
    fn advance(&self, hash: StringHash, next: &mut Option<u32>) -> Option<&Slot> {
        while let Some(index) = *next {
            let Some(slot) = self.slot(index as usize) else {
                *next = None;
                break;
            };

            *next = slot.next;

            if slot.hash == hash {
                return Some(slot);
            }
        }

        None
    }

    fn find<F>(&self, hash: StringHash, matches: F) -> Option<&Arc<str>>
    where
        F: Fn(&str) -> bool,
    {
        let mut next = self.head(hash);

        while let Some(slot) = self.advance(hash, &mut next) {
            if matches(slot.value.as_ref()) {
                return Some(&slot.value);
            }
        }

        None
    }

    //  Writes slot `index` and makes it reachable from its bucket.
    //
    //  Must only be called by the holder of the write lock, or on a snapshot not yet published, with `index` being
    //  the current count.
    fn link(&self, index: usize, value: Arc<str>, hash: StringHash) {
        let bucket = self.bucket(hash);
        let head = bucket.load(Ordering::Relaxed);

        let slot = Slot {
            value,
            hash,
            next: head.checked_sub(1),
        };

        let written = self.slots[index].set(slot);
        debug_assert!(written.is_ok(), "slot {index} written twice");

        //  The slot must be visible before the bucket head makes it reachable.
        fence(Ordering::SeqCst);

        bucket.store(index as u32 + 1, Ordering::Release);
    }

    //  Builds a copy with twice the capacity; slot indices are preserved, chains are rebuilt.
    fn grown(&self) -> Result<Self> {
        let capacity = self
            .capacity()
            .checked_mul(2)
            .filter(|c| *c <= StringSet::MAX_CAPACITY)
            .ok_or(Error::CapacityOverflow)?;

        let count = self.count.load(Ordering::Acquire);
        let grown = Self::with_capacity(capacity);

        for (index, slot) in self.slots[..count].iter().enumerate() {
            if let Some(slot) = slot.get() {
                grown.link(index, slot.value.clone(), slot.hash);
            }
        }

        grown.count.store(count, Ordering::Release);

        Ok(grown)
    }
}

impl StringSet {
    //  Double-checked insertion: lock-free scan, then locked re-scan and insert.
    fn insert_with<C>(&self, hash: StringHash, candidate: C) -> Result<(bool, Arc<str>)>
    where
        C: Candidate,
    {
        let matches = |existing: &str| candidate.matches(existing);

        if let Some(existing) = self.current.load().find(hash, matches) {
            return Ok((false, existing.clone()));
        }

        let _guard = self.write_lock.lock();

        let mut snapshot = self.current.load_full();

        if let Some(existing) = snapshot.find(hash, matches) {
            return Ok((false, existing.clone()));
        }

        let value = candidate.into_shared()?;
        let count = snapshot.count.load(Ordering::Relaxed);

        if count == snapshot.capacity() {
            let grown = Arc::new(snapshot.grown()?);

            tracing::debug!(
                old_capacity = snapshot.capacity(),
                new_capacity = grown.capacity(),
                count,
                "string set grew"
            );

            self.current.store(grown.clone());
            snapshot = grown;
        }

        snapshot.link(count, value.clone(), hash);
        snapshot.count.store(count + 1, Ordering::Release);

        Ok((true, value))
    }
}

fn sub_range(buffer: &[u16], start: usize, length: usize) -> Result<&[u16]> {
    let end = start
        .checked_add(length)
        .ok_or(Error::out_of_range("start + length", usize::MAX, buffer.len()))?;

    buffer
        .get(start..end)
        .ok_or(Error::out_of_range("start + length", end, buffer.len()))
}

//  The text being interned, compared by reference and converted only once it is known to be new.
trait Candidate {
    fn matches(&self, existing: &str) -> bool;

    fn into_shared(self) -> Result<Arc<str>>;
}

struct StrCandidate<S>(S);

impl<S> Candidate for StrCandidate<S>
where
    S: AsRef<str> + Into<Arc<str>>,
{
    fn matches(&self, existing: &str) -> bool {
        existing == self.0.as_ref()
    }

    fn into_shared(self) -> Result<Arc<str>> {
        Ok(self.0.into())
    }
}

struct UnitsCandidate<'a>(&'a [u16]);

impl Candidate for UnitsCandidate<'_> {
    fn matches(&self, existing: &str) -> bool {
        compare::str_equals_units(existing, self.0)
    }

    fn into_shared(self) -> Result<Arc<str>> {
        String::from_utf16(self.0)
            .map(Arc::from)
            .map_err(|_| Error::InvalidData("unpaired surrogate in UTF-16 input"))
    }
}

struct DebugStrings<'a>(&'a BucketsAndSlots);

impl fmt::Debug for DebugStrings<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.0.count.load(Ordering::Acquire);

        f.debug_list()
            .entries((0..count).filter_map(|i| self.0.slot(i)).map(|s| &s.value))
            .finish()
    }
}
