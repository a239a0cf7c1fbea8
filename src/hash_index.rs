use std::sync::atomic::{AtomicU64, Ordering};

use crate::address::LogicalAddress;

const BUCKET_SLOTS: usize = 8;
const TAG_BITS: u32 = 14;
const TAG_SHIFT: u32 = 48;
const TAG_MASK: u64 = (1 << TAG_BITS) - 1;
const ADDRESS_MASK: u64 = (1 << 48) - 1;
const PENDING_BIT: u64 = 1 << 62;
const TENTATIVE_BIT: u64 = 1 << 63;

/// Packed 64-bit bucket slot word: `[tentative:1][pending:1][tag:14][address:48]`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HashBucketEntry(u64);

impl HashBucketEntry {
    pub const EMPTY: HashBucketEntry = HashBucketEntry(0);

    pub fn new(tag: u16, address: LogicalAddress) -> Self {
        assert!((tag as u64) <= TAG_MASK);
        assert!(address <= ADDRESS_MASK);
        Self(((tag as u64) << TAG_SHIFT) | address)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn tag(&self) -> u16 {
        ((self.0 >> TAG_SHIFT) & TAG_MASK) as u16
    }

    pub fn address(&self) -> LogicalAddress {
        self.0 & ADDRESS_MASK
    }

    pub fn is_pending(&self) -> bool {
        self.0 & PENDING_BIT != 0
    }

    pub fn is_tentative(&self) -> bool {
        self.0 & TENTATIVE_BIT != 0
    }

    fn to_word(self) -> u64 {
        self.0
    }

    fn from_word(word: u64) -> Self {
        Self(word)
    }
}

/// `hash >> (64 - TAG_BITS)`, matching the high-bit tag convention used to
/// disambiguate keys that land in the same bucket.
pub fn tag_of(hash: u64) -> u16 {
    (hash >> (64 - TAG_BITS)) as u16
}

struct Bucket {
    slots: [AtomicU64; BUCKET_SLOTS],
}

impl Bucket {
    fn new() -> Self {
        Self {
            slots: Default::default(),
        }
    }
}

/// Opaque handle returned by [`HashIndex::find_or_create_tag`]; passed back
/// to [`HashIndex::install`] to complete a pointer-free bucket mutation.
pub struct BucketHandle {
    bucket: usize,
    slot: usize,
}

/// Minimal in-memory hash index used to exercise recovery end to end.
///
/// The full hash index (overflow buckets, resizing, concurrent readers) is an
/// external collaborator from the point of view of recovery; this
/// implementation provides just the `find_or_create_tag`/`install` surface
/// the design notes call for, backed by a fixed array of fixed-size buckets.
pub struct HashIndex {
    buckets: Vec<Bucket>,
    mask: u64,
}

impl HashIndex {
    pub fn with_capacity(num_buckets: usize) -> Self {
        let num_buckets = num_buckets.next_power_of_two().max(1);
        Self {
            buckets: (0..num_buckets).map(|_| Bucket::new()).collect(),
            mask: num_buckets as u64 - 1,
        }
    }

    fn bucket_index(&self, hash: u64) -> usize {
        (hash & self.mask) as usize
    }

    /// Finds the slot already holding `tag`, or reserves one for it: an
    /// empty slot if available, otherwise the slot whose address predates
    /// `begin_address` (it can no longer be reached by a live reader),
    /// otherwise the slot with the lowest address is reused.
    pub fn find_or_create_tag(
        &self,
        hash: u64,
        tag: u16,
        begin_address: LogicalAddress,
    ) -> (BucketHandle, HashBucketEntry) {
        let bucket_idx = self.bucket_index(hash);
        let bucket = &self.buckets[bucket_idx];

        let mut empty_slot = None;
        let mut stale_slot = None;
        let mut min_slot = 0usize;
        let mut min_address = u64::MAX;

        for (slot, cell) in bucket.slots.iter().enumerate() {
            let entry = HashBucketEntry::from_word(cell.load(Ordering::Acquire));
            if entry.is_empty() {
                if empty_slot.is_none() {
                    empty_slot = Some(slot);
                }
                continue;
            }
            if entry.tag() == tag {
                return (
                    BucketHandle {
                        bucket: bucket_idx,
                        slot,
                    },
                    entry,
                );
            }
            if entry.address() < begin_address && stale_slot.is_none() {
                stale_slot = Some(slot);
            }
            if entry.address() < min_address {
                min_address = entry.address();
                min_slot = slot;
            }
        }

        let slot = empty_slot.or(stale_slot).unwrap_or(min_slot);
        (
            BucketHandle {
                bucket: bucket_idx,
                slot,
            },
            HashBucketEntry::EMPTY,
        )
    }

    /// Writes `entry` into the slot identified by `handle` with a single
    /// atomic store; no caller ever dereferences a raw bucket pointer.
    pub fn install(&self, handle: &BucketHandle, entry: HashBucketEntry) {
        self.buckets[handle.bucket].slots[handle.slot].store(entry.to_word(), Ordering::Release);
    }

    /// Installs a single `(hash, address)` pair read back from a checkpoint,
    /// deriving the tag the same way a live insert would.
    pub fn restore_entry(&self, hash: u64, address: LogicalAddress) {
        let tag = tag_of(hash);
        let (handle, _) = self.find_or_create_tag(hash, tag, 0);
        self.install(&handle, HashBucketEntry::new(tag, address));
    }

    pub fn lookup(&self, hash: u64, tag: u16) -> Option<HashBucketEntry> {
        let bucket = &self.buckets[self.bucket_index(hash)];
        bucket
            .slots
            .iter()
            .map(|c| HashBucketEntry::from_word(c.load(Ordering::Acquire)))
            .find(|e| !e.is_empty() && e.tag() == tag)
    }
}
