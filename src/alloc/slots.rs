//! Generic slot list: a growable table with recyclable integer handles.
//!
//! ## Purpose
//! Assigns small, dense integer ids to objects so that other code can
//! reference them by index instead of by object reference. Used globally
//! to identify allocator instances; the same structure fits any object
//! pool with recyclable handles.
//!
//! ## Design
//! - `alloc_slot` pops a recycled index if one exists, otherwise grows
//!   storage by one and returns the new highest index.
//! - `free_slot` nulls the stored value and marks the index free. When
//!   the freed index is the current last element, any contiguous run of
//!   trailing free indices is truncated away, keeping storage tight
//!   without a full compaction pass.
//!
//! ## Invariants
//! - An index returned by `alloc_slot` is never handed out again until it
//!   is freed.
//! - Reading an unallocated index yields `None`, never stale data.
//!
//! ## Concurrency
//! The free list and the backing storage are synchronized independently,
//! so allocation and freeing proceed with short, separate exclusion
//! regions. Snapshot reads are safe concurrently with slot recycling but
//! serialize against storage growth.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, RwLock,
};

/// Growable array of optional values with O(1) handle recycling.
pub struct SlotList<T> {
    storage: RwLock<Vec<Option<T>>>,
    free: Mutex<Vec<usize>>,
    live: AtomicUsize,
}

impl<T> SlotList<T> {
    /// Creates an empty slot list. Usable in `static` position.
    pub const fn new() -> Self {
        Self {
            storage: RwLock::new(Vec::new()),
            free: Mutex::new(Vec::new()),
            live: AtomicUsize::new(0),
        }
    }

    /// Reserves a slot index, recycling a freed one when available.
    ///
    /// The slot starts empty; store a value with [`SlotList::set`].
    pub fn alloc_slot(&self) -> usize {
        let recycled = self.free.lock().expect("slot free list poisoned").pop();

        let slot = match recycled {
            Some(slot) => {
                debug_check!(
                    self.storage.read().expect("slot storage poisoned")[slot].is_none(),
                    "recycled slot {slot} still holds a value"
                );
                slot
            }
            None => {
                let mut storage = self.storage.write().expect("slot storage poisoned");
                storage.push(None);
                storage.len() - 1
            }
        };

        self.live.fetch_add(1, Ordering::Relaxed);
        slot
    }

    /// Stores a value in a previously reserved slot.
    pub fn set(&self, slot: usize, value: T) {
        let mut storage = self.storage.write().expect("slot storage poisoned");
        debug_check!(slot < storage.len(), "slot {slot} was never reserved");
        storage[slot] = Some(value);
    }

    /// Nulls the slot, marks it free, and truncates trailing free runs.
    pub fn free_slot(&self, slot: usize) {
        let mut free = self.free.lock().expect("slot free list poisoned");
        let mut storage = self.storage.write().expect("slot storage poisoned");

        debug_check!(slot < storage.len(), "freeing slot {slot} beyond storage");
        storage[slot] = None;
        free.push(slot);
        self.live.fetch_sub(1, Ordering::Relaxed);

        if slot + 1 == storage.len() {
            // the freed slot is the last element: drop every trailing free
            free.sort_unstable();
            while let Some(&last) = free.last() {
                if last + 1 != storage.len() {
                    break;
                }
                free.pop();
                let removed = storage.pop();
                debug_check!(
                    matches!(removed, Some(None)),
                    "truncated a slot that still held a value"
                );
            }
        }
    }

    /// Returns a copy of the value stored at `slot`, if any.
    pub fn get(&self, slot: usize) -> Option<T>
    where
        T: Clone,
    {
        let storage = self.storage.read().expect("slot storage poisoned");
        storage.get(slot).and_then(|v| v.clone())
    }

    /// Runs `f` against a read-locked snapshot of the live storage.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&[Option<T>]) -> R) -> R {
        let storage = self.storage.read().expect("slot storage poisoned");
        f(&storage)
    }

    /// Current storage length (highest reserved index + 1).
    pub fn len(&self) -> usize {
        self.storage.read().expect("slot storage poisoned").len()
    }

    /// Returns `true` if no slots are reserved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of currently reserved (not yet freed) slots.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

impl<T> Default for SlotList<T> {
    fn default() -> Self {
        Self::new()
    }
}
