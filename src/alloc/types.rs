//! Core identifiers, constants, and the packed slot address.
//!
//! This module defines the fundamental integer types shared across the
//! allocator: atom ids for interned component types, allocator ids handed
//! out by the global slot list, version counters for staleness detection,
//! and [`AllocSlot`], the bit-packed (chunk, row) address of one storage
//! row.
//!
//! ## Slot layout
//!
//! A slot packs its two coordinates into a single `u64`:
//!
//! ```text
//! | column chunk index (high 32) | chunk row index (low 32) |
//! ```
//!
//! The packed value gives slots a total order in which "later" slots
//! compare greater, so "highest occupied" and "lowest free" scans reduce
//! to plain integer comparisons and sorts stay cheap.

/// Dense integer assigned once per distinct component type.
///
/// Zero is reserved as "invalid / unassigned"; real atoms start at 1.
pub type AtomId = u32;

/// Reserved invalid atom id.
pub const ATOM_ID_INVALID: AtomId = 0;

/// Index of an allocator in the global allocator slot list. Recyclable.
pub type AllocatorId = u32;

/// Reserved id for allocators that are not (or no longer) registered.
pub const ALLOCATOR_ID_INVALID: AllocatorId = u32::MAX;

/// Monotone counter distinguishing reuses of the same allocator id.
pub type AllocatorVersion = u32;

/// Counter incremented by every pack pass of an allocator.
pub type PackVersion = u32;

/// Caller-chosen identifier (e.g. an entity id) mapped to an internal slot.
pub type ExternalId = u64;

/// Default number of rows per chunk.
pub const DEFAULT_CHUNK_SIZE: u32 = 1000;

const ROW_BITS: u32 = 32;
const ROW_MASK: u64 = (1u64 << ROW_BITS) - 1;

/// Packed (column chunk index, chunk row index) address of one storage row.
///
/// ## Invariants
/// - The row index is always `< chunk_size` of the owning allocator.
/// - Ordering follows the packed value: chunk index major, row index minor.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AllocSlot(u64);

impl AllocSlot {
    /// Creates a slot from its chunk and row coordinates.
    #[inline]
    pub const fn new(chunk_index: u32, row_index: u32) -> Self {
        Self(((chunk_index as u64) << ROW_BITS) | row_index as u64)
    }

    /// Index of the chunk within its column.
    #[inline]
    pub const fn chunk_index(self) -> u32 {
        (self.0 >> ROW_BITS) as u32
    }

    /// Row index within the chunk.
    #[inline]
    pub const fn row_index(self) -> u32 {
        (self.0 & ROW_MASK) as u32
    }

    /// The raw packed value, exposed for sorting and diagnostics.
    #[inline]
    pub const fn packed(self) -> u64 {
        self.0
    }

    /// Number of rows addressed below this slot, given the chunk capacity.
    #[inline]
    pub const fn linear_index(self, chunk_size: u32) -> u64 {
        self.chunk_index() as u64 * chunk_size as u64 + self.row_index() as u64
    }
}

impl std::fmt::Debug for AllocSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AllocSlot(chunk {}, row {})", self.chunk_index(), self.row_index())
    }
}
