//! Chunked columnar storage and type-erased column access.
//!
//! This module implements the storage layer of the allocator:
//!
//! - [`Chunk<T>`]: a fixed-capacity, type-homogeneous segment of one
//!   component column. The unit of allocation and deallocation for
//!   backing memory.
//! - [`Column<T>`]: the ordered sequence of chunks for one component type
//!   within one allocator.
//! - [`AnyColumn`]: the type-erased interface the allocator dispatches
//!   through when it touches every column in lockstep. Columns are
//!   selected by atom id, so no per-access type inspection occurs; the
//!   concrete element type is recovered by downcasting only on the typed
//!   access paths.
//!
//! # Storage model
//!
//! Each chunk owns exactly `chunk_size` rows of `T`, default-initialized
//! at construction. Occupied rows are tracked by a count, not a bitmap:
//! the allocator guarantees occupied rows form a dense prefix of the
//! allocator-wide slot order (packing restores density after frees), so a
//! chunk only needs to know how many of its rows are in use and when it
//! may be destroyed (occupancy zero, last chunk of its column).
//!
//! # Identity
//!
//! Every chunk carries the (allocator id, allocator version, column chunk
//! index) triple it was created for. Token-based access verifies the
//! token against these tags, which catches stale and foreign tokens in
//! debug and `verify` builds.
//!
//! # Mutators
//!
//! `on_alloc_slot`, `on_free_slot`, and `on_pack_slot` are the only
//! operations that change occupancy or slot contents:
//!
//! - alloc: occupancy rises; the row is cleared in debug builds only
//!   (release keeps stale bytes, the caller is expected to overwrite).
//! - free: occupancy drops; the row is cleared in every build so recycled
//!   slots read back as the zero value.
//! - pack: the source row moves into the destination row (the source is
//!   left cleared, which exposes dangling reads as zero values).

use std::any::{type_name, Any, TypeId};

use crate::alloc::atom::Component;
use crate::alloc::token::AllocToken;
use crate::alloc::types::{AllocatorId, AllocatorVersion};

/// Tags binding a chunk to its owner.
///
/// A chunk belongs to exactly one (allocator id, allocator version,
/// column chunk index) triple at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkIdentity {
    /// Id of the owning allocator.
    pub allocator_id: AllocatorId,
    /// Version of the owning allocator (distinguishes id reuse).
    pub allocator_version: AllocatorVersion,
    /// Index of this chunk within its column.
    pub column_chunk_index: u32,
}

/// Fixed-capacity contiguous storage for one component type.
pub struct Chunk<T> {
    identity: ChunkIdentity,
    storage: Box<[T]>,
    occupancy: u32,
    write_version: u32,
}

impl<T: Component> Chunk<T> {
    /// Allocates a chunk with exactly `capacity` default-initialized rows.
    pub fn new(capacity: u32, identity: ChunkIdentity) -> Self {
        Self {
            identity,
            storage: vec![T::default(); capacity as usize].into_boxed_slice(),
            occupancy: 0,
            write_version: 0,
        }
    }

    /// Number of rows this chunk holds.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.storage.len() as u32
    }

    /// Number of rows currently in use.
    #[inline]
    pub fn occupancy(&self) -> u32 {
        self.occupancy
    }

    /// Counter incremented on every externally observed write.
    #[inline]
    pub fn write_version(&self) -> u32 {
        self.write_version
    }

    /// The (allocator, version, column index) triple this chunk serves.
    #[inline]
    pub fn identity(&self) -> ChunkIdentity {
        self.identity
    }

    /// Read-only view of every row, occupied or not.
    ///
    /// ## Notes
    /// Intended for bulk iteration by systems that track occupancy
    /// through the owning allocator.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.storage
    }

    /// Returns the row at `row_index`, if it is within capacity.
    pub fn get(&self, row_index: u32) -> Option<&T> {
        self.storage.get(row_index as usize)
    }

    /// Verifies that a token addresses this exact chunk.
    fn verify_token(&self, token: &AllocToken) {
        debug_check!(
            token.allocator_id == self.identity.allocator_id
                && token.allocator_version == self.identity.allocator_version
                && token.slot.chunk_index() == self.identity.column_chunk_index,
            "token does not belong to this chunk (token {:?}, chunk {:?})",
            token.slot,
            self.identity
        );
        debug_check!(
            (token.slot.row_index() as usize) < self.storage.len(),
            "row {} beyond chunk capacity {}",
            token.slot.row_index(),
            self.storage.len()
        );
    }

    /// Returns a read reference to the row addressed by `token`.
    pub fn read_ref(&self, token: &AllocToken) -> &T {
        self.verify_token(token);
        &self.storage[token.slot.row_index() as usize]
    }

    /// Returns a write reference to the row addressed by `token`.
    ///
    /// Increments the chunk write-version. The per-entity field-write
    /// counter is maintained by the allocator, which owns the metadata
    /// column.
    pub fn write_ref(&mut self, token: &AllocToken) -> &mut T {
        self.verify_token(token);
        self.write_version += 1;
        &mut self.storage[token.slot.row_index() as usize]
    }

    /// Direct row access without version bookkeeping (internal paths).
    #[inline]
    pub(crate) fn row(&self, row_index: u32) -> &T {
        &self.storage[row_index as usize]
    }

    /// Direct mutable row access without version bookkeeping.
    #[inline]
    pub(crate) fn row_mut(&mut self, row_index: u32) -> &mut T {
        &mut self.storage[row_index as usize]
    }

    fn on_alloc_slot(&mut self, token: &AllocToken) {
        self.verify_token(token);
        self.occupancy += 1;
        if cfg!(any(debug_assertions, feature = "verify")) {
            // freed rows are already cleared; this catches paths that skip it
            self.storage[token.slot.row_index() as usize] = T::default();
        }
    }

    fn on_free_slot(&mut self, token: &AllocToken) {
        self.verify_token(token);
        debug_check!(self.occupancy > 0, "freeing a slot in an empty chunk");
        self.occupancy -= 1;
        self.storage[token.slot.row_index() as usize] = T::default();
    }

    fn on_pack_take(&mut self, token: &AllocToken) -> T {
        self.verify_token(token);
        std::mem::take(&mut self.storage[token.slot.row_index() as usize])
    }

    fn on_pack_place(&mut self, token: &AllocToken, value: T) {
        self.verify_token(token);
        self.occupancy += 1;
        self.storage[token.slot.row_index() as usize] = value;
    }
}

/// Ordered sequence of chunks for one component type within one allocator.
pub struct Column<T> {
    chunks: Vec<Chunk<T>>,
}

impl<T: Component> Column<T> {
    /// Creates an empty column. Chunks are added by the owning allocator.
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    /// The chunks of this column, in column order.
    #[inline]
    pub fn chunks(&self) -> &[Chunk<T>] {
        &self.chunks
    }

    /// Returns the chunk at `chunk_index`, if allocated.
    pub fn chunk(&self, chunk_index: u32) -> Option<&Chunk<T>> {
        self.chunks.get(chunk_index as usize)
    }

    #[inline]
    pub(crate) fn chunk_mut(&mut self, chunk_index: u32) -> &mut Chunk<T> {
        &mut self.chunks[chunk_index as usize]
    }
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased column interface.
///
/// The allocator touches every column of an archetype in lockstep during
/// alloc, free, pack, chunk growth, and teardown. Those operations do not
/// depend on the element type and dispatch through this trait; columns
/// are stored in a dense array indexed by atom id.
///
/// ## Downcasting
/// Implementers return `self` as `&dyn Any` so typed access paths can
/// recover the concrete [`Column<T>`].
pub trait AnyColumn: Any + Send + Sync {
    /// `TypeId` of the element type stored by this column.
    fn element_type_id(&self) -> TypeId;

    /// Human-readable element type name, for diagnostics.
    fn element_type_name(&self) -> &'static str;

    /// Number of chunks currently allocated.
    fn chunk_count(&self) -> usize;

    /// Occupancy of the chunk at `chunk_index`.
    fn chunk_occupancy(&self, chunk_index: u32) -> u32;

    /// Appends one chunk of `capacity` rows carrying `identity`.
    fn push_chunk(&mut self, capacity: u32, identity: ChunkIdentity);

    /// Destroys the trailing chunk.
    ///
    /// Only the last chunk of a column may be destroyed, and only while
    /// provably empty; interior chunks are never removed.
    fn pop_chunk(&mut self);

    /// Marks the slot addressed by `token` occupied.
    fn on_alloc_slot(&mut self, token: &AllocToken);

    /// Vacates the slot addressed by `token` and clears its row.
    fn on_free_slot(&mut self, token: &AllocToken);

    /// Moves the component value from `src`'s row into `dest`'s row.
    ///
    /// Destination occupancy rises; the source slot is vacated separately
    /// through [`AnyColumn::on_free_slot`].
    fn on_pack_slot(&mut self, dest: &AllocToken, src: &AllocToken);

    /// Releases every chunk. Full-teardown path: occupancy is ignored.
    fn clear(&mut self);

    /// Immutable type-erased reference for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable type-erased reference for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyColumn for Column<T> {
    fn element_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn element_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn chunk_occupancy(&self, chunk_index: u32) -> u32 {
        self.chunks[chunk_index as usize].occupancy()
    }

    fn push_chunk(&mut self, capacity: u32, identity: ChunkIdentity) {
        debug_check!(
            self.chunks.len() == identity.column_chunk_index as usize,
            "column chunk allocation out of step: have {}, allocating index {}",
            self.chunks.len(),
            identity.column_chunk_index
        );
        self.chunks.push(Chunk::new(capacity, identity));
    }

    fn pop_chunk(&mut self) {
        let removed = self.chunks.pop();
        debug_check!(
            matches!(&removed, Some(chunk) if chunk.occupancy() == 0),
            "destroyed a chunk that was missing or still occupied"
        );
    }

    fn on_alloc_slot(&mut self, token: &AllocToken) {
        self.chunk_mut(token.slot.chunk_index()).on_alloc_slot(token);
    }

    fn on_free_slot(&mut self, token: &AllocToken) {
        self.chunk_mut(token.slot.chunk_index()).on_free_slot(token);
    }

    fn on_pack_slot(&mut self, dest: &AllocToken, src: &AllocToken) {
        debug_check!(
            dest.slot < src.slot,
            "pack must move data downward (dest {:?}, src {:?})",
            dest.slot,
            src.slot
        );
        let value = self.chunk_mut(src.slot.chunk_index()).on_pack_take(src);
        self.chunk_mut(dest.slot.chunk_index()).on_pack_place(dest, value);
    }

    fn clear(&mut self) {
        self.chunks.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
