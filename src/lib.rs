//! # Archetype Alloc
//!
//! Chunked, columnar slot allocator for archetype-based entity storage.
//!
//! An [`Allocator`] owns one column of fixed-capacity chunks per component
//! type and packs the component data of many entities densely from slot
//! zero upward. Callers address entities through [`AllocToken`] handles
//! that survive relocation: when packing moves an entity, the token held
//! by the caller goes stale and is refreshed through the allocator's
//! external-id lookup.
//!
//! ## Design Goals
//! - Atom-indexed column dispatch (no per-access type hashing)
//! - Dense, chunk-aligned columnar storage for cache efficiency
//! - In-place defragmentation that preserves referential correctness
//! - Detectable misuse: stale tokens, double free, use after dispose
//!
//! Component references are plain borrows of the owning allocator and are
//! valid only until its next structural mutation, so a reference can never
//! outlive the storage row it points into.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod alloc;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use alloc::allocator::{
    allocator_stamp,
    Allocator,
    AllocatorConfig,
    AllocatorStamp,
};

pub use alloc::atom::{
    atom_id_of,
    atom_type_id,
    atom_type_name,
    registered_atom_count,
    try_atom_id,
    Component,
};

pub use alloc::chunk::{
    AnyColumn,
    Chunk,
    ChunkIdentity,
    Column,
};

pub use alloc::error::AccessError;

pub use alloc::slots::SlotList;

pub use alloc::token::{
    AllocMetadata,
    AllocToken,
    TokenState,
};

pub use alloc::types::{
    AllocSlot,
    AllocatorId,
    AllocatorVersion,
    AtomId,
    ExternalId,
    PackVersion,
    ALLOCATOR_ID_INVALID,
    ATOM_ID_INVALID,
    DEFAULT_CHUNK_SIZE,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used allocator types.
///
/// Import with:
/// ```rust
/// use archetype_alloc::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        atom_id_of,
        AllocMetadata,
        AllocSlot,
        AllocToken,
        Allocator,
        AllocatorConfig,
        Component,
        ExternalId,
        TokenState,
    };
}
