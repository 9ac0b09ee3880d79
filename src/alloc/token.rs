//! Tokens: the externally held handles into allocator storage.
//!
//! An [`AllocToken`] bundles everything needed to reach one entity's
//! component rows: the owning allocator's id and version, the packed slot
//! address, the caller's external id, and the allocator's pack version at
//! issuance. Tokens are cheap copyable values with no ownership; they do
//! not keep chunks or allocators alive.
//!
//! ## Freshness
//!
//! A token moves through three states, with no way back:
//!
//! - **Fresh**: the pack version matches the allocator (or packing is
//!   disabled for it). Component access is valid.
//! - **Stale**: the allocator packed since issuance. The entity may have
//!   moved; re-resolve the external id through
//!   [`Allocator::lookup`](crate::alloc::allocator::Allocator::lookup)
//!   for a fresh token.
//! - **Dead**: the allocator id/version no longer name a live allocator.
//!
//! Reading through a stale or dead token is a contract violation, caught
//! in debug and `verify` builds.

use crate::alloc::allocator::Allocator;
use crate::alloc::atom::Component;
use crate::alloc::types::{AllocSlot, AllocatorId, AllocatorVersion, ExternalId, PackVersion};

/// Handle addressing one entity's storage within one allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocToken {
    /// Whether this token was produced by a successful allocation.
    pub alive: bool,
    /// The caller-chosen id this token was issued for.
    pub external_id: ExternalId,
    /// Id of the allocator that issued the token.
    pub allocator_id: AllocatorId,
    /// Version of the issuing allocator (detects allocator-id reuse).
    pub allocator_version: AllocatorVersion,
    /// Packed (chunk, row) address of the entity's rows.
    pub slot: AllocSlot,
    /// The allocator's pack version when the token was issued.
    pub pack_version: PackVersion,
}

impl AllocToken {
    /// Resolves this token's freshness against `allocator`.
    pub fn state(&self, allocator: &Allocator) -> TokenState {
        allocator.token_state(self)
    }

    /// Borrows the entity's `T` value through `allocator`.
    ///
    /// Equivalent to
    /// [`Allocator::read_ref`](crate::alloc::allocator::Allocator::read_ref).
    pub fn component_ref<'a, T: Component>(&self, allocator: &'a Allocator) -> &'a T {
        allocator.read_ref(self)
    }

    /// Mutably borrows the entity's `T` value through `allocator`.
    ///
    /// Equivalent to
    /// [`Allocator::write_ref`](crate::alloc::allocator::Allocator::write_ref).
    pub fn component_mut<'a, T: Component>(&self, allocator: &'a mut Allocator) -> &'a mut T {
        allocator.write_ref(self)
    }

    /// Returns `true` when both tokens address the same allocation.
    ///
    /// The pack version is deliberately ignored: a refreshed token and
    /// the copy recorded at issuance differ only in that field.
    pub fn same_allocation(&self, other: &AllocToken) -> bool {
        self.alive == other.alive
            && self.external_id == other.external_id
            && self.allocator_id == other.allocator_id
            && self.allocator_version == other.allocator_version
            && self.slot == other.slot
    }
}

/// Freshness of a token relative to its allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenState {
    /// Valid for component access.
    Fresh,
    /// The allocator packed since issuance; refresh through the lookup.
    Stale,
    /// The allocator id/version no longer match a live allocator.
    Dead,
}

/// Built-in meta component present in every allocator.
///
/// Occupies a reserved column alongside the user component columns and
/// participates in every alloc/free/pack step identically to them. The
/// shadow token lets verification cross-check any caller-supplied token
/// against what storage believes, and lets packing recover the live token
/// occupying the highest slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocMetadata {
    /// Shadow copy of the entity's own token.
    pub token: AllocToken,
    /// How many component columns this entity's archetype stores.
    pub component_count: u32,
    /// Counts write references handed out for this entity's rows.
    ///
    /// Maintained internally by the allocator's write path; incrementing
    /// it does not advance the metadata chunk's write-version, so that
    /// counter keeps reflecting alloc/free traffic.
    pub field_writes: u32,
}

impl AllocMetadata {
    /// Whether the slot holding this metadata is in use by an entity.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.token.alive
    }
}
