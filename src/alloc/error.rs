//! Error types for token-based component access.
//!
//! Contract violations in this crate are normally caught by assertion
//! tiers (see `check`) and abort loudly. The fallible access paths
//! (`Allocator::try_read_ref` / `try_write_ref`) exist for callers that
//! hold tokens of unknown freshness and want to interrogate them instead
//! of upholding the freshness contract themselves; those paths report
//! failures through [`AccessError`].
//!
//! `Display` messages are single-line and operator-facing; `Debug`
//! (derived) retains full structure for diagnostics.

use std::fmt;

use crate::alloc::types::{AllocatorId, AllocatorVersion, AtomId, PackVersion};

/// Why a token could not be used to reach component storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// The token was never produced by a successful allocation.
    NotAlive,

    /// The token's allocator id/version no longer name a live allocator.
    ///
    /// The entity may still exist under a refreshed token; the holder must
    /// re-resolve the external id through a live allocator's lookup.
    Dead {
        /// Allocator id carried by the token.
        allocator_id: AllocatorId,
        /// Allocator version carried by the token.
        allocator_version: AllocatorVersion,
    },

    /// The allocator packed since the token was issued.
    Stale {
        /// Pack version recorded in the token at issuance.
        token_pack_version: PackVersion,
        /// The allocator's current pack version.
        current_pack_version: PackVersion,
    },

    /// The allocator does not store a column for the requested component.
    MissingColumn {
        /// Atom id of the requested component type.
        atom_id: AtomId,
    },

    /// The allocator was disposed.
    Disposed,
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::NotAlive => f.write_str("token is not alive"),
            AccessError::Dead { allocator_id, allocator_version } => write!(
                f,
                "token refers to a dead allocator (id {}, version {})",
                allocator_id, allocator_version
            ),
            AccessError::Stale { token_pack_version, current_pack_version } => write!(
                f,
                "token is stale: issued at pack version {}, allocator is at {}",
                token_pack_version, current_pack_version
            ),
            AccessError::MissingColumn { atom_id } => {
                write!(f, "allocator has no column for atom id {}", atom_id)
            }
            AccessError::Disposed => f.write_str("allocator was disposed"),
        }
    }
}

impl std::error::Error for AccessError {}
