//! # Allocator core
//!
//! The central orchestration layer of the storage system, responsible for:
//!
//! * owning one column of chunks per component type (indexed by atom id),
//! * assigning slots to caller-supplied external ids,
//! * deallocation and in-place packing (defragmentation) across all
//!   columns in lockstep,
//! * the external-id → token lookup that lets callers refresh handles
//!   after packing,
//! * the global registry of allocator instances.
//!
//! ## Slot discipline
//!
//! Occupied slots always form a dense prefix of the slot order. New
//! allocations either recycle a freed slot (highest free first, which
//! keeps reuse close to live data) or take the next slot from the
//! position cursor. Frees punch holes; packing moves the highest occupied
//! entity into the lowest hole and retracts the cursor, so holes never
//! outlive the next pack pass when `auto_pack` is on.
//!
//! Chunks grow and shrink with the cursor: allocating the first row of a
//! new chunk grows every column by one chunk, and retracting out of a
//! chunk destroys it in every column once it is provably empty.
//!
//! ## Concurrency model
//!
//! `alloc`, `free`, and `pack` take `&mut self` and are not callable
//! concurrently on one allocator by construction. The per-column loop
//! inside `free` is deliberately parallel (columns never alias). Distinct
//! allocators share only the atom registry and the global allocator slot
//! list.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::alloc::atom::{atom_id_of, atom_type_id, new_column, Component};
use crate::alloc::chunk::{AnyColumn, ChunkIdentity, Column};
use crate::alloc::error::AccessError;
use crate::alloc::slots::SlotList;
use crate::alloc::token::{AllocMetadata, AllocToken, TokenState};
use crate::alloc::types::{
    AllocSlot, AllocatorId, AllocatorVersion, AtomId, ExternalId, PackVersion,
    ALLOCATOR_ID_INVALID, DEFAULT_CHUNK_SIZE,
};

/// Global slot list of allocator registrations.
///
/// Tokens carry an allocator id (an index into this list) instead of an
/// object reference; the stamp stored here lets any token holder detect a
/// dead id without reaching the allocator itself.
static GLOBAL_ALLOCATORS: SlotList<AllocatorStamp> = SlotList::new();

/// Source of allocator versions. Never reused, so a recycled allocator id
/// combined with the version still identifies one logical allocator.
static VERSION_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Registration record of a live allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatorStamp {
    /// The allocator's version.
    pub version: AllocatorVersion,
    /// Hash of the allocator's component type set (meta columns excluded).
    pub components_hash: u64,
}

/// Returns the registration stamp for `allocator_id`, if that id is live.
pub fn allocator_stamp(allocator_id: AllocatorId) -> Option<AllocatorStamp> {
    GLOBAL_ALLOCATORS.get(allocator_id as usize)
}

/// Configuration of an [`Allocator`], fixed before `initialize`.
#[derive(Clone, Debug)]
pub struct AllocatorConfig {
    /// Rows per chunk.
    pub chunk_size: u32,
    /// Reclaim freed slots immediately inside `free`.
    pub auto_pack: bool,
    /// Atom ids of the archetype's component types.
    pub components: Vec<AtomId>,
    /// Always-present per-entity meta components.
    ///
    /// Contains [`AllocMetadata`] by default; do not remove it. These do
    /// not contribute to the component-set hash.
    pub custom_meta: Vec<AtomId>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            auto_pack: true,
            components: Vec::new(),
            custom_meta: vec![atom_id_of::<AllocMetadata>()],
        }
    }
}

impl AllocatorConfig {
    /// Adds component type `T` to the archetype, registering its atom.
    pub fn with_component<T: Component>(mut self) -> Self {
        self.components.push(atom_id_of::<T>());
        self
    }

    /// Adds an extra always-present meta component beyond [`AllocMetadata`].
    pub fn with_meta_component<T: Component>(mut self) -> Self {
        self.custom_meta.push(atom_id_of::<T>());
        self
    }
}

/// Tracks the next slot to hand out and the chunk growth/shrink boundary.
///
/// A column's chunk count always equals `max(1, ceil(occupied / size))`:
/// advancing into the first row of chunk k (k > 0) signals chunk
/// allocation, retracting back onto the first row of chunk k signals that
/// chunk k just emptied and can be destroyed. Chunk 0 is never destroyed.
#[derive(Clone, Copy, Debug)]
struct SlotCursor {
    chunk_size: u32,
    next: AllocSlot,
}

impl SlotCursor {
    fn new(chunk_size: u32) -> Self {
        Self { chunk_size, next: AllocSlot::new(0, 0) }
    }

    /// Hands out the next slot; `true` means the slot starts a new chunk.
    fn advance(&mut self) -> (AllocSlot, bool) {
        let slot = self.next;
        let needs_chunk = slot.row_index() == 0 && slot.chunk_index() > 0;

        self.next = if slot.row_index() + 1 >= self.chunk_size {
            AllocSlot::new(slot.chunk_index() + 1, 0)
        } else {
            AllocSlot::new(slot.chunk_index(), slot.row_index() + 1)
        };

        (slot, needs_chunk)
    }

    /// Steps the cursor back one slot; `true` means the trailing chunk
    /// just emptied.
    fn retract(&mut self) -> bool {
        debug_check!(
            self.next != AllocSlot::new(0, 0),
            "cursor retracted below the first slot"
        );

        if self.next.row_index() == 0 {
            // the emptied chunk was already destroyed when we entered row 0
            self.next = AllocSlot::new(self.next.chunk_index() - 1, self.chunk_size - 1);
            false
        } else {
            self.next = AllocSlot::new(self.next.chunk_index(), self.next.row_index() - 1);
            self.next.row_index() == 0 && self.next.chunk_index() > 0
        }
    }

    /// The highest currently occupied slot, or `None` when empty.
    fn highest_occupied(&self) -> Option<AllocSlot> {
        if self.next.row_index() > 0 {
            Some(AllocSlot::new(self.next.chunk_index(), self.next.row_index() - 1))
        } else if self.next.chunk_index() > 0 {
            Some(AllocSlot::new(self.next.chunk_index() - 1, self.chunk_size - 1))
        } else {
            None
        }
    }

    /// The next slot the cursor would hand out.
    fn position(&self) -> AllocSlot {
        self.next
    }
}

/// Columnar slot allocator for one archetype.
///
/// See the [module documentation](self) for the storage model. All
/// structural operations (`alloc`, `free`, `pack`, `dispose`) take
/// `&mut self`; component references handed out earlier are borrows of
/// the allocator and therefore cannot outlive a structural mutation.
pub struct Allocator {
    allocator_id: AllocatorId,
    version: AllocatorVersion,
    chunk_size: u32,
    auto_pack: bool,
    component_atoms: Vec<AtomId>,
    meta_atoms: Vec<AtomId>,
    atoms_used: Vec<AtomId>,
    components_hash: u64,
    /// One column per atom id in use; dense, indexed by atom id.
    columns: Vec<Option<Box<dyn AnyColumn>>>,
    /// external id → current token. The decoupling that makes packing
    /// possible: callers re-resolve here after their tokens go stale.
    lookup: HashMap<ExternalId, AllocToken>,
    /// Slots freed since the last pack. Sorted ascending when
    /// `free_sorted` is set.
    free: Vec<AllocSlot>,
    free_sorted: bool,
    pack_version: PackVersion,
    cursor: SlotCursor,
    initialized: bool,
    disposed: bool,
}

impl Allocator {
    /// Creates an allocator from its configuration.
    ///
    /// The allocator is inert until [`Allocator::initialize`] runs.
    pub fn new(config: AllocatorConfig) -> Self {
        debug_check!(config.chunk_size > 0, "chunk_size must be at least 1");

        let version = VERSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let cursor = SlotCursor::new(config.chunk_size);

        Self {
            allocator_id: ALLOCATOR_ID_INVALID,
            version,
            chunk_size: config.chunk_size,
            auto_pack: config.auto_pack,
            component_atoms: config.components,
            meta_atoms: config.custom_meta,
            atoms_used: Vec::new(),
            components_hash: 0,
            columns: Vec::new(),
            lookup: HashMap::new(),
            free: Vec::new(),
            free_sorted: true,
            pack_version: 0,
            cursor,
            initialized: false,
            disposed: false,
        }
    }

    /// Registers the allocator globally and allocates the first chunk of
    /// every column.
    ///
    /// ## Panics
    /// Panics when called twice, after dispose, or when the configured
    /// meta components do not include [`AllocMetadata`].
    pub fn initialize(&mut self) {
        assert!(!self.initialized, "allocator initialized twice");
        assert!(!self.disposed, "initialize after dispose");
        assert!(
            self.meta_atoms.contains(&atom_id_of::<AllocMetadata>()),
            "custom meta components must keep AllocMetadata"
        );

        self.allocator_id = GLOBAL_ALLOCATORS.alloc_slot() as AllocatorId;

        // fast archetype matching hash; meta columns deliberately excluded
        let mut hash = 0u64;
        for &atom in &self.component_atoms {
            let mut hasher = DefaultHasher::new();
            atom_type_id(atom).hash(&mut hasher);
            hash = hash.wrapping_add(hasher.finish());
        }
        self.components_hash = hash;

        self.atoms_used =
            self.component_atoms.iter().chain(self.meta_atoms.iter()).copied().collect();

        let columns_len = self
            .atoms_used
            .iter()
            .map(|&a| a as usize + 1)
            .max()
            .unwrap_or(0);
        self.columns = (0..columns_len).map(|_| None).collect();

        for &atom in &self.atoms_used {
            debug_check!(
                self.columns[atom as usize].is_none(),
                "atom id {atom} configured twice for one allocator"
            );
            self.columns[atom as usize] = Some(new_column(atom));
        }

        // first (blank) chunk for every column
        self.push_chunk_all(0);

        self.initialized = true;
        GLOBAL_ALLOCATORS.set(
            self.allocator_id as usize,
            AllocatorStamp { version: self.version, components_hash: self.components_hash },
        );

        debug!(
            allocator_id = self.allocator_id,
            version = self.version,
            components = self.component_atoms.len(),
            chunk_size = self.chunk_size,
            "allocator initialized"
        );
    }

    // ── identity & introspection ────────────────────────────────────────────

    /// Id of this allocator in the global slot list.
    pub fn allocator_id(&self) -> AllocatorId {
        self.allocator_id
    }

    /// This allocator's version (distinguishes id reuse).
    pub fn version(&self) -> AllocatorVersion {
        self.version
    }

    /// Rows per chunk.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Whether `free` reclaims slots immediately.
    pub fn auto_pack(&self) -> bool {
        self.auto_pack
    }

    /// Current pack version; tokens issued before it are stale.
    pub fn pack_version(&self) -> PackVersion {
        self.pack_version
    }

    /// Hash of the component type set, for fast archetype matching.
    pub fn components_hash(&self) -> u64 {
        self.components_hash
    }

    /// Every atom id with a column in this allocator (meta included).
    pub fn atoms_used(&self) -> &[AtomId] {
        &self.atoms_used
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Returns `true` if no entities are allocated.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Number of chunks per column.
    pub fn chunk_count(&self) -> usize {
        self.metadata_column().chunks().len()
    }

    /// The slot the cursor would assign next.
    pub fn next_slot(&self) -> AllocSlot {
        self.cursor.position()
    }

    /// Whether [`Allocator::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Returns `true` if this allocator stores a column for `T`.
    pub fn has_component<T: Component>(&self) -> bool {
        let atom = atom_id_of::<T>();
        self.columns.get(atom as usize).map_or(false, |c| c.is_some())
    }

    /// Typed view of the column for `T`, if present.
    pub fn column<T: Component>(&self) -> Option<&Column<T>> {
        let atom = atom_id_of::<T>();
        self.columns
            .get(atom as usize)?
            .as_ref()?
            .as_any()
            .downcast_ref::<Column<T>>()
    }

    // ── lookup ──────────────────────────────────────────────────────────────

    /// Resolves an external id to its current token.
    ///
    /// This is the refresh path for stale tokens: the stored slot is
    /// correct by construction (packing rewrites it on every move), so
    /// the returned token is re-stamped with the current pack version
    /// and is immediately fresh.
    pub fn lookup(&self, external_id: ExternalId) -> Option<AllocToken> {
        self.lookup
            .get(&external_id)
            .map(|stored| AllocToken { pack_version: self.pack_version, ..*stored })
    }

    /// Returns `true` if `external_id` is currently allocated here.
    pub fn contains(&self, external_id: ExternalId) -> bool {
        self.lookup.contains_key(&external_id)
    }

    /// Iterates the current tokens of every live entity, freshly stamped.
    pub fn tokens(&self) -> impl Iterator<Item = AllocToken> + '_ {
        self.lookup
            .values()
            .map(|stored| AllocToken { pack_version: self.pack_version, ..*stored })
    }

    /// Iterates the external ids of every live entity.
    pub fn external_ids(&self) -> impl Iterator<Item = ExternalId> + '_ {
        self.lookup.keys().copied()
    }

    /// Resolves a token's freshness.
    pub fn token_state(&self, token: &AllocToken) -> TokenState {
        if self.disposed
            || !token.alive
            || token.allocator_id != self.allocator_id
            || token.allocator_version != self.version
        {
            TokenState::Dead
        } else if self.auto_pack && token.pack_version != self.pack_version {
            TokenState::Stale
        } else {
            TokenState::Fresh
        }
    }

    // ── alloc ───────────────────────────────────────────────────────────────

    /// Allocates one slot per external id and writes the issued tokens
    /// into `tokens`, same order.
    ///
    /// Slots come from the free list (highest free first, sorted for
    /// locality) or from the cursor, growing every column by a chunk when
    /// the cursor enters a new one. Each slot gets every column's
    /// `on_alloc_slot`, a fresh [`AllocMetadata`] row, and a lookup entry.
    ///
    /// ## Panics
    /// - if an external id is already allocated here (ids must be unique),
    /// - if the allocator is uninitialized or disposed (debug/`verify`).
    pub fn alloc(&mut self, external_ids: &[ExternalId], tokens: &mut [AllocToken]) {
        debug_check!(self.initialized && !self.disposed, "alloc on an unusable allocator");
        debug_check!(
            tokens.len() == external_ids.len(),
            "token output length {} != external id count {}",
            tokens.len(),
            external_ids.len()
        );

        if !self.free_sorted {
            self.free.sort_unstable();
            self.free_sorted = true;
        }

        for (i, &external_id) in external_ids.iter().enumerate() {
            let slot = match self.free.pop() {
                Some(slot) => {
                    strict_check!(
                        !self.metadata_row(slot).is_alive(),
                        "recycled slot {slot:?} still marked alive"
                    );
                    slot
                }
                None => {
                    let (slot, needs_chunk) = self.cursor.advance();
                    if needs_chunk {
                        self.push_chunk_all(slot.chunk_index());
                    }
                    slot
                }
            };

            let token = self.live_token(external_id, slot);

            for &atom in &self.atoms_used {
                self.columns[atom as usize]
                    .as_mut()
                    .expect("column missing for configured atom")
                    .on_alloc_slot(&token);
            }

            let component_count = self.atoms_used.len() as u32;
            {
                let metadata = self.metadata_row_mut(slot);
                strict_check!(
                    *metadata == AllocMetadata::default(),
                    "expected a cleared metadata row at {slot:?}"
                );
                *metadata = AllocMetadata { token, component_count, field_writes: 0 };
            }

            if self.lookup.insert(external_id, token).is_some() {
                panic!("external id {external_id} allocated twice");
            }

            strict_check!(
                self.metadata_row(slot).token == token,
                "metadata shadow token mismatch straight after alloc"
            );

            tokens[i] = token;
        }
    }

    fn live_token(&self, external_id: ExternalId, slot: AllocSlot) -> AllocToken {
        AllocToken {
            alive: true,
            external_id,
            allocator_id: self.allocator_id,
            allocator_version: self.version,
            slot,
            pack_version: self.pack_version,
        }
    }

    // ── free ────────────────────────────────────────────────────────────────

    /// Frees every listed external id, reclaiming the slots immediately
    /// when `auto_pack` is set.
    ///
    /// Resolved tokens are sorted by slot before the per-column teardown
    /// so consecutive frees tend to land in the same chunk. The column
    /// loop runs in parallel: distinct component columns never alias.
    ///
    /// ## Panics
    /// Panics if an id is not currently allocated here (double free or
    /// free of an unknown id).
    pub fn free(&mut self, external_ids: &[ExternalId]) {
        debug_check!(self.initialized && !self.disposed, "free on an unusable allocator");
        if external_ids.is_empty() {
            return;
        }

        let mut freed: Vec<AllocToken> = Vec::with_capacity(external_ids.len());
        for &external_id in external_ids {
            match self.lookup.remove(&external_id) {
                Some(token) => freed.push(token),
                None => panic!("free of unknown external id {external_id}"),
            }
        }
        freed.sort_unstable_by_key(|t| t.slot);

        self.columns.par_iter_mut().for_each(|column| {
            if let Some(column) = column {
                for token in &freed {
                    column.on_free_slot(token);
                }
            }
        });

        for token in &freed {
            strict_check!(
                !self.free.contains(&token.slot),
                "slot {:?} already on the free list",
                token.slot
            );
            self.free.push(token.slot);
        }
        self.free_sorted = false;

        if self.auto_pack {
            let prior_pack_version = self.pack_version;
            debug_check!(
                self.free.len() == freed.len(),
                "auto-pack allocators must enter free with an empty free list"
            );
            self.pack(freed.len());
            debug_check!(
                self.pack_version != prior_pack_version && self.free.is_empty(),
                "auto-pack failed to reclaim the freed slots"
            );
        }
    }

    // ── pack ────────────────────────────────────────────────────────────────

    /// Reclaims up to `max_count` free slots by moving the highest
    /// occupied entities into the lowest holes.
    ///
    /// Returns `false` when no free slots are recorded (nothing to do).
    /// Otherwise the pack version advances (staling outstanding tokens of
    /// auto-pack allocators), the free list is consumed lowest-first, and
    /// the cursor retracts once per reclaimed slot, destroying trailing
    /// chunks as they empty. Running out of occupied slots above the
    /// holes ends the pass early; that is an expected terminal condition.
    ///
    /// Packing never changes which external ids are live, only their
    /// physical slots and the tokens the lookup hands out.
    pub fn pack(&mut self, max_count: usize) -> bool {
        debug_check!(self.initialized && !self.disposed, "pack on an unusable allocator");
        if self.free.is_empty() {
            return false;
        }

        self.pack_version += 1;

        if !self.free_sorted {
            self.free.sort_unstable();
            self.free_sorted = true;
        }

        let mut lo = 0usize;
        let mut hi = self.free.len();
        let mut reclaimed = 0usize;

        while reclaimed < max_count && lo < hi {
            let Some(highest) = self.cursor.highest_occupied() else {
                break;
            };

            if self.free[hi - 1] == highest {
                // the top slot is itself a hole: retract straight over it
                hi -= 1;
                reclaimed += 1;
                self.retract_one();
                continue;
            }

            let lowest = self.free[lo];
            if lowest >= highest {
                // every remaining hole sits above the live region
                break;
            }

            let occupant = self.metadata_row(highest).token;
            debug_check!(
                occupant.alive && occupant.slot == highest,
                "highest occupied slot {highest:?} has no live occupant"
            );

            self.relocate(occupant, lowest);
            lo += 1;
            reclaimed += 1;
            self.retract_one();
        }

        self.free.drain(..lo);
        self.free.truncate(hi - lo);

        trace!(
            allocator_id = self.allocator_id,
            reclaimed,
            remaining_free = self.free.len(),
            "pack pass finished"
        );
        true
    }

    /// Moves the entity at `occupant`'s slot into `dest`, updating every
    /// column, the metadata shadow token, and the lookup.
    fn relocate(&mut self, occupant: AllocToken, dest: AllocSlot) {
        strict_check!(
            !self.metadata_row(dest).is_alive(),
            "pack destination {dest:?} is not free"
        );

        let new_token = self.live_token(occupant.external_id, dest);

        for &atom in &self.atoms_used {
            let column = self.columns[atom as usize]
                .as_mut()
                .expect("column missing for configured atom");
            column.on_pack_slot(&new_token, &occupant);
            column.on_free_slot(&occupant);
        }

        // the metadata row travelled with the move; repoint its shadow token
        {
            let metadata = self.metadata_row_mut(dest);
            metadata.token = new_token;
        }

        let previous = self.lookup.insert(new_token.external_id, new_token);
        debug_check!(
            previous.is_some(),
            "relocated external id {} was not in the lookup",
            new_token.external_id
        );

        strict_check!(
            self.metadata_row(dest).token == new_token,
            "metadata shadow token mismatch after relocation"
        );
    }

    fn retract_one(&mut self) {
        if self.cursor.retract() {
            self.free_last_chunk_all();
        }
    }

    // ── chunk management ────────────────────────────────────────────────────

    fn push_chunk_all(&mut self, chunk_index: u32) {
        let identity = ChunkIdentity {
            allocator_id: self.allocator_id,
            allocator_version: self.version,
            column_chunk_index: chunk_index,
        };

        for &atom in &self.atoms_used {
            let column = self.columns[atom as usize]
                .as_mut()
                .expect("column missing for configured atom");
            column.push_chunk(self.chunk_size, identity);
        }

        trace!(
            allocator_id = self.allocator_id,
            chunk_index,
            "grew every column by one chunk"
        );
    }

    fn free_last_chunk_all(&mut self) {
        let expected = self.cursor.position().chunk_index() as usize;
        for &atom in &self.atoms_used {
            let column = self.columns[atom as usize]
                .as_mut()
                .expect("column missing for configured atom");
            column.pop_chunk();
            debug_check!(
                column.chunk_count() == expected,
                "column chunk count out of step with the cursor after shrink"
            );
        }

        trace!(allocator_id = self.allocator_id, "destroyed the trailing chunk of every column");
    }

    // ── component access ────────────────────────────────────────────────────

    fn check_token(&self, token: &AllocToken) -> Result<(), AccessError> {
        if self.disposed {
            return Err(AccessError::Disposed);
        }
        if !token.alive {
            return Err(AccessError::NotAlive);
        }
        if token.allocator_id != self.allocator_id || token.allocator_version != self.version {
            return Err(AccessError::Dead {
                allocator_id: token.allocator_id,
                allocator_version: token.allocator_version,
            });
        }
        if self.auto_pack && token.pack_version != self.pack_version {
            return Err(AccessError::Stale {
                token_pack_version: token.pack_version,
                current_pack_version: self.pack_version,
            });
        }
        Ok(())
    }

    fn strict_verify_token(&self, token: &AllocToken) {
        // pack version is ignored here: refreshed tokens legitimately
        // differ from the stored copies in that field alone
        strict_check!(
            self.metadata_row(token.slot).token.same_allocation(token),
            "token does not match storage's shadow copy"
        );
        strict_check!(
            self.lookup
                .get(&token.external_id)
                .map_or(false, |stored| stored.same_allocation(token)),
            "token does not match the lookup entry for its external id"
        );
    }

    /// Borrows the entity's `T` value, verifying the token first.
    ///
    /// ## Errors
    /// Stale, dead, or foreign tokens and missing columns are reported as
    /// [`AccessError`]; stale holders should re-resolve via
    /// [`Allocator::lookup`].
    pub fn try_read_ref<T: Component>(&self, token: &AllocToken) -> Result<&T, AccessError> {
        self.check_token(token)?;
        self.strict_verify_token(token);

        let atom = atom_id_of::<T>();
        let column = self
            .columns
            .get(atom as usize)
            .and_then(|c| c.as_ref())
            .and_then(|c| c.as_any().downcast_ref::<Column<T>>())
            .ok_or(AccessError::MissingColumn { atom_id: atom })?;

        Ok(column.chunks()[token.slot.chunk_index() as usize].read_ref(token))
    }

    /// Mutably borrows the entity's `T` value, verifying the token first.
    ///
    /// A successful write reference bumps the chunk's write-version and
    /// the entity's metadata field-write counter.
    pub fn try_write_ref<T: Component>(
        &mut self,
        token: &AllocToken,
    ) -> Result<&mut T, AccessError> {
        self.check_token(token)?;
        self.strict_verify_token(token);

        let atom = atom_id_of::<T>();
        let present = self
            .columns
            .get(atom as usize)
            .and_then(|c| c.as_ref())
            .map(|c| c.element_type_id()) == Some(std::any::TypeId::of::<T>());
        if !present {
            return Err(AccessError::MissingColumn { atom_id: atom });
        }

        {
            let metadata = self.metadata_row_mut(token.slot);
            metadata.field_writes += 1;
        }

        let column = self.columns[atom as usize]
            .as_mut()
            .expect("column missing for configured atom")
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .expect("column element type mismatch");

        Ok(column.chunk_mut(token.slot.chunk_index()).write_ref(token))
    }

    /// Borrows the entity's `T` value.
    ///
    /// ## Panics
    /// Panics on stale, dead, or foreign tokens and on missing columns.
    pub fn read_ref<T: Component>(&self, token: &AllocToken) -> &T {
        match self.try_read_ref(token) {
            Ok(value) => value,
            Err(e) => panic!("component read through an invalid token: {e}"),
        }
    }

    /// Mutably borrows the entity's `T` value.
    ///
    /// ## Panics
    /// Panics on stale, dead, or foreign tokens and on missing columns.
    pub fn write_ref<T: Component>(&mut self, token: &AllocToken) -> &mut T {
        match self.try_write_ref(token) {
            Ok(value) => value,
            Err(e) => panic!("component write through an invalid token: {e}"),
        }
    }

    // ── metadata column helpers ─────────────────────────────────────────────

    fn metadata_column(&self) -> &Column<AllocMetadata> {
        let atom = atom_id_of::<AllocMetadata>();
        self.columns[atom as usize]
            .as_ref()
            .expect("metadata column missing")
            .as_any()
            .downcast_ref::<Column<AllocMetadata>>()
            .expect("metadata column has the wrong element type")
    }

    fn metadata_row(&self, slot: AllocSlot) -> &AllocMetadata {
        self.metadata_column().chunks()[slot.chunk_index() as usize].row(slot.row_index())
    }

    fn metadata_row_mut(&mut self, slot: AllocSlot) -> &mut AllocMetadata {
        let atom = atom_id_of::<AllocMetadata>();
        self.columns[atom as usize]
            .as_mut()
            .expect("metadata column missing")
            .as_any_mut()
            .downcast_mut::<Column<AllocMetadata>>()
            .expect("metadata column has the wrong element type")
            .chunk_mut(slot.chunk_index())
            .row_mut(slot.row_index())
    }

    /// Reads the metadata row for a token, verifying the token first.
    pub fn metadata(&self, token: &AllocToken) -> &AllocMetadata {
        self.read_ref::<AllocMetadata>(token)
    }

    // ── dispose ─────────────────────────────────────────────────────────────

    /// Tears down every chunk of every column, clears all maps, and
    /// releases the allocator id back to the global slot list.
    ///
    /// The allocator is poisoned afterwards: any further use is a defect,
    /// caught in debug and `verify` builds.
    pub fn dispose(&mut self) {
        if self.disposed {
            if cfg!(any(debug_assertions, feature = "verify")) {
                panic!("allocator disposed twice");
            }
            return;
        }
        self.disposed = true;

        if !self.initialized {
            return;
        }

        for &atom in &self.atoms_used {
            if let Some(column) = self.columns.get_mut(atom as usize).and_then(|c| c.as_mut()) {
                column.clear();
            }
            self.columns[atom as usize] = None;
        }
        self.columns.clear();
        self.lookup.clear();
        self.free.clear();

        GLOBAL_ALLOCATORS.free_slot(self.allocator_id as usize);
        // the id may be recycled by another thread straight away, but
        // never under this allocator's version
        strict_check!(
            allocator_stamp(self.allocator_id).map(|s| s.version) != Some(self.version),
            "allocator id still registered under this version after dispose"
        );

        debug!(allocator_id = self.allocator_id, version = self.version, "allocator disposed");
        self.allocator_id = ALLOCATOR_ID_INVALID;
    }
}

impl Drop for Allocator {
    fn drop(&mut self) {
        // release the global id even when the owner forgot to dispose
        if self.initialized && !self.disposed {
            self.dispose();
        }
    }
}
