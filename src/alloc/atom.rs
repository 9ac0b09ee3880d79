//! # Atom Registry
//!
//! Process-wide interning of component types into dense integer ids.
//!
//! ## Purpose
//! Everything downstream of this module indexes arrays by [`AtomId`]
//! instead of hashing `TypeId`s repeatedly: an allocator's columns form a
//! dense array whose offset is the atom id of the stored component type.
//!
//! ## Design
//! - Ids are assigned sequentially starting at 1; 0 signifies "invalid".
//! - Registration happens on the first `atom_id_of::<T>()` call for a
//!   type and is permanent: atoms are never freed, matching the small
//!   bounded universe of component types.
//! - Alongside the id, the registry installs a column factory for the
//!   type, so an allocator can construct a correctly-typed column from an
//!   atom id alone (no runtime type inspection).
//!
//! ## Invariants
//! - `atom_id_of::<T>()` returns the same id for the same `T` on every
//!   call, from every thread.
//! - Type→id and id→type lookups agree.
//! - Every registered atom has a column factory.
//!
//! ## Concurrency
//! The registry lives behind an `RwLock`: lookups of already-known types
//! take the read lock only; first-time registration takes the write lock
//! and re-checks the map, so two callers racing to register the same type
//! both observe the same winning id.

use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    sync::{OnceLock, RwLock},
};

use crate::alloc::chunk::{AnyColumn, Column};
use crate::alloc::types::{AtomId, ATOM_ID_INVALID};

/// Marker trait for component types storable in allocator columns.
///
/// Blanket-implemented: any `'static + Send + Sync` type with a cheap
/// default (the "zero value" written on allocation) and `Clone` (used
/// when packing relocates a row) qualifies.
pub trait Component: Default + Clone + Send + Sync + 'static {}

impl<T: Default + Clone + Send + Sync + 'static> Component for T {}

/// Factory constructing an empty, correctly-typed column for one atom.
type ColumnFactoryFn = fn() -> Box<dyn AnyColumn>;

/// Describes a registered component type.
#[derive(Clone, Copy, Debug)]
struct AtomDesc {
    type_id: TypeId,
    name: &'static str,
}

struct AtomRegistry {
    next_id: AtomId,
    by_type: HashMap<TypeId, AtomId>,
    by_id: Vec<Option<AtomDesc>>,
    factories: Vec<Option<ColumnFactoryFn>>,
}

static REGISTRY: OnceLock<RwLock<AtomRegistry>> = OnceLock::new();

fn registry() -> &'static RwLock<AtomRegistry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(AtomRegistry {
            next_id: ATOM_ID_INVALID + 1,
            // index 0 stays unused so an AtomId indexes these directly
            by_id: vec![None],
            factories: vec![None],
            by_type: HashMap::new(),
        })
    })
}

impl AtomRegistry {
    fn register<T: Component>(&mut self) -> AtomId {
        let type_id = TypeId::of::<T>();
        // second check under the write lock: a racing caller may have won
        if let Some(&existing) = self.by_type.get(&type_id) {
            return existing;
        }

        let atom_id = self.next_id;
        self.next_id += 1;

        self.by_type.insert(type_id, atom_id);
        self.by_id.push(Some(AtomDesc { type_id, name: type_name::<T>() }));
        self.factories.push(Some(new_column_storage::<T>));

        debug_check!(
            self.by_id.len() == self.next_id as usize
                && self.factories.len() == self.next_id as usize,
            "atom registry tables out of step with id counter"
        );

        atom_id
    }
}

fn new_column_storage<T: Component>() -> Box<dyn AnyColumn> {
    Box::new(Column::<T>::new())
}

/// Returns the atom id for `T`, assigning one on first request.
///
/// ## Behavior
/// The id is stable for the process lifetime: every call for the same
/// type, from any thread, observes the same positive id.
pub fn atom_id_of<T: Component>() -> AtomId {
    let type_id = TypeId::of::<T>();
    {
        let registry = registry().read().expect("atom registry lock poisoned");
        if let Some(&atom_id) = registry.by_type.get(&type_id) {
            return atom_id;
        }
    }
    let mut registry = registry().write().expect("atom registry lock poisoned");
    registry.register::<T>()
}

/// Returns the atom id for a runtime `TypeId`, if that type was registered.
pub fn try_atom_id(type_id: TypeId) -> Option<AtomId> {
    let registry = registry().read().expect("atom registry lock poisoned");
    registry.by_type.get(&type_id).copied()
}

/// Returns the `TypeId` registered under `atom_id`.
///
/// ## Panics
/// Requesting the type for an unregistered id is a programmer error and
/// panics.
pub fn atom_type_id(atom_id: AtomId) -> TypeId {
    let registry = registry().read().expect("atom registry lock poisoned");
    registry
        .by_id
        .get(atom_id as usize)
        .and_then(|d| d.as_ref())
        .unwrap_or_else(|| panic!("no component type registered for atom id {atom_id}"))
        .type_id
}

/// Returns the human-readable type name registered under `atom_id`.
///
/// ## Panics
/// Panics if `atom_id` was never assigned.
pub fn atom_type_name(atom_id: AtomId) -> &'static str {
    let registry = registry().read().expect("atom registry lock poisoned");
    registry
        .by_id
        .get(atom_id as usize)
        .and_then(|d| d.as_ref())
        .unwrap_or_else(|| panic!("no component type registered for atom id {atom_id}"))
        .name
}

/// Number of atoms assigned so far.
pub fn registered_atom_count() -> usize {
    let registry = registry().read().expect("atom registry lock poisoned");
    registry.next_id as usize - 1
}

/// Constructs an empty column for `atom_id` through its registered factory.
///
/// ## Panics
/// Panics if no factory was installed for this atom id.
pub(crate) fn new_column(atom_id: AtomId) -> Box<dyn AnyColumn> {
    let factory = {
        let registry = registry().read().expect("atom registry lock poisoned");
        registry
            .factories
            .get(atom_id as usize)
            .and_then(|f| *f)
            .unwrap_or_else(|| panic!("no column factory registered for atom id {atom_id}"))
    };
    factory()
}
