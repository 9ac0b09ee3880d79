use std::any::TypeId;
use std::collections::HashSet;
use std::thread;

use archetype_alloc::{
    atom_id_of, atom_type_id, atom_type_name, try_atom_id, SlotList, ATOM_ID_INVALID,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Shared(u32);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct First(u8);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Second(u8);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Unregistered(u8);

#[test]
fn atom_ids_are_stable_and_distinct() {
    let first = atom_id_of::<First>();
    let second = atom_id_of::<Second>();

    assert_ne!(first, ATOM_ID_INVALID);
    assert_ne!(second, ATOM_ID_INVALID);
    assert_ne!(first, second);
    assert_eq!(atom_id_of::<First>(), first);
    assert_eq!(atom_id_of::<Second>(), second);
}

#[test]
fn atom_lookup_agrees_in_both_directions() {
    let atom = atom_id_of::<First>();

    assert_eq!(atom_type_id(atom), TypeId::of::<First>());
    assert_eq!(try_atom_id(TypeId::of::<First>()), Some(atom));
    assert!(atom_type_name(atom).contains("First"));
    assert_eq!(try_atom_id(TypeId::of::<Unregistered>()), None);
}

#[test]
fn concurrent_registration_yields_exactly_one_id() {
    let handles: Vec<_> = (0..16)
        .map(|_| thread::spawn(atom_id_of::<Shared>))
        .collect();

    let ids: HashSet<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids.len(), 1, "racing registrations must agree on one atom id");
    assert_eq!(ids.into_iter().next().unwrap(), atom_id_of::<Shared>());
}

#[test]
fn slot_list_recycles_without_growing() {
    let slots: SlotList<&'static str> = SlotList::new();

    // alloc-free churn on a single slot must never grow the storage
    for _ in 0..64 {
        let slot = slots.alloc_slot();
        slots.set(slot, "value");
        slots.free_slot(slot);
        assert!(slots.len() <= 1);
    }
    assert_eq!(slots.len(), 0);
}

#[test]
fn slot_list_truncates_trailing_free_runs() {
    let slots: SlotList<u32> = SlotList::new();
    let reserved: Vec<usize> = (0..5).map(|_| slots.alloc_slot()).collect();
    for &slot in &reserved {
        slots.set(slot, slot as u32);
    }
    assert_eq!(slots.len(), 5);

    // freeing interior slots leaves storage untouched
    slots.free_slot(reserved[2]);
    slots.free_slot(reserved[3]);
    assert_eq!(slots.len(), 5);
    assert_eq!(slots.get(reserved[2]), None);

    // freeing the last element drops the whole trailing free run
    slots.free_slot(reserved[4]);
    assert_eq!(slots.len(), 2);
    assert_eq!(slots.live_count(), 2);
    assert_eq!(slots.get(reserved[0]), Some(0));
    assert_eq!(slots.get(reserved[1]), Some(1));
}

#[test]
fn slot_list_never_reissues_a_live_slot() {
    let slots: SlotList<u32> = SlotList::new();
    let a = slots.alloc_slot();
    slots.set(a, 1);
    let b = slots.alloc_slot();
    slots.set(b, 2);
    assert_ne!(a, b);

    slots.free_slot(a);
    let c = slots.alloc_slot();
    // the freed index may be recycled, but never the live one
    assert_ne!(c, b);
}

#[test]
fn slot_list_snapshot_reflects_live_entries() {
    let slots: SlotList<u32> = SlotList::new();
    let a = slots.alloc_slot();
    slots.set(a, 10);
    let b = slots.alloc_slot();
    slots.set(b, 20);
    slots.free_slot(a);

    let live: Vec<u32> = slots.with_snapshot(|view| view.iter().flatten().copied().collect());
    assert_eq!(live, vec![20]);
}

#[test]
fn slot_list_is_usable_across_threads() {
    let slots: SlotList<u32> = SlotList::new();

    thread::scope(|scope| {
        for worker in 0..8u32 {
            let slots = &slots;
            scope.spawn(move || {
                for i in 0..100 {
                    let slot = slots.alloc_slot();
                    slots.set(slot, worker * 1000 + i);
                    slots.free_slot(slot);
                }
            });
        }
    });

    assert_eq!(slots.live_count(), 0);
}
