use archetype_alloc::{
    allocator_stamp, AllocToken, Allocator, AllocatorConfig, TokenState, ALLOCATOR_ID_INVALID,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Health {
    points: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Armor {
    rating: u16,
}

fn new_allocator() -> Allocator {
    let mut allocator = Allocator::new(
        AllocatorConfig::default()
            .with_component::<Health>()
            .with_component::<Armor>(),
    );
    allocator.initialize();
    allocator
}

#[test]
fn initialize_registers_and_preallocates_one_chunk() {
    let allocator = new_allocator();

    assert_ne!(allocator.allocator_id(), ALLOCATOR_ID_INVALID);
    assert_eq!(allocator.chunk_count(), 1);
    assert!(allocator.is_empty());
    assert!(allocator.has_component::<Health>());
    assert!(allocator.has_component::<Armor>());

    let stamp = allocator_stamp(allocator.allocator_id())
        .expect("initialized allocator must be registered globally");
    assert_eq!(stamp.version, allocator.version());
    assert_eq!(stamp.components_hash, allocator.components_hash());
}

#[test]
fn components_hash_ignores_declaration_order() {
    let a = new_allocator();
    let mut b = Allocator::new(
        AllocatorConfig::default()
            .with_component::<Armor>()
            .with_component::<Health>(),
    );
    b.initialize();

    assert_eq!(a.components_hash(), b.components_hash());
}

#[test]
fn dispose_releases_the_global_slot() {
    let mut allocator = new_allocator();
    let id = allocator.allocator_id();
    let version = allocator.version();

    allocator.dispose();

    assert!(allocator.is_disposed());
    assert_eq!(allocator.allocator_id(), ALLOCATOR_ID_INVALID);
    // the id may already be recycled by a parallel test, but never with
    // this allocator's version
    assert_ne!(allocator_stamp(id).map(|s| s.version), Some(version));
}

#[test]
fn drop_releases_the_global_slot_for_undisposed_allocators() {
    let (id, version) = {
        let allocator = new_allocator();
        (allocator.allocator_id(), allocator.version())
    };
    assert_ne!(allocator_stamp(id).map(|s| s.version), Some(version));
}

#[test]
#[should_panic(expected = "disposed twice")]
fn double_dispose_is_a_contract_violation() {
    let mut allocator = new_allocator();
    allocator.dispose();
    allocator.dispose();
}

#[test]
#[should_panic(expected = "initialized twice")]
fn double_initialize_is_a_contract_violation() {
    let mut allocator = new_allocator();
    allocator.initialize();
}

#[test]
fn tokens_of_a_disposed_allocator_are_dead() {
    let mut allocator = new_allocator();
    let mut tokens = [AllocToken::default()];
    allocator.alloc(&[7], &mut tokens);
    assert_eq!(tokens[0].state(&allocator), TokenState::Fresh);

    allocator.dispose();
    assert_eq!(tokens[0].state(&allocator), TokenState::Dead);
}

#[test]
fn reused_allocator_ids_do_not_resurrect_old_tokens() {
    let mut first = new_allocator();
    let mut tokens = [AllocToken::default()];
    first.alloc(&[42], &mut tokens);
    let first_id = first.allocator_id();
    first.dispose();

    // ids are recyclable but versions are not; even if the new allocator
    // lands on the same id, the old token must resolve as dead
    let mut second = new_allocator();
    if second.allocator_id() == first_id {
        assert_ne!(second.version(), tokens[0].allocator_version);
    }
    assert_eq!(second.token_state(&tokens[0]), TokenState::Dead);
    second.dispose();
}

#[test]
fn default_token_is_never_usable() {
    let allocator = new_allocator();
    let token = AllocToken::default();
    assert!(!token.alive);
    assert_eq!(allocator.token_state(&token), TokenState::Dead);
    assert!(allocator.try_read_ref::<Health>(&token).is_err());
}
