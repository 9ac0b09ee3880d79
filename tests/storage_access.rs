use archetype_alloc::{
    AccessError, AllocMetadata, AllocToken, Allocator, AllocatorConfig, TokenState,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Tag(u64);

fn new_allocator() -> Allocator {
    let mut allocator = Allocator::new(
        AllocatorConfig::default()
            .with_component::<Position>()
            .with_component::<Velocity>(),
    );
    allocator.initialize();
    allocator
}

fn alloc_all(allocator: &mut Allocator, external_ids: &[u64]) -> Vec<AllocToken> {
    let mut tokens = vec![AllocToken::default(); external_ids.len()];
    allocator.alloc(external_ids, &mut tokens);
    tokens
}

#[test]
fn components_read_as_zero_right_after_alloc() {
    let mut allocator = new_allocator();
    let tokens = alloc_all(&mut allocator, &[1, 2, 3]);

    for token in &tokens {
        assert_eq!(*allocator.read_ref::<Position>(token), Position::default());
        assert_eq!(*allocator.read_ref::<Velocity>(token), Velocity::default());
    }
}

#[test]
fn writes_are_visible_through_the_same_token() {
    let mut allocator = new_allocator();
    let tokens = alloc_all(&mut allocator, &[10, 11]);

    *allocator.write_ref::<Position>(&tokens[0]) = Position { x: 1.5, y: -2.0 };
    // a write to a different component of the same entity must not
    // perturb the first value
    *allocator.write_ref::<Velocity>(&tokens[0]) = Velocity { dx: 9.0, dy: 9.0 };

    assert_eq!(
        *allocator.read_ref::<Position>(&tokens[0]),
        Position { x: 1.5, y: -2.0 }
    );
    assert_eq!(
        *allocator.read_ref::<Velocity>(&tokens[0]),
        Velocity { dx: 9.0, dy: 9.0 }
    );
    assert_eq!(*allocator.read_ref::<Position>(&tokens[1]), Position::default());
}

#[test]
fn token_convenience_accessors_match_the_allocator_paths() {
    let mut allocator = new_allocator();
    let tokens = alloc_all(&mut allocator, &[77]);

    *tokens[0].component_mut::<Position>(&mut allocator) = Position { x: 4.0, y: 4.0 };
    assert_eq!(
        *tokens[0].component_ref::<Position>(&allocator),
        Position { x: 4.0, y: 4.0 }
    );
}

#[test]
fn metadata_tracks_component_count_and_self_token() {
    let mut allocator = new_allocator();
    let tokens = alloc_all(&mut allocator, &[5]);

    let metadata = *allocator.metadata(&tokens[0]);
    assert!(metadata.is_alive());
    assert_eq!(metadata.token, tokens[0]);
    // two user components plus the built-in metadata column
    assert_eq!(metadata.component_count, 3);
    assert_eq!(metadata.field_writes, 0);
}

#[test]
fn write_refs_bump_field_writes_and_chunk_write_version() {
    let mut allocator = new_allocator();
    let tokens = alloc_all(&mut allocator, &[5]);

    let before = allocator
        .column::<Position>()
        .expect("position column must exist")
        .chunks()[0]
        .write_version();

    let _ = allocator.write_ref::<Position>(&tokens[0]);
    let _ = allocator.write_ref::<Position>(&tokens[0]);
    let _ = allocator.write_ref::<Velocity>(&tokens[0]);

    let after = allocator
        .column::<Position>()
        .expect("position column must exist")
        .chunks()[0]
        .write_version();
    assert_eq!(after, before + 2);
    assert_eq!(allocator.metadata(&tokens[0]).field_writes, 3);

    // reads leave both counters alone
    let _ = allocator.read_ref::<Position>(&tokens[0]);
    assert_eq!(allocator.metadata(&tokens[0]).field_writes, 3);
}

#[test]
fn missing_columns_are_reported_not_fabricated() {
    let mut allocator = new_allocator();
    let tokens = alloc_all(&mut allocator, &[5]);

    assert!(!allocator.has_component::<Tag>());
    assert!(matches!(
        allocator.try_read_ref::<Tag>(&tokens[0]),
        Err(AccessError::MissingColumn { .. })
    ));
    assert!(matches!(
        allocator.try_write_ref::<Tag>(&tokens[0]),
        Err(AccessError::MissingColumn { .. })
    ));
}

#[test]
fn packing_stales_outstanding_tokens_and_lookup_refreshes_them() {
    let mut allocator = new_allocator();
    let tokens = alloc_all(&mut allocator, &[100, 200, 300]);

    *allocator.write_ref::<Position>(&tokens[2]) = Position { x: 3.0, y: 3.0 };

    // freeing with auto-pack relocates entity 300 and bumps the pack version
    allocator.free(&[100]);

    assert_eq!(tokens[2].state(&allocator), TokenState::Stale);
    assert!(matches!(
        allocator.try_read_ref::<Position>(&tokens[2]),
        Err(AccessError::Stale { .. })
    ));

    let refreshed = allocator.lookup(300).expect("entity 300 is still live");
    assert_eq!(refreshed.state(&allocator), TokenState::Fresh);
    assert_eq!(
        *allocator.read_ref::<Position>(&refreshed),
        Position { x: 3.0, y: 3.0 }
    );
}

#[test]
fn foreign_tokens_are_rejected() {
    let mut a = new_allocator();
    let mut b = new_allocator();
    let tokens_a = alloc_all(&mut a, &[1]);

    assert!(matches!(
        b.try_read_ref::<Position>(&tokens_a[0]),
        Err(AccessError::Dead { .. })
    ));

    a.dispose();
    b.dispose();
}

#[test]
fn metadata_is_readable_as_a_regular_component() {
    let mut allocator = new_allocator();
    let tokens = alloc_all(&mut allocator, &[9]);

    let metadata = allocator.read_ref::<AllocMetadata>(&tokens[0]);
    assert_eq!(metadata.token.external_id, 9);
}
