//! End-to-end scenarios against the public `Store` surface.

use sparsecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position(f32, f32);
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(i32);
impl Component for Health {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Particle(f32);
impl Component for Particle {
    const STORAGE: StorageClass = StorageClass::Chunked;
}

#[derive(Debug)]
struct Burning;
impl Tag for Burning {}

fn new_store() -> Store {
    let mut store = Store::new();
    store.register_component::<Position>();
    store.register_component::<Health>();
    store.register_component::<Particle>();
    store.register_tag::<Burning>();
    store
}

#[test]
fn allocate_and_reuse_bumps_generation() {
    let mut store = new_store();
    let e0 = store.create_entity();
    let e1 = store.create_entity();
    store.destroy_entity(e1);
    let e1_reused = store.create_entity();

    assert_eq!(e1_reused.index(), e1.index());
    assert_ne!(e1_reused.generation(), e1.generation());
    assert_ne!(e0, e1_reused);
}

#[test]
fn swap_remove_keeps_remaining_components_intact() {
    let mut store = new_store();
    let a = store.create_entity();
    let b = store.create_entity();
    let c = store.create_entity();

    store.add_component(a, Position(1.0, 1.0));
    store.add_component(b, Position(2.0, 2.0));
    store.add_component(c, Position(3.0, 3.0));

    store.remove_component::<Position>(b);

    assert!(store.has_component::<Position>(a));
    assert!(store.has_component::<Position>(c));
    assert!(!store.has_component::<Position>(b));
    assert_eq!(*store.get_component::<Position>(c), Position(3.0, 3.0));
}

#[test]
fn chunked_storage_frees_blocks_across_chunk_boundaries() {
    let mut store = new_store();
    let mut handles = Vec::new();
    for _ in 0..150 {
        handles.push(store.create_entity());
    }

    // 150 entities span three 64-slot blocks; tag every third one to straddle the boundaries.
    for &e in handles.iter().step_by(3) {
        store.add_component(e, Particle(1.0));
    }
    assert!(store.component_count::<Particle>() > 0);

    for &e in handles.iter().step_by(3) {
        store.remove_component::<Particle>(e);
    }
    assert_eq!(store.component_count::<Particle>(), 0);
}

#[test]
fn iterating_one_hundred_components_sums_to_4950() {
    let mut store = new_store();
    for i in 0..100 {
        let e = store.create_entity();
        store.add_component(e, Health(i));
    }
    let view = store.view::<Health>();
    assert_eq!(view.len(), 100);
    let total: i32 = view.iter().map(|(_, h)| h.0).sum();
    assert_eq!(total, (0..100).sum());
}

#[test]
fn destroying_an_entity_cascades_every_component_and_tag() {
    let mut store = new_store();
    let e = store.create_entity();
    store.add_component(e, Position(0.0, 0.0));
    store.add_component(e, Health(10));
    store.add_tag::<Burning>(e);

    store.destroy_entity(e);

    assert!(!store.has_component::<Position>(e));
    assert!(!store.has_component::<Health>(e));
    assert!(!store.has_tag::<Burning>(e));
    assert!(!store.is_alive(e));
}

#[test]
fn two_stores_never_share_state() {
    let mut left = new_store();
    let mut right = new_store();

    let el = left.create_entity();
    let er = right.create_entity();
    assert_eq!(el, er);

    left.add_component(el, Health(5));
    assert!(!right.has_component::<Health>(er));
}
