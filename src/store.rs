/*!
Store: the type-heterogeneous façade over entity lifecycle and per-type storage

A handle generator plus one container per declared component/tag type, growing every
container's sparse reservation in lockstep as entities are created. Each declared type is kept
behind a `TypeId`-keyed map of type-erased containers, downcast via `downcast-rs`, with
`atomic_refcell::AtomicRefCell` providing the exclusivity a live view needs.
[`Component::STORAGE`] picks dense vs. chunked storage per declared component type.
*/

use std::{
    any::{self, TypeId},
    fmt,
};

use atomic_refcell::AtomicRefCell;
use downcast_rs::{impl_downcast, Downcast};
use rustc_hash::FxHashMap;

use crate::{
    chunked::ChunkedSparseSet,
    error::BorrowError,
    free_list::HandleFreeList,
    handle::{EntityHandle, Handle32_16},
    sparse::DenseSparseSet,
    tag::TagSparseSet,
    view::{ComponentView, ReverseComponentView, TagView},
};

/// Initial `reserved_component_count` a freshly constructed or just-[`clear`](Store::clear)ed
/// store reserves every container to.
pub const INITIAL_RESERVED_COMPONENT_COUNT: usize = 8;
/// Factor `reserved_component_count` is multiplied by each time the store runs out of headroom.
pub const COMPONENT_GROWTH_FACTOR: usize = 2;

/// Which storage class backs a [`Component`]'s pool: packed-and-swap-removed, or block-paged and
/// bitmap-scanned. Picked per component type via [`Component::STORAGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Dense,
    Chunked,
}

/// Type boundary for component types
///
/// `STORAGE` defaults to [`StorageClass::Dense`]; override it to declare a `chunked` component.
/// There is no blanket implementation —
/// every component type needs its own (possibly empty) `impl Component for MyType {}`, which is
/// exactly the hook a component uses to opt into chunked storage:
///
/// ```
/// # use sparsecs::store::{Component, StorageClass};
/// #[derive(Debug, Clone, Copy)]
/// struct Position(f32, f32);
/// impl Component for Position {}
///
/// #[derive(Debug, Clone, Copy)]
/// struct Particle(f32, f32);
/// impl Component for Particle {
///     const STORAGE: StorageClass = StorageClass::Chunked;
/// }
/// ```
pub trait Component: 'static + fmt::Debug {
    const STORAGE: StorageClass = StorageClass::Dense;
}

/// Type boundary for tags — components carrying no payload; membership alone is the value.
pub trait Tag: 'static + fmt::Debug {}

/// Internal erased surface every per-type container (dense, chunked, or tag) exposes to the
/// store for operations that don't need to know `T`: auto-growing the sparse reservation and
/// cascading a `destroy_entity` across every registered type.
trait ErasedContainer<H: EntityHandle>: Downcast + fmt::Debug {
    fn erased_remove_if_present(&mut self, handle: H);
    fn erased_reserve_sparse(&mut self, n: usize);
    fn erased_clear(&mut self);
    fn erased_dense_size(&self) -> usize;
}
impl_downcast!(ErasedContainer<H> where H: EntityHandle);

impl<H: EntityHandle, T: Component> ErasedContainer<H> for DenseSparseSet<H, T> {
    fn erased_remove_if_present(&mut self, handle: H) {
        self.remove_if_present(handle);
    }
    fn erased_reserve_sparse(&mut self, n: usize) {
        self.reserve_sparse(n);
    }
    fn erased_clear(&mut self) {
        self.clear();
    }
    fn erased_dense_size(&self) -> usize {
        self.dense_size()
    }
}

impl<H: EntityHandle, T: Component> ErasedContainer<H> for ChunkedSparseSet<H, T> {
    fn erased_remove_if_present(&mut self, handle: H) {
        self.remove_if_present(handle);
    }
    fn erased_reserve_sparse(&mut self, n: usize) {
        self.reserve_sparse(n);
    }
    fn erased_clear(&mut self) {
        self.clear();
    }
    fn erased_dense_size(&self) -> usize {
        self.dense_size()
    }
}

impl<H: EntityHandle> ErasedContainer<H> for TagSparseSet<H> {
    fn erased_remove_if_present(&mut self, handle: H) {
        self.remove_if_present(handle);
    }
    fn erased_reserve_sparse(&mut self, n: usize) {
        self.reserve_sparse(n);
    }
    fn erased_clear(&mut self) {
        self.clear();
    }
    fn erased_dense_size(&self) -> usize {
        self.dense_size()
    }
}

struct Slot<H: EntityHandle> {
    of_type: &'static str,
    cell: AtomicRefCell<Box<dyn ErasedContainer<H>>>,
}

/// The top-level façade: one handle free-list plus one container per registered component/tag
/// type.
///
/// `H` picks the handle width and generation-bit count (defaults to [`Handle32_16`], 65 536 live
/// slots and 65 536 reuse generations). A store owns every container exclusively; there is no
/// hidden global registry, and any number of stores may coexist independently.
pub struct Store<H: EntityHandle = Handle32_16> {
    free_list: HandleFreeList<H>,
    containers: FxHashMap<TypeId, Slot<H>>,
    reserved_component_count: usize,
}

impl<H: EntityHandle> Default for Store<H> {
    fn default() -> Self {
        Self {
            free_list: HandleFreeList::new(),
            containers: FxHashMap::default(),
            reserved_component_count: INITIAL_RESERVED_COMPONENT_COUNT,
        }
    }
}

impl<H: EntityHandle> Store<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component type, picking dense or chunked storage per [`Component::STORAGE`].
    /// A no-op if already registered. Must be called before any `*_component` operation on `T`.
    pub fn register_component<T: Component>(&mut self) {
        if self.containers.contains_key(&TypeId::of::<T>()) {
            return;
        }
        let boxed: Box<dyn ErasedContainer<H>> = match T::STORAGE {
            StorageClass::Dense => Box::new(DenseSparseSet::<H, T>::new()),
            StorageClass::Chunked => Box::new(ChunkedSparseSet::<H, T>::new()),
        };
        self.insert_slot::<T>(boxed);
    }

    /// Registers a tag type. A no-op if already registered.
    pub fn register_tag<T: Tag>(&mut self) {
        if self.containers.contains_key(&TypeId::of::<T>()) {
            return;
        }
        let boxed: Box<dyn ErasedContainer<H>> = Box::new(TagSparseSet::<H>::new());
        self.insert_slot::<T>(boxed);
    }

    fn insert_slot<T: 'static>(&mut self, mut boxed: Box<dyn ErasedContainer<H>>) {
        boxed.erased_reserve_sparse(self.reserved_component_count);
        self.containers.insert(
            TypeId::of::<T>(),
            Slot {
                of_type: any::type_name::<T>(),
                cell: AtomicRefCell::new(boxed),
            },
        );
    }

    fn slot<T: 'static>(&self) -> &Slot<H> {
        self.containers.get(&TypeId::of::<T>()).unwrap_or_else(|| {
            panic!(
                "type `{}` is not registered on this store; call register_component/register_tag first",
                any::type_name::<T>()
            )
        })
    }

    fn try_slot<T: 'static>(&self) -> Result<&Slot<H>, BorrowError> {
        self.containers
            .get(&TypeId::of::<T>())
            .ok_or(BorrowError::NotRegistered(any::type_name::<T>()))
    }

    // --- entity lifecycle -------------------------------------------------

    /// Allocates a handle for a new entity, growing every container's sparse reservation first
    /// if the store has run out of headroom.
    pub fn create_entity(&mut self) -> H {
        if self.free_list.used_count() == self.reserved_component_count {
            let old = self.reserved_component_count;
            self.reserved_component_count *= COMPONENT_GROWTH_FACTOR;
            log::trace!(
                "store growing reserved_component_count {old} -> {}",
                self.reserved_component_count
            );
            for slot in self.containers.values_mut() {
                slot.cell
                    .get_mut()
                    .erased_reserve_sparse(self.reserved_component_count);
            }
        }
        self.free_list.allocate()
    }

    /// Removes every registered component/tag from `handle` and frees its slot. Fatal if
    /// `handle` is already dead, matching [`HandleFreeList::free`]'s contract.
    pub fn destroy_entity(&mut self, handle: H) {
        for slot in self.containers.values_mut() {
            slot.cell.get_mut().erased_remove_if_present(handle);
        }
        self.free_list.free(handle);
    }

    pub fn entity_count(&self) -> usize {
        self.free_list.used_count()
    }

    pub fn is_alive(&self, handle: H) -> bool {
        self.free_list.contains(handle)
    }

    /// Forward iterator over every live entity's handle, ascending by slot index.
    pub fn entities(&self) -> crate::free_list::Iter<'_, H> {
        self.free_list.iter()
    }

    // --- components ---------------------------------------------------

    pub fn add_component<T: Component>(&self, handle: H, value: T) {
        let mut container = self.slot::<T>().cell.borrow_mut();
        match T::STORAGE {
            StorageClass::Dense => container
                .downcast_mut::<DenseSparseSet<H, T>>()
                .expect("storage class mismatch")
                .add(handle, value),
            StorageClass::Chunked => container
                .downcast_mut::<ChunkedSparseSet<H, T>>()
                .expect("storage class mismatch")
                .add(handle, value),
        }
    }

    pub fn remove_component<T: Component>(&self, handle: H) {
        let mut container = self.slot::<T>().cell.borrow_mut();
        match T::STORAGE {
            StorageClass::Dense => container
                .downcast_mut::<DenseSparseSet<H, T>>()
                .expect("storage class mismatch")
                .remove(handle),
            StorageClass::Chunked => container
                .downcast_mut::<ChunkedSparseSet<H, T>>()
                .expect("storage class mismatch")
                .remove(handle),
        }
    }

    pub fn has_component<T: Component>(&self, handle: H) -> bool {
        let container = self.slot::<T>().cell.borrow();
        match T::STORAGE {
            StorageClass::Dense => container
                .downcast_ref::<DenseSparseSet<H, T>>()
                .expect("storage class mismatch")
                .has(handle),
            StorageClass::Chunked => container
                .downcast_ref::<ChunkedSparseSet<H, T>>()
                .expect("storage class mismatch")
                .has(handle),
        }
    }

    /// Mutable access to `handle`'s component of type `T`. The returned guard holds the
    /// container's exclusive borrow for as long as it lives.
    pub fn get_component<T: Component>(&self, handle: H) -> ComponentRefMut<'_, T> {
        let container = self.slot::<T>().cell.borrow_mut();
        let borrow = atomic_refcell::AtomicRefMut::map(container, |container| match T::STORAGE {
            StorageClass::Dense => container
                .downcast_mut::<DenseSparseSet<H, T>>()
                .expect("storage class mismatch")
                .get(handle),
            StorageClass::Chunked => container
                .downcast_mut::<ChunkedSparseSet<H, T>>()
                .expect("storage class mismatch")
                .get(handle),
        });
        ComponentRefMut { borrow }
    }

    pub fn component_count<T: Component>(&self) -> usize {
        self.slot::<T>().cell.borrow().erased_dense_size()
    }

    /// Exclusive forward view over every live `T` component.
    pub fn view<T: Component>(&self) -> ComponentView<'_, H, T> {
        self.try_view().unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_view<T: Component>(&self) -> Result<ComponentView<'_, H, T>, BorrowError> {
        let slot = self.try_slot::<T>()?;
        let container = slot
            .cell
            .try_borrow_mut()
            .map_err(|_| BorrowError::AlreadyBorrowed(slot.of_type))?;
        Ok(match T::STORAGE {
            StorageClass::Dense => ComponentView::dense(atomic_refcell::AtomicRefMut::map(container, |c| {
                c.downcast_mut::<DenseSparseSet<H, T>>().expect("storage class mismatch")
            })),
            StorageClass::Chunked => ComponentView::chunked(atomic_refcell::AtomicRefMut::map(container, |c| {
                c.downcast_mut::<ChunkedSparseSet<H, T>>().expect("storage class mismatch")
            })),
        })
    }

    /// Exclusive reverse view over every live `T` component. Only available for `dense`
    /// components; panics if `T` is `chunked`.
    pub fn reverse_view<T: Component>(&self) -> ReverseComponentView<'_, H, T> {
        assert_eq!(
            T::STORAGE,
            StorageClass::Dense,
            "reverse_view is only available for dense components"
        );
        let slot = self.slot::<T>();
        let container = slot.cell.borrow_mut();
        ReverseComponentView::new(atomic_refcell::AtomicRefMut::map(container, |c| {
            c.downcast_mut::<DenseSparseSet<H, T>>().expect("storage class mismatch")
        }))
    }

    // --- tags ---------------------------------------------------------

    pub fn add_tag<T: Tag>(&self, handle: H) {
        self.slot::<T>()
            .cell
            .borrow_mut()
            .downcast_mut::<TagSparseSet<H>>()
            .expect("tag storage mismatch")
            .add(handle);
    }

    pub fn remove_tag<T: Tag>(&self, handle: H) {
        self.slot::<T>()
            .cell
            .borrow_mut()
            .downcast_mut::<TagSparseSet<H>>()
            .expect("tag storage mismatch")
            .remove(handle);
    }

    pub fn has_tag<T: Tag>(&self, handle: H) -> bool {
        self.slot::<T>()
            .cell
            .borrow()
            .downcast_ref::<TagSparseSet<H>>()
            .expect("tag storage mismatch")
            .has(handle)
    }

    pub fn tag_view<T: Tag>(&self) -> TagView<'_, H> {
        self.try_tag_view().unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_tag_view<T: Tag>(&self) -> Result<TagView<'_, H>, BorrowError> {
        let slot = self.try_slot::<T>()?;
        let container = slot
            .cell
            .try_borrow()
            .map_err(|_| BorrowError::AlreadyBorrowed(slot.of_type))?;
        Ok(TagView::new(atomic_refcell::AtomicRef::map(container, |c| {
            c.downcast_ref::<TagSparseSet<H>>().expect("tag storage mismatch")
        })))
    }

    // --- whole-store ----------------------------------------------------

    /// Clears every container and the handle free-list, and resets `reserved_component_count`
    /// to [`INITIAL_RESERVED_COMPONENT_COUNT`], re-reserving every container to match.
    pub fn clear(&mut self) {
        self.free_list.clear();
        self.reserved_component_count = INITIAL_RESERVED_COMPONENT_COUNT;
        for slot in self.containers.values_mut() {
            let container = slot.cell.get_mut();
            container.erased_clear();
            container.erased_reserve_sparse(self.reserved_component_count);
        }
    }
}

impl<H: EntityHandle> fmt::Debug for Store<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("entity_count", &self.entity_count())
            .field("reserved_component_count", &self.reserved_component_count)
            .field("registered_types", &self.containers.len())
            .finish()
    }
}

/// Mutable access to a single component, held out by [`Store::get_component`].
pub struct ComponentRefMut<'a, T> {
    borrow: atomic_refcell::AtomicRefMut<'a, T>,
}

impl<'a, T> std::ops::Deref for ComponentRefMut<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.borrow
    }
}

impl<'a, T> std::ops::DerefMut for ComponentRefMut<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.borrow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle32_16;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(i32, i32);
    impl Component for Position {}

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(i32, i32);
    impl Component for Velocity {}

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Particle(i32);
    impl Component for Particle {
        const STORAGE: StorageClass = StorageClass::Chunked;
    }

    #[derive(Debug)]
    struct Player;
    impl Component for Player {}

    #[derive(Debug)]
    struct IsWet;
    impl Tag for IsWet {}

    fn store_with_position() -> Store<Handle32_16> {
        let mut store = Store::new();
        store.register_component::<Position>();
        store
    }

    #[test]
    fn allocate_and_reuse_with_components() {
        let mut store = store_with_position();
        let h1 = store.create_entity();
        let h2 = store.create_entity();
        let _h3 = store.create_entity();
        assert_eq!((h1.index(), h1.generation()), (0, 0));
        assert_eq!((h2.index(), h2.generation()), (1, 0));

        store.destroy_entity(h2);
        let h2_reused = store.create_entity();
        assert_eq!(h2_reused.index(), 1);
        assert_eq!(h2_reused.generation(), 1);

        assert!(!store.has_component::<Position>(h2));
        store.add_component(h2_reused, Position(1, 1));
        assert!(store.has_component::<Position>(h2_reused));
    }

    #[test]
    fn swap_remove_integrity_through_store() {
        let mut store = store_with_position();
        let h0 = store.create_entity();
        let h1 = store.create_entity();
        let h2 = store.create_entity();

        store.add_component(h0, Position(10, 0));
        store.add_component(h1, Position(20, 0));
        store.add_component(h2, Position(30, 0));

        store.remove_component::<Position>(h1);

        assert!(store.has_component::<Position>(h0));
        assert!(store.has_component::<Position>(h2));
        assert!(!store.has_component::<Position>(h1));
        assert_eq!(*store.get_component::<Position>(h2), Position(30, 0));
    }

    #[test]
    fn chunked_remove_refill_through_store() {
        let mut store = Store::<Handle32_16>::new();
        store.register_component::<Particle>();
        for _ in 0..200 {
            store.create_entity();
        }
        let h50 = Handle32_16::new(50);
        let h100 = Handle32_16::new(100);
        let h102 = Handle32_16::new(102);

        store.add_component(h100, Particle(1));
        store.add_component(h102, Particle(2));
        store.add_component(h50, Particle(3));
        assert_eq!(store.component_count::<Particle>(), 128);

        store.remove_component::<Particle>(h50);
        store.remove_component::<Particle>(h100);
        store.remove_component::<Particle>(h102);
        assert_eq!(store.component_count::<Particle>(), 0);
    }

    #[test]
    fn iteration_total_over_one_hundred_components() {
        let mut store = store_with_position();
        let mut handles = Vec::new();
        for i in 0..100 {
            let h = store.create_entity();
            store.add_component(h, Position(i, 0));
            handles.push(h);
        }
        let view = store.view::<Position>();
        assert_eq!(view.len(), 100);
        let sum: i32 = view.iter().map(|(_, p)| p.0).sum();
        assert_eq!(sum, (0..100).sum());
    }

    #[test]
    fn destroy_cascades_across_components_and_tags() {
        let mut store = Store::<Handle32_16>::new();
        store.register_component::<Position>();
        store.register_component::<Velocity>();
        store.register_component::<Player>();
        store.register_tag::<IsWet>();

        let h = store.create_entity();
        store.add_component(h, Position(1, 1));
        store.add_component(h, Velocity(0, 0));
        store.add_component(h, Player);
        store.add_tag::<IsWet>(h);

        store.destroy_entity(h);

        assert!(!store.has_component::<Position>(h));
        assert!(!store.has_component::<Velocity>(h));
        assert!(!store.has_component::<Player>(h));
        assert!(!store.has_tag::<IsWet>(h));

        // A freshly allocated handle at the same slot must not see the old entity's state.
        let h_new = store.create_entity();
        assert_eq!(h_new.index(), h.index());
        assert_ne!(h_new.generation(), h.generation());
        assert!(!store.has_component::<Position>(h));
    }

    #[test]
    #[should_panic]
    fn destroy_already_dead_handle_is_fatal() {
        let mut store = store_with_position();
        let h = store.create_entity();
        store.destroy_entity(h);
        store.destroy_entity(h);
    }

    #[test]
    fn dual_stores_are_isolated() {
        let mut a = store_with_position();
        let mut b = store_with_position();

        let a1 = a.create_entity();
        let b1 = b.create_entity();
        assert_eq!(a1, b1);

        a.add_component(a1, Position(1, 1));
        b.add_component(b1, Position(2, 2));

        assert_eq!(*a.get_component::<Position>(a1), Position(1, 1));
        assert_eq!(*b.get_component::<Position>(b1), Position(2, 2));
    }

    #[test]
    fn reserved_component_count_is_monotonic_until_clear() {
        let mut store = store_with_position();
        let mut prev = INITIAL_RESERVED_COMPONENT_COUNT;
        for _ in 0..(INITIAL_RESERVED_COMPONENT_COUNT * 4) {
            store.create_entity();
            assert!(store.reserved_component_count >= prev);
            prev = store.reserved_component_count;
        }
        store.clear();
        assert_eq!(store.reserved_component_count, INITIAL_RESERVED_COMPONENT_COUNT);
    }

    #[test]
    #[should_panic]
    fn view_while_add_conflicts_is_fatal() {
        let mut store = store_with_position();
        let h = store.create_entity();
        store.add_component(h, Position(0, 0));
        let _view = store.view::<Position>();
        // A second mutable borrow of the same container while `_view` is alive panics.
        store.add_component(h, Position(1, 1));
    }

    #[test]
    fn try_view_reports_contention_without_panicking() {
        let store = store_with_position();
        let _view = store.view::<Position>();
        assert!(matches!(store.try_view::<Position>(), Err(BorrowError::AlreadyBorrowed(_))));
    }

    #[test]
    fn try_view_reports_unregistered_type_without_panicking() {
        let store = Store::<Handle32_16>::new();
        assert!(matches!(store.try_view::<Position>(), Err(BorrowError::NotRegistered(_))));
    }
}
