/*!
Borrow adapters over a single container's iteration surface

A view is a thin non-owning wrapper around one component's or tag's storage, yielding
`(handle, &mut T)` pairs or handles-only. It holds the container's exclusive
[`AtomicRefMut`]/[`AtomicRef`] borrow for its own lifetime, so the borrow checker enforces "no
concurrent mutation of a container with a live view on it" rather than a runtime check on every
access.

A component declared `chunked` is backed by a different concrete type than one declared `dense`,
so [`ComponentView`] is an enum over the two borrowed container types rather than a single
generic parameter — the store already knows which variant a given `T` resolves to via
[`Component::STORAGE`](crate::store::Component::STORAGE), so the view just carries that choice
forward.
*/

use atomic_refcell::{AtomicRef, AtomicRefMut};

use crate::{chunked::ChunkedSparseSet, handle::EntityHandle, sparse::DenseSparseSet, tag::TagSparseSet};

/// Exclusive forward view over a component's storage, yielding `(handle, &mut T)` pairs in the
/// container's native order.
pub enum ComponentView<'a, H: EntityHandle, T: 'static> {
    Dense(AtomicRefMut<'a, DenseSparseSet<H, T>>),
    Chunked(AtomicRefMut<'a, ChunkedSparseSet<H, T>>),
}

impl<'a, H: EntityHandle, T: 'static> ComponentView<'a, H, T> {
    pub(crate) fn dense(borrow: AtomicRefMut<'a, DenseSparseSet<H, T>>) -> Self {
        Self::Dense(borrow)
    }

    pub(crate) fn chunked(borrow: AtomicRefMut<'a, ChunkedSparseSet<H, T>>) -> Self {
        Self::Chunked(borrow)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Dense(c) => c.dense_size(),
            Self::Chunked(c) => c.dense_size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> ViewIter<'_, H, T> {
        match self {
            Self::Dense(c) => ViewIter::Dense(c.iter()),
            Self::Chunked(c) => ViewIter::Chunked(c.iter()),
        }
    }

    pub fn iter_mut(&mut self) -> ViewIterMut<'_, H, T> {
        match self {
            Self::Dense(c) => ViewIterMut::Dense(c.iter_mut()),
            Self::Chunked(c) => ViewIterMut::Chunked(c.iter_mut()),
        }
    }
}

impl<'a, 'b, H: EntityHandle, T: 'static> IntoIterator for &'b ComponentView<'a, H, T> {
    type Item = (H, &'b T);
    type IntoIter = ViewIter<'b, H, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Either-iterator over a [`ComponentView`]'s two possible backing containers.
pub enum ViewIter<'a, H: EntityHandle, T> {
    Dense(crate::sparse::Iter<'a, H, T>),
    Chunked(crate::chunked::Iter<'a, H, T>),
}

impl<'a, H: EntityHandle, T> Iterator for ViewIter<'a, H, T> {
    type Item = (H, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Dense(it) => it.next(),
            Self::Chunked(it) => it.next(),
        }
    }
}

/// Mutable counterpart of [`ViewIter`].
pub enum ViewIterMut<'a, H: EntityHandle, T> {
    Dense(crate::sparse::IterMut<'a, H, T>),
    Chunked(crate::chunked::IterMut<'a, H, T>),
}

impl<'a, H: EntityHandle, T> Iterator for ViewIterMut<'a, H, T> {
    type Item = (H, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Dense(it) => it.next(),
            Self::Chunked(it) => it.next(),
        }
    }
}

/// Exclusive reverse view over a dense component's storage. Dense-only: a chunked container has
/// no stable "last inserted" end to walk backward from.
pub struct ReverseComponentView<'a, H: EntityHandle, T> {
    borrow: AtomicRefMut<'a, DenseSparseSet<H, T>>,
}

impl<'a, H: EntityHandle, T> ReverseComponentView<'a, H, T> {
    pub(crate) fn new(borrow: AtomicRefMut<'a, DenseSparseSet<H, T>>) -> Self {
        Self { borrow }
    }

    pub fn len(&self) -> usize {
        self.borrow.dense_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> crate::sparse::RevIter<'_, H, T> {
        self.borrow.iter_rev()
    }

    pub fn iter_mut(&mut self) -> crate::sparse::RevIterMut<'_, H, T> {
        self.borrow.iter_rev_mut()
    }
}

/// Exclusive view over a tag's storage, yielding handles only.
pub struct TagView<'a, H: EntityHandle> {
    borrow: AtomicRef<'a, TagSparseSet<H>>,
}

impl<'a, H: EntityHandle> TagView<'a, H> {
    pub(crate) fn new(borrow: AtomicRef<'a, TagSparseSet<H>>) -> Self {
        Self { borrow }
    }

    pub fn len(&self) -> usize {
        self.borrow.dense_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> crate::tag::Iter<'_, H> {
        self.borrow.iter()
    }
}

impl<'a, H: EntityHandle> IntoIterator for &'a TagView<'_, H> {
    type Item = H;
    type IntoIter = crate::tag::Iter<'a, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
