/*!
Chunked sparse set: block-allocated, bitmap-driven component storage

64-slot blocks, each carrying an occupancy [`BitMask`], are appended to a dense `Vec` of chunks
and swap-removed when they empty out. Unlike [`DenseSparseSet`](crate::sparse::DenseSparseSet), `remove` never moves
another entity's data — it only clears a bit — so a reference handed out by `get` stays valid
for as long as the chunk itself lives. The trade-off is that a sparsely populated chunk still
reserves all 64 slots; this storage class exists for access patterns that keep chunks densely
populated (50%+), where a branch-predictable bitmap scan plus in-place payloads out-performs the
dense set's pointer-chasing-by-swap.
*/

use crate::{
    handle::EntityHandle,
    mask::{BitMask, ForwardIter},
};

const BLOCK_LEN: usize = 64;
const INVALID: usize = usize::MAX;

#[derive(Debug)]
struct Chunk<H: EntityHandle, T> {
    occupancy: BitMask<u64>,
    inverse: Box<[Option<H>; BLOCK_LEN]>,
    data: Box<[Option<T>; BLOCK_LEN]>,
}

impl<H: EntityHandle, T> Chunk<H, T> {
    fn new() -> Self {
        Self {
            occupancy: BitMask::new(),
            inverse: Box::new([None; BLOCK_LEN]),
            data: Box::new(std::array::from_fn(|_| None)),
        }
    }
}

/// 64-slot block-paged storage for component type `T`, keyed by handle `H`
#[derive(Debug)]
pub struct ChunkedSparseSet<H: EntityHandle, T> {
    /// slot-block -> dense chunk id, or `INVALID`
    chunk_index: Vec<usize>,
    chunks: Vec<Chunk<H, T>>,
}

impl<H: EntityHandle, T> Default for ChunkedSparseSet<H, T> {
    fn default() -> Self {
        Self {
            chunk_index: Vec::new(),
            chunks: Vec::new(),
        }
    }
}

impl<H: EntityHandle, T> ChunkedSparseSet<H, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sparse_size(&self) -> usize {
        self.chunk_index.len() * BLOCK_LEN
    }

    pub fn dense_size(&self) -> usize {
        self.chunks.len() * BLOCK_LEN
    }

    /// Enlarges `chunk_index` to cover `n` slots, i.e. `⌈n / 64⌉ + 1` blocks.
    pub fn reserve_sparse(&mut self, n: usize) {
        let blocks = n / BLOCK_LEN + 1;
        if blocks > self.chunk_index.len() {
            self.chunk_index.resize(blocks, INVALID);
        }
    }

    fn block_of(index: usize) -> usize {
        index / BLOCK_LEN
    }

    fn offset_of(index: usize) -> usize {
        index % BLOCK_LEN
    }

    /// Inserts `value` for `handle`, allocating a fresh chunk for its block on first use.
    /// Fatal if a component is already present.
    pub fn add(&mut self, handle: H, value: T) {
        let index = handle.index();
        let block = Self::block_of(index);
        assert!(
            block < self.chunk_index.len(),
            "handle index beyond reserved sparse size"
        );

        let chunk_id = if self.chunk_index[block] == INVALID {
            self.chunks.push(Chunk::new());
            let id = self.chunks.len() - 1;
            self.chunk_index[block] = id;
            id
        } else {
            self.chunk_index[block]
        };

        let offset = Self::offset_of(index);
        let chunk = &mut self.chunks[chunk_id];
        assert!(
            !chunk.occupancy.is_set(offset as u32),
            "component already present for this handle"
        );
        chunk.occupancy.set(offset as u32);
        chunk.inverse[offset] = Some(handle);
        chunk.data[offset] = Some(value);
    }

    pub fn has(&self, handle: H) -> bool {
        let index = handle.index();
        let block = Self::block_of(index);
        assert!(
            block < self.chunk_index.len(),
            "handle index beyond reserved sparse size"
        );
        let chunk_id = self.chunk_index[block];
        if chunk_id == INVALID {
            return false;
        }
        let offset = Self::offset_of(index);
        let chunk = &self.chunks[chunk_id];
        if !chunk.occupancy.is_set(offset as u32) {
            return false;
        }
        assert_eq!(
            chunk.inverse[offset].expect("occupied slot must carry a handle").generation(),
            handle.generation(),
            "stale handle generation found in occupied chunk slot"
        );
        true
    }

    /// Mutable access to `handle`'s component. The reference stays valid across any other
    /// `add`/`remove` on this container as long as `handle`'s chunk is never emptied, because
    /// removal never moves payloads between chunks — only `remove`'s chunk-eviction path (when
    /// a chunk becomes fully empty) relocates anything, and it relocates a *different* chunk's
    /// data, never reallocating the one just accessed while it is still occupied.
    pub fn get(&mut self, handle: H) -> &mut T {
        assert!(self.has(handle), "no component present for this handle");
        let index = handle.index();
        let chunk_id = self.chunk_index[Self::block_of(index)];
        let offset = Self::offset_of(index);
        self.chunks[chunk_id].data[offset]
            .as_mut()
            .expect("checked present by has()")
    }

    pub fn get_ref(&self, handle: H) -> Option<&T> {
        if !self.has(handle) {
            return None;
        }
        let index = handle.index();
        let chunk_id = self.chunk_index[Self::block_of(index)];
        let offset = Self::offset_of(index);
        self.chunks[chunk_id].data[offset].as_ref()
    }

    /// Clears `handle`'s occupancy bit. If that empties the chunk entirely, the chunk is
    /// swap-removed from `chunks` and `chunk_index` is updated for both the freed block and the
    /// block whose chunk got moved into its place.
    pub fn remove(&mut self, handle: H) {
        assert!(self.has(handle), "no component present for this handle");

        let index = handle.index();
        let block = Self::block_of(index);
        let offset = Self::offset_of(index);
        let chunk_id = self.chunk_index[block];

        let chunk = &mut self.chunks[chunk_id];
        chunk.occupancy.clear(offset as u32);
        chunk.inverse[offset] = None;
        chunk.data[offset] = None;

        if chunk.occupancy.is_zero() {
            let last_chunk_id = self.chunks.len() - 1;
            if last_chunk_id != chunk_id {
                // Any occupied offset in the about-to-move chunk names the block it belongs to
                // (every handle in a chunk shares the same `index / 64`).
                let any_offset = self.chunks[last_chunk_id]
                    .occupancy
                    .iter()
                    .next()
                    .expect("non-empty chunk must have an occupied offset");
                let moved_block = self.chunks[last_chunk_id].inverse[any_offset as usize]
                    .expect("occupied offset must carry a handle")
                    .index()
                    / BLOCK_LEN;

                self.chunks.swap(chunk_id, last_chunk_id);
                self.chunk_index[moved_block] = chunk_id;
            }
            self.chunks.pop();
            self.chunk_index[block] = INVALID;
        }
    }

    pub fn remove_if_present(&mut self, handle: H) {
        if self.has(handle) {
            self.remove(handle);
        }
    }

    pub fn clear(&mut self) {
        self.chunk_index.clear();
        self.chunks.clear();
    }

    /// Walks chunks in dense order; within each chunk, walks occupied offsets ascending via the
    /// chunk's occupancy [`BitMask`].
    pub fn iter(&self) -> Iter<'_, H, T> {
        Iter {
            chunks: &self.chunks,
            chunk_index: 0,
            offsets: self.chunks.first().map(|c| c.occupancy.iter()),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, H, T> {
        let offsets = self.chunks.first().map(|c| c.occupancy.iter());
        IterMut {
            chunks: &mut self.chunks,
            chunk_index: 0,
            offsets,
        }
    }
}

pub struct Iter<'a, H: EntityHandle, T> {
    chunks: &'a [Chunk<H, T>],
    chunk_index: usize,
    offsets: Option<ForwardIter<u64>>,
}

impl<'a, H: EntityHandle, T> Iterator for Iter<'a, H, T> {
    type Item = (H, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let offsets = self.offsets.as_mut()?;
            if let Some(offset) = offsets.next() {
                let chunk = &self.chunks[self.chunk_index];
                let offset = offset as usize;
                let handle = chunk.inverse[offset].expect("occupied offset must carry a handle");
                let value = chunk.data[offset].as_ref().expect("occupied offset must carry data");
                return Some((handle, value));
            }
            self.chunk_index += 1;
            self.offsets = self.chunks.get(self.chunk_index).map(|c| c.occupancy.iter());
        }
    }
}

pub struct IterMut<'a, H: EntityHandle, T> {
    chunks: &'a mut [Chunk<H, T>],
    chunk_index: usize,
    offsets: Option<ForwardIter<u64>>,
}

impl<'a, H: EntityHandle, T> Iterator for IterMut<'a, H, T> {
    type Item = (H, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let offsets = self.offsets.as_mut()?;
            if let Some(offset) = offsets.next() {
                let offset = offset as usize;
                // SAFETY: each offset is visited exactly once per chunk (the bitmask iterator is
                // destructive over its own copy), so the mutable borrows handed out never alias.
                let chunk_ptr = &mut self.chunks[self.chunk_index] as *mut Chunk<H, T>;
                let chunk = unsafe { &mut *chunk_ptr };
                let handle = chunk.inverse[offset].expect("occupied offset must carry a handle");
                let value = chunk.data[offset].as_mut().expect("occupied offset must carry data");
                return Some((handle, value));
            }
            self.chunk_index += 1;
            self.offsets = self
                .chunks
                .get(self.chunk_index)
                .map(|c| c.occupancy.iter());
        }
    }
}
