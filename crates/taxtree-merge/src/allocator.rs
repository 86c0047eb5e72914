//! Synthetic node id allocation.
//!
//! Custom node ids must never collide with ids already used by a source's
//! native numbering scheme (e.g. NCBI taxids), so the allocator hands out
//! ids from a base strictly above the current maximum native id, rounded
//! to the next multiple of one million.

use taxtree_core::NodeId;

const ID_BLOCK: i64 = 1_000_000;

/// Issues node ids from a private id space disjoint from source-native ids.
///
/// Allocation is infallible. The base is consumed by the first call; the
/// flag guarantees a second call advances past the base even when the
/// first id has not been committed anywhere yet.
#[derive(Debug)]
pub struct NodeAllocator {
    base: i64,
    next: i64,
    base_consumed: bool,
}

impl NodeAllocator {
    /// Builds an allocator above `max_native_id`.
    pub fn new(max_native_id: i64) -> Self {
        // Strictly above the maximum: a maximum that is already an exact
        // multiple of a million must not become the base itself.
        let base = (max_native_id.div_euclid(ID_BLOCK) + 1) * ID_BLOCK;
        NodeAllocator {
            base,
            next: base,
            base_consumed: false,
        }
    }

    /// The first id this allocator will hand out.
    pub fn base(&self) -> NodeId {
        NodeId(self.base)
    }

    pub fn base_consumed(&self) -> bool {
        self.base_consumed
    }

    /// The next fresh id.
    pub fn next_id(&mut self) -> NodeId {
        if !self.base_consumed {
            self.base_consumed = true;
            self.next = self.base + 1;
            return NodeId(self.base);
        }
        let id = self.next;
        self.next += 1;
        NodeId(id)
    }
}
