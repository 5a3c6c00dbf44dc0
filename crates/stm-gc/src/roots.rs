//! Root tracking using a shadow stack.
//!
//! The host's view of its native stack: every slot holds an object
//! reference the collector must treat as a root. Slots are rewritten in
//! place when a collection moves their object, so the host reads its
//! references back through [`RootIndex`] after anything that may collect.

use crate::header::ObjRef;

/// Position of a slot in a [`ShadowStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootIndex(usize);

// ============================================================================
// ShadowStack - Root tracking structure
// ============================================================================

/// A stack of root slots with scope markers.
#[derive(Debug, Default)]
pub struct ShadowStack {
    slots: Vec<Option<ObjRef>>,
    frame_markers: Vec<usize>,
}

impl ShadowStack {
    /// Create a new empty shadow stack.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            frame_markers: Vec::new(),
        }
    }

    /// Root `obj` in a new slot.
    pub fn push(&mut self, obj: ObjRef) -> RootIndex {
        self.slots.push(Some(obj));
        RootIndex(self.slots.len() - 1)
    }

    /// Remove the topmost slot and return its content.
    pub fn pop(&mut self) -> Option<ObjRef> {
        self.slots.pop().flatten()
    }

    /// Current content of a slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot was popped.
    #[must_use]
    pub fn get(&self, index: RootIndex) -> Option<ObjRef> {
        self.slots[index.0]
    }

    /// Overwrite a slot; `None` drops the root but keeps the slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot was popped.
    pub fn set(&mut self, index: RootIndex, obj: Option<ObjRef>) {
        self.slots[index.0] = obj;
    }

    /// Number of slots, empty ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over the rooted objects.
    pub fn iter(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }

    /// Clear all slots and frames.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.frame_markers.clear();
    }

    /// Push a frame marker.
    pub fn push_frame(&mut self) {
        self.frame_markers.push(self.slots.len());
    }

    /// Pop a frame marker and remove all slots added since.
    pub fn pop_frame(&mut self) {
        if let Some(marker) = self.frame_markers.pop() {
            self.slots.truncate(marker);
        }
    }

    /// Visit every non-empty slot; the visitor may rewrite it.
    pub fn walk_roots(&mut self, visit: &mut dyn FnMut(&mut ObjRef)) {
        for obj in self.slots.iter_mut().flatten() {
            visit(obj);
        }
    }
}
