//! The pending stack of a local collection.
//!
//! Marking never recurses: every object whose fields still need tracing is
//! pushed here and popped in LIFO order, so the native stack depth does not
//! depend on the shape of the object graph.

use crate::header::ObjRef;

/// LIFO stack of objects waiting to have their fields traced.
#[derive(Debug, Default)]
pub struct Worklist {
    stack: Vec<ObjRef>,
}

impl Worklist {
    /// Create an empty worklist.
    #[must_use]
    pub const fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Push an object.
    pub fn push(&mut self, obj: ObjRef) {
        self.stack.push(obj);
    }

    /// Pop the most recently pushed object.
    pub fn pop(&mut self) -> Option<ObjRef> {
        self.stack.pop()
    }

    /// `true` if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}
