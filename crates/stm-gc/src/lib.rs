//! Per-thread garbage collection for a software-transactional-memory heap.
//!
//! `stm-gc` is the thread-local half of an STM collector. Every thread
//! allocates new objects into its own bump-pointer **nursery**. A **local
//! collection** copies the reachable young objects into the thread's current
//! **generation** in the shared area and frees its unreachable old objects,
//! without ever touching objects shared with other threads. At the end of a
//! transaction every surviving object is **promoted** to GLOBAL.
//!
//! # Object states
//!
//! Everything is encoded in the object header ([`GcFlags`] and [`Link`]):
//!
//! | state                     | flags                         |
//! |---------------------------|-------------------------------|
//! | young LOCAL (nursery)     | -                             |
//! | old LOCAL (generation)    | -                             |
//! | GLOBAL                    | `GLOBAL`                      |
//! | LOCAL copy of a GLOBAL    | `WAS_COPIED \| VISITED`       |
//! | demoted (main thread)     | `VISITED`                     |
//!
//! # Quick Start
//!
//! ```
//! use stm_gc::{GcConfig, ObjRef, ObjectLayout, StmGc, ThreadGc, ThreadRole, TypeRegistry};
//!
//! #[derive(Clone, Copy, ObjectLayout)]
//! #[repr(C)]
//! struct Node {
//!     value: u64,
//!     #[gc(strong)]
//!     next: Option<ObjRef>,
//! }
//!
//! let mut types = TypeRegistry::new();
//! types.register::<Node>();
//! let gc = StmGc::new(GcConfig::default(), types).unwrap();
//!
//! let mut thread = ThreadGc::new(gc, ThreadRole::Worker).unwrap();
//! thread.start_transaction();
//!
//! let tail = thread.alloc(Node { value: 2, next: None });
//! let head = thread.alloc(Node { value: 1, next: Some(tail) });
//! let root = thread.root(head);
//!
//! thread.collect();
//! let head = thread.rooted(root).unwrap();
//! assert!(!thread.is_in_nursery(head));
//!
//! thread.stop_transaction();
//! assert!(head.is_global());
//! ```
//!
//! # Threads
//!
//! [`ThreadGc`] is `!Send`: create one on every thread from a shared
//! `Arc<StmGc>`. Exactly one thread may be [`ThreadRole::Main`].

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

// Lets `#[derive(ObjectLayout)]` refer to `::stm_gc` inside this crate.
extern crate self as stm_gc;

pub mod config;
mod error;
mod gc;
mod header;
mod layout;
pub mod metrics;
mod nursery;
mod roots;
mod shared;
mod sync;
mod thread;
pub mod tracing;
mod weakref;

// Re-export public API
pub use config::GcConfig;
pub use error::{fatal_error, GcError};
pub use gc::Survival;
pub use header::{align_object_size, GcFlags, Link, ObjRef, ObjectHeader, HEADER_SIZE, OBJECT_ALIGNMENT};
pub use layout::{ObjectLayout, TypeInfo, TypeRegistry, TypeTag};
pub use metrics::{CollectionKind, CollectionStats};
pub use roots::{RootIndex, ShadowStack};
pub use shared::{Chain, SharedArea};
pub use sync::{NoSync, PairTable, SyncLayer, ThreadHandle, ThreadRegistry, ThreadRole};
pub use thread::{StmGc, ThreadGc};

// Re-export derive macro when feature is enabled
#[cfg(feature = "derive")]
pub use stm_gc_derive::ObjectLayout;
