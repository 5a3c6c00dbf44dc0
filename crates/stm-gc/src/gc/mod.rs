//! The local collector.
//!
//! - [`collect`]: survival classification, tracing and the sweep
//! - [`worklist`]: the explicit pending stack
//! - [`promote`]: end-of-transaction promotion and the demoted list

pub mod collect;
pub mod promote;
pub mod worklist;

pub use collect::Survival;
