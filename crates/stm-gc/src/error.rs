//! Error types.
//!
//! Two categories exist. Construction and configuration problems are
//! ordinary values of [`GcError`] and are returned to the caller.
//! Everything else that can go wrong inside the collector is a broken
//! contract with the surrounding STM protocol (allocating outside a
//! transaction, an object that can never fit the nursery, inconsistent
//! header flags) and goes through [`fatal_error`]: it is logged and the
//! thread panics. Embedders that need the process to die on the spot build
//! with `panic = "abort"`.

use std::fmt;
use std::io;

use thiserror::Error;

/// Recoverable errors surfaced by `stm-gc`.
#[derive(Debug, Error)]
pub enum GcError {
    /// The nursery arena of a new thread could not be mapped.
    #[error("cannot allocate a nursery of {size} bytes")]
    NurseryAllocation {
        /// Requested nursery size.
        size: usize,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A second thread tried to register with [`ThreadRole::Main`](crate::ThreadRole::Main).
    #[error("a main thread is already registered with this collector")]
    MainThreadAlreadyRegistered,

    /// A configuration value is out of range or unparsable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Report a fatal, non-retryable condition and unwind.
///
/// Never returns. The message is prefixed with `stm-gc fatal:` so that
/// tests and crash reports can tell these apart from ordinary panics.
#[cold]
#[track_caller]
pub fn fatal_error(msg: impl fmt::Display) -> ! {
    let msg = msg.to_string();
    crate::tracing::internal::log_fatal(&msg);
    panic!("stm-gc fatal: {msg}");
}

/// Check a header or state invariant; a violation is fatal.
macro_rules! gc_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::error::fatal_error(format_args!($($arg)+));
        }
    };
}

pub(crate) use gc_assert;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GcError::NurseryAllocation {
            size: 4096,
            source: io::Error::from(io::ErrorKind::OutOfMemory),
        };
        assert_eq!(err.to_string(), "cannot allocate a nursery of 4096 bytes");
        assert!(std::error::Error::source(&err).is_some());

        let err = GcError::InvalidConfig("nursery too small".into());
        assert_eq!(err.to_string(), "invalid configuration: nursery too small");
    }

    #[test]
    #[should_panic(expected = "stm-gc fatal: broken 42")]
    fn test_gc_assert_is_fatal() {
        let value = 42;
        gc_assert!(value == 0, "broken {value}");
    }

    #[test]
    fn test_gc_assert_passes() {
        gc_assert!(1 + 1 == 2, "arithmetic");
    }
}
