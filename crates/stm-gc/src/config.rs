//! Collector configuration.
//!
//! Defaults can be overridden in code with the builder-style setters, or
//! from the environment with [`GcConfig::from_env`]:
//!
//! - `STM_GC_NURSERY`: per-thread nursery size (`4M`, `512K`, `1048576`)
//! - `STM_GC_DECOMMIT_THRESHOLD`: nursery clears at least this large hand
//!   whole pages back to the OS instead of zeroing them in place

use crate::error::GcError;
use crate::header::OBJECT_ALIGNMENT;

/// Default per-thread nursery size.
pub const DEFAULT_NURSERY_SIZE: usize = 4 * 1024 * 1024;

/// Smallest accepted nursery.
pub const MIN_NURSERY_SIZE: usize = 4 * 1024;

/// Default decommit threshold.
pub const DEFAULT_DECOMMIT_THRESHOLD: usize = 256 * 1024;

const NURSERY_ENV: &str = "STM_GC_NURSERY";
const DECOMMIT_ENV: &str = "STM_GC_DECOMMIT_THRESHOLD";

/// Tuning parameters shared by every thread of one collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcConfig {
    /// Size of each thread's nursery in bytes.
    pub nursery_size: usize,
    /// Clears of at least this many bytes decommit pages instead of zeroing.
    pub decommit_threshold: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            nursery_size: DEFAULT_NURSERY_SIZE,
            decommit_threshold: DEFAULT_DECOMMIT_THRESHOLD,
        }
    }
}

impl GcConfig {
    /// Set the nursery size.
    #[must_use]
    pub const fn with_nursery_size(mut self, size: usize) -> Self {
        self.nursery_size = size;
        self
    }

    /// Set the decommit threshold.
    #[must_use]
    pub const fn with_decommit_threshold(mut self, threshold: usize) -> Self {
        self.decommit_threshold = threshold;
        self
    }

    /// Largest object the nursery will ever accept: 7/8 of its capacity.
    #[must_use]
    pub const fn max_nursery_object(&self) -> usize {
        self.nursery_size / 8 * 7
    }

    /// Defaults, overridden by the environment.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] if a variable is set but cannot be
    /// parsed, or if the result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, GcError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GcError> {
        let mut config = Self::default();
        if let Some(value) = lookup(NURSERY_ENV) {
            config.nursery_size = parse_size(NURSERY_ENV, &value)?;
        }
        if let Some(value) = lookup(DECOMMIT_ENV) {
            config.decommit_threshold = parse_size(DECOMMIT_ENV, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the values for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`GcError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<(), GcError> {
        if self.nursery_size < MIN_NURSERY_SIZE {
            return Err(GcError::InvalidConfig(format!(
                "nursery size {} is below the minimum of {MIN_NURSERY_SIZE} bytes",
                self.nursery_size
            )));
        }
        if self.nursery_size % OBJECT_ALIGNMENT != 0 {
            return Err(GcError::InvalidConfig(format!(
                "nursery size {} is not a multiple of {OBJECT_ALIGNMENT}",
                self.nursery_size
            )));
        }
        Ok(())
    }
}

/// Parse `123`, `64K`, `4M` or `1G` (case-insensitive, optional `B`).
fn parse_size(key: &str, value: &str) -> Result<usize, GcError> {
    let invalid = || GcError::InvalidConfig(format!("{key}={value:?} is not a size"));

    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();
    let digits = upper.strip_suffix('B').unwrap_or(&upper);
    let (digits, multiplier) = match digits.chars().last() {
        Some('K') => (&digits[..digits.len() - 1], 1024),
        Some('M') => (&digits[..digits.len() - 1], 1024 * 1024),
        Some('G') => (&digits[..digits.len() - 1], 1024 * 1024 * 1024),
        _ => (digits, 1),
    };
    let base: usize = digits.trim().parse().map_err(|_| invalid())?;
    base.checked_mul(multiplier).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GcConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_nursery_object(), DEFAULT_NURSERY_SIZE / 8 * 7);
    }

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("K", "4096").unwrap(), 4096);
        assert_eq!(parse_size("K", "64k").unwrap(), 64 * 1024);
        assert_eq!(parse_size("K", "4M").unwrap(), 4 * 1024 * 1024);
        assert_eq!(parse_size("K", " 2MB ").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("K", "1G").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_size("K", "lots").is_err());
        assert!(parse_size("K", "").is_err());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = GcConfig::from_lookup(|key| match key {
            NURSERY_ENV => Some("128K".to_string()),
            DECOMMIT_ENV => Some("0".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.nursery_size, 128 * 1024);
        assert_eq!(config.decommit_threshold, 0);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = GcConfig::from_lookup(|key| (key == NURSERY_ENV).then(|| "big".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("STM_GC_NURSERY"));
    }

    #[test]
    fn test_validate_rejects_small_and_unaligned() {
        assert!(GcConfig::default().with_nursery_size(1024).validate().is_err());
        assert!(GcConfig::default()
            .with_nursery_size(MIN_NURSERY_SIZE + 8)
            .validate()
            .is_err());
        assert!(GcConfig::default()
            .with_nursery_size(MIN_NURSERY_SIZE)
            .validate()
            .is_ok());
    }
}
