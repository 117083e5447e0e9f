//! Upload size limit.
//!
//! Checked twice per upload: while the transport is still streaming the
//! body, and again on the fully buffered payload.

use crate::error::{IntakeError, Result};

/// Maximum accepted payload size, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGuard {
    max_bytes: u64,
}

impl SizeGuard {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Builds a guard from a limit in megabytes (`MB << 20`).
    pub fn from_megabytes(max_mb: u64) -> Self {
        Self::new(max_mb << 20)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Fails with `PayloadTooLarge` when `len` exceeds the limit.
    pub fn check(&self, len: u64) -> Result<()> {
        if len > self.max_bytes {
            return Err(IntakeError::PayloadTooLarge {
                size: len,
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn limit_is_inclusive() {
        let guard = SizeGuard::new(100);
        assert!(guard.check(0).is_ok());
        assert!(guard.check(100).is_ok());
        let err = guard.check(101).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
    }

    #[test]
    fn megabytes_are_binary() {
        let guard = SizeGuard::from_megabytes(10);
        assert_eq!(guard.max_bytes(), 10 * 1024 * 1024);
        assert!(guard.check(15 * 1024 * 1024).is_err());
    }
}
