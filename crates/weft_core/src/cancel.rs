//! Cooperative cancellation
//!
//! Cancellation is recognised by type (`CoreError::Cancelled`), never by
//! string matching. A token can enter non-cancelable sections, during which
//! `check_cancelled` always succeeds so half-applied updates cannot be
//! interrupted.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{CoreError, Result};

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    non_cancelable_depth: AtomicUsize,
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Clear a previous cancellation request
    pub fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Whether a non-cancelable section is currently open
    pub fn in_non_cancelable_section(&self) -> bool {
        self.inner.non_cancelable_depth.load(Ordering::Acquire) > 0
    }

    /// Fail with `CoreError::Cancelled` if cancellation was requested
    /// and no non-cancelable section is open
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() && !self.in_non_cancelable_section() {
            return Err(CoreError::Cancelled);
        }
        Ok(())
    }

    /// Open a non-cancelable section, closed when the guard drops
    pub fn non_cancelable_section(&self) -> NonCancelableGuard {
        self.inner.non_cancelable_depth.fetch_add(1, Ordering::AcqRel);
        NonCancelableGuard {
            inner: self.inner.clone(),
        }
    }

    /// Run `f` inside a non-cancelable section
    pub fn execute_non_cancelable<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.non_cancelable_section();
        f()
    }
}

/// Guard for an open non-cancelable section
#[must_use = "the section closes as soon as the guard is dropped"]
pub struct NonCancelableGuard {
    inner: Arc<TokenInner>,
}

impl Drop for NonCancelableGuard {
    fn drop(&mut self) {
        self.inner.non_cancelable_depth.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_cancelled() {
        let token = CancellationToken::new();
        assert!(token.check_cancelled().is_ok());

        token.cancel();
        assert_eq!(token.check_cancelled(), Err(CoreError::Cancelled));

        token.reset();
        assert!(token.check_cancelled().is_ok());
    }

    #[test]
    fn test_non_cancelable_section_nests() {
        let token = CancellationToken::new();
        token.cancel();

        {
            let _outer = token.non_cancelable_section();
            {
                let _inner = token.non_cancelable_section();
                assert!(token.check_cancelled().is_ok());
            }
            assert!(token.check_cancelled().is_ok());
        }

        assert!(token.check_cancelled().is_err());
    }

    #[test]
    fn test_execute_non_cancelable() {
        let token = CancellationToken::new();
        token.cancel();
        let result = token.execute_non_cancelable(|| token.check_cancelled());
        assert!(result.is_ok());
        assert!(!token.in_non_cancelable_section());
    }
}
