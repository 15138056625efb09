//! Caller-supplied cancellation for long-running derivations.

use crate::error::{CryptoError, CryptoResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable abort flag. Any clone may trip it; derivations that accept it
/// poll between rounds and stop with [`CryptoError::Aborted`].
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self) -> CryptoResult<()> {
        if self.is_aborted() {
            Err(CryptoError::Aborted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_is_shared_between_clones() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        assert!(signal.check().is_ok());

        clone.abort();
        assert!(signal.is_aborted());
        assert!(matches!(signal.check(), Err(CryptoError::Aborted)));
    }
}
