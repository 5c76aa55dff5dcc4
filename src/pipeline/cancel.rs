use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Marker returned by work that stopped because its token was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Shared cancellation flag checked cooperatively by background work
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancelled, for use with `?` at checkpoints
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancellationToken::new();
        let worker_copy = token.clone();
        assert_eq!(worker_copy.check(), Ok(()));

        token.cancel();
        assert!(worker_copy.is_cancelled());
        assert_eq!(worker_copy.check(), Err(Cancelled));
    }
}
