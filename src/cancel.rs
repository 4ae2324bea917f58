use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, MatcherResult};

/// A cooperative cancellation flag shared between the host and in-flight searches.
///
/// The engine checks it every time it goes through the match cache, so a search over a
/// pathological line stops at the next rule boundary once `cancel` is called.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every search observing this token to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self) -> MatcherResult<()> {
        if self.is_cancelled() {
            #[cfg(feature = "debug")]
            log::debug!("[cancellation] search aborted");
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}
