//! Cooperative cancellation for in-flight renders

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::request::RequestId;

/// Shared flag checked by the render worker between stages
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Caller-side handle of one render request
#[derive(Clone, Debug)]
pub struct RenderHandle {
    id: RequestId,
    token: CancelToken,
}

impl RenderHandle {
    #[must_use]
    pub fn new(id: RequestId, token: CancelToken) -> Self {
        Self { id, token }
    }

    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Ask the worker to abandon this render. Completion is reported as a
    /// silent cancellation, never as an error.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let handle = RenderHandle::new(RequestId::new(7), token.clone());
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
        assert_eq!(handle.id(), RequestId::new(7));
    }
}
