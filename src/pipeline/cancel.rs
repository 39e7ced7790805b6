use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, checked at stage boundaries.
///
/// A token may be linked to enclosing tokens (a batch, a session); it then
/// reports cancelled when either it or any of them is cancelled, while
/// cancelling it leaves the enclosing tokens untouched.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    parents: Vec<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh token that also observes `self`.
    pub fn child(&self) -> Self {
        Self::new().linked_to(self)
    }

    /// This token's own flag, additionally observing `parent`.
    pub fn linked_to(&self, parent: &CancellationToken) -> Self {
        let mut parents = self.parents.clone();
        parents.push(parent.cancelled.clone());
        parents.extend(parent.parents.iter().cloned());
        Self {
            cancelled: self.cancelled.clone(),
            parents,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.parents.iter().any(|p| p.load(Ordering::SeqCst))
    }
}
