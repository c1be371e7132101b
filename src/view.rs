//! Guards against applying results to a view the operator already left.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Navigation counter shared by every view of one console session.
#[derive(Debug, Clone, Default)]
pub struct ViewEpoch(Arc<AtomicU64>);

/// Captured when a view starts loading.
#[derive(Debug, Clone)]
pub struct ViewToken {
    epoch: Arc<AtomicU64>,
    seen: u64,
}

/// Outcome of a load that may have been overtaken by navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    Applied(T),
    Discarded,
}

impl ViewEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> ViewToken {
        ViewToken {
            epoch: Arc::clone(&self.0),
            seen: self.0.load(Ordering::Acquire),
        }
    }

    /// Leaves the current view; outstanding tokens go stale.
    pub fn navigate(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

impl ViewToken {
    pub fn is_current(&self) -> bool {
        self.epoch.load(Ordering::Acquire) == self.seen
    }

    /// Keeps `value` only if the view is still the one that asked for it.
    pub fn settle<T>(&self, value: T) -> Loaded<T> {
        if self.is_current() {
            Loaded::Applied(value)
        } else {
            Loaded::Discarded
        }
    }
}

impl<T> Loaded<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Loaded::Applied(v) => Some(v),
            Loaded::Discarded => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_tokens_discard() {
        let epoch = ViewEpoch::new();
        let first = epoch.token();
        assert_eq!(first.settle(1), Loaded::Applied(1));

        epoch.navigate();
        let second = epoch.token();
        assert_eq!(first.settle(2), Loaded::Discarded);
        assert_eq!(second.settle(3).applied(), Some(3));
    }

    #[tokio::test]
    async fn result_arriving_after_navigation_is_dropped() {
        let epoch = ViewEpoch::new();
        let token = epoch.token();
        let pending = tokio::spawn(async move {
            tokio::task::yield_now().await;
            token.settle("rows")
        });
        epoch.navigate();
        assert_eq!(pending.await.unwrap(), Loaded::Discarded);
    }
}
