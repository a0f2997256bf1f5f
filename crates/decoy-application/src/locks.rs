//! Per-session mutual exclusion.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of locks keyed by session id.
///
/// All handling for one session runs under its lock, which is what makes
/// the finalize-once and flag-monotonicity invariants hold when two
/// requests for the same session race. Entries are never evicted; session
/// retention is an external concern and a lock entry is a few dozen bytes.
#[derive(Default)]
pub(crate) struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    /// Acquires the lock for `session_id`, creating it on first use.
    pub(crate) async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(session_id.to_string())
                .or_insert_with(Default::default)
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_session_is_mutually_exclusive() {
        let locks = Arc::new(SessionLocks::default());
        let guard = locks.acquire("s1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("s1").await;
            })
        };

        // the contender cannot finish while we hold the guard
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_sessions_do_not_contend() {
        let locks = SessionLocks::default();
        let _a = locks.acquire("a").await;
        let _b = locks.acquire("b").await;
    }
}
