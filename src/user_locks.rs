use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-user async locks serializing read-then-write sequences.
///
/// Loop dedup and thread collection writes are not atomic at the store layer,
/// so concurrent callers for the same user must be serialized in-process.
pub(crate) struct UserLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_for(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().expect("user lock map poisoned");
        map.entry(user_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_user_gets_same_lock() {
        let locks = UserLocks::new();
        let a = locks.lock_for("u1");
        let b = locks.lock_for("u1");
        assert!(Arc::ptr_eq(&a, &b));

        let other = locks.lock_for("u2");
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn lock_serializes_critical_section() {
        let locks = Arc::new(UserLocks::new());
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let lock = locks.lock_for("u1");
                let _guard = lock.lock().await;
                let seen = counter.load(std::sync::atomic::Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.store(seen + 1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 8);
    }
}
