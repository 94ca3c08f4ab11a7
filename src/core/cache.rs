use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use tokio::sync::Mutex;
use tracing::debug;

/// Remembers the outcome of expensive lookups, such as scraped pages,
/// until cleared. Failures are remembered like any other value.
pub struct Memo<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the remembered value for `key`, running `compute` on a miss.
    /// The lock is held while computing, so concurrent callers asking for
    /// the same key wait for one computation.
    pub async fn get_or_insert_with<F, Fut>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let mut entries = self.entries.lock().await;
        if let Some(value) = entries.get(&key) {
            debug!("Memo HIT");
            return value.clone();
        }
        debug!("Memo MISS");
        let value = compute().await;
        entries.insert(key, value.clone());
        value
    }

    pub async fn clear(&self) {
        debug!("Memo CLEAR");
        self.entries.lock().await.clear();
    }
}

impl<K, V> Default for Memo<K, V>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_computes_once_per_key() {
        let memo = Memo::<&str, u32>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = memo
                .get_or_insert_with("a", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    7
                })
                .await;
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(memo.get_or_insert_with("b", || async { 8 }).await, 8);
    }

    #[tokio::test]
    async fn test_failures_remembered_until_cleared() {
        let memo = Memo::<String, Result<String, String>>::new();
        let calls = AtomicUsize::new(0);
        let fetch = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<String, _>("offline".to_string())
        };

        assert!(memo.get_or_insert_with("http://a".to_string(), fetch).await.is_err());
        assert!(memo.get_or_insert_with("http://a".to_string(), fetch).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        memo.clear().await;
        memo.get_or_insert_with("http://a".to_string(), fetch).await.ok();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
