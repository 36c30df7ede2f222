use std::collections::VecDeque;

use tokio::sync::RwLock;

/// Append-only history that keeps at most `capacity` of the newest entries.
///
/// Writers take the lock only for a push/evict; readers receive a cloned
/// snapshot, so a slow reader never holds up the writer.
pub struct RollingHistory<T> {
    entries: RwLock<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> RollingHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn push(&self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write().await;
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// All retained entries, oldest first.
    pub async fn snapshot(&self) -> Vec<T> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// The newest `n` entries, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<T> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
