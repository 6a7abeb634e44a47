//! Process-wide TTL cache of loaded partitions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use super::error::ExplorerError;
use super::partition::{Frame, PartitionKey, PartitionStore};

struct Entry {
    loaded_at: Instant,
    frame: Arc<Frame>,
}

/// Caches frames by partition key for a fixed time-to-live.
///
/// Concurrent misses on the same key may both load; the last one wins.
pub struct PartitionCache {
    store: Arc<dyn PartitionStore>,
    ttl: Duration,
    entries: RwLock<HashMap<PartitionKey, Entry>>,
}

impl PartitionCache {
    pub fn new(store: Arc<dyn PartitionStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached frame, loading it when missing or expired. Every load also
    /// drops the other expired entries.
    pub async fn get(&self, key: &PartitionKey) -> Result<Arc<Frame>, ExplorerError> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.loaded_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&entry.frame));
                }
            }
        }

        debug!("Cache miss for {:?}", key);
        let frame = Arc::new(self.store.load(key).await?);
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        let before = entries.len();
        entries.retain(|_, entry| entry.loaded_at.elapsed() < ttl);
        if entries.len() < before {
            debug!("Evicted {} expired partitions", before - entries.len());
        }
        entries.insert(
            key.clone(),
            Entry {
                loaded_at: Instant::now(),
                frame: Arc::clone(&frame),
            },
        );
        Ok(frame)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
