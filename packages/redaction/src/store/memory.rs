// In-process mapping store with a background expiry sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::common::mapping::SessionMapping;
use crate::kernel::traits::BaseMappingStore;

use super::StoreError;

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct StoreEntry {
    mapping: SessionMapping,
    expires_at: Instant,
}

impl StoreEntry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

type EntryMap = HashMap<(String, String), StoreEntry>;

/// Single-process mapping store.
///
/// Reads and writes from request-handling tasks and the sweep task all go
/// through the same `RwLock`, so a sweep-driven delete can never race a
/// concurrent `get` into observing a half-removed entry. Reads additionally
/// filter by deadline, so an entry whose TTL has lapsed is invisible even
/// before the next sweep touches it.
///
/// Not suitable for multi-process deployments — nothing here is shared
/// across process boundaries. Use the redis backend for that.
#[derive(Debug)]
pub struct InMemoryMappingStore {
    entries: Arc<RwLock<EntryMap>>,
    sweeper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl InMemoryMappingStore {
    /// Must be called from within a tokio runtime: the expiry sweep is
    /// spawned immediately.
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(interval: Duration) -> Self {
        let entries: Arc<RwLock<EntryMap>> = Arc::new(RwLock::new(HashMap::new()));

        let sweep_entries = Arc::clone(&entries);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let mut map = sweep_entries.write().await;
                let before = map.len();
                map.retain(|_, entry| !entry.expired(now));
                let removed = before - map.len();
                if removed > 0 {
                    tracing::debug!(removed, "swept expired session mappings");
                }
            }
        });

        Self {
            entries,
            sweeper: std::sync::Mutex::new(Some(handle)),
        }
    }

    /// Stop the background sweep and release its task. Reads keep filtering
    /// by deadline, so expired entries stay invisible either way.
    pub fn shutdown(&self) {
        let handle = self
            .sweeper
            .lock()
            .expect("sweeper handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("mapping store sweep stopped");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn key(tenant_id: &str, session_id: &str) -> (String, String) {
        (tenant_id.to_string(), session_id.to_string())
    }
}

impl Default for InMemoryMappingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InMemoryMappingStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl BaseMappingStore for InMemoryMappingStore {
    async fn save(
        &self,
        tenant_id: &str,
        session_id: &str,
        mapping: &SessionMapping,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let entry = StoreEntry {
            mapping: mapping.clone(),
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .write()
            .await
            .insert(Self::key(tenant_id, session_id), entry);
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionMapping>, StoreError> {
        let entries = self.entries.read().await;
        let entry = entries.get(&Self::key(tenant_id, session_id));
        Ok(entry
            .filter(|e| !e.expired(Instant::now()))
            .map(|e| e.mapping.clone()))
    }

    async fn delete(&self, tenant_id: &str, session_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .entries
            .write()
            .await
            .remove(&Self::key(tenant_id, session_id));
        Ok(removed.is_some_and(|e| !e.expired(Instant::now())))
    }

    async fn exists(&self, tenant_id: &str, session_id: &str) -> Result<bool, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&Self::key(tenant_id, session_id))
            .is_some_and(|e| !e.expired(Instant::now())))
    }

    async fn extend_ttl(
        &self,
        tenant_id: &str,
        session_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        match entries.get_mut(&Self::key(tenant_id, session_id)) {
            Some(entry) if !entry.expired(now) => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_tenant_keys(&self, tenant_id: &str) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(tenant, _), _| tenant != tenant_id);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::EntityType;

    fn sample_mapping(session_id: &str) -> SessionMapping {
        let mut mapping = SessionMapping::new(session_id);
        mapping.placeholder_for_value(&EntityType::new("PERSON"), "张三");
        mapping
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_and_get() {
        let store = InMemoryMappingStore::with_sweep_interval(Duration::from_secs(1));
        store
            .save("t-1", "s-1", &sample_mapping("s-1"), Duration::from_secs(60))
            .await
            .unwrap();

        let loaded = store.get("t-1", "s-1").await.unwrap().unwrap();
        assert_eq!(loaded.original_for("<PERSON_1>"), Some("张三"));
        assert!(store.exists("t-1", "s-1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_hides_entry_before_sweep() {
        // Sweep far in the future; the deadline filter alone must hide it.
        let store = InMemoryMappingStore::with_sweep_interval(Duration::from_secs(3600));
        store
            .save("t-1", "s-1", &sample_mapping("s-1"), Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert!(store.get("t-1", "s-1").await.unwrap().is_none());
        assert!(!store.exists("t-1", "s-1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_expired_entries() {
        let store = InMemoryMappingStore::with_sweep_interval(Duration::from_millis(100));
        store
            .save("t-1", "s-1", &sample_mapping("s-1"), Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        tokio::time::advance(Duration::from_millis(300)).await;
        // Give the sweep task a chance to run after its tick fired.
        tokio::task::yield_now().await;

        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_ttl_resets_countdown() {
        let store = InMemoryMappingStore::with_sweep_interval(Duration::from_secs(3600));
        store
            .save("t-1", "s-1", &sample_mapping("s-1"), Duration::from_secs(2))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(store
            .extend_ttl("t-1", "s-1", Duration::from_secs(2))
            .await
            .unwrap());

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(store.exists("t-1", "s-1").await.unwrap());

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!store.exists("t-1", "s-1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_ttl_after_expiry_fails() {
        let store = InMemoryMappingStore::with_sweep_interval(Duration::from_secs(3600));
        store
            .save("t-1", "s-1", &sample_mapping("s-1"), Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store
            .extend_ttl("t-1", "s-1", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete() {
        let store = InMemoryMappingStore::with_sweep_interval(Duration::from_secs(3600));
        store
            .save("t-1", "s-1", &sample_mapping("s-1"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.delete("t-1", "s-1").await.unwrap());
        assert!(!store.delete("t-1", "s-1").await.unwrap());
        assert!(store.get("t-1", "s-1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tenants_are_isolated() {
        let store = InMemoryMappingStore::with_sweep_interval(Duration::from_secs(3600));
        store
            .save("t-1", "s-1", &sample_mapping("s-1"), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .save("t-2", "s-1", &sample_mapping("s-1"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.exists("t-1", "s-1").await.unwrap());
        assert!(store.exists("t-2", "s-1").await.unwrap());

        assert_eq!(store.delete_tenant_keys("t-1").await.unwrap(), 1);
        assert!(!store.exists("t-1", "s-1").await.unwrap());
        assert!(store.exists("t-2", "s-1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweep_but_reads_still_filter() {
        let store = InMemoryMappingStore::with_sweep_interval(Duration::from_millis(100));
        store
            .save("t-1", "s-1", &sample_mapping("s-1"), Duration::from_millis(50))
            .await
            .unwrap();

        store.shutdown();
        tokio::time::advance(Duration::from_millis(500)).await;

        // Sweep is gone, so the entry is still resident...
        assert_eq!(store.len().await, 1);
        // ...but invisible to readers.
        assert!(store.get("t-1", "s-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_save_and_get() {
        let store = Arc::new(InMemoryMappingStore::with_sweep_interval(Duration::from_secs(
            3600,
        )));
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let session = format!("s-{i}");
                store
                    .save("t-1", &session, &sample_mapping(&session), Duration::from_secs(60))
                    .await
                    .unwrap();
                store.get("t-1", &session).await.unwrap().unwrap()
            }));
        }
        for handle in handles {
            let mapping = handle.await.unwrap();
            assert_eq!(mapping.original_for("<PERSON_1>"), Some("张三"));
        }
        assert_eq!(store.len().await, 16);
    }
}
