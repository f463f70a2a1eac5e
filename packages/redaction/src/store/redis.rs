// Redis-backed mapping store.
//
// TTL is delegated to redis' native expiring keys (`SET ... EX` /
// `EXPIRE`), which keeps expiry consistent when several gateway processes
// share one redis instance.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::common::mapping::{PortableMapping, SessionMapping};
use crate::kernel::traits::BaseMappingStore;

use super::StoreError;

const DEFAULT_KEY_PREFIX: &str = "mapping";
const SCAN_BATCH: usize = 100;

/// Shared mapping store for multi-process deployments.
///
/// Keys are `{prefix}:{tenant}:{session}`; payloads are the portable
/// mapping JSON. The connection manager reconnects on its own, so a clone
/// per call is cheap.
pub struct RedisMappingStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisMappingStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(backend_err)?;
        let conn = ConnectionManager::new(client).await.map_err(backend_err)?;
        tracing::info!("connected redis mapping store");
        Ok(Self {
            conn,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    /// Namespace keys differently, e.g. to run several environments against
    /// one redis instance.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, tenant_id: &str, session_id: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, tenant_id, session_id)
    }

    fn tenant_pattern(&self, tenant_id: &str) -> String {
        format!("{}:{}:*", self.key_prefix, tenant_id)
    }
}

fn backend_err(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Redis rejects a zero expiry; a mapping saved with a sub-second TTL still
/// needs to live long enough to be read back.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl BaseMappingStore for RedisMappingStore {
    async fn save(
        &self,
        tenant_id: &str,
        session_id: &str,
        mapping: &SessionMapping,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&mapping.to_portable())?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(tenant_id, session_id), payload, ttl_secs(ttl))
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionMapping>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .get(self.key(tenant_id, session_id))
            .await
            .map_err(backend_err)?;

        match payload {
            Some(payload) => {
                let portable: PortableMapping = serde_json::from_str(&payload)?;
                let mapping = SessionMapping::from_portable(portable)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?;
                Ok(Some(mapping))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, tenant_id: &str, session_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .del(self.key(tenant_id, session_id))
            .await
            .map_err(backend_err)?;
        Ok(removed > 0)
    }

    async fn exists(&self, tenant_id: &str, session_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let present: bool = conn
            .exists(self.key(tenant_id, session_id))
            .await
            .map_err(backend_err)?;
        Ok(present)
    }

    async fn extend_ttl(
        &self,
        tenant_id: &str,
        session_id: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let refreshed: bool = conn
            .expire(self.key(tenant_id, session_id), ttl_secs(ttl) as i64)
            .await
            .map_err(backend_err)?;
        Ok(refreshed)
    }

    async fn delete_tenant_keys(&self, tenant_id: &str) -> Result<u64, StoreError> {
        // Cursor SCAN, never KEYS: this runs against a live shared
        // instance.
        let pattern = self.tenant_pattern(tenant_id);
        let mut conn = self.conn.clone();
        let mut removed = 0u64;
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(backend_err)?;

            if !keys.is_empty() {
                let batch_removed: u64 = conn.del(&keys).await.map_err(backend_err)?;
                removed += batch_removed;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        tracing::info!(tenant_id, removed, "deleted tenant session mappings");
        Ok(removed)
    }
}
