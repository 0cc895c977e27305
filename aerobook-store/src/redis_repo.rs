use aerobook_core::error::LockError;
use aerobook_core::lock::{DistributedLock, LockHandle, LockLease, LockProvider};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use redis::RedisResult;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

const KEY_PREFIX: &str = "aerobook:lock:";

// Deletes the key only while it still carries our token.
const RELEASE_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    else
        return 0
    end
"#;

pub fn lock_key(name: &str) -> String {
    format!("{KEY_PREFIX}{name}")
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// `SET key token NX PX ttl`. True when the key was free and is now ours.
    pub async fn try_lock(&self, key: &str, token: &str, ttl: Duration) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    /// False when the key had already expired or been taken over.
    pub async fn unlock(&self, key: &str, token: &str) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let deleted: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Lock provider shared by every API instance pointing at the same Redis.
#[derive(Clone)]
pub struct RedisLockProvider {
    client: RedisClient,
    ttl: Duration,
    retry_interval: Duration,
}

impl RedisLockProvider {
    pub fn new(client: RedisClient, ttl: Duration, retry_interval: Duration) -> Self {
        Self {
            client,
            ttl,
            retry_interval,
        }
    }
}

impl LockProvider for RedisLockProvider {
    fn create_lock(&self, name: &str) -> Box<dyn DistributedLock> {
        Box::new(RedisLock {
            name: name.to_string(),
            key: lock_key(name),
            provider: self.clone(),
        })
    }
}

struct RedisLock {
    name: String,
    key: String,
    provider: RedisLockProvider,
}

#[async_trait]
impl DistributedLock for RedisLock {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_acquire(&self, timeout: Duration) -> Result<Option<LockHandle>, LockError> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + timeout;
        let client = &self.provider.client;

        loop {
            let acquired = client
                .try_lock(&self.key, &token, self.provider.ttl)
                .await
                .map_err(|e| LockError::Backend(e.to_string()))?;
            if acquired {
                debug!(lock = %self.name, "Redis lock acquired");
                let lease = RedisLease {
                    client: client.clone(),
                    key: self.key.clone(),
                    token,
                };
                return Ok(Some(LockHandle::new(self.name.clone(), Box::new(lease))));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(self.provider.retry_interval.min(deadline - now)).await;
        }
    }
}

struct RedisLease {
    client: RedisClient,
    key: String,
    token: String,
}

impl LockLease for RedisLease {
    fn release(self: Box<Self>) -> BoxFuture<'static, Result<(), LockError>> {
        Box::pin(async move {
            let released = self
                .client
                .unlock(&self.key, &self.token)
                .await
                .map_err(|e| LockError::Backend(e.to_string()))?;
            if !released {
                warn!(key = %self.key, "Lock lease expired before release");
            }
            Ok(())
        })
    }
}
