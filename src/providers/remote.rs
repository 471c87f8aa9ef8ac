//! Remote Provider
//!
//! Redis through a small pool of multiplexed `ConnectionManager`s. Expiry is
//! native (`SET .. PX`), so there is no local sweep. Multi-key operations are
//! sent as one command or one pipeline. Tag groups are Redis sets under
//! `__tag:<tag>`; members whose key has gone are pruned when the tag is read.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, RedisResult, Script};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::registry::ProviderFactory;
use crate::config::{CacheConfig, RemoteConfig};
use crate::error::{CacheError, Result};
use crate::providers::{AtomicSupport, Provider, ProviderCounters, TagSupport};

const TAG_PREFIX: &str = "__tag:";

const DELETE_IF_EQUALS: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

const EXPIRE_IF_EQUALS: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
end
return 0
"#;

/// Builds the connection URL for one `host:port` address.
pub fn build_url(address: &str, password: Option<&str>, database: i64) -> String {
    match password {
        Some(password) => format!("redis://:{}@{}/{}", password, address, database),
        None => format!("redis://{}/{}", address, database),
    }
}

/// Largest `PX` sent. Redis rejects a deadline past `i64::MAX` milliseconds.
const MAX_PX: u64 = i64::MAX as u64 / 2;

/// Milliseconds for a `PX` argument. Redis rejects 0, so sub-millisecond
/// lifetimes round up; lifetimes past [`MAX_PX`] are clamped to it.
fn px(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).clamp(1, MAX_PX)
}

fn tag_key(tag: &str) -> String {
    format!("{TAG_PREFIX}{tag}")
}

fn encode(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode(raw: &str) -> Result<Value> {
    Ok(serde_json::from_str(raw)?)
}

// == Remote Provider ==
pub struct RemoteProvider {
    pool: Vec<ConnectionManager>,
    next: AtomicUsize,
    /// Upper bound on one command round trip
    op_timeout: Duration,
    address: String,
    delete_if_equals: Script,
    expire_if_equals: Script,
    closed: AtomicBool,
}

impl RemoteProvider {
    // == Connect ==
    /// Tries each configured address in order and keeps the first one that
    /// answers `PING`, then opens `pool_size` connections to it.
    pub async fn connect(config: &RemoteConfig) -> Result<Self> {
        let manager_config = ConnectionManagerConfig::new().set_number_of_retries(config.max_retries);
        let op_timeout = config.read_timeout.max(config.write_timeout);

        let mut failures = Vec::new();
        for address in config.addresses.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
            let url = build_url(address, config.password.as_deref(), config.database);
            match open_checked(&url, manager_config.clone(), config.conn_timeout).await {
                Ok((client, first)) => {
                    let mut pool = Vec::with_capacity(config.pool_size.max(1));
                    pool.push(first);
                    while pool.len() < config.pool_size {
                        pool.push(
                            open_manager(&client, manager_config.clone(), config.conn_timeout).await?,
                        );
                    }

                    info!(address, pool_size = pool.len(), "Connected to Redis");
                    return Ok(Self {
                        pool,
                        next: AtomicUsize::new(0),
                        op_timeout,
                        address: address.to_string(),
                        delete_if_equals: Script::new(DELETE_IF_EQUALS),
                        expire_if_equals: Script::new(EXPIRE_IF_EQUALS),
                        closed: AtomicBool::new(false),
                    });
                }
                Err(e) => {
                    warn!(address, "Redis address unavailable: {}", e);
                    failures.push(format!("{address}: {e}"));
                }
            }
        }

        Err(CacheError::Connection(format!(
            "no reachable Redis server ({})",
            failures.join("; ")
        )))
    }

    /// Address of the server this provider is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    fn conn(&self) -> Result<ConnectionManager> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Operation("remote provider is closed".to_string()));
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.pool.len();
        Ok(self.pool[i].clone())
    }

    /// Awaits one Redis call under the operation timeout.
    async fn timed<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Connection(format!(
                "Redis call timed out after {:?}",
                self.op_timeout
            ))),
        }
    }

    /// Drops members of `tag_set` whose key no longer exists and returns the
    /// live ones, sorted.
    async fn live_members(&self, conn: &mut ConnectionManager, tag_set: &str) -> Result<Vec<String>> {
        let members: Vec<String> = self
            .timed(redis::cmd("SMEMBERS").arg(tag_set).query_async(conn))
            .await?;
        if members.is_empty() {
            return Ok(members);
        }

        let mut pipe = redis::pipe();
        for member in &members {
            pipe.cmd("EXISTS").arg(member);
        }
        let present: Vec<bool> = self.timed(pipe.query_async(conn)).await?;

        let mut live = Vec::with_capacity(members.len());
        let mut stale = Vec::new();
        for (member, present) in members.into_iter().zip(present) {
            if present {
                live.push(member);
            } else {
                stale.push(member);
            }
        }

        if !stale.is_empty() {
            debug!(tag_set, stale = stale.len(), "Pruning stale tag members");
            self.timed(
                redis::cmd("SREM")
                    .arg(tag_set)
                    .arg(&stale)
                    .query_async::<()>(conn),
            )
            .await?;
        }

        live.sort();
        Ok(live)
    }
}

async fn open_manager(
    client: &Client,
    config: ConnectionManagerConfig,
    conn_timeout: Duration,
) -> Result<ConnectionManager> {
    match tokio::time::timeout(conn_timeout, ConnectionManager::new_with_config(client.clone(), config)).await {
        Ok(manager) => Ok(manager?),
        Err(_) => Err(CacheError::Connection(format!(
            "connect timed out after {conn_timeout:?}"
        ))),
    }
}

async fn open_checked(
    url: &str,
    config: ConnectionManagerConfig,
    conn_timeout: Duration,
) -> Result<(Client, ConnectionManager)> {
    let client = Client::open(url).map_err(|e| CacheError::Config(format!("invalid Redis address: {e}")))?;
    let mut manager = open_manager(&client, config, conn_timeout).await?;

    match tokio::time::timeout(conn_timeout, redis::cmd("PING").query_async::<String>(&mut manager)).await {
        Ok(pong) => {
            pong?;
            Ok((client, manager))
        }
        Err(_) => Err(CacheError::Connection(format!(
            "PING timed out after {conn_timeout:?}"
        ))),
    }
}

#[async_trait]
impl Provider for RemoteProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut conn = self.conn()?;
        let raw: Option<String> = self
            .timed(redis::cmd("GET").arg(key).query_async(&mut conn))
            .await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn()?;
        let raw: Vec<Option<String>> = self
            .timed(redis::cmd("MGET").arg(keys).query_async(&mut conn))
            .await?;

        let mut found = HashMap::with_capacity(keys.len());
        for (key, raw) in keys.iter().zip(raw) {
            if let Some(raw) = raw {
                found.insert(key.clone(), decode(&raw)?);
            }
        }
        Ok(found)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let payload = encode(&value)?;
        let mut conn = self.conn()?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(payload);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(px(ttl));
        }
        self.timed(cmd.query_async::<()>(&mut conn)).await
    }

    async fn set_multi(&self, items: Vec<(String, Value)>, ttl: Option<Duration>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (key, value) in &items {
            let cmd = pipe.cmd("SET").arg(key).arg(encode(value)?);
            if let Some(ttl) = ttl {
                cmd.arg("PX").arg(px(ttl));
            }
            cmd.ignore();
        }

        let mut conn = self.conn()?;
        self.timed(pipe.query_async::<()>(&mut conn)).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let removed: usize = self
            .timed(redis::cmd("DEL").arg(key).query_async(&mut conn))
            .await?;
        Ok(removed > 0)
    }

    async fn delete_multi(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        self.timed(redis::cmd("DEL").arg(keys).query_async(&mut conn))
            .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        self.timed(redis::cmd("EXISTS").arg(key).query_async(&mut conn))
            .await
    }

    async fn flush(&self) -> Result<()> {
        let mut conn = self.conn()?;
        self.timed(redis::cmd("FLUSHDB").query_async::<()>(&mut conn))
            .await?;
        debug!(address = %self.address, "Redis database flushed");
        Ok(())
    }

    async fn get_ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn()?;
        let ms: i64 = self
            .timed(redis::cmd("PTTL").arg(key).query_async(&mut conn))
            .await?;

        match ms {
            -2 => Err(CacheError::NotFound(key.to_string())),
            -1 => Ok(None),
            ms => Ok(Some(Duration::from_millis(ms.max(0) as u64))),
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(address = %self.address, "Remote provider closed");
        }
        Ok(())
    }

    async fn counters(&self) -> ProviderCounters {
        ProviderCounters::default()
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let ping = redis::cmd("PING");
        let reply: String = self.timed(ping.query_async(&mut conn)).await?;
        if reply != "PONG" {
            return Err(CacheError::Connection(format!("unexpected PING reply: {reply}")));
        }
        Ok(())
    }

    fn tagging(&self) -> Option<&dyn TagSupport> {
        Some(self)
    }

    fn atomic(&self) -> Option<&dyn AtomicSupport> {
        Some(self)
    }
}

#[async_trait]
impl TagSupport for RemoteProvider {
    async fn set_with_tags(
        &self,
        key: &str,
        value: Value,
        tags: &[String],
        ttl: Option<Duration>,
    ) -> Result<()> {
        let payload = encode(&value)?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        let set = pipe.cmd("SET").arg(key).arg(payload);
        if let Some(ttl) = ttl {
            set.arg("PX").arg(px(ttl));
        }
        set.ignore();
        for tag in tags {
            pipe.cmd("SADD").arg(tag_key(tag)).arg(key).ignore();
        }

        let mut conn = self.conn()?;
        self.timed(pipe.query_async::<()>(&mut conn)).await
    }

    async fn keys_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        let mut conn = self.conn()?;
        self.live_members(&mut conn, &tag_key(tag)).await
    }

    async fn delete_by_tag(&self, tag: &str) -> Result<usize> {
        let mut conn = self.conn()?;
        let tag_set = tag_key(tag);
        let members: Vec<String> = self
            .timed(redis::cmd("SMEMBERS").arg(&tag_set).query_async(&mut conn))
            .await?;

        if members.is_empty() {
            self.timed(redis::cmd("DEL").arg(&tag_set).query_async::<()>(&mut conn))
                .await?;
            return Ok(0);
        }

        let (removed,): (usize,) = self
            .timed(
                redis::pipe()
                    .atomic()
                    .cmd("DEL")
                    .arg(&members)
                    .cmd("DEL")
                    .arg(&tag_set)
                    .ignore()
                    .query_async(&mut conn),
            )
            .await?;
        Ok(removed)
    }
}

#[async_trait]
impl AtomicSupport for RemoteProvider {
    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<bool> {
        let payload = encode(&value)?;
        let mut conn = self.conn()?;
        let reply: Option<String> = self
            .timed(
                redis::cmd("SET")
                    .arg(key)
                    .arg(payload)
                    .arg("NX")
                    .arg("PX")
                    .arg(px(ttl))
                    .query_async(&mut conn),
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &Value) -> Result<bool> {
        let payload = encode(expected)?;
        let mut conn = self.conn()?;
        let removed: i64 = self
            .timed(
                self.delete_if_equals
                    .key(key)
                    .arg(payload)
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(removed == 1)
    }

    async fn expire_if_equals(&self, key: &str, expected: &Value, ttl: Duration) -> Result<bool> {
        let payload = encode(expected)?;
        let mut conn = self.conn()?;
        let updated: i64 = self
            .timed(
                self.expire_if_equals
                    .key(key)
                    .arg(payload)
                    .arg(px(ttl))
                    .invoke_async(&mut conn),
            )
            .await?;
        Ok(updated == 1)
    }
}

// == Factory ==
/// Connects a [`RemoteProvider`].
#[derive(Debug, Default)]
pub struct RemoteProviderFactory;

#[async_trait]
impl ProviderFactory for RemoteProviderFactory {
    async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Provider>> {
        Ok(Arc::new(RemoteProvider::connect(&config.remote).await?))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        assert_eq!(build_url("127.0.0.1:6379", None, 0), "redis://127.0.0.1:6379/0");
        assert_eq!(
            build_url("cache:6380", Some("secret"), 2),
            "redis://:secret@cache:6380/2"
        );
    }

    #[test]
    fn test_px_rounds_up() {
        assert_eq!(px(Duration::from_secs(2)), 2000);
        assert_eq!(px(Duration::from_micros(10)), 1);
        assert_eq!(px(Duration::ZERO), 1);
    }

    #[test]
    fn test_px_clamps_huge_lifetimes() {
        assert_eq!(px(Duration::MAX), MAX_PX);
        assert_eq!(px(Duration::from_secs(u64::MAX)), MAX_PX);
    }

    #[test]
    fn test_tag_key() {
        assert_eq!(tag_key("users"), "__tag:users");
    }

    #[test]
    fn test_value_codec() {
        let value = serde_json::json!({"id": 7, "roles": ["a"]});
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
        assert!(matches!(decode("not json"), Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_connect_fails_without_server() {
        let config = RemoteConfig {
            addresses: vec!["127.0.0.1:1".to_string()],
            conn_timeout: Duration::from_millis(300),
            max_retries: 0,
            ..RemoteConfig::default()
        };

        match RemoteProvider::connect(&config).await {
            Err(e) => assert!(e.is_retryable(), "expected a connection error, got {e}"),
            Ok(_) => panic!("nothing listens on port 1"),
        }
    }
}
