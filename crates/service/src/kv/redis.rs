use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use configs::StoreConfig;

use crate::errors::ServiceError;
use crate::retry::{retry_with_policy, RetryPolicy};
use super::resp::{decode, encode_command, FrameScanner, RespValue};
use super::KvStore;

const READ_CHUNK: usize = 4096;

/// One authenticated, database-selected TCP connection.
struct Connection {
    stream: TcpStream,
    buf: Vec<u8>,
    scanner: FrameScanner,
}

impl Connection {
    async fn open(cfg: &StoreConfig) -> Result<Self, ServiceError> {
        let addr = cfg.address();
        let stream = tokio::time::timeout(cfg.connect_timeout(), TcpStream::connect(&addr))
            .await
            .map_err(|_| ServiceError::Timeout(format!("connecting to {addr}")))??;
        stream.set_nodelay(true)?;

        let mut conn = Self { stream, buf: Vec::with_capacity(READ_CHUNK), scanner: FrameScanner::default() };
        if let Some(password) = cfg.password.as_deref() {
            conn.call(&["AUTH", password]).await?;
        }
        if cfg.db_index != 0 {
            let index = cfg.db_index.to_string();
            conn.call(&["SELECT", index.as_str()]).await?;
        }
        info!(%addr, db = cfg.db_index, "connected to key-value store");
        Ok(conn)
    }

    /// Send one command and wait for its reply. Error replies become `ServiceError::Server`.
    async fn call(&mut self, args: &[&str]) -> Result<RespValue, ServiceError> {
        self.stream.write_all(&encode_command(args)).await?;
        self.stream.flush().await?;

        loop {
            // decode only once the whole frame is buffered
            if let Some(len) = self.scanner.scan(&self.buf)? {
                let Some((value, used)) = decode(&self.buf[..len])? else {
                    return Err(ServiceError::protocol("scanned frame failed to decode"));
                };
                self.buf.drain(..used);
                return match value {
                    RespValue::Error(msg) => Err(ServiceError::Server(msg)),
                    other => Ok(other),
                };
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(ServiceError::ConnectionClosed);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Redis-backed store speaking RESP2.
///
/// Construction never touches the network: the connection is opened by the first
/// command, so an unreachable server surfaces as an error from that command.
/// A transport failure drops the connection and the command is retried per the
/// configured policy; server error replies are returned as-is.
pub struct RedisKv {
    config: StoreConfig,
    policy: RetryPolicy,
    conn: Mutex<Option<Connection>>,
}

impl RedisKv {
    pub fn new(config: StoreConfig) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self::with_policy(config, policy)
    }

    pub fn with_policy(config: StoreConfig, policy: RetryPolicy) -> Self {
        Self { config, policy, conn: Mutex::new(None) }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Round-trip a `PING`, connecting first if needed.
    pub async fn ping(&self) -> Result<(), ServiceError> {
        match self.command(&["PING"]).await? {
            RespValue::SimpleString(s) if s == "PONG" => Ok(()),
            other => Err(ServiceError::protocol(format!("unexpected PING reply: {}", other.kind()))),
        }
    }

    async fn command(&self, args: &[&str]) -> Result<RespValue, ServiceError> {
        retry_with_policy(&self.policy, || self.call_once(args)).await
    }

    async fn call_once(&self, args: &[&str]) -> Result<RespValue, ServiceError> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(Connection::open(&self.config).await?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(ServiceError::ConnectionClosed);
        };
        let result = conn.call(args).await;
        if let Err(e) = &result {
            // a desynchronized stream is as unusable as a broken one
            if e.is_retryable() || matches!(e, ServiceError::Protocol(_)) {
                warn!(error = %e, "dropping store connection");
                *guard = None;
            }
        }
        result
    }

    /// Map `WRONGTYPE` replies onto the key that caused them.
    async fn keyed(&self, key: &str, args: &[&str]) -> Result<RespValue, ServiceError> {
        match self.command(args).await {
            Err(ServiceError::Server(msg)) if msg.starts_with("WRONGTYPE") => {
                Err(ServiceError::WrongType(key.to_string()))
            }
            other => other,
        }
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn set_string(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        debug!(key, "SET");
        self.keyed(key, &["SET", key, value]).await.map(|_| ())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, ServiceError> {
        debug!(key, "GET");
        self.keyed(key, &["GET", key]).await?.into_string()
    }

    async fn append_list(&self, key: &str, items: &[String]) -> Result<(), ServiceError> {
        debug!(key, count = items.len(), "RPUSH");
        if items.is_empty() {
            // RPUSH needs at least one element
            return Ok(());
        }
        let mut args: Vec<&str> = Vec::with_capacity(items.len() + 2);
        args.push("RPUSH");
        args.push(key);
        args.extend(items.iter().map(String::as_str));
        self.keyed(key, &args).await.map(|_| ())
    }

    async fn get_list_range(&self, key: &str, start: i64, end: i64) -> Result<Option<Vec<String>>, ServiceError> {
        debug!(key, start, end, "LRANGE");
        let (start, end) = (start.to_string(), end.to_string());
        let items = self.keyed(key, &["LRANGE", key, start.as_str(), end.as_str()]).await?.into_string_list()?;
        // an empty array covers both a missing key and an out-of-range slice
        Ok(items.filter(|list| !list.is_empty()))
    }

    async fn flush_all(&self) -> Result<(), ServiceError> {
        debug!(db = self.config.db_index, "FLUSHDB");
        self.command(&["FLUSHDB"]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_config() -> StoreConfig {
        // port 1 on loopback is never a redis server
        StoreConfig {
            port: 1,
            max_retries: 1,
            connect_timeout_secs: 1,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
            ..StoreConfig::default()
        }
    }

    #[test]
    fn construction_is_lazy() {
        let kv = RedisKv::new(unreachable_config());
        assert_eq!(kv.config().port, 1);
    }

    #[tokio::test]
    async fn unreachable_server_fails_on_first_use() {
        let kv = RedisKv::with_policy(
            unreachable_config(),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2), true),
        );
        let err = kv.get_string("domain").await.unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }
}
