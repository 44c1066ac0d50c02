use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use cobuy_core::recommender::{AffinityStore, ScoredMember, StoreError};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{Client, Cmd, FromRedisValue, RedisError};
use tracing::warn;

/// Sorted-set affinity store on a shared, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisAffinityStore {
    connection: ConnectionManager,
    timeout_ms: u64,
}

impl RedisAffinityStore {
    pub async fn connect(
        redis_url: &str,
        timeout_ms: u64,
        max_retries: usize,
    ) -> Result<Self, StoreError> {
        let timeout = Duration::from_millis(timeout_ms);
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(max_retries)
            .set_connection_timeout(timeout);

        // The URL may carry a password; only the error kind is reported.
        let client = Client::open(redis_url).map_err(|error| {
            StoreError::Unavailable(format!("invalid redis url ({:?})", error.kind()))
        })?;

        let connection =
            match tokio::time::timeout(timeout, client.get_connection_manager_with_config(config))
                .await
            {
                Ok(result) => result.map_err(classify)?,
                Err(_) => return Err(StoreError::Timeout { operation: "CONNECT", timeout_ms }),
            };

        Ok(Self { connection, timeout_ms })
    }

    async fn run<T: FromRedisValue>(
        &self,
        operation: &'static str,
        command: Cmd,
    ) -> Result<T, StoreError> {
        let mut connection = self.connection.clone();
        let timeout = Duration::from_millis(self.timeout_ms);

        match tokio::time::timeout(timeout, command.query_async(&mut connection)).await {
            Ok(result) => result.map_err(|error| {
                let error = classify(error);
                warn!(
                    event_name = "affinity.store.command_failed",
                    operation,
                    error = %error,
                    "redis command failed"
                );
                error
            }),
            Err(_) => {
                warn!(
                    event_name = "affinity.store.command_timeout",
                    operation,
                    timeout_ms = self.timeout_ms,
                    "redis command timed out"
                );
                Err(StoreError::Timeout { operation, timeout_ms: self.timeout_ms })
            }
        }
    }
}

fn classify(error: RedisError) -> StoreError {
    if error.is_io_error()
        || error.is_connection_refusal()
        || error.is_connection_dropped()
        || error.is_timeout()
    {
        StoreError::Unavailable(error.to_string())
    } else {
        StoreError::Protocol(error.to_string())
    }
}

/// `ZREVRANGE` start/stop for a window, or `None` when the window is empty.
fn range_bounds(offset: usize, count: Option<usize>) -> Option<(isize, isize)> {
    let start = isize::try_from(offset).unwrap_or(isize::MAX);
    match count {
        Some(0) => None,
        Some(count) => {
            let stop = isize::try_from(offset.saturating_add(count - 1)).unwrap_or(isize::MAX);
            Some((start, stop))
        }
        None => Some((start, -1)),
    }
}

const SCAN_BATCH: usize = 200;

/// Escapes the glob metacharacters of a `SCAN MATCH` pattern.
fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl AffinityStore for RedisAffinityStore {
    async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64, StoreError> {
        let mut command = redis::cmd("ZINCRBY");
        command.arg(key).arg(delta).arg(member);
        self.run("ZINCRBY", command).await
    }

    async fn merge_sum(&self, destination: &str, sources: &[String]) -> Result<(), StoreError> {
        if sources.is_empty() {
            return self.delete_key(destination).await;
        }

        let mut command = redis::cmd("ZUNIONSTORE");
        command.arg(destination).arg(sources.len()).arg(sources);
        let _: i64 = self.run("ZUNIONSTORE", command).await?;
        Ok(())
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }

        let mut command = redis::cmd("ZREM");
        command.arg(key).arg(members);
        let _: i64 = self.run("ZREM", command).await?;
        Ok(())
    }

    async fn range_descending(
        &self,
        key: &str,
        offset: usize,
        count: Option<usize>,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        let Some((start, stop)) = range_bounds(offset, count) else {
            return Ok(Vec::new());
        };

        let mut command = redis::cmd("ZREVRANGE");
        command.arg(key).arg(start).arg(stop).arg("WITHSCORES");
        self.run("ZREVRANGE", command).await
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        let mut command = redis::cmd("DEL");
        command.arg(key);
        let _: i64 = self.run("DEL", command).await?;
        Ok(())
    }

    async fn scan_keys(&self, prefix: &str, suffix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{}*{}", escape_glob(prefix), escape_glob(suffix));
        // SCAN may repeat a key across batches.
        let mut keys = BTreeSet::new();
        let mut cursor = 0u64;

        loop {
            let mut command = redis::cmd("SCAN");
            command.arg(cursor).arg("MATCH").arg(&pattern).arg("COUNT").arg(SCAN_BATCH);
            let (next, batch): (u64, Vec<String>) = self.run("SCAN", command).await?;
            keys.extend(batch);

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys.into_iter().filter(|key| key.len() >= prefix.len() + suffix.len()).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let reply: String = self.run("PING", redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Protocol(format!("unexpected PING reply `{reply}`")))
        }
    }
}
