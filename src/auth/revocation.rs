//! Revocation markers for credentials invalidated before their natural expiry.
//!
//! The store is a TTL-keyed cache keyed by the raw credential string. Reads
//! never fail: a missing entry and an unreachable cache both answer "not
//! revoked", trading consistency for availability during a cache outage.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const REVOKED_MARKER: &str = "revoked";

/// Remaining lifetime of a credential expiring at `expires_at` (unix seconds).
///
/// `None` when the credential is already past expiry, in which case a marker
/// would never be consulted again.
pub fn remaining_lifetime(expires_at: i64, now: DateTime<Utc>) -> Option<Duration> {
    let remaining = expires_at - now.timestamp();
    if remaining > 0 {
        Some(Duration::from_secs(remaining as u64))
    } else {
        None
    }
}

#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn mark_revoked(&self, credential: &str, ttl: Duration) -> Result<()>;

    async fn is_revoked(&self, credential: &str) -> bool;

    /// Marks `credential` revoked for exactly as long as it would otherwise be
    /// valid. Returns `false` when the credential has already expired and no
    /// marker was written.
    async fn mark_revoked_until(&self, credential: &str, expires_at: i64) -> Result<bool> {
        match remaining_lifetime(expires_at, Utc::now()) {
            Some(ttl) => {
                self.mark_revoked(credential, ttl).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisRevocationSettings {
    pub url: String,
    pub key_prefix: String,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

pub struct RedisRevocationStore {
    conn: ConnectionManager,
    key_prefix: String,
    response_timeout: Duration,
}

impl RedisRevocationStore {
    /// Connects and pings the cache. Failing here is fatal for startup.
    pub async fn connect(settings: &RedisRevocationSettings) -> Result<Self> {
        let client = redis::Client::open(settings.url.as_str())
            .with_context(|| format!("Invalid revocation cache url {}", settings.url))?;

        let mut conn = tokio::time::timeout(settings.connect_timeout, ConnectionManager::new(client))
            .await
            .context("Timed out connecting to revocation cache")?
            .context("Failed to connect to revocation cache")?;

        let pong: String = tokio::time::timeout(
            settings.response_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .context("Timed out pinging revocation cache")?
        .context("Revocation cache did not answer PING")?;
        if pong != "PONG" {
            bail!("Unexpected PING reply from revocation cache: {}", pong);
        }

        info!("Connected to revocation cache at {}", settings.url);
        Ok(Self {
            conn,
            key_prefix: settings.key_prefix.clone(),
            response_timeout: settings.response_timeout,
        })
    }

    fn key(&self, credential: &str) -> String {
        format!("{}{}", self.key_prefix, credential)
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn mark_revoked(&self, credential: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = self.key(credential);
        let secs = ttl.as_secs().max(1);
        let _: () = tokio::time::timeout(
            self.response_timeout,
            conn.set_ex(&key, REVOKED_MARKER, secs),
        )
        .await
        .context("Timed out writing revocation marker")?
        .context("Failed to write revocation marker")?;
        debug!("Wrote revocation marker with ttl {}s", secs);
        Ok(())
    }

    async fn is_revoked(&self, credential: &str) -> bool {
        let mut conn = self.conn.clone();
        let key = self.key(credential);
        lookup_verdict(tokio::time::timeout(self.response_timeout, conn.exists(&key)).await)
    }
}

/// Turns a bounded cache lookup into a verdict. Errors and timeouts read as
/// not revoked.
fn lookup_verdict(
    lookup: std::result::Result<redis::RedisResult<bool>, tokio::time::error::Elapsed>,
) -> bool {
    match lookup {
        Ok(Ok(found)) => found,
        Ok(Err(e)) => {
            warn!("Revocation cache lookup failed, treating as not revoked: {}", e);
            false
        }
        Err(_) => {
            warn!("Revocation cache lookup timed out, treating as not revoked");
            false
        }
    }
}

/// Process-local store used when no external cache is configured, and in tests.
#[derive(Default)]
pub struct InMemoryRevocationStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn mark_revoked(&self, credential: &str, ttl: Duration) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Revocation map mutex poisoned"))?;
        let now = Instant::now();
        entries.retain(|_, deadline| *deadline > now);
        entries.insert(credential.to_string(), now + ttl);
        Ok(())
    }

    async fn is_revoked(&self, credential: &str) -> bool {
        match self.entries.lock() {
            Ok(entries) => entries
                .get(credential)
                .is_some_and(|deadline| *deadline > Instant::now()),
            Err(_) => {
                warn!("Revocation map mutex poisoned, treating as not revoked");
                false
            }
        }
    }
}
