//! Cached copy of the issuer's public key for services that only verify
//! access tokens.
//!
//! The key is fetched from the issuer's key-set endpoint at startup and on
//! a fixed interval afterwards. A failed fetch keeps the previous key. The
//! cache records every outcome so callers can tell a fresh key from a stale
//! or missing one instead of failing silently.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use jsonwebtoken::DecodingKey;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::AuthClient;
use crate::config::KeyCacheConfig;
use crate::error::AppError;
use crate::jwks::RsaJwk;

/// Lower bound for the polling period; `tokio::time::interval` rejects zero.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

pub struct CachedKey {
    pub jwk: RsaJwk,
    pub decoding_key: DecodingKey,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCacheStatus {
    Fresh,
    Stale,
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyCacheHealth {
    pub status: KeyCacheStatus,
    pub key_id: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Default)]
struct FetchLog {
    last_failure: Option<DateTime<Utc>>,
    last_error: Option<String>,
    consecutive_failures: u32,
}

pub struct PublicKeyCache {
    client: AuthClient,
    stale_after: chrono::Duration,
    key: RwLock<Option<Arc<CachedKey>>>,
    log: RwLock<FetchLog>,
}

impl PublicKeyCache {
    pub fn new(client: AuthClient, stale_after: Duration) -> Self {
        Self {
            client,
            stale_after: chrono::Duration::from_std(stale_after)
                .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 1000)),
            key: RwLock::new(None),
            log: RwLock::new(FetchLog::default()),
        }
    }

    /// A key is considered stale after three missed refresh intervals.
    pub fn from_config(config: &KeyCacheConfig) -> Result<Self, AppError> {
        let client = AuthClient::new(&config.issuer_url)?;
        Ok(Self::new(client, config.refresh_interval() * 3))
    }

    pub async fn current(&self) -> Option<Arc<CachedKey>> {
        self.key.read().await.clone()
    }

    /// Fetch the key set once. On failure the previously cached key stays
    /// in place and the error is returned after being recorded.
    pub async fn refresh(&self) -> Result<(), AppError> {
        match self.fetch().await {
            Ok(cached) => {
                let kid = cached.jwk.kid.clone();
                *self.key.write().await = Some(Arc::new(cached));
                let mut log = self.log.write().await;
                log.consecutive_failures = 0;
                log.last_error = None;
                info!("Refreshed access token verification key (kid: {:?})", kid);
                Ok(())
            }
            Err(e) => {
                let mut log = self.log.write().await;
                log.last_failure = Some(Utc::now());
                log.last_error = Some(e.to_string());
                log.consecutive_failures += 1;
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<CachedKey, AppError> {
        let key_set = self.client.fetch_key_set().await?;
        let jwk = key_set.first_rsa_key()?.clone();
        let decoding_key = jwk.decoding_key()?;

        Ok(CachedKey {
            jwk,
            decoding_key,
            fetched_at: Utc::now(),
        })
    }

    pub async fn health(&self) -> KeyCacheHealth {
        self.health_at(Utc::now()).await
    }

    pub async fn health_at(&self, now: DateTime<Utc>) -> KeyCacheHealth {
        let key = self.current().await;
        let log = self.log.read().await;

        let status = match key.as_ref() {
            None => KeyCacheStatus::Missing,
            Some(k) if now - k.fetched_at > self.stale_after => KeyCacheStatus::Stale,
            Some(_) => KeyCacheStatus::Fresh,
        };

        KeyCacheHealth {
            status,
            key_id: key.as_ref().and_then(|k| k.jwk.kid.clone()),
            last_success: key.as_ref().map(|k| k.fetched_at),
            last_failure: log.last_failure,
            last_error: log.last_error.clone(),
            consecutive_failures: log.consecutive_failures,
        }
    }

    /// Poll the issuer every `interval`, starting immediately. Intervals
    /// below `MIN_REFRESH_INTERVAL` are raised to it.
    pub fn spawn_refresh(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        if interval < MIN_REFRESH_INTERVAL {
            warn!(
                "Key refresh interval {:?} is below the minimum, using {:?}",
                interval, MIN_REFRESH_INTERVAL
            );
        }
        let interval = interval.max(MIN_REFRESH_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh().await {
                    let health = self.health().await;
                    warn!(
                        "Failed to refresh verification key ({} consecutive failures, status {:?}): {}",
                        health.consecutive_failures, health.status, e
                    );
                }
            }
        })
    }
}

/// Health endpoint for dependents: 200 while the key is fresh, 503 otherwise.
pub async fn key_cache_health(cache: web::Data<PublicKeyCache>) -> HttpResponse {
    let health = cache.health().await;
    match health.status {
        KeyCacheStatus::Fresh => HttpResponse::Ok().json(health),
        _ => HttpResponse::ServiceUnavailable().json(health),
    }
}
