//! Best-effort remote mirror of local state.
//!
//! Write-through: the local store is written synchronously and stays
//! authoritative for the session; the remote upsert is fired afterwards
//! and its failure is logged and swallowed, never surfaced to the
//! progression caller. On load, remote data wins if present and newer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};

use crate::backoff::{with_backoff, Backoff};
use crate::config::Config;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::profile::UserProfile;
use crate::seed::SoulSeed;
use crate::store::{read_json, write_json, KvStore};

#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Idempotent upsert keyed by the stable user id.
    async fn upsert(&self, table: &str, user_id: &str, record: Value) -> Result<()>;
    async fn fetch(&self, table: &str, user_id: &str) -> Result<Option<Value>>;
}

/// PostgREST-style hosted backend.
pub struct HttpBackend {
    client: Client,
    base: String,
    api_key: Option<String>,
    backoff: Backoff,
}

impl HttpBackend {
    pub fn new(cfg: &Config) -> Result<Self> {
        let base = cfg
            .remote_base
            .clone()
            .ok_or_else(|| anyhow!("REMOTE_BASE is not configured"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base,
            api_key: cfg.remote_key.clone(),
            backoff: Backoff {
                max_attempts: cfg.sync_max_attempts,
                base_delay_ms: cfg.backoff_base_ms,
                max_delay_ms: cfg.backoff_max_ms,
            },
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("apikey", key.clone()),
            None => builder,
        }
    }

    async fn upsert_once(&self, url: &str, table: &str, body: &Value) -> Result<()> {
        let resp = self
            .request(self.client.post(url))
            .header("Prefer", "resolution=merge-duplicates")
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("upsert {} returned {}", table, status));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn upsert(&self, table: &str, user_id: &str, record: Value) -> Result<()> {
        let url = format!("{}/rest/v1/{}", self.base, table);
        let body = json!({ "user_id": user_id, "record": record });
        with_backoff(&self.backoff, Domain::Sync, table, || {
            self.upsert_once(&url, table, &body)
        })
        .await
    }

    async fn fetch(&self, table: &str, user_id: &str) -> Result<Option<Value>> {
        let url = format!("{}/rest/v1/{}?user_id=eq.{}&limit=1", self.base, table, user_id);
        let resp = self.request(self.client.get(&url)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("fetch {} returned {}", table, status));
        }
        let rows: Vec<Value> = resp.json().await?;
        Ok(rows.into_iter().next().and_then(|row| row.get("record").cloned()))
    }
}

pub fn seed_key(user_id: &str) -> String {
    format!("soulseed:{}", user_id)
}

pub fn profile_key(user_id: &str) -> String {
    format!("profile:{}", user_id)
}

#[derive(Clone)]
pub struct SyncAdapter {
    backend: Arc<dyn RemoteBackend>,
}

impl SyncAdapter {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self { backend }
    }

    /// Local write first (synchronous, authoritative), remote mirror
    /// fired without awaiting. The caller never waits on remote success.
    /// Outside a tokio runtime the mirror is skipped with a warning
    /// instead of panicking; the local write still happens.
    pub fn write_through_seed(
        &self,
        store: &dyn KvStore,
        user_id: &str,
        seed: &SoulSeed,
    ) -> Result<()> {
        write_json(store, &seed_key(user_id), seed)?;
        let Some(handle) = self.runtime_handle(user_id) else {
            return Ok(());
        };
        let adapter = self.clone();
        let user_id = user_id.to_string();
        let seed = seed.clone();
        handle.spawn(async move {
            adapter.sync_seed(&user_id, &seed).await;
        });
        Ok(())
    }

    pub fn write_through_profile(
        &self,
        store: &dyn KvStore,
        user_id: &str,
        profile: &UserProfile,
    ) -> Result<()> {
        write_json(store, &profile_key(user_id), profile)?;
        let Some(handle) = self.runtime_handle(user_id) else {
            return Ok(());
        };
        let adapter = self.clone();
        let user_id = user_id.to_string();
        let profile = profile.clone();
        handle.spawn(async move {
            adapter.sync_profile(&user_id, &profile).await;
        });
        Ok(())
    }

    fn runtime_handle(&self, user_id: &str) -> Option<tokio::runtime::Handle> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle),
            Err(_) => {
                log(
                    Level::Warn,
                    Domain::Sync,
                    "mirror_skipped",
                    obj(&[
                        ("user_id", v_str(user_id)),
                        ("reason", v_str("no async runtime")),
                    ]),
                );
                None
            }
        }
    }

    /// Mirror the seed remotely. Failures are logged and swallowed.
    pub async fn sync_seed(&self, user_id: &str, seed: &SoulSeed) {
        self.upsert_quiet("soul_seeds", user_id, json!(seed)).await;
        self.upsert_quiet("earned_traits", user_id, json!(seed.earned_traits)).await;
        self.upsert_quiet("artifacts", user_id, json!(seed.artifacts)).await;
    }

    pub async fn sync_profile(&self, user_id: &str, profile: &UserProfile) {
        self.upsert_quiet("profiles", user_id, json!(profile)).await;
        self.upsert_quiet("session_history", user_id, json!(profile.session_history)).await;
    }

    async fn upsert_quiet(&self, table: &str, user_id: &str, record: Value) {
        if let Err(e) = self.backend.upsert(table, user_id, record).await {
            log(
                Level::Warn,
                Domain::Sync,
                "upsert_failed",
                obj(&[
                    ("table", v_str(table)),
                    ("user_id", v_str(user_id)),
                    ("error", v_str(&e.to_string())),
                ]),
            );
        }
    }

    /// Load a seed: remote wins when present and fed more recently than
    /// the local copy, otherwise local. Remote errors fall back to local.
    pub async fn load_seed(&self, store: &dyn KvStore, user_id: &str) -> Option<SoulSeed> {
        let local: Option<SoulSeed> = read_json(store, &seed_key(user_id), None);
        let remote: Option<SoulSeed> = match self.backend.fetch("soul_seeds", user_id).await {
            Ok(Some(value)) => serde_json::from_value(value).ok(),
            Ok(None) => None,
            Err(e) => {
                log(
                    Level::Warn,
                    Domain::Sync,
                    "fetch_failed",
                    obj(&[("user_id", v_str(user_id)), ("error", v_str(&e.to_string()))]),
                );
                None
            }
        };
        match (local, remote) {
            (Some(l), Some(r)) => {
                if r.last_fed_at > l.last_fed_at {
                    Some(r)
                } else {
                    Some(l)
                }
            }
            (l, r) => r.or(l),
        }
    }

    /// Load a profile with the same policy as seeds: remote wins only
    /// when it is strictly fresher, judged by its latest session date
    /// and session count. A remote copy that missed an upsert never
    /// shadows locally-recorded sessions.
    pub async fn load_profile(&self, store: &dyn KvStore, user_id: &str) -> Option<UserProfile> {
        let local: Option<UserProfile> = read_json(store, &profile_key(user_id), None);
        let remote: Option<UserProfile> = match self.backend.fetch("profiles", user_id).await {
            Ok(Some(value)) => serde_json::from_value(value).ok(),
            Ok(None) => None,
            Err(e) => {
                log(
                    Level::Warn,
                    Domain::Sync,
                    "fetch_failed",
                    obj(&[("user_id", v_str(user_id)), ("error", v_str(&e.to_string()))]),
                );
                None
            }
        };
        match (local, remote) {
            (Some(l), Some(r)) => {
                if profile_freshness(&r) > profile_freshness(&l) {
                    Some(r)
                } else {
                    Some(l)
                }
            }
            (l, r) => r.or(l),
        }
    }
}

fn profile_freshness(profile: &UserProfile) -> (Option<DateTime<Utc>>, usize) {
    (
        profile.session_history.iter().map(|s| s.date).max(),
        profile.session_history.len(),
    )
}
