//! Handle-keyed public key registry adapter.
//!
//! The registry is an external key-value store: one current record per
//! handle, last write wins. This module pins its contract to a single
//! discriminated result shape at the adapter boundary — `Ok(Some(key))`,
//! `Ok(None)` for an unpublished handle, `Err` for remote failures — so the
//! rest of the crate never branches on response shapes.
//!
//! Lookups carry no side effects and are safe to call speculatively.
//! Publishing the same key twice is a no-op success; a different key
//! overwrites. The core never caches lookups: a fresh lookup precedes every
//! encryption so a rotated key is picked up at the cost of one round trip.
//! `Ok(None)` observed shortly after a publish is retryable, not
//! authoritative — the store is eventually consistent.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SealpostError};
use crate::keys::PortablePublicKey;

/// A published key record as stored by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    /// Owning handle (lowercased).
    pub handle: String,
    /// The published public key.
    pub public_key: PortablePublicKey,
    /// When the record was last written.
    pub published_at: DateTime<Utc>,
}

/// Adapter contract for the external key registry.
#[async_trait]
pub trait KeyRegistry: Send + Sync {
    /// Fetch the current key for `handle`, or `None` if none is published.
    async fn lookup(&self, handle: &str) -> Result<Option<PortablePublicKey>>;

    /// Publish (or overwrite) the key for `handle`. Idempotent.
    async fn publish(&self, handle: &str, key: &PortablePublicKey) -> Result<()>;
}

/// Registry keys are handles, lowercased because the posting substrate
/// treats handles as case-insensitive.
fn registry_key(handle: &str) -> String {
    handle.to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// HTTP client for a JSON key registry (`GET`/`PUT /keys/{handle}`).
#[derive(Debug, Clone)]
pub struct HttpKeyRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl HttpKeyRegistry {
    /// Create a client for the registry at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn key_url(&self, handle: &str) -> String {
        format!("{}/keys/{}", self.base_url, registry_key(handle))
    }
}

#[async_trait]
impl KeyRegistry for HttpKeyRegistry {
    async fn lookup(&self, handle: &str) -> Result<Option<PortablePublicKey>> {
        let url = self.key_url(handle);
        debug!(handle = %handle, "registry lookup");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SealpostError::Registry(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            warn!(handle = %handle, status = %response.status(), "registry lookup failed");
            return Err(SealpostError::Registry(format!(
                "lookup returned {}",
                response.status()
            )));
        }

        let record: PublicKeyRecord = response
            .json()
            .await
            .map_err(|e| SealpostError::Registry(e.to_string()))?;
        Ok(Some(record.public_key))
    }

    async fn publish(&self, handle: &str, key: &PortablePublicKey) -> Result<()> {
        let record = PublicKeyRecord {
            handle: registry_key(handle),
            public_key: key.clone(),
            published_at: Utc::now(),
        };

        let response = self
            .client
            .put(self.key_url(handle))
            .json(&record)
            .send()
            .await
            .map_err(|e| SealpostError::Registry(e.to_string()))?;

        if !response.status().is_success() {
            warn!(handle = %handle, status = %response.status(), "registry publish failed");
            return Err(SealpostError::Registry(format!(
                "publish returned {}",
                response.status()
            )));
        }
        debug!(handle = %handle, "published key");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory mock
// ---------------------------------------------------------------------------

/// Operations recorded by [`MockKeyRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Lookup(String),
    Publish(String),
}

#[derive(Default)]
struct MockState {
    keys: HashMap<String, PortablePublicKey>,
    calls: Vec<RegistryCall>,
}

/// In-memory registry for tests: deterministic, with a call log so tests can
/// assert how many remote calls an operation made.
#[derive(Default)]
pub struct MockKeyRegistry {
    state: Mutex<MockState>,
    failing: bool,
}

impl MockKeyRegistry {
    /// Create an empty mock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a published key.
    pub fn with_key(self, handle: &str, key: PortablePublicKey) -> Self {
        self.state
            .lock()
            .unwrap()
            .keys
            .insert(registry_key(handle), key);
        self
    }

    /// Make every call fail with a transient registry error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of lookups performed so far.
    pub fn lookup_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| matches!(c, RegistryCall::Lookup(_)))
            .count()
    }

    /// Number of publishes performed so far.
    pub fn publish_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| matches!(c, RegistryCall::Publish(_)))
            .count()
    }

    /// Full call log, in order.
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl KeyRegistry for MockKeyRegistry {
    async fn lookup(&self, handle: &str) -> Result<Option<PortablePublicKey>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RegistryCall::Lookup(registry_key(handle)));
        if self.failing {
            return Err(SealpostError::Registry("mock registry down".into()));
        }
        Ok(state.keys.get(&registry_key(handle)).cloned())
    }

    async fn publish(&self, handle: &str, key: &PortablePublicKey) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RegistryCall::Publish(registry_key(handle)));
        if self.failing {
            return Err(SealpostError::Registry("mock registry down".into()));
        }
        state.keys.insert(registry_key(handle), key.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    fn portable() -> PortablePublicKey {
        PortablePublicKey::from_public(&Keypair::generate().public)
    }

    #[tokio::test]
    async fn test_lookup_unpublished_is_none() {
        let registry = MockKeyRegistry::new();
        assert!(registry.lookup("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_publish_then_lookup() {
        let registry = MockKeyRegistry::new();
        let key = portable();

        registry.publish("alice", &key).await.unwrap();
        let found = registry.lookup("alice").await.unwrap().unwrap();
        assert_eq!(found, key);
    }

    #[tokio::test]
    async fn test_publish_is_idempotent() {
        let registry = MockKeyRegistry::new();
        let key = portable();

        registry.publish("alice", &key).await.unwrap();
        registry.publish("alice", &key).await.unwrap();
        assert_eq!(registry.lookup("alice").await.unwrap().unwrap(), key);
    }

    #[tokio::test]
    async fn test_republish_overwrites() {
        let registry = MockKeyRegistry::new();
        let old = portable();
        let new = portable();

        registry.publish("alice", &old).await.unwrap();
        registry.publish("alice", &new).await.unwrap();
        assert_eq!(registry.lookup("alice").await.unwrap().unwrap(), new);
    }

    #[tokio::test]
    async fn test_handles_case_insensitive() {
        let key = portable();
        let registry = MockKeyRegistry::new().with_key("Alice.Bsky.Social", key.clone());
        let found = registry.lookup("alice.bsky.social").await.unwrap();
        assert_eq!(found, Some(key));
    }

    #[tokio::test]
    async fn test_failing_registry_surfaces_registry_error() {
        let registry = MockKeyRegistry::new().failing();
        let result = registry.lookup("alice").await;
        assert!(matches!(result, Err(SealpostError::Registry(_))));
    }

    #[tokio::test]
    async fn test_call_log_counts() {
        let registry = MockKeyRegistry::new();
        let key = portable();

        registry.publish("alice", &key).await.unwrap();
        registry.lookup("alice").await.unwrap();
        registry.lookup("bob").await.unwrap();

        assert_eq!(registry.publish_count(), 1);
        assert_eq!(registry.lookup_count(), 2);
        assert_eq!(
            registry.calls()[0],
            RegistryCall::Publish("alice".to_string())
        );
    }

    #[test]
    fn test_http_registry_url_shape() {
        let registry = HttpKeyRegistry::new("https://keys.example.org/");
        assert_eq!(
            registry.key_url("Alice.Bsky.Social"),
            "https://keys.example.org/keys/alice.bsky.social"
        );
    }

    #[test]
    fn test_record_json_roundtrip() {
        let record = PublicKeyRecord {
            handle: "alice".to_string(),
            public_key: portable(),
            published_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let parsed: PublicKeyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.handle, record.handle);
        assert_eq!(parsed.public_key, record.public_key);
    }
}
