//! Time-bounded memoization of verification decisions.
//!
//! Directory and group lookups are slow and often rate limited upstream, so
//! every backend is wrapped in a [`CachedVerifier`]. Both allow and deny
//! decisions are remembered for the configured TTL; errors never are.
//!
//! # Staleness
//!
//! A credential revoked at the backend keeps working for up to one TTL after
//! its last successful check, and a newly granted one stays denied for up to
//! one TTL after a failed attempt. Pick the TTL with that window in mind.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::{Credential, RequiredGroups, Verification, Verifier, VerifyError};

/// Default upper bound on cached decisions.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// SHA-256 over the credential and the required groups.
type Fingerprint = [u8; 32];

/// A [`Verifier`] that remembers the decisions of another one.
///
/// Entries are keyed by a fingerprint of `(username, password, required
/// groups)`, so the raw password is never kept. Concurrent callers with the
/// same credential may both reach the inner verifier; backend checks are
/// idempotent reads, so no call deduplication is done. A TTL of zero turns
/// the cache into a pass-through.
///
/// When full, the least recently used decision makes room: a burst of
/// unknown credentials cannot keep new logins out of the cache.
pub struct CachedVerifier {
    inner: Arc<dyn Verifier>,
    ttl: Duration,
    entries: Option<Cache<Fingerprint, Verification>>,
}

impl CachedVerifier {
    /// Wraps `inner` with the given TTL and [`DEFAULT_MAX_ENTRIES`].
    pub fn new(inner: Arc<dyn Verifier>, ttl: Duration) -> Self {
        Self::with_max_entries(inner, ttl, DEFAULT_MAX_ENTRIES)
    }

    /// Wraps `inner` with an explicit bound on cached decisions.
    pub fn with_max_entries(inner: Arc<dyn Verifier>, ttl: Duration, max_entries: usize) -> Self {
        let entries = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(max_entries as u64)
                .time_to_live(ttl)
                .eviction_policy(EvictionPolicy::lru())
                .build()
        });

        Self {
            inner,
            ttl,
            entries,
        }
    }

    /// Number of live entries, after pending evictions have run.
    pub async fn len(&self) -> u64 {
        match &self.entries {
            Some(entries) => {
                entries.run_pending_tasks().await;
                entries.entry_count()
            },
            None => 0,
        }
    }

    /// Returns true if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Verifier for CachedVerifier {
    async fn verify(&self, credential: &Credential<'_>) -> Result<Verification, VerifyError> {
        let Some(entries) = &self.entries else {
            return self.inner.verify(credential).await;
        };

        let key = fingerprint(credential, self.inner.required_groups());

        if let Some(hit) = entries.get(&key).await {
            trace!(username = %credential.username, authorized = hit.authorized, "verification cache hit");
            return Ok(hit);
        }

        let verification = self.inner.verify(credential).await?;
        entries.insert(key, verification.clone()).await;
        trace!(username = %credential.username, ttl_secs = self.ttl.as_secs(), "verification cached");

        Ok(verification)
    }

    fn required_groups(&self) -> &RequiredGroups {
        self.inner.required_groups()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Each field is length-prefixed so that distinct tuples never hash the
/// same input by concatenation.
fn fingerprint(credential: &Credential<'_>, groups: &RequiredGroups) -> Fingerprint {
    let mut hasher = Sha256::new();
    for field in [credential.username, credential.password] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hasher.update((groups.len() as u64).to_le_bytes());
    for group in groups.iter() {
        hasher.update((group.len() as u64).to_le_bytes());
        hasher.update(group.as_bytes());
    }
    hasher.finalize().into()
}
