use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::token::AccessClaims;
use crate::observability::metrics::{get_metrics, Metrics};

/// Snapshot of the last known good token and its decoded claims
#[derive(Debug, Clone, PartialEq)]
pub struct CachedToken {
    pub token: String,
    pub claims: AccessClaims,
}

#[derive(Debug, Default)]
struct CacheState {
    current: Option<CachedToken>,
    /// writes stamped with an older epoch are ignored
    floor: u64,
}

/// Process-wide token cache, one per resolver instance.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    inner: Arc<RwLock<CacheState>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> Option<CachedToken> {
        self.inner.read().await.current.clone()
    }

    /// Replace the snapshot unconditionally
    pub async fn write(&self, token: String, claims: AccessClaims) {
        let metrics = get_metrics().await;
        let mut state = self.inner.write().await;
        record_expiry(metrics, Some(&claims));
        state.current = Some(CachedToken { token, claims });
    }

    pub async fn clear(&self) {
        let metrics = get_metrics().await;
        let mut state = self.inner.write().await;
        record_expiry(metrics, None);
        state.current = None;
    }

    /// Replace the snapshot on behalf of refresh operation `epoch`.
    /// Returns false when a newer operation already owns the cache.
    pub async fn write_from(&self, epoch: u64, token: String, claims: AccessClaims) -> bool {
        let metrics = get_metrics().await;
        let mut state = self.inner.write().await;
        if epoch < state.floor {
            debug!(epoch, floor = state.floor, "ignoring stale cache write");
            return false;
        }
        state.floor = epoch;
        record_expiry(metrics, Some(&claims));
        state.current = Some(CachedToken { token, claims });
        true
    }

    pub async fn clear_from(&self, epoch: u64) -> bool {
        let metrics = get_metrics().await;
        let mut state = self.inner.write().await;
        if epoch < state.floor {
            debug!(epoch, floor = state.floor, "ignoring stale cache clear");
            return false;
        }
        state.floor = epoch;
        record_expiry(metrics, None);
        state.current = None;
        true
    }

    /// Reject every later write stamped below `epoch`
    pub async fn fence(&self, epoch: u64) {
        let mut state = self.inner.write().await;
        state.floor = state.floor.max(epoch);
    }
}

fn record_expiry(metrics: &Metrics, claims: Option<&AccessClaims>) {
    let exp = claims
        .and_then(|c| i64::try_from(c.exp).ok())
        .unwrap_or_default();
    metrics.cached_token_expiry_unix.set(exp);
}
