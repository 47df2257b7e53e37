//! Expiration-aware caching with single-flight refresh.

use super::{AwsCredentials, CredentialProvider};
use crate::credentials::error::CredentialError;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::{Mutex, RwLock};
use tracing::trace;

/// Default refresh window in seconds: records (and IMDS tokens) are
/// refreshed this far ahead of their expiration.
pub const DEFAULT_REFRESH_WINDOW_SECS: i64 = 300;

/// Caches credentials from an underlying source and refreshes them ahead
/// of expiry.
///
/// At most one refresh is in flight at any instant: the fetch happens
/// under a mutex, and callers that arrive mid-fetch wait on that mutex,
/// re-check the cache, and leave with the record the fetch installed,
/// without issuing a second fetch. A failed fetch (including timeout or
/// cancellation of the HTTP round-trip) leaves the cached record
/// unchanged.
///
/// Records without an expiration (environment, profile) never go stale;
/// wrapping such a source is harmless but pointless.
pub struct CachedCredentialProvider<P>
where
    P: CredentialProvider,
{
    inner: P,
    cache: RwLock<Option<AwsCredentials>>,
    refresh_lock: Mutex<()>,
    refresh_window: chrono::Duration,
}

impl<P> CachedCredentialProvider<P>
where
    P: CredentialProvider,
{
    /// Wrap a source with the default refresh window.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresh_window: chrono::Duration::seconds(DEFAULT_REFRESH_WINDOW_SECS),
        }
    }

    /// Wrap a source with a custom refresh window.
    pub fn with_refresh_window(mut self, window: chrono::Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// The wrapped source.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    async fn cached_if_fresh(&self) -> Option<AwsCredentials> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|creds| !creds.expires_within(self.refresh_window))
            .cloned()
    }

    async fn fetch_and_install(&self) -> Result<AwsCredentials, CredentialError> {
        let credentials = self.inner.get_credentials().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(credentials.clone());
        Ok(credentials)
    }
}

#[async_trait]
impl<P> CredentialProvider for CachedCredentialProvider<P>
where
    P: CredentialProvider,
{
    async fn get_credentials(&self) -> Result<AwsCredentials, CredentialError> {
        if let Some(credentials) = self.cached_if_fresh().await {
            trace!(provider = self.inner.name(), "credential cache hit");
            return Ok(credentials);
        }

        // Serialize the refresh. Whoever wins the lock fetches; everyone
        // else finds the cache fresh on the double-check.
        let _guard = self.refresh_lock.lock().await;
        if let Some(credentials) = self.cached_if_fresh().await {
            return Ok(credentials);
        }

        trace!(provider = self.inner.name(), "credential cache refresh");
        self.fetch_and_install().await
    }

    async fn refresh(&self) -> Result<(), CredentialError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_install().await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

impl<P> fmt::Debug for CachedCredentialProvider<P>
where
    P: CredentialProvider + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCredentialProvider")
            .field("inner", &self.inner)
            .field("refresh_window", &self.refresh_window)
            .finish()
    }
}
