//! Chain credential source: try sources in priority order.

use super::{AwsCredentials, CredentialProvider};
use crate::credentials::error::CredentialError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Composes credential sources with first-success-wins fallback.
///
/// Sources are tried in the order they were added. A
/// [`CredentialError::NotApplicable`] decline is silent; any other source
/// failure is logged at debug level and the traversal continues. When
/// every source has declined or failed the chain returns
/// [`CredentialError::NoCredentialsAvailable`], which callers should
/// treat as retryable.
///
/// The chain owns its sources and holds no cache of its own; each
/// network-backed source carries its own
/// [`super::CachedCredentialProvider`] wrapper, so a chain hit on a warm
/// source costs no I/O.
#[derive(Clone)]
pub struct ChainCredentialProvider {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl ChainCredentialProvider {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Append a source to the chain.
    pub fn with_provider<P>(mut self, provider: P) -> Self
    where
        P: CredentialProvider + 'static,
    {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Append an already-shared source to the chain.
    pub fn with_arc_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Number of sources in the chain.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

impl Default for ChainCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for ChainCredentialProvider {
    async fn get_credentials(&self) -> Result<AwsCredentials, CredentialError> {
        for provider in &self.providers {
            let name = provider.name();
            trace!(provider = name, "trying credential source");

            match provider.get_credentials().await {
                Ok(credentials) => {
                    debug!(provider = name, "credentials resolved");
                    return Ok(credentials);
                }
                Err(CredentialError::NotApplicable { .. }) => {
                    trace!(provider = name, "source not applicable");
                }
                Err(e) => {
                    debug!(provider = name, error = %e, "credential source failed");
                }
            }
        }

        Err(CredentialError::NoCredentialsAvailable)
    }

    async fn refresh(&self) -> Result<(), CredentialError> {
        for provider in &self.providers {
            let name = provider.name();
            match provider.refresh().await {
                Ok(()) => {
                    debug!(provider = name, "credential source refreshed");
                    return Ok(());
                }
                Err(CredentialError::NotApplicable { .. }) => {
                    trace!(provider = name, "source not applicable");
                }
                Err(e) => {
                    debug!(provider = name, error = %e, "credential source refresh failed");
                }
            }
        }

        Err(CredentialError::NoCredentialsAvailable)
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}

impl fmt::Debug for ChainCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainCredentialProvider")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
