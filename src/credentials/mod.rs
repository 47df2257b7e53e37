//! AWS credential resolution.
//!
//! This module provides the credential provider system used to obtain
//! short-lived signing credentials, following a ports-and-adapters layout:
//!
//! - **Port**: the [`CredentialProvider`] trait.
//! - **Adapters**: the concrete sources:
//!   [`EnvironmentCredentialProvider`] (process environment),
//!   [`ProfileCredentialProvider`] (shared credentials file),
//!   [`WebIdentityCredentialProvider`] (OIDC token exchanged at STS),
//!   [`ImdsCredentialProvider`] (EC2 instance metadata),
//!   [`HttpEndpointCredentialProvider`] (container credential endpoint),
//!   [`StsAssumeRoleProvider`] (role assumption over a base source),
//!   [`StaticCredentialProvider`] (fixed credentials),
//!   plus the composing [`ChainCredentialProvider`] and the
//!   [`CachedCredentialProvider`] refresh wrapper.
//!
//! # Resolution order
//!
//! [`default_chain`] assembles the standard source order:
//! environment, shared profile, web identity, IMDS, and (when configured)
//! the container HTTP endpoint. The first source that yields a usable
//! record wins; sources that are simply not configured decline silently.
//!
//! # Example
//!
//! ```no_run
//! use aws_credentials::credentials::{default_chain, CredentialProvider, ProcessEnv};
//! use aws_credentials::transport::ReqwestTransport;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), aws_credentials::CredentialError> {
//! let transport = Arc::new(ReqwestTransport::new().expect("transport"));
//! let chain = default_chain(Arc::new(ProcessEnv), transport, Some("us-east-1"));
//!
//! let credentials = chain.get_credentials().await?;
//! println!("signing as {}", credentials.access_key_id());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroize;

pub mod cache;
pub mod chain;
pub mod env;
pub mod envelope;
pub mod error;
pub mod http_endpoint;
pub mod imds;
pub mod profile;
pub mod static_creds;
pub mod sts;
pub mod web_identity;

pub use cache::CachedCredentialProvider;
pub use chain::ChainCredentialProvider;
pub use env::{EnvReader, EnvironmentCredentialProvider, ProcessEnv, StaticEnv};
pub use envelope::CredentialEnvelope;
pub use error::CredentialError;
pub use http_endpoint::HttpEndpointCredentialProvider;
pub use imds::ImdsCredentialProvider;
pub use profile::ProfileCredentialProvider;
pub use static_creds::StaticCredentialProvider;
pub use sts::StsAssumeRoleProvider;
pub use web_identity::WebIdentityCredentialProvider;

use crate::transport::HttpTransport;

/// AWS credentials: access key id, secret access key, optional session
/// token, optional expiration.
///
/// Long-lived sources (environment, profile) produce records without an
/// expiration; temporary sources (IMDS, STS, container endpoint, web
/// identity) always carry both a session token and an expiration.
///
/// # Security
///
/// The secret access key is held in a [`SecretString`]: it is zeroized on
/// drop and the `Debug` implementation redacts it along with the session
/// token. The key id and session token are zeroized on drop as well.
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

impl Drop for AwsCredentials {
    fn drop(&mut self) {
        // SecretString zeroizes itself on drop.
        self.access_key_id.zeroize();
        if let Some(token) = self.session_token.as_mut() {
            token.zeroize();
        }
    }
}

impl AwsCredentials {
    /// Create long-lived credentials with no session token and no
    /// expiration.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key.into()),
            session_token: None,
            expiration: None,
        }
    }

    /// Create temporary credentials with a session token and expiration.
    pub fn temporary(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key.into()),
            session_token: Some(session_token.into()),
            expiration: Some(expiration),
        }
    }

    /// Add a session token.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Add an expiration instant.
    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// The access key id.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret access key.
    ///
    /// This exposes the secret; do not log or persist the value.
    pub fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }

    /// The session token, if this is a temporary credential.
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// The expiration instant; `None` means the record never expires.
    pub fn expiration(&self) -> Option<&DateTime<Utc>> {
        self.expiration.as_ref()
    }

    /// Whether the expiration instant has passed.
    pub fn is_expired(&self) -> bool {
        match self.expiration {
            Some(expiration) => Utc::now() >= expiration,
            None => false,
        }
    }

    /// Whether the record expires within the given window. Records
    /// without an expiration never do.
    ///
    /// This is the staleness test used by the refresh machinery: a record
    /// with `now + window >= expiration` must not be handed to a signer.
    pub fn expires_within(&self, window: chrono::Duration) -> bool {
        match self.expiration {
            Some(expiration) => Utc::now() + window >= expiration,
            None => false,
        }
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Trait for credential sources.
///
/// Implementations retrieve credentials from one concrete source:
/// environment variables, the shared profile file, a metadata service, or
/// a token exchange. Network-backed implementations are expected to be
/// wrapped in [`CachedCredentialProvider`], which adds expiration-aware
/// caching and single-flight refresh.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Retrieve credentials from this source.
    ///
    /// # Errors
    ///
    /// [`CredentialError::NotApplicable`] when the source is not
    /// configured on this host; any other [`CredentialError`] when the
    /// source is configured but failed.
    async fn get_credentials(&self) -> Result<AwsCredentials, CredentialError>;

    /// Re-read or re-fetch the source's backing material.
    ///
    /// A successful refresh does not imply the credentials are usable;
    /// callers follow up with [`CredentialProvider::get_credentials`].
    async fn refresh(&self) -> Result<(), CredentialError> {
        self.get_credentials().await.map(|_| ())
    }

    /// Short source name used in log attribution.
    fn name(&self) -> &'static str;
}

/// Assemble the standard credential chain.
///
/// Source order: environment, shared profile, web identity, IMDS, and the
/// container HTTP endpoint (the last only when its environment variables
/// are present). Network-backed sources are wrapped in
/// [`CachedCredentialProvider`] so each holds one cached record with
/// single-flight refresh.
///
/// `region` selects the regional STS endpoint for the web identity
/// exchange; when absent the global endpoint is used.
pub fn default_chain(
    env: Arc<dyn EnvReader>,
    transport: Arc<dyn HttpTransport>,
    region: Option<&str>,
) -> ChainCredentialProvider {
    let mut web_identity =
        WebIdentityCredentialProvider::new(Arc::clone(&env), Arc::clone(&transport));
    if let Some(region) = region {
        web_identity = web_identity.with_region(region);
    }

    let mut chain = ChainCredentialProvider::new()
        .with_provider(EnvironmentCredentialProvider::new(Arc::clone(&env)))
        .with_provider(ProfileCredentialProvider::new(Arc::clone(&env)))
        .with_provider(CachedCredentialProvider::new(web_identity))
        .with_provider(CachedCredentialProvider::new(ImdsCredentialProvider::new(
            Arc::clone(&transport),
        )));

    if let Some(endpoint) = HttpEndpointCredentialProvider::from_env(env.as_ref(), transport) {
        chain = chain.with_provider(CachedCredentialProvider::new(endpoint));
    }

    chain
}
