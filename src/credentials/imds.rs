//! Instance Metadata Service (IMDS) credential source.
//!
//! Speaks IMDSv2 only: every request carries a session token obtained
//! from `PUT /latest/api/token`. The token has its own TTL and is renewed
//! ahead of expiry with the same skew policy as credentials, so a
//! credential fetch near token expiry transparently re-acquires the token
//! first.

use super::{envelope, AwsCredentials, CredentialProvider};
use crate::credentials::error::CredentialError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Link-local metadata endpoint.
const IMDS_ENDPOINT: &str = "http://169.254.169.254";

/// Session token path.
const TOKEN_PATH: &str = "/latest/api/token";

/// Role and credential path prefix.
const SECURITY_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

/// Requested token TTL header.
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";

/// Session token header.
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

/// Token TTL at issuance, in seconds.
const TOKEN_TTL_SECS: i64 = 21_600;

/// Per-request deadline for metadata requests.
const IMDS_DEADLINE: Duration = Duration::from_secs(5);

/// Default skew for renewing the session token ahead of its expiry.
const DEFAULT_REFRESH_WINDOW_SECS: i64 = 300;

/// Cached IMDSv2 session token.
struct ImdsToken {
    value: String,
    expiration: DateTime<Utc>,
}

impl ImdsToken {
    fn is_stale(&self, window: chrono::Duration) -> bool {
        Utc::now() + window >= self.expiration
    }
}

/// Credential source backed by the EC2 instance metadata service.
///
/// Fetch sequence: acquire (or reuse) the session token, discover the
/// attached role name, fetch the role's credential JSON. A 404 on role
/// discovery means no role is attached and the source declines silently;
/// a 401/403 on either GET means the server no longer honors the token,
/// which forces one token renewal and a single retry.
///
/// This provider does not cache credentials itself; wrap it in
/// [`super::CachedCredentialProvider`] (as [`super::default_chain`] does)
/// for expiration-aware caching and single-flight refresh.
pub struct ImdsCredentialProvider {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    refresh_window: chrono::Duration,
    token: RwLock<Option<ImdsToken>>,
}

impl ImdsCredentialProvider {
    /// Create a provider talking to the standard link-local endpoint.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            endpoint: IMDS_ENDPOINT.to_string(),
            refresh_window: chrono::Duration::seconds(DEFAULT_REFRESH_WINDOW_SECS),
            token: RwLock::new(None),
        }
    }

    /// Override the metadata endpoint (for tests and IMDS emulators).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the token renewal window.
    pub fn with_refresh_window(mut self, window: chrono::Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// Return a usable session token, renewing it when stale.
    async fn session_token(&self) -> Result<String, CredentialError> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref() {
                if !token.is_stale(self.refresh_window) {
                    return Ok(token.value.clone());
                }
            }
        }
        self.fetch_token().await
    }

    async fn fetch_token(&self) -> Result<String, CredentialError> {
        trace!("requesting IMDSv2 session token");
        let request = HttpRequest::new("PUT", format!("{}{}", self.endpoint, TOKEN_PATH))
            .with_header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS.to_string())
            .with_deadline(IMDS_DEADLINE);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(CredentialError::imds_transport)?;

        if !response.is_success() {
            return Err(CredentialError::ImdsUnavailable {
                message: format!("token request returned status {}", response.status),
            });
        }

        let value = response.body_text().trim().to_string();
        if value.is_empty() {
            return Err(CredentialError::ImdsUnavailable {
                message: "token request returned an empty body".to_string(),
            });
        }

        let expiration = Utc::now() + chrono::Duration::seconds(TOKEN_TTL_SECS);
        let mut token = self.token.write().await;
        *token = Some(ImdsToken {
            value: value.clone(),
            expiration,
        });

        Ok(value)
    }

    /// GET a metadata path with the token header, renewing the token and
    /// retrying once if the server rejects it.
    async fn get_with_token(&self, path: &str) -> Result<HttpResponse, CredentialError> {
        let token = self.session_token().await?;
        let response = self.send_get(path, &token).await?;

        if response.status == 401 || response.status == 403 {
            debug!(status = response.status, "IMDS rejected session token, renewing");
            {
                let mut token = self.token.write().await;
                *token = None;
            }
            let token = self.session_token().await?;
            return self.send_get(path, &token).await;
        }

        Ok(response)
    }

    async fn send_get(&self, path: &str, token: &str) -> Result<HttpResponse, CredentialError> {
        let request = HttpRequest::new("GET", format!("{}{}", self.endpoint, path))
            .with_header(TOKEN_HEADER, token)
            .with_deadline(IMDS_DEADLINE);

        self.transport
            .send(request)
            .await
            .map_err(CredentialError::imds_transport)
    }
}

#[async_trait]
impl CredentialProvider for ImdsCredentialProvider {
    async fn get_credentials(&self) -> Result<AwsCredentials, CredentialError> {
        // Role discovery. 404 means no role is attached, which is an
        // ordinary decline rather than an error.
        let response = self.get_with_token(SECURITY_CREDENTIALS_PATH).await?;
        if response.status == 404 {
            return Err(CredentialError::NotApplicable { provider: "imds" });
        }
        if !response.is_success() {
            return Err(CredentialError::ImdsUnavailable {
                message: format!("role discovery returned status {}", response.status),
            });
        }

        let body = response.body_text();
        let role = body
            .lines()
            .next()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| CredentialError::ImdsUnavailable {
                message: "role discovery returned an empty body".to_string(),
            })?;

        trace!(role, "fetching IMDS role credentials");
        let response = self
            .get_with_token(&format!("{}{}", SECURITY_CREDENTIALS_PATH, role))
            .await?;
        if !response.is_success() {
            return Err(CredentialError::ImdsUnavailable {
                message: format!("credential fetch returned status {}", response.status),
            });
        }

        envelope::parse(&response.body)
            .and_then(envelope::CredentialEnvelope::into_credentials)
            .map_err(|e| {
                debug!(error = %e, "IMDS credential body rejected");
                CredentialError::ImdsUnavailable {
                    message: e.to_string(),
                }
            })
    }

    fn name(&self) -> &'static str {
        "imds"
    }
}

impl std::fmt::Debug for ImdsCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImdsCredentialProvider")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
