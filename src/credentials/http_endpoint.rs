//! Container credential endpoint source (ECS task roles and similar).

use super::{envelope, AwsCredentials, CredentialProvider, EnvReader};
use crate::credentials::error::CredentialError;
use crate::transport::{HttpRequest, HttpTransport};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Relative-URI environment variable (resolved against the task host).
pub const AWS_CONTAINER_CREDENTIALS_RELATIVE_URI: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";

/// Full-URI environment variable.
pub const AWS_CONTAINER_CREDENTIALS_FULL_URI: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";

/// Optional Authorization header value.
pub const AWS_CONTAINER_AUTHORIZATION_TOKEN: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN";

/// Host that relative URIs resolve against.
const ECS_CREDENTIALS_HOST: &str = "http://169.254.170.2";

/// Per-request deadline.
const ENDPOINT_DEADLINE: Duration = Duration::from_secs(5);

/// Credential source that GETs the container credential endpoint.
///
/// Only part of a deployment when `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`
/// or `AWS_CONTAINER_CREDENTIALS_FULL_URI` is set; [`Self::from_env`]
/// returns `None` otherwise and the chain omits the source entirely. The
/// endpoint answers with the same JSON envelope as IMDS.
pub struct HttpEndpointCredentialProvider {
    transport: Arc<dyn HttpTransport>,
    url: String,
    authorization: Option<String>,
}

impl HttpEndpointCredentialProvider {
    /// Create a provider for an explicit URL.
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            authorization: None,
        }
    }

    /// Send this value in an `Authorization` header.
    pub fn with_authorization(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(token.into());
        self
    }

    /// Build the provider from the container environment variables.
    ///
    /// Returns `None` when neither URI variable is set. The relative form
    /// wins when both are present, matching the container runtime's own
    /// precedence.
    pub fn from_env(env: &dyn EnvReader, transport: Arc<dyn HttpTransport>) -> Option<Self> {
        let url = match env
            .var(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI)
            .filter(|v| !v.is_empty())
        {
            Some(relative) => format!("{}{}", ECS_CREDENTIALS_HOST, relative),
            None => env
                .var(AWS_CONTAINER_CREDENTIALS_FULL_URI)
                .filter(|v| !v.is_empty())?,
        };

        let mut provider = Self::new(transport, url);
        if let Some(token) = env
            .var(AWS_CONTAINER_AUTHORIZATION_TOKEN)
            .filter(|v| !v.is_empty())
        {
            provider = provider.with_authorization(token);
        }

        Some(provider)
    }
}

#[async_trait]
impl CredentialProvider for HttpEndpointCredentialProvider {
    async fn get_credentials(&self) -> Result<AwsCredentials, CredentialError> {
        trace!(url = %self.url, "fetching container endpoint credentials");

        let mut request = HttpRequest::new("GET", &self.url).with_deadline(ENDPOINT_DEADLINE);
        if let Some(authorization) = &self.authorization {
            request = request.with_header("Authorization", authorization);
        }

        let response = self
            .transport
            .send(request)
            .await
            .map_err(CredentialError::endpoint_transport)?;

        if !response.is_success() {
            return Err(CredentialError::HttpEndpointUnavailable {
                message: format!("credential endpoint returned status {}", response.status),
            });
        }

        envelope::parse(&response.body)?.into_credentials()
    }

    fn name(&self) -> &'static str {
        "http-endpoint"
    }
}

impl std::fmt::Debug for HttpEndpointCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEndpointCredentialProvider")
            .field("url", &self.url)
            .field("authorization", &self.authorization.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
