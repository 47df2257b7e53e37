//! Web identity (OIDC) credential source.

use super::sts::{form_encode, random_session_name, STS_DEADLINE, STS_VERSION};
use super::{AwsCredentials, CredentialProvider, EnvReader};
use crate::credentials::error::CredentialError;
use crate::transport::{HttpRequest, HttpTransport};
use crate::xml;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

/// Path of the file holding the OIDC token.
pub const AWS_WEB_IDENTITY_TOKEN_FILE: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";

/// Role to assume with the token.
pub const AWS_ROLE_ARN: &str = "AWS_ROLE_ARN";

/// Optional session name override.
pub const AWS_ROLE_SESSION_NAME: &str = "AWS_ROLE_SESSION_NAME";

/// Global STS endpoint, used when no region is configured.
const GLOBAL_STS_ENDPOINT: &str = "https://sts.amazonaws.com";

/// Credential source that exchanges an OIDC token for role credentials
/// via `AssumeRoleWithWebIdentity`.
///
/// Active only when `AWS_WEB_IDENTITY_TOKEN_FILE` and `AWS_ROLE_ARN` are
/// both set; otherwise the source declines silently. The exchange request
/// is unsigned (the web identity token itself authenticates), and the
/// token file is re-read on every fetch, so rotated tokens (projected
/// service account tokens and the like) are picked up without restart.
pub struct WebIdentityCredentialProvider {
    env: Arc<dyn EnvReader>,
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    session_name: Option<String>,
}

impl WebIdentityCredentialProvider {
    /// Create a provider over the given environment, using the global
    /// STS endpoint.
    pub fn new(env: Arc<dyn EnvReader>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            env,
            transport,
            endpoint: GLOBAL_STS_ENDPOINT.to_string(),
            session_name: None,
        }
    }

    /// Exchange at the regional STS endpoint.
    pub fn with_region(mut self, region: &str) -> Self {
        self.endpoint = format!("https://sts.{}.amazonaws.com", region);
        self
    }

    /// Override the STS endpoint (for tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Use a fixed session name instead of `AWS_ROLE_SESSION_NAME` or a
    /// generated one.
    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    fn env_non_empty(&self, key: &str) -> Option<String> {
        self.env.var(key).filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl CredentialProvider for WebIdentityCredentialProvider {
    async fn get_credentials(&self) -> Result<AwsCredentials, CredentialError> {
        let token_file =
            self.env_non_empty(AWS_WEB_IDENTITY_TOKEN_FILE)
                .ok_or(CredentialError::NotApplicable {
                    provider: "web-identity",
                })?;
        let role_arn = self
            .env_non_empty(AWS_ROLE_ARN)
            .ok_or(CredentialError::NotApplicable {
                provider: "web-identity",
            })?;

        let token = tokio::fs::read_to_string(&token_file)
            .await
            .map_err(|e| CredentialError::Configuration {
                message: format!("cannot read web identity token file '{}': {}", token_file, e),
            })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(CredentialError::Configuration {
                message: format!("web identity token file '{}' is empty", token_file),
            });
        }

        let session_name = self
            .session_name
            .clone()
            .or_else(|| self.env_non_empty(AWS_ROLE_SESSION_NAME))
            .unwrap_or_else(random_session_name);

        let body = form_encode(&[
            ("Action", "AssumeRoleWithWebIdentity"),
            ("Version", STS_VERSION),
            ("RoleArn", &role_arn),
            ("RoleSessionName", &session_name),
            ("WebIdentityToken", token),
        ]);

        trace!(role_arn = %role_arn, "exchanging web identity token at STS");
        let request = HttpRequest::new("POST", &self.endpoint)
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_body(body.into_bytes())
            .with_deadline(STS_DEADLINE);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(CredentialError::sts_transport)?;

        if !response.is_success() {
            let (code, message) = xml::parse_error(&response.body_text(), response.status);
            return Err(CredentialError::StsRejected { code, message });
        }

        xml::parse_credentials(&response.body_text())
    }

    fn name(&self) -> &'static str {
        "web-identity"
    }
}

impl std::fmt::Debug for WebIdentityCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebIdentityCredentialProvider")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticEnv;
    use crate::mocks::{MockResponse, MockTransport};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RESPONSE: &str = r#"<AssumeRoleWithWebIdentityResponse>
  <AssumeRoleWithWebIdentityResult>
    <Credentials>
      <AccessKeyId>ASIAWEB</AccessKeyId>
      <SecretAccessKey>websecret</SecretAccessKey>
      <SessionToken>webtoken</SessionToken>
      <Expiration>2030-01-01T00:00:00Z</Expiration>
    </Credentials>
  </AssumeRoleWithWebIdentityResult>
</AssumeRoleWithWebIdentityResponse>"#;

    fn token_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn env_for(file: &NamedTempFile) -> Arc<dyn EnvReader> {
        Arc::new(
            StaticEnv::new()
                .with_var(AWS_WEB_IDENTITY_TOKEN_FILE, file.path().to_str().unwrap())
                .with_var(AWS_ROLE_ARN, "arn:aws:iam::123456789012:role/web"),
        )
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let file = token_file("oidc-token\n");
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::ok_with_body(RESPONSE),
        ]));
        let provider = WebIdentityCredentialProvider::new(env_for(&file), Arc::clone(&transport) as Arc<dyn HttpTransport>)
            .with_session_name("web-session");

        let creds = provider.get_credentials().await.unwrap();
        assert_eq!(creds.access_key_id(), "ASIAWEB");
        assert_eq!(creds.session_token(), Some("webtoken"));

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://sts.amazonaws.com");
        // Unsigned: the token authenticates.
        assert!(!request.headers.contains_key("authorization"));

        let body = String::from_utf8(request.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("Action=AssumeRoleWithWebIdentity"));
        assert!(body.contains("WebIdentityToken=oidc-token"));
        assert!(body.contains("RoleSessionName=web-session"));
    }

    #[tokio::test]
    async fn test_regional_endpoint() {
        let file = token_file("tok");
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::ok_with_body(RESPONSE),
        ]));
        let provider = WebIdentityCredentialProvider::new(env_for(&file), Arc::clone(&transport) as Arc<dyn HttpTransport>)
            .with_region("eu-west-1");

        provider.get_credentials().await.unwrap();
        assert_eq!(
            transport.last_request().unwrap().url,
            "https://sts.eu-west-1.amazonaws.com"
        );
    }

    #[tokio::test]
    async fn test_missing_env_declines() {
        let provider = WebIdentityCredentialProvider::new(
            Arc::new(StaticEnv::new()),
            Arc::new(MockTransport::new()),
        );
        let err = provider.get_credentials().await.unwrap_err();
        assert!(matches!(err, CredentialError::NotApplicable { .. }));
    }

    #[tokio::test]
    async fn test_role_arn_alone_declines() {
        let env = StaticEnv::new().with_var(AWS_ROLE_ARN, "arn:aws:iam::1:role/web");
        let provider =
            WebIdentityCredentialProvider::new(Arc::new(env), Arc::new(MockTransport::new()));
        let err = provider.get_credentials().await.unwrap_err();
        assert!(matches!(err, CredentialError::NotApplicable { .. }));
    }

    #[tokio::test]
    async fn test_unreadable_token_file_is_configuration_error() {
        let env = StaticEnv::new()
            .with_var(AWS_WEB_IDENTITY_TOKEN_FILE, "/nonexistent/token")
            .with_var(AWS_ROLE_ARN, "arn:aws:iam::1:role/web");
        let provider =
            WebIdentityCredentialProvider::new(Arc::new(env), Arc::new(MockTransport::new()));
        let err = provider.get_credentials().await.unwrap_err();
        assert!(matches!(err, CredentialError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_sts_rejection_surfaces_code() {
        let file = token_file("tok");
        let body = r#"<ErrorResponse><Error><Code>InvalidIdentityToken</Code><Message>bad</Message></Error></ErrorResponse>"#;
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::error(
            400, body,
        )]));
        let provider = WebIdentityCredentialProvider::new(env_for(&file), transport);

        let err = provider.get_credentials().await.unwrap_err();
        match err {
            CredentialError::StsRejected { code, .. } => assert_eq!(code, "InvalidIdentityToken"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
