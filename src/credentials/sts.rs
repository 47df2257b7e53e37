//! STS assume-role credential source.

use super::{AwsCredentials, CredentialProvider};
use crate::credentials::error::CredentialError;
use crate::signing::SigV4Signer;
use crate::transport::{HttpRequest, HttpTransport};
use crate::xml;
use async_trait::async_trait;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use url::Url;

/// STS API version sent with every request.
pub(crate) const STS_VERSION: &str = "2011-06-15";

/// Per-request deadline for STS round-trips.
pub(crate) const STS_DEADLINE: Duration = Duration::from_secs(30);

/// Form-value encoding set: everything but RFC 3986 unreserved.
const FORM_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encode `pairs` as an `application/x-www-form-urlencoded` body.
pub(crate) fn form_encode(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, FORM_ENCODE),
                utf8_percent_encode(value, FORM_ENCODE)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Generate a random alphanumeric session name.
pub(crate) fn random_session_name() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// Credential source that exchanges a base source's credentials for a
/// role's short-lived credentials via `AssumeRole`.
///
/// The provider owns its base exclusively; the base is logically consumed
/// by the exchange. Each `get_credentials` call delegates to the base,
/// signs the `AssumeRole` request with the base credentials, and returns
/// the role credentials from the response. Wrap in
/// [`super::CachedCredentialProvider`] so the exchange only happens when
/// the cached role credentials approach expiry.
pub struct StsAssumeRoleProvider {
    base: Box<dyn CredentialProvider>,
    transport: Arc<dyn HttpTransport>,
    signer: SigV4Signer,
    endpoint: String,
    role_arn: String,
    session_name: String,
    external_id: Option<String>,
    duration_seconds: Option<u32>,
}

impl StsAssumeRoleProvider {
    /// Create a provider assuming `role_arn` in `region`, with a
    /// generated session name.
    pub fn new(
        base: Box<dyn CredentialProvider>,
        transport: Arc<dyn HttpTransport>,
        role_arn: impl Into<String>,
        region: &str,
    ) -> Self {
        Self {
            base,
            transport,
            signer: SigV4Signer::new(region, "sts"),
            endpoint: format!("https://sts.{}.amazonaws.com", region),
            role_arn: role_arn.into(),
            session_name: random_session_name(),
            external_id: None,
            duration_seconds: None,
        }
    }

    /// Use a stable session name instead of the generated one.
    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = session_name.into();
        self
    }

    /// Send an `ExternalId` with the request.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Request a specific session duration in seconds.
    pub fn with_duration_seconds(mut self, duration_seconds: u32) -> Self {
        self.duration_seconds = Some(duration_seconds);
        self
    }

    /// Override the STS endpoint (for tests and private deployments).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl CredentialProvider for StsAssumeRoleProvider {
    async fn get_credentials(&self) -> Result<AwsCredentials, CredentialError> {
        let base_credentials = self.base.get_credentials().await?;

        let duration = self.duration_seconds.map(|d| d.to_string());
        let mut pairs: Vec<(&str, &str)> = vec![
            ("Action", "AssumeRole"),
            ("Version", STS_VERSION),
            ("RoleArn", &self.role_arn),
            ("RoleSessionName", &self.session_name),
        ];
        if let Some(external_id) = &self.external_id {
            pairs.push(("ExternalId", external_id));
        }
        if let Some(duration) = &duration {
            pairs.push(("DurationSeconds", duration));
        }
        let body = form_encode(&pairs);

        let url = Url::parse(&self.endpoint).map_err(|e| CredentialError::Configuration {
            message: format!("invalid STS endpoint '{}': {}", self.endpoint, e),
        })?;

        let mut headers = std::collections::HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        self.signer.sign(
            "POST",
            &url,
            &mut headers,
            body.as_bytes(),
            &base_credentials,
            Utc::now(),
        );

        trace!(role_arn = %self.role_arn, "assuming role via STS");
        let mut request = HttpRequest::new("POST", url.as_str())
            .with_body(body.into_bytes())
            .with_deadline(STS_DEADLINE);
        for (name, value) in headers {
            request = request.with_header(name, value);
        }

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
        "sts-assume-role"
    }
}

impl std::fmt::Debug for StsAssumeRoleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StsAssumeRoleProvider")
            .field("endpoint", &self.endpoint)
            .field("role_arn", &self.role_arn)
            .field("session_name", &self.session_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialProvider;
    use crate::mocks::{MockResponse, MockTransport};

    const ASSUME_ROLE_RESPONSE: &str = r#"<AssumeRoleResponse>
  <AssumeRoleResult>
    <Credentials>
      <AccessKeyId>ASIAEXAMPLEY</AccessKeyId>
      <SecretAccessKey>assumedsecret</SecretAccessKey>
      <SessionToken>assumedtoken</SessionToken>
      <Expiration>2030-01-01T00:00:00Z</Expiration>
    </Credentials>
  </AssumeRoleResult>
</AssumeRoleResponse>"#;

    fn base_provider() -> Box<dyn CredentialProvider> {
        Box::new(StaticCredentialProvider::new(AwsCredentials::new(
            "AKIABASE", "basesecret",
        )))
    }

    fn provider(transport: Arc<MockTransport>) -> StsAssumeRoleProvider {
        StsAssumeRoleProvider::new(
            base_provider(),
            transport,
            "arn:aws:iam::123456789012:role/demo",
            "us-east-1",
        )
        .with_session_name("agent-session")
    }

    #[test]
    fn test_form_encode_reserved_characters() {
        let encoded = form_encode(&[("RoleArn", "arn:aws:iam::1:role/demo"), ("A", "b c")]);
        assert_eq!(encoded, "RoleArn=arn%3Aaws%3Aiam%3A%3A1%3Arole%2Fdemo&A=b%20c");
    }

    #[test]
    fn test_random_session_name_shape() {
        let name = random_session_name();
        assert!(name.len() >= 8);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(name, random_session_name());
    }

    #[tokio::test]
    async fn test_assume_role_returns_sts_credentials() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::ok_with_body(ASSUME_ROLE_RESPONSE),
        ]));
        let provider = provider(Arc::clone(&transport));

        let creds = provider.get_credentials().await.unwrap();
        // The role credentials, not the base credentials.
        assert_eq!(creds.access_key_id(), "ASIAEXAMPLEY");
        assert_eq!(creds.secret_access_key(), "assumedsecret");
        assert_eq!(creds.session_token(), Some("assumedtoken"));
    }

    #[tokio::test]
    async fn test_assume_role_request_is_signed_form_post() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::ok_with_body(ASSUME_ROLE_RESPONSE),
        ]));
        let provider = provider(Arc::clone(&transport));
        provider.get_credentials().await.unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://sts.us-east-1.amazonaws.com/");

        let body = String::from_utf8(request.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("Action=AssumeRole"));
        assert!(body.contains("Version=2011-06-15"));
        assert!(body.contains("RoleSessionName=agent-session"));
        assert!(body.contains("RoleArn=arn%3Aaws%3Aiam%3A%3A123456789012%3Arole%2Fdemo"));

        let authorization = request.headers.get("authorization").unwrap();
        assert!(authorization.contains("Credential=AKIABASE/"));
        assert!(authorization.contains("/us-east-1/sts/aws4_request"));
        assert_eq!(request.deadline, Some(STS_DEADLINE));
    }

    #[tokio::test]
    async fn test_external_id_and_duration_forwarded() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::ok_with_body(ASSUME_ROLE_RESPONSE),
        ]));
        let provider = provider(Arc::clone(&transport))
            .with_external_id("ext-42")
            .with_duration_seconds(900);
        provider.get_credentials().await.unwrap();

        let body =
            String::from_utf8(transport.last_request().unwrap().body.unwrap().to_vec()).unwrap();
        assert!(body.contains("ExternalId=ext-42"));
        assert!(body.contains("DurationSeconds=900"));
    }

    #[tokio::test]
    async fn test_rejection_carries_sts_error_code() {
        let error_body = r#"<ErrorResponse><Error><Code>AccessDenied</Code><Message>no</Message></Error></ErrorResponse>"#;
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::error(
            403, error_body,
        )]));
        let provider = provider(transport);

        let err = provider.get_credentials().await.unwrap_err();
        match err {
            CredentialError::StsRejected { code, .. } => assert_eq!(code, "AccessDenied"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_base_failure_propagates() {
        let failing = Box::new(crate::credentials::EnvironmentCredentialProvider::new(
            Arc::new(crate::credentials::StaticEnv::new()),
        ));
        let transport = Arc::new(MockTransport::new());
        let provider = StsAssumeRoleProvider::new(
            failing,
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            "arn:aws:iam::1:role/demo",
            "us-east-1",
        );

        let err = provider.get_credentials().await.unwrap_err();
        assert!(matches!(err, CredentialError::NotApplicable { .. }));
        assert_eq!(transport.request_count(), 0);
    }
}
