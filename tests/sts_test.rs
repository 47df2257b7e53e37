//! Role assumption and web identity exchange.

use aws_credentials::credentials::{
    default_chain, CachedCredentialProvider, CredentialError, CredentialProvider,
    EnvironmentCredentialProvider, StaticEnv, StsAssumeRoleProvider,
};
use aws_credentials::mocks::{MockResponse, MockTransport};
use std::io::Write;
use std::sync::Arc;

const ASSUME_ROLE_RESPONSE: &str = r#"<AssumeRoleResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleResult>
    <Credentials>
      <AccessKeyId>ASIAEXAMPLEY</AccessKeyId>
      <SecretAccessKey>assumedsecret</SecretAccessKey>
      <SessionToken>assumedtoken</SessionToken>
      <Expiration>2030-01-01T00:00:00Z</Expiration>
    </Credentials>
  </AssumeRoleResult>
</AssumeRoleResponse>"#;

const WEB_IDENTITY_RESPONSE: &str = r#"<AssumeRoleWithWebIdentityResponse>
  <AssumeRoleWithWebIdentityResult>
    <Credentials>
      <AccessKeyId>ASIAWEB</AccessKeyId>
      <SecretAccessKey>websecret</SecretAccessKey>
      <SessionToken>webtoken</SessionToken>
      <Expiration>2030-01-01T00:00:00Z</Expiration>
    </Credentials>
  </AssumeRoleWithWebIdentityResult>
</AssumeRoleWithWebIdentityResponse>"#;

fn env_base() -> Box<dyn CredentialProvider> {
    let env = StaticEnv::new()
        .with_var("AWS_ACCESS_KEY_ID", "AKIABASE")
        .with_var("AWS_SECRET_ACCESS_KEY", "basesecret");
    Box::new(EnvironmentCredentialProvider::new(Arc::new(env)))
}

#[tokio::test]
async fn assume_role_returns_role_credentials_not_base_credentials() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::ok_with_body(ASSUME_ROLE_RESPONSE),
    ]));
    let provider = StsAssumeRoleProvider::new(
        env_base(),
        Arc::clone(&transport) as Arc<dyn aws_credentials::transport::HttpTransport>,
        "arn:aws:iam::123456789012:role/log-shipper",
        "us-east-1",
    );

    let creds = provider.get_credentials().await.unwrap();
    assert_eq!(creds.access_key_id(), "ASIAEXAMPLEY");
    assert_ne!(creds.access_key_id(), "AKIABASE");
    assert_eq!(creds.session_token(), Some("assumedtoken"));
    assert_eq!(creds.expiration().unwrap().timestamp(), 1893456000);

    // The exchange was signed with the base credentials.
    let request = transport.last_request().unwrap();
    let authorization = request.headers.get("authorization").unwrap();
    assert!(authorization.contains("Credential=AKIABASE/"));
}

#[tokio::test]
async fn cached_assume_role_exchanges_once_while_fresh() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::ok_with_body(ASSUME_ROLE_RESPONSE),
    ]));
    let provider = CachedCredentialProvider::new(StsAssumeRoleProvider::new(
        env_base(),
        Arc::clone(&transport) as Arc<dyn aws_credentials::transport::HttpTransport>,
        "arn:aws:iam::123456789012:role/log-shipper",
        "us-east-1",
    ));

    let first = provider.get_credentials().await.unwrap();
    let second = provider.get_credentials().await.unwrap();
    assert_eq!(first.access_key_id(), second.access_key_id());
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn sts_rejection_surfaces_verbatim_code() {
    let body = r#"<ErrorResponse><Error><Code>ExpiredToken</Code><Message>expired</Message></Error></ErrorResponse>"#;
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::error(
        403, body,
    )]));
    let provider = StsAssumeRoleProvider::new(
        env_base(),
        transport,
        "arn:aws:iam::123456789012:role/log-shipper",
        "us-east-1",
    );

    let err = provider.get_credentials().await.unwrap_err();
    match err {
        CredentialError::StsRejected { code, .. } => assert_eq!(code, "ExpiredToken"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn web_identity_resolves_through_default_chain() {
    let mut token_file = tempfile::NamedTempFile::new().unwrap();
    token_file.write_all(b"oidc-token").unwrap();
    token_file.flush().unwrap();

    let env = StaticEnv::new()
        .with_var("AWS_SHARED_CREDENTIALS_FILE", "/nonexistent/credentials")
        .with_var(
            "AWS_WEB_IDENTITY_TOKEN_FILE",
            token_file.path().to_str().unwrap(),
        )
        .with_var("AWS_ROLE_ARN", "arn:aws:iam::123456789012:role/web");
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::ok_with_body(WEB_IDENTITY_RESPONSE),
    ]));
    let chain = default_chain(Arc::new(env), Arc::clone(&transport) as Arc<dyn aws_credentials::transport::HttpTransport>, Some("eu-west-1"));

    let creds = chain.get_credentials().await.unwrap();
    assert_eq!(creds.access_key_id(), "ASIAWEB");

    let request = transport.last_request().unwrap();
    assert_eq!(request.url, "https://sts.eu-west-1.amazonaws.com");
    assert!(!request.headers.contains_key("authorization"));
    assert_eq!(transport.request_count(), 1);
}
