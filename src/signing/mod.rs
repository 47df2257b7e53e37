//! Internal AWS Signature V4 signer.
//!
//! Only the STS assume-role call needs a signed request, so this module
//! implements exactly that slice of SigV4: header-based signing of a
//! request with an in-memory body. Downstream signing clients bring their
//! own signer; nothing here is exported from the crate.

use crate::credentials::AwsCredentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Algorithm identifier.
const AWS_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// SHA-256 of `data`, hex-encoded.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// HMAC-SHA256 of `data` under `key`.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the SigV4 signing key.
///
/// kDate = HMAC("AWS4" + secret, date); kRegion = HMAC(kDate, region);
/// kService = HMAC(kRegion, service); kSigning = HMAC(kService, "aws4_request").
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_secret = format!("AWS4{}", secret_key);
    let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Timestamp in `YYYYMMDD'T'HHMMSS'Z'` form.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Date stamp in `YYYYMMDD` form.
fn format_date_stamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d").to_string()
}

/// Header-signing SigV4 signer bound to one region and service.
pub(crate) struct SigV4Signer {
    region: String,
    service: String,
}

impl SigV4Signer {
    pub(crate) fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
        }
    }

    /// Sign a request in place.
    ///
    /// Inserts `host`, `x-amz-date`, `x-amz-content-sha256`, the security
    /// token header when the credentials carry one, and the
    /// `authorization` header. Headers already present (e.g.
    /// `content-type`) participate in the signature.
    pub(crate) fn sign(
        &self,
        method: &str,
        url: &Url,
        headers: &mut HashMap<String, String>,
        body: &[u8],
        credentials: &AwsCredentials,
        timestamp: DateTime<Utc>,
    ) {
        let payload_hash = sha256_hex(body);
        let amz_date = format_datetime(&timestamp);
        let date_stamp = format_date_stamp(&timestamp);

        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        headers.insert("host".to_string(), host);
        headers.insert("x-amz-date".to_string(), amz_date.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        if let Some(token) = credentials.session_token() {
            headers.insert("x-amz-security-token".to_string(), token.to_string());
        }

        // Canonical headers: lowercase names, trimmed values, sorted.
        let mut canonical: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.to_lowercase(), value.trim().to_string()))
            .collect();
        canonical.sort();

        let signed_headers = canonical
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = canonical
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();

        let path = if url.path().is_empty() { "/" } else { url.path() };
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            path,
            url.query().unwrap_or(""),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            AWS_ALGORITHM,
            amz_date,
            scope,
            sha256_hex(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            credentials.secret_access_key(),
            &date_stamp,
            &self.region,
            &self.service,
        );
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        headers.insert(
            "authorization".to_string(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                AWS_ALGORITHM,
                credentials.access_key_id(),
                scope,
                signed_headers,
                signature
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    fn sign_fixture(secret: &str) -> HashMap<String, String> {
        let signer = SigV4Signer::new("us-east-1", "sts");
        let url = Url::parse("https://sts.us-east-1.amazonaws.com/").unwrap();
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        let creds = AwsCredentials::new("AKIDEXAMPLE", secret);
        signer.sign("POST", &url, &mut headers, b"Action=AssumeRole", &creds, fixed_timestamp());
        headers
    }

    #[test]
    fn test_sign_inserts_required_headers() {
        let headers = sign_fixture("secret");

        assert_eq!(
            headers.get("host").map(String::as_str),
            Some("sts.us-east-1.amazonaws.com")
        );
        assert_eq!(
            headers.get("x-amz-date").map(String::as_str),
            Some("20300101T000000Z")
        );
        assert_eq!(
            headers.get("x-amz-content-sha256").map(String::as_str),
            Some(sha256_hex(b"Action=AssumeRole").as_str())
        );
        assert!(!headers.contains_key("x-amz-security-token"));
    }

    #[test]
    fn test_authorization_header_shape() {
        let headers = sign_fixture("secret");
        let authorization = headers.get("authorization").unwrap();

        assert!(authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20300101/us-east-1/sts/aws4_request, "
        ));
        assert!(authorization.contains(
            "SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date,"
        ));

        let signature = authorization.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_is_deterministic_and_keyed() {
        let a = sign_fixture("secret");
        let b = sign_fixture("secret");
        let c = sign_fixture("other-secret");

        assert_eq!(a.get("authorization"), b.get("authorization"));
        assert_ne!(a.get("authorization"), c.get("authorization"));
    }

    #[test]
    fn test_session_token_is_signed() {
        let signer = SigV4Signer::new("us-east-1", "sts");
        let url = Url::parse("https://sts.us-east-1.amazonaws.com/").unwrap();
        let mut headers = HashMap::new();
        let creds = AwsCredentials::new("AKID", "secret").with_session_token("TOKEN");
        signer.sign("POST", &url, &mut headers, b"", &creds, fixed_timestamp());

        assert_eq!(
            headers.get("x-amz-security-token").map(String::as_str),
            Some("TOKEN")
        );
        assert!(headers
            .get("authorization")
            .unwrap()
            .contains("x-amz-security-token"));
    }

    #[test]
    fn test_key_derivation_changes_with_scope() {
        let a = derive_signing_key("secret", "20300101", "us-east-1", "sts");
        let b = derive_signing_key("secret", "20300101", "eu-west-1", "sts");
        let c = derive_signing_key("secret", "20300102", "us-east-1", "sts");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
