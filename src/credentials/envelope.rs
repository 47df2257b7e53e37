//! Shared JSON credential envelope.
//!
//! The instance metadata service and the container credential endpoint
//! both answer with the same JSON shape:
//!
//! ```json
//! {"AccessKeyId":"…","SecretAccessKey":"…","Token":"…","Expiration":"2030-01-01T00:00:00Z"}
//! ```
//!
//! Unknown fields (`Code`, `LastUpdated`, `Type`, vendor extensions) are
//! ignored and field order is irrelevant.

use super::{AwsCredentials, CredentialError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Parsed credential envelope.
///
/// All four fields are required and non-empty; the expiration is kept in
/// its parsed form so a record built from the envelope carries the exact
/// instant the service reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEnvelope {
    /// `AccessKeyId` field.
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,

    /// `SecretAccessKey` field.
    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,

    /// `Token` field (the session token).
    #[serde(rename = "Token")]
    pub token: String,

    /// `Expiration` field, RFC 3339 UTC.
    #[serde(rename = "Expiration")]
    pub expiration: String,
}

impl CredentialEnvelope {
    /// The expiration as a UTC instant.
    pub fn expiration_utc(&self) -> Result<DateTime<Utc>, CredentialError> {
        DateTime::parse_from_rfc3339(&self.expiration)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| CredentialError::BadExpiration {
                value: self.expiration.clone(),
            })
    }

    /// Convert into a temporary credential record.
    pub fn into_credentials(self) -> Result<AwsCredentials, CredentialError> {
        let expiration = self.expiration_utc()?;
        Ok(AwsCredentials::temporary(
            self.access_key_id,
            self.secret_access_key,
            self.token,
            expiration,
        ))
    }
}

fn string_field(
    value: &serde_json::Value,
    field: &'static str,
) -> Result<String, CredentialError> {
    match value.get(field) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(CredentialError::MissingField { field }),
    }
}

/// Parse a credential response body.
///
/// # Errors
///
/// - [`CredentialError::Malformed`] when the body is not valid JSON.
/// - [`CredentialError::MissingField`] when any of `AccessKeyId`,
///   `SecretAccessKey`, `Token`, or `Expiration` is absent, empty, or not
///   a string.
/// - [`CredentialError::BadExpiration`] when the timestamp cannot be
///   parsed. A zero or past timestamp parses fine; the record is simply
///   already stale.
pub fn parse(body: &[u8]) -> Result<CredentialEnvelope, CredentialError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| CredentialError::Malformed {
            message: e.to_string(),
        })?;

    let envelope = CredentialEnvelope {
        access_key_id: string_field(&value, "AccessKeyId")?,
        secret_access_key: string_field(&value, "SecretAccessKey")?,
        token: string_field(&value, "Token")?,
        expiration: string_field(&value, "Expiration")?,
    };

    // Validate the timestamp up front so a bad body is rejected before
    // anything is cached.
    envelope.expiration_utc()?;

    Ok(envelope)
}
