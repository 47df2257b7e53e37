//! STS XML response parsing.
//!
//! `AssumeRole` and `AssumeRoleWithWebIdentity` responses share the same
//! `<Credentials>` element; error responses share `<Error><Code>`. The
//! parser walks events with a current-element cursor rather than binding
//! to the full response schema, so result-wrapper naming differences
//! between the two operations do not matter.

use crate::credentials::{AwsCredentials, CredentialError};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Extract the `<Credentials>` block from an STS success response.
pub(crate) fn parse_credentials(xml: &str) -> Result<AwsCredentials, CredentialError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;
    let mut expiration = None;

    let mut in_credentials = false;
    let mut current_element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "Credentials" {
                    in_credentials = true;
                }
                current_element = name;
            }
            Ok(Event::Text(e)) => {
                if !in_credentials {
                    continue;
                }
                let text = e.unescape().unwrap_or_default().to_string();
                match current_element.as_str() {
                    "AccessKeyId" => access_key_id = Some(text),
                    "SecretAccessKey" => secret_access_key = Some(text),
                    "SessionToken" => session_token = Some(text),
                    "Expiration" => expiration = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"Credentials" {
                    in_credentials = false;
                }
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CredentialError::Malformed {
                    message: e.to_string(),
                });
            }
            _ => {}
        }
    }

    let access_key_id = access_key_id
        .filter(|v| !v.is_empty())
        .ok_or(CredentialError::MissingField {
            field: "AccessKeyId",
        })?;
    let secret_access_key =
        secret_access_key
            .filter(|v| !v.is_empty())
            .ok_or(CredentialError::MissingField {
                field: "SecretAccessKey",
            })?;
    let session_token =
        session_token
            .filter(|v| !v.is_empty())
            .ok_or(CredentialError::MissingField {
                field: "SessionToken",
            })?;
    let expiration = expiration
        .filter(|v| !v.is_empty())
        .ok_or(CredentialError::MissingField { field: "Expiration" })?;

    let expiration: DateTime<Utc> = DateTime::parse_from_rfc3339(&expiration)
        .map_err(|_| CredentialError::BadExpiration { value: expiration })?
        .with_timezone(&Utc);

    Ok(AwsCredentials::temporary(
        access_key_id,
        secret_access_key,
        session_token,
        expiration,
    ))
}

/// Extract `(code, message)` from an STS error response.
///
/// Falls back to the HTTP status text when the body carries no parsable
/// `<Error>` element, so a rejection is never silently empty.
pub(crate) fn parse_error(xml: &str, status: u16) -> (String, String) {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut code = None;
    let mut message = None;
    let mut current_element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                current_element = String::from_utf8_lossy(e.name().as_ref()).to_string();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current_element.as_str() {
                    "Code" => code = Some(text),
                    "Message" => message = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current_element.clear(),
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    (
        code.unwrap_or_else(|| format!("Http{}", status)),
        message.unwrap_or_else(|| "STS returned an error response".to_string()),
    )
}
