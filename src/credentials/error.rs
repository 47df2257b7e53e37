//! Credential error types.

use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during credential resolution.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The source is not configured on this host and declines to
    /// participate. The chain skips it silently.
    #[error("credential source '{provider}' is not applicable")]
    NotApplicable {
        /// Name of the declining provider.
        provider: &'static str,
    },

    /// A credential source is configured but its configuration is broken.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the broken configuration.
        message: String,
    },

    /// The instance metadata service failed or answered unexpectedly.
    #[error("IMDS unavailable: {message}")]
    ImdsUnavailable {
        /// Details about the failure.
        message: String,
    },

    /// The container credential endpoint failed or answered unexpectedly.
    #[error("credential endpoint unavailable: {message}")]
    HttpEndpointUnavailable {
        /// Details about the failure.
        message: String,
    },

    /// A credential response body was not valid JSON.
    #[error("malformed credential response: {message}")]
    Malformed {
        /// Parser detail.
        message: String,
    },

    /// A required field was absent or empty in a credential response.
    #[error("credential response missing field '{field}'")]
    MissingField {
        /// The absent field.
        field: &'static str,
    },

    /// The expiration timestamp in a credential response was unparsable.
    #[error("unparsable credential expiration '{value}'")]
    BadExpiration {
        /// The offending timestamp text.
        value: String,
    },

    /// The STS endpoint could not be reached.
    #[error("STS unavailable: {message}")]
    StsUnavailable {
        /// Details about the failure.
        message: String,
    },

    /// STS rejected the request; the code is the service's verbatim
    /// `<Error><Code>` value.
    #[error("STS rejected the request ({code}): {message}")]
    StsRejected {
        /// STS error code, e.g. `AccessDenied` or `ExpiredToken`.
        code: String,
        /// STS error message.
        message: String,
    },

    /// A per-request deadline elapsed.
    #[error("credential request timed out after {duration:?}")]
    Timeout {
        /// The elapsed deadline.
        duration: Duration,
    },

    /// The request was cancelled before completing; any in-progress
    /// refresh left the cache unchanged.
    #[error("credential request cancelled")]
    Cancelled,

    /// Every source in the chain declined or failed.
    #[error("no credential source could provide credentials")]
    NoCredentialsAvailable,
}

impl CredentialError {
    /// Whether the caller should treat its overall operation as retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CredentialError::ImdsUnavailable { .. }
                | CredentialError::HttpEndpointUnavailable { .. }
                | CredentialError::StsUnavailable { .. }
                | CredentialError::Timeout { .. }
                | CredentialError::Cancelled
                | CredentialError::NoCredentialsAvailable
        )
    }

    /// Map a transport failure into an IMDS error, keeping deadline and
    /// cancellation kinds intact.
    pub(crate) fn imds_transport(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { duration } => CredentialError::Timeout { duration },
            TransportError::Cancelled => CredentialError::Cancelled,
            other => CredentialError::ImdsUnavailable {
                message: other.to_string(),
            },
        }
    }

    /// Map a transport failure into a container-endpoint error.
    pub(crate) fn endpoint_transport(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { duration } => CredentialError::Timeout { duration },
            TransportError::Cancelled => CredentialError::Cancelled,
            other => CredentialError::HttpEndpointUnavailable {
                message: other.to_string(),
            },
        }
    }

    /// Map a transport failure on an STS round-trip. `StsRejected` is
    /// reserved for codes the service actually returned; a failure to
    /// reach the service at all stays retryable.
    pub(crate) fn sts_transport(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { duration } => CredentialError::Timeout { duration },
            TransportError::Cancelled => CredentialError::Cancelled,
            other => CredentialError::StsUnavailable {
                message: other.to_string(),
            },
        }
    }
}
