//! AWS Credential Resolution Core
//!
//! Discovers short-lived signing credentials from a prioritized chain of
//! sources, caches them with expiration-aware refresh, and presents one
//! uniform [`credentials::CredentialProvider`] interface to downstream
//! signing clients.
//!
//! # Sources
//!
//! In resolution order:
//!
//! 1. **Environment**: `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
//! 2. **Shared profile**: `~/.aws/credentials`
//! 3. **Web identity**: OIDC token exchanged via `AssumeRoleWithWebIdentity`
//! 4. **IMDS**: the EC2 instance metadata service (IMDSv2)
//! 5. **Container endpoint**: the ECS task credential URI, when configured
//!
//! An [`credentials::StsAssumeRoleProvider`] can wrap any source to
//! exchange its credentials for a role's short-lived credentials.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use aws_credentials::credentials::{default_chain, CredentialProvider, ProcessEnv};
//! use aws_credentials::transport::ReqwestTransport;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), aws_credentials::CredentialError> {
//!     let transport = Arc::new(ReqwestTransport::new().expect("transport"));
//!     let chain = default_chain(Arc::new(ProcessEnv), transport, Some("us-east-1"));
//!
//!     let credentials = chain.get_credentials().await?;
//!     println!("resolved key id {}", credentials.access_key_id());
//!     Ok(())
//! }
//! ```
//!
//! # Caching and refresh
//!
//! Network-backed sources are wrapped in
//! [`credentials::CachedCredentialProvider`]: a record is served from
//! cache until it comes within the refresh window (5 minutes) of its
//! expiration, at which point the next call fetches a replacement.
//! Refreshes are single-flight (concurrent callers share one fetch), and
//! a failed fetch leaves the cached record untouched.
//!
//! # Concurrency
//!
//! Everything is non-blocking on tokio. For init-time validation, block
//! the calling thread on the future (e.g. `Runtime::block_on`); there is
//! no separate synchronous mode.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod credentials;
pub mod mocks;
pub mod transport;

mod signing;
mod xml;

pub use credentials::{
    default_chain, AwsCredentials, CachedCredentialProvider, ChainCredentialProvider,
    CredentialError, CredentialProvider, EnvReader, EnvironmentCredentialProvider,
    HttpEndpointCredentialProvider, ImdsCredentialProvider, ProcessEnv,
    ProfileCredentialProvider, StaticCredentialProvider, StaticEnv, StsAssumeRoleProvider,
    WebIdentityCredentialProvider,
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};

/// Result type alias for credential operations.
pub type Result<T> = std::result::Result<T, CredentialError>;
