#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

//! Trigger GitHub Actions `workflow_dispatch` events as a GitHub App.
//!
//! This crate implements the credential lifecycle and dispatch protocol for
//! machine-identity workflow triggering: a long-lived App private key is
//! converted into short-lived RS256 assertions, each assertion is exchanged
//! for an installation-scoped token that is cached until near expiry, and
//! dispatch calls are issued with correct error classification and retry
//! behavior for transient failures.
//!
//! The entry point is [`DispatchClient`]:
//!
//! ```no_run
//! use gh_dispatch::{AppIdentity, DispatchClient, DispatchRequest, KeyMaterial};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = AppIdentity::new(123, 456)?;
//! let secret = std::fs::read_to_string("app-key.pem")?;
//! let key = KeyMaterial::from_secret(&secret)?;
//!
//! let client = DispatchClient::builder(identity, key).build()?;
//!
//! let request = DispatchRequest::new("acme", "svc", "deploy.yml", "main")?
//!     .with_input("env", "prod")?;
//! client.dispatch(&request).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Concurrent dispatches for the same identity share one cached installation
//! token; when it nears expiry, exactly one caller performs the refresh while
//! the rest wait for its result. Tokens live in memory only and are zeroized
//! on drop.
//!
//! Terminal failures (`401/403`, `404`, `422`) are surfaced immediately with
//! the detail GitHub provided; `429`/`5xx` and network failures are retried
//! with exponential backoff under a configurable [`RetryPolicy`].

pub mod api;
pub mod assertion;
pub mod clock;
pub mod constants;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod retry;
pub mod token_source;

// -----------------------
// Re-exports
// -----------------------

pub use crate::api::{
    ApiError, GitHubApi, InstallationToken, RestClient, RestClientConfig, TransientError,
};
pub use crate::assertion::{sign_assertion, AppAssertion, SigningError};
pub use crate::clock::{Clock, SystemClock};
pub use crate::credentials::{AppIdentity, IdentityError, KeyMaterial, KeyMaterialError};
pub use crate::dispatch::{DispatchClient, DispatchClientBuilder, DispatchRequest, RequestError};
pub use crate::error::{DispatchError, RestClientError};
pub use crate::retry::{RetryDecision, RetryPolicy};
pub use crate::token_source::InstallationTokenSource;
