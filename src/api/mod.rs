//! GitHub API surface used by the dispatch flow.
//!
//! [`GitHubApi`] is the seam between the credential/dispatch logic and the
//! network: the production implementation is [`RestClient`], and tests
//! substitute an in-memory fake. The trait covers exactly the two calls the
//! flow needs, already classified into [`ApiError`] categories.

mod rest;

pub use rest::{RestClient, RestClientConfig};

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use zeroize::Zeroize;

use crate::dispatch::DispatchRequest;

/// A transient failure that may succeed on retry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransientError {
    /// GitHub answered with a retryable status (429 or 5xx).
    #[error("retryable status {status}: {message}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// Message from the GitHub error body, if any.
        message: String,
    },

    /// The call did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established or was interrupted.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// A classified API failure.
///
/// Terminal variants (`Auth`, `NotFound`, `Validation`) are deterministic for
/// the same inputs and are never retried; `Transient` is eligible for the
/// retry policy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// HTTP 401/403: the credential was rejected.
    #[error("credential rejected (status {status}): {message}")]
    Auth {
        /// The HTTP status code.
        status: u16,
        /// Message from the GitHub error body, if any.
        message: String,
    },

    /// HTTP 404: repository, workflow file, or installation not found.
    #[error("not found: {message}")]
    NotFound {
        /// Message from the GitHub error body, if any.
        message: String,
    },

    /// HTTP 422: the dispatch payload was rejected.
    #[error("validation failed: {message}")]
    Validation {
        /// Message from the GitHub error body, if any.
        message: String,
    },

    /// HTTP 429/5xx or a network-level failure.
    #[error(transparent)]
    Transient(#[from] TransientError),
}

/// A short-lived bearer credential scoped to one App installation.
///
/// Owned by the [`InstallationTokenSource`](crate::InstallationTokenSource);
/// replaced wholesale on refresh, never edited in place. The token text is
/// zeroized on drop.
pub struct InstallationToken {
    value: String,
    expires_at: OffsetDateTime,
    installation_id: u64,
}

impl InstallationToken {
    /// Creates a token from its bearer value, expiry, and installation scope.
    pub fn new(value: String, expires_at: OffsetDateTime, installation_id: u64) -> Self {
        Self {
            value,
            expires_at,
            installation_id,
        }
    }

    /// Returns the bearer value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the expiry instant reported by the token endpoint.
    pub const fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    /// Returns the installation this token is scoped to.
    pub const fn installation_id(&self) -> u64 {
        self.installation_id
    }

    /// Returns `true` while the token remains valid beyond `margin` past `now`.
    pub fn fresh_at(&self, now: OffsetDateTime, margin: std::time::Duration) -> bool {
        self.expires_at > now + margin
    }
}

impl Drop for InstallationToken {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("installation_id", &self.installation_id)
            .finish()
    }
}

/// The two GitHub calls the dispatch flow performs.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Exchanges a signed App assertion for an installation token.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] classified from the token endpoint response.
    async fn exchange_token(
        &self,
        assertion: &str,
        installation_id: u64,
    ) -> Result<InstallationToken, ApiError>;

    /// Sends a `workflow_dispatch` event; success is HTTP 204 with no body.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] classified from the dispatch endpoint response.
    async fn dispatch_workflow(
        &self,
        token: &str,
        request: &DispatchRequest,
    ) -> Result<(), ApiError>;
}
